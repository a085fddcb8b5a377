use log::*;

use tokensight::cache::{self, QuotaCache};
use tokensight::config::ConfigStore;
use tokensight::statusline::{self, StatusLineContext};

// A statusline must always render something; quota-fetch failures fall back
// to the stale cache or an inline error line, never a non-zero exit.
fn main() {
    pretty_env_logger::init();
    let ctx = build_context();
    for line in statusline::render_status_line(&ctx, cache::now_ms()) {
        println!("{}", line);
    }
}

fn build_context() -> StatusLineContext {
    let config = match ConfigStore::open() {
        Ok(store) => store.load(),
        Err(e) => {
            debug!("Config path unavailable: {}", e);
            Default::default()
        }
    };

    let cookie = match config.cookie {
        Some(cookie) if !cookie.trim().is_empty() => cookie,
        _ => return StatusLineContext::from_error("run /tokensight auth <token>"),
    };

    let cache = match QuotaCache::open() {
        Ok(cache) => cache,
        Err(e) => return StatusLineContext::from_error(e.to_string()),
    };
    statusline::quota_context(&cache, cache::fetch_quota(&cache, &cookie))
}
