use std::io::IsTerminal;

use anyhow::{bail, Result};
use chrono::Local;
use structopt::StructOpt;

use tokensight::api;
use tokensight::cache;
use tokensight::config::ConfigStore;
use tokensight::display;
use tokensight::prompt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "zai",
    about = "Track your Z.ai GLM Coding Plan usage",
    after_help = "First run? Run: zai auth <your_token>\n\
        Get token from browser: z-ai-open-platform-token-production (localStorage)\n\
        Token stored in: ~/.tokensight.json"
)]
struct Opt {
    #[structopt(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Show subscription and quota (default)
    Status,
    /// Show today's hourly breakdown
    Today,
    /// Save the API token
    Auth { token: String },
    /// Clear the saved token
    Reset,
    // "7d", "30days": usage summary over the last N days
    #[structopt(external_subcommand)]
    Range(Vec<String>),
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        eprintln!("\nError: {}\n", e);
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let store = ConfigStore::open()?;
    match opt.command {
        None | Some(Command::Status) => {
            let token = get_token(&store)?;
            show_status(&token)
        }
        Some(Command::Today) => {
            let token = get_token(&store)?;
            show_usage(&token, "today")
        }
        Some(Command::Auth { token }) => cmd_auth(&store, &token),
        Some(Command::Reset) => cmd_reset(&store),
        Some(Command::Range(args)) => {
            let arg = args.first().map(String::as_str).unwrap_or("");
            if display::is_range_command(arg) {
                let token = get_token(&store)?;
                show_usage(&token, arg)
            } else {
                println!("Unknown command: {}\n", arg);
                println!("Run 'zai help' for usage.\n");
                std::process::exit(1);
            }
        }
    }
}

// Stored cookie wins; otherwise walk the user through extracting one.
// Without a terminal there is nothing to prompt on, so fail instead.
fn get_token(store: &ConfigStore) -> Result<String> {
    let mut config = store.load();
    if let Some(cookie) = &config.cookie {
        if !cookie.trim().is_empty() {
            return Ok(cookie.clone());
        }
    }

    println!("\n🔐 Authentication needed\n");
    println!("Extract your API token from the browser:\n");
    println!("  1. Open https://z.ai/manage-apikey/subscription");
    println!("  2. Open DevTools (F12) → Application → Local Storage");
    println!("  3. Click https://z.ai");
    println!("  4. Find: z-ai-open-platform-token-production");
    println!("  5. Copy the token value\n");

    if !std::io::stdin().is_terminal() {
        println!("Paste your token in the chat: /tokensight auth <your_token>\n");
        bail!("No token found in config.");
    }

    println!("The token should start with: eyJhbGciOiJIUzUxMiJ9...\n");
    let token = match prompt::prompt_for_token("Paste Bearer token: ")? {
        Some(token) => token,
        // a cancelled prompt is not an error
        None => std::process::exit(0),
    };
    if token.is_empty() {
        bail!("No token provided");
    }

    config.cookie = Some(token.clone());
    store.save(&config)?;
    println!("\n✅ Token saved!\n");
    Ok(token)
}

fn show_status(token: &str) -> Result<()> {
    let subscriptions = api::get_subscription(token)?;
    let limits = api::get_quota_limit(token)?;

    let sub = match subscriptions.first() {
        Some(sub) => sub,
        None => {
            println!("No active subscription found.");
            return Ok(());
        }
    };

    display::show_header();
    display::show_subscription(sub, Local::now().naive_local());

    if let Some(quota) = limits.iter().find(|q| q.limit_type == api::TOKENS_LIMIT) {
        display::show_token_quota(quota, cache::now_ms());
    }
    if let Some(quota) = limits.iter().find(|q| q.limit_type == api::TIME_LIMIT) {
        display::show_monthly_quota(quota);
    }
    Ok(())
}

fn show_usage(token: &str, arg: &str) -> Result<()> {
    let now = Local::now();
    let range = display::parse_date_range(arg, now.date_naive());
    let start = range.start.format("%Y-%m-%d %H:%M:%S").to_string();
    let end = range.end.format("%Y-%m-%d %H:%M:%S").to_string();

    let data = api::get_model_usage(token, &start, &end)?;

    let days = display::parse_days(arg).unwrap_or(1);
    if days > 1 || arg.contains("days") {
        display::show_usage_summary(&data, &range.label, now);
    } else {
        display::show_today_usage(&data, now);
    }
    Ok(())
}

fn cmd_auth(store: &ConfigStore, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Usage: zai auth <token>");
    }
    let mut config = store.load();
    config.cookie = Some(token.to_owned());
    store.save(&config)?;
    println!("✅ Token saved!\n");
    Ok(())
}

fn cmd_reset(store: &ConfigStore) -> Result<()> {
    let mut config = store.load();
    config.cookie = None;
    store.save(&config)?;
    println!("✅ Token cleared. Run 'zai' to authenticate.\n");
    Ok(())
}
