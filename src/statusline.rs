use log::*;

use crate::api::{ApiError, QuotaLimit};
use crate::cache::{QuotaCache, QuotaSnapshot};
use crate::display::{format_time_remaining, format_tokens};

pub const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

fn dim(text: &str) -> String {
    format!("{}{}{}", DIM, text, RESET)
}

fn red(text: &str) -> String {
    format!("{}{}{}", RED, text, RESET)
}

fn cyan(text: &str) -> String {
    format!("{}{}{}", CYAN, text, RESET)
}

fn quota_color(percent: f64) -> &'static str {
    if percent >= 90.0 {
        RED
    } else if percent >= 70.0 {
        YELLOW
    } else {
        GREEN
    }
}

fn colored_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round().max(0.0) as usize;
    let filled = filled.min(width);
    format!(
        "{}{}{}{}{}",
        quota_color(percent),
        "█".repeat(filled),
        DIM,
        "░".repeat(width - filled),
        RESET
    )
}

#[derive(Debug, Default)]
pub struct StatusLineContext {
    pub token_limit: Option<QuotaLimit>,
    pub monthly_limit: Option<QuotaLimit>,
    pub error: Option<String>,
}

impl StatusLineContext {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Stale-but-present beats any error display: when the fetch fails, an
/// expired cache entry that still holds a token quota is rendered with no
/// error indicator at all.
pub fn quota_context(
    cache: &QuotaCache,
    result: Result<QuotaSnapshot, ApiError>,
) -> StatusLineContext {
    match result {
        Ok(snapshot) => StatusLineContext {
            token_limit: snapshot.token_limit,
            monthly_limit: snapshot.monthly_limit,
            error: None,
        },
        Err(e) => match cache.read() {
            Some(entry) if entry.token_limit.is_some() => {
                debug!("Quota fetch failed, falling back to stale cache: {}", e);
                StatusLineContext {
                    token_limit: entry.token_limit,
                    monthly_limit: entry.monthly_limit,
                    error: None,
                }
            }
            _ => StatusLineContext::from_error(e.to_string()),
        },
    }
}

pub fn render_token_quota_line(ctx: &StatusLineContext, now_ms: i64) -> Option<String> {
    if let Some(error) = &ctx.error {
        return Some(format!("{}: {}", dim("tokensight"), red(error)));
    }

    let quota = ctx.token_limit.as_ref()?;
    let percent = quota.percentage;
    let mut parts = vec![
        cyan("[Z.ai]"),
        format!(
            "{} {}{}%{}",
            colored_bar(percent, 8),
            quota_color(percent),
            percent,
            RESET
        ),
        dim(&format!("{} left", format_tokens(quota.remaining))),
    ];
    if let Some(reset_at) = quota.next_reset_time {
        parts.push(dim(&format!("↺ {}", format_time_remaining(reset_at - now_ms))));
    }
    Some(parts.join(" "))
}

pub fn render_monthly_quota_line(ctx: &StatusLineContext) -> Option<String> {
    let quota = ctx.monthly_limit.as_ref()?;
    let percent = quota.percentage;
    let parts = vec![
        dim("Monthly"),
        format!(
            "{}{}/{}{}",
            quota_color(percent),
            quota.current_value,
            quota.usage,
            RESET
        ),
        dim(&format!("{} left", quota.remaining)),
    ];
    Some(parts.join(" "))
}

// Spaces become U+00A0 so the host statusline does not collapse them.
pub fn render_status_line(ctx: &StatusLineContext, now_ms: i64) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(line) = render_token_quota_line(ctx, now_ms) {
        lines.push(line);
    }
    if let Some(line) = render_monthly_quota_line(ctx) {
        lines.push(line);
    }
    lines
        .into_iter()
        .map(|line| format!("{}{}", RESET, line.replace(' ', "\u{a0}")))
        .collect()
}
