use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, Timelike};
use itertools::Itertools;

use crate::api::{QuotaLimit, Subscription, UsageData};

const DAY_MS: f64 = 86_400_000.0;

pub fn format_tokens(tokens: i64) -> String {
    if tokens >= 1_000_000_000 {
        format!("{:.1}B", tokens as f64 / 1e9)
    } else if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1e6)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1e3)
    } else {
        tokens.to_string()
    }
}

pub fn format_time_remaining(ms: i64) -> String {
    if ms < 0 {
        return "now".to_owned();
    }
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

// The service sends either a bare date or a full datetime
fn parse_renew_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn days_until_renewal(next_renew_time: &str, now: NaiveDateTime) -> i64 {
    match parse_renew_time(next_renew_time) {
        Some(renew) => {
            let ms = (renew - now).num_milliseconds();
            (ms as f64 / DAY_MS).ceil() as i64
        }
        None => 0,
    }
}

fn bar(percentage: f64, length: usize) -> String {
    let filled = ((percentage / 100.0) * length as f64).round().max(0.0) as usize;
    let filled = filled.min(length);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(length - filled))
}

fn status_emoji(percentage: f64) -> &'static str {
    if percentage >= 100.0 {
        "🔴"
    } else if percentage > 90.0 {
        "🟠"
    } else if percentage > 80.0 {
        "🟡"
    } else {
        "🟢"
    }
}

pub fn show_header() {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║           Z.ai GLM Coding Plan Usage Tracker               ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");
}

pub fn show_subscription(sub: &Subscription, now: NaiveDateTime) {
    let days = days_until_renewal(&sub.next_renew_time, now);
    let renew_date = sub.next_renew_time.split(' ').next().unwrap_or("");
    println!("📦 Subscription: {}", sub.product_name);
    println!("   Status: {}", sub.status);
    println!("   Renews in: {} days ({})", days, renew_date);
    println!("   Billing: {} @ ${}\n", sub.billing_cycle, sub.actual_price);
}

pub fn show_token_quota(quota: &QuotaLimit, now_ms: i64) {
    let reset_in = match quota.next_reset_time {
        Some(at) => format_time_remaining(at - now_ms),
        None => "unknown".to_owned(),
    };
    println!("📊 5-Hour Quota (Model Calls):");
    println!(
        "   {} / {} tokens",
        format_tokens(quota.current_value),
        format_tokens(quota.usage)
    );
    println!(
        "   {} tokens remaining ({}%)",
        format_tokens(quota.remaining),
        quota.percentage
    );
    println!("   Resets in: {}\n", reset_in);
    println!(
        "   {} {} {}%\n",
        status_emoji(quota.percentage),
        bar(quota.percentage, 30),
        quota.percentage
    );
}

pub fn show_monthly_quota(quota: &QuotaLimit) {
    println!("📊 Monthly Quota (Web Search/Reader/Zread):");
    println!(
        "   {} / {} times ({}%)",
        quota.current_value, quota.usage, quota.percentage
    );
    println!(
        "   {} times remaining (Resets on 1st of month)\n",
        quota.remaining
    );
    println!(
        "   {} {} {}%\n",
        status_emoji(quota.percentage),
        bar(quota.percentage, 30),
        quota.percentage
    );
    if let Some(details) = &quota.usage_details {
        if !details.is_empty() {
            println!("   Tool breakdown:");
            for detail in details {
                println!("   - {}: {} calls", detail.model_code, detail.usage);
            }
            println!();
        }
    }
}

pub fn show_today_usage(data: &UsageData, now: DateTime<Local>) {
    println!("\n📅 Today's Usage ({}):\n", now.format("%Y-%m-%d"));

    if let Some(total) = &data.total_usage {
        println!("   Model Calls: {}", total.total_model_call_count);
        println!("   Tokens Used: {}", format_tokens(total.total_tokens_usage));
    }

    println!("\n   Hourly breakdown:");
    for hour in 0..=now.hour() {
        let suffix = format!(" {:02}:00", hour);
        if let Some((idx, _)) = data.x_time.iter().find_position(|t| t.ends_with(&suffix)) {
            let calls = data.model_call_count.get(idx).copied().flatten().unwrap_or(0);
            let tokens = data.tokens_usage.get(idx).copied().flatten().unwrap_or(0);
            if calls != 0 || tokens != 0 {
                println!(
                    "   {:02}:00 - {} calls, {} tokens",
                    hour,
                    calls,
                    format_tokens(tokens)
                );
            }
        }
    }
    println!();
}

pub fn show_usage_summary(data: &UsageData, label: &str, now: DateTime<Local>) {
    println!("\n📅 Usage ({}): {}\n", label, now.format("%Y-%m-%d"));
    if let Some(total) = &data.total_usage {
        println!("   Model Calls: {}", total.total_model_call_count);
        println!("   Tokens Used: {}\n", total.total_tokens_usage);
    }
}

#[derive(Debug, PartialEq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub label: String,
}

// "today", "7", "7d", "7days" -> 7; anything else is not a day count
pub fn parse_days(arg: &str) -> Option<u32> {
    if arg == "today" {
        return Some(1);
    }
    let digits = arg
        .strip_suffix("days")
        .or_else(|| arg.strip_suffix('d'))
        .unwrap_or(arg);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// Range commands require the d/days suffix; a bare number is not a command
pub fn is_range_command(arg: &str) -> bool {
    match arg.strip_suffix("days").or_else(|| arg.strip_suffix('d')) {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

pub fn parse_date_range(arg: &str, today: NaiveDate) -> DateRange {
    let days = parse_days(arg).unwrap_or(1).max(1);
    let start_day = today - Days::new(u64::from(days - 1));
    DateRange {
        start: start_day.and_hms_opt(0, 0, 0).unwrap(),
        end: today.and_hms_opt(23, 59, 59).unwrap(),
        label: if days == 1 {
            "Today".to_owned()
        } else {
            format!("Last {} days", days)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn token_counts_use_short_suffixes() {
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_500), "1.5K");
        assert_eq!(format_tokens(1_000_000), "1.0M");
        assert_eq!(format_tokens(174_400_000), "174.4M");
        assert_eq!(format_tokens(2_500_000_000), "2.5B");
    }

    #[test]
    fn time_remaining_is_hours_and_minutes() {
        assert_eq!(format_time_remaining(-5), "now");
        assert_eq!(format_time_remaining(0), "0m");
        assert_eq!(format_time_remaining(45 * 60_000), "45m");
        assert_eq!(format_time_remaining(3_900_000), "1h 5m");
    }

    #[test]
    fn renewal_days_round_up() {
        let now = date(2026, 8, 7).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(days_until_renewal("2026-08-10", now), 3);
        assert_eq!(days_until_renewal("2026-08-10 12:00:00", now), 3);
        assert_eq!(days_until_renewal("2026-08-07 12:00:00", now), 0);
        assert_eq!(days_until_renewal("garbage", now), 0);
    }

    #[test]
    fn bar_fill_is_clamped() {
        assert_eq!(bar(0.0, 30), format!("[{}]", "░".repeat(30)));
        assert_eq!(bar(100.0, 30), format!("[{}]", "█".repeat(30)));
        assert_eq!(bar(150.0, 30), format!("[{}]", "█".repeat(30)));
        assert_eq!(bar(50.0, 30), format!("[{}{}]", "█".repeat(15), "░".repeat(15)));
    }

    #[test]
    fn emoji_matches_thresholds() {
        assert_eq!(status_emoji(50.0), "🟢");
        assert_eq!(status_emoji(85.0), "🟡");
        assert_eq!(status_emoji(90.0), "🟡");
        assert_eq!(status_emoji(95.0), "🟠");
        assert_eq!(status_emoji(100.0), "🔴");
        assert_eq!(status_emoji(128.0), "🔴");
    }

    #[test]
    fn day_counts_parse_with_and_without_suffix() {
        assert_eq!(parse_days("today"), Some(1));
        assert_eq!(parse_days("7"), Some(7));
        assert_eq!(parse_days("7d"), Some(7));
        assert_eq!(parse_days("30days"), Some(30));
        assert_eq!(parse_days("d"), None);
        assert_eq!(parse_days("7x"), None);
        assert_eq!(parse_days(""), None);
    }

    #[test]
    fn range_commands_require_the_suffix() {
        assert!(is_range_command("7d"));
        assert!(is_range_command("30days"));
        assert!(!is_range_command("7"));
        assert!(!is_range_command("today"));
        assert!(!is_range_command("d"));
        assert!(!is_range_command("sevend"));
    }

    #[test]
    fn seven_day_range_starts_six_days_back() {
        let range = parse_date_range("7d", date(2026, 8, 7));
        assert_eq!(range.start, date(2026, 8, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(range.end, date(2026, 8, 7).and_hms_opt(23, 59, 59).unwrap());
        assert_eq!(range.label, "Last 7 days");
    }

    #[test]
    fn today_range_covers_one_day() {
        let range = parse_date_range("today", date(2026, 8, 7));
        assert_eq!(range.start, date(2026, 8, 7).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(range.label, "Today");
    }
}
