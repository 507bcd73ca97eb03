//! Filename templating for saved raw requests.
//!
//! Patterns combine Django-style date tokens (`%Y-%m-%d-%H%i%s`) with
//! `{hostname}` and `{url}` placeholders; the result is sanitized so
//! arbitrary request metadata cannot escape into odd file paths.

use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike};
use percent_encoding::percent_decode_str;
use std::path::PathBuf;

/// Replace characters that are illegal or awkward in filenames.
/// Runs of them collapse into a single underscore.
fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_sub = false;
    for c in input.chars() {
        let illegal = matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            || c.is_whitespace();
        if illegal {
            if !last_was_sub {
                out.push('_');
            }
            last_was_sub = true;
        } else {
            out.push(c);
            last_was_sub = false;
        }
    }
    out
}

fn days_in_month(date: &DateTime<Local>) -> u32 {
    let (year, month) = (date.year(), date.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

/// Expand Django-style date tokens against `date`.
pub fn format_date(format: &str, date: &DateTime<Local>) -> String {
    let (is_pm, hour12) = date.hour12();
    let micros = date.nanosecond() / 1000 % 1_000_000;

    let pairs: [(&str, String); 23] = [
        ("%d", format!("{:02}", date.day())),
        ("%j", date.day().to_string()),
        ("%D", date.format("%a").to_string()),
        ("%l", date.format("%A").to_string()),
        ("%w", date.weekday().num_days_from_sunday().to_string()),
        ("%z", date.ordinal().to_string()),
        ("%W", date.iso_week().week().to_string()),
        ("%m", format!("{:02}", date.month())),
        ("%n", date.month().to_string()),
        ("%M", date.format("%b").to_string()),
        ("%b", date.format("%b").to_string().to_lowercase()),
        ("%F", date.format("%B").to_string()),
        ("%t", days_in_month(date).to_string()),
        ("%y", format!("{:02}", date.year() % 100)),
        ("%Y", format!("{:04}", date.year())),
        ("%g", hour12.to_string()),
        ("%G", date.hour().to_string()),
        ("%h", format!("{hour12:02}")),
        ("%H", format!("{:02}", date.hour())),
        ("%i", format!("{:02}", date.minute())),
        ("%s", format!("{:02}", date.second())),
        ("%u", format!("{micros:06}")),
        ("%A", if is_pm { "PM" } else { "AM" }.to_string()),
    ];

    let mut out = format.to_string();
    for (token, value) in pairs {
        out = out.replace(token, &value);
    }
    out
}

/// Build the save path for a captured request from the configured
/// pattern. Empty patterns disable saving.
pub fn formatted_filename(
    pattern: &str,
    host: &str,
    url: &str,
    now: &DateTime<Local>,
) -> Option<PathBuf> {
    if pattern.is_empty() {
        return None;
    }

    let decoded_url = percent_decode_str(url).decode_utf8_lossy();
    let with_args = pattern
        .replace("{hostname}", &sanitize_component(host))
        .replace("{url}", &sanitize_component(&decoded_url));

    let expanded = match with_args.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home
                .join(rest.trim_start_matches('/'))
                .to_string_lossy()
                .into_owned(),
            None => rest.trim_start_matches('/').to_string(),
        },
        None => with_args,
    };

    Some(PathBuf::from(format_date(&expanded, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_date() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn date_tokens_expand() {
        let date = fixed_date();
        assert_eq!(format_date("%Y-%m-%d", &date), "2024-03-07");
        assert_eq!(format_date("%H%i%s", &date), "140509");
        assert_eq!(format_date("%g %A", &date), "2 PM");
        assert_eq!(format_date("%t", &date), "31");
        assert_eq!(format_date("no tokens", &date), "no tokens");
    }

    #[test]
    fn sanitizes_hostname_and_url() {
        let date = fixed_date();
        let path = formatted_filename(
            "{hostname}-{url}.raw",
            "example.com:9002",
            "/hooks/github?x=1",
            &date,
        )
        .unwrap();
        assert_eq!(path.to_str().unwrap(), "example.com_9002-_hooks_github_x=1.raw");
    }

    #[test]
    fn collapses_illegal_runs() {
        assert_eq!(sanitize_component("a  <> b"), "a_b");
        assert_eq!(sanitize_component("plain"), "plain");
    }

    #[test]
    fn decodes_percent_escapes_in_url() {
        let date = fixed_date();
        let path = formatted_filename("{url}.raw", "h", "/a%20b", &date).unwrap();
        assert_eq!(path.to_str().unwrap(), "_a_b.raw");
    }

    #[test]
    fn empty_pattern_disables_saving() {
        assert!(formatted_filename("", "h", "/", &fixed_date()).is_none());
    }

    #[test]
    fn default_pattern_produces_expected_name() {
        let date = fixed_date();
        let path = formatted_filename(
            "%Y-%m-%d-%H%i%s-{hostname}-{url}.raw",
            "localhost:9002",
            "/payload",
            &date,
        )
        .unwrap();
        assert_eq!(
            path.to_str().unwrap(),
            "2024-03-07-140509-localhost_9002-_payload.raw"
        );
    }
}
