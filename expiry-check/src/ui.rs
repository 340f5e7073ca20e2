//! Display logic for expiry-check CLI.
//!
//! Text output uses the `console` crate for colors and alignment; `--json`
//! output is a single pretty-printed document on stdout.

use chrono::{DateTime, Utc};
use console::{pad_str, style, Alignment};
use expiry_check_lib::{
    days_until_expiry, parse_expiry_date, CheckConfig, CheckReport, DomainRecord, StoragePaths,
};
use serde::Serialize;
use std::time::Duration;

const DOMAIN_WIDTH: usize = 30;

/// One expiring domain in the JSON report.
#[derive(Debug, Serialize, PartialEq)]
pub struct JsonExpiring<'a> {
    pub domain: &'a str,
    pub source: &'a str,
    pub expiry: &'a str,
    pub days_left: Option<i64>,
}

/// The JSON report document.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub expiring: Vec<JsonExpiring<'a>>,
    pub failures: &'a [expiry_check_lib::FailureRecord],
    pub lookups: usize,
    pub cache_hits: usize,
    pub cancelled: bool,
}

/// Build the JSON view of a report.
pub fn json_report(report: &CheckReport, now: DateTime<Utc>, cancelled: bool) -> JsonReport<'_> {
    JsonReport {
        expiring: report
            .expiring
            .iter()
            .map(|record| JsonExpiring {
                domain: &record.domain,
                source: &record.source,
                expiry: record.expiry.as_deref().unwrap_or_default(),
                days_left: days_left(record, now),
            })
            .collect(),
        failures: &report.failures,
        lookups: report.lookups,
        cache_hits: report.cache_hits,
        cancelled,
    }
}

/// Print the report as JSON.
pub fn print_json(
    report: &CheckReport,
    now: DateTime<Utc>,
    cancelled: bool,
) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(&json_report(report, now, cancelled))?;
    println!("{}", json);
    Ok(())
}

/// Print a styled header at the start of a run.
pub fn print_header(domain_count: usize, config: &CheckConfig, storage: &StoragePaths) {
    println!(
        "{} {} {}",
        style("expiry-check").bold(),
        style(format!("v{}", expiry_check_lib::VERSION)).dim(),
        style(format!(
            "- Checking {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let meta = [
        format!("Alert within: {}", format_duration(config.effective_alert_within())),
        format!("Rate limit: {}", format_duration(config.rate_limit)),
        format!("Cache: {}", storage.cache_file.display()),
    ];
    println!("{}", style(meta.join(" | ")).dim());
    println!();
}

/// Print expiring domains, then failures.
pub fn print_report(report: &CheckReport, now: DateTime<Utc>) {
    if report.is_clean() {
        println!("  {}", style("No domains expiring soon").green());
        return;
    }

    for record in &report.expiring {
        let padded = pad_str(&record.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
        let expiry = record.expiry.as_deref().unwrap_or("-");
        let when = match days_left(record, now) {
            Some(days) if days < 0 => style(format!("expired {} days ago", -days)).red().bold(),
            Some(0) => style("expires today".to_string()).red().bold(),
            Some(days) => style(format!("{} days left", days)).yellow().bold(),
            None => style("unknown".to_string()).dim(),
        };
        println!(
            "  {}  {}  {}  {}",
            style(&padded).white(),
            style(expiry).cyan(),
            when,
            style(format!("({})", record.source)).dim(),
        );
    }

    for failure in &report.failures {
        let padded = pad_str(&failure.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
        println!(
            "  {}  {}  {}",
            style(&padded).white(),
            style("UNKNOWN").red(),
            style(format!("({})", failure.source)).dim(),
        );
    }
}

/// Print a one-line summary after a completed pass.
pub fn print_summary(report: &CheckReport, elapsed: Duration, storage: &StoragePaths) {
    println!();
    println!(
        "{} expiring, {} failed, {} looked up, {} from cache {}",
        style(report.expiring.len()).yellow().bold(),
        style(report.failures.len()).red().bold(),
        report.lookups,
        report.cache_hits,
        style(format!("in {:.1}s", elapsed.as_secs_f64())).dim(),
    );
    println!(
        "{}",
        style(format!(
            "Saved {} and {}",
            storage.expiring_file.display(),
            storage.failures_file.display()
        ))
        .dim()
    );
}

fn days_left(record: &DomainRecord, now: DateTime<Utc>) -> Option<i64> {
    record
        .expiry
        .as_deref()
        .and_then(parse_expiry_date)
        .map(|date| days_until_expiry(date, now))
}

/// Render a duration the way it is written in config files.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if duration.is_zero() {
        "off".to_string()
    } else if duration.subsec_millis() != 0 || secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use expiry_check_lib::FailureRecord;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "off");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(15)), "15s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(36 * 3600)), "36h");
        assert_eq!(format_duration(Duration::from_secs(7 * 86400)), "7d");
    }

    #[test]
    fn test_json_report() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let report = CheckReport {
            expiring: vec![DomainRecord::new("a.com", "cf").with_expiry("2026-01-04")],
            failures: vec![FailureRecord::new("b.com", "cf")],
            lookups: 2,
            cache_hits: 0,
        };

        let json = json_report(&report, now, false);
        assert_eq!(
            json.expiring,
            vec![JsonExpiring {
                domain: "a.com",
                source: "cf",
                expiry: "2026-01-04",
                days_left: Some(3),
            }]
        );

        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["failures"][0]["domain"], "b.com");
        assert_eq!(value["cancelled"], false);
    }
}
