use std::io::BufRead;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::ConsoleError;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(response), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                response.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a console error in the appropriate format
pub fn output_error(output_format: &OutputFormat, error: &ConsoleError) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&error.to_json())?);
        }
        OutputFormat::Text => {
            if matches!(error, ConsoleError::AuthRequired) {
                eprintln!("Not signed in. Run `pedal auth login <email>` first.");
            }
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: []
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Output a list, as JSON under `collection_name` or through `print_rows`
pub fn output_collection<T: Serialize>(
    output_format: &OutputFormat,
    collection_name: &str,
    items: &[T],
    empty_message: &str,
    print_rows: impl Fn(&[T]),
) -> anyhow::Result<()> {
    if items.is_empty() {
        return output_empty_collection(output_format, collection_name, empty_message);
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: items
            }))?);
        }
        OutputFormat::Text => {
            print_rows(items);
            println!("\n{} {}", items.len(), collection_name);
        }
    }
    Ok(())
}

pub fn short_date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Fit a value into a fixed-width column
pub fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let kept: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn parse_instant(value: &str, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|day| day.and_time(time).and_utc())
        .map_err(|_| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got '{}'", value))
}

/// `--from`: a bare date means the start of that day
pub fn parse_from_date(value: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(value, NaiveTime::MIN)
}

/// `--to`: a bare date means the end of that day
pub fn parse_to_date(value: &str) -> Result<DateTime<Utc>, String> {
    let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    parse_instant(value, end)
}

/// Flag first, then `PEDAL_PASSWORD`, then one line of stdin
pub fn resolve_password(provided: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("PEDAL_PASSWORD") {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("a password is required");
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bare_dates_cover_the_whole_day() {
        assert_eq!(
            parse_from_date("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_to_date("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap()
        );
        assert!(parse_from_date("yesterday").is_err());
    }

    #[test]
    fn clips_long_values() {
        assert_eq!(clip("Vuelta a la sierra", 8), "Vuelta …");
        assert_eq!(clip("corta", 8), "corta");
    }
}
