///! Scheduled messages
///!
///! Operator-configured messages fired at a fixed weekday and UTC minute.
///! - `store`: the JSON file, one lock for every read and write
///! - `dispatcher`: the once-a-minute "what is due" evaluation

mod dispatcher;
mod store;

pub use dispatcher::{Dispatcher, due_entries, is_due};
pub use store::ScheduleStore;

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{BotError, Result};

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("time pattern is valid")
});

/// Parse "HH:MM" (24h, zero-padded) into (hour, minute).
pub fn parse_time_utc(time: &str) -> Result<(u32, u32)> {
    let caps = TIME_RE
        .captures(time)
        .ok_or_else(|| BotError::InvalidTime(time.to_string()))?;
    let hour = caps[1]
        .parse()
        .map_err(|_| BotError::InvalidTime(time.to_string()))?;
    let minute = caps[2]
        .parse()
        .map_err(|_| BotError::InvalidTime(time.to_string()))?;
    Ok((hour, minute))
}

/// Accepts `true`/`false` or `0`/`1`.
pub fn parse_enabled_flag(value: &serde_json::Value) -> Result<bool> {
    match value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(BotError::InvalidEnabled(n.to_string())),
        },
        other => Err(BotError::InvalidEnabled(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_time_utc() {
        assert_eq!(parse_time_utc("14:50").unwrap(), (14, 50));
        assert_eq!(parse_time_utc("00:00").unwrap(), (0, 0));
        assert_eq!(parse_time_utc("23:59").unwrap(), (23, 59));
        for bad in ["24:00", "9:30", "12:60", "12:5", "noon", "12:30:00", ""] {
            assert!(parse_time_utc(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_parse_enabled_flag() {
        assert!(parse_enabled_flag(&json!(true)).unwrap());
        assert!(!parse_enabled_flag(&json!(0)).unwrap());
        assert!(parse_enabled_flag(&json!(1)).unwrap());
        assert!(parse_enabled_flag(&json!(2)).is_err());
        assert!(parse_enabled_flag(&json!("yes")).is_err());
    }
}
