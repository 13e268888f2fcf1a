///! Tracked callsigns
///!
///! The file-backed list of activators the bot watches, and the shape check
///! applied before anything is added to it.

mod store;

pub use store::CallsignStore;

use regex::Regex;
use spotwatch_common::base_callsign;
use std::sync::LazyLock;

use crate::error::{BotError, Result};

static CALLSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d?[A-Za-z]{1,2}\d{1,4}[A-Za-z]{1,4}$").expect("callsign pattern is valid")
});

/// Validate `input` and return its upper-cased base callsign.
///
/// The shape check runs on the longer side of a slash, so "W4/N7OOS" is
/// accepted and normalized to "N7OOS".
pub fn normalize_callsign(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let base = base_callsign(trimmed);
    if !CALLSIGN_RE.is_match(base) {
        return Err(BotError::InvalidCallsign(input.to_string()));
    }
    Ok(base.to_uppercase())
}
