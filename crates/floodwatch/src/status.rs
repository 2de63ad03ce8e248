//! Core status types for floodwatch.
//!
//! This module defines the record handed to renderers and the operator
//! override that can replace every other signal.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A manual open/closed setting supplied by the operator at startup.
///
/// Useful when the feed is known to be stale but the cameras clearly show
/// the real state of the road.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Override {
    /// No override; the feed and the analyzer decide.
    #[default]
    None,
    /// Report the road as open regardless of other signals.
    ForceOpen,
    /// Report the road as closed regardless of other signals.
    ForceClosed,
}

impl Override {
    /// The record an active override produces, or `None` when unset.
    #[must_use]
    pub fn record(self) -> Option<StatusRecord> {
        match self {
            Self::None => None,
            Self::ForceOpen => Some(StatusRecord::bare(true)),
            Self::ForceClosed => Some(StatusRecord::bare(false)),
        }
    }
}

impl std::fmt::Display for Override {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ForceOpen => write!(f, "open"),
            Self::ForceClosed => write!(f, "closed"),
        }
    }
}

impl FromStr for Override {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "open" => Ok(Self::ForceOpen),
            "closed" => Ok(Self::ForceClosed),
            other => Err(Error::config(format!(
                "override must be one of none, open, closed (got '{other}')"
            ))),
        }
    }
}

impl TryFrom<String> for Override {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Override> for String {
    fn from(value: Override) -> Self {
        value.to_string()
    }
}

/// The final open/closed determination plus supporting explanatory fields.
///
/// Consumers should only rely on "non-empty detail means there is
/// explanatory text"; the detail format itself is not stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Whether the road is open for travel.
    pub open: bool,

    /// Explanatory text, such as the feed item title or the analysis reason.
    pub detail: String,

    /// Link to the source announcement, if any.
    pub link: String,

    /// When the underlying information was published or checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl StatusRecord {
    /// A record carrying only the open flag.
    #[must_use]
    pub fn bare(open: bool) -> Self {
        Self {
            open,
            detail: String::new(),
            link: String::new(),
            published_at: None,
        }
    }

    /// The default-open record used when the feed never mentions the road.
    #[must_use]
    pub fn unmentioned() -> Self {
        Self::bare(true)
    }

    /// Check if the record carries explanatory text.
    #[must_use]
    pub fn has_detail(&self) -> bool {
        !self.detail.is_empty()
    }

    /// Human-readable state word.
    #[must_use]
    pub fn state_label(&self) -> &'static str {
        if self.open {
            "Open"
        } else {
            "Closed"
        }
    }
}
