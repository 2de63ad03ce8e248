//! `floodwatch` - Reports whether a flood-prone road is open
//!
//! The status comes from a county road alert feed, optionally cross-checked
//! by a vision model looking at traffic camera images, and can be pinned by
//! an operator override.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod merger;
pub mod server;
pub mod status;

#[cfg(test)]
mod test_support;

pub use analyzer::{TrafficAnalyzer, Verdict};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::FeedStatusExtractor;
pub use logging::init_logging;
pub use merger::StatusMerger;
pub use status::{Override, StatusRecord};
