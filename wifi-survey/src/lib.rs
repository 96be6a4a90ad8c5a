//! Records which access points of a network are visible from a location and
//! what the current connection looks like there.
//!
//! A run is a single [`survey::Survey`]: scan until the target network shows up
//! (asking before starting another round of attempts), write the matching rows
//! to `Access Points: <timestamp> - <location>.csv`, then write the current
//! connection's metrics and peer counts to
//! `Connection Info: <timestamp> - <location>.json`.

pub mod config;
pub mod connection;
pub mod errors;
pub mod peers;
pub mod retry;
pub mod scan;
pub mod session;
pub mod shell;
pub mod survey;

pub use errors::{Result, SurveyError};
