//! Fundshare Crowd-Investment Library
//!
//! Core components of the fundshare platform: investment lifecycle,
//! quarterly performance reporting, and profit/loss distribution.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
