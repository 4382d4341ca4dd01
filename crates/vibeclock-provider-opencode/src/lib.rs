//! OpenCode reader for vibeclock
//!
//! This crate reads OpenCode's session metadata and per-message files from
//! its storage directory.

pub mod data_loader;

pub use data_loader::DataLoader;
