//! Codex CLI reader for vibeclock
//!
//! Reads the rollout files Codex writes under `~/.codex/sessions/`.

pub mod data_loader;

pub use data_loader::DataLoader;
