//! Claude Code reader for vibeclock
//!
//! Finds the per-project JSONL transcripts Claude Code writes under
//! `~/.claude/projects/` and turns them into normalized sessions.

pub mod data_loader;

pub use data_loader::DataLoader;
