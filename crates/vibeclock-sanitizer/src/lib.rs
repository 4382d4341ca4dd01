//! Privacy boundary for vibeclock
//!
//! Aggregated stats still hold raw project labels. This crate turns them into
//! a [`SanitizedExport`] whose types have no room for paths, usernames or
//! message content, and then verifies the serialized result with
//! [`validate_no_pii`]. Only a [`VerifiedExport`] may be published.

pub mod export;
pub mod pii;
pub mod sanitizer;

pub use export::{AnonymizedProject, ProjectLabel, SanitizedAgentStats, SanitizedExport};
pub use pii::{FindingKind, PiiFinding, PiiGuard, PiiViolations, VerifiedExport, validate_no_pii};
pub use sanitizer::Sanitize;
