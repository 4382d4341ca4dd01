//! Last-line PII verification
//!
//! The export schema already has no place for paths or names, but model names
//! and any future string field still pass through. Before anything is
//! published the export is serialized and every string, map keys included, is
//! checked against the local identity and against path-shaped text.
//!
//! The username and the last component of the home directory are both
//! searched for as whole words, ignoring case.
//!
//! Known gap: names shorter than three characters are not matched on their
//! own, because they collide with too much ordinary text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use vibeclock_core::error::VibeclockError;

use crate::export::SanitizedExport;

/// Identity names shorter than this are not searched for on their own
pub const MIN_USERNAME_LEN: usize = 3;

static PATH_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(/[A-Za-z0-9._-]+){2,}").expect("PATH_FRAGMENT is a compile-time constant")
});

static DRIVE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9])[A-Za-z]:[\\/]").expect("DRIVE_PATH is a compile-time constant")
});

/// What kind of leak a finding looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// The home directory path
    HomeDirectory,
    /// `/home/<user>`, `/Users/<user>` or `C:\Users\<user>`
    UserDirectory,
    /// The bare username or home directory name
    Username,
    /// Something shaped like a filesystem path
    PathFragment,
    /// The export could not be serialized for checking
    Unserializable,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::HomeDirectory => "home directory",
            FindingKind::UserDirectory => "user directory",
            FindingKind::Username => "username",
            FindingKind::PathFragment => "path fragment",
            FindingKind::Unserializable => "unserializable export",
        };
        f.write_str(name)
    }
}

/// One suspicious string; never carries the string itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiFinding {
    /// JSON location, with offending object keys replaced by their index
    pub location: String,
    pub kind: FindingKind,
}

impl fmt::Display for PiiFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.location)
    }
}

/// Validation failure; the export must not be published
#[derive(Debug, Clone, Error)]
#[error("push aborted: potential PII detected ({} finding(s))", findings.len())]
pub struct PiiViolations {
    pub findings: Vec<PiiFinding>,
}

impl From<PiiViolations> for VibeclockError {
    fn from(violations: PiiViolations) -> Self {
        VibeclockError::PiiDetected {
            findings: violations.findings.len(),
        }
    }
}

/// An export that passed validation
///
/// Only [`PiiGuard::validate`] creates one, which makes it the ticket a
/// publisher needs.
#[derive(Debug, Clone)]
pub struct VerifiedExport {
    export: SanitizedExport,
}

impl VerifiedExport {
    pub fn as_export(&self) -> &SanitizedExport {
        &self.export
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export)
    }
}

/// The local identity exports are checked against
#[derive(Debug, Clone)]
pub struct PiiGuard {
    username: Option<String>,
    home_dir: Option<String>,
    identity_patterns: Vec<Regex>,
}

impl PiiGuard {
    pub fn new(username: Option<String>, home_dir: Option<String>) -> Self {
        let username = username.filter(|u| !u.trim().is_empty());
        // "/" or "" would match everything
        let home_dir = home_dir.filter(|h| h.trim_end_matches(['/', '\\']).len() > 1);
        let home_name = home_dir
            .as_deref()
            .and_then(|h| h.trim_end_matches(['/', '\\']).rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty());

        let mut names: Vec<&str> = Vec::new();
        for name in username.as_deref().into_iter().chain(home_name) {
            if name.chars().count() >= MIN_USERNAME_LEN
                && !names.iter().any(|seen| seen.eq_ignore_ascii_case(name))
            {
                names.push(name);
            }
        }
        let identity_patterns = names.into_iter().filter_map(identity_pattern).collect();

        Self {
            username,
            home_dir,
            identity_patterns,
        }
    }

    /// Identity of the current user from `USER`/`USERNAME` and the home dir
    pub fn from_environment() -> Self {
        let username = std::env::var("USER")
            .ok()
            .filter(|u| !u.is_empty())
            .or_else(|| std::env::var("USERNAME").ok());
        let home_dir = dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
        debug!("PII guard active (username known: {})", username.is_some());
        Self::new(username, home_dir)
    }

    /// Check an export, returning the only value a publisher accepts
    pub fn validate(&self, export: &SanitizedExport) -> Result<VerifiedExport, PiiViolations> {
        let value = match serde_json::to_value(export) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize export for PII validation: {}", e);
                return Err(PiiViolations {
                    findings: vec![PiiFinding {
                        location: "$".to_string(),
                        kind: FindingKind::Unserializable,
                    }],
                });
            }
        };

        let mut findings = Vec::new();
        self.scan_value(&value, "$", &mut findings);

        if findings.is_empty() {
            Ok(VerifiedExport {
                export: export.clone(),
            })
        } else {
            warn!("PII validation failed with {} finding(s)", findings.len());
            Err(PiiViolations { findings })
        }
    }

    /// Check a single string
    pub fn check_str(&self, text: &str) -> Option<FindingKind> {
        if let Some(home) = &self.home_dir
            && text.contains(home.as_str())
        {
            return Some(FindingKind::HomeDirectory);
        }

        if let Some(user) = &self.username {
            let unix = [format!("/home/{user}"), format!("/Users/{user}")];
            let windows = format!("c:\\users\\{}", user.to_lowercase());
            if unix.iter().any(|dir| text.contains(dir.as_str()))
                || text.to_lowercase().contains(&windows)
            {
                return Some(FindingKind::UserDirectory);
            }
        }

        if self.identity_patterns.iter().any(|pattern| pattern.is_match(text)) {
            return Some(FindingKind::Username);
        }

        if PATH_FRAGMENT.is_match(text) || DRIVE_PATH.is_match(text) {
            return Some(FindingKind::PathFragment);
        }
        None
    }

    fn scan_value(&self, value: &Value, location: &str, findings: &mut Vec<PiiFinding>) {
        match value {
            Value::String(text) => {
                if let Some(kind) = self.check_str(text) {
                    findings.push(PiiFinding {
                        location: location.to_string(),
                        kind,
                    });
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.scan_value(item, &format!("{location}[{index}]"), findings);
                }
            }
            Value::Object(map) => {
                for (index, (key, item)) in map.iter().enumerate() {
                    let child = match self.check_str(key) {
                        Some(kind) => {
                            let child = format!("{location}.<key #{index}>");
                            findings.push(PiiFinding {
                                location: child.clone(),
                                kind,
                            });
                            child
                        }
                        None => format!("{location}.{key}"),
                    };
                    self.scan_value(item, &child, findings);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

/// `name` as a whole word: no letter may touch either end
fn identity_pattern(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)(?:^|[^a-z]){}(?:[^a-z]|$)", regex::escape(name))).ok()
}

/// Validate against the identity of the current user
pub fn validate_no_pii(export: &SanitizedExport) -> Result<VerifiedExport, PiiViolations> {
    PiiGuard::from_environment().validate(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::SanitizedAgentStats;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use vibeclock_core::types::{Source, TokenCounts};

    fn guard() -> PiiGuard {
        PiiGuard::new(Some("alice".to_string()), Some("/home/alice".to_string()))
    }

    fn stats_with_model(model: &str) -> SanitizedAgentStats {
        let mut token_totals = BTreeMap::new();
        token_totals.insert(model.to_string(), TokenCounts::new(1, 1, 0, 0));
        SanitizedAgentStats {
            total_sessions: 0,
            total_messages: 0,
            total_duration_secs: 0,
            longest_session_secs: 0,
            token_totals,
            hourly_histogram: [0; 24],
            weekly_histogram: [0; 7],
            daily: Vec::new(),
            projects: Vec::new(),
        }
    }

    fn export_with_model(model: &str) -> SanitizedExport {
        let mut per_source = BTreeMap::new();
        per_source.insert(Source::Codex, stats_with_model(model));
        SanitizedExport {
            generated_at: Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            since: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            days_covered: 30,
            totals: stats_with_model(model),
            per_source,
            active_sources: vec![Source::Codex],
            favorite_model: Some(model.to_string()),
            peak_hour: 0,
        }
    }

    #[test]
    fn test_clean_export_passes() {
        let verified = guard().validate(&export_with_model("gpt-5-codex")).unwrap();
        assert_eq!(verified.as_export().days_covered, 30);
        assert!(verified.to_json_pretty().unwrap().contains("gpt-5-codex"));
    }

    #[test]
    fn test_check_str_kinds() {
        let guard = guard();
        assert_eq!(guard.check_str("/home/alice/work"), Some(FindingKind::HomeDirectory));
        assert_eq!(guard.check_str("/Users/alice"), Some(FindingKind::UserDirectory));
        assert_eq!(guard.check_str(r"C:\Users\Alice\x"), Some(FindingKind::UserDirectory));
        assert_eq!(guard.check_str("alice-model"), Some(FindingKind::Username));
        assert_eq!(guard.check_str("/srv/data"), Some(FindingKind::PathFragment));
        assert_eq!(guard.check_str(r"D:\repo"), Some(FindingKind::PathFragment));
        assert_eq!(guard.check_str("anthropic/claude-3"), None);
        assert_eq!(guard.check_str("2024-01-01T10:00:00Z"), None);
    }

    #[test]
    fn test_username_needs_letter_boundaries() {
        let guard = PiiGuard::new(Some("dex".to_string()), None);
        assert_eq!(guard.check_str("codex"), None);
        assert_eq!(guard.check_str("dexter"), None);
        assert_eq!(guard.check_str("dex"), Some(FindingKind::Username));
        assert_eq!(guard.check_str("my_dex_2"), Some(FindingKind::Username));
    }

    #[test]
    fn test_username_match_ignores_case() {
        let guard = PiiGuard::new(Some("alice".to_string()), None);
        assert_eq!(guard.check_str("Alice-model"), Some(FindingKind::Username));
        assert_eq!(guard.check_str("team-ALICE"), Some(FindingKind::Username));
        assert_eq!(guard.check_str("Malice"), None);
    }

    #[test]
    fn test_home_directory_name_is_an_identity() {
        let guard = PiiGuard::new(Some("root".to_string()), Some("/home/alice".to_string()));
        assert_eq!(guard.check_str("alice"), Some(FindingKind::Username));
        assert_eq!(guard.check_str("Alice-model"), Some(FindingKind::Username));
        assert_eq!(guard.check_str("root"), Some(FindingKind::Username));

        let windows = PiiGuard::new(None, Some(r"C:\Users\Bob.Smith\".to_string()));
        assert_eq!(windows.check_str("bob.smith-fine-tune"), Some(FindingKind::Username));

        let err = guard.validate(&export_with_model("alice")).unwrap_err();
        assert!(err.findings.iter().all(|f| f.kind == FindingKind::Username));
    }

    #[test]
    fn test_short_usernames_are_a_known_gap() {
        let guard = PiiGuard::new(Some("al".to_string()), None);
        assert_eq!(guard.check_str("al"), None);
        assert_eq!(guard.check_str("model-al"), None);
        // directory forms are still caught
        assert_eq!(guard.check_str("/home/al"), Some(FindingKind::UserDirectory));
    }

    #[test]
    fn test_findings_never_echo_the_value() {
        let err = guard()
            .validate(&export_with_model("/home/alice/proj"))
            .unwrap_err();
        // token_totals key twice plus favorite_model
        assert_eq!(err.findings.len(), 3);
        for finding in &err.findings {
            assert!(!finding.location.contains("alice"), "{}", finding.location);
            assert!(!finding.to_string().contains("alice"));
        }
        assert!(err.findings.iter().any(|f| f.location == "$.favorite_model"));
        assert!(err.findings.iter().any(|f| f.location == "$.totals.token_totals.<key #0>"));
        assert!(err.to_string().starts_with("push aborted: potential PII detected"));
    }

    #[test]
    fn test_violation_converts_to_crate_error() {
        let err = guard().validate(&export_with_model("alice")).unwrap_err();
        let converted: VibeclockError = err.into();
        assert!(matches!(converted, VibeclockError::PiiDetected { findings: 3 }));
    }

    #[test]
    fn test_root_home_is_ignored() {
        let guard = PiiGuard::new(None, Some("/".to_string()));
        assert_eq!(guard.check_str("a/b"), None);
    }
}
