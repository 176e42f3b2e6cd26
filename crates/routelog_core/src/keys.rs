//! Persisted key layout.
//!
//! ```text
//! user:{username}                       live account
//! logs:{token}                          live log collection
//! deleted:user:{username}:{millis}      account snapshot
//! deleted:logs:{token}:{millis}         log collection snapshot
//! logs-{YYYY-MM-DD}.json                backup object name
//! ```
//!
//! Snapshot timestamps are milliseconds since the epoch. Subjects may
//! themselves contain `:`, so a snapshot key is only recognised for a
//! subject when everything after the subject prefix is a decimal number.

use chrono::NaiveDate;
use std::fmt;

/// Prefix of live account keys.
pub const USER_PREFIX: &str = "user:";
/// Prefix of live log collection keys.
pub const LOGS_PREFIX: &str = "logs:";
/// Prefix shared by every snapshot key.
pub const SNAPSHOT_PREFIX: &str = "deleted:";

/// Returns the live account key for `username`.
pub fn user_key(username: &str) -> String {
    format!("{USER_PREFIX}{username}")
}

/// Returns the live log collection key for a session token.
pub fn logs_key(token: &str) -> String {
    format!("{LOGS_PREFIX}{token}")
}

/// Extracts the username from a live account key.
pub fn username_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(USER_PREFIX)
}

/// Returns the backup object name for a calendar date.
pub fn backup_name(date: NaiveDate) -> String {
    format!("logs-{}.json", date.format("%Y-%m-%d"))
}

/// What a snapshot is a copy of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotKind {
    /// An account record, keyed by username.
    User,
    /// A log collection, keyed by session token.
    Logs,
}

impl SnapshotKind {
    /// Returns the kind segment used in keys.
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotKind::User => "user",
            SnapshotKind::Logs => "logs",
        }
    }

    /// Returns the listing prefix for every snapshot of `subject`.
    pub fn prefix(self, subject: &str) -> String {
        format!("{SNAPSHOT_PREFIX}{}:{subject}:", self.as_str())
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "user" => Some(SnapshotKind::User),
            "logs" => Some(SnapshotKind::Logs),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    /// What the snapshot copies.
    pub kind: SnapshotKind,
    /// Username or token the snapshot belongs to.
    pub subject: String,
    /// Creation instant, milliseconds since the epoch.
    pub timestamp_ms: u64,
}

impl SnapshotKey {
    /// Creates a snapshot key.
    pub fn new(kind: SnapshotKind, subject: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            kind,
            subject: subject.into(),
            timestamp_ms,
        }
    }

    /// Parses `key` as a snapshot of a known kind and subject.
    ///
    /// Returns `None` when the key belongs to another subject or its
    /// timestamp suffix is not a decimal number.
    pub fn parse_for(kind: SnapshotKind, subject: &str, key: &str) -> Option<Self> {
        let suffix = key.strip_prefix(&kind.prefix(subject))?;
        let timestamp_ms = parse_millis(suffix)?;
        Some(Self::new(kind, subject, timestamp_ms))
    }

    /// Parses any snapshot key.
    ///
    /// The subject is everything between the kind and the last `:`.
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(SNAPSHOT_PREFIX)?;
        let (kind, rest) = rest.split_once(':')?;
        let kind = SnapshotKind::from_segment(kind)?;
        let (subject, suffix) = rest.rsplit_once(':')?;
        let timestamp_ms = parse_millis(suffix)?;
        Some(Self::new(kind, subject, timestamp_ms))
    }

    /// Returns the store key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SNAPSHOT_PREFIX}{}:{}:{}",
            self.kind, self.subject, self.timestamp_ms
        )
    }
}

fn parse_millis(suffix: &str) -> Option<u64> {
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_keys() {
        assert_eq!(user_key("amy"), "user:amy");
        assert_eq!(logs_key("t-1"), "logs:t-1");
        assert_eq!(username_from_key("user:amy"), Some("amy"));
        assert_eq!(username_from_key("logs:amy"), None);
    }

    #[test]
    fn snapshot_key_format() {
        let key = SnapshotKey::new(SnapshotKind::User, "amy", 1_700_000_000_000);
        assert_eq!(key.key(), "deleted:user:amy:1700000000000");
        assert_eq!(SnapshotKind::Logs.prefix("tok"), "deleted:logs:tok:");
    }

    #[test]
    fn parse_for_rejects_other_subjects() {
        // "amy:x" shares the "deleted:user:amy:" prefix with "amy".
        assert!(SnapshotKey::parse_for(SnapshotKind::User, "amy", "deleted:user:amy:x:17").is_none());
        assert!(SnapshotKey::parse_for(SnapshotKind::User, "amy", "deleted:user:bob:17").is_none());
        assert!(SnapshotKey::parse_for(SnapshotKind::User, "amy", "deleted:user:amy:").is_none());

        let parsed =
            SnapshotKey::parse_for(SnapshotKind::User, "amy", "deleted:user:amy:17").unwrap();
        assert_eq!(parsed.timestamp_ms, 17);
    }

    #[test]
    fn parse_any_snapshot_key() {
        let parsed = SnapshotKey::parse("deleted:user:amy:x:42").unwrap();
        assert_eq!(parsed.kind, SnapshotKind::User);
        assert_eq!(parsed.subject, "amy:x");
        assert_eq!(parsed.timestamp_ms, 42);

        assert!(SnapshotKey::parse("deleted:other:amy:42").is_none());
        assert!(SnapshotKey::parse("user:amy").is_none());
        assert!(SnapshotKey::parse("deleted:logs:tok:+42").is_none());
    }

    #[test]
    fn backup_names_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(backup_name(date), "logs-2024-03-07.json");
    }
}
