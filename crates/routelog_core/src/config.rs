//! Core configuration.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use routelog_storage::MAX_LIST_LIMIT;

/// Configuration for key enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerConfig {
    /// Keys requested per `list` call. Clamped to `1..=MAX_LIST_LIMIT`.
    pub page_size: usize,
    /// Maximum pages a single enumeration may fetch (`None` = unbounded).
    pub max_pages: Option<usize>,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_LIST_LIMIT,
            max_pages: None,
        }
    }
}

impl PagerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, MAX_LIST_LIMIT);
        self
    }

    /// Sets the page ceiling.
    #[must_use]
    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = Some(max);
        self
    }
}

/// What an export does when a listed key cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFailurePolicy {
    /// Abort the whole export on the first read error.
    #[default]
    FailFast,
    /// Leave the key out and report it in the export result.
    SkipUnreadable,
}

/// Configuration for full-store exports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportConfig {
    /// Enumeration settings.
    pub pager: PagerConfig,
    /// Read failure handling.
    pub on_read_failure: ReadFailurePolicy,
}

impl ExportConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets enumeration settings.
    #[must_use]
    pub fn with_pager(mut self, pager: PagerConfig) -> Self {
        self.pager = pager;
        self
    }

    /// Sets read failure handling.
    #[must_use]
    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.on_read_failure = policy;
        self
    }
}

/// Daily trigger time for scheduled backups, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSchedule {
    at: NaiveTime,
}

impl BackupSchedule {
    /// Fires every day at `hour:minute` UTC.
    ///
    /// # Errors
    ///
    /// Returns an error if the hour or minute is out of range.
    pub fn daily_at(hour: u32, minute: u32) -> CoreResult<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            CoreError::invalid_config(format!("invalid backup time {hour:02}:{minute:02}"))
        })?;
        Ok(Self { at })
    }

    /// Returns the trigger time of day.
    pub fn time(&self) -> NaiveTime {
        self.at
    }

    /// Returns the first trigger strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }
}

impl Default for BackupSchedule {
    fn default() -> Self {
        Self {
            at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn pager_config_clamps_page_size() {
        assert_eq!(PagerConfig::new().with_page_size(0).page_size, 1);
        assert_eq!(PagerConfig::new().with_page_size(5000).page_size, MAX_LIST_LIMIT);
        assert_eq!(PagerConfig::new().with_max_pages(4).max_pages, Some(4));
    }

    #[test]
    fn export_defaults_fail_fast() {
        let config = ExportConfig::default();
        assert_eq!(config.on_read_failure, ReadFailurePolicy::FailFast);
        assert_eq!(config.pager.max_pages, None);
    }

    #[test]
    fn default_schedule_is_three_am() {
        let schedule = BackupSchedule::default();
        assert_eq!(schedule, BackupSchedule::daily_at(3, 0).unwrap());
    }

    #[test]
    fn next_trigger_same_day() {
        let schedule = BackupSchedule::daily_at(3, 0).unwrap();
        let next = schedule.next_after(at("2024-05-01T01:15:00Z"));
        assert_eq!(next, at("2024-05-01T03:00:00Z"));
    }

    #[test]
    fn next_trigger_rolls_to_tomorrow() {
        let schedule = BackupSchedule::daily_at(3, 0).unwrap();
        assert_eq!(
            schedule.next_after(at("2024-05-01T03:00:00Z")),
            at("2024-05-02T03:00:00Z")
        );
        assert_eq!(
            schedule.next_after(at("2024-12-31T23:59:00Z")),
            at("2025-01-01T03:00:00Z")
        );
    }

    #[test]
    fn invalid_schedule_rejected() {
        assert!(BackupSchedule::daily_at(24, 0).is_err());
        assert!(BackupSchedule::daily_at(3, 60).is_err());
    }
}
