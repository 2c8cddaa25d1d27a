use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default block color applied when the stored row carries none.
pub const DEFAULT_BLOCK_COLOR: &str = "#3b82f6";

/// Minimum block granularity: 30 minutes, expressed in decimal hours.
pub const MIN_BLOCK_DURATION: f64 = 0.5;

/// A scheduled interval on the visible day grid.
///
/// `day` is a 0-based index into the currently visible window, not an
/// absolute weekday. `start_time`/`end_time` are decimal hours and may
/// exceed 24 for times past midnight that belong to the previous visible
/// day (the 4 AM day-boundary convention).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: String,
    pub day: u32,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_BLOCK_COLOR.to_string()
}

impl Block {
    /// Edit-time invariant check. The store does not re-validate this.
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        if self.end_time < self.start_time + MIN_BLOCK_DURATION {
            return Err(format!(
                "block.end_time must be at least {MIN_BLOCK_DURATION} hours after block.start_time"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepeatKind {
    /// Fires on a set of weekday numbers, 0=Sunday..6=Saturday.
    Weekly { weekdays: Vec<u8> },
    /// Fires every N days starting from an anchor date.
    Interval {
        interval_days: u32,
        start_date: NaiveDate,
    },
}

/// A recurrence template. Not itself renderable; expands into Block
/// instances for every visible date its schedule matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepeatRule {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(flatten)]
    pub kind: RepeatKind,
}

impl RepeatRule {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "rule.id")?;
        if self.end_time <= self.start_time {
            return Err("rule.end_time must be after rule.start_time".to_string());
        }
        match &self.kind {
            RepeatKind::Weekly { weekdays } => {
                if weekdays.is_empty() {
                    return Err("rule.weekdays must not be empty".to_string());
                }
                if weekdays.iter().any(|weekday| *weekday > 6) {
                    return Err("rule.weekdays values must be 0..=6".to_string());
                }
            }
            RepeatKind::Interval { interval_days, .. } => {
                if *interval_days < 1 {
                    return Err("rule.interval_days must be >= 1".to_string());
                }
            }
        }
        Ok(())
    }

    /// Whether this rule fires on the given calendar date.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        match &self.kind {
            RepeatKind::Weekly { weekdays } => {
                let weekday = date.weekday().num_days_from_sunday() as u8;
                weekdays.contains(&weekday)
            }
            RepeatKind::Interval {
                interval_days,
                start_date,
            } => {
                if *interval_days == 0 || date < *start_date {
                    return false;
                }
                (date - *start_date).num_days() % (*interval_days as i64) == 0
            }
        }
    }

    /// Deterministic instance id for the expansion of this rule on `date`.
    /// Re-running expansion over the same window must reproduce the same
    /// ids, which is what makes the pass idempotent.
    pub fn instance_id(&self, date: NaiveDate) -> String {
        format!("{}:{}", self.id, date.format("%Y-%m-%d"))
    }
}

/// Read-only projection of a calendar date into the visible window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayInfo {
    pub short: String,
    pub num: u32,
    pub date: NaiveDate,
}

/// Opaque identity of the signed-in user, supplied by the host application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
}

/// Explicitly passed session context; created at session start and torn
/// down at sign-out. No user means an empty block set and no persistence
/// calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub user: Option<UserIdentity>,
}

impl SessionContext {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity { id: user_id.into() }),
        }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
