//! Build run records and the lifecycle state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Build run status.
///
/// A run starts `Running` and moves exactly once to `Completed` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum BuildStatus {
    Running,
    Completed,
    Failed,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Completed) | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown build status '{other}'")),
        }
    }
}

/// What started a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BuildTrigger {
    /// Admin dashboard button.
    Admin,
    /// External cron hitting the rebuild endpoint.
    Cron,
    /// The daemon's own interval scheduler.
    Schedule,
}

impl BuildTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Cron => "cron",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for BuildTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "cron" => Ok(Self::Cron),
            "schedule" => Ok(Self::Schedule),
            other => Err(format!("unknown build trigger '{other}'")),
        }
    }
}

/// One persisted build attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BuildRun {
    pub id: i64,
    pub status: BuildStatus,
    pub trigger: BuildTrigger,
    pub started_at: u64,
    pub completed_at: Option<u64>,
    pub seeders_count: Option<u64>,
    pub nodes_count: Option<u64>,
    /// Per-key fetch failures tolerated during the run.
    pub fetch_failures: Option<u64>,
    pub max_depth: u32,
    /// Set only when `status` is `Failed`.
    pub error_message: Option<String>,
}

/// Result of a build request, as returned to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BuildOutcome {
    pub success: bool,
    pub nodes_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    pub fn completed(run_id: i64, nodes_count: u64) -> Self {
        Self {
            success: true,
            nodes_count,
            run_id: Some(run_id),
            error: None,
        }
    }

    pub fn failed(run_id: Option<i64>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            nodes_count: 0,
            run_id,
            error: Some(error.into()),
        }
    }
}
