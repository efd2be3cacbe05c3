//! Wire types for admin API status jobs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state reported by the job service. Any state other than the
/// named ones is a running state; its name is kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Created,
    Running(String),
    Completed,
    Stopped,
}

impl JobState {
    /// Completed or stopped jobs have details ready and are never polled again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Stopped)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Created => "created",
            JobState::Running(name) => name,
            JobState::Completed => "completed",
            JobState::Stopped => "stopped",
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => JobState::Created,
            "completed" => JobState::Completed,
            "stopped" => JobState::Stopped,
            _ => JobState::Running(s),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLinks {
    /// URL of the job itself; polled for state, `/details` appended for results.
    #[serde(rename = "self")]
    pub self_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Response to starting a bulk status job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStart {
    pub job: JobInfo,
    pub links: JobLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobProgress {
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
}

/// Response to polling a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub links: JobLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
}

/// One resource record; keys keep the order the service sent them in.
pub type Resource = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Response to `{links.self}/details` once a job is terminal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(default)]
    pub data: JobData,
}
