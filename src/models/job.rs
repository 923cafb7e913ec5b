use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::recognition::RecognitionResult;

/// Opaque job identifier handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a recognition job.
///
/// `pending -> processing -> {done | error}` and `pending -> rejected`.
/// The last three are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Done,
    Error,
    Rejected,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error | JobState::Rejected)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Pending, JobState::Rejected)
                | (JobState::Processing, JobState::Done)
                | (JobState::Processing, JobState::Error)
        )
    }
}

/// A state change together with the payload the target state requires.
#[derive(Debug, Clone)]
pub enum JobTransition {
    Processing,
    Done(RecognitionResult),
    Error(String),
    Rejected(String),
}

impl JobTransition {
    pub fn target(&self) -> JobState {
        match self {
            JobTransition::Processing => JobState::Processing,
            JobTransition::Done(_) => JobState::Done,
            JobTransition::Error(_) => JobState::Error,
            JobTransition::Rejected(_) => JobState::Rejected,
        }
    }
}

/// Snapshot of a job as seen by readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<RecognitionResult>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    /// Apply a transition in place. Returns the rejected pair on an illegal move
    /// and leaves the job untouched.
    pub(crate) fn apply(&mut self, transition: JobTransition) -> Result<(), (JobState, JobState)> {
        let target = transition.target();
        if !self.state.can_transition_to(target) {
            return Err((self.state, target));
        }

        match transition {
            JobTransition::Processing => {}
            JobTransition::Done(result) => self.result = Some(result),
            JobTransition::Error(message) | JobTransition::Rejected(message) => {
                self.error = Some(message)
            }
        }
        self.state = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}
