//! State machine for getting one record from a page into the library.
//!
//! ```text
//! Idle -> Extracting -> AwaitingReview -> Submitting -> Succeeded | Failed
//!                        |    ^
//!                        v    |
//!                     Authenticating
//! ```
//!
//! `Failed` can go back to `AwaitingReview` for a manual retry, and any
//! finished or reviewed record can be dismissed back to `Idle`.

use crate::error::FlowError;
use crate::record::{CreatedManga, MangaRecord, ReviewEdits};

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    Extracting,
    AwaitingReview(MangaRecord),
    Authenticating(MangaRecord),
    Submitting(MangaRecord),
    Succeeded(CreatedManga),
    Failed { record: MangaRecord, message: String },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Idle => "Idle",
            FlowState::Extracting => "Extracting",
            FlowState::AwaitingReview(_) => "AwaitingReview",
            FlowState::Authenticating(_) => "Authenticating",
            FlowState::Submitting(_) => "Submitting",
            FlowState::Succeeded(_) => "Succeeded",
            FlowState::Failed { .. } => "Failed",
        }
    }

    /// The record being worked on, if there is one.
    pub fn record(&self) -> Option<&MangaRecord> {
        match self {
            FlowState::AwaitingReview(record)
            | FlowState::Authenticating(record)
            | FlowState::Submitting(record)
            | FlowState::Failed { record, .. } => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SubmissionFlow {
    state: FlowState,
}

impl Default for SubmissionFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Moves to the state built by `f`, or stays put if `f` rejects the current one.
    fn advance<F>(&mut self, to: &'static str, f: F) -> Result<(), FlowError>
    where
        F: FnOnce(FlowState) -> Result<FlowState, FlowState>,
    {
        let current = std::mem::replace(&mut self.state, FlowState::Idle);
        let from = current.name();
        match f(current) {
            Ok(next) => {
                tracing::debug!(from, to, "flow transition");
                self.state = next;
                Ok(())
            }
            Err(unchanged) => {
                self.state = unchanged;
                Err(FlowError::InvalidTransition { from, to })
            }
        }
    }

    pub fn begin_extraction(&mut self) -> Result<(), FlowError> {
        self.advance("Extracting", |state| match state {
            FlowState::Idle => Ok(FlowState::Extracting),
            other => Err(other),
        })
    }

    pub fn extracted(&mut self, record: MangaRecord) -> Result<(), FlowError> {
        self.advance("AwaitingReview", |state| match state {
            FlowState::Extracting => Ok(FlowState::AwaitingReview(record)),
            other => Err(other),
        })
    }

    /// Applies reviewer edits to the record under review.
    pub fn edit(&mut self, edits: &ReviewEdits) -> Result<(), FlowError> {
        match &mut self.state {
            FlowState::AwaitingReview(record) => {
                record.apply(edits);
                Ok(())
            }
            other => Err(FlowError::InvalidTransition {
                from: other.name(),
                to: "AwaitingReview",
            }),
        }
    }

    pub fn begin_authentication(&mut self) -> Result<(), FlowError> {
        self.advance("Authenticating", |state| match state {
            FlowState::AwaitingReview(record) => Ok(FlowState::Authenticating(record)),
            other => Err(other),
        })
    }

    /// Returns to review once a token is available, or the attempt was abandoned.
    pub fn end_authentication(&mut self) -> Result<(), FlowError> {
        self.advance("AwaitingReview", |state| match state {
            FlowState::Authenticating(record) => Ok(FlowState::AwaitingReview(record)),
            other => Err(other),
        })
    }

    /// Starts submitting and returns the record to send.
    pub fn begin_submission(&mut self) -> Result<MangaRecord, FlowError> {
        self.advance("Submitting", |state| match state {
            FlowState::AwaitingReview(record) => Ok(FlowState::Submitting(record)),
            other => Err(other),
        })?;
        match &self.state {
            FlowState::Submitting(record) => Ok(record.clone()),
            other => Err(FlowError::InvalidTransition {
                from: other.name(),
                to: "Submitting",
            }),
        }
    }

    pub fn succeeded(&mut self, created: CreatedManga) -> Result<(), FlowError> {
        self.advance("Succeeded", |state| match state {
            FlowState::Submitting(_) => Ok(FlowState::Succeeded(created)),
            other => Err(other),
        })
    }

    /// Records a failed submission, keeping the record for a retry.
    pub fn failed(&mut self, message: impl Into<String>) -> Result<(), FlowError> {
        let message = message.into();
        self.advance("Failed", |state| match state {
            FlowState::Submitting(record) => Ok(FlowState::Failed { record, message }),
            other => Err(other),
        })
    }

    pub fn retry(&mut self) -> Result<(), FlowError> {
        self.advance("AwaitingReview", |state| match state {
            FlowState::Failed { record, .. } => Ok(FlowState::AwaitingReview(record)),
            other => Err(other),
        })
    }

    pub fn dismiss(&mut self) -> Result<(), FlowError> {
        self.advance("Idle", |state| match state {
            FlowState::AwaitingReview(_) | FlowState::Succeeded(_) | FlowState::Failed { .. } => {
                Ok(FlowState::Idle)
            }
            other => Err(other),
        })
    }
}
