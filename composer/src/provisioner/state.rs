use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle state of one provisioned resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Pending,
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    UpdateInProgress,
    UpdateComplete,
    UpdateFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Pending => "PENDING",
            State::CreateInProgress => "CREATE_IN_PROGRESS",
            State::CreateComplete => "CREATE_COMPLETE",
            State::CreateFailed => "CREATE_FAILED",
            State::UpdateInProgress => "UPDATE_IN_PROGRESS",
            State::UpdateComplete => "UPDATE_COMPLETE",
            State::UpdateFailed => "UPDATE_FAILED",
            State::DeleteInProgress => "DELETE_IN_PROGRESS",
            State::DeleteComplete => "DELETE_COMPLETE",
            State::DeleteFailed => "DELETE_FAILED",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            State::CreateFailed | State::UpdateFailed | State::DeleteFailed
        )
    }

    /// States in which the resource exists and carries an applied bag
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            State::CreateComplete | State::UpdateComplete | State::UpdateFailed
        )
    }
}

/// One recorded state transition
#[derive(Clone, Debug)]
pub struct Transition {
    pub from: State,
    pub to: State,
    pub at: DateTime<Utc>,
    pub request_id: Option<Uuid>,
}
