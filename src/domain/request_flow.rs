use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use super::LifecycleError;
use crate::models::{BloodRequest, RequestStatus};

/// A state change a party can ask for on an existing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Reject,
    Complete,
}

/// Which side of the request may perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Requester,
    Donor,
}

impl RequestAction {
    pub fn party(&self) -> Party {
        match self {
            RequestAction::Accept | RequestAction::Reject => Party::Donor,
            RequestAction::Complete => Party::Requester,
        }
    }

    pub fn required_status(&self) -> RequestStatus {
        match self {
            RequestAction::Accept | RequestAction::Reject => RequestStatus::Pending,
            RequestAction::Complete => RequestStatus::Accepted,
        }
    }

    pub fn target_status(&self) -> RequestStatus {
        match self {
            RequestAction::Accept => RequestStatus::Accepted,
            RequestAction::Reject => RequestStatus::Rejected,
            RequestAction::Complete => RequestStatus::Completed,
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            RequestAction::Accept => "accept",
            RequestAction::Reject => "reject",
            RequestAction::Complete => "complete",
        };
        f.write_str(verb)
    }
}

/// Legal moves only: pending -> accepted | rejected, accepted -> completed.
pub fn next_status(
    current: RequestStatus,
    action: RequestAction,
) -> Result<RequestStatus, LifecycleError> {
    if current == action.required_status() {
        Ok(action.target_status())
    } else {
        Err(LifecycleError::InvalidState {
            action,
            status: current,
        })
    }
}

/// The update to persist for one transition.
///
/// `from` is written into the UPDATE's WHERE clause so a concurrent change
/// makes the write a no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub action: RequestAction,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub donation_completed: bool,
}

/// Check who is acting, then whether the request is in the right state.
pub fn plan_transition(
    request: &BloodRequest,
    actor: Uuid,
    action: RequestAction,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    let allowed = match action.party() {
        Party::Donor => request.donor_id,
        Party::Requester => request.requester_id,
    };
    if allowed != actor {
        return Err(LifecycleError::NotParty { action });
    }

    let to = next_status(request.status, action)?;

    Ok(Transition {
        action,
        from: request.status,
        to,
        accepted_at: (action == RequestAction::Accept).then_some(now),
        completed_at: (action == RequestAction::Complete).then_some(now),
        donation_completed: action == RequestAction::Complete,
    })
}

/// Guard for creating a request; `has_pending` is whether the pair already has one open.
pub fn check_new_request(
    requester: Uuid,
    donor: Uuid,
    donor_available: bool,
    has_pending: bool,
) -> Result<(), LifecycleError> {
    if requester == donor {
        return Err(LifecycleError::SelfRequest);
    }
    if !donor_available {
        return Err(LifecycleError::DonorUnavailable);
    }
    if has_pending {
        return Err(LifecycleError::DuplicatePending);
    }
    Ok(())
}
