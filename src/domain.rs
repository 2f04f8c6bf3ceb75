//! Donor availability and blood request lifecycle.
//!
//! Everything here is pure: functions take a snapshot plus `now` and return
//! either the new state to persist or a `LifecycleError`. Handlers do the I/O.

use thiserror::Error;

use crate::models::RequestStatus;

pub mod availability;
pub mod notification;
pub mod request_flow;

use request_flow::RequestAction;

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("You are not authorized to {action} this request")]
    NotParty { action: RequestAction },

    #[error("Request is not {}", .action.required_status())]
    InvalidState {
        action: RequestAction,
        status: RequestStatus,
    },

    #[error("Donor is not available for donation")]
    DonorUnavailable,

    #[error("You cannot send a blood request to yourself")]
    SelfRequest,

    #[error("You already have a pending request to this donor")]
    DuplicatePending,
}
