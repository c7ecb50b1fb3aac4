//! Transition rules for the connection and opportunity-interest workflows.
//!
//! These functions only decide; persisting the outcome is the caller's job.
//! The database layer runs them inside the same transaction that reads the
//! current row, so a decision is never made on stale state.

use crate::models::{ConnectionStatus, InterestStatus, OpportunityStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("You cannot send a connection request to yourself")]
    SelfRequest,
    #[error("A connection request between these users is already pending")]
    AlreadyPending,
    #[error("These users are already connected")]
    AlreadyConnected,
    #[error("Only the addressee can respond to a connection request")]
    NotAddressee,
    #[error("Only a participant can modify this connection")]
    NotParticipant,
    #[error("You cannot express interest in your own opportunity")]
    OwnOpportunity,
    #[error("This opportunity is closed")]
    OpportunityClosed,
    #[error("You already expressed interest in this opportunity")]
    AlreadyInterested,
    #[error("Only the opportunity creator can review interests")]
    NotCreator,
    #[error("Only the interested user can withdraw")]
    NotApplicant,
    #[error("Cannot {action} from status `{from}`")]
    InvalidState { from: &'static str, action: &'static str },
}

/// How the caller relates to a connection row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Requester,
    Addressee,
    Outsider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    Accept,
    Reject,
    Delete,
}

impl ConnectionAction {
    fn verb(&self) -> &'static str {
        match self {
            ConnectionAction::Accept => "accept",
            ConnectionAction::Reject => "reject",
            ConnectionAction::Delete => "delete",
        }
    }
}

/// What to do with the row for an unordered pair when a new request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPlan {
    Insert,
    /// A previously rejected row is reused and goes back to `pending`.
    Reopen,
}

pub fn plan_connection_request(
    requester: &str,
    addressee: &str,
    existing: Option<ConnectionStatus>,
) -> Result<RequestPlan, TransitionError> {
    if requester == addressee {
        return Err(TransitionError::SelfRequest);
    }

    match existing {
        None => Ok(RequestPlan::Insert),
        Some(ConnectionStatus::Pending) => Err(TransitionError::AlreadyPending),
        Some(ConnectionStatus::Accepted) => Err(TransitionError::AlreadyConnected),
        Some(ConnectionStatus::Rejected) => Ok(RequestPlan::Reopen),
    }
}

/// Returns the new status, or `None` when the row should be deleted.
pub fn connection_transition(
    current: ConnectionStatus,
    party: Party,
    action: ConnectionAction,
) -> Result<Option<ConnectionStatus>, TransitionError> {
    match action {
        ConnectionAction::Delete => match party {
            Party::Outsider => Err(TransitionError::NotParticipant),
            _ => Ok(None),
        },
        ConnectionAction::Accept | ConnectionAction::Reject => {
            match party {
                Party::Addressee => {}
                Party::Requester => return Err(TransitionError::NotAddressee),
                Party::Outsider => return Err(TransitionError::NotParticipant),
            }
            if current != ConnectionStatus::Pending {
                return Err(TransitionError::InvalidState {
                    from: current.as_str(),
                    action: action.verb(),
                });
            }
            Ok(Some(if action == ConnectionAction::Accept {
                ConnectionStatus::Accepted
            } else {
                ConnectionStatus::Rejected
            }))
        }
    }
}

/// How the caller relates to an interest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestActor {
    Creator,
    Applicant,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestAction {
    Accept,
    Reject,
    Withdraw,
}

impl InterestAction {
    fn verb(&self) -> &'static str {
        match self {
            InterestAction::Accept => "accept",
            InterestAction::Reject => "reject",
            InterestAction::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestPlan {
    Insert,
    /// A withdrawn interest is expressed again.
    Reopen,
}

pub fn plan_interest(
    is_creator: bool,
    opportunity: OpportunityStatus,
    existing: Option<InterestStatus>,
) -> Result<InterestPlan, TransitionError> {
    if is_creator {
        return Err(TransitionError::OwnOpportunity);
    }
    if opportunity == OpportunityStatus::Closed {
        return Err(TransitionError::OpportunityClosed);
    }

    match existing {
        None => Ok(InterestPlan::Insert),
        Some(InterestStatus::Withdrawn) => Ok(InterestPlan::Reopen),
        Some(_) => Err(TransitionError::AlreadyInterested),
    }
}

pub fn interest_transition(
    current: InterestStatus,
    actor: InterestActor,
    action: InterestAction,
) -> Result<InterestStatus, TransitionError> {
    let next = match (action, actor) {
        (InterestAction::Accept, InterestActor::Creator) => InterestStatus::Accepted,
        (InterestAction::Reject, InterestActor::Creator) => InterestStatus::Rejected,
        (InterestAction::Withdraw, InterestActor::Applicant) => InterestStatus::Withdrawn,
        (InterestAction::Withdraw, _) => return Err(TransitionError::NotApplicant),
        (_, _) => return Err(TransitionError::NotCreator),
    };

    if current != InterestStatus::Pending {
        return Err(TransitionError::InvalidState {
            from: current.as_str(),
            action: action.verb(),
        });
    }

    Ok(next)
}
