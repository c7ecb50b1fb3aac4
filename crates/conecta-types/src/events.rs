use serde::{Deserialize, Serialize};

use crate::models::InterestStatus;

/// Things that happen in the community that someone should hear about by
/// email. Rendering and delivery live in the API crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotificationEvent {
    /// A new member finished signing up
    Welcome { name: String },

    /// Someone asked to connect with the recipient
    ConnectionRequested { requester_name: String },

    /// A member expressed interest in the recipient's opportunity
    InterestReceived {
        opportunity_title: String,
        applicant_name: String,
        message: String,
    },

    /// The creator accepted or rejected the recipient's interest
    InterestReviewed {
        opportunity_title: String,
        status: InterestStatus,
    },

    /// A password reset was requested for the recipient's account
    PasswordReset { reset_url: String },
}

impl NotificationEvent {
    /// Short machine name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::ConnectionRequested { .. } => "connection_requested",
            Self::InterestReceived { .. } => "interest_received",
            Self::InterestReviewed { .. } => "interest_reviewed",
            Self::PasswordReset { .. } => "password_reset",
        }
    }
}
