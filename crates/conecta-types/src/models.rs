use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Status columns are stored as lowercase text. This keeps the SQL side,
/// the JSON side and `Display` in agreement.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(RoleName, "role", {
    Admin => "admin",
    Mentor => "mentor",
    Emprendedor => "emprendedor",
});

impl RoleName {
    /// Roles a user may pick for themselves at signup.
    pub fn is_self_assignable(&self) -> bool {
        !matches!(self, RoleName::Admin)
    }
}

text_enum!(ConnectionStatus, "connection status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

text_enum!(InterestStatus, "interest status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Withdrawn => "withdrawn",
});

text_enum!(OpportunityStatus, "opportunity status", {
    Open => "open",
    Closed => "closed",
});

text_enum!(AuditAction, "audit action", {
    Assigned => "assigned",
    Removed => "removed",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_matches_serde() {
        for status in InterestStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<InterestStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "superuser".parse::<RoleName>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.to_string(), "unknown role `superuser`");
    }

    #[test]
    fn admin_is_not_self_assignable() {
        assert!(!RoleName::Admin.is_self_assignable());
        assert!(RoleName::Mentor.is_self_assignable());
        assert!(RoleName::Emprendedor.is_self_assignable());
    }
}
