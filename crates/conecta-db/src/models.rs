//! Database row types. These map directly to SQLite rows and stay distinct
//! from the conecta-types API models to keep the DB layer independent.
//! Ids and timestamps are kept as stored text; status columns are parsed.

use conecta_types::completion::{ProfileFields, completion_percentage};
use conecta_types::models::{
    AuditAction, ConnectionStatus, InterestStatus, OpportunityStatus, RoleName,
};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub avatar_url: Option<String>,
    pub completion: u8,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct RoleRow {
    pub id: i64,
    pub name: RoleName,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub id: String,
    pub requester_id: String,
    pub addressee_id: String,
    pub status: ConnectionStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ConnectionRow {
    pub fn other_party(&self, user_id: &str) -> &str {
        if self.requester_id == user_id {
            &self.addressee_id
        } else {
            &self.requester_id
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: String,
    pub read_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpportunityRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    pub status: OpportunityStatus,
    pub creator_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct InterestRow {
    pub id: String,
    pub opportunity_id: String,
    pub user_id: String,
    pub message: String,
    pub status: InterestStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct AuditLogRow {
    pub id: i64,
    pub user_id: String,
    pub role_id: i64,
    pub role_name: RoleName,
    pub action: AuditAction,
    pub performed_by: String,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

/// Fields written when a profile is created.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub completion: u8,
}

/// Editable profile columns. `None` clears the column.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn from_row(row: &UserRow) -> Self {
        Self {
            name: row.name.clone(),
            bio: row.bio.clone(),
            location: row.location.clone(),
            skills: row.skills.clone(),
            interests: row.interests.clone(),
            avatar_url: row.avatar_url.clone(),
        }
    }

    pub fn completion(&self) -> u8 {
        completion_percentage(&ProfileFields {
            name: Some(&self.name),
            bio: self.bio.as_deref(),
            location: self.location.as_deref(),
            avatar_url: self.avatar_url.as_deref(),
            skills: &self.skills,
            interests: &self.interests,
        })
    }
}

/// A profile row before and after an edit.
#[derive(Debug, Clone)]
pub struct ProfileEdit {
    pub previous: UserRow,
    pub current: UserRow,
}

/// Role change to apply together with its audit entry.
pub struct RoleChange<'a> {
    pub user_id: &'a str,
    pub role: RoleName,
    pub performed_by: &'a str,
    pub reason: Option<&'a str>,
    pub metadata: Option<&'a serde_json::Value>,
}
