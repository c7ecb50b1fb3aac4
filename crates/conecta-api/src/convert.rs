//! Row to response conversions. Stored ids and timestamps are trusted but
//! not assumed: a corrupt value is logged and replaced by a default instead
//! of failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use conecta_db::models::{
    AuditLogRow, ConnectionRow, InterestRow, MessageRow, OpportunityRow, RoleRow, UserRow,
};
use conecta_types::api::{
    AuditLogEntry, ConnectionResponse, InterestResponse, MessageResponse, OpportunityResponse,
    Profile, Role, UserSummary,
};
use conecta_types::models::RoleName;

pub fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub fn timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", what, raw, e);
            DateTime::default()
        })
}

pub fn profile(row: UserRow, roles: Vec<RoleName>) -> Profile {
    Profile {
        id: uuid(&row.id, "user id"),
        created_at: timestamp(&row.created_at, "user created_at"),
        updated_at: timestamp(&row.updated_at, "user updated_at"),
        email: row.email,
        name: row.name,
        bio: row.bio,
        location: row.location,
        skills: row.skills,
        interests: row.interests,
        avatar_url: row.avatar_url,
        completion: row.completion,
        roles,
    }
}

pub fn summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: uuid(&row.id, "user id"),
        name: row.name.clone(),
        avatar_url: row.avatar_url.clone(),
    }
}

pub fn role(row: RoleRow) -> Role {
    Role {
        id: row.id,
        name: row.name,
        description: row.description,
    }
}

pub fn connection(row: ConnectionRow, other_user: Option<UserSummary>) -> ConnectionResponse {
    ConnectionResponse {
        id: uuid(&row.id, "connection id"),
        requester_id: uuid(&row.requester_id, "requester_id"),
        addressee_id: uuid(&row.addressee_id, "addressee_id"),
        status: row.status,
        other_user,
        created_at: timestamp(&row.created_at, "connection created_at"),
        updated_at: timestamp(&row.updated_at, "connection updated_at"),
    }
}

pub fn message(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: uuid(&row.id, "message id"),
        sender_id: uuid(&row.sender_id, "sender_id"),
        recipient_id: uuid(&row.recipient_id, "recipient_id"),
        created_at: timestamp(&row.created_at, "message created_at"),
        read_at: row.read_at.as_deref().map(|ts| timestamp(ts, "message read_at")),
        content: row.content,
    }
}

pub fn opportunity(row: OpportunityRow) -> OpportunityResponse {
    OpportunityResponse {
        id: uuid(&row.id, "opportunity id"),
        creator_id: uuid(&row.creator_id, "creator_id"),
        created_at: timestamp(&row.created_at, "opportunity created_at"),
        updated_at: timestamp(&row.updated_at, "opportunity updated_at"),
        title: row.title,
        description: row.description,
        skills: row.skills,
        status: row.status,
    }
}

pub fn interest(row: InterestRow) -> InterestResponse {
    InterestResponse {
        id: uuid(&row.id, "interest id"),
        opportunity_id: uuid(&row.opportunity_id, "opportunity_id"),
        user_id: uuid(&row.user_id, "interest user_id"),
        created_at: timestamp(&row.created_at, "interest created_at"),
        updated_at: timestamp(&row.updated_at, "interest updated_at"),
        message: row.message,
        status: row.status,
    }
}

pub fn audit_entry(row: AuditLogRow) -> AuditLogEntry {
    AuditLogEntry {
        id: row.id,
        user_id: uuid(&row.user_id, "audit user_id"),
        role_id: row.role_id,
        role_name: row.role_name,
        action: row.action,
        performed_by: uuid(&row.performed_by, "audit performed_by"),
        created_at: timestamp(&row.created_at, "audit created_at"),
        reason: row.reason,
        metadata: row.metadata,
    }
}
