//! Contracts the use-case layer depends on. `Database` implements them; tests
//! may substitute their own.

use anyhow::Result;
use conecta_types::models::AuditAction;

use crate::models::AuditLogRow;

pub const DEFAULT_AUDIT_LIMIT: u32 = 50;
pub const MAX_AUDIT_LIMIT: u32 = 200;

/// Conjunction of optional predicates over the role audit log. `from` and
/// `to` are inclusive bounds on `created_at` in stored timestamp format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogFilter {
    pub user_id: Option<String>,
    pub role_id: Option<i64>,
    pub action: Option<AuditAction>,
    pub performed_by: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditLogFilter {
    /// Effective `(limit, offset)` after defaults and clamping.
    pub fn page(&self) -> (u32, u32) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT);
        (limit, self.offset.unwrap_or(0))
    }
}

pub trait RoleAuditLogRepository {
    /// Matching entries, newest first. Entries sharing a timestamp come out
    /// in reverse insertion order.
    fn find_all(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogRow>>;

    /// Number of entries matching the filter, ignoring pagination.
    fn count(&self, filter: &AuditLogFilter) -> Result<u64>;
}

pub trait AdminDirectory {
    fn is_admin(&self, user_id: &str) -> Result<bool>;
}

impl<T: RoleAuditLogRepository + ?Sized> RoleAuditLogRepository for &T {
    fn find_all(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogRow>> {
        (**self).find_all(filter)
    }

    fn count(&self, filter: &AuditLogFilter) -> Result<u64> {
        (**self).count(filter)
    }
}

impl<T: AdminDirectory + ?Sized> AdminDirectory for &T {
    fn is_admin(&self, user_id: &str) -> Result<bool> {
        (**self).is_admin(user_id)
    }
}
