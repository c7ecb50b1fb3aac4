//! Admin-only read access to the role audit log.

use tracing::{debug, warn};

use conecta_db::models::AuditLogRow;
use conecta_db::{AdminDirectory, AuditLogFilter, RoleAuditLogRepository};

#[derive(Debug, thiserror::Error)]
pub enum AuditLogError {
    #[error("Admin role required to read the role audit log")]
    NotAdmin,
    #[error("Failed to read the role audit log")]
    Repository(#[source] anyhow::Error),
}

#[derive(Debug)]
pub struct AuditLogResult {
    pub entries: Vec<AuditLogRow>,
    pub total: u64,
}

/// Lists and counts audit entries for admins. Any other caller gets
/// `AuditLogError::NotAdmin` and the repository is never queried.
pub struct GetRoleAuditLogUseCase<R> {
    repo: R,
}

impl<R> GetRoleAuditLogUseCase<R>
where
    R: RoleAuditLogRepository + AdminDirectory,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn execute(
        &self,
        caller_id: &str,
        filter: &AuditLogFilter,
    ) -> Result<AuditLogResult, AuditLogError> {
        let is_admin = self
            .repo
            .is_admin(caller_id)
            .map_err(AuditLogError::Repository)?;
        if !is_admin {
            warn!("User {} tried to read the role audit log", caller_id);
            return Err(AuditLogError::NotAdmin);
        }

        let entries = self
            .repo
            .find_all(filter)
            .map_err(AuditLogError::Repository)?;
        let total = self.repo.count(filter).map_err(AuditLogError::Repository)?;

        debug!("Audit log page: {} of {} entries", entries.len(), total);
        Ok(AuditLogResult { entries, total })
    }
}
