use anyhow::{Result, anyhow};
use conecta_types::models::{AuditAction, RoleName};
use rusqlite::{Connection, Row, params_from_iter};

use super::audit::append_audit;
use super::users::query_user_by_id;
use super::{parse_col, placeholders};
use crate::models::{AuditLogRow, RoleChange, RoleRow};
use crate::repository::AdminDirectory;
use crate::{Database, OptionalExt, RoleChangeError, now_ts};

impl Database {
    // -- Roles --

    pub fn list_roles(&self) -> Result<Vec<RoleRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, description FROM roles ORDER BY id")?;
            let rows = stmt
                .query_map([], map_role)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn roles_for_user(&self, user_id: &str) -> Result<Vec<RoleName>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                 WHERE ur.user_id = ?1 ORDER BY r.id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| parse_col(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch `(user_id, role)` pairs for a set of users.
    pub fn roles_for_users(&self, user_ids: &[String]) -> Result<Vec<(String, RoleName)>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT ur.user_id, r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                 WHERE ur.user_id IN ({}) ORDER BY r.id",
                placeholders(user_ids.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(user_ids.iter()), |row| {
                    Ok((row.get(0)?, parse_col(row, 1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Grants a role and appends the audit entry atomically. Returns `None`
    /// when the user does not exist.
    pub fn assign_role(&self, change: &RoleChange<'_>) -> Result<Option<AuditLogRow>> {
        self.with_tx(|tx| {
            if query_user_by_id(tx, change.user_id)?.is_none() {
                return Ok(None);
            }
            assign_in(tx, change).map(Some)
        })
    }

    /// Revokes a role and appends the audit entry atomically. Returns `None`
    /// when the user does not exist.
    pub fn remove_role(&self, change: &RoleChange<'_>) -> Result<Option<AuditLogRow>> {
        self.with_tx(|tx| {
            if query_user_by_id(tx, change.user_id)?.is_none() {
                return Ok(None);
            }
            if change.role == RoleName::Admin && change.user_id == change.performed_by {
                return Err(RoleChangeError::SelfDemotion.into());
            }

            let role = query_role(tx, change.role)?;
            let removed = tx.execute(
                "DELETE FROM user_roles WHERE user_id = ?1 AND role_id = ?2",
                rusqlite::params![change.user_id, role.id],
            )?;
            if removed == 0 {
                return Err(RoleChangeError::NotAssigned(change.role.to_string()).into());
            }

            append_audit(tx, change, &role, AuditAction::Removed).map(Some)
        })
    }
}

impl AdminDirectory for Database {
    fn is_admin(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                     WHERE ur.user_id = ?1 AND r.name = ?2",
                    [user_id, RoleName::Admin.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

/// Grant inside an open transaction. Shared with signup.
pub(crate) fn assign_in(conn: &Connection, change: &RoleChange<'_>) -> Result<AuditLogRow> {
    let role = query_role(conn, change.role)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![change.user_id, role.id, now_ts()],
    )?;
    if inserted == 0 {
        return Err(RoleChangeError::AlreadyAssigned(change.role.to_string()).into());
    }

    append_audit(conn, change, &role, AuditAction::Assigned)
}

fn query_role(conn: &Connection, name: RoleName) -> Result<RoleRow> {
    conn.query_row(
        "SELECT id, name, description FROM roles WHERE name = ?1",
        [name.as_str()],
        map_role,
    )
    .optional()?
    .ok_or_else(|| anyhow!("Role `{}` missing from roles table", name))
}

fn map_role(row: &Row<'_>) -> rusqlite::Result<RoleRow> {
    Ok(RoleRow {
        id: row.get(0)?,
        name: parse_col(row, 1)?,
        description: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    fn change<'a>(user_id: &'a str, role: RoleName, by: &'a str) -> RoleChange<'a> {
        RoleChange {
            user_id,
            role,
            performed_by: by,
            reason: Some("test"),
            metadata: None,
        }
    }

    #[test]
    fn assign_and_remove_write_audit_entries() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "root", RoleName::Emprendedor);
        fixtures::user(&db, "ana", RoleName::Emprendedor);

        let entry = db
            .assign_role(&change("ana", RoleName::Mentor, "root"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.action, AuditAction::Assigned);
        assert_eq!(entry.role_name, RoleName::Mentor);
        assert_eq!(entry.performed_by, "root");
        assert_eq!(
            db.roles_for_user("ana").unwrap(),
            vec![RoleName::Mentor, RoleName::Emprendedor]
        );

        let entry = db
            .remove_role(&change("ana", RoleName::Mentor, "root"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.action, AuditAction::Removed);
        assert_eq!(db.roles_for_user("ana").unwrap(), vec![RoleName::Emprendedor]);
    }

    #[test]
    fn duplicate_assignment_is_an_error_and_not_audited() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "ana", RoleName::Mentor);

        let err = db
            .assign_role(&change("ana", RoleName::Mentor, "ana"))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RoleChangeError>(),
            Some(&RoleChangeError::AlreadyAssigned("mentor".into()))
        );

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM role_audit_log", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn admin_cannot_demote_self() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "root", RoleName::Mentor);
        db.assign_role(&change("root", RoleName::Admin, "root"))
            .unwrap();
        assert!(db.is_admin("root").unwrap());

        let err = db
            .remove_role(&change("root", RoleName::Admin, "root"))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RoleChangeError>(),
            Some(&RoleChangeError::SelfDemotion)
        );
        assert!(db.is_admin("root").unwrap());
    }

    #[test]
    fn unknown_user_yields_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db
            .assign_role(&change("ghost", RoleName::Mentor, "root"))
            .unwrap()
            .is_none());
    }
}
