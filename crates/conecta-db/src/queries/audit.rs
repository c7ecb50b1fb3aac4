use anyhow::Result;
use conecta_types::models::AuditAction;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params_from_iter};

use super::parse_col;
use crate::models::{AuditLogRow, RoleChange, RoleRow};
use crate::repository::{AuditLogFilter, RoleAuditLogRepository};
use crate::{Database, now_ts};

const AUDIT_COLUMNS: &str =
    "id, user_id, role_id, role_name, action, performed_by, reason, metadata, created_at";

/// Appends one entry. The only write path into `role_audit_log`.
pub(crate) fn append_audit(
    conn: &Connection,
    change: &RoleChange<'_>,
    role: &RoleRow,
    action: AuditAction,
) -> Result<AuditLogRow> {
    let metadata = change.metadata.map(serde_json::to_string).transpose()?;
    let created_at = now_ts();

    conn.execute(
        "INSERT INTO role_audit_log
            (user_id, role_id, role_name, action, performed_by, reason, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            change.user_id,
            role.id,
            role.name.as_str(),
            action.as_str(),
            change.performed_by,
            change.reason,
            metadata,
            created_at,
        ],
    )?;

    Ok(AuditLogRow {
        id: conn.last_insert_rowid(),
        user_id: change.user_id.to_string(),
        role_id: role.id,
        role_name: role.name,
        action,
        performed_by: change.performed_by.to_string(),
        reason: change.reason.map(str::to_string),
        metadata: change.metadata.cloned(),
        created_at,
    })
}

/// Builds the shared `WHERE` clause so `find_all` and `count` can never
/// disagree on the predicate.
fn where_clause(filter: &AuditLogFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let mut push = |column_op: &str, value: Value| {
        params.push(value);
        clauses.push(format!("{} ?{}", column_op, params.len()));
    };

    if let Some(user_id) = &filter.user_id {
        push("user_id =", Value::Text(user_id.clone()));
    }
    if let Some(role_id) = filter.role_id {
        push("role_id =", Value::Integer(role_id));
    }
    if let Some(action) = filter.action {
        push("action =", Value::Text(action.as_str().to_string()));
    }
    if let Some(performed_by) = &filter.performed_by {
        push("performed_by =", Value::Text(performed_by.clone()));
    }
    if let Some(from) = &filter.from {
        push("created_at >=", Value::Text(from.clone()));
    }
    if let Some(to) = &filter.to {
        push("created_at <=", Value::Text(to.clone()));
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (sql, params)
}

impl RoleAuditLogRepository for Database {
    fn find_all(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogRow>> {
        let (where_sql, mut params) = where_clause(filter);
        let (limit, offset) = filter.page();
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT {} FROM role_audit_log {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            AUDIT_COLUMNS,
            where_sql,
            params.len() - 1,
            params.len()
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_audit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn count(&self, filter: &AuditLogFilter) -> Result<u64> {
        let (where_sql, params) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM role_audit_log {}", where_sql);

        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

fn map_audit(row: &Row<'_>) -> rusqlite::Result<AuditLogRow> {
    let metadata = row
        .get::<_, Option<String>>(7)?
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(AuditLogRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        role_id: row.get(2)?,
        role_name: parse_col(row, 3)?,
        action: parse_col(row, 4)?,
        performed_by: row.get(5)?,
        reason: row.get(6)?,
        metadata,
        created_at: row.get(8)?,
    })
}
