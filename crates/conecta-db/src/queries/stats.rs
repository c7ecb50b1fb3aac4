use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::Database;

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub users: u64,
    pub users_by_role: BTreeMap<String, u64>,
    pub connections: BTreeMap<String, u64>,
    pub opportunities: BTreeMap<String, u64>,
    pub interests: BTreeMap<String, u64>,
    pub messages: u64,
}

impl Database {
    pub fn stats(&self) -> Result<Stats> {
        self.with_conn(|conn| {
            Ok(Stats {
                users: count(conn, "SELECT COUNT(*) FROM users")?,
                users_by_role: grouped(
                    conn,
                    "SELECT r.name, COUNT(ur.user_id) FROM roles r
                     LEFT JOIN user_roles ur ON ur.role_id = r.id
                     GROUP BY r.name",
                )?,
                connections: grouped(
                    conn,
                    "SELECT status, COUNT(*) FROM connections GROUP BY status",
                )?,
                opportunities: grouped(
                    conn,
                    "SELECT status, COUNT(*) FROM opportunities GROUP BY status",
                )?,
                interests: grouped(
                    conn,
                    "SELECT status, COUNT(*) FROM opportunity_interests GROUP BY status",
                )?,
                messages: count(conn, "SELECT COUNT(*) FROM messages")?,
            })
        })
    }
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn grouped(conn: &Connection, sql: &str) -> Result<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}
