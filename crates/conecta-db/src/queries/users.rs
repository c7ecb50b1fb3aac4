use anyhow::Result;
use conecta_types::models::RoleName;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};
use tracing::info;

use super::roles::assign_in;
use super::{list_col, list_json, placeholders};
use crate::models::{NewUser, ProfileEdit, ProfileUpdate, RoleChange, UserRow};
use crate::{Database, OptionalExt, now_ts};

const USER_COLUMNS: &str = "id, email, password, name, bio, location, skills, interests, \
                            avatar_url, completion, created_at, updated_at";

/// Directory search. All present fields must match.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<RoleName>,
    pub skill: Option<String>,
    /// Case-insensitive substring of name, bio or location.
    pub query: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Database {
    // -- Users --

    /// Inserts the user with their initial role. Returns `None` when the
    /// email is already registered. With `bootstrap_admin` the user also
    /// receives the admin role in the same transaction.
    pub fn create_user(
        &self,
        new: &NewUser<'_>,
        role: RoleName,
        bootstrap_admin: bool,
    ) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            if query_user_by_email(tx, new.email)?.is_some() {
                return Ok(None);
            }

            let now = now_ts();
            tx.execute(
                "INSERT INTO users (id, email, password, name, completion, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![new.id, new.email, new.password_hash, new.name, new.completion, now],
            )?;

            assign_in(
                tx,
                &RoleChange {
                    user_id: new.id,
                    role,
                    performed_by: new.id,
                    reason: Some("signup"),
                    metadata: None,
                },
            )?;

            if bootstrap_admin {
                info!("Granting admin role to bootstrap email {}", new.email);
                assign_in(
                    tx,
                    &RoleChange {
                        user_id: new.id,
                        role: RoleName::Admin,
                        performed_by: new.id,
                        reason: Some("bootstrap admin email"),
                        metadata: None,
                    },
                )?;
            }

            query_user_by_id(tx, new.id)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Batch-fetch users for a set of ids. Unknown ids are skipped.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE id IN ({})",
                USER_COLUMNS,
                placeholders(ids.len(), 1)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<String> = Vec::new();
            let mut params: Vec<Value> = Vec::new();

            if let Some(role) = filter.role {
                params.push(Value::Text(role.as_str().to_string()));
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                             WHERE ur.user_id = users.id AND r.name = ?{})",
                    params.len()
                ));
            }
            if let Some(skill) = &filter.skill {
                params.push(Value::Text(skill.trim().to_lowercase()));
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM json_each(users.skills) WHERE lower(json_each.value) = ?{})",
                    params.len()
                ));
            }
            if let Some(q) = &filter.query {
                params.push(Value::Text(format!("%{}%", q.trim().to_lowercase())));
                let n = params.len();
                clauses.push(format!(
                    "(lower(name) LIKE ?{n} OR lower(COALESCE(bio, '')) LIKE ?{n}
                      OR lower(COALESCE(location, '')) LIKE ?{n})"
                ));
            }

            let where_sql = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };

            params.push(Value::Integer(filter.limit as i64));
            params.push(Value::Integer(filter.offset as i64));
            let sql = format!(
                "SELECT {} FROM users {} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
                USER_COLUMNS,
                where_sql,
                params.len() - 1,
                params.len()
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Read-modify-write of the editable columns in one transaction. `edit`
    /// sees the stored values and the completion score is recomputed from
    /// the result. Returns `None` for an unknown id.
    pub fn update_profile<F>(&self, id: &str, edit: F) -> Result<Option<ProfileEdit>>
    where
        F: FnOnce(&mut ProfileUpdate),
    {
        self.with_tx(|tx| {
            let Some(previous) = query_user_by_id(tx, id)? else {
                return Ok(None);
            };

            let mut update = ProfileUpdate::from_row(&previous);
            edit(&mut update);

            tx.execute(
                "UPDATE users
                 SET name = ?2, bio = ?3, location = ?4, skills = ?5, interests = ?6,
                     avatar_url = ?7, completion = ?8, updated_at = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.name,
                    update.bio,
                    update.location,
                    list_json(&update.skills)?,
                    list_json(&update.interests)?,
                    update.avatar_url,
                    update.completion(),
                    now_ts(),
                ],
            )?;

            Ok(query_user_by_id(tx, id)?.map(|current| ProfileEdit { previous, current }))
        })
    }

    /// Removes the account. Owned rows go with it through `ON DELETE CASCADE`;
    /// audit entries stay.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

pub(crate) fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    conn.query_row(&sql, [email], map_user).optional()
}

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        bio: row.get(4)?,
        location: row.get(5)?,
        skills: list_col(row, 6)?,
        interests: list_col(row, 7)?,
        avatar_url: row.get(8)?,
        completion: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
