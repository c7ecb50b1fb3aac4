use anyhow::Result;
use conecta_types::models::OpportunityStatus;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};
use uuid::Uuid;

use super::{list_col, list_json, parse_col};
use crate::models::OpportunityRow;
use crate::{Database, OptionalExt, now_ts};

const OPPORTUNITY_COLUMNS: &str =
    "id, title, description, skills, status, creator_id, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter {
    pub status: Option<OpportunityStatus>,
    pub skill: Option<String>,
    pub creator_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Database {
    // -- Opportunities --

    pub fn create_opportunity(
        &self,
        creator_id: &str,
        title: &str,
        description: &str,
        skills: &[String],
    ) -> Result<OpportunityRow> {
        let id = Uuid::new_v4().to_string();
        let skills = list_json(skills)?;

        self.with_conn(|conn| {
            let now = now_ts();
            conn.execute(
                "INSERT INTO opportunities
                    (id, title, description, skills, status, creator_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    id,
                    title,
                    description,
                    skills,
                    OpportunityStatus::Open.as_str(),
                    creator_id,
                    now
                ],
            )?;
            query_opportunity(conn, &id)?
                .ok_or_else(|| anyhow::anyhow!("Opportunity {} vanished after insert", id))
        })
    }

    pub fn get_opportunity(&self, id: &str) -> Result<Option<OpportunityRow>> {
        self.with_conn(|conn| query_opportunity(conn, id))
    }

    pub fn list_opportunities(&self, filter: &OpportunityFilter) -> Result<Vec<OpportunityRow>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<String> = Vec::new();
            let mut params: Vec<Value> = Vec::new();

            if let Some(status) = filter.status {
                params.push(Value::Text(status.as_str().to_string()));
                clauses.push(format!("status = ?{}", params.len()));
            }
            if let Some(creator_id) = &filter.creator_id {
                params.push(Value::Text(creator_id.clone()));
                clauses.push(format!("creator_id = ?{}", params.len()));
            }
            if let Some(skill) = &filter.skill {
                params.push(Value::Text(skill.trim().to_lowercase()));
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM json_each(opportunities.skills)
                             WHERE lower(json_each.value) = ?{})",
                    params.len()
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
                "SELECT {} FROM opportunities {} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
                OPPORTUNITY_COLUMNS,
                where_sql,
                params.len() - 1,
                params.len()
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_opportunity)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrites the editable columns with the already-merged row.
    pub fn update_opportunity(&self, row: &OpportunityRow) -> Result<Option<OpportunityRow>> {
        let skills = list_json(&row.skills)?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE opportunities
                 SET title = ?2, description = ?3, skills = ?4, status = ?5, updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    row.id,
                    row.title,
                    row.description,
                    skills,
                    row.status.as_str(),
                    now_ts()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_opportunity(conn, &row.id)
        })
    }

    pub fn delete_opportunity(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM opportunities WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

pub(crate) fn query_opportunity(conn: &Connection, id: &str) -> Result<Option<OpportunityRow>> {
    let sql = format!(
        "SELECT {} FROM opportunities WHERE id = ?1",
        OPPORTUNITY_COLUMNS
    );
    conn.query_row(&sql, [id], map_opportunity).optional()
}

fn map_opportunity(row: &Row<'_>) -> rusqlite::Result<OpportunityRow> {
    Ok(OpportunityRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        skills: list_col(row, 3)?,
        status: parse_col(row, 4)?,
        creator_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
