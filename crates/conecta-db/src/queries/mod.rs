mod audit;
mod connections;
mod interests;
mod messages;
mod opportunities;
mod resets;
mod roles;
mod stats;
mod users;

pub use messages::MessageCursor;
pub use opportunities::OpportunityFilter;
pub use stats::Stats;
pub use users::UserFilter;

use anyhow::Result;
use rusqlite::Row;
use rusqlite::types::Type;
use std::str::FromStr;

/// Reads a text column and parses it into a status enum.
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Lists (skills, interests) are stored as JSON arrays of strings.
pub(crate) fn list_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn list_json(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

/// `?1, ?2, ...` for batch `IN (...)` queries.
pub(crate) fn placeholders(count: usize, start: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::Database;
    use crate::models::NewUser;
    use conecta_types::models::RoleName;

    pub fn user(db: &Database, id: &str, role: RoleName) {
        let email = format!("{}@example.com", id);
        let created = db
            .create_user(
                &NewUser {
                    id,
                    email: &email,
                    password_hash: "hash",
                    name: id,
                    completion: 15,
                },
                role,
                false,
            )
            .unwrap();
        assert!(created.is_some());
    }
}
