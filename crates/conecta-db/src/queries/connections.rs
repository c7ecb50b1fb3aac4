use anyhow::Result;
use conecta_types::models::ConnectionStatus;
use conecta_types::workflow::{
    ConnectionAction, Party, RequestPlan, connection_transition, plan_connection_request,
};
use rusqlite::{Connection, Row};
use tracing::debug;
use uuid::Uuid;

use super::parse_col;
use super::users::query_user_by_id;
use crate::models::ConnectionRow;
use crate::{Database, OptionalExt, now_ts};

const CONNECTION_COLUMNS: &str =
    "id, requester_id, addressee_id, status, created_at, updated_at";

impl Database {
    // -- Connections --

    /// Creates a pending request, or reopens a rejected one for the same
    /// pair. Returns `None` when the addressee does not exist. Rule
    /// violations surface as `TransitionError`.
    pub fn request_connection(
        &self,
        requester_id: &str,
        addressee_id: &str,
    ) -> Result<Option<ConnectionRow>> {
        self.with_tx(|tx| {
            let existing = query_pair(tx, requester_id, addressee_id)?;
            let plan =
                plan_connection_request(requester_id, addressee_id, existing.as_ref().map(|c| c.status))?;

            if query_user_by_id(tx, addressee_id)?.is_none() {
                return Ok(None);
            }

            let now = now_ts();
            let id = match (plan, existing) {
                (RequestPlan::Reopen, Some(row)) => {
                    tx.execute(
                        "UPDATE connections
                         SET requester_id = ?2, addressee_id = ?3, status = ?4, updated_at = ?5
                         WHERE id = ?1",
                        rusqlite::params![
                            row.id,
                            requester_id,
                            addressee_id,
                            ConnectionStatus::Pending.as_str(),
                            now
                        ],
                    )?;
                    row.id
                }
                _ => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO connections
                            (id, requester_id, addressee_id, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        rusqlite::params![
                            id,
                            requester_id,
                            addressee_id,
                            ConnectionStatus::Pending.as_str(),
                            now
                        ],
                    )?;
                    id
                }
            };

            debug!("Connection {} requested by {}", id, requester_id);
            query_connection(tx, &id)
        })
    }

    /// Accept or reject on behalf of `actor_id`. Returns `None` when the
    /// connection does not exist.
    pub fn respond_to_connection(
        &self,
        id: &str,
        actor_id: &str,
        accept: bool,
    ) -> Result<Option<ConnectionRow>> {
        let action = if accept {
            ConnectionAction::Accept
        } else {
            ConnectionAction::Reject
        };

        self.with_tx(|tx| {
            let Some(row) = query_connection(tx, id)? else {
                return Ok(None);
            };

            if let Some(next) = connection_transition(row.status, party_of(&row, actor_id), action)? {
                tx.execute(
                    "UPDATE connections SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id, next.as_str(), now_ts()],
                )?;
                debug!("Connection {} moved {} -> {}", id, row.status, next);
            }
            query_connection(tx, id)
        })
    }

    /// Deletes on behalf of either party. Returns `false` when the
    /// connection does not exist.
    pub fn delete_connection(&self, id: &str, actor_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let Some(row) = query_connection(tx, id)? else {
                return Ok(false);
            };

            connection_transition(row.status, party_of(&row, actor_id), ConnectionAction::Delete)?;
            tx.execute("DELETE FROM connections WHERE id = ?1", [id])?;
            Ok(true)
        })
    }

    /// Connections involving `user_id`, newest activity first.
    pub fn list_connections(
        &self,
        user_id: &str,
        status: Option<ConnectionStatus>,
    ) -> Result<Vec<ConnectionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM connections
                 WHERE (requester_id = ?1 OR addressee_id = ?1)
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY updated_at DESC, id",
                CONNECTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id, status.map(|s| s.as_str())],
                    map_connection,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The row for the unordered pair, if any.
    pub fn connection_between(&self, a: &str, b: &str) -> Result<Option<ConnectionRow>> {
        self.with_conn(|conn| query_pair(conn, a, b))
    }
}

fn party_of(row: &ConnectionRow, user_id: &str) -> Party {
    if row.addressee_id == user_id {
        Party::Addressee
    } else if row.requester_id == user_id {
        Party::Requester
    } else {
        Party::Outsider
    }
}

fn query_connection(conn: &Connection, id: &str) -> Result<Option<ConnectionRow>> {
    let sql = format!("SELECT {} FROM connections WHERE id = ?1", CONNECTION_COLUMNS);
    conn.query_row(&sql, [id], map_connection).optional()
}

pub(crate) fn query_pair(conn: &Connection, a: &str, b: &str) -> Result<Option<ConnectionRow>> {
    let sql = format!(
        "SELECT {} FROM connections
         WHERE (requester_id = ?1 AND addressee_id = ?2)
            OR (requester_id = ?2 AND addressee_id = ?1)",
        CONNECTION_COLUMNS
    );
    conn.query_row(&sql, [a, b], map_connection).optional()
}

fn map_connection(row: &Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok(ConnectionRow {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        addressee_id: row.get(2)?,
        status: parse_col(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use conecta_types::models::RoleName;
    use conecta_types::workflow::TransitionError;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "ana", RoleName::Mentor);
        fixtures::user(&db, "ben", RoleName::Emprendedor);
        fixtures::user(&db, "cai", RoleName::Emprendedor);
        db
    }

    fn transition_err(err: anyhow::Error) -> TransitionError {
        err.downcast::<TransitionError>().unwrap()
    }

    #[test]
    fn request_accept_delete_cycle() {
        let db = setup();
        let row = db.request_connection("ana", "ben").unwrap().unwrap();
        assert_eq!(row.status, ConnectionStatus::Pending);

        let row = db.respond_to_connection(&row.id, "ben", true).unwrap().unwrap();
        assert_eq!(row.status, ConnectionStatus::Accepted);

        assert!(db.delete_connection(&row.id, "ana").unwrap());
        assert!(db.connection_between("ana", "ben").unwrap().is_none());
    }

    #[test]
    fn self_request_is_refused() {
        let db = setup();
        let err = db.request_connection("ana", "ana").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::SelfRequest);
    }

    #[test]
    fn duplicate_pending_in_either_direction_is_refused() {
        let db = setup();
        db.request_connection("ana", "ben").unwrap().unwrap();

        let err = db.request_connection("ana", "ben").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::AlreadyPending);
        let err = db.request_connection("ben", "ana").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::AlreadyPending);
    }

    #[test]
    fn rejected_pair_can_be_requested_again() {
        let db = setup();
        let first = db.request_connection("ana", "ben").unwrap().unwrap();
        db.respond_to_connection(&first.id, "ben", false).unwrap();

        let again = db.request_connection("ben", "ana").unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.status, ConnectionStatus::Pending);
        assert_eq!(again.requester_id, "ben");
        assert_eq!(again.addressee_id, "ana");
    }

    #[test]
    fn only_addressee_can_accept() {
        let db = setup();
        let row = db.request_connection("ana", "ben").unwrap().unwrap();

        let err = db.respond_to_connection(&row.id, "ana", true).unwrap_err();
        assert_eq!(transition_err(err), TransitionError::NotAddressee);
        let err = db.respond_to_connection(&row.id, "cai", true).unwrap_err();
        assert_eq!(transition_err(err), TransitionError::NotParticipant);
        let err = db.delete_connection(&row.id, "cai").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::NotParticipant);
    }

    #[test]
    fn unknown_addressee_yields_none() {
        let db = setup();
        assert!(db.request_connection("ana", "ghost").unwrap().is_none());
    }

    #[test]
    fn list_filters_by_status() {
        let db = setup();
        let ab = db.request_connection("ana", "ben").unwrap().unwrap();
        db.request_connection("cai", "ana").unwrap().unwrap();
        db.respond_to_connection(&ab.id, "ben", true).unwrap();

        assert_eq!(db.list_connections("ana", None).unwrap().len(), 2);
        let accepted = db
            .list_connections("ana", Some(ConnectionStatus::Accepted))
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].other_party("ana"), "ben");
    }
}
