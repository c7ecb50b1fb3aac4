use anyhow::Result;
use conecta_types::models::InterestStatus;
use conecta_types::workflow::{
    InterestAction, InterestActor, InterestPlan, interest_transition, plan_interest,
};
use rusqlite::{Connection, Row};
use tracing::debug;
use uuid::Uuid;

use super::opportunities::query_opportunity;
use super::parse_col;
use crate::models::{InterestRow, OpportunityRow};
use crate::{Database, OptionalExt, now_ts};

const INTEREST_COLUMNS: &str =
    "id, opportunity_id, user_id, message, status, created_at, updated_at";

impl Database {
    // -- Interests --

    /// Records a pending interest, or re-expresses a withdrawn one. Returns
    /// `None` when the opportunity does not exist; the opportunity row comes
    /// back alongside for notification purposes.
    pub fn express_interest(
        &self,
        opportunity_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<Option<(InterestRow, OpportunityRow)>> {
        self.with_tx(|tx| {
            let Some(opportunity) = query_opportunity(tx, opportunity_id)? else {
                return Ok(None);
            };

            let existing = query_interest_for(tx, opportunity_id, user_id)?;
            let plan = plan_interest(
                opportunity.creator_id == user_id,
                opportunity.status,
                existing.as_ref().map(|i| i.status),
            )?;

            let now = now_ts();
            let id = match (plan, existing) {
                (InterestPlan::Reopen, Some(row)) => {
                    tx.execute(
                        "UPDATE opportunity_interests
                         SET message = ?2, status = ?3, updated_at = ?4
                         WHERE id = ?1",
                        rusqlite::params![row.id, message, InterestStatus::Pending.as_str(), now],
                    )?;
                    row.id
                }
                _ => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO opportunity_interests
                            (id, opportunity_id, user_id, message, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                        rusqlite::params![
                            id,
                            opportunity_id,
                            user_id,
                            message,
                            InterestStatus::Pending.as_str(),
                            now
                        ],
                    )?;
                    id
                }
            };

            let interest = query_interest(tx, &id)?
                .ok_or_else(|| anyhow::anyhow!("Interest {} vanished after write", id))?;
            Ok(Some((interest, opportunity)))
        })
    }

    /// Applies accept/reject/withdraw on behalf of `actor_id`. Returns `None`
    /// when the interest does not exist.
    pub fn transition_interest(
        &self,
        id: &str,
        actor_id: &str,
        action: InterestAction,
    ) -> Result<Option<(InterestRow, OpportunityRow)>> {
        self.with_tx(|tx| {
            let Some(interest) = query_interest(tx, id)? else {
                return Ok(None);
            };
            let opportunity = query_opportunity(tx, &interest.opportunity_id)?.ok_or_else(|| {
                anyhow::anyhow!("Interest {} points at a missing opportunity", id)
            })?;

            let actor = if opportunity.creator_id == actor_id {
                InterestActor::Creator
            } else if interest.user_id == actor_id {
                InterestActor::Applicant
            } else {
                InterestActor::Other
            };

            let next = interest_transition(interest.status, actor, action)?;
            tx.execute(
                "UPDATE opportunity_interests SET status = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, next.as_str(), now_ts()],
            )?;
            debug!("Interest {} moved {} -> {}", id, interest.status, next);

            let interest = query_interest(tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Interest {} vanished after update", id))?;
            Ok(Some((interest, opportunity)))
        })
    }

    pub fn list_interests_for_opportunity(&self, opportunity_id: &str) -> Result<Vec<InterestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM opportunity_interests WHERE opportunity_id = ?1
                 ORDER BY created_at DESC, id",
                INTEREST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([opportunity_id], map_interest)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_interests_for_user(&self, user_id: &str) -> Result<Vec<InterestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM opportunity_interests WHERE user_id = ?1
                 ORDER BY updated_at DESC, id",
                INTEREST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_interest)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_interest(conn: &Connection, id: &str) -> Result<Option<InterestRow>> {
    let sql = format!(
        "SELECT {} FROM opportunity_interests WHERE id = ?1",
        INTEREST_COLUMNS
    );
    conn.query_row(&sql, [id], map_interest).optional()
}

fn query_interest_for(
    conn: &Connection,
    opportunity_id: &str,
    user_id: &str,
) -> Result<Option<InterestRow>> {
    let sql = format!(
        "SELECT {} FROM opportunity_interests WHERE opportunity_id = ?1 AND user_id = ?2",
        INTEREST_COLUMNS
    );
    conn.query_row(&sql, [opportunity_id, user_id], map_interest)
        .optional()
}

fn map_interest(row: &Row<'_>) -> rusqlite::Result<InterestRow> {
    Ok(InterestRow {
        id: row.get(0)?,
        opportunity_id: row.get(1)?,
        user_id: row.get(2)?,
        message: row.get(3)?,
        status: parse_col(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use conecta_types::models::{OpportunityStatus, RoleName};
    use conecta_types::workflow::TransitionError;

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "ana", RoleName::Mentor);
        fixtures::user(&db, "ben", RoleName::Emprendedor);
        fixtures::user(&db, "cai", RoleName::Emprendedor);
        let opp = db
            .create_opportunity("ana", "Mentoring slot", "", &[])
            .unwrap();
        (db, opp.id)
    }

    fn transition_err(err: anyhow::Error) -> TransitionError {
        err.downcast::<TransitionError>().unwrap()
    }

    #[test]
    fn express_then_accept() {
        let (db, opp) = setup();
        let (interest, opportunity) = db.express_interest(&opp, "ben", "hi").unwrap().unwrap();
        assert_eq!(interest.status, InterestStatus::Pending);
        assert_eq!(opportunity.creator_id, "ana");

        let (interest, _) = db
            .transition_interest(&interest.id, "ana", InterestAction::Accept)
            .unwrap()
            .unwrap();
        assert_eq!(interest.status, InterestStatus::Accepted);
    }

    #[test]
    fn duplicate_and_own_interest_are_refused() {
        let (db, opp) = setup();
        db.express_interest(&opp, "ben", "hi").unwrap().unwrap();

        let err = db.express_interest(&opp, "ben", "again").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::AlreadyInterested);
        let err = db.express_interest(&opp, "ana", "mine").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::OwnOpportunity);
    }

    #[test]
    fn closed_opportunity_refuses_interest() {
        let (db, opp) = setup();
        let mut row = db.get_opportunity(&opp).unwrap().unwrap();
        row.status = OpportunityStatus::Closed;
        db.update_opportunity(&row).unwrap();

        let err = db.express_interest(&opp, "ben", "hi").unwrap_err();
        assert_eq!(transition_err(err), TransitionError::OpportunityClosed);
    }

    #[test]
    fn withdraw_twice_is_an_error_then_reexpress() {
        let (db, opp) = setup();
        let (interest, _) = db.express_interest(&opp, "ben", "hi").unwrap().unwrap();

        let (withdrawn, _) = db
            .transition_interest(&interest.id, "ben", InterestAction::Withdraw)
            .unwrap()
            .unwrap();
        assert_eq!(withdrawn.status, InterestStatus::Withdrawn);

        let err = db
            .transition_interest(&interest.id, "ben", InterestAction::Withdraw)
            .unwrap_err();
        assert!(matches!(
            transition_err(err),
            TransitionError::InvalidState { from: "withdrawn", .. }
        ));

        let (again, _) = db.express_interest(&opp, "ben", "still keen").unwrap().unwrap();
        assert_eq!(again.id, interest.id);
        assert_eq!(again.status, InterestStatus::Pending);
        assert_eq!(again.message, "still keen");
    }

    #[test]
    fn outsiders_cannot_review() {
        let (db, opp) = setup();
        let (interest, _) = db.express_interest(&opp, "ben", "hi").unwrap().unwrap();

        let err = db
            .transition_interest(&interest.id, "cai", InterestAction::Reject)
            .unwrap_err();
        assert_eq!(transition_err(err), TransitionError::NotCreator);
        let err = db
            .transition_interest(&interest.id, "cai", InterestAction::Withdraw)
            .unwrap_err();
        assert_eq!(transition_err(err), TransitionError::NotApplicant);
    }

    #[test]
    fn listings() {
        let (db, opp) = setup();
        db.express_interest(&opp, "ben", "hi").unwrap();
        db.express_interest(&opp, "cai", "hello").unwrap();

        assert_eq!(db.list_interests_for_opportunity(&opp).unwrap().len(), 2);
        assert_eq!(db.list_interests_for_user("cai").unwrap().len(), 1);
        assert!(db.express_interest("missing", "ben", "").unwrap().is_none());
    }
}
