//! PostgreSQL Repository Implementation

use crate::domain::entities::{NewPoll, Poll, PollFilter, PollOption, PollSummary, VoteRecord};
use crate::domain::repository::PollRepository;
use crate::domain::value_objects::{PollId, VoteSignals};
use crate::error::{PollError, PollResult};
use chrono::{DateTime, Utc};
use kernel::id::VoteId;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// Attempts at finding an unused poll id before giving up
const CREATE_ID_ATTEMPTS: usize = 5;

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgPollRepository {
    pool: PgPool,
}

impl PgPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PollRepository for PgPollRepository {
    async fn create(&self, new_poll: &NewPoll) -> PollResult<Poll> {
        let mut tx = self.pool.begin().await?;

        let mut inserted = None;
        for _ in 0..CREATE_ID_ATTEMPTS {
            let id = PollId::generate();
            let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
                r#"
                INSERT INTO polls (poll_id, question)
                VALUES ($1, $2)
                ON CONFLICT (poll_id) DO NOTHING
                RETURNING created_at
                "#,
            )
            .bind(id.as_str())
            .bind(&new_poll.question)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(created_at) = created_at {
                inserted = Some((id, created_at));
                break;
            }
            tracing::debug!(poll_id = %id, "Poll id collision, retrying");
        }
        let (id, created_at) = inserted
            .ok_or_else(|| PollError::Storage("no unused poll id found".to_string()))?;

        let indexes: Vec<i32> = (0..new_poll.options.len() as i32).collect();
        sqlx::query(
            r#"
            INSERT INTO poll_options (poll_id, option_index, text)
            SELECT $1, idx, text
            FROM UNNEST($2::INT[], $3::TEXT[]) AS o(idx, text)
            "#,
        )
        .bind(id.as_str())
        .bind(&indexes)
        .bind(&new_poll.options)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Poll::new(id, new_poll, created_at))
    }

    async fn get_by_id(&self, poll_id: &PollId) -> PollResult<Option<Poll>> {
        let mut conn = self.pool.acquire().await?;
        load_poll(&mut conn, poll_id).await
    }

    async fn list(&self, filter: &PollFilter) -> PollResult<Vec<PollSummary>> {
        let pattern = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(s)));

        let rows = sqlx::query_as::<_, PollRow>(
            r#"
            SELECT poll_id, question, total_votes, created_at
            FROM polls
            WHERE $1::TEXT IS NULL OR question ILIKE $1 ESCAPE '\'
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern)
        .bind(filter.limit as i64)
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.poll_id.clone()).collect();
        let option_rows = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT poll_id, text, votes
            FROM poll_options
            WHERE poll_id = ANY($1)
            ORDER BY poll_id, option_index
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut options: HashMap<String, Vec<PollOption>> = HashMap::new();
        for row in option_rows {
            options
                .entry(row.poll_id.clone())
                .or_default()
                .push(row.into_option());
        }

        rows.into_iter()
            .map(|row| -> PollResult<PollSummary> {
                let opts = options.remove(&row.poll_id).unwrap_or_default();
                Ok(PollSummary {
                    id: PollId::parse(&row.poll_id)?,
                    question: row.question,
                    options: opts,
                    total_votes: row.total_votes,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn delete(&self, poll_id: &PollId) -> PollResult<bool> {
        let deleted = sqlx::query("DELETE FROM polls WHERE poll_id = $1")
            .bind(poll_id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> PollResult<u64> {
        let deleted = sqlx::query("DELETE FROM polls WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    async fn increment_vote_and_append_audit(
        &self,
        poll_id: &PollId,
        option_index: usize,
        signals: &VoteSignals,
        voted_at: DateTime<Utc>,
    ) -> PollResult<Poll> {
        let option_index = i32::try_from(option_index).map_err(|_| PollError::InvalidOption)?;
        // Dropping `tx` on any early return rolls everything back
        let mut tx = self.pool.begin().await?;

        let polls_updated =
            sqlx::query("UPDATE polls SET total_votes = total_votes + 1 WHERE poll_id = $1")
                .bind(poll_id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if polls_updated == 0 {
            return Err(PollError::PollNotFound);
        }

        let options_updated = sqlx::query(
            "UPDATE poll_options SET votes = votes + 1 WHERE poll_id = $1 AND option_index = $2",
        )
        .bind(poll_id.as_str())
        .bind(option_index)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if options_updated == 0 {
            return Err(PollError::InvalidOption);
        }

        sqlx::query(
            r#"
            INSERT INTO poll_votes (
                vote_id,
                poll_id,
                option_index,
                address,
                token,
                client_string,
                voted_at_ms
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(VoteId::new().into_uuid())
        .bind(poll_id.as_str())
        .bind(option_index)
        .bind(&signals.address)
        .bind(&signals.token)
        .bind(&signals.client_string)
        .bind(voted_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        let poll = load_poll(&mut *tx, poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;

        tx.commit().await?;

        Ok(poll)
    }
}

/// Load a poll with its options and vote log on one connection
async fn load_poll(conn: &mut PgConnection, poll_id: &PollId) -> PollResult<Option<Poll>> {
    let Some(row) = sqlx::query_as::<_, PollRow>(
        r#"
        SELECT poll_id, question, total_votes, created_at
        FROM polls
        WHERE poll_id = $1
        "#,
    )
    .bind(poll_id.as_str())
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let options = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT poll_id, text, votes
        FROM poll_options
        WHERE poll_id = $1
        ORDER BY option_index
        "#,
    )
    .bind(poll_id.as_str())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(OptionRow::into_option)
    .collect();

    let votes = sqlx::query_as::<_, VoteRow>(
        r#"
        SELECT vote_id, option_index, address, token, client_string, voted_at_ms
        FROM poll_votes
        WHERE poll_id = $1
        ORDER BY voted_at_ms, vote_id
        "#,
    )
    .bind(poll_id.as_str())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(VoteRow::into_record)
    .collect::<PollResult<Vec<_>>>()?;

    Ok(Some(Poll {
        id: poll_id.clone(),
        question: row.question,
        options,
        total_votes: row.total_votes,
        created_at: row.created_at,
        votes,
    }))
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct PollRow {
    poll_id: String,
    question: String,
    total_votes: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    poll_id: String,
    text: String,
    votes: i64,
}

impl OptionRow {
    fn into_option(self) -> PollOption {
        PollOption {
            text: self.text,
            votes: self.votes,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    vote_id: Uuid,
    option_index: i32,
    address: String,
    token: String,
    client_string: String,
    voted_at_ms: i64,
}

impl VoteRow {
    fn into_record(self) -> PollResult<VoteRecord> {
        let voted_at = DateTime::<Utc>::from_timestamp_millis(self.voted_at_ms)
            .ok_or_else(|| PollError::Storage(format!("bad vote timestamp {}", self.voted_at_ms)))?;
        let option_index = usize::try_from(self.option_index)
            .map_err(|_| PollError::Storage(format!("bad option index {}", self.option_index)))?;
        Ok(VoteRecord {
            id: VoteId::from_uuid(self.vote_id),
            option_index,
            signals: VoteSignals::new(self.address, self.token, self.client_string),
            voted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
