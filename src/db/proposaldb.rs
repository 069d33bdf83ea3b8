// db/proposaldb.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{Error, Row};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::proposalmodel::{
    ProposalMailbox, ProposalStatus, ValuePeriod, WorkPaymentType, WorkProposal,
};

const PROPOSAL_COLUMNS: &str = r#"
    id, sender_id, receiver_id, company_id, job_posting_id,
    title, description, proposed_value, value_period, value_currency,
    payment_type, status, chat_thread_id,
    expires_at, responded_at, created_at, updated_at
"#;

// One live proposal per sender/receiver pair, whatever job posting it names.
const LIVE_PROPOSAL_EXISTS_SQL: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM work_proposals
        WHERE sender_id = $1
          AND receiver_id = $2
          AND status IN ('PENDING', 'NEGOTIATING')
    ) AS live
"#;

#[async_trait]
pub trait ProposalExt {
    #[allow(clippy::too_many_arguments)]
    async fn create_proposal(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        company_id: Option<Uuid>,
        job_posting_id: Option<Uuid>,
        title: &str,
        description: &str,
        proposed_value: Option<BigDecimal>,
        value_period: ValuePeriod,
        value_currency: &str,
        payment_type: WorkPaymentType,
        expires_at: DateTime<Utc>,
    ) -> Result<WorkProposal, Error>;

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<WorkProposal>, Error>;

    /// True when a live proposal already connects this sender and receiver.
    async fn has_live_proposal(&self, sender_id: Uuid, receiver_id: Uuid)
        -> Result<bool, Error>;

    async fn list_proposals(
        &self,
        user_id: Uuid,
        mailbox: ProposalMailbox,
        status: Option<ProposalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkProposal>, i64), Error>;

    async fn lock_proposal_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
    ) -> Result<Option<WorkProposal>, Error>;

    async fn set_proposal_status_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
        status: ProposalStatus,
        mark_responded: bool,
    ) -> Result<WorkProposal, Error>;

    async fn begin_negotiation_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
    ) -> Result<WorkProposal, Error>;

    /// Stores the messaging thread reference once the side channel exists.
    /// An already-attached thread is kept.
    async fn attach_chat_thread(
        &self,
        proposal_id: Uuid,
        chat_thread_id: &str,
    ) -> Result<WorkProposal, Error>;

    /// Counter offers edit the live row in place; only provided fields change.
    async fn apply_counter_offer_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
        proposed_value: Option<BigDecimal>,
        value_period: Option<ValuePeriod>,
        payment_type: Option<WorkPaymentType>,
    ) -> Result<WorkProposal, Error>;

    /// Best-effort lazy flip for a proposal found past its deadline. Returns
    /// None when a sweep already got there first.
    async fn mark_proposal_expired(
        &self,
        proposal_id: Uuid,
    ) -> Result<Option<WorkProposal>, Error>;

    async fn expire_overdue_proposals(&self) -> Result<u64, Error>;
}

#[async_trait]
impl ProposalExt for DBClient {
    async fn create_proposal(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        company_id: Option<Uuid>,
        job_posting_id: Option<Uuid>,
        title: &str,
        description: &str,
        proposed_value: Option<BigDecimal>,
        value_period: ValuePeriod,
        value_currency: &str,
        payment_type: WorkPaymentType,
        expires_at: DateTime<Utc>,
    ) -> Result<WorkProposal, Error> {
        let query = format!(
            r#"
            INSERT INTO work_proposals (
                sender_id, receiver_id, company_id, job_posting_id,
                title, description, proposed_value, value_period,
                value_currency, payment_type, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            PROPOSAL_COLUMNS
        );

        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(sender_id)
            .bind(receiver_id)
            .bind(company_id)
            .bind(job_posting_id)
            .bind(title)
            .bind(description)
            .bind(proposed_value)
            .bind(value_period)
            .bind(value_currency)
            .bind(payment_type)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<WorkProposal>, Error> {
        let query = format!(
            "SELECT {} FROM work_proposals WHERE id = $1",
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn has_live_proposal(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<bool, Error> {
        let row = sqlx::query(LIVE_PROPOSAL_EXISTS_SQL)
            .bind(sender_id)
            .bind(receiver_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<bool, _>("live"))
    }

    async fn list_proposals(
        &self,
        user_id: Uuid,
        mailbox: ProposalMailbox,
        status: Option<ProposalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkProposal>, i64), Error> {
        let party_filter = match mailbox {
            ProposalMailbox::Sent => "sender_id = $1",
            ProposalMailbox::Received => "receiver_id = $1",
            ProposalMailbox::All => "(sender_id = $1 OR receiver_id = $1)",
        };

        let query = format!(
            r#"
            SELECT {}
            FROM work_proposals
            WHERE {}
              AND ($2::proposal_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            PROPOSAL_COLUMNS, party_filter
        );
        let proposals = sqlx::query_as::<_, WorkProposal>(&query)
            .bind(user_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_query = format!(
            r#"
            SELECT COUNT(*) AS total
            FROM work_proposals
            WHERE {}
              AND ($2::proposal_status IS NULL OR status = $2)
            "#,
            party_filter
        );
        let total = sqlx::query(&count_query)
            .bind(user_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("total");

        Ok((proposals, total))
    }

    async fn lock_proposal_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
    ) -> Result<Option<WorkProposal>, Error> {
        let query = format!(
            "SELECT {} FROM work_proposals WHERE id = $1 FOR UPDATE",
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .fetch_optional(&mut **tx)
            .await
    }

    async fn set_proposal_status_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
        status: ProposalStatus,
        mark_responded: bool,
    ) -> Result<WorkProposal, Error> {
        let query = format!(
            r#"
            UPDATE work_proposals
            SET status = $2,
                responded_at = CASE WHEN $3 THEN NOW() ELSE responded_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .bind(status)
            .bind(mark_responded)
            .fetch_one(&mut **tx)
            .await
    }

    async fn begin_negotiation_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
    ) -> Result<WorkProposal, Error> {
        let query = format!(
            r#"
            UPDATE work_proposals
            SET status = 'NEGOTIATING', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .fetch_one(&mut **tx)
            .await
    }

    async fn attach_chat_thread(
        &self,
        proposal_id: Uuid,
        chat_thread_id: &str,
    ) -> Result<WorkProposal, Error> {
        let query = format!(
            r#"
            UPDATE work_proposals
            SET chat_thread_id = COALESCE(chat_thread_id, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .bind(chat_thread_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn apply_counter_offer_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
        proposed_value: Option<BigDecimal>,
        value_period: Option<ValuePeriod>,
        payment_type: Option<WorkPaymentType>,
    ) -> Result<WorkProposal, Error> {
        let query = format!(
            r#"
            UPDATE work_proposals
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                proposed_value = COALESCE($4::numeric, proposed_value),
                value_period = COALESCE($5::value_period, value_period),
                payment_type = COALESCE($6::work_payment_type, payment_type),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .bind(title)
            .bind(description)
            .bind(proposed_value)
            .bind(value_period)
            .bind(payment_type)
            .fetch_one(&mut **tx)
            .await
    }

    async fn mark_proposal_expired(
        &self,
        proposal_id: Uuid,
    ) -> Result<Option<WorkProposal>, Error> {
        let query = format!(
            r#"
            UPDATE work_proposals
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'NEGOTIATING')
            RETURNING {}
            "#,
            PROPOSAL_COLUMNS
        );
        sqlx::query_as::<_, WorkProposal>(&query)
            .bind(proposal_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn expire_overdue_proposals(&self) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE work_proposals
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE status IN ('PENDING', 'NEGOTIATING')
              AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A sender naming a different job posting (or none) must still trip the
    // duplicate check: the rule is one live proposal per sender/receiver
    // pair, and the predicate must filter on nothing else.
    #[test]
    fn duplicate_check_spans_every_job_posting() {
        assert!(LIVE_PROPOSAL_EXISTS_SQL.contains("sender_id = $1"));
        assert!(LIVE_PROPOSAL_EXISTS_SQL.contains("receiver_id = $2"));
        assert!(LIVE_PROPOSAL_EXISTS_SQL.contains("'PENDING', 'NEGOTIATING'"));
        assert!(!LIVE_PROPOSAL_EXISTS_SQL.contains("job_posting_id"));
        assert!(!LIVE_PROPOSAL_EXISTS_SQL.contains("$3"));
    }
}
