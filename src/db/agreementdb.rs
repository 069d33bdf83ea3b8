// db/agreementdb.rs
use async_trait::async_trait;
use sqlx::{Error, Row};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::agreementmodel::{AgreementStatus, AgreementStatusChange, WorkAgreement};
use crate::models::proposalmodel::WorkProposal;

const AGREEMENT_COLUMNS: &str = r#"
    id, proposal_id, company_id, worker_id,
    title, description, terms, agreed_value, value_period, value_currency,
    payment_type, status, start_date, end_date, paused_at, closed_at,
    closed_reason, on_chain_id, on_chain_tx_hash, created_at, updated_at
"#;

// on_chain_id is written once; a second registration write matches no row.
const SET_REGISTRATION_SQL: &str = r#"
    UPDATE work_agreements
    SET on_chain_id = $2,
        on_chain_tx_hash = COALESCE($3, on_chain_tx_hash),
        updated_at = NOW()
    WHERE id = $1 AND on_chain_id IS NULL
"#;

#[async_trait]
pub trait AgreementExt {
    /// Materializes an accepted proposal into an ACTIVE agreement, inside
    /// the caller's transaction so acceptance and creation land together.
    async fn create_agreement_from_proposal_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal: &WorkProposal,
        company_id: Uuid,
        worker_id: Uuid,
    ) -> Result<WorkAgreement, Error>;

    async fn get_agreement(&self, agreement_id: Uuid) -> Result<Option<WorkAgreement>, Error>;

    async fn lock_agreement_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
    ) -> Result<Option<WorkAgreement>, Error>;

    async fn list_agreements(
        &self,
        user_id: Uuid,
        status: Option<AgreementStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkAgreement>, i64), Error>;

    /// Applies a status change and appends the audit row. Timestamps follow
    /// the target status: pause stamps paused_at, resume clears it, close
    /// stamps closed_at and end_date.
    async fn transition_agreement_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
        from_status: AgreementStatus,
        to_status: AgreementStatus,
        reason: Option<&str>,
        changed_by: Uuid,
    ) -> Result<WorkAgreement, Error>;

    async fn get_status_history(
        &self,
        agreement_id: Uuid,
    ) -> Result<Vec<AgreementStatusChange>, Error>;

    async fn set_on_chain_registration(
        &self,
        agreement_id: Uuid,
        on_chain_id: &str,
        tx_hash: Option<&str>,
    ) -> Result<(), Error>;
}

#[async_trait]
impl AgreementExt for DBClient {
    async fn create_agreement_from_proposal_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        proposal: &WorkProposal,
        company_id: Uuid,
        worker_id: Uuid,
    ) -> Result<WorkAgreement, Error> {
        let query = format!(
            r#"
            INSERT INTO work_agreements (
                proposal_id, company_id, worker_id, title, description,
                agreed_value, value_period, value_currency, payment_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            AGREEMENT_COLUMNS
        );

        sqlx::query_as::<_, WorkAgreement>(&query)
            .bind(proposal.id)
            .bind(company_id)
            .bind(worker_id)
            .bind(&proposal.title)
            .bind(&proposal.description)
            .bind(&proposal.proposed_value)
            .bind(proposal.value_period)
            .bind(&proposal.value_currency)
            .bind(proposal.payment_type)
            .fetch_one(&mut **tx)
            .await
    }

    async fn get_agreement(&self, agreement_id: Uuid) -> Result<Option<WorkAgreement>, Error> {
        let query = format!(
            "SELECT {} FROM work_agreements WHERE id = $1",
            AGREEMENT_COLUMNS
        );
        sqlx::query_as::<_, WorkAgreement>(&query)
            .bind(agreement_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn lock_agreement_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
    ) -> Result<Option<WorkAgreement>, Error> {
        let query = format!(
            "SELECT {} FROM work_agreements WHERE id = $1 FOR UPDATE",
            AGREEMENT_COLUMNS
        );
        sqlx::query_as::<_, WorkAgreement>(&query)
            .bind(agreement_id)
            .fetch_optional(&mut **tx)
            .await
    }

    async fn list_agreements(
        &self,
        user_id: Uuid,
        status: Option<AgreementStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkAgreement>, i64), Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM work_agreements
            WHERE (company_id = $1 OR worker_id = $1)
              AND ($2::agreement_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            AGREEMENT_COLUMNS
        );
        let agreements = sqlx::query_as::<_, WorkAgreement>(&query)
            .bind(user_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM work_agreements
            WHERE (company_id = $1 OR worker_id = $1)
              AND ($2::agreement_status IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("total");

        Ok((agreements, total))
    }

    async fn transition_agreement_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
        from_status: AgreementStatus,
        to_status: AgreementStatus,
        reason: Option<&str>,
        changed_by: Uuid,
    ) -> Result<WorkAgreement, Error> {
        let update = match to_status {
            AgreementStatus::Paused => format!(
                r#"
                UPDATE work_agreements
                SET status = $2, paused_at = NOW(), updated_at = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                AGREEMENT_COLUMNS
            ),
            AgreementStatus::Active => format!(
                r#"
                UPDATE work_agreements
                SET status = $2, paused_at = NULL, updated_at = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                AGREEMENT_COLUMNS
            ),
            AgreementStatus::Closed => format!(
                r#"
                UPDATE work_agreements
                SET status = $2, closed_at = NOW(), end_date = NOW(),
                    closed_reason = $3, updated_at = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                AGREEMENT_COLUMNS
            ),
        };

        let mut update_query = sqlx::query_as::<_, WorkAgreement>(&update)
            .bind(agreement_id)
            .bind(to_status);
        if to_status == AgreementStatus::Closed {
            update_query = update_query.bind(reason);
        }
        let agreement = update_query.fetch_one(&mut **tx).await?;

        sqlx::query(
            r#"
            INSERT INTO agreement_status_history (
                agreement_id, from_status, to_status, reason, changed_by
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(agreement_id)
        .bind(from_status)
        .bind(to_status)
        .bind(reason)
        .bind(changed_by)
        .execute(&mut **tx)
        .await?;

        Ok(agreement)
    }

    async fn get_status_history(
        &self,
        agreement_id: Uuid,
    ) -> Result<Vec<AgreementStatusChange>, Error> {
        sqlx::query_as::<_, AgreementStatusChange>(
            r#"
            SELECT id, agreement_id, from_status, to_status, reason, changed_by, created_at
            FROM agreement_status_history
            WHERE agreement_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(agreement_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn set_on_chain_registration(
        &self,
        agreement_id: Uuid,
        on_chain_id: &str,
        tx_hash: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(SET_REGISTRATION_SQL)
            .bind(agreement_id)
            .bind(on_chain_id)
            .bind(tx_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Once set, on_chain_id never changes; the statement itself must refuse
    // to touch an already-registered row.
    #[test]
    fn registration_write_only_matches_unregistered_rows() {
        assert!(SET_REGISTRATION_SQL.contains("on_chain_id IS NULL"));
        assert!(SET_REGISTRATION_SQL.contains("on_chain_id = $2"));
    }
}
