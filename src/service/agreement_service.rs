use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::agreementdb::AgreementExt,
    db::chainsyncdb::ChainSyncExt,
    db::db::DBClient,
    models::agreementmodel::{AgreementStatus, AgreementStatusChange, WorkAgreement},
    models::chainmodel::ChainSyncKind,
    service::error::ServiceError,
    utils::sanitize::sanitize_text,
};

#[derive(Debug, Clone)]
pub struct AgreementService {
    db_client: Arc<DBClient>,
}

impl AgreementService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    pub async fn get_agreement(
        &self,
        agreement_id: Uuid,
        requester_id: Uuid,
    ) -> Result<WorkAgreement, ServiceError> {
        let agreement = self
            .db_client
            .get_agreement(agreement_id)
            .await?
            .ok_or(ServiceError::AgreementNotFound(agreement_id))?;

        if !agreement.is_party(requester_id) {
            return Err(ServiceError::Forbidden(requester_id));
        }

        Ok(agreement)
    }

    pub async fn list_agreements(
        &self,
        user_id: Uuid,
        status: Option<AgreementStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<WorkAgreement>, i64), ServiceError> {
        let offset = ((page - 1) as i64) * limit as i64;
        Ok(self
            .db_client
            .list_agreements(user_id, status, limit as i64, offset)
            .await?)
    }

    pub async fn get_history(
        &self,
        agreement_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Vec<AgreementStatusChange>, ServiceError> {
        self.get_agreement(agreement_id, requester_id).await?;
        Ok(self.db_client.get_status_history(agreement_id).await?)
    }

    pub async fn pause_agreement(
        &self,
        agreement_id: Uuid,
        caller_id: Uuid,
        reason: Option<String>,
    ) -> Result<WorkAgreement, ServiceError> {
        self.transition(agreement_id, caller_id, AgreementStatus::Paused, reason)
            .await
    }

    pub async fn resume_agreement(
        &self,
        agreement_id: Uuid,
        caller_id: Uuid,
        reason: Option<String>,
    ) -> Result<WorkAgreement, ServiceError> {
        self.transition(agreement_id, caller_id, AgreementStatus::Active, reason)
            .await
    }

    /// Closing is final. The reason is checked before anything is touched;
    /// a rejected reason leaves no history row behind.
    pub async fn close_agreement(
        &self,
        agreement_id: Uuid,
        caller_id: Uuid,
        reason: &str,
    ) -> Result<WorkAgreement, ServiceError> {
        let reason = reason.trim();
        if reason.len() < 3 {
            return Err(ServiceError::Validation(
                "A close reason of at least 3 characters is required".to_string(),
            ));
        }

        self.transition(
            agreement_id,
            caller_id,
            AgreementStatus::Closed,
            Some(reason.to_string()),
        )
        .await
    }

    async fn transition(
        &self,
        agreement_id: Uuid,
        caller_id: Uuid,
        to_status: AgreementStatus,
        reason: Option<String>,
    ) -> Result<WorkAgreement, ServiceError> {
        let reason = reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(sanitize_text);

        let mut tx = self.db_client.pool.begin().await?;

        let agreement = self
            .db_client
            .lock_agreement_tx(&mut tx, agreement_id)
            .await?
            .ok_or(ServiceError::AgreementNotFound(agreement_id))?;

        if !agreement.is_party(caller_id) {
            return Err(ServiceError::Forbidden(caller_id));
        }

        if !agreement.status.can_transition_to(to_status) {
            return Err(ServiceError::InvalidAgreementTransition(
                agreement_id,
                agreement.status,
                to_status,
            ));
        }

        let updated = self
            .db_client
            .transition_agreement_tx(
                &mut tx,
                agreement_id,
                agreement.status,
                to_status,
                reason.as_deref(),
                caller_id,
            )
            .await?;

        // the mirror job commits together with the transition it mirrors
        self.db_client
            .enqueue_chain_job_tx(&mut tx, agreement_id, ChainSyncKind::MirrorStatus, Some(to_status))
            .await?;

        tx.commit().await?;

        tracing::info!(
            agreement_id = %agreement_id,
            from = agreement.status.to_str(),
            to = to_status.to_str(),
            "agreement status changed"
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AgreementService {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/bazari").unwrap();
        AgreementService::new(Arc::new(DBClient::new(pool)))
    }

    #[tokio::test]
    async fn blank_close_reason_is_rejected_before_any_io() {
        let result = service()
            .close_agreement(Uuid::new_v4(), Uuid::new_v4(), "   ")
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn short_close_reason_is_rejected_before_any_io() {
        let result = service()
            .close_agreement(Uuid::new_v4(), Uuid::new_v4(), "ok")
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
