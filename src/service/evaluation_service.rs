use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::agreementdb::AgreementExt,
    db::db::DBClient,
    db::evaluationdb::{EvaluationExt, EvaluationWithAuthor},
    dtos::workdtos::{AgreementEvaluationsDto, EvaluationSubmittedDto, SubmitEvaluationDto},
    models::agreementmodel::AgreementStatus,
    models::evaluationmodel::{evaluation_window_open, WorkEvaluation},
    service::error::ServiceError,
    utils::sanitize::sanitize_text,
};

#[derive(Debug, Clone)]
pub struct EvaluationService {
    db_client: Arc<DBClient>,
}

impl EvaluationService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    /// Records one party's evaluation. When the second one arrives both are
    /// flipped public in the same transaction, so a reader can never observe
    /// one public evaluation without the other.
    pub async fn submit_evaluation(
        &self,
        agreement_id: Uuid,
        author_id: Uuid,
        dto: SubmitEvaluationDto,
    ) -> Result<EvaluationSubmittedDto, ServiceError> {
        let comment = dto
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(sanitize_text);

        let mut tx = self.db_client.pool.begin().await?;

        // the agreement row lock serializes the two parties' submissions
        let agreement = self
            .db_client
            .lock_agreement_tx(&mut tx, agreement_id)
            .await?
            .ok_or(ServiceError::AgreementNotFound(agreement_id))?;

        let target_id = agreement
            .counterparty_of(author_id)
            .ok_or(ServiceError::Forbidden(author_id))?;

        if agreement.status != AgreementStatus::Closed {
            return Err(ServiceError::EvaluationNotOpen(agreement_id));
        }

        let closed_at = agreement.closed_at.unwrap_or(agreement.updated_at);
        if !evaluation_window_open(closed_at, Utc::now()) {
            return Err(ServiceError::Validation(
                "The evaluation window for this agreement has ended".to_string(),
            ));
        }

        if self
            .db_client
            .get_evaluation(agreement_id, author_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::DuplicateEvaluation(agreement_id, author_id));
        }

        let inserted = self
            .db_client
            .insert_evaluation_tx(
                &mut tx,
                agreement_id,
                author_id,
                target_id,
                dto.overall_rating,
                dto.communication_rating,
                dto.punctuality_rating,
                dto.quality_rating,
                comment.as_deref(),
            )
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    ServiceError::DuplicateEvaluation(agreement_id, author_id)
                }
                _ => ServiceError::Database(e),
            })?;

        let submitted = self.db_client.count_evaluations_tx(&mut tx, agreement_id).await?;
        let both_in = submitted >= 2;
        if both_in {
            self.db_client
                .publish_evaluations_tx(&mut tx, agreement_id)
                .await?;
        }

        tx.commit().await?;

        if both_in {
            tracing::info!(agreement_id = %agreement_id, "both evaluations in, now public");
        } else {
            tracing::info!(agreement_id = %agreement_id, "evaluation recorded, waiting for the other party");
        }

        let mut evaluation = inserted;
        evaluation.is_public = both_in;

        Ok(EvaluationSubmittedDto {
            evaluation,
            other_party_evaluated: both_in,
            now_public: both_in,
        })
    }

    /// One party's view of an agreement's evaluations. The counterparty's
    /// evaluation is only included once public.
    pub async fn agreement_evaluations(
        &self,
        agreement_id: Uuid,
        requester_id: Uuid,
    ) -> Result<AgreementEvaluationsDto, ServiceError> {
        let agreement = self
            .db_client
            .get_agreement(agreement_id)
            .await?
            .ok_or(ServiceError::AgreementNotFound(agreement_id))?;

        if !agreement.is_party(requester_id) {
            return Err(ServiceError::Forbidden(requester_id));
        }

        let evaluations = self
            .db_client
            .get_evaluations_for_agreement(agreement_id)
            .await?;

        let my_evaluation = evaluations
            .iter()
            .find(|e| e.author_id == requester_id)
            .cloned();
        let other = evaluations.iter().find(|e| e.author_id != requester_id);

        let is_public = evaluations.len() == 2 && evaluations.iter().all(|e| e.is_public);
        let other_evaluation = other.filter(|e| e.is_public).cloned();

        let window_open = agreement.status == AgreementStatus::Closed
            && evaluation_window_open(
                agreement.closed_at.unwrap_or(agreement.updated_at),
                Utc::now(),
            );
        let can_evaluate = my_evaluation.is_none() && window_open;

        Ok(AgreementEvaluationsDto {
            my_evaluation,
            other_evaluation,
            can_evaluate,
            is_public,
        })
    }

    pub async fn evaluations_received(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<EvaluationWithAuthor>, i64), ServiceError> {
        let offset = ((page - 1) as i64) * limit as i64;
        Ok(self
            .db_client
            .list_public_evaluations_received(user_id, limit as i64, offset)
            .await?)
    }

    pub async fn evaluations_given(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<WorkEvaluation>, i64), ServiceError> {
        let offset = ((page - 1) as i64) * limit as i64;
        Ok(self
            .db_client
            .list_evaluations_given(user_id, limit as i64, offset)
            .await?)
    }
}
