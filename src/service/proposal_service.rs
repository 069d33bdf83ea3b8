use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    db::agreementdb::AgreementExt,
    db::chainsyncdb::ChainSyncExt,
    db::db::DBClient,
    db::proposaldb::ProposalExt,
    db::userdb::UserExt,
    dtos::workdtos::*,
    models::chainmodel::ChainSyncKind,
    models::proposalmodel::*,
    service::{chat_service::ChatService, error::ServiceError},
    utils::sanitize::sanitize_text,
};

/// Whether a proposal can still be acted on, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LiveCheck {
    Live,
    Lapsed,
    Settled(ProposalStatus),
}

fn check_live(proposal: &WorkProposal, now: chrono::DateTime<Utc>) -> LiveCheck {
    if proposal.has_lapsed(now) {
        LiveCheck::Lapsed
    } else if !proposal.status.is_live() {
        LiveCheck::Settled(proposal.status)
    } else {
        LiveCheck::Live
    }
}

#[derive(Debug, Clone)]
pub struct ProposalService {
    db_client: Arc<DBClient>,
    chat_service: Arc<ChatService>,
}

impl ProposalService {
    pub fn new(db_client: Arc<DBClient>, chat_service: Arc<ChatService>) -> Self {
        Self {
            db_client,
            chat_service,
        }
    }

    pub async fn create_proposal(
        &self,
        sender_id: Uuid,
        dto: CreateProposalDto,
    ) -> Result<WorkProposal, ServiceError> {
        if dto.receiver_id == sender_id {
            return Err(ServiceError::Validation(
                "You cannot send a proposal to yourself".to_string(),
            ));
        }

        let receiver = self.db_client.get_user(Some(dto.receiver_id), None).await?;
        if receiver.is_none() {
            return Err(ServiceError::Validation(
                "Receiver does not exist".to_string(),
            ));
        }

        // one live proposal per sender/receiver pair, across all postings
        if self
            .db_client
            .has_live_proposal(sender_id, dto.receiver_id)
            .await?
        {
            return Err(ServiceError::DuplicateProposal(dto.receiver_id));
        }

        let proposed_value = match dto.proposed_value {
            Some(value) => Some(BigDecimal::try_from(value).map_err(|_| {
                ServiceError::Validation("Proposed value is not a valid amount".to_string())
            })?),
            None => None,
        };

        let description = sanitize_text(&dto.description);
        let expires_at = Utc::now() + Duration::days(PROPOSAL_TTL_DAYS);

        let proposal = self
            .db_client
            .create_proposal(
                sender_id,
                dto.receiver_id,
                dto.company_id,
                dto.job_posting_id,
                dto.title.trim(),
                &description,
                proposed_value,
                dto.value_period.unwrap_or(ValuePeriod::Project),
                dto.value_currency.as_deref().unwrap_or("BZR"),
                dto.payment_type.unwrap_or(WorkPaymentType::Undefined),
                expires_at,
            )
            .await?;

        tracing::info!(
            proposal_id = %proposal.id,
            sender_id = %sender_id,
            "work proposal created"
        );

        Ok(proposal)
    }

    pub async fn get_proposal(
        &self,
        proposal_id: Uuid,
        requester_id: Uuid,
    ) -> Result<WorkProposal, ServiceError> {
        let proposal = self
            .db_client
            .get_proposal(proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;

        if !proposal.is_party(requester_id) {
            return Err(ServiceError::Forbidden(requester_id));
        }

        if proposal.has_lapsed(Utc::now()) {
            if let Some(expired) = self.db_client.mark_proposal_expired(proposal_id).await? {
                return Ok(expired);
            }
            let refreshed = self
                .db_client
                .get_proposal(proposal_id)
                .await?
                .ok_or(ServiceError::ProposalNotFound(proposal_id))?;
            return Ok(refreshed);
        }

        Ok(proposal)
    }

    pub async fn list_proposals(
        &self,
        user_id: Uuid,
        mailbox: ProposalMailbox,
        status: Option<ProposalStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<WorkProposal>, i64), ServiceError> {
        let offset = ((page - 1) as i64) * limit as i64;
        let (mut proposals, total) = self
            .db_client
            .list_proposals(user_id, mailbox, status, limit as i64, offset)
            .await?;

        // overdue rows read as EXPIRED even before a sweep persists it
        let now = Utc::now();
        for proposal in proposals.iter_mut() {
            if proposal.has_lapsed(now) {
                proposal.status = ProposalStatus::Expired;
            }
        }

        Ok((proposals, total))
    }

    pub async fn start_negotiation(
        &self,
        proposal_id: Uuid,
        caller_id: Uuid,
        dto: StartNegotiationDto,
    ) -> Result<WorkProposal, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let proposal = self
            .db_client
            .lock_proposal_tx(&mut tx, proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;

        if proposal.receiver_id != caller_id {
            return Err(ServiceError::Forbidden(caller_id));
        }

        let mut tx = self.ensure_live_tx(tx, &proposal).await?;

        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalState(
                proposal_id,
                proposal.status,
            ));
        }

        let mut updated = self
            .db_client
            .begin_negotiation_tx(&mut tx, proposal_id)
            .await?;

        tx.commit().await?;

        tracing::info!(proposal_id = %proposal_id, "proposal moved to negotiation");

        // the side channel opens only after the transition holds, so a race
        // loser never leaves a stray thread at the messaging service
        if let Some(thread) = self
            .chat_service
            .create_thread(proposal.id, [proposal.sender_id, proposal.receiver_id])
            .await
        {
            updated = self
                .db_client
                .attach_chat_thread(proposal_id, &thread)
                .await?;
        }

        if let (Some(thread), Some(message)) =
            (updated.chat_thread_id.as_deref(), dto.message.as_deref())
        {
            self.chat_service
                .post_system_message(thread, &sanitize_text(message))
                .await;
        }

        Ok(updated)
    }

    /// Gate shared by the locked mutators. A lapsed proposal is flipped to
    /// EXPIRED and that flip committed before the caller's action is refused.
    async fn ensure_live_tx<'a>(
        &self,
        mut tx: sqlx::Transaction<'a, sqlx::Postgres>,
        proposal: &WorkProposal,
    ) -> Result<sqlx::Transaction<'a, sqlx::Postgres>, ServiceError> {
        match check_live(proposal, Utc::now()) {
            LiveCheck::Live => Ok(tx),
            LiveCheck::Lapsed => {
                self.db_client
                    .set_proposal_status_tx(&mut tx, proposal.id, ProposalStatus::Expired, false)
                    .await?;
                tx.commit().await?;
                Err(ServiceError::InvalidProposalState(
                    proposal.id,
                    ProposalStatus::Expired,
                ))
            }
            LiveCheck::Settled(status) => {
                Err(ServiceError::InvalidProposalState(proposal.id, status))
            }
        }
    }

    pub async fn counter_offer(
        &self,
        proposal_id: Uuid,
        caller_id: Uuid,
        dto: CounterOfferDto,
    ) -> Result<WorkProposal, ServiceError> {
        let proposed_value = match dto.proposed_value {
            Some(value) => Some(BigDecimal::try_from(value).map_err(|_| {
                ServiceError::Validation("Proposed value is not a valid amount".to_string())
            })?),
            None => None,
        };
        let description = dto.description.as_deref().map(sanitize_text);

        let mut tx = self.db_client.pool.begin().await?;

        let proposal = self
            .db_client
            .lock_proposal_tx(&mut tx, proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;

        if !proposal.is_party(caller_id) {
            return Err(ServiceError::Forbidden(caller_id));
        }

        let mut tx = self.ensure_live_tx(tx, &proposal).await?;

        if proposal.status != ProposalStatus::Negotiating {
            return Err(ServiceError::InvalidProposalState(
                proposal_id,
                proposal.status,
            ));
        }

        let updated = self
            .db_client
            .apply_counter_offer_tx(
                &mut tx,
                proposal_id,
                dto.title.as_deref().map(str::trim),
                description.as_deref(),
                proposed_value,
                dto.value_period,
                dto.payment_type,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            proposal_id = %proposal_id,
            user_id = %caller_id,
            "counter offer recorded"
        );

        if let (Some(thread), Some(message)) =
            (updated.chat_thread_id.as_deref(), dto.message.as_deref())
        {
            self.chat_service
                .post_system_message(thread, &sanitize_text(message))
                .await;
        }

        Ok(updated)
    }

    /// Acceptance, agreement creation and the ledger registration job all
    /// commit in one transaction.
    pub async fn accept_proposal(
        &self,
        proposal_id: Uuid,
        caller_id: Uuid,
    ) -> Result<ProposalAcceptedDto, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let proposal = self
            .db_client
            .lock_proposal_tx(&mut tx, proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;

        if proposal.receiver_id != caller_id {
            return Err(ServiceError::Forbidden(caller_id));
        }

        let mut tx = self.ensure_live_tx(tx, &proposal).await?;

        let accepted = self
            .db_client
            .set_proposal_status_tx(&mut tx, proposal_id, ProposalStatus::Accepted, true)
            .await?;

        let (company_id, worker_id) = accepted.agreement_parties();
        let agreement = self
            .db_client
            .create_agreement_from_proposal_tx(&mut tx, &accepted, company_id, worker_id)
            .await?;

        self.db_client
            .enqueue_chain_job_tx(&mut tx, agreement.id, ChainSyncKind::Register, None)
            .await?;

        tx.commit().await?;

        tracing::info!(
            proposal_id = %proposal_id,
            agreement_id = %agreement.id,
            "proposal accepted, agreement created"
        );

        if let Some(thread) = accepted.chat_thread_id.as_deref() {
            self.chat_service
                .post_system_message(thread, "Proposal accepted. A work agreement has been created.")
                .await;
        }

        Ok(ProposalAcceptedDto {
            proposal: accepted,
            agreement,
        })
    }

    pub async fn reject_proposal(
        &self,
        proposal_id: Uuid,
        caller_id: Uuid,
        dto: RejectProposalDto,
    ) -> Result<WorkProposal, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let proposal = self
            .db_client
            .lock_proposal_tx(&mut tx, proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;

        if proposal.receiver_id != caller_id {
            return Err(ServiceError::Forbidden(caller_id));
        }

        let mut tx = self.ensure_live_tx(tx, &proposal).await?;

        let updated = self
            .db_client
            .set_proposal_status_tx(&mut tx, proposal_id, ProposalStatus::Rejected, true)
            .await?;

        tx.commit().await?;

        tracing::info!(proposal_id = %proposal_id, "proposal rejected");

        if let Some(thread) = updated.chat_thread_id.as_deref() {
            let note = match dto.reason.as_deref() {
                Some(reason) => format!("Proposal rejected: {}", sanitize_text(reason)),
                None => "Proposal rejected.".to_string(),
            };
            self.chat_service.post_system_message(thread, &note).await;
        }

        Ok(updated)
    }

    pub async fn cancel_proposal(
        &self,
        proposal_id: Uuid,
        caller_id: Uuid,
    ) -> Result<WorkProposal, ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let proposal = self
            .db_client
            .lock_proposal_tx(&mut tx, proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;

        if proposal.sender_id != caller_id {
            return Err(ServiceError::Forbidden(caller_id));
        }

        let mut tx = self.ensure_live_tx(tx, &proposal).await?;

        let updated = self
            .db_client
            .set_proposal_status_tx(&mut tx, proposal_id, ProposalStatus::Cancelled, false)
            .await?;

        tx.commit().await?;

        tracing::info!(proposal_id = %proposal_id, "proposal cancelled by sender");

        if let Some(thread) = updated.chat_thread_id.as_deref() {
            self.chat_service
                .post_system_message(thread, "Proposal withdrawn by the sender.")
                .await;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn service() -> ProposalService {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/bazari").unwrap();
        let config = Config {
            database_url: "postgres://localhost/bazari".to_string(),
            jwt_secret: "secret".to_string(),
            port: 8000,
            ledger_rpc_url: "http://localhost:9966".to_string(),
            ledger_signer_key: "00".repeat(32),
            chat_service_url: None,
        };
        ProposalService::new(
            Arc::new(DBClient::new(pool)),
            Arc::new(ChatService::new(&config)),
        )
    }

    fn proposal(status: ProposalStatus, expires_in: Duration) -> WorkProposal {
        let now = Utc::now();
        WorkProposal {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            company_id: None,
            job_posting_id: None,
            title: "Rework the landing page".to_string(),
            description: "Copy, layout and a new hero image".to_string(),
            proposed_value: None,
            value_period: ValuePeriod::Project,
            value_currency: "BZR".to_string(),
            payment_type: WorkPaymentType::Undefined,
            status,
            chat_thread_id: None,
            expires_at: now + expires_in,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn live_proposals_pass_the_action_gate() {
        let now = Utc::now();
        let pending = proposal(ProposalStatus::Pending, Duration::days(1));
        let negotiating = proposal(ProposalStatus::Negotiating, Duration::days(1));
        assert_eq!(check_live(&pending, now), LiveCheck::Live);
        assert_eq!(check_live(&negotiating, now), LiveCheck::Live);
    }

    #[test]
    fn settled_proposals_are_refused_with_their_status() {
        let now = Utc::now();
        for status in [
            ProposalStatus::Accepted,
            ProposalStatus::Rejected,
            ProposalStatus::Cancelled,
            ProposalStatus::Expired,
        ] {
            let p = proposal(status, Duration::days(1));
            assert_eq!(check_live(&p, now), LiveCheck::Settled(status));
        }
    }

    #[test]
    fn overdue_proposals_read_as_lapsed_before_any_sweep() {
        let now = Utc::now();
        let p = proposal(ProposalStatus::Pending, Duration::days(-1));
        assert_eq!(check_live(&p, now), LiveCheck::Lapsed);
    }

    #[tokio::test]
    async fn self_addressed_proposals_are_rejected() {
        let user = Uuid::new_v4();
        let dto = CreateProposalDto {
            receiver_id: user,
            company_id: None,
            job_posting_id: None,
            title: "Build the storefront".to_string(),
            description: "Three screens and a checkout flow".to_string(),
            proposed_value: None,
            value_period: None,
            value_currency: None,
            payment_type: None,
        };

        let result = service().create_proposal(user, dto).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
