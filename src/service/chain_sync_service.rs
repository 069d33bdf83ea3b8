use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::{
    db::agreementdb::AgreementExt,
    db::chainsyncdb::ChainSyncExt,
    db::db::DBClient,
    db::userdb::UserExt,
    dtos::workdtos::OnChainStatusDto,
    ledger::client::LedgerClient,
    ledger::hashing::agreement_id_hash,
    ledger::types::{LedgerAgreementStatus, LedgerError, LedgerPaymentType},
    models::agreementmodel::WorkAgreement,
    models::chainmodel::{ChainSyncJob, ChainSyncKind, ChainSyncStatus},
    service::error::ServiceError,
};

pub const MAX_SYNC_ATTEMPTS: i32 = 5;
pub const CLAIM_LEASE_SECS: f64 = 300.0;

const BACKOFF_BASE_SECS: i64 = 30;
const BACKOFF_CAP_SECS: i64 = 3600;
const DEFER_SECS: i64 = 60;
const IDLE_SLEEP_SECS: u64 = 5;

/// What one execution of a queued job decided.
#[derive(Debug)]
enum JobOutcome {
    Done { tx_hash: Option<String> },
    Retry { error: String, tx_hash: Option<String> },
    Wait { note: String },
    Abort { error: String },
}

/// What a register job should do for an agreement, given the parties'
/// wallet state.
#[derive(Debug, PartialEq)]
enum RegisterStep {
    /// on_chain_id already set; registering again submits nothing.
    AlreadyRegistered,
    /// This party has no linked wallet; the job fails permanently.
    MissingWallet(Uuid),
    Submit {
        id_hash: String,
        worker_wallet: String,
        payment_type: LedgerPaymentType,
    },
}

fn plan_register(
    agreement: &WorkAgreement,
    company_wallet: Option<&str>,
    worker_wallet: Option<&str>,
) -> RegisterStep {
    if agreement.on_chain_id.is_some() {
        return RegisterStep::AlreadyRegistered;
    }
    if company_wallet.is_none() {
        return RegisterStep::MissingWallet(agreement.company_id);
    }
    let Some(worker_wallet) = worker_wallet else {
        return RegisterStep::MissingWallet(agreement.worker_id);
    };
    RegisterStep::Submit {
        id_hash: agreement_id_hash(agreement.id),
        worker_wallet: worker_wallet.to_string(),
        payment_type: LedgerPaymentType::from_payment_type(agreement.payment_type),
    }
}

/// Replays committed agreement state onto the ledger. Agreements are the
/// source of truth; nothing here ever writes back into them except the
/// registration columns.
#[derive(Debug, Clone)]
pub struct ChainSyncService {
    db_client: Arc<DBClient>,
    ledger: Arc<LedgerClient>,
}

impl ChainSyncService {
    pub fn new(db_client: Arc<DBClient>, ledger: Arc<LedgerClient>) -> Self {
        Self { db_client, ledger }
    }

    /// Runs the worker loop until the provided shutdown signal triggers.
    /// Jobs are claimed one at a time; an empty queue is polled again after
    /// a short sleep.
    pub async fn run_forever(&self, shutdown: impl std::future::Future<Output = ()>) {
        let mut shutdown = Box::pin(shutdown);

        loop {
            // Check shutdown first
            if futures::future::poll_immediate(&mut shutdown).await.is_some() {
                tracing::info!("chain sync worker: shutdown requested, exiting loop");
                break;
            }

            let processed = self.drain_due_jobs().await;
            if processed > 0 {
                tracing::debug!("chain sync worker: processed {} queued jobs", processed);
            } else {
                tokio::time::sleep(std::time::Duration::from_secs(IDLE_SLEEP_SECS)).await;
            }
        }

        tracing::info!("chain sync worker: stopped");
    }

    /// Claims and runs due jobs until the queue has none left, returning
    /// how many were processed.
    pub async fn drain_due_jobs(&self) -> u64 {
        let mut processed = 0;
        loop {
            let job = match self.db_client.claim_due_chain_job(CLAIM_LEASE_SECS).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("chain sync queue poll failed: {}", e);
                    break;
                }
            };
            if let Err(e) = self.process_job(&job).await {
                tracing::error!(job_id = job.id, "chain sync bookkeeping failed: {}", e);
                break;
            }
            processed += 1;
        }
        processed
    }

    pub async fn process_job(&self, job: &ChainSyncJob) -> Result<(), sqlx::Error> {
        let outcome = match job.kind {
            ChainSyncKind::Register => self.run_register(job).await,
            ChainSyncKind::MirrorStatus => self.run_mirror(job).await,
        };

        match outcome {
            JobOutcome::Done { tx_hash } => {
                tracing::info!(
                    job_id = job.id,
                    agreement_id = %job.agreement_id,
                    kind = job.kind.to_str(),
                    "chain sync job completed"
                );
                self.db_client
                    .mark_chain_job_succeeded(job.id, tx_hash.as_deref())
                    .await
            }
            JobOutcome::Retry { error, tx_hash } => {
                let attempts_made = job.attempts + 1;
                if attempts_made >= MAX_SYNC_ATTEMPTS {
                    tracing::error!(
                        job_id = job.id,
                        agreement_id = %job.agreement_id,
                        "chain sync job failed after {} attempts: {}",
                        attempts_made,
                        error
                    );
                    self.db_client.mark_chain_job_failed(job.id, &error).await
                } else {
                    let next_attempt_at = Utc::now() + backoff_delay(attempts_made);
                    tracing::warn!(
                        job_id = job.id,
                        agreement_id = %job.agreement_id,
                        "chain sync attempt {} failed, retrying: {}",
                        attempts_made,
                        error
                    );
                    self.db_client
                        .reschedule_chain_job(job.id, next_attempt_at, &error, tx_hash.as_deref())
                        .await
                }
            }
            JobOutcome::Wait { note } => {
                tracing::debug!(
                    job_id = job.id,
                    agreement_id = %job.agreement_id,
                    "chain sync job deferred: {}",
                    note
                );
                self.db_client
                    .defer_chain_job(job.id, Utc::now() + Duration::seconds(DEFER_SECS), &note)
                    .await
            }
            JobOutcome::Abort { error } => {
                tracing::error!(
                    job_id = job.id,
                    agreement_id = %job.agreement_id,
                    "chain sync job abandoned: {}",
                    error
                );
                self.db_client.mark_chain_job_failed(job.id, &error).await
            }
        }
    }

    async fn run_register(&self, job: &ChainSyncJob) -> JobOutcome {
        let agreement = match self.db_client.get_agreement(job.agreement_id).await {
            Ok(Some(agreement)) => agreement,
            Ok(None) => {
                return JobOutcome::Abort {
                    error: format!("agreement {} no longer exists", job.agreement_id),
                }
            }
            Err(e) => {
                return JobOutcome::Retry {
                    error: format!("agreement lookup failed: {}", e),
                    tx_hash: None,
                }
            }
        };

        // a second registration request is a no-op, checked before any
        // wallet or ledger traffic
        if agreement.on_chain_id.is_some() {
            return JobOutcome::Done { tx_hash: None };
        }

        let company_wallet = match self.party_wallet(agreement.company_id).await {
            Ok(wallet) => wallet,
            Err(e) => return JobOutcome::Retry { error: e, tx_hash: None },
        };
        let worker_wallet = match self.party_wallet(agreement.worker_id).await {
            Ok(wallet) => wallet,
            Err(e) => return JobOutcome::Retry { error: e, tx_hash: None },
        };

        let (id_hash, worker_wallet, payment_type) = match plan_register(
            &agreement,
            company_wallet.as_deref(),
            worker_wallet.as_deref(),
        ) {
            RegisterStep::AlreadyRegistered => return JobOutcome::Done { tx_hash: None },
            RegisterStep::MissingWallet(user_id) => {
                return JobOutcome::Abort {
                    error: format!("party {} has no linked wallet", user_id),
                }
            }
            RegisterStep::Submit {
                id_hash,
                worker_wallet,
                payment_type,
            } => (id_hash, worker_wallet, payment_type),
        };

        if !self.ledger.is_available().await {
            return JobOutcome::Wait {
                note: "work agreements module not present on the ledger".to_string(),
            };
        }

        // a retry may follow an attempt whose receipt was lost; the chain is
        // checked before submitting again
        if job.attempts > 0 {
            match self.ledger.agreement(&id_hash).await {
                Ok(Some(_)) => {
                    if let Err(e) = self
                        .db_client
                        .set_on_chain_registration(agreement.id, &id_hash, job.last_tx_hash.as_deref())
                        .await
                    {
                        return JobOutcome::Retry {
                            error: format!(
                                "registration found on chain but could not be persisted: {}",
                                e
                            ),
                            tx_hash: job.last_tx_hash.clone(),
                        };
                    }
                    return JobOutcome::Done {
                        tx_hash: job.last_tx_hash.clone(),
                    };
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    return JobOutcome::Retry {
                        error: e.to_string(),
                        tx_hash: None,
                    }
                }
                Err(e) => return JobOutcome::Abort { error: e.to_string() },
            }
        }

        match self
            .ledger
            .create_agreement(&id_hash, &worker_wallet, payment_type)
            .await
        {
            Ok(outcome) => {
                match self
                    .db_client
                    .set_on_chain_registration(agreement.id, &id_hash, Some(&outcome.tx_hash))
                    .await
                {
                    Ok(()) => JobOutcome::Done {
                        tx_hash: Some(outcome.tx_hash),
                    },
                    Err(e) => JobOutcome::Retry {
                        error: format!("registered on chain but could not be persisted: {}", e),
                        tx_hash: Some(outcome.tx_hash),
                    },
                }
            }
            Err(LedgerError::InclusionTimeout { tx_hash, waited_secs }) => JobOutcome::Retry {
                error: format!("transaction {} not included after {}s", tx_hash, waited_secs),
                tx_hash: Some(tx_hash),
            },
            Err(e) if e.is_retryable() => JobOutcome::Retry {
                error: e.to_string(),
                tx_hash: None,
            },
            Err(e) => JobOutcome::Abort { error: e.to_string() },
        }
    }

    async fn run_mirror(&self, job: &ChainSyncJob) -> JobOutcome {
        let Some(target) = job.target_status else {
            return JobOutcome::Abort {
                error: "mirror job carries no target status".to_string(),
            };
        };

        let agreement = match self.db_client.get_agreement(job.agreement_id).await {
            Ok(Some(agreement)) => agreement,
            Ok(None) => {
                return JobOutcome::Abort {
                    error: format!("agreement {} no longer exists", job.agreement_id),
                }
            }
            Err(e) => {
                return JobOutcome::Retry {
                    error: format!("agreement lookup failed: {}", e),
                    tx_hash: None,
                }
            }
        };

        // queue order puts the register job first, so a missing id means
        // registration failed for good or never happened
        let Some(on_chain_id) = agreement.on_chain_id.clone() else {
            return match self
                .db_client
                .get_latest_chain_job(job.agreement_id, ChainSyncKind::Register)
                .await
            {
                Ok(Some(register)) if register.status == ChainSyncStatus::Failed => {
                    JobOutcome::Abort {
                        error: "registration failed, nothing to mirror".to_string(),
                    }
                }
                Ok(Some(_)) => JobOutcome::Wait {
                    note: "registration not confirmed yet".to_string(),
                },
                Ok(None) => JobOutcome::Abort {
                    error: "agreement was never queued for registration".to_string(),
                },
                Err(e) => JobOutcome::Retry {
                    error: format!("register job lookup failed: {}", e),
                    tx_hash: None,
                },
            };
        };

        if !self.ledger.is_available().await {
            return JobOutcome::Wait {
                note: "work agreements module not present on the ledger".to_string(),
            };
        }

        if job.attempts > 0 {
            match self.ledger.agreement(&on_chain_id).await {
                Ok(Some(record)) if record.status.as_off_chain() == target => {
                    return JobOutcome::Done {
                        tx_hash: job.last_tx_hash.clone(),
                    };
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    return JobOutcome::Abort {
                        error: "agreement is marked registered but the ledger has no record of it"
                            .to_string(),
                    }
                }
                Err(e) if e.is_retryable() => {
                    return JobOutcome::Retry {
                        error: e.to_string(),
                        tx_hash: None,
                    }
                }
                Err(e) => return JobOutcome::Abort { error: e.to_string() },
            }
        }

        match self
            .ledger
            .update_status(&on_chain_id, LedgerAgreementStatus::from(target))
            .await
        {
            Ok(outcome) => JobOutcome::Done {
                tx_hash: Some(outcome.tx_hash),
            },
            Err(LedgerError::InclusionTimeout { tx_hash, waited_secs }) => JobOutcome::Retry {
                error: format!("transaction {} not included after {}s", tx_hash, waited_secs),
                tx_hash: Some(tx_hash),
            },
            Err(e) if e.is_retryable() => JobOutcome::Retry {
                error: e.to_string(),
                tx_hash: None,
            },
            Err(e) => JobOutcome::Abort { error: e.to_string() },
        }
    }

    /// Registration view for one agreement. Ledger trouble degrades to the
    /// off-chain columns instead of failing the read.
    pub async fn on_chain_status(
        &self,
        agreement: &WorkAgreement,
    ) -> Result<OnChainStatusDto, ServiceError> {
        let Some(on_chain_id) = agreement.on_chain_id.clone() else {
            return Ok(OnChainStatusDto {
                registered: false,
                on_chain_id: None,
                tx_hash: None,
                data: None,
            });
        };

        let data = match self.ledger.agreement(&on_chain_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(agreement_id = %agreement.id, "on-chain lookup failed: {}", e);
                None
            }
        };

        Ok(OnChainStatusDto {
            registered: true,
            on_chain_id: Some(on_chain_id),
            tx_hash: agreement.on_chain_tx_hash.clone(),
            data,
        })
    }

    pub async fn pending_jobs(&self) -> Result<i64, ServiceError> {
        Ok(self.db_client.count_chain_jobs(ChainSyncStatus::Pending).await?)
    }

    async fn party_wallet(&self, user_id: Uuid) -> Result<Option<String>, String> {
        match self.db_client.get_user(Some(user_id), None).await {
            Ok(Some(user)) => Ok(user.wallet_address),
            Ok(None) => Ok(None),
            Err(e) => Err(format!("wallet lookup for {} failed: {}", user_id, e)),
        }
    }
}

/// Exponential backoff with a ±20% spread, capped at an hour.
fn backoff_delay(attempts_made: i32) -> Duration {
    let exponent = (attempts_made - 1).clamp(0, 16) as u32;
    let base_secs = BACKOFF_BASE_SECS
        .saturating_mul(1_i64 << exponent)
        .min(BACKOFF_CAP_SECS);
    let jitter = rand::rng().random_range(0.8..1.2);
    Duration::milliseconds((base_secs as f64 * 1000.0 * jitter) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agreementmodel::AgreementStatus;
    use crate::models::proposalmodel::{ValuePeriod, WorkPaymentType};

    fn agreement() -> WorkAgreement {
        let now = chrono::Utc::now();
        WorkAgreement {
            id: Uuid::new_v4(),
            proposal_id: None,
            company_id: Uuid::new_v4(),
            worker_id: Uuid::new_v4(),
            title: "Refit the depot".to_string(),
            description: "Racking and lighting".to_string(),
            terms: None,
            agreed_value: None,
            value_period: ValuePeriod::Project,
            value_currency: "BZR".to_string(),
            payment_type: WorkPaymentType::BazariPay,
            status: AgreementStatus::Active,
            start_date: now,
            end_date: None,
            paused_at: None,
            closed_at: None,
            closed_reason: None,
            on_chain_id: None,
            on_chain_tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn register_is_a_no_op_once_on_chain_id_is_set() {
        let mut registered = agreement();
        registered.on_chain_id = Some(agreement_id_hash(registered.id));

        // Wallet state is irrelevant; nothing may be submitted again.
        assert_eq!(
            plan_register(&registered, Some("0xc0"), Some("0xw0")),
            RegisterStep::AlreadyRegistered
        );
        assert_eq!(
            plan_register(&registered, None, None),
            RegisterStep::AlreadyRegistered
        );
    }

    #[test]
    fn a_walletless_party_fails_registration_permanently() {
        let agreement = agreement();
        assert_eq!(
            plan_register(&agreement, None, Some("0xw0")),
            RegisterStep::MissingWallet(agreement.company_id)
        );
        assert_eq!(
            plan_register(&agreement, Some("0xc0"), None),
            RegisterStep::MissingWallet(agreement.worker_id)
        );
    }

    #[test]
    fn registration_submits_under_the_derived_hash() {
        let agreement = agreement();
        match plan_register(&agreement, Some("0xc0"), Some("0xw0")) {
            RegisterStep::Submit {
                id_hash,
                worker_wallet,
                payment_type,
            } => {
                assert_eq!(id_hash, agreement_id_hash(agreement.id));
                assert_eq!(worker_wallet, "0xw0");
                assert_eq!(payment_type, LedgerPaymentType::BazariPay);
            }
            other => panic!("expected a submission, got {other:?}"),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        for _ in 0..20 {
            let first = backoff_delay(1).num_milliseconds();
            assert!((24_000..36_000).contains(&first));

            let third = backoff_delay(3).num_milliseconds();
            assert!((96_000..144_000).contains(&third));

            let late = backoff_delay(12).num_milliseconds();
            assert!((2_880_000..4_320_000).contains(&late));
        }
    }

    #[test]
    fn backoff_tolerates_a_zero_attempt_count() {
        let delay = backoff_delay(0).num_milliseconds();
        assert!((24_000..36_000).contains(&delay));
    }
}
