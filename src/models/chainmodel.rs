use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agreementmodel::AgreementStatus;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "chain_sync_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainSyncKind {
    Register,
    MirrorStatus,
}

impl ChainSyncKind {
    pub fn to_str(&self) -> &str {
        match self {
            ChainSyncKind::Register => "REGISTER",
            ChainSyncKind::MirrorStatus => "MIRROR_STATUS",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "chain_sync_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainSyncStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One queued ledger write. Jobs for the same agreement are executed in
/// insertion order; the BIGSERIAL id carries that order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChainSyncJob {
    pub id: i64,
    pub agreement_id: Uuid,
    pub kind: ChainSyncKind,
    pub target_status: Option<AgreementStatus>,
    pub status: ChainSyncStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_tx_hash: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
