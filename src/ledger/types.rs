use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::agreementmodel::AgreementStatus;
use crate::models::proposalmodel::WorkPaymentType;

/// Agreement status vocabulary as the ledger pallet encodes it. Kept as a
/// separate enum from the off-chain one so either side can grow variants
/// without silently shifting the other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LedgerAgreementStatus {
    Active,
    Paused,
    Closed,
}

impl From<AgreementStatus> for LedgerAgreementStatus {
    fn from(status: AgreementStatus) -> Self {
        match status {
            AgreementStatus::Active => LedgerAgreementStatus::Active,
            AgreementStatus::Paused => LedgerAgreementStatus::Paused,
            AgreementStatus::Closed => LedgerAgreementStatus::Closed,
        }
    }
}

impl LedgerAgreementStatus {
    pub fn as_off_chain(&self) -> AgreementStatus {
        match self {
            LedgerAgreementStatus::Active => AgreementStatus::Active,
            LedgerAgreementStatus::Paused => AgreementStatus::Paused,
            LedgerAgreementStatus::Closed => AgreementStatus::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LedgerPaymentType {
    External,
    BazariPay,
    Undefined,
}

impl LedgerPaymentType {
    pub fn from_payment_type(payment_type: WorkPaymentType) -> Self {
        match payment_type {
            WorkPaymentType::External => LedgerPaymentType::External,
            WorkPaymentType::BazariPay => LedgerPaymentType::BazariPay,
            WorkPaymentType::Undefined => LedgerPaymentType::Undefined,
        }
    }
}

/// Agreement record as stored by the pallet. Timestamps are block numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnChainRecord {
    pub id_hash: String,
    pub company: String,
    pub worker: String,
    pub payment_type: LedgerPaymentType,
    pub status: LedgerAgreementStatus,
    pub created_at: u64,
    pub closed_at: Option<u64>,
}

/// Raw (module, error) index pair attached to a failed call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleErrorRef {
    pub module_index: u32,
    pub error_index: u32,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct LedgerMetadata {
    pub modules: Vec<ModuleMetadata>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModuleMetadata {
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub errors: Vec<ErrorMetadata>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ErrorMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl LedgerMetadata {
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name == name)
    }

    /// Resolves a raw index pair into the named pallet error, or None when
    /// the indices fall outside what this metadata snapshot knows.
    pub fn decode_error(&self, error: &ModuleErrorRef) -> Option<LedgerError> {
        let module = self
            .modules
            .iter()
            .find(|m| m.index == error.module_index)?;
        let entry = module.errors.get(error.error_index as usize)?;
        Some(LedgerError::Execution {
            module: module.name.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
        })
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The call was sent but inclusion was never observed. The outcome is
    /// unknown, so callers must recheck chain state before resubmitting.
    #[error("call {tx_hash} not included after {waited_secs}s, outcome unknown")]
    InclusionTimeout { tx_hash: String, waited_secs: u64 },

    /// The ledger executed the call and rejected it. Resubmitting the same
    /// call can only fail the same way.
    #[error("{module}.{name}: {description}")]
    Execution {
        module: String,
        name: String,
        description: String,
    },

    #[error("ledger response decode: {0}")]
    Decode(String),

    #[error("ledger signer: {0}")]
    Signer(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Transport(_)
                | LedgerError::Rpc { .. }
                | LedgerError::InclusionTimeout { .. }
        )
    }
}

/// Receipt for a call that made it into a block.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub tx_hash: String,
    pub block_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> LedgerMetadata {
        serde_json::from_value(serde_json::json!({
            "modules": [
                {
                    "index": 4,
                    "name": "balances",
                    "errors": [
                        { "name": "InsufficientBalance", "description": "Balance too low to send value." }
                    ]
                },
                {
                    "index": 51,
                    "name": "bazariWorkAgreements",
                    "errors": [
                        { "name": "AlreadyExists", "description": "An agreement with this id hash already exists." },
                        { "name": "NotFound", "description": "No agreement with this id hash." },
                        { "name": "InvalidTransition", "description": "The requested status change is not allowed." }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn status_mapping_round_trips() {
        for status in [
            AgreementStatus::Active,
            AgreementStatus::Paused,
            AgreementStatus::Closed,
        ] {
            let on_chain = LedgerAgreementStatus::from(status);
            assert_eq!(on_chain.as_off_chain(), status);
        }
    }

    #[test]
    fn payment_type_maps_one_to_one() {
        assert_eq!(
            LedgerPaymentType::from_payment_type(WorkPaymentType::External),
            LedgerPaymentType::External
        );
        assert_eq!(
            LedgerPaymentType::from_payment_type(WorkPaymentType::BazariPay),
            LedgerPaymentType::BazariPay
        );
        assert_eq!(
            LedgerPaymentType::from_payment_type(WorkPaymentType::Undefined),
            LedgerPaymentType::Undefined
        );
    }

    #[test]
    fn metadata_decodes_known_module_error() {
        let meta = sample_metadata();
        let decoded = meta
            .decode_error(&ModuleErrorRef {
                module_index: 51,
                error_index: 0,
            })
            .unwrap();
        match decoded {
            LedgerError::Execution { module, name, .. } => {
                assert_eq!(module, "bazariWorkAgreements");
                assert_eq!(name, "AlreadyExists");
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn metadata_rejects_unknown_indices() {
        let meta = sample_metadata();
        assert!(meta
            .decode_error(&ModuleErrorRef {
                module_index: 99,
                error_index: 0
            })
            .is_none());
        assert!(meta
            .decode_error(&ModuleErrorRef {
                module_index: 51,
                error_index: 42
            })
            .is_none());
    }

    #[test]
    fn module_lookup_by_name() {
        let meta = sample_metadata();
        assert!(meta.has_module("bazariWorkAgreements"));
        assert!(!meta.has_module("bazariEscrow"));
    }

    #[test]
    fn execution_errors_are_permanent() {
        let err = LedgerError::Execution {
            module: "bazariWorkAgreements".to_string(),
            name: "AlreadyExists".to_string(),
            description: String::new(),
        };
        assert!(!err.is_retryable());
        let timeout = LedgerError::InclusionTimeout {
            tx_hash: "0xabc".to_string(),
            waited_secs: 90,
        };
        assert!(timeout.is_retryable());
        let rpc = LedgerError::Rpc {
            code: -32000,
            message: "busy".to_string(),
        };
        assert!(rpc.is_retryable());
    }

    #[test]
    fn on_chain_record_wire_shape() {
        let record: OnChainRecord = serde_json::from_value(serde_json::json!({
            "idHash": "0xabc",
            "company": "0xC0ffee254729296a45a3885639AC7E10F9d54979",
            "worker": "0x999999cf1046e68e36E1aA2E0E07105eDDD1f08E",
            "paymentType": "BazariPay",
            "status": "Paused",
            "createdAt": 12001,
            "closedAt": null
        }))
        .unwrap();
        assert_eq!(record.status, LedgerAgreementStatus::Paused);
        assert_eq!(record.payment_type, LedgerPaymentType::BazariPay);
        assert_eq!(record.closed_at, None);
    }
}
