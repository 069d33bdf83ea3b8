use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::proposalmodel::{ValuePeriod, WorkPaymentType};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "agreement_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    Active,
    Paused,
    Closed,
}

impl AgreementStatus {
    pub fn to_str(&self) -> &str {
        match self {
            AgreementStatus::Active => "ACTIVE",
            AgreementStatus::Paused => "PAUSED",
            AgreementStatus::Closed => "CLOSED",
        }
    }

    /// CLOSED is terminal. ACTIVE and PAUSED swap freely, either can close.
    pub fn can_transition_to(&self, next: AgreementStatus) -> bool {
        use AgreementStatus::*;
        matches!(
            (self, next),
            (Active, Paused) | (Active, Closed) | (Paused, Active) | (Paused, Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgreementStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkAgreement {
    pub id: Uuid,
    pub proposal_id: Option<Uuid>,
    pub company_id: Uuid,
    pub worker_id: Uuid,
    pub title: String,
    pub description: String,
    pub terms: Option<String>,
    pub agreed_value: Option<BigDecimal>,
    pub value_period: ValuePeriod,
    pub value_currency: String,
    pub payment_type: WorkPaymentType,
    pub status: AgreementStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_reason: Option<String>,
    pub on_chain_id: Option<String>,
    pub on_chain_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkAgreement {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.company_id == user_id || self.worker_id == user_id
    }

    pub fn counterparty_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.company_id {
            Some(self.worker_id)
        } else if user_id == self.worker_id {
            Some(self.company_id)
        } else {
            None
        }
    }
}

/// Audit trail row, one per status change.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AgreementStatusChange {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub from_status: AgreementStatus,
    pub to_status: AgreementStatus,
    pub reason: Option<String>,
    pub changed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_terminal() {
        use AgreementStatus::*;
        assert!(!Closed.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Paused));
        assert!(!Closed.can_transition_to(Closed));
        assert!(Closed.is_terminal());
    }

    #[test]
    fn active_and_paused_swap_and_close() {
        use AgreementStatus::*;
        assert!(Active.can_transition_to(Paused));
        assert!(Active.can_transition_to(Closed));
        assert!(Paused.can_transition_to(Active));
        assert!(Paused.can_transition_to(Closed));
        // Self-loops are not transitions.
        assert!(!Active.can_transition_to(Active));
        assert!(!Paused.can_transition_to(Paused));
    }

    #[test]
    fn counterparty_resolution() {
        let company = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let now = Utc::now();
        let agreement = WorkAgreement {
            id: Uuid::new_v4(),
            proposal_id: None,
            company_id: company,
            worker_id: worker,
            title: "Fit out the kiosk".to_string(),
            description: "Shelving and counters".to_string(),
            terms: None,
            agreed_value: None,
            value_period: ValuePeriod::Project,
            value_currency: "BZR".to_string(),
            payment_type: WorkPaymentType::External,
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
        };
        assert_eq!(agreement.counterparty_of(company), Some(worker));
        assert_eq!(agreement.counterparty_of(worker), Some(company));
        assert_eq!(agreement.counterparty_of(stranger), None);
        assert!(!agreement.is_party(stranger));
    }
}
