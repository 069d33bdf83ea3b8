use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "value_period", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuePeriod {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Project,
}

impl ValuePeriod {
    pub fn to_str(&self) -> &str {
        match self {
            ValuePeriod::Hourly => "HOURLY",
            ValuePeriod::Daily => "DAILY",
            ValuePeriod::Weekly => "WEEKLY",
            ValuePeriod::Monthly => "MONTHLY",
            ValuePeriod::Project => "PROJECT",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "work_payment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkPaymentType {
    External,
    BazariPay,
    Undefined,
}

impl WorkPaymentType {
    pub fn to_str(&self) -> &str {
        match self {
            WorkPaymentType::External => "EXTERNAL",
            WorkPaymentType::BazariPay => "BAZARI_PAY",
            WorkPaymentType::Undefined => "UNDEFINED",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "proposal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Negotiating,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl ProposalStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Negotiating => "NEGOTIATING",
            ProposalStatus::Accepted => "ACCEPTED",
            ProposalStatus::Rejected => "REJECTED",
            ProposalStatus::Expired => "EXPIRED",
            ProposalStatus::Cancelled => "CANCELLED",
        }
    }

    /// Live proposals are the only ones that can still change hands.
    pub fn is_live(&self) -> bool {
        matches!(self, ProposalStatus::Pending | ProposalStatus::Negotiating)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

/// How long a proposal stays open before it lapses.
pub const PROPOSAL_TTL_DAYS: i64 = 15;

/// Which side of the inbox a proposal listing looks at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProposalMailbox {
    Sent,
    Received,
    All,
}

impl Default for ProposalMailbox {
    fn default() -> Self {
        ProposalMailbox::All
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkProposal {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub company_id: Option<Uuid>,
    pub job_posting_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub proposed_value: Option<BigDecimal>,
    pub value_period: ValuePeriod,
    pub value_currency: String,
    pub payment_type: WorkPaymentType,
    pub status: ProposalStatus,
    pub chat_thread_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkProposal {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// A proposal past its deadline is dead even if the row still says
    /// PENDING or NEGOTIATING. Callers persist the flip lazily.
    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status.is_live() && self.expires_at <= now
    }

    /// Resolves which side of the eventual agreement is the company and
    /// which is the worker. An explicit company_id wins; otherwise the
    /// sender is taken to be the hiring side.
    pub fn agreement_parties(&self) -> (Uuid, Uuid) {
        let company = self.company_id.unwrap_or(self.sender_id);
        let worker = if company == self.receiver_id {
            self.sender_id
        } else {
            self.receiver_id
        };
        (company, worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn proposal(status: ProposalStatus, expires_in: Duration) -> WorkProposal {
        let now = Utc::now();
        WorkProposal {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            company_id: None,
            job_posting_id: None,
            title: "Paint the storefront".to_string(),
            description: "Two coats, weatherproof".to_string(),
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
    fn live_statuses_are_pending_and_negotiating() {
        assert!(ProposalStatus::Pending.is_live());
        assert!(ProposalStatus::Negotiating.is_live());
        assert!(!ProposalStatus::Accepted.is_live());
        assert!(!ProposalStatus::Rejected.is_live());
        assert!(!ProposalStatus::Expired.is_live());
        assert!(!ProposalStatus::Cancelled.is_live());
    }

    #[test]
    fn lapse_requires_live_status_and_past_deadline() {
        let now = Utc::now();
        assert!(proposal(ProposalStatus::Pending, Duration::days(-1)).has_lapsed(now));
        assert!(proposal(ProposalStatus::Negotiating, Duration::days(-1)).has_lapsed(now));
        assert!(!proposal(ProposalStatus::Pending, Duration::days(1)).has_lapsed(now));
        // Terminal proposals never lapse, whatever the deadline says.
        assert!(!proposal(ProposalStatus::Rejected, Duration::days(-1)).has_lapsed(now));
    }

    #[test]
    fn sender_is_company_by_default() {
        let p = proposal(ProposalStatus::Pending, Duration::days(1));
        let (company, worker) = p.agreement_parties();
        assert_eq!(company, p.sender_id);
        assert_eq!(worker, p.receiver_id);
    }

    #[test]
    fn explicit_company_id_wins() {
        let mut p = proposal(ProposalStatus::Pending, Duration::days(1));
        let org = Uuid::new_v4();
        p.company_id = Some(org);
        let (company, worker) = p.agreement_parties();
        assert_eq!(company, org);
        assert_eq!(worker, p.receiver_id);
    }

    #[test]
    fn receiver_as_company_makes_sender_the_worker() {
        let mut p = proposal(ProposalStatus::Pending, Duration::days(1));
        p.company_id = Some(p.receiver_id);
        let (company, worker) = p.agreement_parties();
        assert_eq!(company, p.receiver_id);
        assert_eq!(worker, p.sender_id);
    }

    #[test]
    fn payment_type_wire_names() {
        assert_eq!(WorkPaymentType::BazariPay.to_str(), "BAZARI_PAY");
        assert_eq!(
            serde_json::to_string(&WorkPaymentType::BazariPay).unwrap(),
            "\"BAZARI_PAY\""
        );
    }
}
