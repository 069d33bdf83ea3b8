use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::ledger::types::OnChainRecord;
use crate::models::agreementmodel::{AgreementStatus, WorkAgreement};
use crate::models::evaluationmodel::WorkEvaluation;
use crate::models::proposalmodel::{
    ProposalMailbox, ProposalStatus, ValuePeriod, WorkPaymentType, WorkProposal,
};

//Proposal DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalDto {
    pub receiver_id: Uuid,

    pub company_id: Option<Uuid>,

    pub job_posting_id: Option<Uuid>,

    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: String,

    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be between 10 and 5000 characters"
    ))]
    pub description: String,

    #[validate(range(min = 0.01, message = "Proposed value must be positive"))]
    pub proposed_value: Option<f64>,

    pub value_period: Option<ValuePeriod>,

    #[validate(length(min = 3, max = 8, message = "Currency must be a short code"))]
    pub value_currency: Option<String>,

    pub payment_type: Option<WorkPaymentType>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartNegotiationDto {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CounterOfferDto {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be between 10 and 5000 characters"
    ))]
    pub description: Option<String>,

    #[validate(range(min = 0.01, message = "Proposed value must be positive"))]
    pub proposed_value: Option<f64>,

    pub value_period: Option<ValuePeriod>,

    pub payment_type: Option<WorkPaymentType>,

    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectProposalDto {
    #[validate(length(min = 1, max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProposalListQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,

    pub mailbox: Option<ProposalMailbox>,

    pub status: Option<ProposalStatus>,
}

//Agreement DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AgreementActionDto {
    #[validate(length(min = 1, max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

// reason is mandatory; it stays optional here so a missing field reads as a
// blank reason and fails validation instead of a decode rejection
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CloseAgreementDto {
    #[validate(length(max = 500, message = "Close reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AgreementListQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,

    pub status: Option<AgreementStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PageQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,
}

//Evaluation DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEvaluationDto {
    #[validate(range(min = 1, max = 5, message = "Overall rating must be between 1 and 5"))]
    pub overall_rating: i32,

    #[validate(range(min = 1, max = 5, message = "Communication rating must be between 1 and 5"))]
    pub communication_rating: Option<i32>,

    #[validate(range(min = 1, max = 5, message = "Punctuality rating must be between 1 and 5"))]
    pub punctuality_rating: Option<i32>,

    #[validate(range(min = 1, max = 5, message = "Quality rating must be between 1 and 5"))]
    pub quality_rating: Option<i32>,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

//Results assembled by the services
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAcceptedDto {
    pub proposal: WorkProposal,
    pub agreement: WorkAgreement,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSubmittedDto {
    pub evaluation: WorkEvaluation,
    pub other_party_evaluated: bool,
    pub now_public: bool,
}

/// Both sides of an agreement's evaluations as seen by one party. Until the
/// mutual reveal the counterparty's entry reads as absent; whether they have
/// already submitted is not disclosed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementEvaluationsDto {
    pub my_evaluation: Option<WorkEvaluation>,
    pub other_evaluation: Option<WorkEvaluation>,
    pub can_evaluate: bool,
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainStatusDto {
    pub registered: bool,
    pub on_chain_id: Option<String>,
    pub tx_hash: Option<String>,
    pub data: Option<OnChainRecord>,
}

//Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub status: String,
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        let total_pages = ((total as f64) / (limit as f64)).ceil() as u32;
        Self {
            status: "success".to_string(),
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds_are_enforced() {
        let dto = SubmitEvaluationDto {
            overall_rating: 6,
            communication_rating: None,
            punctuality_rating: None,
            quality_rating: None,
            comment: None,
        };
        assert!(dto.validate().is_err());

        let dto = SubmitEvaluationDto {
            overall_rating: 5,
            communication_rating: Some(1),
            punctuality_rating: None,
            quality_rating: Some(3),
            comment: Some("solid work".to_string()),
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn close_reason_upper_bound_is_enforced() {
        let dto = CloseAgreementDto {
            reason: Some("x".repeat(501)),
        };
        assert!(dto.validate().is_err());

        let dto = CloseAgreementDto {
            reason: Some("project delivered".to_string()),
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn paginated_response_rounds_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 7, 1, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.status, "success");
    }
}
