use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};
use crate::models::agreementmodel::AgreementStatus;
use crate::models::proposalmodel::ProposalStatus;

/// Domain failures produced by the work services. Handlers convert these
/// into HTTP responses through the `From<ServiceError> for HttpError` impl.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("work proposal {0} was not found")]
    ProposalNotFound(Uuid),

    #[error("work agreement {0} was not found")]
    AgreementNotFound(Uuid),

    #[error("proposal {0} is {} and does not accept this action", .1.to_str())]
    InvalidProposalState(Uuid, ProposalStatus),

    #[error("agreement {0} cannot move from {} to {}", .1.to_str(), .2.to_str())]
    InvalidAgreementTransition(Uuid, AgreementStatus, AgreementStatus),

    #[error("agreement {0} is not closed, evaluations are not open yet")]
    EvaluationNotOpen(Uuid),

    #[error("you already submitted an evaluation for agreement {0}")]
    DuplicateEvaluation(Uuid, Uuid),

    #[error("you already have a live proposal to this receiver")]
    DuplicateProposal(Uuid),

    #[error("user {0} is not a party to this resource")]
    Forbidden(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::ProposalNotFound(_) | ServiceError::AgreementNotFound(_) => {
                HttpError::not_found(message)
            }
            ServiceError::InvalidProposalState(_, _)
            | ServiceError::InvalidAgreementTransition(_, _, _)
            | ServiceError::EvaluationNotOpen(_)
            | ServiceError::DuplicateEvaluation(_, _)
            | ServiceError::DuplicateProposal(_) => HttpError::conflict(message),
            ServiceError::Forbidden(_) => {
                HttpError::forbidden(ErrorMessage::PermissionDenied.to_str())
            }
            ServiceError::Validation(message) => HttpError::bad_request(message),
            ServiceError::Database(e) => {
                tracing::error!("database error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_found_maps_to_404() {
        let err = HttpError::from(ServiceError::ProposalNotFound(Uuid::new_v4()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err = HttpError::from(ServiceError::AgreementNotFound(Uuid::new_v4()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn state_conflicts_map_to_409() {
        let id = Uuid::new_v4();
        let cases = vec![
            ServiceError::InvalidProposalState(id, ProposalStatus::Accepted),
            ServiceError::InvalidAgreementTransition(
                id,
                AgreementStatus::Closed,
                AgreementStatus::Active,
            ),
            ServiceError::EvaluationNotOpen(id),
            ServiceError::DuplicateEvaluation(id, Uuid::new_v4()),
            ServiceError::DuplicateProposal(Uuid::new_v4()),
        ];
        for case in cases {
            assert_eq!(HttpError::from(case).status, StatusCode::CONFLICT);
        }
    }

    #[test]
    fn forbidden_maps_to_403() {
        let err = HttpError::from(ServiceError::Forbidden(Uuid::new_v4()));
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn validation_maps_to_400() {
        let err = HttpError::from(ServiceError::Validation("bad input".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "bad input");
    }

    #[test]
    fn database_maps_to_500_without_detail() {
        let err = HttpError::from(ServiceError::Database(sqlx::Error::RowNotFound));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, ErrorMessage::ServerError.to_str());
    }
}
