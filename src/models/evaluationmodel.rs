use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days after closure during which either party may still evaluate.
pub const EVALUATION_WINDOW_DAYS: i64 = 30;

pub fn evaluation_window_open(closed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now <= closed_at + Duration::days(EVALUATION_WINDOW_DAYS)
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkEvaluation {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub author_id: Uuid,
    pub target_id: Uuid,
    pub overall_rating: i32,
    pub communication_rating: Option<i32>,
    pub punctuality_rating: Option<i32>,
    pub quality_rating: Option<i32>,
    pub comment: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_inclusive_of_day_thirty() {
        let closed = Utc::now();
        assert!(evaluation_window_open(closed, closed));
        assert!(evaluation_window_open(
            closed,
            closed + Duration::days(EVALUATION_WINDOW_DAYS)
        ));
        assert!(!evaluation_window_open(
            closed,
            closed + Duration::days(EVALUATION_WINDOW_DAYS) + Duration::seconds(1)
        ));
    }
}
