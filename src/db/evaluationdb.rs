// db/evaluationdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Error, Row};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::evaluationmodel::WorkEvaluation;

const EVALUATION_COLUMNS: &str = r#"
    id, agreement_id, author_id, target_id,
    overall_rating, communication_rating, punctuality_rating, quality_rating,
    comment, is_public, created_at, updated_at
"#;

/// Public evaluation joined with who wrote it, for profile listings.
#[derive(Debug, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationWithAuthor {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub author_id: Uuid,
    pub author_handle: String,
    pub author_display_name: Option<String>,
    pub overall_rating: i32,
    pub communication_rating: Option<i32>,
    pub punctuality_rating: Option<i32>,
    pub quality_rating: Option<i32>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait EvaluationExt {
    async fn get_evaluation(
        &self,
        agreement_id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<WorkEvaluation>, Error>;

    async fn get_evaluations_for_agreement(
        &self,
        agreement_id: Uuid,
    ) -> Result<Vec<WorkEvaluation>, Error>;

    #[allow(clippy::too_many_arguments)]
    async fn insert_evaluation_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
        author_id: Uuid,
        target_id: Uuid,
        overall_rating: i32,
        communication_rating: Option<i32>,
        punctuality_rating: Option<i32>,
        quality_rating: Option<i32>,
        comment: Option<&str>,
    ) -> Result<WorkEvaluation, Error>;

    async fn count_evaluations_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
    ) -> Result<i64, Error>;

    /// Flips every evaluation of the agreement public in one statement.
    async fn publish_evaluations_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
    ) -> Result<u64, Error>;

    async fn list_public_evaluations_received(
        &self,
        target_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<EvaluationWithAuthor>, i64), Error>;

    async fn list_evaluations_given(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkEvaluation>, i64), Error>;
}

#[async_trait]
impl EvaluationExt for DBClient {
    async fn get_evaluation(
        &self,
        agreement_id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<WorkEvaluation>, Error> {
        let query = format!(
            "SELECT {} FROM work_evaluations WHERE agreement_id = $1 AND author_id = $2",
            EVALUATION_COLUMNS
        );
        sqlx::query_as::<_, WorkEvaluation>(&query)
            .bind(agreement_id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_evaluations_for_agreement(
        &self,
        agreement_id: Uuid,
    ) -> Result<Vec<WorkEvaluation>, Error> {
        let query = format!(
            "SELECT {} FROM work_evaluations WHERE agreement_id = $1 ORDER BY created_at ASC",
            EVALUATION_COLUMNS
        );
        sqlx::query_as::<_, WorkEvaluation>(&query)
            .bind(agreement_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_evaluation_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
        author_id: Uuid,
        target_id: Uuid,
        overall_rating: i32,
        communication_rating: Option<i32>,
        punctuality_rating: Option<i32>,
        quality_rating: Option<i32>,
        comment: Option<&str>,
    ) -> Result<WorkEvaluation, Error> {
        let query = format!(
            r#"
            INSERT INTO work_evaluations (
                agreement_id, author_id, target_id, overall_rating,
                communication_rating, punctuality_rating, quality_rating, comment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            EVALUATION_COLUMNS
        );

        sqlx::query_as::<_, WorkEvaluation>(&query)
            .bind(agreement_id)
            .bind(author_id)
            .bind(target_id)
            .bind(overall_rating)
            .bind(communication_rating)
            .bind(punctuality_rating)
            .bind(quality_rating)
            .bind(comment)
            .fetch_one(&mut **tx)
            .await
    }

    async fn count_evaluations_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
    ) -> Result<i64, Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM work_evaluations WHERE agreement_id = $1",
        )
        .bind(agreement_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get::<i64, _>("total"))
    }

    async fn publish_evaluations_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE work_evaluations
            SET is_public = TRUE, updated_at = NOW()
            WHERE agreement_id = $1
            "#,
        )
        .bind(agreement_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_public_evaluations_received(
        &self,
        target_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<EvaluationWithAuthor>, i64), Error> {
        let evaluations = sqlx::query_as::<_, EvaluationWithAuthor>(
            r#"
            SELECT
                e.id, e.agreement_id, e.author_id,
                u.handle AS author_handle,
                u.display_name AS author_display_name,
                e.overall_rating, e.communication_rating, e.punctuality_rating,
                e.quality_rating, e.comment, e.created_at
            FROM work_evaluations e
            JOIN users u ON u.id = e.author_id
            WHERE e.target_id = $1 AND e.is_public
            ORDER BY e.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(target_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query(
            "SELECT COUNT(*) AS total FROM work_evaluations WHERE target_id = $1 AND is_public",
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("total");

        Ok((evaluations, total))
    }

    async fn list_evaluations_given(
        &self,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkEvaluation>, i64), Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM work_evaluations
            WHERE author_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            EVALUATION_COLUMNS
        );
        let evaluations = sqlx::query_as::<_, WorkEvaluation>(&query)
            .bind(author_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total =
            sqlx::query("SELECT COUNT(*) AS total FROM work_evaluations WHERE author_id = $1")
                .bind(author_id)
                .fetch_one(&self.pool)
                .await?
                .get::<i64, _>("total");

        Ok((evaluations, total))
    }
}
