// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::User;

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        handle: Option<&str>,
    ) -> Result<Option<User>, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        handle: Option<&str>,
    ) -> Result<Option<User>, Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, handle, display_name, wallet_address, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(handle) = handle {
            user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, handle, display_name, wallet_address, created_at, updated_at
                FROM users
                WHERE handle = $1
                "#,
            )
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }
}
