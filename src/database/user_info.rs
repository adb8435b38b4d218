use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use thiserror::Error;

use super::manager::{DatabaseError, DatabaseManager};

/// Field holding the URL parameters a signed in user starts the viewer with
pub const DEFAULT_URL_PARAMS_FIELD: &str = "default_url_params";

#[derive(Debug, Error)]
pub enum UserInfoError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("User '{0}' not found")]
    UnknownUser(String),
}

impl From<sqlx::Error> for UserInfoError {
    fn from(err: sqlx::Error) -> Self {
        UserInfoError::Database(DatabaseError::Sqlx(err))
    }
}

/// Profile fields stored per user
#[async_trait]
pub trait UserInfoStore: Send + Sync {
    /// Whitelisted fields that may be read and written
    fn fields(&self) -> &[String];

    /// Stored fields of a user; empty when the user has no profile row
    async fn user_infos(&self, username: &str) -> Result<Map<String, Value>, UserInfoError>;

    /// Text of any profile column, whitelisted or not
    async fn display_name(&self, username: &str, field: &str) -> Result<Option<String>, UserInfoError>;

    /// Insert or update the given fields of a user
    async fn update_user_infos(
        &self,
        username: &str,
        values: &Map<String, Value>,
    ) -> Result<(), UserInfoError>;
}

/// `user_infos` table joined to `users` by user id
pub struct PgUserInfoStore {
    db_url: String,
    schema: String,
    fields: Vec<String>,
}

impl PgUserInfoStore {
    pub fn new(db_url: impl Into<String>, schema: impl Into<String>, user_info_fields: &[String]) -> Self {
        let mut fields: Vec<String> = user_info_fields.to_vec();
        if !fields.iter().any(|f| f == DEFAULT_URL_PARAMS_FIELD) {
            fields.push(DEFAULT_URL_PARAMS_FIELD.to_string());
        }
        Self {
            db_url: db_url.into(),
            schema: schema.into(),
            fields,
        }
    }

    fn table(&self, name: &str) -> Result<String, DatabaseError> {
        Ok(format!(
            "{}.{}",
            DatabaseManager::quote_identifier(&self.schema)?,
            DatabaseManager::quote_identifier(name)?
        ))
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl UserInfoStore for PgUserInfoStore {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    async fn user_infos(&self, username: &str) -> Result<Map<String, Value>, UserInfoError> {
        let pool = DatabaseManager::pool(&self.db_url).await?;
        let query = format!(
            "SELECT to_jsonb(ui) FROM {} ui JOIN {} u ON u.id = ui.user_id WHERE u.name = $1",
            self.table("user_infos")?,
            self.table("users")?
        );

        let row: Option<Json<Map<String, Value>>> = sqlx::query_scalar(&query)
            .bind(username)
            .fetch_optional(&pool)
            .await?;

        let mut infos = row.map(|Json(infos)| infos).unwrap_or_default();
        infos.retain(|key, _| self.fields.contains(key));
        tracing::debug!("Loaded {} user info field(s) for '{}'", infos.len(), username);
        Ok(infos)
    }

    async fn display_name(&self, username: &str, field: &str) -> Result<Option<String>, UserInfoError> {
        let pool = DatabaseManager::pool(&self.db_url).await?;
        let query = format!(
            "SELECT to_jsonb(ui) ->> $2 FROM {} ui JOIN {} u ON u.id = ui.user_id WHERE u.name = $1",
            self.table("user_infos")?,
            self.table("users")?
        );

        let name: Option<Option<String>> = sqlx::query_scalar(&query)
            .bind(username)
            .bind(field)
            .fetch_optional(&pool)
            .await?;
        Ok(name.flatten().filter(|name| !name.is_empty()))
    }

    async fn update_user_infos(
        &self,
        username: &str,
        values: &Map<String, Value>,
    ) -> Result<(), UserInfoError> {
        let columns: Vec<(String, Option<String>)> = values
            .iter()
            .filter(|(key, _)| self.fields.contains(key))
            .map(|(key, value)| -> Result<_, DatabaseError> {
                Ok((DatabaseManager::quote_identifier(key)?, text_value(value)))
            })
            .collect::<Result<_, _>>()?;
        if columns.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        let placeholders: Vec<String> = (0..columns.len()).map(|i| format!("${}", i + 2)).collect();
        let updates: Vec<String> = names
            .iter()
            .map(|name| format!("{} = EXCLUDED.{}", name, name))
            .collect();

        let query = format!(
            "INSERT INTO {} (user_id, {}) SELECT u.id, {} FROM {} u WHERE u.name = $1 \
             ON CONFLICT (user_id) DO UPDATE SET {}",
            self.table("user_infos")?,
            names.join(", "),
            placeholders.join(", "),
            self.table("users")?,
            updates.join(", ")
        );

        let pool = DatabaseManager::pool(&self.db_url).await?;
        let mut statement = sqlx::query(&query).bind(username);
        for (_, value) in &columns {
            statement = statement.bind(value.clone());
        }
        let result = statement.execute(&pool).await?;

        if result.rows_affected() == 0 {
            return Err(UserInfoError::UnknownUser(username.to_string()));
        }
        tracing::info!("Updated {} user info field(s) for '{}'", columns.len(), username);
        Ok(())
    }
}
