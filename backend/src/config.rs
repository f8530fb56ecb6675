use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    /// Process-local tables, for running the API on a workstation
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub token_table: String,
    pub schedule_table: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub notification_function_arn: String,
    pub scheduler_role_arn: String,
    pub schedule_group: String,
    /// Identity used when no API Gateway authorizer is in front of the server
    pub dev_user_id: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "dynamodb".to_string())
            .to_lowercase()
            .as_str()
        {
            "dynamodb" => StorageBackend::DynamoDb,
            "memory" => StorageBackend::Memory,
            other => bail!("STORAGE_BACKEND must be 'dynamodb' or 'memory', got '{}'", other),
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            storage_backend,
            token_table: env::var("TOKEN_TABLE")
                .or_else(|_| env::var("DDB_TABLE"))
                .context("TOKEN_TABLE (or DDB_TABLE) must be set")?,
            schedule_table: env::var("SCHEDULE_TABLE")
                .context("SCHEDULE_TABLE must be set")?,
            google_client_id: env::var("CLIENT_ID").context("CLIENT_ID must be set")?,
            google_client_secret: env::var("CLIENT_SECRET")
                .context("CLIENT_SECRET must be set")?,
            google_redirect_uri: env::var("REDIRECT_URI").context("REDIRECT_URI must be set")?,
            notification_function_arn: env::var("NOTIFICATION_FUNCTION_ARN")
                .context("NOTIFICATION_FUNCTION_ARN must be set")?,
            scheduler_role_arn: env::var("SCHEDULER_ROLE_ARN")
                .context("SCHEDULER_ROLE_ARN must be set")?,
            schedule_group: env::var("SCHEDULE_GROUP").unwrap_or_else(|_| "default".to_string()),
            dev_user_id: env::var("DEV_USER_ID").ok().filter(|s| !s.trim().is_empty()),
        })
    }
}
