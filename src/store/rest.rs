//! Remote store client for a PostgREST-style database API.
//!
//! # Responsibilities
//! - Read the `blacklisted_ips` table (`ip`, `reason`)
//! - Insert into `blacklisted_ips` and `audit_logs`
//!   (`ip_address`, `event_type`, `input_data`)
//! - Verify panel credentials with the password grant endpoint
//!
//! Every call carries the API key both as `apikey` and as bearer token and is
//! bounded by the configured timeout.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::StoreConfig;
use crate::gate::auth::{CredentialVerifier, Credentials};
use crate::security::audit::AuditRecord;
use crate::store::{SecurityStore, StoreError, StoreResult};

const BANS_TABLE: &str = "blacklisted_ips";
const AUDIT_TABLE: &str = "audit_logs";

#[derive(Debug, Deserialize)]
struct BannedRow {
    ip: String,
}

#[derive(Debug, Serialize)]
struct NewBan<'a> {
    ip: &'a str,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct NewAuditLog<'a> {
    ip_address: &'a str,
    event_type: &'static str,
    input_data: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// HTTP client for the remote database API.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    /// Build a client from configuration.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let parsed = url::Url::parse(&config.url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store URL '{}': {}", config.url, e)))?;

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> StoreResult<()> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(table, status = %status, detail = %detail, "Store rejected insert");
            return Err(StoreError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecurityStore for RestStore {
    async fn fetch_banned(&self) -> StoreResult<HashSet<String>> {
        let response = self
            .authorized(self.client.get(self.table_url(BANS_TABLE)))
            .query(&[("select", "ip")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let rows: Vec<BannedRow> = response.json().await?;
        Ok(rows.into_iter().map(|row| row.ip).collect())
    }

    async fn append_audit(&self, record: &AuditRecord) -> StoreResult<()> {
        self.insert(
            AUDIT_TABLE,
            &NewAuditLog {
                ip_address: &record.identifier,
                event_type: record.kind.as_str(),
                input_data: &record.excerpt,
            },
        )
        .await
    }

    async fn persist_ban(&self, identifier: &str, reason: &str) -> StoreResult<()> {
        self.insert(BANS_TABLE, &NewBan { ip: identifier, reason }).await
    }
}

#[async_trait]
impl CredentialVerifier for RestStore {
    async fn verify(&self, credentials: &Credentials) -> StoreResult<bool> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordGrant {
                email: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let token: TokenResponse = response.json().await?;
                Ok(token.access_token.is_some())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            other => Err(StoreError::Status(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    fn config(url: &str) -> StoreConfig {
        StoreConfig {
            backend: StoreBackend::Rest,
            url: url.to_string(),
            api_key: "key".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_table_url_ignores_trailing_slash() {
        let store = RestStore::new(&config("https://db.example.com/")).unwrap();
        assert_eq!(
            store.table_url(BANS_TABLE),
            "https://db.example.com/rest/v1/blacklisted_ips"
        );
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(
            RestStore::new(&config("not a url")),
            Err(StoreError::Unavailable(_))
        ));
    }
}
