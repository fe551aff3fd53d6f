//! HTTP client for the banking engine.
//!
//! The engine multiplexes all upstream providers behind one API. This
//! client is the classification boundary: every failure leaving it is a
//! [`ProviderErrorKind`], decided by HTTP status alone, so no caller ever
//! inspects message text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use finsync_core::{
    defaults, AccountClassification, AccountDetails, AccountType, BankProvider, BankProviderClient,
    ConnectionProbe, ConnectionStatus, Error, ProviderErrorKind, RawTransaction, Result,
};

use crate::types::{BalanceResponse, EngineErrorBody, StatusResponse, TransactionsResponse};

/// Default banking engine endpoint.
pub const DEFAULT_ENGINE_URL: &str = defaults::ENGINE_URL;

/// Banking engine HTTP client.
pub struct EngineClient {
    client: Client,
    base_url: String,
}

impl EngineClient {
    /// Create a new engine client with the default endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_ENGINE_URL.to_string())
    }

    /// Create a new engine client against a custom endpoint.
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::ENGINE_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Create from environment variables (`FINSYNC_ENGINE_URL`).
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("FINSYNC_ENGINE_URL").unwrap_or_else(|_| DEFAULT_ENGINE_URL.to_string());
        Self::with_base_url(base_url)
    }

    /// Map an HTTP status to a provider error classification.
    fn classify_status(status: StatusCode) -> ProviderErrorKind {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::Disconnected,
            StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimited,
            s if s.is_server_error() => ProviderErrorKind::Unavailable,
            _ => ProviderErrorKind::InvalidRequest,
        }
    }

    /// Turn a non-2xx response into a classified provider error.
    async fn error_from_response(response: reqwest::Response) -> Error {
        let status = response.status();
        let kind = Self::classify_status(status);
        let body: EngineErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| format!("engine returned HTTP {}", status));

        warn!(
            subsystem = "providers",
            component = "engine",
            error_kind = %kind,
            http_status = status.as_u16(),
            "Engine request failed"
        );
        Error::provider(kind, message)
    }

    /// Transport failures (timeouts, refused connections) classify as
    /// unavailable, never as disconnected.
    fn transport_error(e: reqwest::Error) -> Error {
        Error::provider(ProviderErrorKind::Unavailable, e.to_string())
    }
}

#[async_trait]
impl BankProviderClient for EngineClient {
    async fn connection_status(
        &self,
        reference_id: &str,
        provider: BankProvider,
        access_token: &str,
    ) -> Result<ConnectionProbe> {
        let start = Instant::now();
        let response = self
            .client
            .get(format!("{}/connections/status", self.base_url))
            .query(&[("id", reference_id), ("provider", &provider.to_string())])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: StatusResponse = response.json().await.map_err(Self::transport_error)?;
        let status = if body.status == "connected" {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };

        debug!(
            subsystem = "providers",
            component = "engine",
            op = "connection_status",
            provider = %provider,
            account_count = body.accounts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Probed connection status"
        );

        Ok(ConnectionProbe {
            status,
            account_details: body
                .accounts
                .into_iter()
                .map(|a| AccountDetails {
                    external_id: a.id,
                    iban: a.iban,
                    routing_number: a.routing_number,
                })
                .collect(),
        })
    }

    async fn account_balance(
        &self,
        external_id: &str,
        provider: BankProvider,
        access_token: &str,
        account_type: AccountType,
    ) -> Result<Option<finsync_core::ProviderBalance>> {
        let response = self
            .client
            .get(format!("{}/accounts/balance", self.base_url))
            .query(&[
                ("id", external_id),
                ("provider", &provider.to_string()),
                ("type", &account_type.to_string()),
            ])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: BalanceResponse = response.json().await.map_err(Self::transport_error)?;
        Ok(body.data.map(|b| finsync_core::ProviderBalance {
            amount: b.amount,
            available: b.available,
            credit_limit: b.credit_limit,
        }))
    }

    async fn transactions(
        &self,
        external_id: &str,
        provider: BankProvider,
        access_token: &str,
        classification: AccountClassification,
        latest_only: bool,
    ) -> Result<Vec<RawTransaction>> {
        let start = Instant::now();
        let response = self
            .client
            .get(format!("{}/transactions", self.base_url))
            .query(&[
                ("accountId", external_id),
                ("provider", &provider.to_string()),
                ("accountType", &classification.to_string()),
                ("latest", if latest_only { "true" } else { "false" }),
            ])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: TransactionsResponse = response.json().await.map_err(Self::transport_error)?;

        debug!(
            subsystem = "providers",
            component = "engine",
            op = "transactions",
            provider = %provider,
            fetched_count = body.data.len(),
            latest = latest_only,
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched transactions"
        );

        Ok(body.data.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_statuses_as_disconnected() {
        assert_eq!(
            EngineClient::classify_status(StatusCode::UNAUTHORIZED),
            ProviderErrorKind::Disconnected
        );
        assert_eq!(
            EngineClient::classify_status(StatusCode::FORBIDDEN),
            ProviderErrorKind::Disconnected
        );
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(
            EngineClient::classify_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimited
        );
    }

    #[test]
    fn test_classify_server_errors_as_unavailable() {
        assert_eq!(
            EngineClient::classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            ProviderErrorKind::Unavailable
        );
        assert_eq!(
            EngineClient::classify_status(StatusCode::BAD_GATEWAY),
            ProviderErrorKind::Unavailable
        );
    }

    #[test]
    fn test_classify_client_errors_as_invalid_request() {
        assert_eq!(
            EngineClient::classify_status(StatusCode::BAD_REQUEST),
            ProviderErrorKind::InvalidRequest
        );
        assert_eq!(
            EngineClient::classify_status(StatusCode::NOT_FOUND),
            ProviderErrorKind::InvalidRequest
        );
    }
}
