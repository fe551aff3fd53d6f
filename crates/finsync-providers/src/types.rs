//! Wire types for the banking engine HTTP API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use finsync_core::{RawTransaction, TransactionStatus};

/// Connection status response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub accounts: Vec<AccountDetailsDto>,
}

/// Static account details as returned by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountDetailsDto {
    pub id: String,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub routing_number: Option<String>,
}

/// Balance response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(default)]
    pub data: Option<BalanceDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceDto {
    pub amount: f64,
    #[serde(default)]
    pub available: Option<f64>,
    #[serde(default)]
    pub credit_limit: Option<f64>,
}

/// Transactions response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsResponse {
    #[serde(default)]
    pub data: Vec<TransactionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDto {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub counterparty_name: Option<String>,
}

impl From<TransactionDto> for RawTransaction {
    fn from(dto: TransactionDto) -> Self {
        RawTransaction {
            id: dto.id,
            amount: dto.amount,
            currency: dto.currency,
            date: dto.date,
            name: dto.name,
            status: if dto.pending {
                TransactionStatus::Pending
            } else {
                TransactionStatus::Posted
            },
            category: dto.category,
            counterparty_name: dto.counterparty_name,
        }
    }
}

/// Error body the engine returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_dto_pending_maps_to_status() {
        let dto: TransactionDto = serde_json::from_str(
            r#"{"id":"tx_1","amount":-4.2,"currency":"EUR","date":"2026-02-01",
                "name":"CAFE","pending":true}"#,
        )
        .unwrap();
        let raw: RawTransaction = dto.into();
        assert_eq!(raw.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_transaction_dto_defaults() {
        let dto: TransactionDto = serde_json::from_str(
            r#"{"id":"tx_2","amount":10.0,"currency":"EUR","date":"2026-02-01","name":"X"}"#,
        )
        .unwrap();
        assert!(!dto.pending);
        assert!(dto.category.is_none());
    }
}
