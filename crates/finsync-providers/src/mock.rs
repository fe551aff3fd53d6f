//! Mock banking provider for deterministic testing.
//!
//! Scripts per-account balances, transactions, and failures so pipeline
//! tests can run without the engine or a live provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use finsync_core::{
    AccountClassification, AccountDetails, AccountType, BankProvider, BankProviderClient,
    ConnectionProbe, ConnectionStatus, Error, ProviderBalance, ProviderErrorKind, RawTransaction,
    Result,
};

/// One logged call against the mock provider.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub operation: String,
    pub id: String,
    pub latest_only: Option<bool>,
}

#[derive(Default)]
struct MockState {
    connection_status: HashMap<String, ConnectionStatus>,
    account_details: HashMap<String, Vec<AccountDetails>>,
    balances: HashMap<String, Option<ProviderBalance>>,
    transactions: HashMap<String, Vec<RawTransaction>>,
    failures: HashMap<String, ProviderErrorKind>,
    operation_failures: HashMap<(String, String), ProviderErrorKind>,
    call_log: Vec<ProviderCall>,
}

/// Mock implementation of [`BankProviderClient`].
#[derive(Clone, Default)]
pub struct MockBankProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockBankProvider {
    /// Create an empty mock. Unscripted lookups behave as connected with no
    /// data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status probe for a connection reference id.
    pub fn with_connection_status(&self, reference_id: &str, status: ConnectionStatus) {
        self.state
            .lock()
            .unwrap()
            .connection_status
            .insert(reference_id.to_string(), status);
    }

    /// Script the account details returned by the status probe.
    pub fn with_account_details(&self, reference_id: &str, details: Vec<AccountDetails>) {
        self.state
            .lock()
            .unwrap()
            .account_details
            .insert(reference_id.to_string(), details);
    }

    /// Script the balance for an account. `None` means the provider has no
    /// balance data for it.
    pub fn with_balance(&self, external_id: &str, balance: Option<ProviderBalance>) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(external_id.to_string(), balance);
    }

    /// Script the transactions for an account.
    pub fn with_transactions(&self, external_id: &str, txs: Vec<RawTransaction>) {
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(external_id.to_string(), txs);
    }

    /// Make every call for the given id fail with the classification.
    pub fn with_failure(&self, id: &str, kind: ProviderErrorKind) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(id.to_string(), kind);
    }

    /// Make one operation for the given id fail while the others keep
    /// working.
    pub fn with_operation_failure(&self, id: &str, operation: &str, kind: ProviderErrorKind) {
        self.state
            .lock()
            .unwrap()
            .operation_failures
            .insert((id.to_string(), operation.to_string()), kind);
    }

    /// Stop failing calls for the given id.
    pub fn clear_failure(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.failures.remove(id);
        state.operation_failures.retain(|(fid, _), _| fid != id);
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().call_log.clone()
    }

    /// Number of calls for one operation name.
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log(&self, operation: &str, id: &str, latest_only: Option<bool>) {
        self.state.lock().unwrap().call_log.push(ProviderCall {
            operation: operation.to_string(),
            id: id.to_string(),
            latest_only,
        });
    }

    fn fail_if_scripted(&self, operation: &str, id: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        let kind = state
            .operation_failures
            .get(&(id.to_string(), operation.to_string()))
            .or_else(|| state.failures.get(id));
        if let Some(kind) = kind {
            return Err(Error::provider(*kind, format!("scripted failure for {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl BankProviderClient for MockBankProvider {
    async fn connection_status(
        &self,
        reference_id: &str,
        _provider: BankProvider,
        _access_token: &str,
    ) -> Result<ConnectionProbe> {
        self.log("connection_status", reference_id, None);
        self.fail_if_scripted("connection_status", reference_id)?;

        let state = self.state.lock().unwrap();
        Ok(ConnectionProbe {
            status: state
                .connection_status
                .get(reference_id)
                .copied()
                .unwrap_or(ConnectionStatus::Connected),
            account_details: state
                .account_details
                .get(reference_id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn account_balance(
        &self,
        external_id: &str,
        _provider: BankProvider,
        _access_token: &str,
        _account_type: AccountType,
    ) -> Result<Option<ProviderBalance>> {
        self.log("account_balance", external_id, None);
        self.fail_if_scripted("account_balance", external_id)?;

        let state = self.state.lock().unwrap();
        Ok(state.balances.get(external_id).cloned().unwrap_or(None))
    }

    async fn transactions(
        &self,
        external_id: &str,
        _provider: BankProvider,
        _access_token: &str,
        _classification: AccountClassification,
        latest_only: bool,
    ) -> Result<Vec<RawTransaction>> {
        self.log("transactions", external_id, Some(latest_only));
        self.fail_if_scripted("transactions", external_id)?;

        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .get(external_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_defaults() {
        let mock = MockBankProvider::new();
        let probe = mock
            .connection_status("ref_1", BankProvider::Plaid, "tok")
            .await
            .unwrap();
        assert_eq!(probe.status, ConnectionStatus::Connected);

        let balance = mock
            .account_balance("acc_1", BankProvider::Plaid, "tok", AccountType::Depository)
            .await
            .unwrap();
        assert!(balance.is_none());
    }

    #[tokio::test]
    async fn test_scripted_failure_and_recovery() {
        let mock = MockBankProvider::new();
        mock.with_failure("acc_1", ProviderErrorKind::Disconnected);

        let err = mock
            .account_balance("acc_1", BankProvider::Teller, "tok", AccountType::Credit)
            .await
            .unwrap_err();
        assert!(err.is_disconnected());

        mock.clear_failure("acc_1");
        assert!(mock
            .account_balance("acc_1", BankProvider::Teller, "tok", AccountType::Credit)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_operation_failure_spares_other_calls() {
        let mock = MockBankProvider::new();
        mock.with_operation_failure("acc_1", "account_balance", ProviderErrorKind::RateLimited);

        assert!(mock
            .account_balance("acc_1", BankProvider::Plaid, "tok", AccountType::Depository)
            .await
            .is_err());
        assert!(mock
            .transactions(
                "acc_1",
                BankProvider::Plaid,
                "tok",
                AccountClassification::Asset,
                true,
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_call_log_records_latest_flag() {
        let mock = MockBankProvider::new();
        mock.transactions(
            "acc_1",
            BankProvider::Gocardless,
            "tok",
            AccountClassification::Asset,
            true,
        )
        .await
        .unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "transactions");
        assert_eq!(calls[0].latest_only, Some(true));
        assert_eq!(mock.call_count("transactions"), 1);
    }
}
