//! Domain models for the finsync bank-sync pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// TENANT
// =============================================================================

/// Plan tier of a tenant (team).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Trial,
    Starter,
    Pro,
}

/// A customer organization owning bank connections and transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub plan: PlanTier,
    /// ISO 4217 code used for reporting; never converted by this pipeline.
    pub base_currency: String,
}

// =============================================================================
// BANK CONNECTION
// =============================================================================

/// External banking data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankProvider {
    Plaid,
    Gocardless,
    Teller,
    EnableBanking,
}

impl std::fmt::Display for BankProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plaid => write!(f, "plaid"),
            Self::Gocardless => write!(f, "gocardless"),
            Self::Teller => write!(f, "teller"),
            Self::EnableBanking => write!(f, "enablebanking"),
        }
    }
}

impl std::str::FromStr for BankProvider {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaid" => Ok(Self::Plaid),
            "gocardless" => Ok(Self::Gocardless),
            "teller" => Ok(Self::Teller),
            "enablebanking" | "enable_banking" => Ok(Self::EnableBanking),
            _ => Err(format!("Invalid bank provider: {}", s)),
        }
    }
}

/// Live status of a bank connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// A single credential-based link to one external bank via one provider.
///
/// Created by the onboarding flow (out of scope); mutated here only by the
/// connection sync orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConnection {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: BankProvider,
    /// Opaque provider access credential. Never logged.
    pub access_token: String,
    /// Provider-side reference id for this connection.
    pub reference_id: String,
    pub status: ConnectionStatus,
    pub last_accessed: Option<DateTime<Utc>>,
}

// =============================================================================
// BANK ACCOUNT
// =============================================================================

/// Account type as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Credit,
    Depository,
    Loan,
    OtherAsset,
    OtherLiability,
}

impl AccountType {
    /// Asset vs liability semantics used when fetching transactions.
    pub fn classification(self) -> AccountClassification {
        match self {
            Self::Depository | Self::OtherAsset => AccountClassification::Asset,
            Self::Credit | Self::Loan | Self::OtherLiability => AccountClassification::Liability,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Depository => write!(f, "depository"),
            Self::Loan => write!(f, "loan"),
            Self::OtherAsset => write!(f, "other_asset"),
            Self::OtherLiability => write!(f, "other_liability"),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "depository" => Ok(Self::Depository),
            "loan" => Ok(Self::Loan),
            "other_asset" => Ok(Self::OtherAsset),
            "other_liability" => Ok(Self::OtherLiability),
            _ => Err(format!("Invalid account type: {}", s)),
        }
    }
}

/// Sign/direction semantics derived from the account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountClassification {
    Asset,
    Liability,
}

impl std::fmt::Display for AccountClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asset => write!(f, "asset"),
            Self::Liability => write!(f, "liability"),
        }
    }
}

/// One bank account exposed under a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub tenant_id: Uuid,
    /// Provider-side account id.
    pub external_id: String,
    pub account_type: AccountType,
    pub balance: Option<f64>,
    pub available_balance: Option<f64>,
    pub credit_limit: Option<f64>,
    pub currency: Option<String>,
    pub enabled: bool,
    /// Manually-managed account; excluded from provider sync entirely.
    pub manual: bool,
    /// Consecutive failed sync attempts. Reset to zero on any successful
    /// balance or transaction fetch.
    pub error_retries: i32,
    pub error_details: Option<String>,
    pub iban: Option<String>,
    pub routing_number: Option<String>,
}

/// Balance snapshot returned by the provider.
///
/// Zero and negative amounts are real data (overdrafts); only an absent
/// snapshot means "no data".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderBalance {
    pub amount: f64,
    pub available: Option<f64>,
    pub credit_limit: Option<f64>,
}

/// Static account details surfaced by the status probe, used for
/// best-effort backfill of legacy rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountDetails {
    /// Provider-side account id the details belong to.
    pub external_id: String,
    pub iban: Option<String>,
    pub routing_number: Option<String>,
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// Settlement status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Posted,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Posted => write!(f, "posted"),
        }
    }
}

/// A transaction as returned by the provider, before transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Provider-side transaction id. Combined with provider and account
    /// into the stable dedup key.
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub name: String,
    pub status: TransactionStatus,
    pub category: Option<String>,
    pub counterparty_name: Option<String>,
}

/// A stored transaction row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    /// Stable external dedup key; globally unique.
    pub dedup_key: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub name: String,
    pub status: TransactionStatus,
    pub category: Option<String>,
    pub counterparty_name: Option<String>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

/// A transaction prepared for the duplicate-ignore bulk upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    pub dedup_key: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub name: String,
    pub status: TransactionStatus,
    pub category: Option<String>,
    pub counterparty_name: Option<String>,
    pub notified: bool,
}

// =============================================================================
// TRANSACTION EMBEDDING
// =============================================================================

/// Embedding record for a transaction. At most one live row per
/// transaction; re-embedding replaces the prior record.
#[derive(Debug, Clone)]
pub struct TransactionEmbedding {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub tenant_id: Uuid,
    pub source_text: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// New embedding row for insertion.
#[derive(Debug, Clone)]
pub struct NewTransactionEmbedding {
    pub transaction_id: Uuid,
    pub tenant_id: Uuid,
    pub vector: Vector,
    pub source_text: String,
    pub model: String,
}

// =============================================================================
// SCHEDULE REGISTRATION
// =============================================================================

/// Recurring sync registration for one tenant. At most one live
/// registration per tenant, enforced by the unique dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRegistration {
    pub id: Uuid,
    /// External correlation key: the tenant this schedule fans out for.
    pub tenant_id: Uuid,
    /// Deterministic deduplication key, `{tenant_id}-{task}`.
    pub dedup_key: String,
    pub task: String,
    /// Cron expression, e.g. `"45 3 * * *"`.
    pub cron: String,
    /// Always UTC; kept explicit for the registry contract.
    pub timezone: String,
    pub enabled: bool,
}

/// Registration request for the schedule store.
#[derive(Debug, Clone)]
pub struct NewScheduleRegistration {
    pub tenant_id: Uuid,
    pub dedup_key: String,
    pub task: String,
    pub cron: String,
    pub timezone: String,
}

// =============================================================================
// JOBS
// =============================================================================

/// Job types processed by the sync pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Daily fan-out: sync all connections of one tenant.
    TenantSync,
    /// Connection sync orchestrator (one bank connection).
    ConnectionSync,
    /// Account sync worker (one bank account).
    AccountSync,
    /// Embedding/enrichment pipeline for newly inserted transactions.
    TransactionEmbed,
    /// Downstream new-transactions notification (delivery out of scope).
    TransactionNotify,
}

impl JobType {
    /// Hard wall-clock budget for one invocation of this job type.
    pub fn timeout(self) -> std::time::Duration {
        use crate::defaults;
        let secs = match self {
            JobType::TenantSync => defaults::TENANT_SYNC_TIMEOUT_SECS,
            JobType::ConnectionSync => defaults::CONNECTION_SYNC_TIMEOUT_SECS,
            JobType::AccountSync => defaults::ACCOUNT_SYNC_TIMEOUT_SECS,
            JobType::TransactionEmbed => defaults::EMBED_TIMEOUT_SECS,
            JobType::TransactionNotify => defaults::NOTIFY_TIMEOUT_SECS,
        };
        std::time::Duration::from_secs(secs)
    }
}

/// Lifecycle status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A job in the queue.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// The job is invisible to workers until this instant. Implements both
    /// the staggered account fan-out and the deferred notification.
    pub visible_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// JOB PAYLOADS
// =============================================================================

/// Payload for [`JobType::TenantSync`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSyncPayload {
    pub tenant_id: Uuid,
}

/// Payload for [`JobType::ConnectionSync`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSyncPayload {
    pub connection_id: Uuid,
    /// Absent tenant id is a configuration error, not a silent skip.
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub manual_sync: bool,
}

/// Payload for [`JobType::AccountSync`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSyncPayload {
    pub connection_id: Uuid,
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    pub provider: BankProvider,
    pub access_token: String,
    pub external_id: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub manual_sync: bool,
}

/// Payload for [`JobType::TransactionEmbed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEmbedPayload {
    pub tenant_id: Uuid,
    pub transaction_ids: Vec<Uuid>,
}

/// Payload for [`JobType::TransactionNotify`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionNotifyPayload {
    pub tenant_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_classification() {
        assert_eq!(
            AccountType::Depository.classification(),
            AccountClassification::Asset
        );
        assert_eq!(
            AccountType::OtherAsset.classification(),
            AccountClassification::Asset
        );
        assert_eq!(
            AccountType::Credit.classification(),
            AccountClassification::Liability
        );
        assert_eq!(
            AccountType::Loan.classification(),
            AccountClassification::Liability
        );
        assert_eq!(
            AccountType::OtherLiability.classification(),
            AccountClassification::Liability
        );
    }

    #[test]
    fn test_bank_provider_roundtrip() {
        for provider in [
            BankProvider::Plaid,
            BankProvider::Gocardless,
            BankProvider::Teller,
            BankProvider::EnableBanking,
        ] {
            let parsed: BankProvider = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert!("monzo".parse::<BankProvider>().is_err());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!(
            "other_liability".parse::<AccountType>().unwrap(),
            AccountType::OtherLiability
        );
        assert!("checking".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_connection_sync_payload_manual_defaults_false() {
        let payload: ConnectionSyncPayload = serde_json::from_str(
            r#"{"connection_id":"00000000-0000-0000-0000-000000000001","tenant_id":null}"#,
        )
        .unwrap();
        assert!(!payload.manual_sync);
        assert!(payload.tenant_id.is_none());
    }

    #[test]
    fn test_account_sync_payload_serde() {
        let payload = AccountSyncPayload {
            connection_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            provider: BankProvider::Plaid,
            access_token: "tok".into(),
            external_id: "acc_1".into(),
            account_type: AccountType::Depository,
            manual_sync: true,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"plaid\""));
        let back: AccountSyncPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.account_id, payload.account_id);
        assert!(back.manual_sync);
    }

    #[test]
    fn test_job_type_timeouts_bounded() {
        for jt in [
            JobType::TenantSync,
            JobType::ConnectionSync,
            JobType::AccountSync,
            JobType::TransactionEmbed,
            JobType::TransactionNotify,
        ] {
            let t = jt.timeout().as_secs();
            assert!((60..=300).contains(&t), "{:?} timeout {}s", jt, t);
        }
    }
}
