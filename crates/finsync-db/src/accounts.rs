//! Bank account repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use finsync_core::{
    defaults, AccountDetails, AccountRepository, AccountType, BankAccount, Error, ProviderBalance,
    Result,
};

/// PostgreSQL implementation of AccountRepository.
pub struct PgAccountRepository {
    pool: Pool<Postgres>,
}

impl PgAccountRepository {
    /// Create a new PgAccountRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from database to AccountType.
    fn str_to_account_type(s: &str) -> AccountType {
        match s {
            "credit" => AccountType::Credit,
            "depository" => AccountType::Depository,
            "loan" => AccountType::Loan,
            "other_asset" => AccountType::OtherAsset,
            "other_liability" => AccountType::OtherLiability,
            _ => AccountType::Depository, // fallback
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> BankAccount {
        BankAccount {
            id: row.get("id"),
            connection_id: row.get("connection_id"),
            tenant_id: row.get("tenant_id"),
            external_id: row.get("external_id"),
            account_type: Self::str_to_account_type(row.get("account_type")),
            balance: row.get("balance"),
            available_balance: row.get("available_balance"),
            credit_limit: row.get("credit_limit"),
            currency: row.get("currency"),
            enabled: row.get("enabled"),
            manual: row.get("manual"),
            error_retries: row.get("error_retries"),
            error_details: row.get("error_details"),
            iban: row.get("iban"),
            routing_number: row.get("routing_number"),
        }
    }

    const COLUMNS: &'static str = "id, connection_id, tenant_id, external_id, account_type::text,
                    balance, available_balance, credit_limit, currency, enabled, manual,
                    error_retries, error_details, iban, routing_number";
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn fetch(&self, id: Uuid) -> Result<BankAccount> {
        let query = format!(
            "SELECT {} FROM bank_accounts WHERE id = $1",
            Self::COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_row).ok_or(Error::AccountNotFound(id))
    }

    async fn list_syncable(
        &self,
        connection_id: Uuid,
        include_quarantined: bool,
    ) -> Result<Vec<BankAccount>> {
        // Manual syncs bypass the quarantine filter so repaired accounts
        // can prove themselves again.
        let query = format!(
            "SELECT {} FROM bank_accounts
             WHERE connection_id = $1
               AND enabled = true
               AND manual = false
               AND ($2 OR error_retries < $3)
             ORDER BY created_at ASC",
            Self::COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(connection_id)
            .bind(include_quarantined)
            .bind(defaults::QUARANTINE_THRESHOLD)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn list_background(&self, connection_id: Uuid) -> Result<Vec<BankAccount>> {
        let query = format!(
            "SELECT {} FROM bank_accounts
             WHERE connection_id = $1 AND enabled = true AND manual = false
             ORDER BY created_at ASC",
            Self::COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(connection_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update_balance(&self, id: Uuid, balance: ProviderBalance) -> Result<()> {
        sqlx::query(
            "UPDATE bank_accounts
             SET balance = $1, available_balance = $2, credit_limit = $3
             WHERE id = $4",
        )
        .bind(balance.amount)
        .bind(balance.available)
        .bind(balance.credit_limit)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn clear_error(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE bank_accounts
             SET error_retries = 0, error_details = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn record_error(&self, id: Uuid, detail: &str) -> Result<()> {
        sqlx::query(
            "UPDATE bank_accounts
             SET error_retries = error_retries + 1, error_details = $1
             WHERE id = $2",
        )
        .bind(detail)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn backfill_details(&self, connection_id: Uuid, details: &AccountDetails) -> Result<()> {
        // COALESCE keeps already-populated columns; only NULLs are filled.
        sqlx::query(
            "UPDATE bank_accounts
             SET iban = COALESCE(iban, $1),
                 routing_number = COALESCE(routing_number, $2)
             WHERE connection_id = $3 AND external_id = $4",
        )
        .bind(&details.iban)
        .bind(&details.routing_number)
        .bind(connection_id)
        .bind(&details.external_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
