//! Bank connection repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use finsync_core::{
    BankConnection, BankProvider, ConnectionRepository, ConnectionStatus, Error, Result,
};

/// PostgreSQL implementation of ConnectionRepository.
pub struct PgConnectionRepository {
    pool: Pool<Postgres>,
}

impl PgConnectionRepository {
    /// Create a new PgConnectionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert BankProvider to string for database.
    fn provider_to_str(provider: BankProvider) -> &'static str {
        match provider {
            BankProvider::Plaid => "plaid",
            BankProvider::Gocardless => "gocardless",
            BankProvider::Teller => "teller",
            BankProvider::EnableBanking => "enablebanking",
        }
    }

    /// Convert string from database to BankProvider.
    fn str_to_provider(s: &str) -> BankProvider {
        match s {
            "plaid" => BankProvider::Plaid,
            "gocardless" => BankProvider::Gocardless,
            "teller" => BankProvider::Teller,
            "enablebanking" => BankProvider::EnableBanking,
            _ => BankProvider::Plaid, // fallback
        }
    }

    fn str_to_status(s: &str) -> ConnectionStatus {
        match s {
            "connected" => ConnectionStatus::Connected,
            "disconnected" => ConnectionStatus::Disconnected,
            _ => ConnectionStatus::Disconnected, // fallback
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> BankConnection {
        BankConnection {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            provider: Self::str_to_provider(row.get("provider")),
            access_token: row.get("access_token"),
            reference_id: row.get("reference_id"),
            status: Self::str_to_status(row.get("status")),
            last_accessed: row.get("last_accessed"),
        }
    }
}

#[async_trait]
impl ConnectionRepository for PgConnectionRepository {
    async fn fetch(&self, id: Uuid) -> Result<BankConnection> {
        let row = sqlx::query(
            "SELECT id, tenant_id, provider::text, access_token, reference_id,
                    status::text, last_accessed
             FROM bank_connections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).ok_or(Error::ConnectionNotFound(id))
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<BankConnection>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, provider::text, access_token, reference_id,
                    status::text, last_accessed
             FROM bank_connections WHERE tenant_id = $1
             ORDER BY created_at ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn mark_connected(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE bank_connections
             SET status = 'connected'::connection_status, last_accessed = $1
             WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_disconnected(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE bank_connections
             SET status = 'disconnected'::connection_status
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip() {
        for provider in [
            BankProvider::Plaid,
            BankProvider::Gocardless,
            BankProvider::Teller,
            BankProvider::EnableBanking,
        ] {
            let s = PgConnectionRepository::provider_to_str(provider);
            assert_eq!(PgConnectionRepository::str_to_provider(s), provider);
        }
    }

    #[test]
    fn test_status_fallback_is_disconnected() {
        assert_eq!(
            PgConnectionRepository::str_to_status("garbage"),
            ConnectionStatus::Disconnected
        );
    }
}
