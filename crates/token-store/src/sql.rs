//! Relational token store backed by PostgreSQL or SQLite.

use crate::error::StoreError;
use crate::store::TokenStore;
use crate::types::{token_fingerprint, Region, Registration, RegistrationId, TokenPolicy};
use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, FromRow};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    fn from_url(url: &str) -> Result<Self, StoreError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            // Only the scheme: the rest may carry credentials.
            let scheme = url.split(':').next().unwrap_or_default();
            Err(StoreError::UnsupportedUrl(scheme.to_string()))
        }
    }

    fn create_table_sql(&self) -> &'static str {
        match self {
            Backend::Postgres => {
                r#"
                CREATE TABLE IF NOT EXISTS notifications (
                    id BIGSERIAL PRIMARY KEY,
                    notification_token TEXT NOT NULL,
                    region TEXT NOT NULL
                )
                "#
            }
            Backend::Sqlite => {
                r#"
                CREATE TABLE IF NOT EXISTS notifications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    notification_token TEXT NOT NULL,
                    region TEXT NOT NULL
                )
                "#
            }
        }
    }
}

/// SQLite URLs open read-write-create unless they pick a mode themselves.
fn sqlite_url(url: &str) -> Cow<'_, str> {
    if url.contains("mode=") || url.contains(":memory:") {
        Cow::Borrowed(url)
    } else if url.contains('?') {
        Cow::Owned(format!("{}&mode=rwc", url))
    } else {
        Cow::Owned(format!("{}?mode=rwc", url))
    }
}

#[derive(Debug, FromRow)]
struct RegistrationRow {
    id: i64,
    notification_token: String,
}

/// Token store on a SQL database, selected by connection URL scheme.
pub struct SqlTokenStore {
    pool: AnyPool,
    policy: TokenPolicy,
}

impl SqlTokenStore {
    /// Connect and create the schema if it does not exist yet.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        policy: TokenPolicy,
    ) -> Result<Self, StoreError> {
        install_default_drivers();
        let backend = Backend::from_url(url)?;
        let url = match backend {
            Backend::Sqlite => sqlite_url(url),
            Backend::Postgres => Cow::Borrowed(url),
        };

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;

        let store = Self { pool, policy };
        store.init_schema(backend).await?;

        info!(?backend, ?policy, "SQL token store ready");
        Ok(store)
    }

    async fn init_schema(&self, backend: Backend) -> Result<(), StoreError> {
        sqlx::query(backend.create_table_sql())
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_region ON notifications (region)")
            .execute(&self.pool)
            .await?;

        match self.policy {
            TokenPolicy::Unique => {
                let created = sqlx::query(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_token_unique \
                     ON notifications (notification_token)",
                )
                .execute(&self.pool)
                .await;

                match created {
                    Ok(_) => {}
                    Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                        return Err(StoreError::ExistingDuplicates);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            TokenPolicy::AllowDuplicates => {
                // A previous run may have enforced uniqueness.
                sqlx::query("DROP INDEX IF EXISTS idx_notifications_token_unique")
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqlTokenStore {
    #[instrument(skip(self, token), fields(region = %region))]
    async fn register(&self, region: Region, token: &str) -> Result<RegistrationId, StoreError> {
        let result = sqlx::query_scalar::<_, i64>(
            "INSERT INTO notifications (notification_token, region) VALUES ($1, $2) RETURNING id",
        )
        .bind(token)
        .bind(region.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => {
                debug!(registration_id = id, "Stored registration");
                Ok(RegistrationId(id))
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateToken(token_fingerprint(token)))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(region = %region))]
    async fn list_by_region(&self, region: Region) -> Result<Vec<Registration>, StoreError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, notification_token FROM notifications WHERE region = $1 ORDER BY id",
        )
        .bind(region.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Registration {
                id: RegistrationId(row.id),
                token: row.notification_token,
                region,
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("SQL token store closed");
    }
}
