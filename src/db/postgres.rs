use crate::dispatch::SignalSink;
use crate::models::{Heartbeat, Signal};
use crate::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Rationale stored with every signal row written by the worker
pub const SIGNAL_RATIONALE: &str = "worker";

/// Postgres persistence for signals and worker health
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Connect to Postgres and create the worker tables if absent
    ///
    /// # Arguments
    /// * `database_url` - Postgres connection URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres");

        Ok(Self { pool })
    }

    /// Insert one signal row keyed by the full instrument identifier
    pub async fn save_signal(&self, signal: &Signal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signals (
                ts, symbol, decision, score, model_confidence, qty,
                entry_price, stop_loss, take_profit, rationale
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(signal.generated_at)
        .bind(&signal.instrument)
        .bind(signal.decision.as_str())
        .bind(signal.sentiment_score)
        .bind(signal.confidence)
        .bind(signal.quantity)
        .bind(signal.entry_price)
        .bind(signal.stop_loss)
        .bind(signal.take_profit)
        .bind(SIGNAL_RATIONALE)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Saved {} signal for {} to Postgres",
            signal.decision,
            signal.instrument
        );

        Ok(())
    }

    /// Append a worker health row
    pub async fn record_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO worker_health (worker_id, ws_status, model_local, backend_ok, latency_ms)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&heartbeat.worker_id)
        .bind(&heartbeat.ws_status)
        .bind(heartbeat.model_local)
        .bind(heartbeat.backend_ok)
        .bind(heartbeat.latency_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SignalSink for PostgresPersistence {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn publish(&self, signal: &Signal) -> anyhow::Result<()> {
        self.save_signal(signal)
            .await
            .map_err(|e| anyhow::anyhow!("signal insert failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Decision;
    use chrono::Utc;
    use sqlx::Row;

    impl PostgresPersistence {
        /// Count signal rows for an instrument
        async fn count_signals(&self, instrument: &str) -> Result<i64> {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM signals WHERE symbol = $1")
                .bind(instrument)
                .fetch_one(&self.pool)
                .await?;

            Ok(row.get("n"))
        }

        /// Most recent heartbeat of a worker, if any
        async fn latest_heartbeat(&self, worker_id: &str) -> Result<Option<Heartbeat>> {
            let row = sqlx::query(
                r#"
                SELECT worker_id, ws_status, model_local, backend_ok, latency_ms
                FROM worker_health
                WHERE worker_id = $1
                ORDER BY ts DESC, id DESC
                LIMIT 1
                "#,
            )
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(|row| Heartbeat {
                worker_id: row.get("worker_id"),
                ws_status: row.get("ws_status"),
                model_local: row.get("model_local"),
                backend_ok: row.get("backend_ok"),
                latency_ms: row.get("latency_ms"),
            }))
        }

        /// Delete every row written for an instrument
        async fn clear_signals(&self, instrument: &str) -> Result<()> {
            sqlx::query("DELETE FROM signals WHERE symbol = $1")
                .bind(instrument)
                .execute(&self.pool)
                .await?;

            Ok(())
        }
    }

    async fn get_test_db() -> PostgresPersistence {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/pulsetrade_test".to_string());

        PostgresPersistence::new(&database_url)
            .await
            .expect("Failed to connect to test database")
    }

    fn signal(instrument: &str) -> Signal {
        Signal {
            instrument: instrument.to_string(),
            decision: Decision::Buy,
            entry_price: 100.0,
            stop_loss: 97.0,
            take_profit: 104.0,
            sentiment_score: 0.1,
            confidence: 0.0,
            quantity: 1,
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    #[ignore] // Requires Postgres running
    async fn test_save_signal() {
        let db = get_test_db().await;
        let instrument = "NSE_EQ|TEST-SAVE";
        db.clear_signals(instrument).await.unwrap();

        db.save_signal(&signal(instrument)).await.unwrap();
        db.publish(&signal(instrument)).await.unwrap();

        assert_eq!(db.count_signals(instrument).await.unwrap(), 2);
        db.clear_signals(instrument).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Postgres running
    async fn test_record_heartbeat() {
        let db = get_test_db().await;
        let heartbeat = Heartbeat {
            worker_id: "test-worker".to_string(),
            ws_status: "polling".to_string(),
            model_local: false,
            backend_ok: true,
            latency_ms: 42,
        };

        db.record_heartbeat(&heartbeat).await.unwrap();

        let latest = db.latest_heartbeat("test-worker").await.unwrap().unwrap();
        assert_eq!(latest.ws_status, "polling");
        assert_eq!(latest.latency_ms, 42);
        assert!(latest.backend_ok);
    }
}
