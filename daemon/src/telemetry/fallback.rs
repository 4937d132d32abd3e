use sqlx::SqlitePool;

use crate::error::StorageError;

use super::TelemetryFrame;

/// Durable append-only persistence for frames that failed delivery.
///
/// One row per channel measurement, never mutated or deleted here. The
/// backlog is a write-only audit log as far as the daemon is concerned; a
/// storage fault loses the cycle's data but never stops the polling loop.
pub struct FallbackStore {
    pool: SqlitePool,
}

impl FallbackStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        frame: &TelemetryFrame,
        recorded_at: i64,
    ) -> Result<(), StorageError> {
        for (handle, m) in frame.iter() {
            sqlx::query(
                r#"
                INSERT INTO telemetry_backlog (
                    recorded_at, multiplexer_address, channel_index,
                    average_dv, average_v, average_strain
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(recorded_at)
            .bind(handle.mux_addr as i64)
            .bind(handle.channel as i64)
            .bind(m.average_dv)
            .bind(m.average_v)
            .bind(m.average_strain)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
