use std::collections::HashMap;
use std::time::Duration;

use crate::baseline::BaselineCalibrator;
use crate::registry::{ChannelHandle, ChannelRegistry};
use crate::sampling::{Averager, OutlierGuard, Sampler};
use crate::telemetry::{ChannelMeasurement, FallbackStore, TelemetryFrame, TelemetrySink};

/// The acquisition → validation → telemetry loop.
///
/// Channels are processed strictly in registry order on one task; the gain
/// register is device-scoped, so this serialization is a correctness
/// requirement rather than a simplification. A channel stuck in backoff
/// delays the rest of its cycle (up to ~31 s with default retry settings).
pub struct Pipeline<S, K> {
    registry: ChannelRegistry,
    sampler: S,
    guard: OutlierGuard,
    averager: Averager,
    baseline: BaselineCalibrator,
    sink: K,
    fallback: FallbackStore,
    poll_interval: Duration,
    /// Previous cycle's adjusted strain, for the per-channel delta log line
    previous: HashMap<ChannelHandle, f64>,
}

impl<S: Sampler, K: TelemetrySink> Pipeline<S, K> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ChannelRegistry,
        sampler: S,
        guard: OutlierGuard,
        averager: Averager,
        baseline: BaselineCalibrator,
        sink: K,
        fallback: FallbackStore,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            sampler,
            guard,
            averager,
            baseline,
            sink,
            fallback,
            poll_interval,
            previous: HashMap::new(),
        }
    }

    /// Operator-triggered zero-reference capture across every channel.
    pub async fn capture_baseline(&mut self) {
        self.baseline
            .capture(
                &self.registry,
                &self.averager,
                &mut self.guard,
                &mut self.sampler,
            )
            .await;
    }

    /// Sample every channel once, publish the frame, fall back on failure.
    ///
    /// Per-channel faults only exclude that channel from the frame; nothing
    /// in here terminates the loop.
    pub async fn run_cycle(&mut self) {
        let channels: Vec<ChannelHandle> = self.registry.channels().to_vec();
        let mut frame = TelemetryFrame::new();

        for handle in channels {
            match self
                .averager
                .average(&mut self.guard, &mut self.sampler, handle)
                .await
            {
                Ok(avg) => {
                    let adjusted = self.baseline.adjust(handle, avg.strain);
                    let delta = self
                        .previous
                        .insert(handle, adjusted)
                        .map(|prev| adjusted - prev)
                        .unwrap_or(0.0);
                    tracing::info!(
                        channel = %handle,
                        dv = avg.dv,
                        v = avg.v,
                        strain = adjusted,
                        delta,
                        "cycle average"
                    );
                    frame.insert(
                        handle,
                        ChannelMeasurement {
                            average_dv: avg.dv,
                            average_v: avg.v,
                            average_strain: adjusted,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(channel = %handle, "channel excluded from cycle: {e}");
                }
            }
        }

        if frame.is_empty() {
            tracing::warn!("no channel produced a sample this cycle, nothing to publish");
            return;
        }

        match self.sink.publish(&frame).await {
            Ok(()) => tracing::debug!(channels = frame.len(), "telemetry delivered"),
            Err(e) => {
                tracing::error!("publish failed, writing cycle to fallback store: {e}");
                let recorded_at = chrono::Utc::now().timestamp();
                if let Err(e) = self.fallback.append(&frame, recorded_at).await {
                    tracing::error!("fallback write failed, cycle data lost: {e}");
                }
            }
        }
    }

    /// Poll forever at the configured interval.
    pub async fn run(&mut self) {
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedBus;
    use crate::db;
    use crate::error::PublishError;
    use crate::sampling::{RetryPolicy, SampleReader};
    use crate::telemetry::TelemetryFrame;
    use sqlx::SqlitePool;
    use std::cell::RefCell;

    struct RecordingSink {
        fail: bool,
        published: RefCell<Vec<TelemetryFrame>>,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                published: RefCell::new(Vec::new()),
            }
        }
    }

    impl TelemetrySink for RecordingSink {
        async fn publish(&self, frame: &TelemetryFrame) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Rejected("sink down".into()));
            }
            self.published.borrow_mut().push(frame.clone());
            Ok(())
        }
    }

    // single connection, or each pooled connection sees its own :memory: db
    async fn memory_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrate(&pool).await.unwrap();
        pool
    }

    fn pipeline(
        sink: RecordingSink,
        pool: SqlitePool,
    ) -> Pipeline<SampleReader<SimulatedBus>, RecordingSink> {
        let mut bus = SimulatedBus::new(&[0x70]);
        let registry = ChannelRegistry::discover(&mut bus, &[0x70]);
        Pipeline::new(
            registry,
            SampleReader::new(bus),
            OutlierGuard::new(RetryPolicy::default()),
            Averager::new(10),
            BaselineCalibrator::new(),
            sink,
            FallbackStore::new(pool),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn successful_cycle_publishes_every_channel_and_writes_no_fallback() {
        let pool = memory_pool().await;
        let mut pipeline = pipeline(RecordingSink::new(false), pool.clone());

        pipeline.run_cycle().await;

        let published = pipeline.sink.published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].len(), 4);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM telemetry_backlog")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn failed_publish_writes_one_fallback_row_per_channel() {
        let pool = memory_pool().await;
        let mut pipeline = pipeline(RecordingSink::new(true), pool.clone());

        pipeline.run_cycle().await;

        let rows: Vec<(i64, i64, f64)> = sqlx::query_as(
            "SELECT multiplexer_address, channel_index, average_strain \
             FROM telemetry_backlog ORDER BY channel_index",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(rows.len(), 4);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.0, 0x70);
            assert_eq!(row.1, i as i64);
            // simulator idles near its unloaded strain indication
            assert!((row.2 - 1169.8).abs() < 10.0);
        }
    }

    #[tokio::test]
    async fn baseline_capture_zeroes_the_published_strain() {
        let pool = memory_pool().await;
        let mut pipeline = pipeline(RecordingSink::new(false), pool);

        pipeline.capture_baseline().await;
        pipeline.run_cycle().await;

        let published = pipeline.sink.published.borrow();
        for (_, m) in published[0].iter() {
            assert!(m.average_strain.abs() < 5.0, "strain {}", m.average_strain);
        }
    }
}
