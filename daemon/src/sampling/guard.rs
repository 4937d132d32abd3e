use std::collections::HashMap;
use std::time::Duration;

use crate::error::SampleError;
use crate::registry::ChannelHandle;

use super::{RawSample, Sampler};

/// Accept/reject and retry tuning for [`OutlierGuard`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Max microstrain difference against the last accepted reading
    pub threshold: f64,
    /// Rejected or failed attempts before giving up on the invocation
    pub max_retries: u32,
    /// First backoff delay; doubles after every rejected attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            threshold: 500.0,
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// Threshold-gated retry around a [`Sampler`].
///
/// Transient electrical spikes must not corrupt the running last-good state,
/// but a persistently noisy channel degrades to its last trustworthy reading
/// instead of blocking the cycle forever.
pub struct OutlierGuard {
    policy: RetryPolicy,
    last_good: HashMap<ChannelHandle, RawSample>,
}

impl OutlierGuard {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            last_good: HashMap::new(),
        }
    }

    /// Take one validated reading from the channel.
    ///
    /// The first-ever reading for a channel is accepted unconditionally.
    /// Afterwards a reading is accepted only if its strain is within the
    /// policy threshold of the last accepted one; rejections and bus faults
    /// both consume a retry and sleep an exponentially growing backoff.
    /// Once retries are exhausted the stale last-good reading is returned
    /// unchanged, or `NoValidReading` if the channel never produced one.
    pub async fn read<S: Sampler>(
        &mut self,
        sampler: &mut S,
        handle: ChannelHandle,
    ) -> Result<RawSample, SampleError> {
        let mut backoff = self.policy.initial_backoff;

        for attempt in 1..=self.policy.max_retries {
            match sampler.sample(handle) {
                Ok(sample) => match self.last_good.get(&handle) {
                    None => {
                        self.last_good.insert(handle, sample);
                        return Ok(sample);
                    }
                    Some(prev) => {
                        let diff = (sample.strain - prev.strain).abs();
                        if diff <= self.policy.threshold {
                            self.last_good.insert(handle, sample);
                            return Ok(sample);
                        }
                        tracing::info!(
                            channel = %handle,
                            diff,
                            threshold = self.policy.threshold,
                            "strain difference exceeded threshold, retrying"
                        );
                    }
                },
                Err(e) => {
                    tracing::error!(channel = %handle, attempt, "sensor read failed: {e}");
                }
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        match self.last_good.get(&handle) {
            Some(prev) => {
                tracing::error!(
                    channel = %handle,
                    retries = self.policy.max_retries,
                    "no acceptable reading, reusing last good value"
                );
                Ok(*prev)
            }
            None => Err(SampleError::NoValidReading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorReadError;
    use crate::sampling::testutil::ScriptedSampler;

    fn handle() -> ChannelHandle {
        ChannelHandle::new(0x70, 0)
    }

    #[tokio::test]
    async fn first_reading_is_accepted_unconditionally() {
        let mut sampler = ScriptedSampler::new(vec![Ok(ScriptedSampler::reading(987654.0))]);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        let sample = guard.read(&mut sampler, handle()).await.unwrap();
        assert_eq!(sample.strain, 987654.0);
    }

    #[tokio::test]
    async fn reading_within_threshold_is_accepted() {
        let mut sampler = ScriptedSampler::new(vec![
            Ok(ScriptedSampler::reading(1000.0)),
            Ok(ScriptedSampler::reading(1400.0)),
        ]);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        guard.read(&mut sampler, handle()).await.unwrap();
        let sample = guard.read(&mut sampler, handle()).await.unwrap();
        assert_eq!(sample.strain, 1400.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reading_beyond_threshold_is_rejected_then_retried() {
        let mut sampler = ScriptedSampler::new(vec![
            Ok(ScriptedSampler::reading(1000.0)),
            Ok(ScriptedSampler::reading(1600.0)),
            Ok(ScriptedSampler::reading(1300.0)),
        ]);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        guard.read(&mut sampler, handle()).await.unwrap();

        let start = tokio::time::Instant::now();
        let sample = guard.read(&mut sampler, handle()).await.unwrap();
        assert_eq!(sample.strain, 1300.0);
        // one rejection, one backoff step
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_the_stale_last_good_value() {
        let mut responses = vec![Ok(ScriptedSampler::reading(1000.0))];
        responses.extend((0..5).map(|_| Ok(ScriptedSampler::reading(9000.0))));
        let mut sampler = ScriptedSampler::new(responses);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        guard.read(&mut sampler, handle()).await.unwrap();

        let sample = guard.read(&mut sampler, handle()).await.unwrap();
        assert_eq!(sample.strain, 1000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_across_retries() {
        let mut sampler =
            ScriptedSampler::new((0..5).map(|_| Err(SensorReadError::Timeout)).collect());
        let mut guard = OutlierGuard::new(RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let err = guard.read(&mut sampler, handle()).await.unwrap_err();
        assert_eq!(err, SampleError::NoValidReading);
        // 1 + 2 + 4 + 8 + 16
        assert_eq!(start.elapsed(), Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn bus_faults_consume_the_same_retry_budget_as_rejections() {
        let mut sampler = ScriptedSampler::new(vec![
            Ok(ScriptedSampler::reading(1000.0)),
            Err(SensorReadError::Timeout),
            Ok(ScriptedSampler::reading(9000.0)),
            Ok(ScriptedSampler::reading(1200.0)),
        ]);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        guard.read(&mut sampler, handle()).await.unwrap();

        let start = tokio::time::Instant::now();
        let sample = guard.read(&mut sampler, handle()).await.unwrap();
        assert_eq!(sample.strain, 1200.0);
        // fault then rejection: 1s + 2s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
