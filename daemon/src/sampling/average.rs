use crate::error::SampleError;
use crate::registry::ChannelHandle;

use super::{OutlierGuard, RawSample, Sampler};

/// Arithmetic mean over a batch of validated readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AveragedSample {
    pub dv: f64,
    pub v: f64,
    pub strain: f64,
}

/// Repeats guarded reads and reduces them to a mean sample.
///
/// Single reads are too noisy for the target resolution; the batch size
/// exists purely for noise suppression.
pub struct Averager {
    batch_size: usize,
}

impl Averager {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Take `batch_size` guarded readings from the channel and average them.
    ///
    /// Attempts that end in `NoValidReading` are discarded; the batch fails
    /// with `NoValidSamples` only if nothing at all was accepted.
    pub async fn average<S: Sampler>(
        &self,
        guard: &mut OutlierGuard,
        sampler: &mut S,
        handle: ChannelHandle,
    ) -> Result<AveragedSample, SampleError> {
        let mut accepted: Vec<RawSample> = Vec::with_capacity(self.batch_size);

        for _ in 0..self.batch_size {
            match guard.read(sampler, handle).await {
                Ok(sample) => accepted.push(sample),
                Err(SampleError::NoValidReading) => continue,
                Err(e) => return Err(e),
            }
        }

        if accepted.is_empty() {
            return Err(SampleError::NoValidSamples);
        }

        let n = accepted.len() as f64;
        Ok(AveragedSample {
            dv: accepted.iter().map(|s| s.dv).sum::<f64>() / n,
            v: accepted.iter().map(|s| s.v).sum::<f64>() / n,
            strain: accepted.iter().map(|s| s.strain).sum::<f64>() / n,
        })
    }
}
