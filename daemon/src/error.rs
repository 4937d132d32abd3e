use thiserror::Error;

/// A bus transaction failed while talking to a sensor
#[derive(Debug, Error)]
pub enum SensorReadError {
    #[error("bus transaction failed: {0}")]
    Bus(String),
    #[error("device at mux {mux_addr:#04x} channel {channel} is unresponsive")]
    Unresponsive { mux_addr: u8, channel: u8 },
    #[error("bus transaction timed out")]
    Timeout,
}

/// Sampling-layer failures surfaced to the polling cycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    /// Retries exhausted with no acceptable reading and no last-good value
    #[error("no valid reading after retries")]
    NoValidReading,
    /// An averaging batch ended with zero accepted samples
    #[error("averaging batch contained no valid samples")]
    NoValidSamples,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("mqtt publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("telemetry serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sink rejected publish: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("fallback store write failed: {0}")]
    Database(#[from] sqlx::Error),
}
