//! Streaming and event log configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Streaming configuration
///
/// Covers the broadcast hub, the stream session registry, and the
/// retention policy applied to the durable event log.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Seconds between heartbeat frames pushed to idle subscribers
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Buffered frames per subscriber before eviction
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Event log TTL while a stream is still producing, in seconds
    #[serde(default = "default_retention_idle_secs")]
    pub retention_idle_secs: u64,

    /// Event log TTL applied once a stream completes, in seconds
    #[serde(default = "default_retention_done_secs")]
    pub retention_done_secs: u64,

    /// Seconds without an append before an in-memory session is swept
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Seconds between idle session sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl StreamingConfig {
    /// Get heartbeat interval as Duration
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Get idle event log retention as Duration
    pub fn idle_retention(&self) -> Duration {
        Duration::from_secs(self.retention_idle_secs)
    }

    /// Get post-completion event log retention as Duration
    pub fn done_retention(&self) -> Duration {
        Duration::from_secs(self.retention_done_secs)
    }

    /// Get session idle cutoff as Duration
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate streaming configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.heartbeat_secs == 0 || self.heartbeat_secs > 120 {
            return Err(ValidationError::InvalidHeartbeatInterval);
        }
        if self.channel_capacity == 0 {
            return Err(ValidationError::InvalidChannelCapacity);
        }
        if self.retention_idle_secs == 0
            || self.retention_done_secs == 0
            || self.retention_done_secs > self.retention_idle_secs
        {
            return Err(ValidationError::InvalidRetention);
        }
        Ok(())
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            channel_capacity: default_channel_capacity(),
            retention_idle_secs: default_retention_idle_secs(),
            retention_done_secs: default_retention_done_secs(),
            session_idle_secs: default_session_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_channel_capacity() -> usize {
    64
}

fn default_retention_idle_secs() -> u64 {
    3600
}

fn default_retention_done_secs() -> u64 {
    300
}

fn default_session_idle_secs() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    30
}
