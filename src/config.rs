//! Spin timing configuration and process-wide defaults
//!
//! Every new [`Spinner`](crate::Spinner) seeds its overall timeout and
//! inter-attempt wait from the process-wide defaults held here. Callers can
//! override the defaults for the whole process with [`set_defaults`]
//! (affecting future spinners only), or bypass them for a single call-site
//! with [`spin_with_config`](crate::spin_with_config).

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Baseline overall deadline: 4 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4000);

/// Baseline delay between a failed attempt and the next: 1 second.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(1000);

/// Timing configuration for a spin cycle
///
/// `timeout_ms` is the overall deadline measured from construction;
/// `wait_ms` is the delay inserted between a failed attempt and the next.
///
/// Both fields default to the [`DEFAULT_TIMEOUT`]/[`DEFAULT_WAIT`] baseline
/// when omitted from serialized config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SpinConfig {
    /// Overall deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            wait_ms: default_wait_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT.as_millis() as u64
}

impl SpinConfig {
    /// Get the overall deadline as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the inter-attempt wait as a [`Duration`]
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Return a copy with the given overall deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = clamp_ms(timeout);
        self
    }

    /// Return a copy with the given inter-attempt wait
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait_ms = clamp_ms(wait);
        self
    }
}

/// Millisecond count of a duration, saturating at `u64::MAX`.
pub(crate) fn clamp_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

static DEFAULTS: RwLock<SpinConfig> = RwLock::new(SpinConfig {
    timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
    wait_ms: DEFAULT_WAIT.as_millis() as u64,
});

/// Get the current process-wide default timing
///
/// This is what [`spin`](crate::spin) seeds every new spinner with.
pub fn defaults() -> SpinConfig {
    *DEFAULTS.read().unwrap_or_else(PoisonError::into_inner)
}

/// Replace the process-wide default timing
///
/// Affects spinners constructed after this call; spinners already
/// constructed keep the values they were seeded with.
pub fn set_defaults(config: SpinConfig) {
    *DEFAULTS.write().unwrap_or_else(PoisonError::into_inner) = config;
}

/// Restore the process-wide defaults to the [`DEFAULT_TIMEOUT`]/
/// [`DEFAULT_WAIT`] baseline
pub fn reset_defaults() {
    set_defaults(SpinConfig::default());
}
