//! Per-command context — transport, device profile, arguments, retry policy.
//!
//! A context lives for exactly one CLI command. It borrows the opened
//! transport; dropping the transport after the command closes the device.

use std::time::Duration;

use crate::config::Config;
use crate::models::DeviceProfile;
use crate::protocol::{MAX_RETRIES, SOFT_DEADLINE_MS};
use crate::transport::HidTransport;

/// Bounds for the register read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// GET attempts before giving up.
    pub max_retries: u32,
    /// How long unrelated packets may keep arriving before an attempt is
    /// treated as timed out.
    pub soft_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: MAX_RETRIES,
            soft_deadline: Duration::from_millis(SOFT_DEADLINE_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            soft_deadline: Duration::from_millis(config.soft_deadline_ms),
        }
    }
}

pub struct Context<'a> {
    pub transport: &'a dyn HidTransport,
    pub profile: &'static DeviceProfile,
    /// Operation arguments left after the model selector.
    pub args: &'a [String],
    pub policy: RetryPolicy,
}

impl<'a> Context<'a> {
    pub fn new(
        transport: &'a dyn HidTransport,
        profile: &'static DeviceProfile,
        args: &'a [String],
    ) -> Self {
        Context {
            transport,
            profile,
            args,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Length of an outgoing frame (report size + report id).
    pub fn output_len(&self) -> usize {
        self.profile.output_report_size + 1
    }

    /// Length of an incoming frame (report size + report id).
    pub fn input_len(&self) -> usize {
        self.profile.input_report_size + 1
    }
}
