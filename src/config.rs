//! # Core Configuration
//!
//! Configuration for a [`RilCore`](crate::RilCore) instance.
//!
//! The defaults match the shipped modem firmware and work out of the box:
//!
//! ```
//! use ril_runtime::CoreConfig;
//!
//! let config = CoreConfig::default();
//! assert_eq!(config.num_channels, 8);
//! ```
//!
//! For custom setups, use the builder:
//!
//! ```
//! use ril_runtime::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .num_channels(4)
//!     .buffer_capacity(1024)
//!     .max_subscribers(8)
//!     .request_timeout(Duration::from_secs(2))
//!     .build();
//! ```
//!
//! ## Configuration Options Reference
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `num_channels` | 8 | Logical channels multiplexed over the physical link |
//! | `buffer_capacity` | 4096 | Byte capacity of each ring buffer (per channel and per control-port direction) |
//! | `max_subscribers` | 32 | Upper bound on registered event subscribers |
//! | `request_timeout` | 5 s | Deadline applied to modem query transactions |

use std::time::Duration;

/// Default number of logical channels over the physical transport.
pub const DEFAULT_NUM_CHANNELS: usize = 8;

/// Default byte capacity of a bounded ring buffer.
///
/// Applies to each logical channel's inbound queue and to each direction of
/// the control port.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Default upper bound on registered event subscribers.
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 32;

/// Default transaction deadline for modem queries.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`RilCore`](crate::RilCore) instance.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Number of logical channels (default: 8).
    pub num_channels: usize,
    /// Ring buffer capacity in bytes (default: 4096).
    pub buffer_capacity: usize,
    /// Maximum number of event subscribers (default: 32).
    pub max_subscribers: usize,
    /// Deadline for query transactions (default: 5 seconds).
    pub request_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            num_channels: DEFAULT_NUM_CHANNELS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl CoreConfig {
    /// Create a builder for `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
#[must_use]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Set the number of logical channels.
    ///
    /// A value of 0 is clamped to 1; a mux with no channels is useless and
    /// every open would fail with `NotFound`.
    ///
    /// Default: 8
    pub fn num_channels(mut self, n: usize) -> Self {
        self.config.num_channels = n.max(1);
        self
    }

    /// Set the ring buffer capacity in bytes.
    ///
    /// A value of 0 is clamped to 1 so that `occupied < capacity` can hold
    /// and writers make progress.
    ///
    /// Default: 4096
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.buffer_capacity = bytes.max(1);
        self
    }

    /// Set the maximum number of event subscribers.
    ///
    /// Default: 32
    pub fn max_subscribers(mut self, n: usize) -> Self {
        self.config.max_subscribers = n;
        self
    }

    /// Set the deadline applied to modem query transactions.
    ///
    /// Default: 5 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
