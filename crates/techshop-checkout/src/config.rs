//! # Checkout Configuration

use std::time::Duration;

/// Bounds and defaults for checkout attempts.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use techshop_checkout::CheckoutConfig;
///
/// let config = CheckoutConfig::default()
///     .snapshot_timeout(Duration::from_secs(1))
///     .allow_partial(true);
/// assert!(config.allow_partial);
/// ```
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Bound on the batched inventory read. Default: 3 seconds
    pub snapshot_timeout: Duration,

    /// Bound on each decrement and each rollback call. Default: 2 seconds
    pub decrement_timeout: Duration,

    /// Whether attempts buy what is available when the request does not
    /// say. Default: false (all-or-nothing)
    pub allow_partial: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            snapshot_timeout: Duration::from_secs(3),
            decrement_timeout: Duration::from_secs(2),
            allow_partial: false,
        }
    }
}

impl CheckoutConfig {
    pub fn snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    pub fn decrement_timeout(mut self, timeout: Duration) -> Self {
        self.decrement_timeout = timeout;
        self
    }

    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }
}
