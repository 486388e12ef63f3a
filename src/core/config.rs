//! Engine configuration
//!
//! Bounds applied to stream creation and the protocol fee rate. Invalid values
//! passed to [`EngineConfig::new`] fall back to the defaults with a warning,
//! the same way the replay batch configuration does.

use crate::core::calculator::BPS_DENOMINATOR;
use crate::types::Amount;

/// Smallest committable amount
pub const DEFAULT_MIN_AMOUNT: Amount = 100;
/// One hour
pub const DEFAULT_MIN_DURATION: u64 = 3_600;
/// 365 days
pub const DEFAULT_MAX_DURATION: u64 = 365 * 24 * 3_600;
/// 2.5%
pub const DEFAULT_PROTOCOL_FEE_BPS: u16 = 250;
/// Handles accepted by one batch release
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Engine bounds and rates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Smallest `amount` accepted by stream creation
    pub min_amount: Amount,
    /// Shortest accepted stream duration in seconds
    pub min_duration: u64,
    /// Longest accepted stream duration in seconds
    pub max_duration: u64,
    /// Protocol fee on every release, in basis points
    pub protocol_fee_bps: u16,
    /// Maximum number of handles in one batch release
    pub max_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_amount: DEFAULT_MIN_AMOUNT,
            min_duration: DEFAULT_MIN_DURATION,
            max_duration: DEFAULT_MAX_DURATION,
            protocol_fee_bps: DEFAULT_PROTOCOL_FEE_BPS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl EngineConfig {
    /// Create a configuration, replacing invalid values by their defaults
    ///
    /// - `min_amount` must be positive
    /// - `min_duration` must be positive and not above `max_duration`
    ///   (both bounds revert to defaults otherwise)
    /// - `protocol_fee_bps` must not exceed 10 000
    /// - `max_batch_size` must be positive
    pub fn new(
        min_amount: Amount,
        min_duration: u64,
        max_duration: u64,
        protocol_fee_bps: u16,
        max_batch_size: usize,
    ) -> Self {
        let default = Self::default();

        let min_amount = if min_amount == 0 {
            tracing::warn!(
                min_amount,
                default = default.min_amount,
                "invalid min_amount, using default"
            );
            default.min_amount
        } else {
            min_amount
        };

        let (min_duration, max_duration) = if min_duration == 0 || min_duration > max_duration {
            tracing::warn!(
                min_duration,
                max_duration,
                default_min = default.min_duration,
                default_max = default.max_duration,
                "invalid duration bounds, using defaults"
            );
            (default.min_duration, default.max_duration)
        } else {
            (min_duration, max_duration)
        };

        let protocol_fee_bps = if u128::from(protocol_fee_bps) > BPS_DENOMINATOR {
            tracing::warn!(
                protocol_fee_bps,
                default = default.protocol_fee_bps,
                "invalid protocol_fee_bps, using default"
            );
            default.protocol_fee_bps
        } else {
            protocol_fee_bps
        };

        let max_batch_size = if max_batch_size == 0 {
            tracing::warn!(
                max_batch_size,
                default = default.max_batch_size,
                "invalid max_batch_size, using default"
            );
            default.max_batch_size
        } else {
            max_batch_size
        };

        Self {
            min_amount,
            min_duration,
            max_duration,
            protocol_fee_bps,
            max_batch_size,
        }
    }
}
