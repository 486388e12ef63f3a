//! Release and fee arithmetic
//!
//! Pure functions with no access to engine state:
//! - [`releasable`] computes how much of a stream has accrued but not been paid
//! - [`split_fee`] divides a gross release into protocol fee and net payout
//! - [`prorate`] scales an amount by an elapsed fraction of a window
//!
//! All division truncates. Linear accrual therefore under-releases by less
//! than one unit per call, and the shortfall is only ever paid out by the
//! release at or after `end_time`. The fee split is exact: the net share is
//! obtained by subtraction, so `fee + net == gross` always holds.

use crate::types::{Amount, Stream, Timestamp};

/// Denominator of basis-point rates
pub const BPS_DENOMINATOR: u128 = 10_000;

/// A gross amount split into its protocol-fee and beneficiary shares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    /// Share paid to the protocol fee recipient
    pub fee: Amount,
    /// Share paid to the payee
    pub net: Amount,
}

/// Compute `floor(amount * numerator / denominator)` for `numerator <= denominator`
///
/// Splits `amount` by the denominator first so no intermediate product can
/// exceed `amount` or `denominator * numerator`, both of which fit in `u128`.
///
/// # Panics
///
/// Panics if `denominator` is zero. Callers only pass stream durations
/// (strictly positive by construction) or [`BPS_DENOMINATOR`].
pub fn prorate(amount: Amount, numerator: u128, denominator: u128) -> Amount {
    debug_assert!(numerator <= denominator);
    let whole = amount / denominator;
    let rest = amount % denominator;
    whole * numerator + rest * numerator / denominator
}

/// Amount of `stream` currently eligible for release at `now`
///
/// - `now <= start_time`: 0
/// - `now >= end_time`: everything not yet released
/// - otherwise: linear accrual, truncated, minus what was already released
///
/// A `now` earlier than a previous release yields 0 rather than underflowing.
pub fn releasable(stream: &Stream, now: Timestamp) -> Amount {
    if now <= stream.start_time {
        return 0;
    }
    if now >= stream.end_time {
        return stream.remaining();
    }

    let elapsed = u128::from(now - stream.start_time);
    let duration = u128::from(stream.duration());
    prorate(stream.total_amount, elapsed, duration).saturating_sub(stream.released_amount)
}

/// Split `gross` at `fee_bps` basis points
///
/// `fee = floor(gross * fee_bps / 10_000)` and `net = gross - fee`.
pub fn split_fee(gross: Amount, fee_bps: u16) -> FeeSplit {
    let bps = u128::from(fee_bps).min(BPS_DENOMINATOR);
    let fee = prorate(gross, bps, BPS_DENOMINATOR);
    FeeSplit {
        fee,
        net: gross - fee,
    }
}

/// Value the payee has earned if the stream is cancelled at `now`
///
/// Elapsed time is clamped to the stream window, so a cancellation after
/// `end_time` behaves like one exactly at `end_time`. The result is never
/// below what has already been released.
pub fn owed_at(stream: &Stream, now: Timestamp) -> Amount {
    let duration = stream.duration();
    let elapsed = now.saturating_sub(stream.start_time).min(duration);
    prorate(
        stream.total_amount,
        u128::from(elapsed),
        u128::from(duration),
    )
    .max(stream.released_amount)
}
