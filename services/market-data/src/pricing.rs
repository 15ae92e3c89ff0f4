//! Price derivation and windowed history maintenance
//!
//! A price is the mean market share over the trailing window, scaled by
//! 100,000 and truncated to cents. All arithmetic is `Decimal`, and shares
//! are stored at a fixed 12 decimal places, so the sum over a window is
//! exact and the result does not depend on sample order.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use types::item::{PriceSample, ShareSample, Timestamped};
use types::numeric::Price;

/// Price of an item holding the entire market for the whole window.
pub const PRICE_SCALE_FACTOR: i64 = 100_000;

/// Decimal places kept on a stored market share.
pub const SHARE_SCALE: u32 = 12;

/// Market share of `population` out of `total`, truncated to
/// [`SHARE_SCALE`] places. `None` when `total` is zero.
pub fn market_share(population: u64, total: u64) -> Option<Decimal> {
    if total == 0 {
        return None;
    }
    let share = Decimal::from(population) / Decimal::from(total);
    Some(share.round_dp_with_strategy(SHARE_SCALE, RoundingStrategy::ToZero))
}

/// Derive the price for a windowed share history.
///
/// Returns `None` for an empty history.
pub fn derive_price(shares: &[ShareSample]) -> Option<Price> {
    if shares.is_empty() {
        return None;
    }
    let sum: Decimal = shares.iter().map(|s| s.market_share).sum();
    let mean = sum / Decimal::from(shares.len() as u64);
    Some(Price::from_decimal_truncated(
        mean * Decimal::from(PRICE_SCALE_FACTOR),
    ))
}

/// Drop every sample at or before `cutoff`, keeping the rest in order.
///
/// Returns the number of samples removed. Running it again with the same
/// cutoff removes nothing.
pub fn evict_stale<T: Timestamped>(history: &mut Vec<T>, cutoff: DateTime<Utc>) -> usize {
    let before = history.len();
    history.retain(|s| s.at() > cutoff);
    before - history.len()
}

/// Highest and lowest price in the history, or `None` if it is empty.
pub fn hi_lo(history: &[PriceSample]) -> Option<(Price, Price)> {
    let first = history.first()?.price;
    Some(history.iter().fold((first, first), |(hi, lo), s| {
        (hi.max(s.price), lo.min(s.price))
    }))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn samples(raw: &[(u64, i64)]) -> Vec<ShareSample> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        raw.iter()
            .map(|&(micro, mins)| ShareSample {
                market_share: Decimal::new(micro as i64, 6),
                at: base + Duration::minutes(mins),
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_price_independent_of_order(
            raw in proptest::collection::vec((0u64..=1_000_000, 0i64..2880), 1..64),
            seed in any::<u64>(),
        ) {
            let forward = samples(&raw);
            let mut shuffled = forward.clone();
            // Fisher-Yates driven by a 64-bit LCG seeded from proptest.
            let mut state = seed;
            for i in (1..shuffled.len()).rev() {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let j = ((state >> 33) % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            prop_assert_eq!(derive_price(&forward), derive_price(&shuffled));
        }

        #[test]
        fn prop_eviction_idempotent(
            raw in proptest::collection::vec((0u64..=1_000_000, 0i64..2880), 0..64),
            cutoff_mins in 0i64..2880,
        ) {
            let mut sorted = samples(&raw);
            sorted.sort_by_key(|s| s.at);
            let cutoff =
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(cutoff_mins);

            let mut once = sorted.clone();
            evict_stale(&mut once, cutoff);
            let mut twice = once.clone();
            evict_stale(&mut twice, cutoff);

            prop_assert_eq!(&once, &twice);
            prop_assert!(once.iter().all(|s| s.at > cutoff));
            prop_assert!(once.windows(2).all(|w| w[0].at <= w[1].at));
        }

        #[test]
        fn prop_price_never_exceeds_full_share(
            raw in proptest::collection::vec((0u64..=1_000_000, 0i64..2880), 1..64),
        ) {
            let p = derive_price(&samples(&raw)).unwrap();
            prop_assert!(p <= Price::from_cents(10_000_000));
        }
    }
}
