//! Signal Normalizer
//!
//! Converts raw provider counters (followers, subscribers, views) into a
//! bounded `[0, 1]` signal with strong diminishing returns: doubling an
//! already huge channel barely moves the score, while the same doubling near
//! zero matters a lot.

/// "Very large but attainable" follower count for a streaming profile.
pub const FOLLOWERS_CEILING: f64 = 10_000_000.0;

/// "Very large but attainable" video channel subscriber count.
pub const SUBSCRIBERS_CEILING: f64 = 10_000_000.0;

/// "Very large but attainable" hashtag view count on short-video platforms.
pub const HASHTAG_VIEWS_CEILING: f64 = 5_000_000_000.0;

/// Exponent of the concave transform applied after clamping.
const DIMINISHING_EXPONENT: f64 = 0.25;

/// Normalizes `raw` against `ceiling` into `[0, 1]`.
///
/// `r = clamp(raw / ceiling, 0, 1)` followed by `r^0.25`. Values above the
/// ceiling are clamped, never extrapolated. NaN, negative input or a
/// non-positive ceiling normalize to `0.0`.
pub fn normalize(raw: f64, ceiling: f64) -> f64 {
    if raw.is_nan() || raw <= 0.0 || ceiling.is_nan() || ceiling <= 0.0 {
        return 0.0;
    }

    let r = (raw / ceiling).clamp(0.0, 1.0);
    r.powf(DIMINISHING_EXPONENT)
}

/// [`normalize`] for integer counters, scaled to `0..=100`.
pub fn normalize_count(raw: u64, ceiling: f64) -> f64 {
    normalize(raw as f64, ceiling) * 100.0
}

/// `0..=cap` saturation over a small event count (square-root growth,
/// saturating at nine events).
pub fn count_scale(n: u32, cap: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    ((n as f64).sqrt() * (cap / 3.0)).min(cap)
}

/// `0..=cap` logarithmic scale over an audience size; saturates at 10^6.
pub fn log_scale(n: Option<u64>, cap: f64) -> f64 {
    match n {
        Some(n) if n > 0 => ((n.max(10) as f64).log10() * (cap / 6.0)).min(cap),
        _ => 0.0,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]
        #[test]
        fn normalize_is_monotonic(
            a in 0.0..1e12f64,
            b in 0.0..1e12f64,
            ceiling in 1.0..1e10f64,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(normalize(lo, ceiling) <= normalize(hi, ceiling));
        }

        #[test]
        fn normalize_is_bounded(x in 0.0..f64::MAX, ceiling in 1e-6..1e12f64) {
            let v = normalize(x, ceiling);
            prop_assert!((0.0..=1.0).contains(&v));
        }

        #[test]
        fn scales_never_exceed_cap(n in 0u32..100_000, m in proptest::option::of(0u64..u64::MAX)) {
            prop_assert!(count_scale(n, 12.0) <= 12.0);
            prop_assert!(log_scale(m, 10.0) <= 10.0);
        }
    }
}
