//! Performance scoring
//!
//! Maps raw engagement counters to a normalized [0, 1] score:
//!
//! ```text
//! score = min(1.0, views/100000*0.4 + likes/5000*0.3 + comments/500*0.2 + shares/200*0.1)
//! ```

use crate::core::item::RawMetrics;

/// Score given to content with no performance data at all
pub const NEUTRAL_SCORE: f64 = 0.5;

const VIEWS_NORM: f64 = 100_000.0;
const LIKES_NORM: f64 = 5_000.0;
const COMMENTS_NORM: f64 = 500.0;
const SHARES_NORM: f64 = 200.0;

const VIEWS_WEIGHT: f64 = 0.4;
const LIKES_WEIGHT: f64 = 0.3;
const COMMENTS_WEIGHT: f64 = 0.2;
const SHARES_WEIGHT: f64 = 0.1;

/// Pure scoring function. Missing counters count as 0; no metrics at all
/// yields [`NEUTRAL_SCORE`]. Inputs are expected to be validated.
pub fn performance_score(metrics: Option<&RawMetrics>) -> f64 {
    let metrics = match metrics {
        Some(m) if !m.is_empty() => m,
        _ => return NEUTRAL_SCORE,
    };

    let views = metrics.views.unwrap_or(0.0);
    let likes = metrics.likes.unwrap_or(0.0);
    let comments = metrics.comments.unwrap_or(0.0);
    let shares = metrics.shares.unwrap_or(0.0);

    let weighted = views / VIEWS_NORM * VIEWS_WEIGHT
        + likes / LIKES_NORM * LIKES_WEIGHT
        + comments / COMMENTS_NORM * COMMENTS_WEIGHT
        + shares / SHARES_NORM * SHARES_WEIGHT;

    weighted.min(1.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_metrics_is_neutral() {
        assert_eq!(performance_score(None), 0.5);
        assert_eq!(performance_score(Some(&RawMetrics::default())), 0.5);
    }

    #[test]
    fn test_clamped_at_one() {
        let metrics = RawMetrics {
            views: Some(250_000.0),
            likes: Some(0.0),
            comments: Some(0.0),
            shares: Some(0.0),
            ..RawMetrics::default()
        };
        assert_eq!(performance_score(Some(&metrics)), 1.0);

        let viral = RawMetrics {
            views: Some(10_000_000.0),
            likes: Some(900_000.0),
            comments: Some(40_000.0),
            shares: Some(80_000.0),
            ..RawMetrics::default()
        };
        assert_eq!(performance_score(Some(&viral)), 1.0);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let metrics = RawMetrics {
            likes: Some(2_500.0),
            ..RawMetrics::default()
        };
        assert!((performance_score(Some(&metrics)) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_sum() {
        let metrics = RawMetrics {
            views: Some(50_000.0),
            likes: Some(1_000.0),
            comments: Some(100.0),
            shares: Some(20.0),
            ..RawMetrics::default()
        };
        // 0.2 + 0.06 + 0.04 + 0.01
        assert!((performance_score(Some(&metrics)) - 0.31).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_zeros_are_not_neutral() {
        let metrics = RawMetrics {
            views: Some(0.0),
            ..RawMetrics::default()
        };
        assert_eq!(performance_score(Some(&metrics)), 0.0);
    }

    #[test]
    fn test_unused_counters_score_from_zero() {
        let metrics: RawMetrics = serde_json::from_str(r#"{"watch_time": 10}"#).unwrap();
        assert_eq!(performance_score(Some(&metrics)), 0.0);
    }

    #[test]
    fn test_pure() {
        let metrics = RawMetrics::views(75_000.0);
        let first = performance_score(Some(&metrics));
        for _ in 0..10 {
            performance_score(Some(&RawMetrics::views(1.0)));
            assert_eq!(performance_score(Some(&metrics)).to_bits(), first.to_bits());
        }
    }
}
