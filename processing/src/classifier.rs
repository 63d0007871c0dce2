use crate::model::{RiskScore, RiskTier};

/// Scores above this are `High`.
pub const HIGH_THRESHOLD: RiskScore = 70.0;
/// Scores above this (and up to `HIGH_THRESHOLD`) are `Medium`.
pub const MEDIUM_THRESHOLD: RiskScore = 40.0;

/// Maps any score onto a tier. Out-of-range scores are valid input; NaN is
/// treated as `High`.
pub fn classify(score: RiskScore) -> RiskTier {
    if score.is_nan() || score > HIGH_THRESHOLD {
        RiskTier::High
    } else if score > MEDIUM_THRESHOLD {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(classify(40.0), RiskTier::Low);
        assert_eq!(classify(40.0001), RiskTier::Medium);
        assert_eq!(classify(70.0), RiskTier::Medium);
        assert_eq!(classify(70.0001), RiskTier::High);
    }

    #[test]
    fn total_over_the_real_line() {
        assert_eq!(classify(-5.0), RiskTier::Low);
        assert_eq!(classify(f64::NEG_INFINITY), RiskTier::Low);
        assert_eq!(classify(150.0), RiskTier::High);
        assert_eq!(classify(f64::INFINITY), RiskTier::High);
        assert_eq!(classify(f64::NAN), RiskTier::High);
    }

    #[test]
    fn sweep_matches_threshold_definition() {
        for step in -200..=2_000 {
            let score = f64::from(step) / 10.0;
            let expected = if score > 70.0 {
                RiskTier::High
            } else if score > 40.0 {
                RiskTier::Medium
            } else {
                RiskTier::Low
            };
            assert_eq!(classify(score), expected, "score {score}");
        }
    }
}
