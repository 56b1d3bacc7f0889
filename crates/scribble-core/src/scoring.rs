//! Points awarded for a passing round

use crate::config::ScoringConfig;

/// Points for passing at `level` on the `attempt`-th evaluated submission
///
/// `base * multiplier(level) + first_try_bonus / attempt`, with attempts
/// counted from 1.
#[must_use]
pub fn points(config: &ScoringConfig, level: u32, attempt: u32) -> u64 {
    let scaled = config.base_points as f64 * config.level_curve.multiplier(level);
    let scaled = if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled.round() as u64
    };
    let bonus = config.first_try_bonus / u64::from(attempt.max(1));
    scaled.saturating_add(bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LevelCurve;
    use proptest::prelude::*;

    #[test]
    fn first_try_at_level_one() {
        let config = ScoringConfig::default();
        assert_eq!(points(&config, 1, 1), config.base_points + config.first_try_bonus);
    }

    #[test]
    fn later_attempts_earn_less_bonus() {
        let config = ScoringConfig::default();
        assert_eq!(points(&config, 1, 2), 100 + 25);
        assert_eq!(points(&config, 1, 3), 100 + 16);
    }

    #[test]
    fn level_curves() {
        let linear = ScoringConfig {
            base_points: 100,
            level_curve: LevelCurve::Linear { step: 0.5 },
            first_try_bonus: 0,
        };
        assert_eq!(points(&linear, 3, 1), 200);

        let geometric = ScoringConfig {
            base_points: 100,
            level_curve: LevelCurve::Geometric { ratio: 2.0 },
            first_try_bonus: 0,
        };
        assert_eq!(points(&geometric, 4, 1), 800);
    }

    #[test]
    fn runaway_multiplier_saturates() {
        let geometric = ScoringConfig {
            base_points: 100,
            level_curve: LevelCurve::Geometric { ratio: 2.0 },
            first_try_bonus: 50,
        };
        assert_eq!(points(&geometric, 2_000, 1), u64::MAX);
        assert_eq!(points(&geometric, 70, 1), u64::MAX);
    }

    proptest! {
        #[test]
        fn first_try_never_scores_less(level in 1u32..50, attempt in 1u32..10) {
            let config = ScoringConfig::default();
            prop_assert!(points(&config, level, 1) >= points(&config, level, attempt));
        }

        #[test]
        fn higher_levels_never_score_less(level in 1u32..50, attempt in 1u32..10) {
            let config = ScoringConfig::default();
            prop_assert!(points(&config, level + 1, attempt) >= points(&config, level, attempt));
        }

        #[test]
        fn higher_levels_never_score_less_on_geometric_curve(
            level in 1u32..2_000,
            attempt in 1u32..10,
            ratio in 1.0f64..4.0,
        ) {
            let config = ScoringConfig {
                level_curve: LevelCurve::Geometric { ratio },
                ..ScoringConfig::default()
            };
            prop_assert!(points(&config, level + 1, attempt) >= points(&config, level, attempt));
        }
    }
}
