//! User level derived from experience
//!
//! Level `L` covers the half-open range `[(L-1)² × 100, L² × 100)`:
//!
//! | level | exp        |
//! |-------|------------|
//! | 1     | 0 – 99     |
//! | 2     | 100 – 399  |
//! | 3     | 400 – 899  |
//! | 4     | 900 – 1599 |
//!
//! The level is found by binary search in integer arithmetic so the
//! perfect-square boundaries are exact. A threshold that overflows `i64` lies
//! above every possible exp.

use serde::{Deserialize, Serialize};

const EXP_PER_LEVEL_UNIT: i64 = 100;

/// Smallest level `L ≥ 1` with `L² × 100 > exp`. Negative exp counts as 0.
pub fn level_for_exp(exp: i64) -> i32 {
    let exp = exp.max(0);
    let above = |level: i64| {
        level
            .checked_mul(level)
            .and_then(|square| square.checked_mul(EXP_PER_LEVEL_UNIT))
            .map_or(true, |threshold| threshold > exp)
    };

    // above(high) always holds: high² × 100 overflows i64
    let (mut low, mut high) = (1i64, i64::from(i32::MAX));
    while low < high {
        let mid = low + (high - low) / 2;
        if above(mid) {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    low as i32
}

/// Exp at which a level starts, saturating at `i64::MAX`
fn threshold(level: i64) -> i64 {
    let steps = (level - 1).max(0);
    steps.saturating_mul(steps).saturating_mul(EXP_PER_LEVEL_UNIT)
}

/// Exp at which `level` starts
pub fn exp_floor(level: i32) -> i64 {
    threshold(i64::from(level.max(1)))
}

/// Total exp needed to reach `level + 1`
pub fn exp_for_next_level(level: i32) -> i64 {
    threshold(i64::from(level.max(1)) + 1)
}

/// Where a user stands within their current level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub exp: i64,
    pub level: i32,
    /// Exp at which the current level started
    pub current_level_exp: i64,
    /// Exp at which the next level starts
    pub next_level_exp: i64,
    /// Whole percent of the way to the next level, 0–99
    pub progress_percent: i64,
}

impl LevelProgress {
    /// Progress for a raw exp value
    pub fn of(exp: i64) -> Self {
        let exp = exp.max(0);
        let level = level_for_exp(exp);
        let current_level_exp = exp_floor(level);
        let next_level_exp = exp_for_next_level(level);
        let span = next_level_exp - current_level_exp;
        let progress_percent = if span > 0 {
            ((exp - current_level_exp) * 100 / span).min(99)
        } else {
            0
        };

        Self {
            exp,
            level,
            current_level_exp,
            next_level_exp,
            progress_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        let cases = [
            (0, 1),
            (99, 1),
            (100, 2),
            (399, 2),
            (400, 3),
            (899, 3),
            (900, 4),
            (1599, 4),
            (1600, 5),
        ];
        for (exp, level) in cases {
            assert_eq!(level_for_exp(exp), level, "exp {}", exp);
        }
    }

    #[test]
    fn test_negative_exp_clamped() {
        assert_eq!(level_for_exp(-50), 1);
        assert_eq!(LevelProgress::of(-1).exp, 0);
    }

    #[test]
    fn test_exp_thresholds() {
        assert_eq!(exp_floor(1), 0);
        assert_eq!(exp_floor(3), 400);
        assert_eq!(exp_for_next_level(1), 100);
        assert_eq!(exp_for_next_level(4), 1600);
        assert_eq!(exp_for_next_level(0), 100);
    }

    #[test]
    fn test_extreme_exp() {
        let level = level_for_exp(i64::MAX);
        assert_eq!(level, 303_700_050);
        assert!(exp_floor(level) <= i64::MAX);
        assert_eq!(level_for_exp(exp_floor(level)), level);
        assert_eq!(level_for_exp(exp_floor(level) - 1), level - 1);

        assert_eq!(exp_for_next_level(i32::MAX), i64::MAX);
        let progress = LevelProgress::of(i64::MAX);
        assert_eq!(progress.level, level);
        assert!((0..100).contains(&progress.progress_percent));
    }

    #[test]
    fn test_progress() {
        let progress = LevelProgress::of(250);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.current_level_exp, 100);
        assert_eq!(progress.next_level_exp, 400);
        assert_eq!(progress.progress_percent, 50);

        assert_eq!(LevelProgress::of(400).progress_percent, 0);
    }
}
