//! Anti-Cheat Validators
//!
//! Mandatory pre-conditions checked before any input mutates state.
//! Failures are silent no-ops by design: rejecting without explanation
//! avoids telling an exploit author why the attempt failed.

use crate::core::vec2::Vec2;
use crate::TICK_INTERVAL_MS;

/// Tolerance multiplier on the movement budget (jitter allowance).
pub const MOVEMENT_TOLERANCE: f32 = 1.10;

/// Accept or reject a requested movement.
///
/// The straight-line displacement must not exceed
/// `max_speed * (dt_ms / tick_interval) * 1.10`. Displacement exactly at
/// the budget is accepted.
pub fn validate_movement(max_speed: f32, current: Vec2, requested: Vec2, dt_ms: u64) -> bool {
    let budget = max_speed * (dt_ms as f32 / TICK_INTERVAL_MS as f32) * MOVEMENT_TOLERANCE;
    let displacement = current.distance(requested);
    // Relative slack absorbs float rounding at the exact boundary
    displacement <= budget * (1.0 + 1e-6)
}

/// Accept or reject an attack based on the rate limit.
///
/// Rejects any attack arriving before `cooldown_ms` has elapsed since the
/// last accepted attack.
pub fn validate_attack_rate(last_attack_ms: u64, now_ms: u64, cooldown_ms: u64) -> bool {
    now_ms.saturating_sub(last_attack_ms) >= cooldown_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_movement_exactly_at_budget_accepted() {
        let max_speed = 0.5;
        let dt_ms = 200;
        let budget = max_speed * (dt_ms as f32 / TICK_INTERVAL_MS as f32) * MOVEMENT_TOLERANCE;

        let from = Vec2::ZERO;
        let at_budget = Vec2::new(budget, 0.0);
        assert!(validate_movement(max_speed, from, at_budget, dt_ms));
    }

    #[test]
    fn test_movement_over_budget_rejected() {
        let max_speed = 0.5;
        let dt_ms = 200;
        let budget = max_speed * (dt_ms as f32 / TICK_INTERVAL_MS as f32) * MOVEMENT_TOLERANCE;

        let from = Vec2::ZERO;
        let over = Vec2::new(budget * 1.01, 0.0);
        assert!(!validate_movement(max_speed, from, over, dt_ms));
    }

    #[test]
    fn test_zero_dt_allows_no_displacement() {
        let from = Vec2::ZERO;
        assert!(validate_movement(0.5, from, from, 0));
        assert!(!validate_movement(0.5, from, Vec2::new(0.5, 0.0), 0));
    }

    #[test]
    fn test_attack_rate_boundary() {
        assert!(!validate_attack_rate(1000, 1599, 600));
        assert!(validate_attack_rate(1000, 1600, 600));
        assert!(validate_attack_rate(1000, 5000, 600));
    }

    #[test]
    fn test_fresh_player_can_attack_after_cooldown() {
        // A fresh player has last_attack_ms == 0
        assert!(!validate_attack_rate(0, 599, 600));
        assert!(validate_attack_rate(0, 600, 600));
    }

    proptest! {
        #[test]
        fn prop_within_half_budget_always_accepted(
            speed in 0.1f32..10.0,
            dt in 1u64..5_000,
            frac in 0.0f32..0.5,
        ) {
            let budget = speed * (dt as f32 / TICK_INTERVAL_MS as f32) * MOVEMENT_TOLERANCE;
            let target = Vec2::new(budget * frac, 0.0);
            prop_assert!(validate_movement(speed, Vec2::ZERO, target, dt));
        }

        #[test]
        fn prop_double_budget_always_rejected(
            speed in 0.1f32..10.0,
            dt in 1u64..5_000,
        ) {
            let budget = speed * (dt as f32 / TICK_INTERVAL_MS as f32) * MOVEMENT_TOLERANCE;
            let target = Vec2::new(budget * 2.0, 0.0);
            prop_assert!(!validate_movement(speed, Vec2::ZERO, target, dt));
        }
    }
}
