//! Mob AI State Machine
//!
//! SEEKING -> WINDUP -> IMPACT -> RECOVERY -> SEEKING.
//!
//! Transitions are driven by distance-to-target thresholds and per-species
//! timing constants. Pursuit is a straight line at tier-scaled speed; there
//! is no obstacle avoidance by design. Damage is applied exactly once per
//! windup, at the instant the impact delay elapses, regardless of how tick
//! sampling aligns with the timers.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::game::events::PresentationEvent;
use crate::game::mobs::{
    MobAbility, MobInstance, MobModifier, MobPhase, FROST_NOVA_COOLDOWN_MS,
    FROST_NOVA_FREEZE_MS, FROST_NOVA_RADIUS, FROST_NOVA_RANGE, FROST_NOVA_TELEGRAPH_MS,
};
use crate::game::state::{DelayedEffectKind, PlayerState};
use crate::core::rng::DeterministicRng;
use crate::game::stats::calculate_damage;
use crate::TICK_INTERVAL_MS;

/// Impact may land if the target drifted slightly past attack range
/// during the windup.
const IMPACT_RANGE_SLACK: f32 = 1.25;

/// Side effects of one mob step, applied by the tick after the step.
#[derive(Debug, Default)]
pub struct MobStepOutput {
    /// Effects to push onto the world scheduler
    pub scheduled: Vec<(u64, DelayedEffectKind)>,
    /// Presentation events
    pub events: Vec<PresentationEvent>,
}

/// Advance one mob by one tick.
pub fn step_mob(
    mob: &mut MobInstance,
    players: &mut BTreeMap<Uuid, PlayerState>,
    now_ms: u64,
    rng: &mut DeterministicRng,
    out: &mut MobStepOutput,
) {
    if !mob.is_alive() {
        return;
    }

    let def = *mob.species.def();

    match mob.phase {
        MobPhase::Seeking => {
            let Some((target_id, distance)) = nearest_living_player(mob, players) else {
                return;
            };
            if distance > def.aggro_radius {
                return;
            }

            try_cast_frost_nova(mob, players, &target_id, distance, now_ms, out);

            if distance <= def.attack_range {
                // Commit to the attack
                mob.phase = MobPhase::Windup {
                    started_ms: now_ms,
                    damage_applied: false,
                };
            } else {
                // Straight-line pursuit, no avoidance
                let target_pos = players[&target_id].position;
                let step = mob.move_speed() * (TICK_INTERVAL_MS as f32 / 1000.0);
                mob.position = mob.position.step_toward(target_pos, step);
            }
        }

        MobPhase::Windup {
            started_ms,
            damage_applied,
        } => {
            // IMPACT: the windup delay elapsed and damage has not fired yet.
            // Both conditions are checked on every sample so a long tick gap
            // cannot skip the impact or double-apply it.
            if !damage_applied && now_ms >= started_ms + def.windup_ms {
                apply_impact(mob, players, rng, out);
                mob.last_attack_ms = now_ms;
                mob.phase = MobPhase::Windup {
                    started_ms,
                    damage_applied: true,
                };
            }

            if now_ms >= started_ms + def.attack_duration_ms {
                mob.phase = MobPhase::Seeking;
            } else if matches!(mob.phase, MobPhase::Windup { damage_applied: true, .. }) {
                mob.phase = MobPhase::Recovery {
                    until_ms: started_ms + def.attack_duration_ms,
                };
            }
        }

        MobPhase::Recovery { until_ms } => {
            if now_ms >= until_ms {
                mob.phase = MobPhase::Seeking;
            }
        }
    }
}

/// Nearest living player and its distance, if any.
fn nearest_living_player(
    mob: &MobInstance,
    players: &BTreeMap<Uuid, PlayerState>,
) -> Option<(Uuid, f32)> {
    players
        .iter()
        .filter(|(_, p)| p.is_alive())
        .map(|(id, p)| (*id, mob.position.distance(p.position)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Resolve the impact instant: hit the nearest living player still within
/// (slackened) attack range. A target that escaped produces a whiff.
fn apply_impact(
    mob: &MobInstance,
    players: &mut BTreeMap<Uuid, PlayerState>,
    rng: &mut DeterministicRng,
    out: &mut MobStepOutput,
) {
    let reach = mob.species.def().attack_range * IMPACT_RANGE_SLACK;
    let Some((target_id, distance)) = nearest_living_player(mob, players) else {
        return;
    };
    if distance > reach {
        return;
    }

    let target = players.get_mut(&target_id).expect("target exists");
    let result = calculate_damage(&mob.stats, &target.stats, mob.level, 1.0, rng);
    let killed = target.take_damage(result.damage);

    out.events.push(PresentationEvent::DamageDealt {
        target_mob: None,
        target_player: Some(target_id),
        amount: result.damage,
        crit: result.crit,
    });
    if killed {
        out.events.push(PresentationEvent::PlayerDied {
            player: target_id,
            position: target.position,
        });
    }
}

/// Elite frost nova: an independent cooldown sub-timer that enqueues a
/// telegraphed hazard, decoupled from the attack state machine.
fn try_cast_frost_nova(
    mob: &mut MobInstance,
    players: &BTreeMap<Uuid, PlayerState>,
    target_id: &Uuid,
    distance: f32,
    now_ms: u64,
    out: &mut MobStepOutput,
) {
    if !mob.modifiers.contains(&MobModifier::Frostbound) {
        return;
    }
    if distance > FROST_NOVA_RANGE {
        return;
    }
    let ready_at = mob
        .ability_ready_ms
        .get(&MobAbility::FrostNova)
        .copied()
        .unwrap_or(0);
    if now_ms < ready_at {
        return;
    }

    let center = players[target_id].position;
    let resolves_at = now_ms + FROST_NOVA_TELEGRAPH_MS;

    mob.ability_ready_ms
        .insert(MobAbility::FrostNova, now_ms + FROST_NOVA_COOLDOWN_MS);
    out.scheduled.push((
        resolves_at,
        DelayedEffectKind::FrostNova {
            center,
            radius: FROST_NOVA_RADIUS,
            damage: mob.stats.damage,
            freeze_ms: FROST_NOVA_FREEZE_MS,
        },
    ));
    out.events.push(PresentationEvent::FrostNovaTelegraph {
        caster: mob.id,
        center,
        radius: FROST_NOVA_RADIUS,
        resolves_at_ms: resolves_at,
    });
}
