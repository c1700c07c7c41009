//! To-hit resolution with critical and fumble handling.

use crate::dice::DiceSpec;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A fully resolved attack.
///
/// Ephemeral: produced per attack and surfaced through the narrative,
/// never stored beyond the transcript text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackOutcome {
    pub attacker_name: String,
    pub target_name: String,
    /// The raw d20, in [1, 20].
    pub natural_roll: u32,
    pub attack_roll: i32,
    pub is_critical: bool,
    pub is_fumble: bool,
    pub hit: bool,
    pub damage_rolls: Vec<u32>,
    pub total_damage: i32,
    pub narrative: String,
}

/// Resolve one attack with the thread-local RNG.
#[allow(clippy::too_many_arguments)]
pub fn resolve(
    attacker_name: &str,
    target_name: &str,
    to_hit_bonus: i32,
    target_ac: i32,
    damage_dice: &str,
    damage_type: &str,
) -> AttackOutcome {
    resolve_with_rng(
        attacker_name,
        target_name,
        to_hit_bonus,
        target_ac,
        damage_dice,
        damage_type,
        &mut rand::thread_rng(),
    )
}

/// Resolve one attack with an injected RNG.
///
/// A natural 20 always hits and doubles the damage dice count (not the
/// modifier); a natural 1 always misses regardless of bonus. Malformed
/// damage dice on a hit degrade to zero damage instead of failing:
/// once combat is underway, an aborted encounter has no good narrative
/// recovery.
#[allow(clippy::too_many_arguments)]
pub fn resolve_with_rng<R: Rng>(
    attacker_name: &str,
    target_name: &str,
    to_hit_bonus: i32,
    target_ac: i32,
    damage_dice: &str,
    damage_type: &str,
    rng: &mut R,
) -> AttackOutcome {
    let natural_roll = rng.gen_range(1..=20u32);
    let attack_roll = natural_roll as i32 + to_hit_bonus;
    let is_critical = natural_roll == 20;
    let is_fumble = natural_roll == 1;
    let hit = is_critical || (!is_fumble && attack_roll >= target_ac);

    let (damage_rolls, total_damage) = if hit {
        match DiceSpec::parse(damage_dice) {
            Ok(mut spec) => {
                if is_critical {
                    spec.count = spec.count.saturating_mul(2);
                }
                let roll = spec.evaluate_with_rng(rng);
                (roll.rolls, roll.total.max(0))
            }
            // Tolerated: a bad damage expression must not fail the encounter.
            Err(_) => (Vec::new(), 0),
        }
    } else {
        (Vec::new(), 0)
    };

    let narrative = narrate(
        attacker_name,
        target_name,
        natural_roll,
        to_hit_bonus,
        attack_roll,
        target_ac,
        total_damage,
        damage_type,
        is_critical,
        is_fumble,
        hit,
    );

    AttackOutcome {
        attacker_name: attacker_name.to_string(),
        target_name: target_name.to_string(),
        natural_roll,
        attack_roll,
        is_critical,
        is_fumble,
        hit,
        damage_rolls,
        total_damage,
        narrative,
    }
}

/// Narrative line for the outcome category. Deterministic given the
/// rolls already drawn; no extra randomness.
#[allow(clippy::too_many_arguments)]
fn narrate(
    attacker: &str,
    target: &str,
    natural: u32,
    bonus: i32,
    attack_roll: i32,
    target_ac: i32,
    damage: i32,
    damage_type: &str,
    is_critical: bool,
    is_fumble: bool,
    hit: bool,
) -> String {
    if is_critical {
        format!(
            "{attacker} rolls a natural 20 against {target}: a critical hit! \
             The blow lands for {damage} {damage_type} damage."
        )
    } else if is_fumble {
        format!(
            "{attacker} rolls a natural 1 and fumbles the attack on {target}, \
             missing completely."
        )
    } else if hit {
        format!(
            "{attacker} hits {target} ({natural} {} = {attack_roll} vs AC {target_ac}) \
             for {damage} {damage_type} damage.",
            crate::statblock::format_modifier(bonus)
        )
    } else {
        format!(
            "{attacker} misses {target} ({natural} {} = {attack_roll} vs AC {target_ac}).",
            crate::statblock::format_modifier(bonus)
        )
    }
}
