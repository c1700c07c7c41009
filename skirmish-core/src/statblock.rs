//! Combatant stat blocks scaled by challenge rating.
//!
//! Generation is a deterministic formula plus bounded randomness, not
//! something the narrative model invents: the model asks for a stat
//! block and gets back numbers it has to live with.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// What side of the table a combatant sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatantKind {
    Player,
    Monster,
    Npc,
}

impl CombatantKind {
    /// Loose parse for tool input; anything unrecognized is treated as
    /// a monster so generation never fails.
    pub fn from_tool_input(s: &str) -> CombatantKind {
        match s.to_ascii_lowercase().as_str() {
            "player" => CombatantKind::Player,
            "npc" => CombatantKind::Npc,
            _ => CombatantKind::Monster,
        }
    }
}

impl fmt::Display for CombatantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombatantKind::Player => write!(f, "player"),
            CombatantKind::Monster => write!(f, "monster"),
            CombatantKind::Npc => write!(f, "npc"),
        }
    }
}

/// The six ability scores, each in [1, 30].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

/// Ability modifier: floor((score - 10) / 2).
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Signed rendering of a modifier, with an explicit `+` when
/// non-negative: `+2`, `+0`, `-1`.
pub fn format_modifier(modifier: i32) -> String {
    format!("{modifier:+}")
}

/// One attack a combatant can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackProfile {
    pub name: String,
    pub to_hit_bonus: i32,
    /// Damage dice in notation form, e.g. `1d8+3`.
    pub damage_dice: String,
    pub damage_type: String,
}

/// A combatant stat block.
///
/// Created once by [`generate`]; from then on only `hit_points`,
/// `conditions`, and `is_alive` are expected to change, and that
/// mutation is narrative state driven by the agent rather than
/// something this engine enforces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub kind: CombatantKind,
    pub armor_class: i32,
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub ability_scores: AbilityScores,
    pub attacks: Vec<AttackProfile>,
    pub conditions: BTreeSet<String>,
    pub is_alive: bool,
}

/// Primary attack damage dice by CR tier.
fn damage_dice_for_cr(cr: f64) -> &'static str {
    if cr <= 1.0 {
        "1d6"
    } else if cr <= 4.0 {
        "1d8"
    } else if cr <= 10.0 {
        "2d6"
    } else if cr <= 16.0 {
        "2d8"
    } else {
        "3d6"
    }
}

fn attack_flavor(kind: CombatantKind) -> (&'static str, &'static str) {
    match kind {
        CombatantKind::Player => ("Longsword", "slashing"),
        CombatantKind::Monster => ("Claw", "slashing"),
        CombatantKind::Npc => ("Shortsword", "piercing"),
    }
}

/// Generate a stat block scaled by challenge rating (default 1).
///
/// Never fails: an out-of-range CR is silently clamped to [0, 30]
/// rather than rejected. That clamping is intentional behavior, not a
/// validation gap.
pub fn generate(name: impl Into<String>, kind: CombatantKind, challenge_rating: Option<f64>) -> Combatant {
    generate_with_rng(name, kind, challenge_rating, &mut rand::thread_rng())
}

/// Generate with an injected RNG for replayable tests.
pub fn generate_with_rng<R: Rng>(
    name: impl Into<String>,
    kind: CombatantKind,
    challenge_rating: Option<f64>,
    rng: &mut R,
) -> Combatant {
    let cr = challenge_rating.unwrap_or(1.0).clamp(0.0, 30.0);

    let base_score = (10.0 + cr).min(30.0).floor() as i32;
    let hit_points = ((10.0 + cr * 15.0 + rng.gen_range(0.0..10.0)).floor() as i32).max(1);
    let armor_class = (10 + (cr * 0.8).floor() as i32 + rng.gen_range(0..=3)).min(25);
    let proficiency_bonus = ((cr - 1.0) / 4.0).floor() as i32 + 2;

    let mut physical = || (base_score + rng.gen_range(-2..=2)).clamp(1, 30);
    let strength = physical();
    let dexterity = physical();
    let constitution = physical();

    let mut mental = || (8 + rng.gen_range(0..=6)).min(30);
    let intelligence = mental();
    let wisdom = mental();
    let charisma = mental();

    let str_mod = ability_modifier(strength);
    let (attack_name, damage_type) = attack_flavor(kind);
    let attack = AttackProfile {
        name: attack_name.to_string(),
        to_hit_bonus: str_mod + proficiency_bonus,
        damage_dice: format!("{}{}", damage_dice_for_cr(cr), format_modifier(str_mod)),
        damage_type: damage_type.to_string(),
    };

    Combatant {
        id: Uuid::new_v4().to_string(),
        name: name.into(),
        kind,
        armor_class,
        hit_points,
        max_hit_points: hit_points,
        ability_scores: AbilityScores {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        },
        attacks: vec![attack],
        conditions: BTreeSet::new(),
        is_alive: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ability_modifier_table() {
        for (score, expected) in [(1, -5), (10, 0), (11, 0), (14, 2), (20, 5), (30, 10)] {
            assert_eq!(ability_modifier(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_format_modifier_signs() {
        assert_eq!(format_modifier(2), "+2");
        assert_eq!(format_modifier(0), "+0");
        assert_eq!(format_modifier(-1), "-1");
    }

    #[test]
    fn test_generate_bounds_across_crs() {
        let mut rng = StdRng::seed_from_u64(3);
        for cr in [None, Some(0.0), Some(0.5), Some(1.0), Some(5.0), Some(17.0), Some(30.0)] {
            let c = generate_with_rng("Test", CombatantKind::Monster, cr, &mut rng);
            assert!(c.hit_points >= 1, "cr {cr:?}");
            assert_eq!(c.max_hit_points, c.hit_points);
            assert!(c.armor_class <= 25);
            assert!(c.is_alive);
            assert!(c.conditions.is_empty());

            let scores = [
                c.ability_scores.strength,
                c.ability_scores.dexterity,
                c.ability_scores.constitution,
                c.ability_scores.intelligence,
                c.ability_scores.wisdom,
                c.ability_scores.charisma,
            ];
            assert!(scores.iter().all(|s| (1..=30).contains(s)), "cr {cr:?}: {scores:?}");
        }
    }

    #[test]
    fn test_generate_clamps_out_of_range_cr() {
        let mut rng = StdRng::seed_from_u64(4);
        // These must not fail; they behave as CR 30 and CR 0.
        let high = generate_with_rng("Overtuned", CombatantKind::Monster, Some(999.0), &mut rng);
        assert!(high.hit_points >= 1);
        assert!(high.armor_class <= 25);
        assert_eq!(high.attacks[0].damage_dice.split(|c: char| c == '+' || c == '-').next(), Some("3d6"));

        let low = generate_with_rng("Harmless", CombatantKind::Npc, Some(-5.0), &mut rng);
        assert!(low.hit_points >= 1);
        assert!(low.attacks[0].damage_dice.starts_with("1d6"));
    }

    #[test]
    fn test_damage_dice_tiers() {
        assert_eq!(damage_dice_for_cr(0.0), "1d6");
        assert_eq!(damage_dice_for_cr(1.0), "1d6");
        assert_eq!(damage_dice_for_cr(2.0), "1d8");
        assert_eq!(damage_dice_for_cr(4.0), "1d8");
        assert_eq!(damage_dice_for_cr(7.0), "2d6");
        assert_eq!(damage_dice_for_cr(12.0), "2d8");
        assert_eq!(damage_dice_for_cr(17.0), "3d6");
    }

    #[test]
    fn test_attack_dice_parse_back() {
        let mut rng = StdRng::seed_from_u64(5);
        for cr in [0.0, 3.0, 8.0, 14.0, 25.0] {
            let c = generate_with_rng("Any", CombatantKind::Monster, Some(cr), &mut rng);
            crate::dice::DiceSpec::parse(&c.attacks[0].damage_dice)
                .expect("generated damage dice must be valid notation");
        }
    }

    #[test]
    fn test_ids_unique_across_calls() {
        let mut rng = StdRng::seed_from_u64(6);
        let a = generate_with_rng("Twin", CombatantKind::Monster, Some(1.0), &mut rng);
        let b = generate_with_rng("Twin", CombatantKind::Monster, Some(1.0), &mut rng);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_kind_from_tool_input() {
        assert_eq!(CombatantKind::from_tool_input("Player"), CombatantKind::Player);
        assert_eq!(CombatantKind::from_tool_input("NPC"), CombatantKind::Npc);
        assert_eq!(CombatantKind::from_tool_input("dragon"), CombatantKind::Monster);
    }
}
