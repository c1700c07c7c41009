//! Combat tools exposed to the narrative model.
//!
//! Each tool call executes the engine and produces two things: a
//! structured JSON payload that is republished on the wire, and a
//! human-readable summary that goes back to the model as the tool
//! result.

use crate::statblock::{format_modifier, CombatantKind};
use crate::{attack, dice, statblock};
use claude::Tool;
use rand::Rng;
use serde_json::{json, Value};

/// Collection of tool definitions for the narrator.
pub struct NarratorTools;

impl NarratorTools {
    /// All tool definitions for the Claude API.
    pub fn all() -> Vec<Tool> {
        vec![
            Self::roll_dice(),
            Self::generate_stat_block(),
            Self::resolve_attack(),
        ]
    }

    fn roll_dice() -> Tool {
        Tool {
            name: "roll_dice".to_string(),
            description: "Roll dice using standard notation such as '2d6+3', '1d20', \
                          '2d20kh1+5' (advantage), '2d20kl1' (disadvantage), or '4d6dl1'. \
                          Use this for initiative and any other check the fight calls for."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "notation": {
                        "type": "string",
                        "description": "Dice notation, e.g. '1d20+2'"
                    },
                    "purpose": {
                        "type": "string",
                        "description": "What the roll is for, e.g. 'Initiative for Goblin'"
                    }
                },
                "required": ["notation"]
            }),
        }
    }

    fn generate_stat_block() -> Tool {
        Tool {
            name: "generate_stat_block".to_string(),
            description: "Generate a combatant stat block scaled by challenge rating. \
                          Call this once per combatant before the fight begins. The \
                          returned numbers (AC, HP, attacks) are binding."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Combatant name, e.g. 'Grishnak the Goblin'"
                    },
                    "kind": {
                        "type": "string",
                        "enum": ["player", "monster", "npc"],
                        "description": "What kind of combatant this is"
                    },
                    "challenge_rating": {
                        "type": "number",
                        "description": "Difficulty from 0 to 30 (default 1)"
                    }
                },
                "required": ["name", "kind"]
            }),
        }
    }

    fn resolve_attack() -> Tool {
        Tool {
            name: "resolve_attack".to_string(),
            description: "Resolve one attack: rolls to hit against the target's AC, \
                          handles criticals and fumbles, and rolls damage on a hit. \
                          Use the attacker's to-hit bonus and damage dice from its \
                          stat block."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "attacker_name": { "type": "string" },
                    "target_name": { "type": "string" },
                    "to_hit_bonus": {
                        "type": "integer",
                        "description": "The attacker's to-hit bonus"
                    },
                    "target_ac": {
                        "type": "integer",
                        "description": "The target's armor class"
                    },
                    "damage_dice": {
                        "type": "string",
                        "description": "Damage dice notation from the attack, e.g. '1d8+3'"
                    },
                    "damage_type": {
                        "type": "string",
                        "description": "Damage type, e.g. 'slashing'"
                    }
                },
                "required": [
                    "attacker_name", "target_name", "to_hit_bonus",
                    "target_ac", "damage_dice", "damage_type"
                ]
            }),
        }
    }
}

/// Outcome of a successful tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Structured result, re-emitted as a wire event.
    pub payload: Value,
    /// Narrative summary fed back to the model.
    pub summary: String,
}

fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, String> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required field '{field}'"))
}

fn required_int(input: &Value, field: &str) -> Result<i32, String> {
    input
        .get(field)
        .and_then(Value::as_i64)
        .map(|v| v as i32)
        .ok_or_else(|| format!("Missing required field '{field}'"))
}

/// Execute one tool call against the engine.
///
/// Errors are returned to the model as error tool results; they never
/// abort the encounter.
pub fn execute_tool<R: Rng>(name: &str, input: &Value, rng: &mut R) -> Result<ToolOutcome, String> {
    match name {
        "roll_dice" => {
            let notation = required_str(input, "notation")?;
            let purpose = input.get("purpose").and_then(Value::as_str);

            // Bad notation is a model mistake worth reporting, not
            // something to silently default.
            let spec = dice::DiceSpec::parse(notation).map_err(|e| e.to_string())?;
            let mut result = spec.evaluate_with_rng(rng);
            if let Some(p) = purpose {
                result = result.with_purpose(p);
            }

            let summary = match &result.purpose {
                Some(p) => format!("{p}: {result}"),
                None => format!("Rolled {}: {result}", result.spec),
            };
            Ok(ToolOutcome {
                payload: serde_json::to_value(&result).map_err(|e| e.to_string())?,
                summary,
            })
        }
        "generate_stat_block" => {
            let name = required_str(input, "name")?;
            let kind = CombatantKind::from_tool_input(required_str(input, "kind")?);
            let cr = input.get("challenge_rating").and_then(Value::as_f64);

            let combatant = statblock::generate_with_rng(name, kind, cr, rng);
            let attack = &combatant.attacks[0];
            let summary = format!(
                "{} ({}): AC {}, HP {}/{}, attacks with {} ({} to hit, {} {})",
                combatant.name,
                combatant.kind,
                combatant.armor_class,
                combatant.hit_points,
                combatant.max_hit_points,
                attack.name,
                format_modifier(attack.to_hit_bonus),
                attack.damage_dice,
                attack.damage_type,
            );
            Ok(ToolOutcome {
                payload: serde_json::to_value(&combatant).map_err(|e| e.to_string())?,
                summary,
            })
        }
        "resolve_attack" => {
            let attacker = required_str(input, "attacker_name")?;
            let target = required_str(input, "target_name")?;
            let to_hit_bonus = required_int(input, "to_hit_bonus")?;
            let target_ac = required_int(input, "target_ac")?;
            let damage_dice = required_str(input, "damage_dice")?;
            let damage_type = required_str(input, "damage_type")?;

            let outcome = attack::resolve_with_rng(
                attacker,
                target,
                to_hit_bonus,
                target_ac,
                damage_dice,
                damage_type,
                rng,
            );
            let summary = outcome.narrative.clone();
            Ok(ToolOutcome {
                payload: serde_json::to_value(&outcome).map_err(|e| e.to_string())?,
                summary,
            })
        }
        other => Err(format!("Unknown tool: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_tool_definitions() {
        let tools = NarratorTools::all();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["roll_dice", "generate_stat_block", "resolve_attack"]);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object");
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn test_execute_roll_dice() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = json!({ "notation": "2d6+3", "purpose": "Initiative for Goblin" });
        let outcome = execute_tool("roll_dice", &input, &mut rng).unwrap();

        assert!(outcome.summary.starts_with("Initiative for Goblin:"));
        let total = outcome.payload["total"].as_i64().unwrap();
        assert!((5..=15).contains(&total));
        assert_eq!(outcome.payload["rolls"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_execute_roll_dice_bad_notation_errors() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = json!({ "notation": "banana" });
        let err = execute_tool("roll_dice", &input, &mut rng).unwrap_err();
        assert!(err.contains("Invalid dice notation"));
    }

    #[test]
    fn test_execute_roll_dice_non_ascii_notation_errors() {
        // Must come back as an error tool result the model can correct,
        // not a panic that kills the narration task.
        let mut rng = StdRng::seed_from_u64(1);
        for notation in ["1d20é", "1d6−2"] {
            let input = json!({ "notation": notation });
            let err = execute_tool("roll_dice", &input, &mut rng).unwrap_err();
            assert!(err.contains("Invalid dice notation"), "{notation}");
        }
    }

    #[test]
    fn test_execute_generate_stat_block() {
        let mut rng = StdRng::seed_from_u64(2);
        let input = json!({ "name": "Grishnak", "kind": "monster", "challenge_rating": 3 });
        let outcome = execute_tool("generate_stat_block", &input, &mut rng).unwrap();

        assert_eq!(outcome.payload["name"], "Grishnak");
        assert_eq!(outcome.payload["kind"], "monster");
        assert!(outcome.payload["hitPoints"].as_i64().unwrap() >= 1);
        assert!(outcome.summary.contains("Grishnak"));
        assert!(outcome.summary.contains("AC"));
    }

    #[test]
    fn test_execute_resolve_attack() {
        let mut rng = StdRng::seed_from_u64(3);
        let input = json!({
            "attacker_name": "Grishnak",
            "target_name": "Aria",
            "to_hit_bonus": 4,
            "target_ac": 14,
            "damage_dice": "1d6+2",
            "damage_type": "slashing"
        });
        let outcome = execute_tool("resolve_attack", &input, &mut rng).unwrap();

        let natural = outcome.payload["naturalRoll"].as_u64().unwrap();
        assert!((1..=20).contains(&natural));
        assert_eq!(outcome.summary, outcome.payload["narrative"].as_str().unwrap());
    }

    #[test]
    fn test_execute_missing_field_errors() {
        let mut rng = StdRng::seed_from_u64(4);
        let err = execute_tool("resolve_attack", &json!({}), &mut rng).unwrap_err();
        assert!(err.contains("attacker_name"));
    }

    #[test]
    fn test_execute_unknown_tool_errors() {
        let mut rng = StdRng::seed_from_u64(5);
        let err = execute_tool("cast_fireball", &json!({}), &mut rng).unwrap_err();
        assert!(err.contains("Unknown tool"));
    }
}
