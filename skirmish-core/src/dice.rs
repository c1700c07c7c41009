//! Dice notation parsing and rolling.
//!
//! Supports the compact notation `<count>d<sides>[<sel><n>][<sign><mod>]`
//! where `<sel>` is one of `kh`, `kl`, `dh`, `dl` (keep/drop
//! highest/lowest). Examples: `2d6+3`, `2d20kh1+5` (advantage),
//! `2d20kl1` (disadvantage), `4d6dl1` (ability scores).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
}

/// Sanity bounds on a single expression. No real table rolls anywhere
/// near this many dice; counts beyond the cap are treated as invalid
/// notation rather than evaluated.
pub const MAX_DICE_COUNT: u32 = 1000;
pub const MAX_DICE_SIDES: u32 = 10_000;

/// Which subset of rolled dice counts toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    KeepHighest(u32),
    KeepLowest(u32),
    DropHighest(u32),
    DropLowest(u32),
}

/// A parsed dice expression.
///
/// Immutable once parsed. The parser guarantees `1 <= count <=
/// MAX_DICE_COUNT` and `1 <= sides <= MAX_DICE_SIDES` but deliberately
/// does not check the selection count against `count`; [`select`]
/// degrades gracefully instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
    pub selection: Option<Selection>,
    pub modifier: i32,
}

fn take_digits(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s.split_at(end)
}

impl DiceSpec {
    /// Parse a dice notation string. No whitespace is tolerated; only
    /// the selector token is case-insensitive.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let invalid = || DiceError::InvalidNotation(notation.to_string());

        let (count_str, rest) = take_digits(notation);
        let rest = rest.strip_prefix('d').ok_or_else(invalid)?;
        let (sides_str, rest) = take_digits(rest);

        let count: u32 = count_str.parse().map_err(|_| invalid())?;
        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
        if count == 0 || sides == 0 || count > MAX_DICE_COUNT || sides > MAX_DICE_SIDES {
            return Err(invalid());
        }

        let (selection, rest) = match rest.get(..2).map(str::to_ascii_lowercase) {
            Some(tok) if matches!(tok.as_str(), "kh" | "kl" | "dh" | "dl") => {
                let (n_str, after) = take_digits(&rest[2..]);
                let n: u32 = n_str.parse().map_err(|_| invalid())?;
                let sel = match tok.as_str() {
                    "kh" => Selection::KeepHighest(n),
                    "kl" => Selection::KeepLowest(n),
                    "dh" => Selection::DropHighest(n),
                    _ => Selection::DropLowest(n),
                };
                (Some(sel), after)
            }
            _ => (None, rest),
        };

        let modifier = if rest.is_empty() {
            0
        } else {
            // strip_prefix, not byte slicing: the tail may start with a
            // multi-byte character (a Unicode minus is a common typo)
            // and must fail as invalid notation, not panic.
            let (sign, after_sign) = if let Some(after) = rest.strip_prefix('+') {
                (1, after)
            } else if let Some(after) = rest.strip_prefix('-') {
                (-1, after)
            } else {
                return Err(invalid());
            };
            let (mod_str, tail) = take_digits(after_sign);
            if !tail.is_empty() {
                return Err(invalid());
            }
            let value: i32 = mod_str.parse().map_err(|_| invalid())?;
            sign * value
        };

        Ok(DiceSpec {
            count,
            sides,
            selection,
            modifier,
        })
    }

    /// Roll this expression with the thread-local RNG.
    pub fn evaluate(&self) -> RollResult {
        self.evaluate_with_rng(&mut rand::thread_rng())
    }

    /// Roll with an injected RNG so results are replayable under a
    /// fixed seed.
    pub fn evaluate_with_rng<R: Rng>(&self, rng: &mut R) -> RollResult {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();
        let kept = select(&rolls, self.selection);
        let total = kept.iter().map(|&v| v as i32).sum::<i32>() + self.modifier;

        RollResult {
            spec: self.clone(),
            rolls,
            kept,
            total,
            purpose: None,
        }
    }
}

impl FromStr for DiceSpec {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceSpec::parse(s)
    }
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.selection {
            Some(Selection::KeepHighest(n)) => write!(f, "kh{n}")?,
            Some(Selection::KeepLowest(n)) => write!(f, "kl{n}")?,
            Some(Selection::DropHighest(n)) => write!(f, "dh{n}")?,
            Some(Selection::DropLowest(n)) => write!(f, "dl{n}")?,
            None => {}
        }
        if self.modifier != 0 {
            write!(f, "{:+}", self.modifier)?;
        }
        Ok(())
    }
}

/// Apply a keep/drop selection to a set of rolls.
///
/// Pure and total: a selection count larger than the roll set returns
/// a shorter or empty result rather than an error, since a sum over
/// zero dice is still a valid roll.
pub fn select(rolls: &[u32], selection: Option<Selection>) -> Vec<u32> {
    let Some(sel) = selection else {
        return rolls.to_vec();
    };

    let mut sorted = rolls.to_vec();
    sorted.sort_unstable();
    let len = sorted.len();

    match sel {
        Selection::KeepHighest(n) => sorted.split_off(len.saturating_sub(n as usize)),
        Selection::KeepLowest(n) => {
            sorted.truncate(n as usize);
            sorted
        }
        Selection::DropHighest(n) => {
            sorted.truncate(len.saturating_sub(n as usize));
            sorted
        }
        Selection::DropLowest(n) => {
            if n as usize >= len {
                Vec::new()
            } else {
                sorted.split_off(n as usize)
            }
        }
    }
}

/// Complete result of rolling one dice expression.
///
/// `rolls` preserves generation order for audit; `kept` is the
/// post-selection subset (tie order is not significant).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub spec: DiceSpec,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub total: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl RollResult {
    /// Tag this roll with what it was for.
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Format the individual dice for display, parenthesizing dropped
    /// dice: `[6, (2), 4] + 3`.
    pub fn dice_display(&self) -> String {
        let mut kept_used = vec![false; self.kept.len()];
        let shown: Vec<String> = self
            .rolls
            .iter()
            .map(|&roll| {
                let is_kept = self.kept.iter().enumerate().any(|(i, &k)| {
                    if k == roll && !kept_used[i] {
                        kept_used[i] = true;
                        true
                    } else {
                        false
                    }
                });
                if is_kept {
                    format!("{roll}")
                } else {
                    format!("({roll})")
                }
            })
            .collect();

        let dice_str = format!("[{}]", shown.join(", "));
        match self.spec.modifier {
            0 => dice_str,
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.abs()),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Parse and roll in one step.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    Ok(DiceSpec::parse(notation)?.evaluate())
}
