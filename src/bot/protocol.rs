//! Bot protocol definitions
//! These are the wire types exchanged with bot-decision clients each tick

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::fighter::FighterStatus;
use crate::game::frame_data::AttackType;
use crate::game::r#match::MatchPhase;

/// Which fighter slot a bot controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    P1,
    P2,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::P1, Side::P2];

    pub fn index(&self) -> usize {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
        }
    }

    pub fn opponent(&self) -> Side {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
        }
    }
}

/// Horizontal facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// +1.0 for right, -1.0 for left
    pub fn sign(&self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// One tick of bot input. Missing fields default to false.
///
/// Facing only changes when a horizontal direction is applied by physics,
/// and never while blocking. A block only counts against an attacker the
/// fighter faces, so after stepping away a bot has to step toward the
/// opponent (with `down` released) before blocking again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Light attack
    pub attack1: bool,
    /// Heavy attack
    pub attack2: bool,
    pub jump: bool,
    pub special: bool,
}

impl BotInput {
    /// The no-op input used when a bot sends nothing for a tick
    pub const IDLE: BotInput = BotInput {
        left: false,
        right: false,
        up: false,
        down: false,
        attack1: false,
        attack2: false,
        jump: false,
        special: false,
    };

    /// Horizontal direction pressed: -1, 0 or 1. Both pressed cancel out.
    pub fn horizontal(&self) -> i8 {
        match (self.left, self.right) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }

    pub fn any_attack(&self) -> bool {
        self.attack1 || self.attack2 || self.special
    }
}

/// Actions a bot may meaningfully take this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidAction {
    MoveLeft,
    MoveRight,
    Jump,
    AttackLight,
    AttackHeavy,
    Block,
    Special,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// The observing bot's own fighter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfView {
    pub health: i32,
    pub health_percent: f32,
    pub magic: i32,
    pub magic_percent: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub state: FighterStatus,
    pub facing: Facing,
    pub grounded: bool,
    pub can_act: bool,
    pub combo_counter: u32,
}

/// What a bot may see of its opponent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpponentView {
    pub health: i32,
    pub health_percent: f32,
    pub position: Vec2,
    pub state: FighterStatus,
    pub facing: Facing,
    pub is_attacking: bool,
    pub is_blocking: bool,
    pub is_vulnerable: bool,
    pub grounded: bool,
}

/// Per-tick observation sent to a bot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub match_id: Uuid,
    pub side: Side,
    #[serde(rename = "self")]
    pub me: SelfView,
    pub opponent: OpponentView,
    pub distance: f32,
    pub horizontal_distance: f32,
    pub vertical_distance: f32,
    pub in_attack_range: bool,
    pub in_special_range: bool,
    pub distance_to_left_wall: f32,
    pub distance_to_right_wall: f32,
    /// Own health minus opponent health
    pub health_advantage: i32,
    pub round_number: u32,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    pub time_remaining: u32,
    pub phase: MatchPhase,
    pub frame_number: u64,
    pub decision_deadline_ms: u64,
    pub valid_actions: Vec<ValidAction>,
}

/// Rating deltas supplied by the external rating collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChanges {
    pub winner_delta: i32,
    pub loser_delta: i32,
}

/// Simulation events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    RoundStart {
        round_number: u32,
        frame_number: u64,
    },

    Damage {
        attacker_id: Uuid,
        defender_id: Uuid,
        attack_type: AttackType,
        damage: i32,
        is_combo: bool,
        combo_hit_number: u32,
        is_counter_hit: bool,
        defender_health_after: i32,
        frame_number: u64,
    },

    Blocked {
        attacker_id: Uuid,
        defender_id: Uuid,
        attack_type: AttackType,
        chip_damage: i32,
        defender_health_after: i32,
        frame_number: u64,
    },

    Ko {
        winner_id: Uuid,
        loser_id: Uuid,
        round_number: u32,
        winner_health_remaining: i32,
        total_damage_dealt: i32,
        longest_combo: u32,
        frame_number: u64,
    },

    RoundEnd {
        round_number: u32,
        /// None on a drawn round
        winner_id: Option<Uuid>,
        rounds_p1: u32,
        rounds_p2: u32,
    },

    MatchEnd {
        match_id: Uuid,
        winner_id: Option<Uuid>,
        /// Round wins as [p1, p2]
        final_score: [u32; 2],
        rating_changes: Option<RatingChanges>,
    },
}

/// Messages broadcast by a running match
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Per-tick decision request for one bot
    Observation(Box<Observation>),

    /// Events produced by a tick
    Events {
        frame_number: u64,
        events: Vec<GameEvent>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_fields_default_to_false() {
        let input: BotInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input, BotInput::IDLE);

        let input: BotInput = serde_json::from_str(r#"{"right":true,"attack1":true}"#).unwrap();
        assert!(input.right && input.attack1);
        assert!(!input.left && !input.jump);
    }

    #[test]
    fn test_horizontal_cancels_when_both_pressed() {
        let both = BotInput {
            left: true,
            right: true,
            ..BotInput::IDLE
        };
        assert_eq!(both.horizontal(), 0);
        assert_eq!(BotInput { left: true, ..BotInput::IDLE }.horizontal(), -1);
    }

    #[test]
    fn test_valid_action_wire_names() {
        let json = serde_json::to_string(&ValidAction::AttackLight).unwrap();
        assert_eq!(json, "\"ATTACK_LIGHT\"");
        let json = serde_json::to_string(&ValidAction::MoveLeft).unwrap();
        assert_eq!(json, "\"MOVE_LEFT\"");
    }

    #[test]
    fn test_event_tagging() {
        let event = GameEvent::RoundEnd {
            round_number: 2,
            winner_id: None,
            rounds_p1: 1,
            rounds_p2: 1,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "round_end");
        assert!(value["winner_id"].is_null());
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::P1.opponent(), Side::P2);
        assert_eq!(Side::P2.index(), 1);
        assert_eq!(Side::P1.as_str(), "p1");
        assert_eq!(serde_json::to_string(&Side::P2).unwrap(), "\"p2\"");
    }
}
