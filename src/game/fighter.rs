//! Fighter state and the per-fighter state machine
//!
//! Requests that are illegal in the current state (attacking while
//! `can_act` is false, blocking mid-air, ...) are ignored rather than
//! rejected; the fighter simply stays where it is.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::bot::protocol::{BotInput, Facing, Side};

use super::damage::DamageCalculator;
use super::frame_data::{self, AttackType};
use super::physics::GROUND_Y;

pub const MAX_HEALTH: i32 = 1000;
pub const MAX_MAGIC: i32 = 100;
pub const KNOCKDOWN_DURATION_FRAMES: u32 = 40;
pub const GETUP_DURATION_FRAMES: u32 = 20;
pub const GETUP_INVINCIBILITY_FRAMES: u32 = 10;
/// Consecutive frames holding a direction before walking becomes running
pub const RUN_THRESHOLD_FRAMES: u32 = 20;

pub const P1_SPAWN_X: f32 = 200.0;
pub const P2_SPAWN_X: f32 = 1720.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FighterStatus {
    Idle,
    Walking,
    Running,
    Jumping,
    Falling,
    Attacking,
    Blocking,
    Hitstun,
    Knockdown,
    GettingUp,
    Ko,
}

impl Default for FighterStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl FighterStatus {
    /// States in which movement input is honoured
    pub fn is_mobile(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Walking | Self::Running | Self::Jumping | Self::Falling
        )
    }
}

/// The attack a fighter is currently performing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentAttack {
    pub attack_type: AttackType,
    /// Local frame, 0 on the frame the attack started
    pub frame: u32,
    pub has_hit: bool,
}

/// Per-fighter mutable record. Owned by the match for the whole round.
#[derive(Debug, Clone, PartialEq)]
pub struct FighterState {
    pub id: Uuid,
    pub side: Side,
    pub health: i32,
    pub magic: i32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing: Facing,
    pub status: FighterStatus,
    pub grounded: bool,
    pub can_act: bool,
    pub combo_counter: u32,
    pub last_attack_frame: u64,

    pub attack: Option<CurrentAttack>,
    /// Frames left in hitstun / knockdown / getting up / blockstun
    pub status_frames: u32,
    pub invincible_frames: u32,
    held_direction: i8,
    move_hold_frames: u32,
}

impl FighterState {
    pub fn new(id: Uuid, side: Side) -> Self {
        let (x, facing) = match side {
            Side::P1 => (P1_SPAWN_X, Facing::Right),
            Side::P2 => (P2_SPAWN_X, Facing::Left),
        };
        Self {
            id,
            side,
            health: MAX_HEALTH,
            magic: 0,
            x,
            y: GROUND_Y,
            vx: 0.0,
            vy: 0.0,
            facing,
            status: FighterStatus::Idle,
            grounded: true,
            can_act: true,
            combo_counter: 0,
            last_attack_frame: 0,
            attack: None,
            status_frames: 0,
            invincible_frames: 0,
            held_direction: 0,
            move_hold_frames: 0,
        }
    }

    /// Back to spawn for a new round, keeping identity
    pub fn reset_for_round(&mut self) {
        *self = Self::new(self.id, self.side);
    }

    pub fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, MAX_HEALTH);
    }

    pub fn set_magic(&mut self, magic: i32) {
        self.magic = magic.clamp(0, MAX_MAGIC);
    }

    pub fn add_magic(&mut self, amount: i32) {
        self.set_magic(self.magic.saturating_add(amount));
    }

    pub fn is_ko(&self) -> bool {
        self.status == FighterStatus::Ko
    }

    pub fn is_attacking(&self) -> bool {
        self.status == FighterStatus::Attacking
    }

    pub fn is_blocking(&self) -> bool {
        self.status == FighterStatus::Blocking
    }

    /// In the windup of an attack (counter-hit window)
    pub fn is_in_attack_startup(&self) -> bool {
        self.attack
            .map(|a| frame_data::is_in_startup(a.attack_type, a.frame))
            .unwrap_or(false)
    }

    pub fn is_vulnerable(&self) -> bool {
        !matches!(self.status, FighterStatus::Knockdown | FighterStatus::Ko)
            && self.invincible_frames == 0
    }

    pub fn is_running(&self) -> bool {
        self.grounded && self.move_hold_frames >= RUN_THRESHOLD_FRAMES
    }

    /// Whether physics should honour this frame's movement input
    pub fn can_move(&self) -> bool {
        self.can_act && self.status.is_mobile()
    }

    pub fn health_percent(&self) -> f32 {
        self.health as f32 / MAX_HEALTH as f32 * 100.0
    }

    pub fn magic_percent(&self) -> f32 {
        self.magic as f32 / MAX_MAGIC as f32 * 100.0
    }

    /// Timer decay at the start of a frame
    pub fn begin_frame(&mut self) {
        match self.status {
            FighterStatus::Attacking => {
                if let Some(attack) = self.attack.as_mut() {
                    attack.frame += 1;
                    if attack.frame >= frame_data::total_duration(attack.attack_type) {
                        self.attack = None;
                        self.become_free();
                    }
                } else {
                    self.become_free();
                }
            }
            FighterStatus::Hitstun => {
                self.status_frames = self.status_frames.saturating_sub(1);
                if self.status_frames == 0 {
                    self.become_free();
                }
            }
            FighterStatus::Knockdown => {
                self.status_frames = self.status_frames.saturating_sub(1);
                if self.status_frames == 0 {
                    self.status = FighterStatus::GettingUp;
                    self.status_frames = GETUP_DURATION_FRAMES;
                    self.invincible_frames = GETUP_INVINCIBILITY_FRAMES;
                }
            }
            FighterStatus::GettingUp => {
                self.status_frames = self.status_frames.saturating_sub(1);
                self.invincible_frames = self.invincible_frames.saturating_sub(1);
                if self.status_frames == 0 {
                    self.invincible_frames = 0;
                    self.become_free();
                }
            }
            FighterStatus::Blocking => {
                self.status_frames = self.status_frames.saturating_sub(1);
                self.can_act = self.status_frames == 0;
            }
            FighterStatus::Ko => {
                self.can_act = false;
            }
            FighterStatus::Idle
            | FighterStatus::Walking
            | FighterStatus::Running
            | FighterStatus::Jumping
            | FighterStatus::Falling => {
                self.can_act = true;
            }
        }
    }

    fn become_free(&mut self) {
        self.status = if self.grounded {
            FighterStatus::Idle
        } else if self.vy < 0.0 {
            FighterStatus::Jumping
        } else {
            FighterStatus::Falling
        };
        self.status_frames = 0;
        self.can_act = true;
    }

    /// Apply this frame's input to the state machine (attacks and blocking).
    /// `chain_open` is the attacker's combo chain eligibility.
    /// Returns the attack started this frame, if any.
    pub fn apply_input(&mut self, input: &BotInput, chain_open: bool, frame: u64) -> Option<AttackType> {
        self.track_held_direction(input);

        if self.is_ko() {
            return None;
        }

        if let Some(started) = self.try_attack(input, chain_open, frame) {
            return Some(started);
        }

        if self.is_blocking() {
            if self.status_frames == 0 && !input.down {
                self.become_free();
            }
        } else if input.down && self.grounded && self.can_move() {
            self.status = FighterStatus::Blocking;
            self.vx = 0.0;
        }

        None
    }

    fn track_held_direction(&mut self, input: &BotInput) {
        let dir = input.horizontal();
        if dir != 0 && dir == self.held_direction {
            self.move_hold_frames = self.move_hold_frames.saturating_add(1);
        } else {
            self.move_hold_frames = if dir != 0 { 1 } else { 0 };
        }
        self.held_direction = dir;
    }

    /// Candidate attacks requested by the input, in priority order
    fn requested_attacks(&self, input: &BotInput) -> Vec<AttackType> {
        let chaining_from = self.attack.map(|a| a.attack_type);
        let mut requested = Vec::with_capacity(3);
        // special is ground-only
        if input.special && self.grounded {
            requested.push(AttackType::Special);
        }
        if input.attack2 {
            requested.push(if self.grounded {
                AttackType::Heavy
            } else {
                AttackType::AirHeavy
            });
        }
        if input.attack1 {
            requested.push(if self.grounded {
                frame_data::next_light_attack(chaining_from)
            } else {
                AttackType::AirLight
            });
        }
        requested
    }

    /// Start an attack if the input asks for one and the state allows it.
    /// A fighter with `can_act == false` only starts an attack by chaining
    /// out of one that has already connected.
    pub fn try_attack(&mut self, input: &BotInput, chain_open: bool, frame: u64) -> Option<AttackType> {
        if !input.any_attack() || self.is_ko() {
            return None;
        }

        let chaining = match self.attack {
            Some(current) if self.is_attacking() => {
                if !(current.has_hit && chain_open) {
                    return None;
                }
                Some(current.attack_type)
            }
            _ => {
                if !self.can_act || self.is_blocking() {
                    return None;
                }
                None
            }
        };

        let choice = self.requested_attacks(input).into_iter().find(|&t| {
            DamageCalculator::can_afford(t, self.magic)
                && chaining.map_or(true, |from| frame_data::can_chain_into(from, t))
        })?;

        if frame_data::get(choice).is_none() {
            warn!(attack_type = %choice, "No frame data for attack, ignoring input");
            return None;
        }

        self.set_magic(self.magic - DamageCalculator::magic_cost(choice));
        self.attack = Some(CurrentAttack {
            attack_type: choice,
            frame: 0,
            has_hit: false,
        });
        self.status = FighterStatus::Attacking;
        self.status_frames = 0;
        self.can_act = false;
        self.last_attack_frame = frame;
        if self.grounded {
            self.vx = 0.0;
        }
        Some(choice)
    }

    /// Refresh movement states from physics once the frame has moved
    pub fn refresh_movement_status(&mut self, input: &BotInput) {
        if !self.status.is_mobile() {
            return;
        }
        self.status = if !self.grounded {
            if self.vy < 0.0 {
                FighterStatus::Jumping
            } else {
                FighterStatus::Falling
            }
        } else if input.horizontal() != 0 {
            if self.is_running() {
                FighterStatus::Running
            } else {
                FighterStatus::Walking
            }
        } else {
            FighterStatus::Idle
        };
    }

    /// Apply damage, moving to KO when health runs out. Returns health after.
    pub fn take_damage(&mut self, damage: i32) -> i32 {
        self.set_health(self.health.saturating_sub(damage.max(0)));
        if self.health == 0 {
            self.knock_out();
        }
        self.health
    }

    pub fn knock_out(&mut self) {
        self.status = FighterStatus::Ko;
        self.attack = None;
        self.can_act = false;
        self.status_frames = 0;
        self.invincible_frames = 0;
    }

    /// Enter hitstun or knockdown after being hit. No-op once KO.
    pub fn receive_hit(&mut self, hitstun_frames: u32, knockdown: bool) {
        if self.is_ko() {
            return;
        }
        self.attack = None;
        self.can_act = false;
        self.move_hold_frames = 0;
        if knockdown {
            self.status = FighterStatus::Knockdown;
            self.status_frames = KNOCKDOWN_DURATION_FRAMES;
        } else {
            self.status = FighterStatus::Hitstun;
            self.status_frames = hitstun_frames.max(1);
        }
    }

    /// Hold the block for `blockstun_frames`. No-op once KO.
    pub fn receive_block(&mut self, blockstun_frames: u32) {
        if self.is_ko() {
            return;
        }
        self.status = FighterStatus::Blocking;
        self.status_frames = blockstun_frames;
        self.can_act = blockstun_frames == 0;
    }

    /// Mark the current attack as having connected
    pub fn mark_attack_hit(&mut self) {
        if let Some(attack) = self.attack.as_mut() {
            attack.has_hit = true;
        }
    }
}
