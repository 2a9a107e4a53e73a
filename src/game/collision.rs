//! Hitbox / hurtbox collision detection

use super::fighter::FighterState;
use super::frame_data::{self, AttackType};

pub const HURTBOX_WIDTH: f32 = 60.0;
pub const HURTBOX_HEIGHT: f32 = 120.0;
pub const HURTBOX_OFFSET_X: f32 = -30.0;
pub const HURTBOX_OFFSET_Y: f32 = -120.0;

/// Axis-aligned box: top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// Two boxes overlap iff their intervals intersect on both axes
pub fn boxes_overlap(a: &Aabb, b: &Aabb) -> bool {
    a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
}

/// The fighter's vulnerable region. Independent of attack state.
pub fn hurtbox(fighter: &FighterState) -> Aabb {
    Aabb::new(
        fighter.x + HURTBOX_OFFSET_X,
        fighter.y + HURTBOX_OFFSET_Y,
        HURTBOX_WIDTH,
        HURTBOX_HEIGHT,
    )
}

/// The attack's hitbox mirrored about the fighter's facing.
/// Computed regardless of timing; `None` only when the attack has no frame data.
pub fn hitbox(fighter: &FighterState, attack_type: AttackType) -> Option<Aabb> {
    let data = frame_data::get(attack_type)?;
    let hb = data.hitbox;
    let x = if fighter.facing.sign() > 0.0 {
        fighter.x + hb.offset_x
    } else {
        fighter.x - hb.offset_x - hb.width
    };
    Some(Aabb::new(x, fighter.y + hb.offset_y, hb.width, hb.height))
}

/// A hit is detected only when the attack is active, the defender is
/// vulnerable, the attack has frame data and the boxes overlap.
pub fn check_hit(
    attacker: &FighterState,
    defender: &FighterState,
    attack_type: AttackType,
    is_attack_active: bool,
    defender_vulnerable: bool,
) -> bool {
    if !is_attack_active || !defender_vulnerable {
        return false;
    }
    match hitbox(attacker, attack_type) {
        Some(hb) => boxes_overlap(&hb, &hurtbox(defender)),
        None => false,
    }
}

/// Whether the defender is in front of the attacker given its facing
pub fn is_in_front(attacker: &FighterState, defender: &FighterState) -> bool {
    (defender.x - attacker.x) * attacker.facing.sign() >= 0.0
}

/// Would `attack_type` reach the defender if it were active now
pub fn in_attack_range(attacker: &FighterState, defender: &FighterState, attack_type: AttackType) -> bool {
    if !is_in_front(attacker, defender) {
        return false;
    }
    match hitbox(attacker, attack_type) {
        Some(hb) => boxes_overlap(&hb, &hurtbox(defender)),
        None => false,
    }
}
