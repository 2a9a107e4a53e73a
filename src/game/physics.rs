//! Fighter physics - gravity, movement, friction and stage bounds
//!
//! Screen-space coordinates: +x to the right, +y downward. A fighter's
//! position is the centre of its feet.

use crate::bot::protocol::{BotInput, Facing};

use super::fighter::FighterState;

pub const GRAVITY: f32 = 0.8;
pub const MAX_FALL_SPEED: f32 = 15.0;
pub const WALK_SPEED: f32 = 4.0;
pub const RUN_SPEED: f32 = 7.0;
/// Horizontal control multiplier while airborne
pub const AIR_CONTROL: f32 = 0.6;
pub const JUMP_FORCE: f32 = -15.0;
pub const GROUND_FRICTION: f32 = 0.8;
pub const AIR_FRICTION: f32 = 0.95;
/// |vx| below this snaps to zero
pub const VELOCITY_EPSILON: f32 = 0.1;
/// Knockback with vy below this launches the defender
pub const LAUNCH_THRESHOLD: f32 = -5.0;

pub const GROUND_Y: f32 = 400.0;
pub const STAGE_MIN_X: f32 = 50.0;
pub const STAGE_MAX_X: f32 = 1870.0;

/// Result of one physics step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsResult {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub grounded: bool,
    pub facing: Facing,
}

impl PhysicsResult {
    pub fn apply_to(&self, fighter: &mut FighterState) {
        fighter.x = self.x;
        fighter.y = self.y;
        fighter.vx = self.vx;
        fighter.vy = self.vy;
        fighter.grounded = self.grounded;
        fighter.facing = self.facing;
    }
}

/// Physics system for updating fighter positions and velocities
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one frame. Pure function of the fighter and its input.
    pub fn step(fighter: &FighterState, input: &BotInput, can_move: bool) -> PhysicsResult {
        let mut x = fighter.x;
        let mut y = fighter.y;
        let mut vx = fighter.vx;
        let mut vy = fighter.vy;
        let mut grounded = fighter.grounded;
        let mut facing = fighter.facing;

        // Gravity
        if !grounded {
            vy = (vy + GRAVITY).min(MAX_FALL_SPEED);
        }

        // Player-driven movement
        if can_move {
            let dir = input.horizontal();
            if dir != 0 {
                let speed = if fighter.is_running() { RUN_SPEED } else { WALK_SPEED };
                let control = if grounded { 1.0 } else { AIR_CONTROL };
                vx = dir as f32 * speed * control;
                // facing follows the last applied direction, not the opponent
                facing = if dir < 0 { Facing::Left } else { Facing::Right };
            }

            if input.jump && grounded {
                vy = JUMP_FORCE;
                grounded = false;
            }
        }

        // Friction
        vx *= if grounded { GROUND_FRICTION } else { AIR_FRICTION };
        if vx.abs() < VELOCITY_EPSILON {
            vx = 0.0;
        }

        // Integrate
        x += vx;
        y += vy;

        // Ground plane
        if y >= GROUND_Y {
            y = GROUND_Y;
            vy = 0.0;
            grounded = true;
        } else {
            grounded = false;
        }

        // Stage walls
        if x <= STAGE_MIN_X {
            x = STAGE_MIN_X;
            vx = 0.0;
        } else if x >= STAGE_MAX_X {
            x = STAGE_MAX_X;
            vx = 0.0;
        }

        PhysicsResult {
            x,
            y,
            vx,
            vy,
            grounded,
            facing,
        }
    }

    /// Set the defender's velocity from a hit, pushing away from the attacker
    pub fn apply_knockback(fighter: &mut FighterState, kb_x: f32, kb_y: f32, attacker_x: f32) {
        let direction = if fighter.x >= attacker_x { 1.0 } else { -1.0 };
        fighter.vx = kb_x * direction;
        fighter.vy = kb_y;
        if fighter.vy < LAUNCH_THRESHOLD {
            fighter.grounded = false;
        }
    }

    /// Horizontal distance to each wall as (left, right)
    pub fn wall_distances(x: f32) -> (f32, f32) {
        ((x - STAGE_MIN_X).max(0.0), (STAGE_MAX_X - x).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::protocol::Side;
    use uuid::Uuid;

    fn grounded_fighter(x: f32) -> FighterState {
        let mut fighter = FighterState::new(Uuid::nil(), Side::P1);
        fighter.x = x;
        fighter
    }

    #[test]
    fn test_idle_fighter_stays_put() {
        let fighter = grounded_fighter(500.0);
        let result = PhysicsSystem::step(&fighter, &BotInput::IDLE, true);
        assert_eq!(result.x, 500.0);
        assert_eq!(result.y, GROUND_Y);
        assert!(result.grounded);
        assert_eq!(result.vx, 0.0);
    }

    #[test]
    fn test_walk_left_turns_and_moves() {
        let fighter = grounded_fighter(500.0);
        let input = BotInput {
            left: true,
            ..BotInput::IDLE
        };
        let result = PhysicsSystem::step(&fighter, &input, true);
        assert_eq!(result.facing, Facing::Left);
        assert!(result.x < 500.0);
        assert_eq!(result.vx, -WALK_SPEED * GROUND_FRICTION);
    }

    #[test]
    fn test_cannot_move_ignores_input() {
        let fighter = grounded_fighter(500.0);
        let input = BotInput {
            right: true,
            jump: true,
            ..BotInput::IDLE
        };
        let result = PhysicsSystem::step(&fighter, &input, false);
        assert_eq!(result.x, 500.0);
        assert!(result.grounded);
    }

    #[test]
    fn test_jump_arc_lands() {
        let mut fighter = grounded_fighter(500.0);
        let jump = BotInput {
            jump: true,
            ..BotInput::IDLE
        };
        let result = PhysicsSystem::step(&fighter, &jump, true);
        assert!(!result.grounded);
        assert!(result.y < GROUND_Y);
        result.apply_to(&mut fighter);

        let mut frames = 0;
        while !fighter.grounded {
            PhysicsSystem::step(&fighter, &BotInput::IDLE, true).apply_to(&mut fighter);
            frames += 1;
            assert!(frames < 120, "fighter never landed");
        }
        assert_eq!(fighter.y, GROUND_Y);
        assert_eq!(fighter.vy, 0.0);
    }

    #[test]
    fn test_fall_speed_is_capped() {
        let mut fighter = grounded_fighter(500.0);
        fighter.grounded = false;
        fighter.y = -5000.0;
        fighter.vy = MAX_FALL_SPEED;
        let result = PhysicsSystem::step(&fighter, &BotInput::IDLE, true);
        assert_eq!(result.vy, MAX_FALL_SPEED);
    }

    #[test]
    fn test_walls_clamp_and_stop() {
        let mut fighter = grounded_fighter(STAGE_MIN_X + 1.0);
        fighter.vx = -20.0;
        let result = PhysicsSystem::step(&fighter, &BotInput::IDLE, false);
        assert_eq!(result.x, STAGE_MIN_X);
        assert_eq!(result.vx, 0.0);
    }

    #[test]
    fn test_small_velocity_snaps_to_zero() {
        let mut fighter = grounded_fighter(500.0);
        fighter.vx = 0.1;
        let result = PhysicsSystem::step(&fighter, &BotInput::IDLE, false);
        assert_eq!(result.vx, 0.0);
        assert_eq!(result.x, 500.0);
    }

    #[test]
    fn test_knockback_direction_and_launch() {
        let mut defender = grounded_fighter(600.0);
        PhysicsSystem::apply_knockback(&mut defender, 14.0, -6.0, 500.0);
        assert_eq!(defender.vx, 14.0);
        assert!(!defender.grounded);

        let mut defender = grounded_fighter(400.0);
        PhysicsSystem::apply_knockback(&mut defender, 3.0, 0.0, 500.0);
        assert_eq!(defender.vx, -3.0);
        assert!(defender.grounded);
    }

    #[test]
    fn test_step_is_deterministic() {
        let mut a = grounded_fighter(700.0);
        let mut b = grounded_fighter(700.0);
        let inputs = [
            BotInput { right: true, ..BotInput::IDLE },
            BotInput { jump: true, right: true, ..BotInput::IDLE },
            BotInput::IDLE,
            BotInput { left: true, ..BotInput::IDLE },
        ];
        for i in 0..240 {
            let input = inputs[i % inputs.len()];
            PhysicsSystem::step(&a, &input, true).apply_to(&mut a);
            PhysicsSystem::step(&b, &input, true).apply_to(&mut b);
        }
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
    }
}
