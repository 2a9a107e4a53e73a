//! Observation building
//!
//! Observations are read-only views taken once per tick, after the whole
//! frame has resolved, so a bot never sees a half-applied frame.

use crate::bot::protocol::{Observation, OpponentView, SelfView, Side, ValidAction, Vec2};

use super::collision;
use super::damage::DamageCalculator;
use super::fighter::FighterState;
use super::frame_data::{self, AttackType};
use super::physics::PhysicsSystem;
use super::r#match::{MatchPhase, MatchState};

/// Builds per-side observations from a resolved match state
pub struct ObservationBuilder;

impl ObservationBuilder {
    /// Observations for both sides, indexed by side
    pub fn build_both(state: &MatchState) -> [Observation; 2] {
        [Self::build(state, Side::P1), Self::build(state, Side::P2)]
    }

    pub fn build(state: &MatchState, side: Side) -> Observation {
        let me = state.fighter(side);
        let opponent = state.fighter(side.opponent());

        let dx = opponent.x - me.x;
        let dy = opponent.y - me.y;
        let (distance_to_left_wall, distance_to_right_wall) = PhysicsSystem::wall_distances(me.x);

        let light = if me.grounded {
            AttackType::Light1
        } else {
            AttackType::AirLight
        };

        Observation {
            match_id: state.id,
            side,
            me: self_view(me),
            opponent: opponent_view(opponent),
            distance: (dx * dx + dy * dy).sqrt(),
            horizontal_distance: dx.abs(),
            vertical_distance: dy.abs(),
            in_attack_range: collision::in_attack_range(me, opponent, light),
            in_special_range: collision::in_attack_range(me, opponent, AttackType::Special),
            distance_to_left_wall,
            distance_to_right_wall,
            health_advantage: me.health - opponent.health,
            round_number: state.round_number,
            rounds_won: state.rounds_won[side.index()],
            rounds_lost: state.rounds_won[side.opponent().index()],
            time_remaining: state.time_remaining,
            phase: state.phase,
            frame_number: state.frame_number,
            decision_deadline_ms: state.config.decision_deadline_ms,
            valid_actions: Self::valid_actions(state, side),
        }
    }

    /// Actions that would change the fighter's state if sent next frame.
    /// `Wait` is always valid.
    pub fn valid_actions(state: &MatchState, side: Side) -> Vec<ValidAction> {
        let fighter = state.fighter(side);
        let mut actions = Vec::new();

        if state.phase != MatchPhase::Fighting || fighter.is_ko() {
            actions.push(ValidAction::Wait);
            return actions;
        }

        if fighter.can_move() {
            actions.push(ValidAction::MoveLeft);
            actions.push(ValidAction::MoveRight);
            if fighter.grounded {
                actions.push(ValidAction::Jump);
                actions.push(ValidAction::Block);
            }
        }

        let (light, heavy) = if fighter.grounded {
            (AttackType::Light1, AttackType::Heavy)
        } else {
            (AttackType::AirLight, AttackType::AirHeavy)
        };
        let affordable_special = DamageCalculator::can_afford(AttackType::Special, fighter.magic);

        if fighter.can_act && !fighter.is_blocking() {
            actions.push(ValidAction::AttackLight);
            actions.push(ValidAction::AttackHeavy);
            if affordable_special && fighter.grounded {
                actions.push(ValidAction::Special);
            }
        } else if let Some(current) = chain_source(state, side) {
            let next_light = frame_data::next_light_attack(Some(current));
            if frame_data::can_chain_into(current, next_light)
                || frame_data::can_chain_into(current, light)
            {
                actions.push(ValidAction::AttackLight);
            }
            if frame_data::can_chain_into(current, heavy) {
                actions.push(ValidAction::AttackHeavy);
            }
            if affordable_special && frame_data::can_chain_into(current, AttackType::Special) {
                actions.push(ValidAction::Special);
            }
        }

        actions.push(ValidAction::Wait);
        actions
    }
}

/// The attack a fighter could cancel out of right now, if any
fn chain_source(state: &MatchState, side: Side) -> Option<AttackType> {
    let fighter = state.fighter(side);
    let attack = fighter.attack?;
    if fighter.is_attacking() && attack.has_hit && state.combos[side.index()].can_chain_attack() {
        Some(attack.attack_type)
    } else {
        None
    }
}

fn self_view(f: &FighterState) -> SelfView {
    SelfView {
        health: f.health,
        health_percent: f.health_percent(),
        magic: f.magic,
        magic_percent: f.magic_percent(),
        position: Vec2 { x: f.x, y: f.y },
        velocity: Vec2 { x: f.vx, y: f.vy },
        state: f.status,
        facing: f.facing,
        grounded: f.grounded,
        can_act: f.can_act,
        combo_counter: f.combo_counter,
    }
}

fn opponent_view(f: &FighterState) -> OpponentView {
    OpponentView {
        health: f.health,
        health_percent: f.health_percent(),
        position: Vec2 { x: f.x, y: f.y },
        state: f.status,
        facing: f.facing,
        is_attacking: f.is_attacking(),
        is_blocking: f.is_blocking(),
        is_vulnerable: f.is_vulnerable(),
        grounded: f.grounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::protocol::{BotInput, Facing};
    use crate::game::fighter::{FighterStatus, P1_SPAWN_X, P2_SPAWN_X};
    use crate::game::r#match::MatchConfig;
    use uuid::Uuid;

    fn fighting_state() -> MatchState {
        let config = MatchConfig {
            countdown_seconds: 0,
            ..MatchConfig::default()
        };
        let mut state =
            MatchState::new(Uuid::from_u128(7), [Uuid::from_u128(1), Uuid::from_u128(2)], config)
                .unwrap();
        state.tick([BotInput::IDLE; 2]);
        state
    }

    #[test]
    fn test_spawn_observation() {
        let state = fighting_state();
        let obs = ObservationBuilder::build(&state, Side::P1);
        assert_eq!(obs.side, Side::P1);
        assert_eq!(obs.me.position.x, P1_SPAWN_X);
        assert_eq!(obs.opponent.position.x, P2_SPAWN_X);
        assert_eq!(obs.horizontal_distance, P2_SPAWN_X - P1_SPAWN_X);
        assert_eq!(obs.vertical_distance, 0.0);
        assert_eq!(obs.distance, obs.horizontal_distance);
        assert!(!obs.in_attack_range);
        assert!(!obs.in_special_range);
        assert_eq!(obs.health_advantage, 0);
        assert_eq!(obs.distance_to_left_wall, P1_SPAWN_X - 50.0);
        assert_eq!(obs.round_number, 1);
        assert_eq!(obs.time_remaining, 99);
        assert_eq!(obs.decision_deadline_ms, 100);
        assert_eq!(obs.phase, MatchPhase::Fighting);
    }

    #[test]
    fn test_sides_are_mirrored() {
        let mut state = fighting_state();
        state.fighters[1].set_health(700);
        state.rounds_won = [1, 0];
        let [p1, p2] = ObservationBuilder::build_both(&state);
        assert_eq!(p1.health_advantage, 300);
        assert_eq!(p2.health_advantage, -300);
        assert_eq!(p1.rounds_won, 1);
        assert_eq!(p2.rounds_lost, 1);
        assert_eq!(p1.opponent.health, p2.me.health);
        assert_eq!(p1.frame_number, p2.frame_number);
    }

    #[test]
    fn test_range_flags() {
        let mut state = fighting_state();
        state.fighters[0].x = 900.0;
        state.fighters[1].x = 960.0;
        let obs = ObservationBuilder::build(&state, Side::P1);
        assert!(obs.in_attack_range);
        assert!(obs.in_special_range);

        // Facing away: nothing is in range
        state.fighters[0].facing = Facing::Left;
        let obs = ObservationBuilder::build(&state, Side::P1);
        assert!(!obs.in_attack_range);
        assert!(!obs.in_special_range);
    }

    #[test]
    fn test_valid_actions_for_free_fighter() {
        let mut state = fighting_state();
        let actions = ObservationBuilder::valid_actions(&state, Side::P1);
        assert!(actions.contains(&ValidAction::MoveLeft));
        assert!(actions.contains(&ValidAction::Jump));
        assert!(actions.contains(&ValidAction::Block));
        assert!(actions.contains(&ValidAction::AttackLight));
        assert!(!actions.contains(&ValidAction::Special));
        assert_eq!(actions.last(), Some(&ValidAction::Wait));

        state.fighters[0].set_magic(50);
        let actions = ObservationBuilder::valid_actions(&state, Side::P1);
        assert!(actions.contains(&ValidAction::Special));
    }

    #[test]
    fn test_valid_actions_match_airborne_state_machine() {
        let mut state = fighting_state();
        state.fighters[0].set_magic(100);
        state.fighters[0].grounded = false;
        state.fighters[0].status = FighterStatus::Falling;
        let actions = ObservationBuilder::valid_actions(&state, Side::P1);
        assert!(!actions.contains(&ValidAction::Special));
        assert!(!actions.contains(&ValidAction::Jump));

        let cases = [
            (ValidAction::Special, BotInput { special: true, ..BotInput::IDLE }),
            (ValidAction::AttackLight, BotInput { attack1: true, ..BotInput::IDLE }),
            (ValidAction::AttackHeavy, BotInput { attack2: true, ..BotInput::IDLE }),
        ];
        for (action, input) in cases {
            let mut fighter = state.fighters[0].clone();
            let started = fighter.apply_input(&input, false, state.frame_number);
            assert_eq!(started.is_some(), actions.contains(&action), "{:?}", action);
        }
    }

    #[test]
    fn test_only_wait_when_unable_to_act() {
        let mut state = fighting_state();
        state.fighters[0].receive_hit(10, false);
        assert_eq!(state.fighters[0].status, FighterStatus::Hitstun);
        assert_eq!(
            ObservationBuilder::valid_actions(&state, Side::P1),
            vec![ValidAction::Wait]
        );
    }

    #[test]
    fn test_only_wait_outside_fighting() {
        let state = MatchState::new(
            Uuid::nil(),
            [Uuid::from_u128(1), Uuid::from_u128(2)],
            MatchConfig::default(),
        )
        .unwrap();
        assert_eq!(state.phase, MatchPhase::Countdown);
        assert_eq!(
            ObservationBuilder::valid_actions(&state, Side::P2),
            vec![ValidAction::Wait]
        );
    }

    #[test]
    fn test_observation_serializes_self_key() {
        let state = fighting_state();
        let json = serde_json::to_value(ObservationBuilder::build(&state, Side::P2)).unwrap();
        assert!(json.get("self").is_some());
        assert_eq!(json["side"], "p2");
        assert_eq!(json["phase"], "fighting");
        assert_eq!(json["self"]["state"], "idle");
    }
}
