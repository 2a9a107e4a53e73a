//! Match state and the authoritative per-frame simulation step
//!
//! `MatchState::tick` is a pure, single-threaded step. Within a frame the
//! order is fixed: timer decay, inputs, physics, contact detection for both
//! directions against the same post-physics state, then contact resolution
//! P1 first. That order is part of the observable contract.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bot::protocol::{BotInput, GameEvent, Side};
use crate::util::time::{seconds_to_frames, SIMULATION_TPS};

use super::collision::{check_hit, is_in_front};
use super::combo::ComboTracker;
use super::damage::{BlockResult, DamageCalculator};
use super::fighter::FighterState;
use super::frame_data::{self, AttackType};
use super::physics::PhysicsSystem;

/// Hard cap on rounds in one match
pub const MAX_ROUNDS: u32 = 5;
pub const MAX_ROUNDS_TO_WIN: u32 = 3;
pub const MAX_ROUND_TIME_SECONDS: u32 = 99;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Countdown before a round
    Countdown,
    /// Round in progress
    Fighting,
    /// Between rounds, fighters being reset
    RoundEnd,
    /// A fighter was knocked out
    Ko,
    /// Round clock expired
    Timeout,
    /// Match over
    MatchEnd,
}

/// Rules for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub rounds_to_win: u32,
    pub round_time_seconds: u32,
    pub countdown_seconds: u32,
    /// How long KO / timeout is held before the next round
    pub round_end_hold_seconds: u32,
    /// Passed through to observations; enforced by the transport
    pub decision_deadline_ms: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            rounds_to_win: 2,
            round_time_seconds: 99,
            countdown_seconds: 3,
            round_end_hold_seconds: 2,
            decision_deadline_ms: 100,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), MatchConfigError> {
        if self.rounds_to_win == 0 || self.rounds_to_win > MAX_ROUNDS_TO_WIN {
            return Err(MatchConfigError::InvalidRoundsToWin(self.rounds_to_win));
        }
        if self.round_time_seconds == 0 || self.round_time_seconds > MAX_ROUND_TIME_SECONDS {
            return Err(MatchConfigError::InvalidRoundTime(self.round_time_seconds));
        }
        Ok(())
    }
}

/// Malformed match creation requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchConfigError {
    #[error("rounds_to_win must be between 1 and {MAX_ROUNDS_TO_WIN}, got {0}")]
    InvalidRoundsToWin(u32),

    #[error("round_time_seconds must be between 1 and {MAX_ROUND_TIME_SECONDS}, got {0}")]
    InvalidRoundTime(u32),

    #[error("a bot cannot fight itself")]
    SameBot,
}

/// Per-side statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideStats {
    pub damage_dealt: i32,
    pub hits_landed: u32,
    pub hits_blocked: u32,
    pub longest_combo: u32,
}

impl SideStats {
    fn record_hit(&mut self, damage: i32, combo_count: u32) {
        self.damage_dealt += damage;
        self.hits_landed += 1;
        self.longest_combo = self.longest_combo.max(combo_count);
    }
}

/// Statistics for the current round and the whole match, indexed by side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub round: [SideStats; 2],
    pub total: [SideStats; 2],
}

/// How one attacker -> defender contact resolved this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    Hit {
        attack_type: AttackType,
        combo_count: u32,
        is_counter_hit: bool,
    },
    Blocked {
        attack_type: AttackType,
        block: BlockResult,
    },
    NoContact,
}

/// Result of a tick
#[derive(Debug, Default)]
pub struct TickResult {
    pub events: Vec<GameEvent>,
    pub match_ended: bool,
    pub winner: Option<Side>,
}

/// Match state (owned by the match task)
#[derive(Debug, Clone)]
pub struct MatchState {
    pub id: Uuid,
    pub bot_ids: [Uuid; 2],
    pub config: MatchConfig,
    pub fighters: [FighterState; 2],
    pub combos: [ComboTracker; 2],
    pub round_number: u32,
    pub rounds_won: [u32; 2],
    pub time_remaining: u32,
    pub phase: MatchPhase,
    pub frame_number: u64,
    pub winner: Option<Side>,
    pub stats: MatchStats,
    phase_frames: u64,
    round_frames: u64,
}

impl MatchState {
    pub fn new(id: Uuid, bot_ids: [Uuid; 2], config: MatchConfig) -> Result<Self, MatchConfigError> {
        config.validate()?;
        if bot_ids[0] == bot_ids[1] {
            return Err(MatchConfigError::SameBot);
        }

        Ok(Self {
            id,
            bot_ids,
            fighters: [
                FighterState::new(bot_ids[0], Side::P1),
                FighterState::new(bot_ids[1], Side::P2),
            ],
            combos: [ComboTracker::new(), ComboTracker::new()],
            round_number: 1,
            rounds_won: [0, 0],
            time_remaining: config.round_time_seconds,
            phase: MatchPhase::Countdown,
            frame_number: 0,
            winner: None,
            stats: MatchStats::default(),
            phase_frames: 0,
            round_frames: 0,
            config,
        })
    }

    pub fn fighter(&self, side: Side) -> &FighterState {
        &self.fighters[side.index()]
    }

    pub fn bot_id(&self, side: Side) -> Uuid {
        self.bot_ids[side.index()]
    }

    pub fn side_of(&self, bot_id: Uuid) -> Option<Side> {
        Side::BOTH.into_iter().find(|s| self.bot_id(*s) == bot_id)
    }

    pub fn is_over(&self) -> bool {
        self.phase == MatchPhase::MatchEnd
    }

    /// Advance the match by one frame. `inputs` is indexed by side; a bot
    /// that sent nothing this frame is given `BotInput::IDLE`.
    pub fn tick(&mut self, inputs: [BotInput; 2]) -> TickResult {
        let mut result = TickResult::default();

        if self.phase == MatchPhase::MatchEnd {
            result.match_ended = true;
            result.winner = self.winner;
            return result;
        }

        self.frame_number += 1;
        self.phase_frames += 1;

        match self.phase {
            MatchPhase::Countdown => {
                if self.phase_frames >= seconds_to_frames(self.config.countdown_seconds) {
                    self.set_phase(MatchPhase::Fighting);
                    result.events.push(GameEvent::RoundStart {
                        round_number: self.round_number,
                        frame_number: self.frame_number,
                    });
                    debug!(match_id = %self.id, round = self.round_number, "Round started");
                }
            }
            MatchPhase::Fighting => {
                self.run_fighting_frame(&inputs, &mut result.events);
            }
            MatchPhase::Ko | MatchPhase::Timeout => {
                if self.phase_frames >= seconds_to_frames(self.config.round_end_hold_seconds) {
                    self.finish_round(&mut result.events);
                }
            }
            MatchPhase::RoundEnd => {
                self.start_next_round();
            }
            MatchPhase::MatchEnd => {}
        }

        result.match_ended = self.is_over();
        result.winner = self.winner;
        result
    }

    /// End the match immediately in favour of the other side (forfeit / disconnect)
    pub fn forfeit(&mut self, loser: Side) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.is_over() {
            return events;
        }
        info!(match_id = %self.id, loser = loser.as_str(), "Match forfeited");
        self.end_match(Some(loser.opponent()), &mut events);
        events
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        self.phase = phase;
        self.phase_frames = 0;
    }

    fn run_fighting_frame(&mut self, inputs: &[BotInput; 2], events: &mut Vec<GameEvent>) {
        let frame = self.frame_number;

        for side in Side::BOTH {
            let i = side.index();
            self.fighters[i].begin_frame();
            self.combos[i].tick(frame);
        }

        for side in Side::BOTH {
            let i = side.index();
            let chain_open = self.combos[i].can_chain_attack();
            if let Some(attack) = self.fighters[i].apply_input(&inputs[i], chain_open, frame) {
                debug!(match_id = %self.id, side = side.as_str(), attack = %attack, frame, "Attack started");
            }
        }

        for side in Side::BOTH {
            let i = side.index();
            let fighter = &mut self.fighters[i];
            let can_move = fighter.can_move();
            PhysicsSystem::step(fighter, &inputs[i], can_move).apply_to(fighter);
            fighter.refresh_movement_status(&inputs[i]);
        }

        let contacts = [self.detect_contact(Side::P1), self.detect_contact(Side::P2)];
        for (side, contact) in Side::BOTH.into_iter().zip(contacts) {
            if self.phase != MatchPhase::Fighting {
                break;
            }
            self.apply_contact(side, contact, events);
        }

        for side in Side::BOTH {
            let i = side.index();
            self.fighters[i].combo_counter = self.combos[i].current_count(frame);
        }

        if self.phase != MatchPhase::Fighting {
            return;
        }

        self.round_frames += 1;
        if self.round_frames % SIMULATION_TPS as u64 == 0 {
            self.time_remaining = self.time_remaining.saturating_sub(1);
            if self.time_remaining == 0 {
                self.resolve_timeout(events);
            }
        }
    }

    /// Decide whether `attacker_side`'s attack connects this frame, and how.
    /// Every contact resolves to exactly one of hit, blocked or no contact.
    pub fn detect_contact(&self, attacker_side: Side) -> Contact {
        let attacker = self.fighter(attacker_side);
        let defender = self.fighter(attacker_side.opponent());

        let Some(attack) = attacker.attack else {
            return Contact::NoContact;
        };
        if attack.has_hit || attacker.is_ko() {
            return Contact::NoContact;
        }
        if frame_data::get(attack.attack_type).is_none() {
            warn!(
                match_id = %self.id,
                attack_type = %attack.attack_type,
                "Missing frame data; treating attack as no-op"
            );
            return Contact::NoContact;
        }

        let active = frame_data::is_attack_active_at_frame(attack.attack_type, attack.frame);
        if !check_hit(attacker, defender, attack.attack_type, active, defender.is_vulnerable()) {
            return Contact::NoContact;
        }

        if defender.is_blocking() && is_in_front(defender, attacker) {
            return Contact::Blocked {
                attack_type: attack.attack_type,
                block: DamageCalculator::calculate_blocked(attack.attack_type),
            };
        }

        Contact::Hit {
            attack_type: attack.attack_type,
            combo_count: self.combos[attacker_side.index()].current_count(self.frame_number),
            is_counter_hit: defender.is_in_attack_startup(),
        }
    }

    fn apply_contact(&mut self, attacker_side: Side, contact: Contact, events: &mut Vec<GameEvent>) {
        let a = attacker_side.index();
        let d = attacker_side.opponent().index();
        let frame = self.frame_number;

        match contact {
            Contact::NoContact => {}
            Contact::Hit {
                attack_type,
                combo_count,
                is_counter_hit,
            } => {
                let base = DamageCalculator::calculate(attack_type, combo_count, is_counter_hit);
                let combo_hit = self.combos[a].register_hit(attack_type, base.base_damage, frame);
                let damage = DamageCalculator::apply_combo_scaling(base, combo_hit.count);

                let attacker_x = self.fighters[a].x;
                self.fighters[a].mark_attack_hit();
                self.fighters[a].add_magic(damage.magic_gain);

                let defender = &mut self.fighters[d];
                let health_after = defender.take_damage(damage.final_damage);
                defender.receive_hit(damage.hitstun_frames, damage.causes_knockdown);
                PhysicsSystem::apply_knockback(defender, damage.knockback_x, damage.knockback_y, attacker_x);

                self.stats.round[a].record_hit(damage.final_damage, combo_hit.count);
                self.stats.total[a].record_hit(damage.final_damage, combo_hit.count);

                events.push(GameEvent::Damage {
                    attacker_id: self.bot_ids[a],
                    defender_id: self.bot_ids[d],
                    attack_type,
                    damage: damage.final_damage,
                    is_combo: combo_hit.is_combo(),
                    combo_hit_number: combo_hit.count,
                    is_counter_hit,
                    defender_health_after: health_after,
                    frame_number: frame,
                });

                if combo_hit.is_combo() {
                    debug!(
                        match_id = %self.id,
                        side = attacker_side.as_str(),
                        hits = combo_hit.count,
                        bonus = combo_hit.bonus_damage,
                        total = combo_hit.total_damage,
                        "Combo extended"
                    );
                }

                if damage.causes_knockdown {
                    let ended = self.combos[a].end_combo();
                    debug!(match_id = %self.id, hits = ended.count, damage = ended.damage, "Combo ended by knockdown");
                }

                if health_after == 0 {
                    self.resolve_ko(attacker_side, events);
                }
            }
            Contact::Blocked { attack_type, block } => {
                let attacker_x = self.fighters[a].x;
                self.fighters[a].mark_attack_hit();

                let defender = &mut self.fighters[d];
                let health_after = defender.take_damage(block.chip_damage);
                defender.receive_block(block.blockstun_frames);
                let direction = if defender.x >= attacker_x { 1.0 } else { -1.0 };
                defender.vx = block.pushback * direction;

                self.stats.round[d].hits_blocked += 1;
                self.stats.total[d].hits_blocked += 1;

                events.push(GameEvent::Blocked {
                    attacker_id: self.bot_ids[a],
                    defender_id: self.bot_ids[d],
                    attack_type,
                    chip_damage: block.chip_damage,
                    defender_health_after: health_after,
                    frame_number: frame,
                });

                if health_after == 0 {
                    self.resolve_ko(attacker_side, events);
                }
            }
        }
    }

    fn resolve_ko(&mut self, winner: Side, events: &mut Vec<GameEvent>) {
        let w = winner.index();
        let l = winner.opponent().index();

        for combo in self.combos.iter_mut() {
            combo.end_combo();
        }
        self.rounds_won[w] += 1;
        self.set_phase(MatchPhase::Ko);

        info!(
            match_id = %self.id,
            round = self.round_number,
            winner = winner.as_str(),
            "KO"
        );

        events.push(GameEvent::Ko {
            winner_id: self.bot_ids[w],
            loser_id: self.bot_ids[l],
            round_number: self.round_number,
            winner_health_remaining: self.fighters[w].health,
            total_damage_dealt: self.stats.round[w].damage_dealt,
            longest_combo: self.stats.round[w].longest_combo,
            frame_number: self.frame_number,
        });
        self.push_round_end(Some(winner), events);
    }

    fn resolve_timeout(&mut self, events: &mut Vec<GameEvent>) {
        let p1 = self.fighters[0].health;
        let p2 = self.fighters[1].health;
        let winner = match p1.cmp(&p2) {
            std::cmp::Ordering::Greater => Some(Side::P1),
            std::cmp::Ordering::Less => Some(Side::P2),
            std::cmp::Ordering::Equal => None,
        };
        if let Some(side) = winner {
            self.rounds_won[side.index()] += 1;
        }
        self.set_phase(MatchPhase::Timeout);

        info!(
            match_id = %self.id,
            round = self.round_number,
            winner = winner.map(|s| s.as_str()).unwrap_or("draw"),
            "Round timed out"
        );
        self.push_round_end(winner, events);
    }

    fn push_round_end(&self, winner: Option<Side>, events: &mut Vec<GameEvent>) {
        events.push(GameEvent::RoundEnd {
            round_number: self.round_number,
            winner_id: winner.map(|s| self.bot_id(s)),
            rounds_p1: self.rounds_won[0],
            rounds_p2: self.rounds_won[1],
        });
    }

    fn finish_round(&mut self, events: &mut Vec<GameEvent>) {
        let target = self.config.rounds_to_win;
        let decided = self.rounds_won.iter().any(|&r| r >= target);
        if decided || self.round_number >= MAX_ROUNDS {
            let winner = match self.rounds_won[0].cmp(&self.rounds_won[1]) {
                std::cmp::Ordering::Greater => Some(Side::P1),
                std::cmp::Ordering::Less => Some(Side::P2),
                std::cmp::Ordering::Equal => None,
            };
            self.end_match(winner, events);
        } else {
            self.set_phase(MatchPhase::RoundEnd);
        }
    }

    fn start_next_round(&mut self) {
        self.round_number += 1;
        for fighter in self.fighters.iter_mut() {
            fighter.reset_for_round();
        }
        self.combos = [ComboTracker::new(), ComboTracker::new()];
        self.stats.round = Default::default();
        self.time_remaining = self.config.round_time_seconds;
        self.round_frames = 0;
        self.set_phase(MatchPhase::Countdown);
    }

    fn end_match(&mut self, winner: Option<Side>, events: &mut Vec<GameEvent>) {
        self.winner = winner;
        self.set_phase(MatchPhase::MatchEnd);

        info!(
            match_id = %self.id,
            winner = winner.map(|s| s.as_str()).unwrap_or("draw"),
            score_p1 = self.rounds_won[0],
            score_p2 = self.rounds_won[1],
            "Match ended"
        );

        events.push(GameEvent::MatchEnd {
            match_id: self.id,
            winner_id: winner.map(|s| self.bot_id(s)),
            final_score: self.rounds_won,
            rating_changes: None,
        });
    }
}
