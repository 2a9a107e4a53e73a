//! Per-match runner: a tokio task stepping one `MatchState` at 60 Hz
//!
//! Bots talk to a running match only through its `MatchHandle`: inputs and
//! forfeits go in over an mpsc channel, observations and events come out over
//! a broadcast channel plus a cache of the latest observations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bot::protocol::{BotInput, GameEvent, Observation, RatingChanges, ServerMsg, Side};
use crate::util::time::{tick_duration, unix_millis};

use super::r#match::{MatchPhase, MatchState, MatchStats};
use super::snapshot::ObservationBuilder;

/// Messages a match task accepts
#[derive(Debug, Clone)]
pub enum MatchCommand {
    Input {
        side: Side,
        input: BotInput,
        received_at: u64,
    },
    /// Forfeit or disconnect of one side
    Forfeit { side: Side },
}

/// Supplies rating deltas when a match finishes with a winner
pub trait RatingCollaborator: Send + Sync {
    fn rating_changes(&self, winner_id: Uuid, loser_id: Uuid) -> Option<RatingChanges>;
}

/// No rating service configured
pub struct NoRatings;

impl RatingCollaborator for NoRatings {
    fn rating_changes(&self, _winner_id: Uuid, _loser_id: Uuid) -> Option<RatingChanges> {
        None
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("match has finished")]
    MatchClosed,

    #[error("match input queue is full")]
    QueueFull,
}

/// Public status of a match, refreshed every tick
#[derive(Debug, Clone, Serialize)]
pub struct MatchStatus {
    pub match_id: Uuid,
    pub bot_ids: [Uuid; 2],
    pub phase: MatchPhase,
    pub frame_number: u64,
    pub round_number: u32,
    pub rounds_won: [u32; 2],
    pub time_remaining: u32,
    pub health: [i32; 2],
    pub winner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl MatchStatus {
    fn from_state(state: &MatchState, created_at: DateTime<Utc>) -> Self {
        Self {
            match_id: state.id,
            bot_ids: state.bot_ids,
            phase: state.phase,
            frame_number: state.frame_number,
            round_number: state.round_number,
            rounds_won: state.rounds_won,
            time_remaining: state.time_remaining,
            health: [state.fighters[0].health, state.fighters[1].health],
            winner_id: state.winner.map(|s| state.bot_id(s)),
            created_at,
        }
    }
}

/// Final record of a finished match
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub winner_id: Option<Uuid>,
    pub final_score: [u32; 2],
    pub frames: u64,
    pub stats: MatchStats,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub bot_ids: [Uuid; 2],
    pub command_tx: mpsc::Sender<MatchCommand>,
    pub message_tx: broadcast::Sender<ServerMsg>,
    observations: Arc<RwLock<[Observation; 2]>>,
    status: Arc<RwLock<MatchStatus>>,
}

impl MatchHandle {
    /// Latest observation for `side`, taken after the last completed tick
    pub fn latest_observation(&self, side: Side) -> Observation {
        self.observations.read()[side.index()].clone()
    }

    pub fn status(&self) -> MatchStatus {
        self.status.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status.read().phase == MatchPhase::MatchEnd
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.message_tx.subscribe()
    }

    /// Buffer an input for the next tick. The latest input per side wins.
    pub fn submit_input(&self, side: Side, input: BotInput) -> Result<(), SessionError> {
        self.send(MatchCommand::Input {
            side,
            input,
            received_at: unix_millis(),
        })
    }

    pub fn forfeit(&self, side: Side) -> Result<(), SessionError> {
        self.send(MatchCommand::Forfeit { side })
    }

    fn send(&self, command: MatchCommand) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::MatchClosed);
        }
        self.command_tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SessionError::MatchClosed,
        })
    }
}

/// Registry of all matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn active_matches(&self) -> usize {
        self.matches.iter().filter(|m| !m.value().is_finished()).count()
    }

    pub fn total_matches(&self) -> usize {
        self.matches.len()
    }

    /// Whether `bot_id` plays in any registered match
    pub fn has_bot(&self, bot_id: Uuid) -> bool {
        self.matches.iter().any(|m| m.value().bot_ids.contains(&bot_id))
    }

    /// Drop finished matches from the registry, returning the removed handles
    pub fn prune_finished(&self) -> Vec<MatchHandle> {
        let mut removed = Vec::new();
        self.matches.retain(|_, handle| {
            if handle.is_finished() {
                removed.push(handle.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Spawn the match task and register its handle
    pub fn spawn(&self, state: MatchState, ratings: Arc<dyn RatingCollaborator>) -> MatchHandle {
        let (game_match, handle) = GameMatch::new(state, ratings);
        self.insert(handle.clone());
        tokio::spawn(async move {
            let summary = game_match.run().await;
            debug!(match_id = %summary.match_id, frames = summary.frames, "Match task finished");
        });
        handle
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match runner
pub struct GameMatch {
    state: MatchState,
    command_rx: mpsc::Receiver<MatchCommand>,
    message_tx: broadcast::Sender<ServerMsg>,
    observations: Arc<RwLock<[Observation; 2]>>,
    status: Arc<RwLock<MatchStatus>>,
    ratings: Arc<dyn RatingCollaborator>,
    pending: [Option<BotInput>; 2],
    started_at: DateTime<Utc>,
}

impl GameMatch {
    pub fn new(state: MatchState, ratings: Arc<dyn RatingCollaborator>) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (message_tx, _) = broadcast::channel(64);
        let started_at = Utc::now();

        let observations = Arc::new(RwLock::new(ObservationBuilder::build_both(&state)));
        let status = Arc::new(RwLock::new(MatchStatus::from_state(&state, started_at)));

        let handle = MatchHandle {
            id: state.id,
            bot_ids: state.bot_ids,
            command_tx,
            message_tx: message_tx.clone(),
            observations: observations.clone(),
            status: status.clone(),
        };

        let game_match = Self {
            state,
            command_rx,
            message_tx,
            observations,
            status,
            ratings,
            pending: [None, None],
            started_at,
        };

        (game_match, handle)
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Run the fixed-rate tick loop until the match ends
    pub async fn run(mut self) -> MatchSummary {
        info!(
            match_id = %self.state.id,
            p1 = %self.state.bot_ids[0],
            p2 = %self.state.bot_ids[1],
            "Match started"
        );

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if self.step() {
                break;
            }
        }

        self.summary()
    }

    /// One scheduler step: drain commands, advance the simulation, publish.
    /// Returns true once the match has ended.
    pub fn step(&mut self) -> bool {
        let mut events = self.drain_commands();

        if !self.state.is_over() {
            let inputs = self.take_inputs();
            events.extend(self.state.tick(inputs).events);
        }

        self.attach_ratings(&mut events);
        self.publish(events);
        self.state.is_over()
    }

    fn drain_commands(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                MatchCommand::Input {
                    side,
                    input,
                    received_at,
                } => {
                    let age_ms = unix_millis().saturating_sub(received_at);
                    if age_ms > self.state.config.decision_deadline_ms {
                        debug!(match_id = %self.state.id, side = side.as_str(), age_ms, "Late input");
                    }
                    self.pending[side.index()] = Some(input);
                }
                MatchCommand::Forfeit { side } => {
                    events.extend(self.state.forfeit(side));
                }
            }
        }
        events
    }

    /// Inputs for this tick; a side with nothing buffered idles
    fn take_inputs(&mut self) -> [BotInput; 2] {
        [
            self.pending[0].take().unwrap_or(BotInput::IDLE),
            self.pending[1].take().unwrap_or(BotInput::IDLE),
        ]
    }

    fn attach_ratings(&self, events: &mut [GameEvent]) {
        for event in events.iter_mut() {
            if let GameEvent::MatchEnd {
                winner_id: Some(winner),
                rating_changes,
                ..
            } = event
            {
                let Some(winner_side) = self.state.side_of(*winner) else {
                    warn!(match_id = %self.state.id, winner = %winner, "Winner is not in this match");
                    continue;
                };
                let loser = self.state.bot_id(winner_side.opponent());
                *rating_changes = self.ratings.rating_changes(*winner, loser);
            }
        }
    }

    fn publish(&self, events: Vec<GameEvent>) {
        let observations = ObservationBuilder::build_both(&self.state);
        *self.status.write() = MatchStatus::from_state(&self.state, self.started_at);

        for observation in &observations {
            let _ = self
                .message_tx
                .send(ServerMsg::Observation(Box::new(observation.clone())));
        }
        *self.observations.write() = observations;

        if !events.is_empty() {
            let _ = self.message_tx.send(ServerMsg::Events {
                frame_number: self.state.frame_number,
                events,
            });
        }
    }

    fn summary(&self) -> MatchSummary {
        let summary = MatchSummary {
            match_id: self.state.id,
            winner_id: self.state.winner.map(|s| self.state.bot_id(s)),
            final_score: self.state.rounds_won,
            frames: self.state.frame_number,
            stats: self.state.stats.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
        };
        info!(
            match_id = %summary.match_id,
            score_p1 = summary.final_score[0],
            score_p2 = summary.final_score[1],
            frames = summary.frames,
            "Match finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fighter::FighterStatus;
    use crate::game::r#match::MatchConfig;
    use std::time::Duration;

    struct FixedRatings;

    impl RatingCollaborator for FixedRatings {
        fn rating_changes(&self, _winner_id: Uuid, _loser_id: Uuid) -> Option<RatingChanges> {
            Some(RatingChanges {
                winner_delta: 16,
                loser_delta: -16,
            })
        }
    }

    fn bots() -> [Uuid; 2] {
        [Uuid::from_u128(1), Uuid::from_u128(2)]
    }

    fn new_match(ratings: Arc<dyn RatingCollaborator>) -> (GameMatch, MatchHandle) {
        let config = MatchConfig {
            countdown_seconds: 0,
            ..MatchConfig::default()
        };
        let state = MatchState::new(Uuid::new_v4(), bots(), config).unwrap();
        GameMatch::new(state, ratings)
    }

    #[test]
    fn test_latest_input_per_side_wins() {
        let (mut game, handle) = new_match(Arc::new(NoRatings));
        game.step();
        let start_x = game.state().fighters[0].x;

        handle
            .submit_input(Side::P1, BotInput { left: true, ..BotInput::IDLE })
            .unwrap();
        handle
            .submit_input(Side::P1, BotInput { right: true, ..BotInput::IDLE })
            .unwrap();
        game.step();
        assert!(game.state().fighters[0].x > start_x);
        assert_eq!(game.state().fighters[0].status, FighterStatus::Walking);

        // Buffered input is consumed; the next tick idles
        game.step();
        assert_eq!(game.state().fighters[0].status, FighterStatus::Idle);
    }

    #[test]
    fn test_step_refreshes_observation_cache() {
        let (mut game, handle) = new_match(Arc::new(NoRatings));
        assert_eq!(handle.latest_observation(Side::P1).frame_number, 0);
        game.step();
        game.step();
        let obs = handle.latest_observation(Side::P2);
        assert_eq!(obs.frame_number, 2);
        assert_eq!(obs.side, Side::P2);
        assert_eq!(handle.status().frame_number, 2);
        assert_eq!(handle.status().phase, MatchPhase::Fighting);
    }

    #[test]
    fn test_forfeit_finishes_match_with_ratings() {
        let (mut game, handle) = new_match(Arc::new(FixedRatings));
        let mut rx = handle.subscribe();
        game.step();

        handle.forfeit(Side::P1).unwrap();
        assert!(game.step());
        assert!(handle.is_finished());
        assert_eq!(handle.status().winner_id, Some(bots()[1]));

        let mut match_end = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Events { events, .. } = msg {
                for event in events {
                    if let GameEvent::MatchEnd { rating_changes, .. } = event {
                        match_end = Some(rating_changes);
                    }
                }
            }
        }
        assert_eq!(
            match_end,
            Some(Some(RatingChanges {
                winner_delta: 16,
                loser_delta: -16
            }))
        );

        assert_eq!(handle.submit_input(Side::P2, BotInput::IDLE), Err(SessionError::MatchClosed));
    }

    #[test]
    fn test_no_ratings_leaves_changes_empty() {
        let (mut game, handle) = new_match(Arc::new(NoRatings));
        handle.forfeit(Side::P2).unwrap();
        let mut rx = handle.subscribe();
        game.step();
        let found = std::iter::from_fn(|| rx.try_recv().ok()).any(|msg| {
            matches!(
                msg,
                ServerMsg::Events { ref events, .. }
                    if events.iter().any(|e| matches!(e, GameEvent::MatchEnd { rating_changes: None, .. }))
            )
        });
        assert!(found);
    }

    #[test]
    fn test_registry_prunes_finished() {
        let registry = MatchRegistry::new();
        let (mut game, handle) = new_match(Arc::new(NoRatings));
        registry.insert(handle.clone());
        assert_eq!(registry.active_matches(), 1);
        assert!(registry.get(&handle.id).is_some());

        handle.forfeit(Side::P1).unwrap();
        game.step();
        assert_eq!(registry.active_matches(), 0);
        assert_eq!(registry.total_matches(), 1);
        assert!(registry.has_bot(bots()[0]));
        let pruned = registry.prune_finished();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].id, handle.id);
        assert!(registry.get(&handle.id).is_none());
        assert!(!registry.has_bot(bots()[0]));
    }

    #[test]
    fn test_each_step_broadcasts_both_observations() {
        let (mut game, handle) = new_match(Arc::new(NoRatings));
        let mut rx = handle.subscribe();
        game.step();

        let first = tokio_test::block_on(rx.recv()).unwrap();
        let second = tokio_test::block_on(rx.recv()).unwrap();
        match (first, second) {
            (ServerMsg::Observation(p1), ServerMsg::Observation(p2)) => {
                assert_eq!(p1.side, Side::P1);
                assert_eq!(p2.side, Side::P2);
                assert_eq!(p1.frame_number, 1);
            }
            other => panic!("unexpected messages: {other:?}"),
        }
        // The round_start event follows the observations
        let events = tokio_test::block_on(rx.recv()).unwrap();
        assert!(matches!(events, ServerMsg::Events { frame_number: 1, .. }));
    }

    #[tokio::test]
    async fn test_spawned_match_runs_and_ends_on_forfeit() {
        let registry = MatchRegistry::new();
        let state = MatchState::new(Uuid::new_v4(), bots(), MatchConfig::default()).unwrap();
        let handle = registry.spawn(state, Arc::new(NoRatings));
        let mut rx = handle.subscribe();

        // Observations arrive every tick
        let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no tick within a second")
            .unwrap();
        assert!(matches!(msg, ServerMsg::Observation(_)));

        handle.forfeit(Side::P2).unwrap();
        let ended = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match rx.recv().await {
                    Ok(ServerMsg::Events { events, .. })
                        if events.iter().any(|e| matches!(e, GameEvent::MatchEnd { .. })) =>
                    {
                        return true
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        })
        .await
        .unwrap();
        assert!(ended);
        assert!(handle.is_finished());
        assert_eq!(handle.status().winner_id, Some(bots()[0]));
    }
}
