//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::game::{MatchRegistry, NoRatings, RatingCollaborator};
use crate::util::rate_limit::BotRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
    pub ratings: Arc<dyn RatingCollaborator>,
    /// Input rate limiters keyed by bot id
    pub rate_limiters: Arc<DashMap<Uuid, BotRateLimiter>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_ratings(config, Arc::new(NoRatings))
    }

    pub fn with_ratings(config: Config, ratings: Arc<dyn RatingCollaborator>) -> Self {
        Self {
            config: Arc::new(config),
            match_registry: Arc::new(MatchRegistry::new()),
            ratings,
            rate_limiters: Arc::new(DashMap::new()),
        }
    }

    /// Consume one input slot for `bot_id`; false when over the limit
    pub fn check_input_rate(&self, bot_id: Uuid) -> bool {
        let rate = self.config.input_rate_limit;
        self.rate_limiters
            .entry(bot_id)
            .or_insert_with(|| BotRateLimiter::with_rate(rate))
            .check_input()
    }

    /// Prune finished matches and forget the rate limiters of bots that
    /// no longer play in any registered match
    pub fn prune_finished_matches(&self) -> usize {
        let pruned = self.match_registry.prune_finished();
        for bot_id in pruned.iter().flat_map(|handle| handle.bot_ids) {
            if !self.match_registry.has_bot(bot_id) {
                self.rate_limiters.remove(&bot_id);
            }
        }
        pruned.len()
    }
}
