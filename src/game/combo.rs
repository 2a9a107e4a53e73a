//! Per-fighter combo tracking

use serde::Serialize;

use super::frame_data::{self, AttackType};

/// Rolling combo state for one attacker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ComboState {
    /// Hits since combo start
    pub count: u32,
    /// Cumulative damage including combo bonus
    pub damage: i32,
    pub last_attack: Option<AttackType>,
    pub start_frame: u64,
    pub last_hit_frame: u64,
    pub active: bool,
    pub can_chain: bool,
    pub chain_window_remaining: u32,
}

/// Result of registering one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboHit {
    /// Position of this hit in the combo (1 = opener)
    pub count: u32,
    pub bonus_damage: i32,
    pub total_damage: i32,
}

impl ComboHit {
    pub fn is_combo(&self) -> bool {
        self.count > 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComboTracker {
    state: ComboState,
}

impl ComboTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ComboState {
        &self.state
    }

    fn window(&self) -> u64 {
        frame_data::combo_window(self.state.last_attack) as u64
    }

    fn within_window(&self, frame: u64) -> bool {
        self.state.active && frame.saturating_sub(self.state.last_hit_frame) < self.window()
    }

    /// Hits already in a live combo at `frame` (0 if none or lapsed)
    pub fn current_count(&self, frame: u64) -> u32 {
        if self.within_window(frame) {
            self.state.count
        } else {
            0
        }
    }

    /// Record a landed hit with the attack's base `damage`
    pub fn register_hit(&mut self, attack_type: AttackType, damage: i32, frame: u64) -> ComboHit {
        if self.within_window(frame) {
            self.state.count += 1;
        } else {
            self.state = ComboState {
                count: 1,
                damage: 0,
                start_frame: frame,
                ..ComboState::default()
            };
        }

        let bonus_tenths = (self.state.count as i64 - 1).clamp(0, 5);
        let bonus_damage = (damage as i64 * bonus_tenths / 10) as i32;
        self.state.damage += damage + bonus_damage;
        self.state.last_attack = Some(attack_type);
        self.state.last_hit_frame = frame;
        self.state.active = true;

        let (can_chain, chain_window) = frame_data::get(attack_type)
            .map(|d| (d.can_chain, d.chain_window))
            .unwrap_or((false, 0));
        self.state.can_chain = can_chain;
        self.state.chain_window_remaining = chain_window;

        ComboHit {
            count: self.state.count,
            bonus_damage,
            total_damage: self.state.damage,
        }
    }

    /// Per-frame decay of the chain window and the combo itself
    pub fn tick(&mut self, frame: u64) {
        if self.state.chain_window_remaining > 0 {
            self.state.chain_window_remaining -= 1;
            if self.state.chain_window_remaining == 0 {
                self.state.can_chain = false;
            }
        }

        if self.state.active && frame.saturating_sub(self.state.last_hit_frame) > self.window() {
            self.state = ComboState::default();
        }
    }

    pub fn can_chain_attack(&self) -> bool {
        self.state.can_chain && self.state.chain_window_remaining > 0
    }

    /// Forcibly terminate the combo, returning what it was
    pub fn end_combo(&mut self) -> ComboState {
        std::mem::take(&mut self.state)
    }
}
