//! Damage, block and meter calculations
//!
//! Percentages are applied in integer tenths/hundredths so every result is the
//! exact floor of the real-valued formula on every platform.

use super::frame_data::{self, AttackType};

/// Magic consumed by starting a special
pub const SPECIAL_MAGIC_COST: i32 = 50;
/// Pre-hit combo count from which every hit knocks down
pub const KNOCKDOWN_COMBO_THRESHOLD: u32 = 6;

const MAX_COMBO_BONUS_TENTHS: i64 = 5;
const COUNTER_BONUS_PERCENT: i64 = 25;
const MAGIC_FROM_DAMAGE_PERCENT: i64 = 2;
const COUNTER_KNOCKBACK_MULT: f32 = 1.25;

/// Outcome of a confirmed hit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageResult {
    pub base_damage: i32,
    pub combo_bonus: i32,
    pub counter_bonus: i32,
    pub final_damage: i32,
    pub magic_gain: i32,
    pub hitstun_frames: u32,
    pub knockback_x: f32,
    pub knockback_y: f32,
    pub causes_knockdown: bool,
    pub is_counter_hit: bool,
}

/// Outcome of a blocked hit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockResult {
    pub chip_damage: i32,
    pub blockstun_frames: u32,
    pub pushback: f32,
}

pub struct DamageCalculator;

impl DamageCalculator {
    /// Damage for a hit landing with `combo_count` prior hits in the attacker's combo.
    /// Absent frame data yields an all-zero result.
    pub fn calculate(attack_type: AttackType, combo_count: u32, is_counter_hit: bool) -> DamageResult {
        let Some(data) = frame_data::get(attack_type) else {
            return DamageResult::default();
        };

        let base = data.damage as i64;
        let bonus_tenths = (combo_count as i64).min(MAX_COMBO_BONUS_TENTHS);
        let combo_bonus = base * bonus_tenths / 10;
        let counter_bonus = if is_counter_hit {
            base * COUNTER_BONUS_PERCENT / 100
        } else {
            0
        };
        let final_damage = base + combo_bonus + counter_bonus;
        let magic_gain = data.magic_gain as i64 + final_damage * MAGIC_FROM_DAMAGE_PERCENT / 100;

        let (hitstun_frames, knockback_x, knockback_y) = if is_counter_hit {
            (
                data.hitstun * 3 / 2,
                data.knockback_x * COUNTER_KNOCKBACK_MULT,
                data.knockback_y * COUNTER_KNOCKBACK_MULT,
            )
        } else {
            (data.hitstun, data.knockback_x, data.knockback_y)
        };

        DamageResult {
            base_damage: data.damage,
            combo_bonus: combo_bonus as i32,
            counter_bonus: counter_bonus as i32,
            final_damage: final_damage as i32,
            magic_gain: magic_gain as i32,
            hitstun_frames,
            knockback_x,
            knockback_y,
            causes_knockdown: attack_type.forces_knockdown()
                || combo_count >= KNOCKDOWN_COMBO_THRESHOLD,
            is_counter_hit,
        }
    }

    /// Chip damage, blockstun and pushback for a blocked attack. Independent of combo.
    pub fn calculate_blocked(attack_type: AttackType) -> BlockResult {
        let Some(data) = frame_data::get(attack_type) else {
            return BlockResult::default();
        };
        BlockResult {
            chip_damage: data.damage / 10,
            blockstun_frames: data.hitstun * 6 / 10,
            pushback: data.knockback_x * 0.5,
        }
    }

    /// Damage multiplier, in tenths, for a combo of `hit_count` hits
    pub fn combo_scale_tenths(hit_count: u32) -> i64 {
        match hit_count {
            0..=5 => 10,
            6..=10 => 9,
            11..=15 => 8,
            16..=20 => 7,
            _ => 6,
        }
    }

    /// Secondary scaling pass for long combos. Touches only final damage and combo bonus.
    pub fn apply_combo_scaling(result: DamageResult, hit_count: u32) -> DamageResult {
        let scale = Self::combo_scale_tenths(hit_count);
        DamageResult {
            final_damage: (result.final_damage as i64 * scale / 10) as i32,
            combo_bonus: (result.combo_bonus as i64 * scale / 10) as i32,
            ..result
        }
    }

    pub fn magic_cost(attack_type: AttackType) -> i32 {
        match attack_type {
            AttackType::Special => SPECIAL_MAGIC_COST,
            _ => 0,
        }
    }

    pub fn can_afford(attack_type: AttackType, current_magic: i32) -> bool {
        current_magic >= Self::magic_cost(attack_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_1_fresh_hit() {
        let r = DamageCalculator::calculate(AttackType::Light1, 0, false);
        assert_eq!(r.base_damage, 25);
        assert_eq!(r.combo_bonus, 0);
        assert_eq!(r.final_damage, 25);
        assert_eq!(r.magic_gain, 5);
        assert_eq!(r.hitstun_frames, 12);
        assert!(!r.causes_knockdown);
    }

    #[test]
    fn test_combo_bonus_caps_at_half() {
        let r = DamageCalculator::calculate(AttackType::Light1, 5, false);
        assert_eq!(r.combo_bonus, 12);
        assert_eq!(r.final_damage, 37);

        let r = DamageCalculator::calculate(AttackType::Light1, 9, false);
        assert_eq!(r.combo_bonus, 12);
    }

    #[test]
    fn test_counter_hit_bonus() {
        let r = DamageCalculator::calculate(AttackType::Heavy, 0, true);
        assert_eq!(r.counter_bonus, 15);
        assert_eq!(r.final_damage, 75);
        assert_eq!(r.hitstun_frames, 33);
        assert_eq!(r.knockback_x, 17.5);
        assert_eq!(r.knockback_y, -7.5);
        assert_eq!(r.magic_gain, 10 + 1);
        assert!(r.is_counter_hit);
    }

    #[test]
    fn test_blocked_heavy() {
        let b = DamageCalculator::calculate_blocked(AttackType::Heavy);
        assert_eq!(b.chip_damage, 6);
        assert_eq!(b.blockstun_frames, 13);
        assert_eq!(b.pushback, 7.0);
    }

    #[test]
    fn test_forced_knockdown_attacks() {
        for t in AttackType::ALL {
            let r = DamageCalculator::calculate(t, 0, false);
            assert_eq!(r.causes_knockdown, t.forces_knockdown(), "{t}");
        }
        for t in [AttackType::Light4, AttackType::Heavy, AttackType::Special, AttackType::AirHeavy] {
            assert!(DamageCalculator::calculate(t, 0, false).causes_knockdown);
        }
    }

    #[test]
    fn test_long_combo_forces_knockdown() {
        assert!(!DamageCalculator::calculate(AttackType::Light1, 5, false).causes_knockdown);
        assert!(DamageCalculator::calculate(AttackType::Light1, 6, false).causes_knockdown);
        assert!(DamageCalculator::calculate(AttackType::AirLight, 12, false).causes_knockdown);
    }

    #[test]
    fn test_combo_scaling_tiers() {
        let r = DamageCalculator::calculate(AttackType::Light1, 5, false);
        assert_eq!(DamageCalculator::apply_combo_scaling(r, 5), r);

        let scaled = DamageCalculator::apply_combo_scaling(r, 8);
        assert_eq!(scaled.final_damage, 33);
        assert_eq!(scaled.combo_bonus, 10);
        assert_eq!(scaled.base_damage, 25);
        assert_eq!(scaled.magic_gain, r.magic_gain);

        assert_eq!(DamageCalculator::combo_scale_tenths(15), 8);
        assert_eq!(DamageCalculator::combo_scale_tenths(20), 7);
        assert_eq!(DamageCalculator::combo_scale_tenths(21), 6);
    }

    #[test]
    fn test_special_cost() {
        assert!(!DamageCalculator::can_afford(AttackType::Special, 49));
        assert!(DamageCalculator::can_afford(AttackType::Special, 50));
        assert!(DamageCalculator::can_afford(AttackType::Heavy, 0));
    }
}
