//! Attack frame data - the authoritative timing/damage table
//!
//! Every number in [`FRAME_DATA`] is part of the bot protocol. Changing any
//! startup/active/recovery/damage/knockback value is a breaking change and must
//! bump [`FRAME_DATA_VERSION`].

use serde::{Deserialize, Serialize};

/// Version of the frame-data contract exposed to bot authors
pub const FRAME_DATA_VERSION: u32 = 1;

/// Attack types in the fixed roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttackType {
    #[serde(rename = "light_1")]
    Light1,
    #[serde(rename = "light_2")]
    Light2,
    #[serde(rename = "light_3")]
    Light3,
    #[serde(rename = "light_4")]
    Light4,
    #[serde(rename = "heavy")]
    Heavy,
    #[serde(rename = "air_light")]
    AirLight,
    #[serde(rename = "air_heavy")]
    AirHeavy,
    #[serde(rename = "special")]
    Special,
}

impl AttackType {
    pub const ALL: [AttackType; 8] = [
        AttackType::Light1,
        AttackType::Light2,
        AttackType::Light3,
        AttackType::Light4,
        AttackType::Heavy,
        AttackType::AirLight,
        AttackType::AirHeavy,
        AttackType::Special,
    ];

    /// Wire name of the attack type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light1 => "light_1",
            Self::Light2 => "light_2",
            Self::Light3 => "light_3",
            Self::Light4 => "light_4",
            Self::Heavy => "heavy",
            Self::AirLight => "air_light",
            Self::AirHeavy => "air_heavy",
            Self::Special => "special",
        }
    }

    /// Attacks that always knock the defender down
    pub fn forces_knockdown(&self) -> bool {
        matches!(
            self,
            Self::Light4 | Self::Heavy | Self::Special | Self::AirHeavy
        )
    }
}

impl std::fmt::Display for AttackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hitbox geometry relative to the fighter's feet, for a right-facing fighter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitboxData {
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Immutable per-attack constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttackFrameData {
    pub startup: u32,
    pub active: u32,
    pub recovery: u32,
    pub damage: i32,
    pub hitstun: u32,
    pub knockback_x: f32,
    pub knockback_y: f32,
    pub magic_gain: i32,
    pub can_chain: bool,
    pub chain_window: u32,
    /// Attacks this one may be cancelled into while chaining
    pub chains_into: &'static [AttackType],
    pub hitbox: HitboxData,
}

impl AttackFrameData {
    pub fn total_frames(&self) -> u32 {
        self.startup + self.active + self.recovery
    }
}

const fn hitbox(width: f32, height: f32, offset_x: f32, offset_y: f32) -> HitboxData {
    HitboxData {
        width,
        height,
        offset_x,
        offset_y,
    }
}

/// The frame-data table
pub static FRAME_DATA: &[(AttackType, AttackFrameData)] = &[
    (
        AttackType::Light1,
        AttackFrameData {
            startup: 4,
            active: 4,
            recovery: 8,
            damage: 25,
            hitstun: 12,
            knockback_x: 3.0,
            knockback_y: 0.0,
            magic_gain: 5,
            can_chain: true,
            chain_window: 12,
            chains_into: &[AttackType::Light2],
            hitbox: hitbox(60.0, 40.0, 20.0, -100.0),
        },
    ),
    (
        AttackType::Light2,
        AttackFrameData {
            startup: 5,
            active: 4,
            recovery: 9,
            damage: 30,
            hitstun: 14,
            knockback_x: 4.0,
            knockback_y: 0.0,
            magic_gain: 5,
            can_chain: true,
            chain_window: 12,
            chains_into: &[AttackType::Light3, AttackType::Special],
            hitbox: hitbox(65.0, 40.0, 20.0, -100.0),
        },
    ),
    (
        AttackType::Light3,
        AttackFrameData {
            startup: 6,
            active: 5,
            recovery: 10,
            damage: 35,
            hitstun: 16,
            knockback_x: 5.0,
            knockback_y: -2.0,
            magic_gain: 6,
            can_chain: true,
            chain_window: 14,
            chains_into: &[AttackType::Light4, AttackType::Heavy],
            hitbox: hitbox(70.0, 45.0, 20.0, -105.0),
        },
    ),
    (
        AttackType::Light4,
        AttackFrameData {
            startup: 8,
            active: 5,
            recovery: 16,
            damage: 45,
            hitstun: 20,
            knockback_x: 10.0,
            knockback_y: -8.0,
            magic_gain: 8,
            can_chain: false,
            chain_window: 0,
            chains_into: &[],
            hitbox: hitbox(80.0, 50.0, 20.0, -110.0),
        },
    ),
    (
        AttackType::Heavy,
        AttackFrameData {
            startup: 12,
            active: 6,
            recovery: 20,
            damage: 60,
            hitstun: 22,
            knockback_x: 14.0,
            knockback_y: -6.0,
            magic_gain: 10,
            can_chain: false,
            chain_window: 0,
            chains_into: &[],
            hitbox: hitbox(90.0, 60.0, 25.0, -110.0),
        },
    ),
    (
        AttackType::AirLight,
        AttackFrameData {
            startup: 4,
            active: 5,
            recovery: 8,
            damage: 20,
            hitstun: 12,
            knockback_x: 3.0,
            knockback_y: 2.0,
            magic_gain: 4,
            can_chain: true,
            chain_window: 10,
            chains_into: &[AttackType::AirLight, AttackType::AirHeavy],
            hitbox: hitbox(60.0, 50.0, 15.0, -90.0),
        },
    ),
    (
        AttackType::AirHeavy,
        AttackFrameData {
            startup: 10,
            active: 6,
            recovery: 16,
            damage: 50,
            hitstun: 20,
            knockback_x: 8.0,
            knockback_y: 10.0,
            magic_gain: 8,
            can_chain: false,
            chain_window: 0,
            chains_into: &[],
            hitbox: hitbox(80.0, 60.0, 15.0, -80.0),
        },
    ),
    (
        AttackType::Special,
        AttackFrameData {
            startup: 15,
            active: 8,
            recovery: 25,
            damage: 120,
            hitstun: 30,
            knockback_x: 20.0,
            knockback_y: -12.0,
            magic_gain: 0,
            can_chain: false,
            chain_window: 0,
            chains_into: &[],
            hitbox: hitbox(150.0, 80.0, 20.0, -120.0),
        },
    ),
];

/// Look up an attack's frame data
pub fn get(attack_type: AttackType) -> Option<&'static AttackFrameData> {
    FRAME_DATA
        .iter()
        .find(|(t, _)| *t == attack_type)
        .map(|(_, data)| data)
}

/// Attack types with no table entry
pub fn missing_entries() -> Vec<AttackType> {
    AttackType::ALL
        .into_iter()
        .filter(|t| get(*t).is_none())
        .collect()
}

/// Closed interval of local frames during which the hitbox is live.
/// Absent entries yield `None`.
pub fn get_active_frame_range(attack_type: AttackType) -> Option<(u32, u32)> {
    get(attack_type).map(|d| (d.startup, d.startup + d.active.max(1) - 1))
}

pub fn is_attack_active_at_frame(attack_type: AttackType, frame: u32) -> bool {
    get_active_frame_range(attack_type)
        .map(|(start, end)| frame >= start && frame <= end)
        .unwrap_or(false)
}

/// Frames from attack start until the fighter recovers (0 when absent)
pub fn total_duration(attack_type: AttackType) -> u32 {
    get(attack_type).map(|d| d.total_frames()).unwrap_or(0)
}

/// True while `frame` is still inside the attack's startup
pub fn is_in_startup(attack_type: AttackType, frame: u32) -> bool {
    get(attack_type).map(|d| frame < d.startup).unwrap_or(false)
}

/// Whether `from` may be cancelled into `to`
pub fn can_chain_into(from: AttackType, to: AttackType) -> bool {
    get(from)
        .map(|d| d.can_chain && d.chains_into.contains(&to))
        .unwrap_or(false)
}

/// Combo window after a hit with this attack: hitstun + 5 (5 when absent)
pub fn combo_window(attack_type: Option<AttackType>) -> u32 {
    attack_type
        .and_then(get)
        .map(|d| d.hitstun)
        .unwrap_or(0)
        + 5
}

/// Next link in the ground light string
pub fn next_light_attack(current: Option<AttackType>) -> AttackType {
    match current {
        Some(AttackType::Light1) => AttackType::Light2,
        Some(AttackType::Light2) => AttackType::Light3,
        Some(AttackType::Light3) => AttackType::Light4,
        _ => AttackType::Light1,
    }
}
