//! Parameter records exchanged with the controller and stored in flash.

use serde::Serialize;

/// Longest profile name in bytes (32-byte C buffer minus terminator).
pub const NAME_MAX: usize = 31;
/// Longest mode tag in bytes ("2D" / "3D").
pub const MODE_MAX: usize = 2;

/// Number of `|`-separated fields in `MOULD` / `MOULD_OK`.
pub const MOULD_FIELD_COUNT: usize = 15;
/// Number of `|`-separated fields in `COMMON` / `COMMON_OK`.
pub const COMMON_FIELD_COUNT: usize = 14;

/// Injection mode of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileMode {
    TwoD,
    ThreeD,
}

impl ProfileMode {
    pub fn parse(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("2D") {
            Some(ProfileMode::TwoD)
        } else if tag.eq_ignore_ascii_case("3D") {
            Some(ProfileMode::ThreeD)
        } else {
            None
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ProfileMode::TwoD => "2D",
            ProfileMode::ThreeD => "3D",
        }
    }
}

/// A named injection profile.
///
/// Field order matches the wire order of `MOULD_OK` / `MOULD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MouldParams {
    pub name: String,
    pub fill_volume: f32,
    pub fill_speed: f32,
    pub fill_pressure: f32,
    pub pack_volume: f32,
    pub pack_speed: f32,
    pub pack_pressure: f32,
    pub pack_time: f32,
    pub cooling_time: f32,
    pub fill_accel: f32,
    pub fill_decel: f32,
    pub pack_accel: f32,
    pub pack_decel: f32,
    pub mode: String,
    pub inject_torque: f32,
}

impl MouldParams {
    /// Fresh local profile with the stock starting values.
    pub fn local(number: usize) -> Self {
        Self {
            name: format!("Local {number}"),
            fill_volume: 10.0,
            fill_speed: 5.0,
            fill_pressure: 50.0,
            pack_volume: 2.0,
            pack_speed: 2.0,
            pack_pressure: 40.0,
            pack_time: 2.0,
            cooling_time: 5.0,
            fill_accel: 100.0,
            fill_decel: 100.0,
            pack_accel: 100.0,
            pack_decel: 100.0,
            mode: ProfileMode::TwoD.tag().to_string(),
            inject_torque: 0.5,
        }
    }

    /// Placeholder shown until the controller reports its active profile.
    pub fn awaiting_controller() -> Self {
        Self {
            name: "Awaiting QUERY_MOULD".to_string(),
            ..Self::default()
        }
    }

    pub fn mode_kind(&self) -> Option<ProfileMode> {
        ProfileMode::parse(&self.mode)
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = bounded(name, NAME_MAX);
    }

    pub fn set_mode(&mut self, mode: &str) {
        self.mode = bounded(mode, MODE_MAX);
    }

    /// The twelve motion/timing values in wire order (fields 1..=12).
    pub fn motion_values(&self) -> [f32; 12] {
        [
            self.fill_volume,
            self.fill_speed,
            self.fill_pressure,
            self.pack_volume,
            self.pack_speed,
            self.pack_pressure,
            self.pack_time,
            self.cooling_time,
            self.fill_accel,
            self.fill_decel,
            self.pack_accel,
            self.pack_decel,
        ]
    }

    /// Mutable access to motion value `i` (0-based within fields 1..=12).
    pub(crate) fn motion_value_mut(&mut self, i: usize) -> Option<&mut f32> {
        Some(match i {
            0 => &mut self.fill_volume,
            1 => &mut self.fill_speed,
            2 => &mut self.fill_pressure,
            3 => &mut self.pack_volume,
            4 => &mut self.pack_speed,
            5 => &mut self.pack_pressure,
            6 => &mut self.pack_time,
            7 => &mut self.cooling_time,
            8 => &mut self.fill_accel,
            9 => &mut self.fill_decel,
            10 => &mut self.pack_accel,
            11 => &mut self.pack_decel,
            _ => return None,
        })
    }
}

/// Machine-wide tuning values. A single instance, not a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CommonParams {
    pub trap_accel: f32,
    pub compress_torque: f32,
    pub micro_interval_ms: u32,
    pub micro_duration_ms: u32,
    pub purge_up: f32,
    pub purge_down: f32,
    pub purge_current: f32,
    pub antidrip_vel: f32,
    pub antidrip_current: f32,
    pub release_dist: f32,
    pub release_trap_vel: f32,
    pub release_current: f32,
    pub contactor_cycles: u32,
    pub contactor_limit: u32,
}

/// One `COMMON` field, typed by its wire representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommonField {
    Float(f32),
    Count(u32),
}

impl CommonParams {
    /// All fourteen values in wire order.
    pub fn fields(&self) -> [CommonField; COMMON_FIELD_COUNT] {
        use CommonField::{Count, Float};
        [
            Float(self.trap_accel),
            Float(self.compress_torque),
            Count(self.micro_interval_ms),
            Count(self.micro_duration_ms),
            Float(self.purge_up),
            Float(self.purge_down),
            Float(self.purge_current),
            Float(self.antidrip_vel),
            Float(self.antidrip_current),
            Float(self.release_dist),
            Float(self.release_trap_vel),
            Float(self.release_current),
            Count(self.contactor_cycles),
            Count(self.contactor_limit),
        ]
    }

    /// Whether wire field `i` carries an unsigned integer.
    pub fn is_count_field(i: usize) -> bool {
        matches!(i, 2 | 3 | 12 | 13)
    }

    pub(crate) fn float_mut(&mut self, i: usize) -> Option<&mut f32> {
        Some(match i {
            0 => &mut self.trap_accel,
            1 => &mut self.compress_torque,
            4 => &mut self.purge_up,
            5 => &mut self.purge_down,
            6 => &mut self.purge_current,
            7 => &mut self.antidrip_vel,
            8 => &mut self.antidrip_current,
            9 => &mut self.release_dist,
            10 => &mut self.release_trap_vel,
            11 => &mut self.release_current,
            _ => return None,
        })
    }

    pub(crate) fn count_mut(&mut self, i: usize) -> Option<&mut u32> {
        Some(match i {
            2 => &mut self.micro_interval_ms,
            3 => &mut self.micro_duration_ms,
            12 => &mut self.contactor_cycles,
            13 => &mut self.contactor_limit,
            _ => return None,
        })
    }
}

/// Copy of `s` cut to at most `max` bytes without splitting a character.
pub fn bounded(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
