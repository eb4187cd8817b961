//! `From` implementations bridging `hmi_config` types to `hmi_core` types.

use crate::config::{LedgerCfg, RunnerCfg, StoreCfg};
use crate::params::{MODE_MAX, MouldParams, NAME_MAX, bounded};

// ── LedgerCfg ────────────────────────────────────────────────────────────────

impl From<&hmi_config::LedgerCfg> for LedgerCfg {
    fn from(c: &hmi_config::LedgerCfg) -> Self {
        Self {
            max_travel_turns: c.max_travel_turns,
            plunger_zero_turns: c.plunger_zero_turns,
            refill_epsilon: c.refill_epsilon,
            consume_epsilon: c.consume_epsilon,
            consume_ceiling: c.consume_ceiling,
            capacity: c.capacity,
        }
    }
}

// ── StoreCfg ─────────────────────────────────────────────────────────────────

impl From<&hmi_config::StorageCfg> for StoreCfg {
    fn from(c: &hmi_config::StorageCfg) -> Self {
        Self {
            profiles_file: c.profiles_file.clone(),
            temp_file: c.temp_file.clone(),
            max_profiles: c.max_profiles,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

impl From<&hmi_config::RunnerCfg> for RunnerCfg {
    fn from(c: &hmi_config::RunnerCfg) -> Self {
        Self {
            poll_hz: c.poll_hz,
            background_save: c.background_save,
            query_on_start: c.query_on_start,
        }
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────────

impl From<&hmi_config::ProfileRow> for MouldParams {
    fn from(r: &hmi_config::ProfileRow) -> Self {
        Self {
            name: bounded(&r.name, NAME_MAX),
            fill_volume: r.fill_volume,
            fill_speed: r.fill_speed,
            fill_pressure: r.fill_pressure,
            pack_volume: r.pack_volume,
            pack_speed: r.pack_speed,
            pack_pressure: r.pack_pressure,
            pack_time: r.pack_time,
            cooling_time: r.cooling_time,
            fill_accel: r.fill_accel,
            fill_decel: r.fill_decel,
            pack_accel: r.pack_accel,
            pack_decel: r.pack_decel,
            mode: bounded(&r.mode.to_ascii_uppercase(), MODE_MAX),
            inject_torque: r.inject_torque,
        }
    }
}
