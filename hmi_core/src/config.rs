//! Runtime configuration types for the bridge.
//!
//! These are separate from the TOML-deserialized config in `hmi_config`;
//! see `conversions` for the mapping.

/// Material ledger tuning. All distances are encoder turns.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCfg {
    /// Encoder reading with the plunger at the bottom of the barrel.
    pub max_travel_turns: f32,
    /// Encoder reading at which the plunger volume reads zero.
    pub plunger_zero_turns: f32,
    /// Inferred refills must exceed this to become a block.
    pub refill_epsilon: f32,
    /// Movement at or below this is jitter. Also ends the drain loop.
    pub consume_epsilon: f32,
    /// Movement at or above this is a sensor jump, not consumption.
    pub consume_ceiling: f32,
    pub capacity: usize,
}

impl Default for LedgerCfg {
    fn default() -> Self {
        Self {
            max_travel_turns: 360.5,
            plunger_zero_turns: 22.53,
            refill_epsilon: 0.5,
            consume_epsilon: 0.001,
            consume_ceiling: 100.0,
            capacity: 16,
        }
    }
}

/// Profile file names and limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCfg {
    pub profiles_file: String,
    pub temp_file: String,
    pub max_profiles: usize,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            profiles_file: "moulds.bin".to_string(),
            temp_file: "moulds.tmp".to_string(),
            max_profiles: 16,
        }
    }
}

/// Polling loop behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCfg {
    pub poll_hz: u32,
    pub background_save: bool,
    pub query_on_start: bool,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            poll_hz: 200,
            background_save: false,
            query_on_start: true,
        }
    }
}
