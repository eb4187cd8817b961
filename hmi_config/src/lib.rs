#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and profile CSV import for the HMI bridge.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a valid config.
//! - The profile CSV loader enforces exact headers and reports the first bad row.
use std::path::PathBuf;

use serde::Deserialize;

/// Serial link to the motor controller.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    /// UART device node (hardware builds only)
    pub device: PathBuf,
    pub baud: u32,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/serial0"),
            baud: 115_200,
        }
    }
}

/// Profile persistence on the flash partition.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    /// Mount directory of the flash filesystem
    pub dir: PathBuf,
    pub profiles_file: String,
    /// Scratch file used for atomic commits
    pub temp_file: String,
    /// Profile limit, including the mirrored active profile in slot 0
    pub max_profiles: usize,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("flash"),
            profiles_file: "moulds.bin".to_string(),
            temp_file: "moulds.tmp".to_string(),
            max_profiles: 16,
        }
    }
}

/// Material ledger tuning. All distances are encoder turns.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LedgerCfg {
    /// Encoder reading with the plunger at the bottom of the barrel
    pub max_travel_turns: f32,
    /// Encoder reading with the plunger tip at the top of the barrel
    pub plunger_zero_turns: f32,
    /// Inferred refills at or below this volume are ignored as noise
    pub refill_epsilon: f32,
    /// Per-tick movement at or below this is treated as jitter
    pub consume_epsilon: f32,
    /// Per-tick movement at or above this is treated as a sensor jump
    pub consume_ceiling: f32,
    /// Maximum number of tracked refill blocks
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

/// Machine states during which MOULD/COMMON writes may be sent.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SafetyCfg {
    pub writable_states: Vec<String>,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            writable_states: [
                "INIT_HEATING",
                "INIT_HOT_WAIT",
                "REFILL",
                "READY_TO_INJECT",
                "PURGE_ZERO",
                "CONFIRM_REMOVAL",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Polling loop rate
    pub poll_hz: u32,
    /// Persist profiles on a background thread instead of inside the tick
    pub background_save: bool,
    /// Send QUERY_STATE / QUERY_MOULD / QUERY_COMMON when the loop starts
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub storage: StorageCfg,
    pub ledger: LedgerCfg,
    pub safety: SafetyCfg,
    pub runner: RunnerCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Profile CSV schema, one row per profile in wire field order.
///
/// Expected headers:
/// name,fill_volume,fill_speed,fill_pressure,pack_volume,pack_speed,pack_pressure,
/// pack_time,cooling_time,fill_accel,fill_decel,pack_accel,pack_decel,mode,inject_torque
#[derive(Debug, Deserialize, Clone)]
pub struct ProfileRow {
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

pub const PROFILE_CSV_HEADERS: [&str; 15] = [
    "name",
    "fill_volume",
    "fill_speed",
    "fill_pressure",
    "pack_volume",
    "pack_speed",
    "pack_pressure",
    "pack_time",
    "cooling_time",
    "fill_accel",
    "fill_decel",
    "pack_accel",
    "pack_decel",
    "mode",
    "inject_torque",
];

pub fn load_profiles_csv(path: &std::path::Path) -> eyre::Result<Vec<ProfileRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open profile CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != PROFILE_CSV_HEADERS {
        eyre::bail!(
            "profile CSV must have headers '{}', got: {}",
            PROFILE_CSV_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ProfileRow>().enumerate() {
        match rec {
            Ok(row) => {
                if !matches!(row.mode.to_ascii_uppercase().as_str(), "2D" | "3D") {
                    eyre::bail!("invalid CSV row {}: mode must be 2D or 3D", idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }

        // Storage
        if self.storage.profiles_file.trim().is_empty() {
            eyre::bail!("storage.profiles_file must not be empty");
        }
        if self.storage.temp_file.trim().is_empty() {
            eyre::bail!("storage.temp_file must not be empty");
        }
        if self.storage.profiles_file == self.storage.temp_file {
            eyre::bail!("storage.temp_file must differ from storage.profiles_file");
        }
        if !(1..=64).contains(&self.storage.max_profiles) {
            eyre::bail!("storage.max_profiles must be in [1, 64]");
        }

        // Ledger
        let l = &self.ledger;
        if !(l.max_travel_turns.is_finite() && l.max_travel_turns > 0.0) {
            eyre::bail!("ledger.max_travel_turns must be finite and > 0");
        }
        if !l.plunger_zero_turns.is_finite() || l.plunger_zero_turns < 0.0 {
            eyre::bail!("ledger.plunger_zero_turns must be finite and >= 0");
        }
        if l.plunger_zero_turns >= l.max_travel_turns {
            eyre::bail!("ledger.plunger_zero_turns must be < ledger.max_travel_turns");
        }
        if !l.refill_epsilon.is_finite() || l.refill_epsilon < 0.0 {
            eyre::bail!("ledger.refill_epsilon must be >= 0");
        }
        if !l.consume_epsilon.is_finite() || l.consume_epsilon < 0.0 {
            eyre::bail!("ledger.consume_epsilon must be >= 0");
        }
        if !(l.consume_ceiling.is_finite() && l.consume_ceiling > l.consume_epsilon) {
            eyre::bail!("ledger.consume_ceiling must be > ledger.consume_epsilon");
        }
        if !(1..=16).contains(&l.capacity) {
            eyre::bail!("ledger.capacity must be in [1, 16]");
        }

        // Safety
        if self.safety.writable_states.is_empty() {
            eyre::bail!("safety.writable_states must list at least one state");
        }
        for (i, name) in self.safety.writable_states.iter().enumerate() {
            if name.trim().is_empty() {
                eyre::bail!("safety.writable_states[{i}] must not be empty");
            }
            if name.contains('|') {
                eyre::bail!("safety.writable_states[{i}] must not contain '|'");
            }
        }

        // Runner
        if self.runner.poll_hz == 0 {
            eyre::bail!("runner.poll_hz must be > 0");
        }
        if self.runner.poll_hz > 10_000 {
            eyre::bail!("runner.poll_hz is unreasonably large (>10kHz)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
