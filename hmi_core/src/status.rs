//! Controller status model and the write-safety whitelist.

use serde::Serialize;

use crate::error::BridgeError;
use crate::params::bounded;

/// Longest state name kept in `Status` (24-byte C buffer minus terminator).
pub const STATE_NAME_MAX: usize = 23;
/// Longest error message kept in `Status` (64-byte C buffer minus terminator).
pub const ERROR_MESSAGE_MAX: usize = 63;

/// Machine states the bridge reasons about. Anything else is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MachineState {
    InitHeating,
    InitHotWait,
    Refill,
    ReadyToInject,
    PurgeZero,
    ConfirmRemoval,
    #[default]
    Unknown,
}

impl MachineState {
    pub const KNOWN: [MachineState; 6] = [
        MachineState::InitHeating,
        MachineState::InitHotWait,
        MachineState::Refill,
        MachineState::ReadyToInject,
        MachineState::PurgeZero,
        MachineState::ConfirmRemoval,
    ];

    /// Case-insensitive parse of a controller state name.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        Self::KNOWN
            .into_iter()
            .find(|s| s.wire_name().eq_ignore_ascii_case(name))
            .unwrap_or(MachineState::Unknown)
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            MachineState::InitHeating => "INIT_HEATING",
            MachineState::InitHotWait => "INIT_HOT_WAIT",
            MachineState::Refill => "REFILL",
            MachineState::ReadyToInject => "READY_TO_INJECT",
            MachineState::PurgeZero => "PURGE_ZERO",
            MachineState::ConfirmRemoval => "CONFIRM_REMOVAL",
            MachineState::Unknown => "UNKNOWN",
        }
    }
}

/// Latest telemetry reported by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Status {
    pub position_turns: f32,
    pub temperature_c: f32,
    /// Raw state name as received, for display.
    pub state_name: String,
    pub state: MachineState,
    pub error_code: u16,
    pub error_message: String,
}

impl Status {
    /// Store a reported state name (truncated) and its parsed value.
    pub fn set_state(&mut self, name: &str) {
        self.state_name = bounded(name, STATE_NAME_MAX);
        self.state = MachineState::parse(&self.state_name);
    }

    pub fn set_error_message(&mut self, msg: &str) {
        self.error_message = bounded(msg, ERROR_MESSAGE_MAX);
    }
}

/// States during which `MOULD` / `COMMON` writes may be transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyWhitelist {
    states: Vec<MachineState>,
}

impl Default for SafetyWhitelist {
    fn default() -> Self {
        Self {
            states: MachineState::KNOWN.to_vec(),
        }
    }
}

impl SafetyWhitelist {
    pub fn new(states: impl IntoIterator<Item = MachineState>) -> Self {
        let mut v: Vec<MachineState> = Vec::new();
        for s in states {
            if s != MachineState::Unknown && !v.contains(&s) {
                v.push(s);
            }
        }
        Self { states: v }
    }

    /// Build from configured state names. Names that are not known machine
    /// states are rejected so a typo cannot silently narrow the whitelist.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, BridgeError> {
        let mut states = Vec::with_capacity(names.len());
        for n in names {
            let s = MachineState::parse(n.as_ref());
            if s == MachineState::Unknown {
                return Err(BridgeError::Config(format!(
                    "unknown machine state in whitelist: {:?}",
                    n.as_ref()
                )));
            }
            states.push(s);
        }
        Ok(Self::new(states))
    }

    pub fn allows(&self, state: MachineState) -> bool {
        self.states.contains(&state)
    }

    /// True iff `name` case-insensitively equals a whitelisted state name.
    pub fn is_safe_name(&self, name: &str) -> bool {
        self.allows(MachineState::parse(name))
    }

    pub fn states(&self) -> &[MachineState] {
        &self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("REFILL", MachineState::Refill)]
    #[case("refill", MachineState::Refill)]
    #[case("Ready_To_Inject", MachineState::ReadyToInject)]
    #[case("  PURGE_ZERO ", MachineState::PurgeZero)]
    #[case("INJECTING", MachineState::Unknown)]
    #[case("", MachineState::Unknown)]
    fn parses_state_names(#[case] name: &str, #[case] expected: MachineState) {
        assert_eq!(MachineState::parse(name), expected);
    }

    #[rstest]
    #[case("INIT_HEATING", true)]
    #[case("init_hot_wait", true)]
    #[case("Refill", true)]
    #[case("READY_TO_INJECT", true)]
    #[case("purge_zero", true)]
    #[case("CONFIRM_REMOVAL", true)]
    #[case("", false)]
    #[case("INJECT", false)]
    #[case("REFILLING", false)]
    fn default_whitelist_matches_six_states(#[case] name: &str, #[case] safe: bool) {
        assert_eq!(SafetyWhitelist::default().is_safe_name(name), safe);
    }

    #[test]
    fn from_names_rejects_unknown_states() {
        let err = SafetyWhitelist::from_names(&["REFILL", "BOGUS"]).unwrap_err();
        assert!(err.to_string().contains("BOGUS"));
        let wl = SafetyWhitelist::from_names(&["refill", "REFILL"]).unwrap();
        assert_eq!(wl.states(), &[MachineState::Refill]);
        assert!(!wl.allows(MachineState::ReadyToInject));
    }

    #[test]
    fn status_truncates_names_to_buffer_bounds() {
        let mut s = Status::default();
        s.set_state(&"R".repeat(40));
        assert_eq!(s.state_name.len(), STATE_NAME_MAX);
        assert_eq!(s.state, MachineState::Unknown);
        s.set_error_message(&"e".repeat(100));
        assert_eq!(s.error_message.len(), ERROR_MESSAGE_MAX);
    }
}
