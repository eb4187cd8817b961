#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core of the HMI bridge (hardware-agnostic).
//!
//! All hardware interactions go through `hmi_traits::SerialLink`,
//! `hmi_traits::FlashFs` and `hmi_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Status**: controller telemetry and the write-safety whitelist (`status`)
//! - **Codec**: bounded line receive, keyword dispatch, gated sends (`codec`)
//! - **Ledger**: refill blocks inferred from encoder position and state edges (`ledger`)
//! - **Store**: fixed-layout profile records with atomic commit (`store`)
//! - **Profiles**: operator-facing profile list with a mirrored slot 0 (`profiles`)
//! - **Bridge**: the context one polling loop drives (`runner`, `builder`)
//!
//! Everything runs on the polling thread except the optional `SaveWorker`,
//! which moves flash writes to a dedicated thread.

pub mod builder;
pub mod codec;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod ledger;
pub mod mocks;
pub mod params;
pub mod profiles;
pub mod runner;
pub mod status;
pub mod storage_worker;
pub mod store;
pub mod util;

pub use builder::{BridgeBuilder, Missing, Set};
pub use codec::{ControllerModel, InboundCommand, LineCodec, MockCommand, Query, Received};
pub use config::{LedgerCfg, RunnerCfg, StoreCfg};
pub use error::{BridgeError, BuildError, ProfileError, Result, SendError, StoreError};
pub use ledger::{MaterialLedger, RefillBlock, RefillOutcome, TickReport};
pub use params::{CommonParams, MouldParams, ProfileMode};
pub use profiles::ProfileBook;
pub use runner::{Bridge, Snapshot, TickSummary};
pub use status::{MachineState, SafetyWhitelist, Status};
pub use storage_worker::{SaveOutcome, SaveWorker};
pub use store::ProfileStore;
