//! Type-state builder for `Bridge`.
//!
//! The builder enforces at compile time that a serial link and a flash
//! filesystem are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;

use hmi_traits::clock::{Clock, MonotonicClock};
use hmi_traits::{FlashFs, SerialLink};

use crate::codec::LineCodec;
use crate::config::{LedgerCfg, RunnerCfg, StoreCfg};
use crate::error::{BuildError, Result};
use crate::ledger::MaterialLedger;
use crate::profiles::ProfileBook;
use crate::runner::{Bridge, DynFs, Persistence};
use crate::status::SafetyWhitelist;
use crate::storage_worker::SaveWorker;
use crate::store::ProfileStore;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Bridge`. All fields are validated on `build()`.
pub struct BridgeBuilder<L, S> {
    link: Option<Box<dyn SerialLink>>,
    fs: Option<DynFs>,
    ledger: Option<LedgerCfg>,
    store: Option<StoreCfg>,
    runner: Option<RunnerCfg>,
    whitelist: Option<SafetyWhitelist>,
    clock: Option<Box<dyn Clock>>,
    _l: PhantomData<L>,
    _s: PhantomData<S>,
}

impl Default for BridgeBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            fs: None,
            ledger: None,
            store: None,
            runner: None,
            whitelist: None,
            clock: None,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

impl Bridge {
    /// Start building a Bridge.
    pub fn builder() -> BridgeBuilder<Missing, Missing> {
        BridgeBuilder::default()
    }
}

/// Validate configuration and assemble a `Bridge`, loading stored profiles.
fn validate_and_build(
    link: Box<dyn SerialLink>,
    fs: DynFs,
    ledger: LedgerCfg,
    store: StoreCfg,
    runner: RunnerCfg,
    whitelist: SafetyWhitelist,
    clock: Box<dyn Clock>,
) -> Result<Bridge> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !(ledger.max_travel_turns.is_finite() && ledger.max_travel_turns > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_travel_turns must be finite and > 0",
        )));
    }
    if ledger.refill_epsilon.is_sign_negative() || ledger.consume_epsilon.is_sign_negative() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "ledger epsilons must be >= 0",
        )));
    }
    if ledger.consume_ceiling <= ledger.consume_epsilon {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "consume_ceiling must exceed consume_epsilon",
        )));
    }
    if ledger.capacity == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "ledger capacity must be > 0",
        )));
    }
    if store.max_profiles == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_profiles must be > 0",
        )));
    }
    if store.profiles_file == store.temp_file {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "temp file must differ from profile file",
        )));
    }
    if runner.poll_hz == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "poll_hz must be > 0",
        )));
    }
    if whitelist.states().is_empty() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "safety whitelist must not be empty",
        )));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let limit = store.max_profiles;
    let store = ProfileStore::new(fs, store);
    let book = ProfileBook::from_loaded(store.load(), limit);
    let persistence = if runner.background_save {
        Persistence::Background(SaveWorker::spawn(store))
    } else {
        Persistence::Inline(store)
    };
    tracing::info!(
        profiles = book.len(),
        background_save = runner.background_save,
        poll_hz = runner.poll_hz,
        "bridge ready"
    );

    Ok(Bridge::assemble(
        link,
        LineCodec::new(whitelist),
        MaterialLedger::new(ledger),
        book,
        persistence,
        clock,
        runner,
    ))
}

impl<L, S> BridgeBuilder<L, S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Bridge> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let fs = self
            .fs
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStorage))?;
        validate_and_build(
            link,
            fs,
            self.ledger.unwrap_or_default(),
            self.store.unwrap_or_default(),
            self.runner.unwrap_or_default(),
            self.whitelist.unwrap_or_default(),
            self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new())),
        )
    }

    pub fn with_ledger(mut self, ledger: LedgerCfg) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_store(mut self, store: StoreCfg) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_runner(mut self, runner: RunnerCfg) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_whitelist(mut self, whitelist: SafetyWhitelist) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }
}

impl<S> BridgeBuilder<Missing, S> {
    pub fn with_link(self, link: impl SerialLink + 'static) -> BridgeBuilder<Set, S> {
        BridgeBuilder {
            link: Some(Box::new(link)),
            fs: self.fs,
            ledger: self.ledger,
            store: self.store,
            runner: self.runner,
            whitelist: self.whitelist,
            clock: self.clock,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<L> BridgeBuilder<L, Missing> {
    pub fn with_storage(self, fs: impl FlashFs + Send + 'static) -> BridgeBuilder<L, Set> {
        BridgeBuilder {
            link: self.link,
            fs: Some(Box::new(fs)),
            ledger: self.ledger,
            store: self.store,
            runner: self.runner,
            whitelist: self.whitelist,
            clock: self.clock,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

impl BridgeBuilder<Set, Set> {
    /// Validate and build the Bridge. Only available when link and storage are set.
    pub fn build(self) -> Result<Bridge> {
        self.try_build()
    }
}
