//! The bridge context driven by the polling loop.
//!
//! `Bridge` owns the serial link, codec, controller model, material ledger,
//! profile book and persistence. One `tick()` per polling iteration drains the
//! link, applies received lines and advances the ledger. Operator actions go
//! through the profile and send methods.

use std::time::{Duration, Instant};

use hmi_traits::{Clock, FlashFs, SerialLink};
use serde::Serialize;

use crate::codec::{
    ControllerModel, InboundCommand, LINE_CAPACITY, LineCodec, MockCommand, Query, Received,
};
use crate::config::RunnerCfg;
use crate::error::{BridgeError, ProfileError, Result, SendError, StoreError};
use crate::hw_error::map_link_error;
use crate::ledger::{MaterialLedger, RefillBlock, RefillOutcome};
use crate::params::{CommonParams, MouldParams};
use crate::profiles::ProfileBook;
use crate::status::{STATE_NAME_MAX, Status};
use crate::storage_worker::{SaveOutcome, SaveWorker};
use crate::store::ProfileStore;

/// Read chunk size; a full chunk means more bytes may be waiting.
const READ_CHUNK: usize = LINE_CAPACITY * 2;

/// Boxed flash filesystem that can move to the save worker thread.
pub type DynFs = Box<dyn FlashFs + Send>;

pub(crate) enum Persistence {
    Inline(ProfileStore<DynFs>),
    Background(SaveWorker),
}

/// Debug override of position and state.
#[derive(Debug, Clone, Default, PartialEq)]
struct MockOverride {
    position: f32,
    state_name: String,
}

/// What one tick did.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub lines: usize,
    pub refill: Option<RefillOutcome>,
    pub consumed: f32,
    /// Background saves that finished since the previous tick.
    pub saves: Vec<SaveOutcome>,
}

/// Everything the UI layer reflects, in one serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub status: Status,
    pub mould: MouldParams,
    pub common: CommonParams,
    pub blocks: Vec<RefillBlock>,
    pub total_volume: f32,
    pub is_refilling: bool,
    pub safe_for_update: bool,
    pub plunger_volume: f32,
    pub profiles: Vec<String>,
    pub selected: Option<usize>,
    pub mock_active: bool,
}

pub struct Bridge {
    pub(crate) link: Box<dyn SerialLink>,
    pub(crate) codec: LineCodec,
    pub(crate) model: ControllerModel,
    pub(crate) ledger: MaterialLedger,
    pub(crate) book: ProfileBook,
    pub(crate) persistence: Persistence,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) epoch: Instant,
    pub(crate) cfg: RunnerCfg,
    mock: Option<MockOverride>,
}

impl core::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.model.status.state)
            .field("position", &self.model.status.position_turns)
            .field("blocks", &self.ledger.block_count())
            .field("profiles", &self.book.len())
            .field("mock", &self.mock.is_some())
            .finish()
    }
}

impl Bridge {
    pub(crate) fn assemble(
        link: Box<dyn SerialLink>,
        codec: LineCodec,
        ledger: MaterialLedger,
        book: ProfileBook,
        persistence: Persistence,
        clock: Box<dyn Clock>,
        cfg: RunnerCfg,
    ) -> Self {
        let epoch = clock.now();
        Self {
            link,
            codec,
            model: ControllerModel::default(),
            ledger,
            book,
            persistence,
            clock,
            epoch,
            cfg,
            mock: None,
        }
    }

    /// Send the start-up queries when configured to.
    pub fn start(&mut self) -> Result<()> {
        if self.cfg.query_on_start {
            for q in Query::ALL {
                self.query(q)?;
            }
        }
        Ok(())
    }

    /// One polling iteration.
    pub fn tick(&mut self) -> Result<TickSummary> {
        let mut summary = TickSummary::default();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = self
                .link
                .read_available(&mut buf)
                .map_err(|e| eyre::Report::new(map_link_error(e.as_ref())))?;
            if n == 0 {
                break;
            }
            for r in self.codec.receive(&buf[..n], &mut self.model) {
                summary.lines += 1;
                self.on_received(r);
            }
            if n < buf.len() {
                break;
            }
        }

        let now_ms = self.clock.ms_since(self.epoch);
        let status = self.effective_status();
        let report = self
            .ledger
            .tick(status.state, status.position_turns, now_ms);
        summary.refill = report.refill;
        summary.consumed = report.consumed;

        if let Persistence::Background(worker) = &mut self.persistence {
            summary.saves = worker.completed();
            for s in &summary.saves {
                if let Err(e) = &s.result {
                    tracing::error!(seq = s.seq, error = %e, "background save failed");
                }
            }
        }
        Ok(summary)
    }

    fn on_received(&mut self, r: Received) {
        match r {
            Received::Applied(InboundCommand::MouldOk) => {
                self.book.mirror_active(&self.model.mould);
            }
            Received::Applied(_) | Received::Ignored => {}
        }
    }

    /// Apply a debug override. Link traffic never reaches this.
    pub fn apply_mock(&mut self, cmd: MockCommand) {
        match cmd {
            MockCommand::State(name) => {
                let m = self.mock.get_or_insert_with(MockOverride::default);
                m.state_name = crate::params::bounded(&name, STATE_NAME_MAX);
            }
            MockCommand::Position(p) => {
                self.mock.get_or_insert_with(MockOverride::default).position = p;
            }
            MockCommand::Off => self.mock = None,
        }
    }

    /// Status as fed to the ledger and the UI, with any mock override applied.
    pub fn effective_status(&self) -> Status {
        let mut status = self.model.status.clone();
        if let Some(m) = &self.mock {
            status.position_turns = m.position;
            status.set_state(&m.state_name);
        }
        status
    }

    pub fn query(&mut self, q: Query) -> Result<()> {
        self.codec
            .send_query(self.link.as_mut(), q)
            .map_err(|e| eyre::Report::new(BridgeError::Send(e)))
    }

    pub fn is_safe_for_update(&self) -> bool {
        self.codec.is_safe_for_update(&self.model.status)
    }

    /// Send the selected profile as `MOULD`.
    pub fn send_selected_mould(&mut self) -> std::result::Result<(), BridgeError> {
        let mould = self
            .book
            .selected_profile()
            .ok_or(ProfileError::NoSelection)?
            .clone();
        self.codec
            .send_mould(self.link.as_mut(), &self.model.status, &mould)?;
        Ok(())
    }

    /// Send operator-edited common parameters as `COMMON`.
    pub fn send_common(&mut self, common: &CommonParams) -> std::result::Result<(), SendError> {
        self.codec
            .send_common(self.link.as_mut(), &self.model.status, common)
    }

    pub fn select_profile(&mut self, index: usize) -> std::result::Result<(), ProfileError> {
        self.book.select(index)
    }

    pub fn clear_selection(&mut self) {
        self.book.clear_selection();
    }

    /// Create a local profile and persist the list.
    ///
    /// A save failure is returned but the new profile stays in memory.
    pub fn create_profile(&mut self) -> std::result::Result<usize, BridgeError> {
        let slot = self.book.create_local()?;
        self.persist()?;
        Ok(slot)
    }

    pub fn update_selected_profile(
        &mut self,
        edited: MouldParams,
    ) -> std::result::Result<usize, BridgeError> {
        let slot = self.book.update_selected(edited)?;
        self.persist()?;
        Ok(slot)
    }

    pub fn delete_selected_profile(&mut self) -> std::result::Result<MouldParams, BridgeError> {
        let removed = self.book.delete_selected()?;
        self.persist()?;
        Ok(removed)
    }

    pub fn import_profiles(
        &mut self,
        profiles: Vec<MouldParams>,
    ) -> std::result::Result<usize, BridgeError> {
        let added = self.book.import(profiles);
        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    /// Save the current profile list, inline or via the background worker.
    pub fn persist(&mut self) -> std::result::Result<(), StoreError> {
        let profiles = self.book.profiles().to_vec();
        match &mut self.persistence {
            Persistence::Inline(store) => store.save(&profiles),
            Persistence::Background(worker) => worker.submit(profiles).map(|_| ()),
        }
    }

    /// Block until queued background saves report back, up to `timeout`.
    pub fn flush_saves(&mut self, timeout: Duration) -> Vec<SaveOutcome> {
        match &mut self.persistence {
            Persistence::Inline(_) => Vec::new(),
            Persistence::Background(worker) => worker.drain(timeout),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let status = self.effective_status();
        Snapshot {
            plunger_volume: self.ledger.turns_to_volume(status.position_turns),
            safe_for_update: self.is_safe_for_update(),
            status,
            mould: self.model.mould.clone(),
            common: self.model.common,
            blocks: self.ledger.blocks().copied().collect(),
            total_volume: self.ledger.total_volume(),
            is_refilling: self.ledger.is_refilling(),
            profiles: self.book.profiles().iter().map(|p| p.name.clone()).collect(),
            selected: self.book.selected(),
            mock_active: self.mock.is_some(),
        }
    }

    pub fn model(&self) -> &ControllerModel {
        &self.model
    }

    pub fn ledger(&self) -> &MaterialLedger {
        &self.ledger
    }

    pub fn book(&self) -> &ProfileBook {
        &self.book
    }

    pub fn codec(&self) -> &LineCodec {
        &self.codec
    }

    /// Polling period derived from `poll_hz`.
    pub fn period(&self) -> Duration {
        Duration::from_millis(crate::util::period_ms(self.cfg.poll_hz))
    }

    /// Idle for one polling period on the bridge's clock.
    pub fn idle(&self) {
        self.clock.sleep(self.period());
    }
}
