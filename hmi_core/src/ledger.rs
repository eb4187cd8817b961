//! Material ledger.
//!
//! There is no refill-volume sensor. Refills are inferred from the encoder
//! position at the `REFILL` -> `READY_TO_INJECT` edge, and consumption from
//! forward encoder movement. Blocks are consumed oldest first.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::LedgerCfg;
use crate::status::MachineState;

/// Material added by one refill cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefillBlock {
    pub volume: f32,
    pub added_ms: u64,
    pub active: bool,
}

/// What happened at a refill-completion edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefillOutcome {
    Pushed { volume: f32 },
    /// The FIFO was full; the arrival was dropped.
    DroppedAtCapacity { volume: f32 },
    /// Inferred volume did not exceed the refill epsilon.
    Ignored { volume: f32 },
}

/// Per-tick summary, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub refill: Option<RefillOutcome>,
    /// Volume actually drained from the FIFO this tick.
    pub consumed: f32,
}

#[derive(Debug)]
pub struct MaterialLedger {
    cfg: LedgerCfg,
    blocks: VecDeque<RefillBlock>,
    refill_sequence_active: bool,
    start_refill_pos: f32,
    last_frame_turns: f32,
    last_state: MachineState,
    is_refilling: bool,
}

impl Default for MaterialLedger {
    fn default() -> Self {
        Self::new(LedgerCfg::default())
    }
}

impl MaterialLedger {
    pub fn new(cfg: LedgerCfg) -> Self {
        let capacity = cfg.capacity;
        Self {
            cfg,
            blocks: VecDeque::with_capacity(capacity),
            refill_sequence_active: false,
            start_refill_pos: 0.0,
            last_frame_turns: 0.0,
            last_state: MachineState::Unknown,
            is_refilling: false,
        }
    }

    /// Advance the ledger by one polling tick.
    pub fn tick(&mut self, state: MachineState, position: f32, now_ms: u64) -> TickReport {
        let mut report = TickReport::default();

        if state == MachineState::Refill {
            if !self.refill_sequence_active {
                self.refill_sequence_active = true;
                self.start_refill_pos = position;
                tracing::info!(position, "refill sequence started");
            }
            self.is_refilling = true;
        } else {
            self.is_refilling = false;
        }

        if state == MachineState::ReadyToInject
            && self.last_state != MachineState::ReadyToInject
            && self.refill_sequence_active
        {
            report.refill = Some(self.complete_refill(position, now_ms));
            self.refill_sequence_active = false;
        }

        if position > self.last_frame_turns {
            let moved = position - self.last_frame_turns;
            if moved > self.cfg.consume_epsilon && moved < self.cfg.consume_ceiling {
                report.consumed = self.consume(moved);
            } else if moved >= self.cfg.consume_ceiling {
                tracing::debug!(moved, "encoder jump ignored");
            }
        }

        self.last_frame_turns = position;
        self.last_state = state;
        report
    }

    fn complete_refill(&mut self, position: f32, now_ms: u64) -> RefillOutcome {
        let space = (self.cfg.max_travel_turns - position).max(0.0);
        let existing = self.total_volume();
        let volume = space - existing;
        if volume <= self.cfg.refill_epsilon {
            tracing::debug!(volume, space, existing, position, "refill below epsilon ignored");
            return RefillOutcome::Ignored { volume };
        }
        if self.blocks.len() >= self.cfg.capacity {
            tracing::warn!(volume, capacity = self.cfg.capacity, "block limit reached, refill dropped");
            return RefillOutcome::DroppedAtCapacity { volume };
        }
        self.blocks.push_back(RefillBlock {
            volume,
            added_ms: now_ms,
            active: true,
        });
        tracing::info!(
            volume,
            space,
            existing,
            position,
            start = self.start_refill_pos,
            count = self.blocks.len(),
            "refill block added"
        );
        RefillOutcome::Pushed { volume }
    }

    /// Drain `amount` head-first. Returns how much was actually drained.
    fn consume(&mut self, amount: f32) -> f32 {
        let mut remaining = amount;
        while remaining > self.cfg.consume_epsilon {
            let Some(head) = self.blocks.front_mut() else {
                break;
            };
            if head.volume > remaining {
                head.volume -= remaining;
                remaining = 0.0;
            } else {
                remaining -= head.volume;
                self.blocks.pop_front();
            }
        }
        amount - remaining
    }

    pub fn blocks(&self) -> impl ExactSizeIterator<Item = &RefillBlock> {
        self.blocks.iter()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_volume(&self) -> f32 {
        self.blocks.iter().map(|b| b.volume).sum()
    }

    pub fn is_refilling(&self) -> bool {
        self.is_refilling
    }

    pub fn refill_sequence_active(&self) -> bool {
        self.refill_sequence_active
    }

    pub fn capacity(&self) -> usize {
        self.cfg.capacity
    }

    /// Plunger volume for display: turns past the plunger zero, never negative.
    pub fn turns_to_volume(&self, turns: f32) -> f32 {
        turns_to_volume(turns, self.cfg.plunger_zero_turns)
    }

    /// Seed the FIFO directly. Blocks past capacity are dropped.
    pub fn with_blocks(mut self, volumes: &[f32]) -> Self {
        for &volume in volumes.iter().take(self.cfg.capacity) {
            self.blocks.push_back(RefillBlock {
                volume,
                added_ms: 0,
                active: true,
            });
        }
        self
    }
}

/// `max(turns - zero, 0)`
pub fn turns_to_volume(turns: f32, zero: f32) -> f32 {
    (turns - zero).max(0.0)
}
