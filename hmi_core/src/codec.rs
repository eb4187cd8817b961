//! Line codec for the controller link.
//!
//! Receive: bytes accumulate in a bounded line buffer; each complete line is
//! dispatched on its case-insensitive keyword into the `ControllerModel`.
//! Send: queries go out unconditionally, `MOULD` / `COMMON` writes only while
//! the controller reports a whitelisted state.
//!
//! Numeric fields parse leniently (longest numeric prefix, else zero) and a
//! missing trailing field leaves the current value untouched.

use hmi_traits::SerialLink;
use serde::Serialize;

use crate::error::SendError;
use crate::hw_error::map_link_error;
use crate::params::{
    COMMON_FIELD_COUNT, CommonField, CommonParams, MOULD_FIELD_COUNT, MouldParams,
};
use crate::status::{SafetyWhitelist, Status};

/// Line buffer capacity in bytes. Lines of up to `LINE_CAPACITY - 1` bytes fit.
pub const LINE_CAPACITY: usize = 256;

/// Everything the controller has told us so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerModel {
    pub status: Status,
    pub mould: MouldParams,
    pub common: CommonParams,
}

/// Recognised inbound keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    Enc,
    Temp,
    State,
    Error,
    MouldOk,
    CommonOk,
}

impl InboundCommand {
    pub fn parse(keyword: &str) -> Option<Self> {
        const TABLE: [(&str, InboundCommand); 6] = [
            ("ENC", InboundCommand::Enc),
            ("TEMP", InboundCommand::Temp),
            ("STATE", InboundCommand::State),
            ("ERROR", InboundCommand::Error),
            ("MOULD_OK", InboundCommand::MouldOk),
            ("COMMON_OK", InboundCommand::CommonOk),
        ];
        let keyword = keyword.trim();
        TABLE
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .map(|(_, c)| *c)
    }
}

/// Debug override of the status fed to the ledger and the UI.
///
/// Never read from the controller link; it comes from the operator's debug
/// input.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    State(String),
    Position(f32),
    Off,
}

impl MockCommand {
    /// Parse `STATE|<name>`, `POS|<turns>` or `OFF`, optionally prefixed
    /// with `MOCK|`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().split('|').peekable();
        if parts
            .peek()
            .is_some_and(|k| k.trim().eq_ignore_ascii_case("MOCK"))
        {
            parts.next();
        }
        let sub = parts.next().unwrap_or_default().trim();
        let arg = parts.next();
        let cmd = if sub.eq_ignore_ascii_case("OFF") {
            Self::Off
        } else if sub.eq_ignore_ascii_case("STATE")
            && let Some(name) = arg
        {
            Self::State(name.trim().to_string())
        } else if sub.eq_ignore_ascii_case("POS")
            && let Some(v) = arg
        {
            Self::Position(parse_f32_lenient(v))
        } else {
            tracing::info!(line, "malformed mock command ignored");
            return None;
        };
        Some(cmd)
    }
}

/// Outcome of dispatching one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Applied(InboundCommand),
    /// Keyword not recognised; the line was logged and dropped.
    Ignored,
}

/// Zero-argument queries. Always transmittable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Mould,
    Common,
    State,
    Error,
}

impl Query {
    pub const ALL: [Query; 4] = [Query::State, Query::Mould, Query::Common, Query::Error];

    pub fn wire(self) -> &'static str {
        match self {
            Query::Mould => "QUERY_MOULD",
            Query::Common => "QUERY_COMMON",
            Query::State => "QUERY_STATE",
            Query::Error => "QUERY_ERROR",
        }
    }
}

/// Bounded accumulator that splits a byte stream on CR / LF.
///
/// When a line outgrows the buffer the partial line is dropped, and so is the
/// remainder of that line up to the next terminator.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    discarding: bool,
    overflows: u64,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self {
            buf: Vec::with_capacity(LINE_CAPACITY),
            discarding: false,
            overflows: 0,
        }
    }
}

impl LineBuffer {
    /// Feed one byte; returns a trimmed, non-empty line when one completes.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' || byte == b'\r' {
            if self.discarding {
                self.discarding = false;
                return None;
            }
            if self.buf.is_empty() {
                return None;
            }
            let line = String::from_utf8_lossy(&self.buf).trim().to_string();
            self.buf.clear();
            return (!line.is_empty()).then_some(line);
        }
        if self.discarding {
            return None;
        }
        if self.buf.len() >= LINE_CAPACITY - 1 {
            self.overflows += 1;
            tracing::warn!(
                capacity = LINE_CAPACITY,
                overflows = self.overflows,
                "line buffer overflow, discarding partial line"
            );
            self.buf.clear();
            self.discarding = true;
            return None;
        }
        self.buf.push(byte);
        None
    }

    /// Bytes buffered for the line in progress.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

/// Bidirectional line codec.
#[derive(Debug, Default)]
pub struct LineCodec {
    rx: LineBuffer,
    whitelist: SafetyWhitelist,
}

impl LineCodec {
    pub fn new(whitelist: SafetyWhitelist) -> Self {
        Self {
            rx: LineBuffer::default(),
            whitelist,
        }
    }

    pub fn whitelist(&self) -> &SafetyWhitelist {
        &self.whitelist
    }

    pub fn line_buffer(&self) -> &LineBuffer {
        &self.rx
    }

    /// Feed received bytes, dispatching every completed line into `model`.
    pub fn receive(&mut self, bytes: &[u8], model: &mut ControllerModel) -> Vec<Received> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(line) = self.rx.push(b) {
                tracing::debug!(line = %line, "rx");
                out.push(dispatch_line(&line, model));
            }
        }
        out
    }

    /// Whether the current status permits `MOULD` / `COMMON` writes.
    pub fn is_safe_for_update(&self, status: &Status) -> bool {
        self.whitelist.allows(status.state)
    }

    pub fn send_query<L: SerialLink + ?Sized>(
        &self,
        link: &mut L,
        query: Query,
    ) -> Result<(), SendError> {
        write(link, query.wire())
    }

    /// Transmit `mould` as a `MOULD` line if the state allows it.
    pub fn send_mould<L: SerialLink + ?Sized>(
        &self,
        link: &mut L,
        status: &Status,
        mould: &MouldParams,
    ) -> Result<(), SendError> {
        self.gate(status)?;
        write(link, &format_mould(mould))
    }

    /// Transmit `common` as a `COMMON` line if the state allows it.
    pub fn send_common<L: SerialLink + ?Sized>(
        &self,
        link: &mut L,
        status: &Status,
        common: &CommonParams,
    ) -> Result<(), SendError> {
        self.gate(status)?;
        write(link, &format_common(common))
    }

    fn gate(&self, status: &Status) -> Result<(), SendError> {
        if self.is_safe_for_update(status) {
            Ok(())
        } else {
            tracing::warn!(state = %status.state_name, "write blocked in unsafe state");
            Err(SendError::UnsafeState {
                state: status.state_name.clone(),
            })
        }
    }
}

fn write<L: SerialLink + ?Sized>(link: &mut L, line: &str) -> Result<(), SendError> {
    link.write_line(line).map_err(|e| {
        let mapped = map_link_error(e.as_ref());
        tracing::error!(error = %mapped, line, "tx failed");
        SendError::Link(mapped.to_string())
    })?;
    tracing::debug!(line, "tx");
    Ok(())
}

/// Apply one trimmed line to `model`.
pub fn dispatch_line(line: &str, model: &mut ControllerModel) -> Received {
    let (keyword, rest) = match line.split_once('|') {
        Some((k, r)) => (k, Some(r)),
        None => (line, None),
    };
    let Some(cmd) = InboundCommand::parse(keyword) else {
        tracing::info!(line, "unknown command ignored");
        return Received::Ignored;
    };
    let status = &mut model.status;
    match cmd {
        InboundCommand::Enc => {
            if let Some(v) = rest {
                status.position_turns = parse_f32_lenient(v);
            }
        }
        InboundCommand::Temp => {
            if let Some(v) = rest {
                status.temperature_c = parse_f32_lenient(v);
            }
        }
        InboundCommand::State => {
            if let Some(v) = rest {
                let name = v.split('|').next().unwrap_or_default().trim();
                let before = status.state;
                status.set_state(name);
                if status.state != before {
                    tracing::info!(from = ?before, to = ?status.state, name = %status.state_name, "state change");
                }
            }
        }
        InboundCommand::Error => {
            if let Some(r) = rest {
                let (code, msg) = match r.split_once('|') {
                    Some((c, m)) => (c, Some(m)),
                    None => (r, None),
                };
                status.error_code = parse_hex_u16(code);
                if let Some(m) = msg {
                    status.set_error_message(m.trim());
                }
                if status.error_code != 0 {
                    tracing::warn!(code = status.error_code, message = %status.error_message, "controller error");
                }
            }
        }
        InboundCommand::MouldOk => {
            if let Some(r) = rest {
                apply_mould_fields(&mut model.mould, r);
                tracing::debug!(name = %model.mould.name, "mould params received");
            }
        }
        InboundCommand::CommonOk => {
            if let Some(r) = rest {
                apply_common_fields(&mut model.common, r);
                tracing::debug!("common params received");
            }
        }
    }
    Received::Applied(cmd)
}

fn apply_mould_fields(m: &mut MouldParams, rest: &str) {
    for (i, field) in rest.split('|').take(MOULD_FIELD_COUNT).enumerate() {
        match i {
            0 => m.set_name(field.trim()),
            1..=12 => {
                if let Some(slot) = m.motion_value_mut(i - 1) {
                    *slot = parse_f32_lenient(field);
                }
            }
            13 => m.set_mode(field.trim()),
            _ => m.inject_torque = parse_f32_lenient(field),
        }
    }
}

fn apply_common_fields(c: &mut CommonParams, rest: &str) {
    for (i, field) in rest.split('|').take(COMMON_FIELD_COUNT).enumerate() {
        if let Some(slot) = c.count_mut(i) {
            *slot = parse_u32_lenient(field);
        } else if let Some(slot) = c.float_mut(i) {
            *slot = parse_f32_lenient(field);
        }
    }
}

/// `MOULD|name|12 x %.3f|mode|%.3f`
pub fn format_mould(m: &MouldParams) -> String {
    let mut s = format!("MOULD|{}", m.name);
    for v in m.motion_values() {
        s.push_str(&format!("|{v:.3}"));
    }
    s.push_str(&format!("|{}|{:.3}", m.mode, m.inject_torque));
    s
}

/// `COMMON|...`: floats with three decimals, counters as plain integers.
pub fn format_common(c: &CommonParams) -> String {
    let mut s = String::from("COMMON");
    for f in c.fields() {
        match f {
            CommonField::Float(v) => s.push_str(&format!("|{v:.3}")),
            CommonField::Count(n) => s.push_str(&format!("|{n}")),
        }
    }
    s
}

/// Longest decimal float prefix of `s` (after leading whitespace), else 0.
pub fn parse_f32_lenient(s: &str) -> f32 {
    let s = s.trim_start();
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < b.len() && b[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    // exponent only counts when followed by at least one digit
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    s[..i].parse::<f32>().unwrap_or(0.0)
}

/// Longest decimal integer prefix of `s`, saturated into `u32`. Negative values give 0.
pub fn parse_u32_lenient(s: &str) -> u32 {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut v: u64 = 0;
    let mut any = false;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        any = true;
        v = v.saturating_mul(10).saturating_add(u64::from(b - b'0'));
    }
    if !any || neg {
        return 0;
    }
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Hex prefix of `s` (optional `0x`), keeping the low 16 bits.
pub fn parse_hex_u16(s: &str) -> u16 {
    let s = s.trim_start();
    let (neg, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut v: u64 = 0;
    for c in s.chars() {
        let Some(d) = c.to_digit(16) else { break };
        v = v.wrapping_mul(16).wrapping_add(u64::from(d));
    }
    if neg {
        v = v.wrapping_neg();
    }
    (v & 0xFFFF) as u16
}
