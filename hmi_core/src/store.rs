//! Crash-safe profile persistence on a `FlashFs`.
//!
//! File layout: `[i32 LE count][count x RECORD_SIZE]`, no padding between
//! records. A record is the controller's C layout of `MouldParams`:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 32 | name, NUL terminated |
//! | 32 | 48 | 12 x f32 LE motion values |
//! | 80 | 3 | mode, NUL terminated |
//! | 83 | 1 | padding |
//! | 84 | 4 | inject torque, f32 LE |
//!
//! Saves go to a temp file that is size-checked before it replaces the
//! committed file. Loads never fail: corrupt or truncated files yield as many
//! records as can be read.
//!
//! Saves block the caller for the duration of the flash write; use
//! `SaveWorker` to move them off the polling thread.

use std::io::{Read, Write};

use hmi_traits::FlashFs;

use crate::config::StoreCfg;
use crate::error::StoreError;
use crate::params::{MODE_MAX, MouldParams, NAME_MAX};

pub const HEADER_SIZE: usize = 4;
pub const RECORD_SIZE: usize = 88;
/// Bytes shown by `hex_dump`.
pub const DUMP_LIMIT: usize = 4096;

const NAME_FIELD: usize = NAME_MAX + 1;
const MOTION_OFFSET: usize = NAME_FIELD;
const MODE_OFFSET: usize = MOTION_OFFSET + 12 * 4;
const TORQUE_OFFSET: usize = MODE_OFFSET + MODE_MAX + 1 + 1;

pub struct ProfileStore<F: FlashFs> {
    fs: F,
    cfg: StoreCfg,
}

impl<F: FlashFs> ProfileStore<F> {
    pub fn new(fs: F, cfg: StoreCfg) -> Self {
        Self { fs, cfg }
    }

    pub fn cfg(&self) -> &StoreCfg {
        &self.cfg
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    /// Atomically replace the profile file with `profiles`.
    pub fn save(&mut self, profiles: &[MouldParams]) -> Result<(), StoreError> {
        if profiles.len() > self.cfg.max_profiles {
            return Err(StoreError::TooMany {
                count: profiles.len(),
                limit: self.cfg.max_profiles,
            });
        }
        let result = self.try_save(profiles);
        match &result {
            Ok(()) => {
                tracing::info!(count = profiles.len(), file = %self.cfg.profiles_file, "profiles saved");
            }
            Err(e) => {
                let tmp = self.cfg.temp_file.as_str();
                let committed = self.fs.exists(&self.cfg.profiles_file);
                if matches!(e, StoreError::Commit { .. }) && !committed {
                    // verified temp file is now the only complete copy; load() recovers it
                    tracing::error!(
                        error = %e,
                        file = tmp,
                        "profile commit failed, keeping temp file"
                    );
                } else {
                    tracing::error!(error = %e, "profile save failed, committed file untouched");
                    if self.fs.exists(tmp)
                        && let Err(rm) = self.fs.remove(tmp)
                    {
                        tracing::warn!(error = %rm, file = tmp, "could not remove temp file");
                    }
                }
            }
        }
        result
    }

    fn try_save(&mut self, profiles: &[MouldParams]) -> Result<(), StoreError> {
        let tmp = self.cfg.temp_file.clone();
        let dst = self.cfg.profiles_file.clone();
        let write_err = |e: std::io::Error| StoreError::Write {
            name: tmp.clone(),
            reason: e.to_string(),
        };

        {
            let mut w = self.fs.create(&tmp).map_err(|e| StoreError::CreateTemp {
                name: tmp.clone(),
                reason: e.to_string(),
            })?;
            let count = i32::try_from(profiles.len()).unwrap_or(i32::MAX);
            w.write_all(&count.to_le_bytes()).map_err(write_err)?;
            for p in profiles {
                w.write_all(&encode_record(p)).map_err(write_err)?;
            }
            w.flush().map_err(write_err)?;
        }

        let expected = (HEADER_SIZE + profiles.len() * RECORD_SIZE) as u64;
        let actual = self.fs.size(&tmp).map_err(|e| StoreError::Verify {
            name: tmp.clone(),
            reason: e.to_string(),
        })?;
        if actual != expected {
            return Err(StoreError::SizeMismatch {
                name: tmp,
                actual,
                expected,
            });
        }

        let commit_err = |e: std::io::Error| StoreError::Commit {
            from: tmp.clone(),
            to: dst.clone(),
            reason: e.to_string(),
        };
        if self.fs.exists(&dst) {
            self.fs.remove(&dst).map_err(commit_err)?;
        }
        self.fs.rename(&tmp, &dst).map_err(commit_err)?;
        Ok(())
    }

    /// Load whatever valid records the profile file holds.
    ///
    /// When the profile file is missing but a complete temp file is present
    /// (a commit that failed after the old file was removed), the temp file
    /// is read instead.
    pub fn load(&self) -> Vec<MouldParams> {
        let name = if self.fs.exists(&self.cfg.profiles_file) {
            self.cfg.profiles_file.as_str()
        } else if self.temp_is_complete() {
            tracing::warn!(
                file = %self.cfg.temp_file,
                "profile file missing, recovering from temp file"
            );
            self.cfg.temp_file.as_str()
        } else {
            tracing::info!(file = %self.cfg.profiles_file, "no profile file, starting empty");
            return Vec::new();
        };
        if tracing::enabled!(tracing::Level::TRACE)
            && name == self.cfg.profiles_file
            && let Ok(dump) = self.hex_dump()
        {
            tracing::trace!(file = name, "profile file contents:\n{dump}");
        }

        let size = match self.fs.size(name) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, file = name, "cannot stat profile file");
                return Vec::new();
            }
        };
        let mut r = match self.fs.open_read(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, file = name, "cannot open profile file");
                return Vec::new();
            }
        };

        let mut header = [0u8; HEADER_SIZE];
        if let Err(e) = r.read_exact(&mut header) {
            tracing::warn!(error = %e, file = name, "profile header unreadable");
            return Vec::new();
        }
        let claimed = i32::from_le_bytes(header);
        let Ok(claimed) = usize::try_from(claimed) else {
            tracing::warn!(claimed, "negative profile count, treating file as corrupt");
            return Vec::new();
        };

        let body = usize::try_from(size.saturating_sub(HEADER_SIZE as u64)).unwrap_or(usize::MAX);
        let count = claimed.min(self.cfg.max_profiles).min(body / RECORD_SIZE);
        if count != claimed {
            tracing::warn!(claimed, count, size, "profile count clamped");
        }

        let mut out = Vec::with_capacity(count);
        let mut rec = [0u8; RECORD_SIZE];
        for i in 0..count {
            if let Err(e) = r.read_exact(&mut rec) {
                tracing::warn!(error = %e, index = i, "profile record unreadable, keeping earlier records");
                break;
            }
            out.push(decode_record(&rec));
        }
        tracing::info!(count = out.len(), file = name, "profiles loaded");
        out
    }

    /// True when the temp file holds a header and exactly the records it claims.
    fn temp_is_complete(&self) -> bool {
        let tmp = self.cfg.temp_file.as_str();
        let Ok(size) = self.fs.size(tmp) else {
            return false;
        };
        let Ok(mut r) = self.fs.open_read(tmp) else {
            return false;
        };
        let mut header = [0u8; HEADER_SIZE];
        if r.read_exact(&mut header).is_err() {
            return false;
        }
        match usize::try_from(i32::from_le_bytes(header)) {
            Ok(count) => size == (HEADER_SIZE + count * RECORD_SIZE) as u64,
            Err(_) => false,
        }
    }

    /// Hex dump of the first `DUMP_LIMIT` bytes of the profile file.
    pub fn hex_dump(&self) -> std::io::Result<String> {
        let mut r = self.fs.open_read(&self.cfg.profiles_file)?;
        let mut buf = Vec::with_capacity(DUMP_LIMIT);
        r.by_ref().take(DUMP_LIMIT as u64).read_to_end(&mut buf)?;
        Ok(hex_dump(&buf))
    }

    pub fn into_inner(self) -> F {
        self.fs
    }
}

/// Serialize one profile into its fixed record layout.
pub fn encode_record(p: &MouldParams) -> [u8; RECORD_SIZE] {
    let mut rec = [0u8; RECORD_SIZE];
    put_text(&mut rec[..NAME_FIELD], &p.name);
    for (i, v) in p.motion_values().iter().enumerate() {
        let at = MOTION_OFFSET + i * 4;
        rec[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
    put_text(&mut rec[MODE_OFFSET..MODE_OFFSET + MODE_MAX + 1], &p.mode);
    rec[TORQUE_OFFSET..].copy_from_slice(&p.inject_torque.to_le_bytes());
    rec
}

/// Parse one record, sanitizing its text fields.
pub fn decode_record(rec: &[u8; RECORD_SIZE]) -> MouldParams {
    let mut p = MouldParams {
        name: sanitize_text(&rec[..NAME_FIELD]),
        mode: sanitize_text(&rec[MODE_OFFSET..MODE_OFFSET + MODE_MAX + 1]),
        inject_torque: f32_at(rec, TORQUE_OFFSET),
        ..MouldParams::default()
    };
    for i in 0..12 {
        if let Some(slot) = p.motion_value_mut(i) {
            *slot = f32_at(rec, MOTION_OFFSET + i * 4);
        }
    }
    p
}

fn f32_at(rec: &[u8], at: usize) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&rec[at..at + 4]);
    f32::from_le_bytes(b)
}

/// Copy `text` into a NUL-terminated fixed field, truncating to fit.
fn put_text(field: &mut [u8], text: &str) {
    let n = text.len().min(field.len() - 1);
    field[..n].copy_from_slice(&text.as_bytes()[..n]);
}

/// Text up to the first NUL (forced at the last byte), with non-printable
/// bytes replaced by `_`.
pub fn sanitize_text(field: &[u8]) -> String {
    let bounded = &field[..field.len().saturating_sub(1)];
    bounded
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '_' })
        .collect()
}

/// Classic 16-bytes-per-row hex dump with an ASCII column.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}: ", row * 16));
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => out.push_str(&format!("{b:02x} ")),
                None => out.push_str("   "),
            }
        }
        out.push('|');
        out.extend(chunk.iter().map(|&b| {
            if (0x20..=0x7E).contains(&b) {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_offsets() {
        assert_eq!(MODE_OFFSET, 80);
        assert_eq!(TORQUE_OFFSET, 84);
        let mut p = MouldParams::local(1);
        p.inject_torque = 1.25;
        let rec = encode_record(&p);
        assert_eq!(&rec[..8], b"Local 1\0");
        assert_eq!(&rec[80..83], b"2D\0");
        assert_eq!(rec[83], 0);
        assert_eq!(&rec[84..], &1.25f32.to_le_bytes());
        assert_eq!(&rec[32..36], &10.0f32.to_le_bytes());
    }

    #[test]
    fn sanitize_forces_termination_and_replaces_control_bytes() {
        let mut field = [b'A'; 8];
        field[1] = 0x07;
        field[2] = 0xC3;
        assert_eq!(sanitize_text(&field), "A__AAAA");
        assert_eq!(sanitize_text(b"ok\0zz"), "ok");
    }

    #[test]
    fn hex_dump_rows() {
        let dump = hex_dump(b"0123456789abcdefXY\x01");
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000: 30 31 32"));
        assert!(lines[0].ends_with("|0123456789abcdef|"));
        assert!(lines[1].starts_with("00000010: 58 59 01 "));
        assert!(lines[1].ends_with("|XY.|"));
    }
}
