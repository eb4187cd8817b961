//! Polling loop: config mapping, link/storage assembly, and the run itself.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use hmi_core::error::Result as CoreResult;
use hmi_core::{Bridge, BridgeError, RefillOutcome, SafetyWhitelist, Snapshot};
use hmi_hardware::{DirFs, SerialLink, SimulatedLink};
use hmi_traits::MonotonicClock;

/// How a `run` invocation ended.
pub struct RunOutcome {
    pub ticks: u64,
    pub lines: usize,
    pub interrupted: bool,
    pub snapshot: Snapshot,
}

/// Wire the bridge from config. Profiles live under `storage.dir`.
pub fn assemble(cfg: &hmi_config::Config, link: impl SerialLink + 'static) -> CoreResult<Bridge> {
    let fs = open_flash(cfg)?;
    let whitelist = SafetyWhitelist::from_names(&cfg.safety.writable_states)?;
    Bridge::builder()
        .with_ledger((&cfg.ledger).into())
        .with_store((&cfg.storage).into())
        .with_runner((&cfg.runner).into())
        .with_whitelist(whitelist)
        .with_clock(MonotonicClock::new())
        .with_link(link)
        .with_storage(fs)
        .build()
}

pub fn open_flash(cfg: &hmi_config::Config) -> CoreResult<DirFs> {
    DirFs::open(cfg.storage.dir.clone())
        .wrap_err_with(|| format!("open flash directory {}", cfg.storage.dir.display()))
}

/// Read a replay script. Returns the link and the number of lines it will release.
pub fn script_link(path: &Path) -> CoreResult<(SimulatedLink, u64)> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read script {}", path.display()))?;
    let link = SimulatedLink::from_script(text.lines());
    let n = link.script_remaining() as u64;
    tracing::info!(script = %path.display(), lines = n, "replaying controller script");
    Ok((link, n))
}

/// Open the controller link named in `[serial]`.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn serial_link(cfg: &hmi_config::Config) -> CoreResult<Box<dyn SerialLink>> {
    let link = hmi_hardware::uart::UartLink::open(&cfg.serial.device, cfg.serial.baud)
        .wrap_err_with(|| format!("open uart {}", cfg.serial.device.display()))?;
    Ok(Box::new(link))
}

/// Without the `hardware` feature there is no UART; an idle simulated link stands in.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn serial_link(cfg: &hmi_config::Config) -> CoreResult<Box<dyn SerialLink>> {
    tracing::warn!(
        device = %cfg.serial.device.display(),
        "built without hardware support; using an idle simulated link"
    );
    Ok(Box::new(SimulatedLink::new()))
}

/// Drive `bridge` until `max_ticks` is reached or `shutdown` is raised.
pub fn run_loop(
    bridge: &mut Bridge,
    max_ticks: Option<u64>,
    snapshot_every: Option<u64>,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> CoreResult<RunOutcome> {
    bridge.start()?;
    tracing::info!(period_ms = bridge.period().as_millis() as u64, "polling loop start");

    let mut ticks = 0u64;
    let mut lines = 0usize;
    let mut interrupted = false;
    loop {
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(ticks, "shutdown requested");
            interrupted = true;
            break;
        }

        let summary = bridge.tick()?;
        ticks += 1;
        lines += summary.lines;
        match summary.refill {
            Some(RefillOutcome::Pushed { volume }) => {
                tracing::info!(volume, total = bridge.ledger().total_volume(), "refill block added");
            }
            Some(RefillOutcome::DroppedAtCapacity { volume }) => {
                tracing::warn!(volume, "refill block dropped; ledger full");
            }
            Some(RefillOutcome::Ignored { volume }) => {
                tracing::debug!(volume, "refill below threshold ignored");
            }
            None => {}
        }
        if let Some(every) = snapshot_every
            && every > 0
            && ticks % every == 0
        {
            print_snapshot(&bridge.snapshot(), json)?;
        }
        bridge.idle();
    }

    let saves = bridge.flush_saves(std::time::Duration::from_secs(2));
    for s in &saves {
        if let Err(e) = &s.result {
            tracing::error!(seq = s.seq, error = %e, "background save failed");
        }
    }
    tracing::info!(ticks, lines, "polling loop stop");
    Ok(RunOutcome {
        ticks,
        lines,
        interrupted,
        snapshot: bridge.snapshot(),
    })
}

/// Select profile `index` and send it, respecting the write gate.
pub fn send_profile(bridge: &mut Bridge, index: usize) -> CoreResult<()> {
    bridge.select_profile(index).map_err(BridgeError::from)?;
    bridge.send_selected_mould()?;
    tracing::info!(index, "profile sent to controller");
    Ok(())
}

pub fn print_snapshot(snap: &Snapshot, json: bool) -> CoreResult<()> {
    if json {
        println!("{}", serde_json::to_string(snap)?);
        return Ok(());
    }
    let s = &snap.status;
    println!(
        "state={} pos={:.2} temp={:.1} blocks={} total={:.2} plunger={:.2} safe={}",
        if s.state_name.is_empty() { "-" } else { &s.state_name },
        s.position_turns,
        s.temperature_c,
        snap.blocks.len(),
        snap.total_volume,
        snap.plunger_volume,
        snap.safe_for_update,
    );
    if s.error_code != 0 {
        println!("error={:#06x} {}", s.error_code, s.error_message);
    }
    Ok(())
}
