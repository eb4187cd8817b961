//! Human-readable error descriptions and structured JSON error formatting.

use hmi_core::error::{BridgeError, BuildError, ProfileError, SendError, StoreError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No serial link was provided to the bridge.\nLikely causes: The UART failed to open or was not wired into the builder.\nHow to fix: Check [serial] in the config and pass the link via with_link(...).".to_string()
            }
            BuildError::MissingStorage => {
                "What happened: No flash filesystem was provided to the bridge.\nLikely causes: The storage directory could not be opened.\nHow to fix: Check storage.dir in the config and its permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BridgeError>() {
        return match be {
            BridgeError::Send(SendError::UnsafeState { state }) => format!(
                "What happened: The controller is in state {state:?}, which does not accept parameter writes.\nLikely causes: A cycle is running or the machine is in an error state.\nHow to fix: Wait for READY_TO_INJECT (or another writable state) and send again; safety.writable_states lists the allowed states."
            ),
            BridgeError::Timeout => {
                "What happened: The serial link timed out.\nLikely causes: Controller powered off, wrong device node, or a loose cable.\nHow to fix: Verify serial.device and serial.baud, and check the cable to the controller.".to_string()
            }
            BridgeError::Link(msg)
            | BridgeError::LinkFault(msg)
            | BridgeError::Send(SendError::Link(msg)) => format!(
                "What happened: Serial link failure ({msg}).\nLikely causes: The UART was closed or the controller reset.\nHow to fix: Reconnect the controller and restart the bridge."
            ),
            BridgeError::Storage(se) => storage_hint(se),
            BridgeError::Profile(pe) => profile_hint(pe),
            BridgeError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: A misspelled state name in safety.writable_states.\nHow to fix: Use the controller's state names, e.g. READY_TO_INJECT."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<StoreError>() {
        return storage_hint(se);
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open uart") {
        return "What happened: Failed to open the UART.\nLikely causes: Wrong device node or insufficient permissions on the serial port.\nHow to fix: Fix serial.device in the config; ensure the process can access the device (dialout group).".to_string();
    }

    if lower.contains("open flash directory") {
        return "What happened: The profile storage directory could not be opened.\nLikely causes: storage.dir points at an unmounted or read-only location.\nHow to fix: Mount the flash partition or change storage.dir.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Out-of-range values in [ledger], [storage] or [runner].\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("profile csv must have headers") {
        return "Invalid headers in profile CSV. Expected 'name,fill_volume,...,mode,inject_torque'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn storage_hint(se: &StoreError) -> String {
    format!(
        "What happened: Saving profiles failed ({se}).\nLikely causes: Flash full, worn out, or not mounted.\nHow to fix: The previous profile file is intact; free space on the flash partition and retry."
    )
}

fn profile_hint(pe: &ProfileError) -> String {
    let fix = match pe {
        ProfileError::NoSelection => "Select a profile index that exists (see `hmi profiles list`).",
        ProfileError::LimitReached(_) => "Delete an unused profile or raise storage.max_profiles.",
        ProfileError::MirrorSlot => "Slot 0 mirrors the controller; pick another profile.",
        ProfileError::TorqueTooLow => "Set inject_torque above 0.01 for 3D profiles.",
        ProfileError::FillTooLow => "Set fill_volume and fill_speed above 0.01 for 2D profiles.",
        ProfileError::UnknownMode(_) => "Use mode 2D or 3D.",
    };
    format!("What happened: {pe}.\nHow to fix: {fix}")
}

/// Stable names for the error classes reported in JSON.
pub fn error_reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<BridgeError>() {
        Some(BridgeError::Send(SendError::UnsafeState { .. })) => "UnsafeState",
        Some(BridgeError::Timeout) => "Timeout",
        Some(
            BridgeError::Link(_) | BridgeError::LinkFault(_) | BridgeError::Send(SendError::Link(_)),
        ) => "Link",
        Some(BridgeError::Storage(_)) => "Storage",
        Some(BridgeError::Profile(_)) => "Profile",
        Some(BridgeError::Config(_)) => "Config",
        None if err.downcast_ref::<BuildError>().is_some() => "Config",
        None if err.downcast_ref::<StoreError>().is_some() => "Storage",
        None => "Error",
    }
}

/// Stable exit codes per error class; everything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match error_reason_name(err) {
        "UnsafeState" => 3,
        "Timeout" | "Link" => 4,
        "Storage" => 5,
        "Profile" => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = error_reason_name(err);
    let msg = humanize(err);
    let obj = match err.downcast_ref::<BridgeError>() {
        Some(BridgeError::Send(SendError::UnsafeState { state })) => {
            json!({ "reason": reason, "details": { "state": state }, "message": msg })
        }
        _ => json!({ "reason": reason, "message": msg }),
    };
    obj.to_string()
}
