//! Maps `Box<dyn Error>` from trait boundaries to typed `BridgeError`.
//!
//! `SerialLink` returns `Box<dyn Error + Send + Sync>`; this module converts
//! those to the typed error enum, with an optional feature-gated path for
//! `hmi_hardware::HwError` downcasting.

use crate::error::BridgeError;

/// Map a link error to a typed `BridgeError`.
///
/// Known hardware errors are downcast first, then string heuristics apply.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> BridgeError {
    #[cfg(feature = "hardware-errors")]
    {
        use hmi_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => BridgeError::Timeout,
                other => BridgeError::LinkFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        BridgeError::Timeout
    } else {
        BridgeError::Link(s)
    }
}
