//! Maps `Box<dyn Error>` from trait boundaries to typed `UdmError`.
//!
//! The traits in `udm_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `udm_hardware::HwError` downcasting.

use crate::error::UdmError;

/// Map a trait-boundary error to a typed `UdmError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> UdmError {
    #[cfg(feature = "hardware-errors")]
    {
        use udm_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::EchoIdleTimeout => UdmError::Timeout,
                HwError::OutOfBounds { .. } | HwError::Misaligned(_) | HwError::Io(_) => {
                    UdmError::Storage(hw.to_string())
                }
                other => UdmError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        UdmError::Timeout
    } else {
        UdmError::Hardware(s)
    }
}

/// Like [`map_hw_error`] but classifies everything that is not a timeout as a
/// storage failure. Used on the persistence path.
pub fn map_storage_error(e: &(dyn std::error::Error + 'static)) -> UdmError {
    match map_hw_error(e) {
        UdmError::Hardware(s) | UdmError::HardwareFault(s) => UdmError::Storage(s),
        other => other,
    }
}
