//! Human-readable error descriptions, exit codes and structured JSON errors.

use udm_core::error::{BuildError, UdmError};

/// Exit code: configuration could not be loaded or is invalid.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code: a peripheral failed or timed out.
pub const EXIT_HARDWARE: i32 = 3;
/// Exit code: the nonvolatile store could not be read or written.
pub const EXIT_STORAGE: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingEcho => {
                "What happened: No echo input was provided to the controller.\nLikely causes: The sensor backend failed to initialize or was not wired into the builder.\nHow to fix: Check [pins].echo and make sure the board opened successfully.".to_string()
            }
            BuildError::MissingTrigger => {
                "What happened: No trigger output was provided to the controller.\nLikely causes: The sensor backend failed to initialize or was not wired into the builder.\nHow to fix: Check [pins].trigger and make sure the board opened successfully.".to_string()
            }
            BuildError::MissingDisplay => {
                "What happened: No display was provided to the controller.\nLikely causes: Digit or segment pins failed to initialize.\nHow to fix: Check [pins].digits and [pins].segments.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ue) = err.downcast_ref::<UdmError>() {
        return match ue {
            UdmError::Config(msg) => format!(
                "What happened: Configuration error ({msg}).\nLikely causes: A missing file, a TOML syntax error, or an out-of-range value.\nHow to fix: Edit the config file (see etc/udm.toml for a sample) and rerun."
            ),
            UdmError::Timeout => {
                "What happened: The echo line did not return low in time.\nLikely causes: Sensor not powered, echo wired to the wrong pin, or a missing level shifter.\nHow to fix: Verify [pins].echo and the sensor's 5V/GND, then rerun self-check.".to_string()
            }
            UdmError::Storage(msg) => format!(
                "What happened: The threshold store failed ({msg}).\nLikely causes: The EEPROM image path is not writable or the file is damaged.\nHow to fix: Check [storage].path and its permissions; delete the image to start blank."
            ),
            UdmError::Hardware(msg) | UdmError::HardwareFault(msg) => format!(
                "What happened: A peripheral failed ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO."
            ),
            UdmError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors raised before the typed layer
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("gpio") || lower.contains("permission denied") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access /dev/gpiomem.".to_string();
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

/// Stable exit codes: 2 config, 3 hardware, 4 storage, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => EXIT_CONFIG,
            _ => EXIT_HARDWARE,
        };
    }
    if let Some(ue) = err.downcast_ref::<UdmError>() {
        return match ue {
            UdmError::Config(_) => EXIT_CONFIG,
            UdmError::Hardware(_) | UdmError::HardwareFault(_) | UdmError::Timeout => {
                EXIT_HARDWARE
            }
            UdmError::Storage(_) => EXIT_STORAGE,
            UdmError::State(_) => 1,
        };
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        EXIT_CONFIG => "Config",
        EXIT_HARDWARE => "Hardware",
        EXIT_STORAGE => "Storage",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
