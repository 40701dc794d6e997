//! CLI Exit Code Registry
//!
//! Single source of truth for the process exit status. Scripts rely on these.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 2    | CLI usage error (bad args, reported by clap)     |
//! | 60   | Config could not be parsed or failed validation  |
//! | 61   | Runtime failure (unreadable input, bad table)    |
//! | 62   | Manual review pending and `--strict` was given   |

use parcel_recon::ReconError;

/// Success - run completed, outputs written.
pub const EXIT_SUCCESS: u8 = 0;

/// Config parse or validation failure.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// Input could not be read or loaded, or outputs could not be written.
pub const EXIT_RECON_RUNTIME: u8 = 61;

/// Run succeeded but left records for a human (`--strict` only).
pub const EXIT_RECON_REVIEW_PENDING: u8 = 62;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::MissingColumn { .. } | ReconError::DateParse { .. } | ReconError::Io(_) => {
            EXIT_RECON_RUNTIME
        }
    }
}
