// winpan-config/src/validation.rs
//! Custom validation functions for configuration.

use std::path::Path;

use validator::ValidationError;
use winpan_core::process::BYTES_PER_SLOT;

/// Validate a log level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(?i)(trace|debug|info|warn|error|off)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that the process filesystem root is an absolute path.
pub fn validate_proc_root(root: &Path) -> Result<(), ValidationError> {
    if root.is_absolute() {
        Ok(())
    } else {
        Err(ValidationError::new("proc_root_must_be_absolute"))
    }
}

/// Bytes needed for one process query: index slots, one node per slot and
/// the descendant output buffer.
pub fn scan_footprint(index_exponent: u32) -> usize {
    (1usize << index_exponent) * BYTES_PER_SLOT
}
