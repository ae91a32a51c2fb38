//! Record output module.

use serde_json::Value;

use crate::error::AppResult;

/// Key Xata uses for per-record bookkeeping.
pub const XATA_METADATA_KEY: &str = "xata";

/// Removes the `"xata": {"version": N}` entry from a record.
///
/// Returns `true` if the entry was removed. A `xata` value that carries
/// anything besides `version` is left alone.
pub fn strip_xata_metadata(record: &mut Value) -> bool {
    let Some(obj) = record.as_object_mut() else {
        return false;
    };

    let is_version_only = obj
        .get(XATA_METADATA_KEY)
        .and_then(Value::as_object)
        .is_some_and(|meta| meta.len() == 1 && meta.get("version").is_some_and(Value::is_number));

    if is_version_only {
        obj.shift_remove(XATA_METADATA_KEY);
    }
    is_version_only
}

/// Serializes a sanitized record as a single compact JSON line (no newline).
pub fn record_line(record: &Value) -> AppResult<String> {
    let mut record = record.clone();
    strip_xata_metadata(&mut record);
    Ok(serde_json::to_string(&record)?)
}
