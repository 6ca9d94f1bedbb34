use std::path::{Component, Path};

use crate::TransferError;

/// Validates a file name announced by the sender before it touches the disk.
///
/// The name must be a single path component. Rejects:
/// - Empty names
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`) and the bare `.` entry
/// - Any separator, i.e. names that would land in a subdirectory
/// - Windows drive prefixes (`C:name`)
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidFileName("empty name".into()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(TransferError::InvalidFileName(format!(
            "path separators not allowed: {name}"
        )));
    }

    if name.len() >= 2 && name.as_bytes()[1] == b':' {
        return Err(TransferError::InvalidFileName(format!(
            "drive prefix not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidFileName(format!(
            "not a plain file name: {name}"
        ))),
    }
}
