use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::error::{VigilError, VigilResult};

/// A named predicate over a value.
pub type Validator<'a, T> = (&'a str, &'a dyn Fn(&T) -> bool);

/// Check `value` against every validator in order; the first failure is returned.
pub fn validate_input<T: Debug>(
    value: &T,
    validators: &[Validator<'_, T>],
    field: &str,
) -> VigilResult<()> {
    for (name, check) in validators {
        if !check(value) {
            return Err(VigilError::validation(
                format!("Validation failed for {}: {}", field, name),
                field,
                value,
            ));
        }
    }
    Ok(())
}

pub fn validate_file_path(
    path: impl AsRef<Path>,
    must_exist: bool,
    must_be_file: bool,
) -> VigilResult<PathBuf> {
    let path = path.as_ref();
    let display = path.display().to_string();

    if path.as_os_str().is_empty() {
        return Err(VigilError::file_operation(
            "Invalid file path: path is empty",
            display,
            "validation",
        ));
    }

    let exists = path.exists();

    if must_exist && !exists {
        return Err(VigilError::file_operation(
            format!("File does not exist: '{}'", display),
            display,
            "validation",
        ));
    }

    if must_be_file && exists && !path.is_file() {
        return Err(VigilError::file_operation(
            format!("Path is not a file: '{}'", display),
            display,
            "validation",
        ));
    }

    Ok(path.to_path_buf())
}

/// Reject null responses and, when `expected_fields` is non-empty, responses
/// that are not objects or lack any of the fields.
pub fn validate_api_response(
    response: &serde_json::Value,
    expected_fields: &[&str],
) -> VigilResult<()> {
    if response.is_null() {
        return Err(VigilError::api("API response is empty", None, None));
    }

    if expected_fields.is_empty() {
        return Ok(());
    }

    let Some(object) = response.as_object() else {
        return Err(VigilError::api("API response is not an object", None, None));
    };

    let missing: Vec<&str> = expected_fields
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(VigilError::api(
            format!("API response missing fields: {}", missing.join(", ")),
            None,
            None,
        ))
    }
}
