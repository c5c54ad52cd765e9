//! Error handling services: recovery, statistics, validation and humanized messages.
//!
//! The error types themselves live in [`crate::error`].

mod handler;
mod humanizer;
mod validation;

pub use handler::{
    fallback_on_api_error, retry_on_network_error, with_error_handling,
    with_error_handling_async, ErrorHandler, ErrorInfo, ErrorStatistics, RecoveryStrategy,
};
pub use humanizer::{ErrorHumanizer, HumanizedError};
pub use validation::{validate_api_response, validate_file_path, validate_input, Validator};
