use rand::seq::SliceRandom;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::warn;

use crate::error::{ErrorType, VigilError};

const DEFAULT_CONTEXT: &str = "During the requested operation";
const GENERIC_MESSAGE: &str = "I ran into a technical problem.";
const GENERIC_SUGGESTION: &str =
    "Try again, or tell me more about what you were doing when this happened.";

const ENCOURAGEMENTS: &[&str] = &[
    "Don't worry, we'll sort this out together.",
    "Every problem has a fix. Let's find this one.",
    "This happens to everyone. I'll help you correct it.",
    "Let's get past this and keep going.",
    "Every error is a chance to learn something new.",
];

/// One row of the pattern table. `capture` names the placeholder filled from group 1.
struct PatternSpec {
    pattern: &'static str,
    capture: Option<&'static str>,
    message: &'static str,
    suggestion: &'static str,
}

const PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        pattern: r"FileNotFoundError.*'([^']+)'",
        capture: Some("file"),
        message: "I couldn't find the file '{file}'. Check that the path is correct.",
        suggestion: "Make sure the file exists and that you are allowed to read it.",
    },
    PatternSpec {
        pattern: r"PermissionError.*'([^']+)'",
        capture: Some("file"),
        message: "I don't have permission to access '{file}'.",
        suggestion: "Check the file's permissions, or run with an account that can read it.",
    },
    PatternSpec {
        pattern: r"IsADirectoryError.*'([^']+)'",
        capture: Some("file"),
        message: "'{file}' is a folder, not a file. I need a specific file.",
        suggestion: "Name a file inside that folder instead.",
    },
    PatternSpec {
        pattern: r"ConnectionError",
        capture: None,
        message: "There is a problem with the network connection.",
        suggestion: "Wait a moment and try again. If it keeps happening, check your connection.",
    },
    PatternSpec {
        pattern: r"TimeoutError",
        capture: None,
        message: "The operation took too long to respond.",
        suggestion: "This can happen with very large files or a slow connection.",
    },
    PatternSpec {
        pattern: r"Unauthenticated|invalid api key|status 401",
        capture: None,
        message: "There is a problem with the API key.",
        suggestion: "Confirm the API key in your configuration is correct.",
    },
    PatternSpec {
        pattern: r"QuotaExceeded|quota exceeded|rate limit",
        capture: None,
        message: "The API usage limit was reached.",
        suggestion: "The service limits usage. Try again in a few minutes.",
    },
    PatternSpec {
        pattern: r"SyntaxError.*line (\d+)",
        capture: Some("line"),
        message: "There is a syntax error in the code on line {line}.",
        suggestion: "Check brackets, quotes and indentation on that line.",
    },
    PatternSpec {
        pattern: r"IndentationError",
        capture: None,
        message: "The code's indentation (spacing) is inconsistent.",
        suggestion: "Use the same number of spaces for every indentation level.",
    },
    PatternSpec {
        pattern: r"ModuleNotFoundError.*'([^']+)'",
        capture: Some("module"),
        message: "I couldn't find the module '{module}'. It may not be installed.",
        suggestion: "Install '{module}' or check that its name is spelled correctly.",
    },
    PatternSpec {
        pattern: r"OSError",
        capture: None,
        message: "The operating system reported a problem.",
        suggestion: "Try restarting the program or checking permissions.",
    },
    PatternSpec {
        pattern: r"MemoryError|out of memory",
        capture: None,
        message: "There isn't enough memory. The file or operation is too large.",
        suggestion: "Try a smaller file or close other programs.",
    },
    PatternSpec {
        pattern: r"(?:ValueError|ValidationError).*'([^']*)'",
        capture: Some("value"),
        message: "An invalid value was provided: '{value}'.",
        suggestion: "Check that the values are in the expected format.",
    },
    PatternSpec {
        pattern: r"TypeError",
        capture: None,
        message: "A value has the wrong type.",
        suggestion: "Check that you are using text where text is expected and numbers where numbers are.",
    },
    PatternSpec {
        pattern: r"KeyError.*'([^']+)'",
        capture: Some("key"),
        message: "I couldn't find the key '{key}' in the data.",
        suggestion: "Check that the name is spelled correctly.",
    },
    PatternSpec {
        pattern: r"database disk image is malformed",
        capture: None,
        message: "The database is corrupted.",
        suggestion: "Restore the memory store from a backup.",
    },
];

/// User-facing rendition of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanizedError {
    pub message: String,
    pub suggestion: String,
    pub encouragement: String,
    pub context: String,
    pub technical_details: String,
}

impl HumanizedError {
    /// Context, description, suggestion and encouragement, optionally followed by
    /// the technical details.
    pub fn render(&self, show_technical: bool) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "{}\n\n{}\n\n{}\n\n{}",
            self.context, self.message, self.suggestion, self.encouragement
        );

        if show_technical {
            let _ = write!(out, "\n\nTechnical details:\n{}", self.technical_details);
        }

        out
    }
}

struct CompiledPattern {
    regex: Regex,
    spec: &'static PatternSpec,
}

/// Turns technical errors into plain-language messages.
pub struct ErrorHumanizer {
    patterns: Vec<CompiledPattern>,
}

impl Default for ErrorHumanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHumanizer {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|spec| {
                match RegexBuilder::new(spec.pattern).case_insensitive(true).build() {
                    Ok(regex) => Some(CompiledPattern { regex, spec }),
                    Err(e) => {
                        warn!(pattern = spec.pattern, error = %e, "Skipping invalid humanizer pattern");
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn humanize(&self, error: &VigilError, context: Option<&str>) -> HumanizedError {
        self.humanize_parts(
            Some(error.error_type()),
            error.type_name(),
            &error.detail(),
            context,
        )
    }

    /// Humanize an error known only by its type name and message text.
    pub fn humanize_text(
        &self,
        type_name: &str,
        message: &str,
        context: Option<&str>,
    ) -> HumanizedError {
        let error_type = type_from_name(type_name);
        self.humanize_parts(error_type, type_name, message, context)
    }

    fn humanize_parts(
        &self,
        error_type: Option<ErrorType>,
        type_name: &str,
        detail: &str,
        context: Option<&str>,
    ) -> HumanizedError {
        let text = format!("{}: {}", type_name, detail);

        let (message, suggestion) = self
            .patterns
            .iter()
            .find_map(|p| p.regex.captures(&text).map(|caps| (p.spec, caps)))
            .map(|(spec, caps)| {
                let captured = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                (
                    fill(spec.message, spec.capture, captured),
                    fill(spec.suggestion, spec.capture, captured),
                )
            })
            .unwrap_or_else(|| {
                (
                    generic_message(error_type).to_string(),
                    GENERIC_SUGGESTION.to_string(),
                )
            });

        HumanizedError {
            message,
            suggestion,
            encouragement: encouragement().to_string(),
            context: context.unwrap_or(DEFAULT_CONTEXT).to_string(),
            technical_details: if detail.is_empty() {
                type_name.to_string()
            } else {
                text
            },
        }
    }
}

fn fill(template: &str, placeholder: Option<&str>, value: &str) -> String {
    match placeholder {
        Some(name) => template.replace(&format!("{{{}}}", name), value),
        None => template.to_string(),
    }
}

fn generic_message(error_type: Option<ErrorType>) -> &'static str {
    match error_type {
        Some(ErrorType::Configuration) => "Something is not configured correctly.",
        Some(ErrorType::Runtime) | Some(ErrorType::Metrics) => {
            "Something went wrong while running the operation."
        }
        Some(ErrorType::Serialization) => "I couldn't read or write some data.",
        Some(ErrorType::Internal) | Some(ErrorType::Base) => "An unexpected error occurred.",
        _ => GENERIC_MESSAGE,
    }
}

fn type_from_name(name: &str) -> Option<ErrorType> {
    const ALL: &[ErrorType] = &[
        ErrorType::Base,
        ErrorType::Os,
        ErrorType::FileNotFound,
        ErrorType::PermissionDenied,
        ErrorType::IsADirectory,
        ErrorType::Connection,
        ErrorType::Timeout,
        ErrorType::Validation,
        ErrorType::Configuration,
        ErrorType::Api,
        ErrorType::FileOperation,
        ErrorType::Database,
        ErrorType::Metrics,
        ErrorType::Serialization,
        ErrorType::Runtime,
        ErrorType::Internal,
    ];

    ALL.iter()
        .copied()
        .find(|t| t.name().eq_ignore_ascii_case(name))
}

fn encouragement() -> &'static str {
    ENCOURAGEMENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(ENCOURAGEMENTS[0])
}
