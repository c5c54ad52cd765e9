use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::humanizer::ErrorHumanizer;
use crate::error::{ErrorContext, ErrorType, Severity, VigilError, VigilResult};

pub type RecoveryStrategy = Arc<dyn Fn(&VigilError) -> VigilResult<Option<String>> + Send + Sync>;

/// Everything known about one handled error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Occurrences of this error type so far, including this one
    pub frequency: u64,
    /// The error followed by its source chain
    pub traceback: Vec<String>,
    pub context: Option<ErrorContext>,
    pub recovery_attempted: bool,
    pub recovery_result: Option<String>,
    pub user_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub total_errors: u64,
    pub error_types: usize,
    pub most_common: Option<(String, u64)>,
    pub breakdown: BTreeMap<String, u64>,
}

#[derive(Default)]
struct HandlerState {
    counts: BTreeMap<String, u64>,
    strategies: Vec<(ErrorType, RecoveryStrategy)>,
}

/// Classifies errors, counts them, runs recovery strategies and renders user messages.
pub struct ErrorHandler {
    humanizer: ErrorHumanizer,
    state: Mutex<HandlerState>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self {
            humanizer: ErrorHumanizer::new(),
            state: Mutex::new(HandlerState::default()),
        }
    }

    /// Handler with the network-retry and API-fallback strategies registered.
    pub fn with_default_strategies() -> Self {
        let handler = Self::new();
        handler.register_recovery_strategy(ErrorType::Connection, retry_on_network_error);
        handler.register_recovery_strategy(ErrorType::Api, fallback_on_api_error);
        handler
    }

    pub fn humanizer(&self) -> &ErrorHumanizer {
        &self.humanizer
    }

    /// Register `strategy` for `error_type`, replacing any strategy already
    /// registered for exactly that type.
    pub fn register_recovery_strategy<F>(&self, error_type: ErrorType, strategy: F)
    where
        F: Fn(&VigilError) -> VigilResult<Option<String>> + Send + Sync + 'static,
    {
        let strategy: RecoveryStrategy = Arc::new(strategy);
        let mut state = self.state.lock();

        match state.strategies.iter_mut().find(|(t, _)| *t == error_type) {
            Some(slot) => slot.1 = strategy,
            None => state.strategies.push((error_type, strategy)),
        }

        debug!(error_type = %error_type, "Recovery strategy registered");
    }

    pub fn handle(
        &self,
        err: &VigilError,
        context: Option<&ErrorContext>,
        user_friendly: bool,
        attempt_recovery: bool,
    ) -> ErrorInfo {
        let type_name = err.type_name();

        let frequency = {
            let mut state = self.state.lock();
            let count = state.counts.entry(type_name.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        self.log(err, context, frequency);

        let (recovery_attempted, recovery_result) = if attempt_recovery {
            self.attempt_recovery(err)
        } else {
            (false, None)
        };

        let user_message = user_friendly.then(|| {
            self.humanizer
                .humanize(err, context.map(|c| c.operation.as_str()))
                .render(false)
        });

        ErrorInfo {
            error_type: type_name.to_string(),
            code: err.error_code().to_string(),
            message: err.to_string(),
            severity: err.severity(),
            timestamp: Utc::now(),
            frequency,
            traceback: source_chain(err),
            context: context.cloned(),
            recovery_attempted,
            recovery_result,
            user_message,
        }
    }

    fn log(&self, err: &VigilError, context: Option<&ErrorContext>, frequency: u64) {
        let module = context.map(|c| c.module.as_str()).unwrap_or("unknown");
        let code = err.error_code();

        match err.severity() {
            Severity::Critical | Severity::High => {
                error!(error_code = %code, frequency = frequency, "Error in {}: {}", module, err)
            }
            Severity::Medium => {
                warn!(error_code = %code, frequency = frequency, "Error in {}: {}", module, err)
            }
            Severity::Low => {
                info!(error_code = %code, frequency = frequency, "Error in {}: {}", module, err)
            }
        }
    }

    /// Run at most one strategy: the exact type's, else the first registered ancestor's.
    fn attempt_recovery(&self, err: &VigilError) -> (bool, Option<String>) {
        let error_type = err.error_type();

        let selected = {
            let state = self.state.lock();
            state
                .strategies
                .iter()
                .find(|(t, _)| *t == error_type)
                .or_else(|| state.strategies.iter().find(|(t, _)| error_type.is_a(*t)))
                .map(|(t, s)| (*t, Arc::clone(s)))
        };

        let Some((registered_for, strategy)) = selected else {
            return (false, None);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| strategy(err))) {
            Ok(Ok(result)) => {
                debug!(
                    error_type = %error_type,
                    strategy_for = %registered_for,
                    recovered = result.is_some(),
                    "Recovery strategy ran"
                );
                (true, result)
            }
            Ok(Err(e)) => {
                warn!(strategy_for = %registered_for, error = %e, "Recovery strategy failed");
                (true, None)
            }
            Err(_) => {
                warn!(strategy_for = %registered_for, "Recovery strategy panicked");
                (true, None)
            }
        }
    }

    pub fn statistics(&self) -> ErrorStatistics {
        let state = self.state.lock();

        let most_common = state
            .counts
            .iter()
            .fold(None::<(&String, u64)>, |best, (name, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((name, *count)),
            })
            .map(|(name, count)| (name.clone(), count));

        ErrorStatistics {
            total_errors: state.counts.values().sum(),
            error_types: state.counts.len(),
            most_common,
            breakdown: state.counts.clone(),
        }
    }
}

fn source_chain(err: &VigilError) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

/// Run `op`; on failure handle the error and return it wrapped with `context`.
pub fn with_error_handling<T, E, F>(
    handler: &ErrorHandler,
    context: ErrorContext,
    op: F,
) -> VigilResult<T>
where
    E: Into<VigilError>,
    F: FnOnce() -> Result<T, E>,
{
    op().map_err(|e| wrap(handler, context, e.into()))
}

pub async fn with_error_handling_async<T, E, Fut>(
    handler: &ErrorHandler,
    context: ErrorContext,
    future: Fut,
) -> VigilResult<T>
where
    E: Into<VigilError>,
    Fut: Future<Output = Result<T, E>>,
{
    future.await.map_err(|e| wrap(handler, context, e.into()))
}

fn wrap(handler: &ErrorHandler, context: ErrorContext, err: VigilError) -> VigilError {
    let info = handler.handle(&err, Some(&context), true, true);

    VigilError::Contextual {
        message: info.user_message.unwrap_or_else(|| err.to_string()),
        severity: err.severity(),
        context: Box::new(context),
        recovery: info.recovery_result,
        source: Box::new(err),
    }
}

/// Suggest a retry for errors that mention the network or a connection.
pub fn retry_on_network_error(err: &VigilError) -> VigilResult<Option<String>> {
    let text = err.to_string().to_lowercase();
    Ok((text.contains("network") || text.contains("connection"))
        .then(|| "network_retry_suggested".to_string()))
}

/// Switch to fallback mode for API failures.
pub fn fallback_on_api_error(err: &VigilError) -> VigilResult<Option<String>> {
    let is_api = matches!(err.error_type(), ErrorType::Api)
        || err.to_string().to_lowercase().contains("api");
    Ok(is_api.then(|| "api_fallback_mode".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_context;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_frequency_counts_by_type() {
        let handler = ErrorHandler::new();
        let err = VigilError::runtime("tick failed");

        assert_eq!(handler.handle(&err, None, false, false).frequency, 1);
        assert_eq!(handler.handle(&err, None, false, false).frequency, 2);

        let other = VigilError::Timeout("model".to_string());
        assert_eq!(handler.handle(&other, None, false, false).frequency, 1);

        let stats = handler.statistics();
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.error_types, 2);
        assert_eq!(stats.most_common, Some(("RuntimeError".to_string(), 2)));
        assert_eq!(stats.breakdown.get("TimeoutError"), Some(&1));
    }

    #[test]
    fn test_exact_strategy_runs_once_and_unrelated_type_does_not() {
        let handler = ErrorHandler::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        handler.register_recovery_strategy(ErrorType::Validation, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some("use default".to_string()))
        });

        let info = handler.handle(
            &VigilError::validation("bad port", "port", -1),
            None,
            false,
            true,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(info.recovery_attempted);
        assert_eq!(info.recovery_result.as_deref(), Some("use default"));

        let info = handler.handle(&VigilError::runtime("boom"), None, false, true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!info.recovery_attempted);
        assert!(info.recovery_result.is_none());
    }

    #[test]
    fn test_exact_match_beats_ancestor() {
        let handler = ErrorHandler::new();
        handler.register_recovery_strategy(ErrorType::Os, |_| Ok(Some("os".to_string())));
        handler.register_recovery_strategy(ErrorType::FileNotFound, |_| {
            Ok(Some("file".to_string()))
        });

        let missing = VigilError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let info = handler.handle(&missing, None, false, true);
        assert_eq!(info.recovery_result.as_deref(), Some("file"));

        let denied = VigilError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        let info = handler.handle(&denied, None, false, true);
        assert_eq!(info.recovery_result.as_deref(), Some("os"));
    }

    #[test]
    fn test_ancestor_strategies_follow_registration_order() {
        let handler = ErrorHandler::new();
        handler.register_recovery_strategy(ErrorType::Base, |_| Ok(Some("base".to_string())));
        handler.register_recovery_strategy(ErrorType::Os, |_| Ok(Some("os".to_string())));

        let timed_out = VigilError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        let info = handler.handle(&timed_out, None, false, true);
        assert_eq!(info.recovery_result.as_deref(), Some("base"));
    }

    #[test]
    fn test_failing_strategy_means_no_recovery() {
        let handler = ErrorHandler::new();
        let fallback_calls = Arc::new(AtomicUsize::new(0));

        handler.register_recovery_strategy(ErrorType::Timeout, |_| {
            Err(VigilError::runtime("strategy broke"))
        });
        let counter = Arc::clone(&fallback_calls);
        handler.register_recovery_strategy(ErrorType::Os, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some("os".to_string()))
        });

        let info = handler.handle(&VigilError::Timeout("slow".into()), None, false, true);
        assert!(info.recovery_attempted);
        assert!(info.recovery_result.is_none());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);

        handler.register_recovery_strategy(ErrorType::Timeout, |_| panic!("strategy bug"));
        let info = handler.handle(&VigilError::Timeout("slow".into()), None, false, true);
        assert!(info.recovery_result.is_none());
    }

    #[test]
    fn test_default_strategies() {
        let handler = ErrorHandler::with_default_strategies();

        let info = handler.handle(
            &VigilError::Connection("upstream unreachable".into()),
            None,
            false,
            true,
        );
        assert_eq!(info.recovery_result.as_deref(), Some("network_retry_suggested"));

        let info = handler.handle(
            &VigilError::api("model overloaded", Some("llm"), Some(503)),
            None,
            false,
            true,
        );
        assert_eq!(info.recovery_result.as_deref(), Some("api_fallback_mode"));
    }

    #[test]
    fn test_user_message_and_context() {
        let handler = ErrorHandler::new();
        let context = ErrorContext::new("vigil::files", "reading the project file")
            .with_file_path("missing.py");
        let err = VigilError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "No such file or directory: 'missing.py'",
        ));

        let info = handler.handle(&err, Some(&context), true, false);
        let message = info.user_message.unwrap();
        assert!(message.starts_with("reading the project file"));
        assert!(message.contains("missing.py"));
        assert_eq!(info.error_type, "FileNotFoundError");
        assert_eq!(info.code, "E3002");
        assert_eq!(info.context, Some(context));
    }

    #[test]
    fn test_with_error_handling_wraps_and_keeps_source() {
        let handler = ErrorHandler::with_default_strategies();

        let result: VigilResult<()> = with_error_handling(
            &handler,
            error_context!("syncing models"),
            || Err(VigilError::Connection("connection reset".into())),
        );

        match result {
            Err(VigilError::Contextual {
                message,
                context,
                recovery,
                source,
                ..
            }) => {
                assert!(message.contains("network"));
                assert_eq!(context.operation, "syncing models");
                assert!(context.location.is_some());
                assert_eq!(recovery.as_deref(), Some("network_retry_suggested"));
                assert!(matches!(*source, VigilError::Connection(_)));
            }
            other => panic!("expected contextual error, got {:?}", other),
        }

        assert_eq!(handler.statistics().total_errors, 1);
    }

    #[test]
    fn test_with_error_handling_passes_success_through() {
        let handler = ErrorHandler::new();
        let result = with_error_handling(&handler, error_context!("adding"), || {
            Ok::<_, VigilError>(2 + 2)
        });
        assert_eq!(result.unwrap(), 4);
        assert_eq!(handler.statistics().total_errors, 0);
    }

    #[tokio::test]
    async fn test_with_error_handling_async() {
        let handler = ErrorHandler::new();
        let result: VigilResult<u8> = with_error_handling_async(
            &handler,
            error_context!("loading history"),
            async { Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")) },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.type_name(), "PermissionError");
        assert_eq!(err.error_code(), "E9100");
    }

    #[test]
    fn test_traceback_includes_sources() {
        let handler = ErrorHandler::new();
        let inner = VigilError::Timeout("llm".into());
        let wrapped = VigilError::Contextual {
            message: "call failed".into(),
            severity: Severity::High,
            context: Box::new(ErrorContext::new("vigil::llm", "calling the model")),
            recovery: None,
            source: Box::new(inner),
        };

        let info = handler.handle(&wrapped, None, false, false);
        assert_eq!(info.traceback.len(), 2);
        assert!(info.traceback[1].contains("timed out"));
        assert_eq!(info.error_type, "TimeoutError");
    }
}
