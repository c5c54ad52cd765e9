use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vigil_core::{
    error_context, validate_file_path, with_error_handling, ErrorHandler, ErrorHumanizer,
    ErrorType, VigilError, VigilResult,
};

mod humanizer_tests {
    use super::*;

    #[test]
    fn test_file_not_found_mentions_missing_file() {
        let humanizer = ErrorHumanizer::new();
        let err = VigilError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "[Errno 2] No such file or directory: 'missing.py'",
        ));

        let rendered = humanizer.humanize(&err, None).render(false);
        assert!(rendered.contains("missing.py"));
        assert!(!rendered.contains("Technical details"));
    }

    #[test]
    fn test_message_text_from_other_tools() {
        let humanizer = ErrorHumanizer::new();

        let quota = humanizer.humanize_text("ResourceExhausted", "QuotaExceeded for model", None);
        assert!(quota.message.contains("usage limit"));

        let db = humanizer.humanize_text("DatabaseError", "database disk image is malformed", None);
        assert!(db.message.contains("corrupted"));
    }
}

mod handler_tests {
    use super::*;

    #[test]
    fn test_strategy_invoked_once_for_exact_type_only() {
        let handler = ErrorHandler::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&invocations);
        handler.register_recovery_strategy(ErrorType::FileNotFound, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some("created empty file".to_string()))
        });

        let missing = VigilError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let info = handler.handle(&missing, None, true, true);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(info.recovery_result.as_deref(), Some("created empty file"));

        handler.handle(&VigilError::configuration("no model", "model"), None, true, true);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unrecovered_error_is_wrapped_not_dropped() {
        let handler = ErrorHandler::with_default_strategies();

        let result: VigilResult<String> = with_error_handling(
            &handler,
            error_context!("opening the requested file").with_user_input("open notes.txt"),
            || {
                validate_file_path("/definitely/not/here/notes.txt", true, true)?;
                Ok::<String, VigilError>("contents".to_string())
            },
        );

        let err = result.unwrap_err();
        assert_eq!(err.error_code(), "E9100");
        assert_eq!(err.type_name(), "FileOperationError");

        match err {
            VigilError::Contextual {
                context, recovery, ..
            } => {
                assert_eq!(context.user_input.as_deref(), Some("open notes.txt"));
                assert!(recovery.is_none());
            }
            other => panic!("expected contextual error, got {:?}", other),
        }

        let stats = handler.statistics();
        assert_eq!(stats.breakdown.get("FileOperationError"), Some(&1));
    }
}
