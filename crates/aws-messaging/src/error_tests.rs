//! Tests for error types and classification.

use super::*;

#[test]
fn test_lookup_not_found_names_the_queue() {
    let err = TransportError::service("AWS.SimpleQueueService.NonExistentQueue", "nope");

    let classified = ErrorClassifier::classify_lookup(err, "my_queue");

    assert!(classified.is_queue_not_found());
    assert_eq!(classified.to_string(), "Unable to find queue `my_queue`");
}

#[test]
fn test_lookup_accepts_json_protocol_not_found_code() {
    let err = TransportError::service("QueueDoesNotExist", "nope");

    let classified = ErrorClassifier::classify_lookup(err, "my_queue");

    assert!(matches!(
        classified,
        MessagingError::QueueNotFound { ref queue_name } if queue_name == "my_queue"
    ));
}

#[test]
fn test_lookup_other_code_is_client_error() {
    let err = TransportError::service("AWS.SimpleQueueService.AccessDeniedException", "denied");

    let classified = ErrorClassifier::classify_lookup(err, "my_queue");

    assert_eq!(
        classified.code(),
        Some("AWS.SimpleQueueService.AccessDeniedException")
    );
    assert!(!classified.is_queue_not_found());
}

#[test]
fn test_not_found_code_outside_lookup_stays_client_error() {
    let err = TransportError::service("AWS.SimpleQueueService.NonExistentQueue", "gone");

    let classified = ErrorClassifier::classify(err);

    assert_eq!(
        classified.code(),
        Some("AWS.SimpleQueueService.NonExistentQueue")
    );
}

#[test]
fn test_non_service_failure_is_untagged() {
    let classified = ErrorClassifier::classify(TransportError::other("connection reset"));

    match classified {
        MessagingError::ClientError {
            code,
            message,
            transient,
        } => {
            assert!(code.is_none());
            assert_eq!(message, "connection reset");
            assert!(transient);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_classification_ignores_message_text() {
    let err = TransportError::service("InvalidParameterValue", "NonExistentQueue");

    let classified = ErrorClassifier::classify_lookup(err, "q");

    assert!(!classified.is_queue_not_found());
}

#[test]
fn test_display_includes_code_when_present() {
    let tagged = MessagingError::ClientError {
        code: Some("KmsThrottled".to_string()),
        message: "slow down".to_string(),
        transient: false,
    };
    assert_eq!(tagged.to_string(), "Client error (KmsThrottled): slow down");

    let untagged = MessagingError::client("boom");
    assert_eq!(untagged.to_string(), "Client error: boom");
}

#[test]
fn test_error_transience() {
    assert!(!MessagingError::QueueNotFound {
        queue_name: "q".to_string()
    }
    .is_transient());

    let dropped = ErrorClassifier::classify(TransportError::other("timeout"));
    assert!(dropped.is_transient());

    let throttled = ErrorClassifier::classify(TransportError::service("RequestThrottled", ""));
    assert!(throttled.is_transient());

    let denied = ErrorClassifier::classify(TransportError::service("AccessDenied", ""));
    assert!(!denied.is_transient());
}

#[test]
fn test_misuse_is_untagged_but_not_transient() {
    let closed = MessagingError::not_open("my_queue");
    let misuse = MessagingError::client("message was not received from queue `q`");

    for err in [closed, misuse] {
        assert_eq!(err.code(), None);
        assert!(!err.is_queue_not_found());
        assert!(!err.is_transient());
    }
}
