//! Integration tests for the error taxonomy
//!
//! Tests error kinds, messages, and context.

use simtree::foundation::{Error, ErrorContext, ErrorKind};

// =============================================================================
// Messages
// =============================================================================

#[test]
fn kinds_render_their_fields() {
    let err = Error::collision("top.core", "lsu");
    assert!(matches!(err.kind, ErrorKind::Collision { .. }));
    let text = err.to_string();
    assert!(text.contains("top.core"));
    assert!(text.contains("lsu"));

    let err = Error::phase("add child", "FINALIZED");
    assert!(err.is_phase_error());
    assert!(err.to_string().contains("FINALIZED"));
}

#[test]
fn location_context_is_appended() {
    let err = Error::not_found("a.x", "top").at("top.a");
    assert!(err.is_not_found());
    assert!(err.to_string().contains("top.a"));
}

#[test]
fn context_frames() {
    let ctx = ErrorContext::new()
        .with_location("top")
        .with_frame("finalize");
    let err = Error::finalization("top", "bad parameter").with_context(ctx);
    let context = err.context.as_ref().unwrap();
    assert_eq!(context.location.as_deref(), Some("top"));
    assert_eq!(context.stack, vec!["finalize".to_owned()]);
}

#[test]
fn destination_errors_keep_source() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = Error::destination_open("/tmp/x.log", io);
    assert!(err.to_string().contains("denied"));
    let ErrorKind::DestinationOpen { source, .. } = &err.kind else {
        panic!("expected DestinationOpen, got {err}");
    };
    assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
}
