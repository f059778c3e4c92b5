//! Response interpretation: acceptance, rejection and malformed input

use proptest::prelude::*;
use sightline_core::Detection;
use sightline_eye::interpreter::{DetectionStore, MessageOutcome, ResponseInterpreter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

/// Counts WARN events seen by the subscriber it is attached to.
#[derive(Clone, Default)]
struct WarnCounter {
    count: Arc<AtomicUsize>,
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn seeded() -> (DetectionStore, ResponseInterpreter) {
    let store = DetectionStore::new();
    let interpreter = ResponseInterpreter::new(store.clone());
    let outcome = interpreter.on_message(
        br#"{"status":"success","inference_time":0.03,"detections":[
            {"className":"person","confidence":0.91,"x":0.1,"y":0.2,"width":0.3,"height":0.6},
            {"className":"dog","confidence":0.55,"x":0.6,"y":0.5,"width":0.2,"height":0.2}]}"#,
    );
    assert_eq!(
        outcome,
        MessageOutcome::Applied {
            count: 2,
            inference_time: 0.03
        }
    );
    (store, interpreter)
}

#[test]
fn test_success_is_wholesale_replacement() {
    let (store, interpreter) = seeded();
    interpreter.on_message(
        br#"{"status":"success","inference_time":0.01,"detections":[
            {"className":"cup","confidence":0.7,"x":0.4,"y":0.4,"width":0.1,"height":0.1}]}"#,
    );

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0], Detection::new("cup", 0.7, 0.4, 0.4, 0.1, 0.1));
}

#[test]
fn test_missing_status_is_not_success() {
    let (store, interpreter) = seeded();
    let before = store.snapshot();
    let outcome = interpreter.on_message(br#"{"detections":[],"inference_time":0.0}"#);
    assert!(matches!(outcome, MessageOutcome::Rejected { .. }));
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
}

#[test]
fn test_status_match_is_exact() {
    let (store, interpreter) = seeded();
    for status in ["Success", "SUCCESS", " success", "success ", "ok"] {
        let message = format!(r#"{{"status":"{}","detections":[],"inference_time":0.0}}"#, status);
        assert!(matches!(interpreter.on_message(message.as_bytes()), MessageOutcome::Rejected { .. }));
    }
    assert_eq!(store.len(), 2);
    assert_eq!(interpreter.stats().rejected(), 5);
}

#[test]
fn test_single_malformed_message() {
    let (store, interpreter) = seeded();
    let before = store.snapshot();
    let warnings = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());

    let outcome = tracing::subscriber::with_default(subscriber, || {
        interpreter.on_message(br#"{"status":"success","detections":[{"className":"#)
    });
    assert_eq!(outcome, MessageOutcome::Malformed);
    assert_eq!(interpreter.stats().malformed(), 1);
    assert_eq!(warnings.count.load(Ordering::SeqCst), 1);
    assert_eq!(*before, *store.snapshot());
}

#[test]
fn test_one_warning_per_malformed_message() {
    let (_store, interpreter) = seeded();
    let warnings = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());

    tracing::subscriber::with_default(subscriber, || {
        interpreter.on_message(b"not json");
        interpreter.on_message(&[0xC3, 0x28]);
        interpreter.on_message(br#"{"status":"error","detections":[]}"#);
    });
    // The rejected reply is not a warning.
    assert_eq!(warnings.count.load(Ordering::SeqCst), 2);
    assert_eq!(interpreter.stats().malformed(), 2);
}

#[test]
fn test_wrong_field_types_are_malformed() {
    let (store, interpreter) = seeded();
    let outcome = interpreter.on_message(br#"{"status":"success","detections":"none","inference_time":0.0}"#);
    assert_eq!(outcome, MessageOutcome::Malformed);
    assert_eq!(store.len(), 2);
}

proptest! {
    #[test]
    fn prop_non_success_never_mutates(
        status in "[a-zA-Z_ ]{0,12}".prop_filter("not success", |s| s != "success"),
        count in 0usize..5,
    ) {
        let (store, interpreter) = seeded();
        let before = store.snapshot();

        let detections: Vec<Detection> = (0..count)
            .map(|i| Detection::new(format!("obj{}", i), 0.5, 0.1, 0.1, 0.2, 0.2))
            .collect();
        let message = serde_json::json!({
            "status": status,
            "inference_time": 0.02,
            "detections": detections,
        })
        .to_string();

        let outcome = interpreter.on_message(message.as_bytes());
        let is_rejected = matches!(outcome, MessageOutcome::Rejected { .. });
        prop_assert!(is_rejected);
        let after = store.snapshot();
        prop_assert_eq!(&*before, &*after);
    }

    #[test]
    fn prop_garbage_never_mutates(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let (store, interpreter) = seeded();
        let before = store.snapshot();
        interpreter.on_message(&bytes);
        let after = store.snapshot();
        prop_assert_eq!(&*before, &*after);
    }
}
