use super::*;
use chrono::Duration;
use pretty_assertions::assert_eq;

#[test]
fn tick_clears_stale_info_only() {
    let mut state = state();
    runtime(
        &mut state,
        RuntimeAction::SetStatus(StatusMessage::info("Flushed session: a")),
    );
    let set_at = state.status_set_at.expect("timestamp");

    assert!(runtime(&mut state, RuntimeAction::Tick(set_at + Duration::seconds(1))).is_empty());
    assert_eq!(
        runtime(&mut state, RuntimeAction::Tick(set_at + Duration::seconds(4))),
        vec![Effect::RequestFrame]
    );
    assert_eq!(state.status, None);
}

#[test]
fn tick_keeps_errors() {
    let mut state = state();
    runtime(
        &mut state,
        RuntimeAction::EditorFinished(Err("Failed to launch editor: not found".to_string())),
    );
    let set_at = state.status_set_at.expect("timestamp");
    runtime(&mut state, RuntimeAction::Tick(set_at + Duration::minutes(5)));
    assert_eq!(
        state.status.as_ref().map(|status| status.level),
        Some(StatusLevel::Error)
    );
}

#[test]
fn refreshed_notice_is_routine() {
    let mut state = state();
    fetched(&mut state, Vec::new());
    assert!(state.status.as_ref().is_some_and(StatusMessage::is_routine));
    assert!(!StatusMessage::info("Started session: a").is_routine());
}
