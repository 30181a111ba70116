// Unit tests for the transcript aggregator.

use voicelink::{Role, TranscriptLog};

#[test]
fn test_partial_appends_open_entry() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "hel".to_string(), false);

    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].content, "hel");
    assert!(!log.entries()[0].is_final);
}

#[test]
fn test_partial_replaces_latest_open_entry_for_role() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "hel".to_string(), false);
    log.apply(Role::User, "hello".to_string(), false);
    log.apply(Role::User, "hello there".to_string(), false);

    assert_eq!(log.len(), 1, "Partials must refine in place, not append");
    assert_eq!(log.entries()[0].content, "hello there");
}

#[test]
fn test_at_most_one_open_entry_per_role() {
    let mut log = TranscriptLog::new();

    // Interleave partials for both parties in arbitrary order.
    log.apply(Role::User, "one".to_string(), false);
    log.apply(Role::Assistant, "a".to_string(), false);
    log.apply(Role::User, "one two".to_string(), false);
    log.apply(Role::Assistant, "ab".to_string(), false);
    log.apply(Role::Assistant, "abc".to_string(), false);

    for role in [Role::User, Role::Assistant] {
        let open = log.entries().iter().filter(|e| e.role == role && !e.is_final).count();
        assert!(open <= 1, "More than one open entry for {role}");
    }
    assert_eq!(log.len(), 2);
    assert_eq!(log.open_entry(Role::User).unwrap().content, "one two");
    assert_eq!(log.open_entry(Role::Assistant).unwrap().content, "abc");
}

#[test]
fn test_final_closes_the_open_entry() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "hello".to_string(), false);
    log.apply(Role::User, "hello world".to_string(), true);

    assert_eq!(log.len(), 1);
    assert!(log.entries()[0].is_final);
    assert_eq!(log.entries()[0].content, "hello world");
    assert!(log.open_entry(Role::User).is_none());
}

#[test]
fn test_final_without_open_entry_appends() {
    let mut log = TranscriptLog::new();

    log.apply(Role::Assistant, "done".to_string(), true);

    assert_eq!(log.len(), 1);
    assert!(log.entries()[0].is_final);
}

#[test]
fn test_finalization_is_irreversible() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "first utterance".to_string(), true);
    // Later traffic for the same role must open a new entry, never touch
    // the closed one.
    log.apply(Role::User, "second".to_string(), false);
    log.apply(Role::User, "second utterance".to_string(), true);

    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[0].content, "first utterance");
    assert!(log.entries()[0].is_final);
    assert_eq!(log.entries()[1].content, "second utterance");
}

#[test]
fn test_roles_do_not_interfere() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "question".to_string(), false);
    log.apply(Role::Assistant, "answer".to_string(), true);
    log.apply(Role::User, "question?".to_string(), true);

    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[0].role, Role::User);
    assert_eq!(log.entries()[0].content, "question?");
    assert_eq!(log.entries()[1].role, Role::Assistant);
}

#[test]
fn test_finalized_filter_for_permanent_display() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "said".to_string(), true);
    log.apply(Role::Assistant, "typing...".to_string(), false);

    let finalized: Vec<_> = log.finalized().collect();
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].content, "said");
}

#[test]
fn test_snapshot_is_detached_from_later_updates() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "before".to_string(), false);
    let snapshot = log.snapshot();
    log.apply(Role::User, "after".to_string(), false);

    assert_eq!(snapshot[0].content, "before");
    assert_eq!(log.entries()[0].content, "after");
}

#[test]
fn test_clear_resets_for_next_session() {
    let mut log = TranscriptLog::new();

    log.apply(Role::User, "old session".to_string(), true);
    log.clear();

    assert!(log.is_empty());
}
