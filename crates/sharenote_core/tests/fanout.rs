use sharenote_core::db::open_db_in_memory;
use sharenote_core::realtime::{Audience, SubscriptionKey};
use sharenote_core::model::lifecycle::EntityKind;
use sharenote_core::{
    ChannelSink, CollabCore, CollabError, ConnectionSink, EventKind, Fanout, NewListItem,
    NewNote, Origin, User,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Default)]
struct RecordingSink {
    frames: Mutex<Vec<String>>,
    broken: AtomicBool,
}

impl RecordingSink {
    fn events(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|frame| frame.starts_with("event: "))
            .cloned()
            .collect()
    }

    fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    fn break_transport(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl ConnectionSink for RecordingSink {
    fn write_frame(&self, frame: &str) -> io::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        self.frames.lock().unwrap().push(frame.to_string());
        Ok(())
    }
}

fn core() -> CollabCore {
    CollabCore::with_connection(open_db_in_memory().unwrap())
}

fn join(core: &CollabCore, name: &str, salt: &str) -> Origin {
    let user = User::new(Uuid::new_v4(), name, format!("{name}@example.com"));
    core.register_identity(&user).unwrap();
    Origin::new(user).with_salt(salt)
}

fn listen(core: &CollabCore, origin: &Origin) -> (Arc<RecordingSink>, sharenote_core::Subscription) {
    let sink = Arc::new(RecordingSink::default());
    let subscription = core
        .subscribe(
            origin.user.id,
            origin.salt.as_deref().unwrap(),
            Arc::clone(&sink) as Arc<dyn ConnectionSink>,
        )
        .unwrap();
    (sink, subscription)
}

#[test]
fn subscribe_writes_initialized_frame_first() {
    let core = core();
    let alice = join(&core, "alice", "s1");

    let (sink, _subscription) = listen(&core, &alice);

    let frames = sink.frames.lock().unwrap().clone();
    assert_eq!(frames, vec!["data: {\"initialized\":true}\n\n".to_string()]);
}

#[test]
fn groceries_scenario_skips_originating_connection() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");

    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    let (alice_sink, _alice_sub) = listen(&core, &alice);
    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let (bob_sink, _bob_sub) = listen(&core, &bob);

    core.list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();

    let bob_events = bob_sink.events();
    assert_eq!(bob_events.len(), 1);
    assert!(bob_events[0].starts_with("event: EVENT_LIST_ITEM_ADDED\ndata: "));
    assert!(bob_events[0].contains("\"text\":\"Milk\""));
    assert!(alice_sink.events().is_empty());
}

#[test]
fn other_tabs_of_the_origin_user_receive_the_event() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let alice_other_tab = alice.clone().with_salt("s3");
    let mallory = join(&core, "mallory", "m1");

    let (tab_sink, _tab) = listen(&core, &alice_other_tab);
    let (mallory_sink, _mallory) = listen(&core, &mallory);
    core.note_create(NewNote::titled("Groceries"), &alice).unwrap();

    let events = tab_sink.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("event: EVENT_NOTE_ADDED\n"));
    assert!(mallory_sink.events().is_empty());
}

#[test]
fn revoke_notifies_revoked_user_then_isolates_them() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");
    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    let grant = core
        .co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let (bob_sink, _bob_sub) = listen(&core, &bob);

    core.co_author_delete(grant.id, &alice).unwrap();
    core.list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();

    let events = bob_sink.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("event: EVENT_NOTE_CHANGED\n"));
}

#[test]
fn every_mutation_kind_reaches_co_author() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");
    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let (bob_sink, _bob_sub) = listen(&core, &bob);

    let milk = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();
    let eggs = core
        .list_item_create(NewListItem::for_note(note.id, "Eggs"), &alice)
        .unwrap();
    core.note_set_order(note.id, &[eggs.item.id, milk.item.id], &alice)
        .unwrap();
    let mut patch = sharenote_core::ListItemPatch::from_item(&milk.item);
    patch.checked = true;
    core.list_item_update(milk.item.id, patch, &alice).unwrap();
    core.list_item_remove(eggs.item.id, &alice).unwrap();
    core.note_remove(note.id, &alice).unwrap();
    core.note_restore(note.id, &alice).unwrap();

    let names: Vec<String> = bob_sink
        .events()
        .iter()
        .map(|frame| frame.lines().next().unwrap().trim_start_matches("event: ").to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "EVENT_LIST_ITEM_ADDED",
            "EVENT_LIST_ITEM_ADDED",
            "EVENT_NOTE_ORDER_SET",
            "EVENT_LIST_ITEM_CHANGED",
            "EVENT_LIST_ITEM_REMOVED",
            "EVENT_NOTE_REMOVED",
            "EVENT_NOTE_ADDED",
        ]
    );
}

#[test]
fn failed_mutation_publishes_nothing() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let mallory = join(&core, "mallory", "m1");
    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    let (alice_tab, _sub) = listen(&core, &alice.clone().with_salt("s9"));

    assert!(core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &mallory)
        .is_err());
    assert!(alice_tab.events().is_empty());
}

#[test]
fn restoring_active_entities_fails_without_events() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");
    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let milk = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();
    let (bob_sink, _bob_sub) = listen(&core, &bob);

    assert!(matches!(
        core.note_restore(note.id, &alice),
        Err(CollabError::NotFound(EntityKind::Note, _))
    ));
    assert!(matches!(
        core.list_item_restore(milk.item.id, &alice),
        Err(CollabError::NotFound(EntityKind::ListItem, _))
    ));
    assert!(bob_sink.events().is_empty());
}

#[test]
fn publish_derives_audience_from_note_and_skips_origin_salt() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");
    let bob_other_tab = bob.clone().with_salt("s3");
    let mallory = join(&core, "mallory", "m1");
    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let note = core.note_get(note.id, &alice.user).unwrap();

    let fanout = Fanout::default();
    let subscribe = |origin: &Origin| {
        let sink = Arc::new(RecordingSink::default());
        let subscription = fanout
            .subscribe(
                origin.user.id,
                origin.salt.as_deref().unwrap(),
                Arc::clone(&sink) as Arc<dyn ConnectionSink>,
            )
            .unwrap();
        (sink, subscription)
    };
    let (owner_sink, _owner) = subscribe(&alice);
    let (origin_sink, _origin) = subscribe(&bob);
    let (tab_sink, _tab) = subscribe(&bob_other_tab);
    let (stranger_sink, _stranger) = subscribe(&mallory);

    let report = fanout
        .publish(
            EventKind::NoteChanged,
            &note,
            &note,
            bob.user.id,
            bob.salt.as_deref(),
        )
        .unwrap();

    assert_eq!(report.delivered, 2);
    assert_eq!(owner_sink.events().len(), 1);
    assert_eq!(tab_sink.events().len(), 1);
    assert!(origin_sink.events().is_empty());
    assert!(stranger_sink.events().is_empty());

    // The originating user is always in the audience, even without access.
    let report = fanout
        .publish(EventKind::NoteChanged, &note, &note, mallory.user.id, None)
        .unwrap();
    assert_eq!(report.delivered, 4);
    assert_eq!(stranger_sink.events().len(), 1);
}

#[test]
fn broken_connection_is_pruned_without_failing_the_mutation() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");
    let note = core.note_create(NewNote::titled("Groceries"), &alice).unwrap();
    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let (bob_sink, bob_sub) = listen(&core, &bob);
    bob_sink.break_transport();

    let result = core.list_item_create(NewListItem::for_note(note.id, "Milk"), &alice);

    assert!(result.is_ok());
    assert!(!bob_sub.is_open());
    assert!(!core.fanout().is_subscribed(bob_sub.key()));
}

#[test]
fn publish_report_counts_delivered_and_pruned() {
    let fanout = Fanout::default();
    let user = Uuid::new_v4();
    let healthy = Arc::new(RecordingSink::default());
    let broken = Arc::new(RecordingSink::default());
    let _a = fanout
        .subscribe(user, "a", Arc::clone(&healthy) as Arc<dyn ConnectionSink>)
        .unwrap();
    let _b = fanout
        .subscribe(user, "b", Arc::clone(&broken) as Arc<dyn ConnectionSink>)
        .unwrap();
    broken.break_transport();

    let audience = Audience::default().with_member(user);
    let report = fanout
        .publish_to(EventKind::NoteChanged, &audience, &serde_json::json!({}), None)
        .unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(report.pruned, 1);
    assert_eq!(fanout.connection_count(), 1);
    assert!(fanout.is_subscribed(&SubscriptionKey::new(user, "a")));
}

#[test]
fn heartbeat_writes_keepalives_until_closed() {
    let fanout = Fanout::new(Duration::from_millis(20)).unwrap();
    let (tx, rx) = crossbeam::channel::unbounded();
    let mut subscription = fanout
        .subscribe(Uuid::new_v4(), "s1", Arc::new(ChannelSink::new(tx)))
        .unwrap();

    assert_eq!(rx.recv().unwrap(), "data: {\"initialized\":true}\n\n");
    let keepalive = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(keepalive.starts_with("data: ") && keepalive.ends_with(" \n\n"));

    assert!(subscription.close());
    rx.try_iter().for_each(drop);
    std::thread::sleep(Duration::from_millis(100));
    assert!(rx.try_recv().is_err());
    assert_eq!(fanout.connection_count(), 0);
}

#[test]
fn heartbeat_prunes_dead_connection() {
    let fanout = Fanout::new(Duration::from_millis(10)).unwrap();
    let (tx, rx) = crossbeam::channel::unbounded();
    let subscription = fanout
        .subscribe(Uuid::new_v4(), "s1", Arc::new(ChannelSink::new(tx)))
        .unwrap();
    drop(rx);

    let deadline = Instant::now() + Duration::from_secs(2);
    while fanout.connection_count() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(fanout.connection_count(), 0);
    assert!(!subscription.is_open());
}

#[test]
fn shutdown_closes_every_subscription() {
    let core = core();
    let alice = join(&core, "alice", "s1");
    let bob = join(&core, "bob", "s2");
    let (_alice_sink, alice_sub) = listen(&core, &alice);
    let (bob_sink, bob_sub) = listen(&core, &bob);

    assert_eq!(core.shutdown(), 2);
    assert!(!alice_sub.is_open());
    assert!(!bob_sub.is_open());
    assert_eq!(core.fanout().connection_count(), 0);

    core.note_create(NewNote::titled("after"), &alice).unwrap();
    assert_eq!(bob_sink.frame_count(), 1);
}
