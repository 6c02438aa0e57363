use sharenote_core::db::open_db_in_memory;
use sharenote_core::model::lifecycle::EntityKind;
use sharenote_core::{CollabCore, CollabError, NewListItem, NewNote, Note, Origin, User};
use uuid::Uuid;

fn core() -> CollabCore {
    CollabCore::with_connection(open_db_in_memory().unwrap())
}

fn join(core: &CollabCore, name: &str) -> Origin {
    let user = User::new(Uuid::new_v4(), name, format!("{name}@example.com"));
    core.register_identity(&user).unwrap();
    Origin::new(user)
}

fn shared_note(core: &CollabCore, owner: &Origin) -> Note {
    core.note_create(NewNote::titled("Groceries"), owner).unwrap()
}

#[test]
fn invite_creates_active_grant_with_user_and_note() {
    let core = core();
    let alice = join(&core, "alice");
    let bob = join(&core, "bob");
    let note = shared_note(&core, &alice);

    let grant = core
        .co_author_create(note.id, "  Bob@Example.com ", &alice)
        .unwrap();

    assert_eq!(grant.note_id, note.id);
    assert_eq!(grant.user_id, bob.user.id);
    assert_eq!(grant.user.as_ref().unwrap().name, "bob");
    let refreshed = grant.note.as_deref().unwrap();
    assert!(refreshed.has_co_author(bob.user.id));
    assert_eq!(
        core.co_author_find(note.id, bob.user.id).unwrap().map(|found| found.id),
        Some(grant.id)
    );
    assert_eq!(core.co_author_find_by_id(grant.id).unwrap().user_id, bob.user.id);
    assert_eq!(core.co_authors_for_user(bob.user.id).unwrap().len(), 1);
}

#[test]
fn duplicate_invite_is_rejected() {
    let core = core();
    let alice = join(&core, "alice");
    join(&core, "bob");
    let note = shared_note(&core, &alice);

    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    let err = core
        .co_author_create(note.id, "BOB@example.com", &alice)
        .unwrap_err();
    assert!(matches!(err, CollabError::AlreadyExists(EntityKind::CoAuthor)), "{err}");
}

#[test]
fn invite_matches_stored_email_with_non_ascii_letters() {
    let core = core();
    let alice = join(&core, "alice");
    let emile = User::new(Uuid::new_v4(), "emile", "ÉMILE@Example.com");
    core.register_identity(&emile).unwrap();
    let note = shared_note(&core, &alice);

    let grant = core
        .co_author_create(note.id, "ÉMILE@example.com", &alice)
        .unwrap();
    assert_eq!(grant.user_id, emile.id);
}

#[test]
fn self_invite_is_rejected_before_lookup() {
    let core = core();
    let alice = join(&core, "alice");

    // The note does not exist; the self check still comes first.
    let err = core
        .co_author_create(Uuid::new_v4(), " ALICE@example.com", &alice)
        .unwrap_err();
    assert!(matches!(err, CollabError::SelfInvite), "{err}");
}

#[test]
fn malformed_or_unknown_invitee_is_not_found() {
    let core = core();
    let alice = join(&core, "alice");
    let note = shared_note(&core, &alice);

    let malformed = core
        .co_author_create(note.id, "not-an-email", &alice)
        .unwrap_err();
    assert!(
        matches!(malformed, CollabError::NotFound(EntityKind::User, _)),
        "{malformed}"
    );

    let unknown = core
        .co_author_create(note.id, "nobody@example.com", &alice)
        .unwrap_err();
    match unknown {
        CollabError::NotFound(EntityKind::User, key) => assert_eq!(key, "nobody@example.com"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn only_owner_may_invite() {
    let core = core();
    let alice = join(&core, "alice");
    let bob = join(&core, "bob");
    join(&core, "carol");
    let mallory = join(&core, "mallory");
    let note = shared_note(&core, &alice);
    core.co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();

    let by_co_author = core
        .co_author_create(note.id, "carol@example.com", &bob)
        .unwrap_err();
    assert!(matches!(by_co_author, CollabError::Forbidden(_)), "{by_co_author}");

    let malformed_by_co_author = core
        .co_author_create(note.id, "carol", &bob)
        .unwrap_err();
    assert!(
        matches!(malformed_by_co_author, CollabError::Forbidden(_)),
        "{malformed_by_co_author}"
    );

    let by_stranger = core
        .co_author_create(note.id, "carol@example.com", &mallory)
        .unwrap_err();
    assert!(matches!(by_stranger, CollabError::NotFound(EntityKind::Note, _)));
}

#[test]
fn revoke_isolates_former_co_author() {
    let core = core();
    let alice = join(&core, "alice");
    let bob = join(&core, "bob");
    let note = shared_note(&core, &alice);
    let grant = core
        .co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    assert_eq!(core.notes_list(&bob.user).unwrap().len(), 1);

    let revoked = core.co_author_delete(grant.id, &alice).unwrap();
    assert_ne!(revoked.status_id, grant.status_id);
    assert!(!revoked.note.unwrap().has_co_author(bob.user.id));

    assert!(core.notes_list(&bob.user).unwrap().is_empty());
    assert!(matches!(
        core.note_get(note.id, &bob.user),
        Err(CollabError::NotFound(..))
    ));
    assert!(matches!(
        core.list_item_create(NewListItem::for_note(note.id, "Milk"), &bob),
        Err(CollabError::NotFound(..))
    ));
    assert!(core.co_author_find(note.id, bob.user.id).unwrap().is_none());
    assert!(matches!(
        core.co_author_find_by_id(grant.id),
        Err(CollabError::NotFound(EntityKind::CoAuthor, _))
    ));
    assert!(matches!(
        core.co_author_delete(grant.id, &alice),
        Err(CollabError::NotFound(EntityKind::CoAuthor, _))
    ));
    assert_eq!(core.notes_list(&alice.user).unwrap().len(), 1);
}

#[test]
fn invitee_may_leave_but_other_co_authors_may_not_revoke() {
    let core = core();
    let alice = join(&core, "alice");
    let bob = join(&core, "bob");
    let carol = join(&core, "carol");
    let note = shared_note(&core, &alice);
    let bob_grant = core
        .co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    core.co_author_create(note.id, "carol@example.com", &alice)
        .unwrap();

    let err = core.co_author_delete(bob_grant.id, &carol).unwrap_err();
    assert!(matches!(err, CollabError::Forbidden(_)), "{err}");

    core.co_author_delete(bob_grant.id, &bob).unwrap();
    assert!(core.notes_list(&bob.user).unwrap().is_empty());
    assert_eq!(core.notes_list(&carol.user).unwrap().len(), 1);
}

#[test]
fn revoked_user_can_be_invited_again() {
    let core = core();
    let alice = join(&core, "alice");
    let bob = join(&core, "bob");
    let note = shared_note(&core, &alice);
    let first = core
        .co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    core.co_author_delete(first.id, &bob).unwrap();

    let second = core
        .co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(core.notes_list(&bob.user).unwrap().len(), 1);
}
