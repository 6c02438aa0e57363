use sharenote_core::db::open_db_in_memory;
use sharenote_core::model::lifecycle::EntityKind;
use sharenote_core::{
    CollabCore, CollabError, ListItemPatch, NewListItem, NewNote, Note, Origin, User,
};
use uuid::Uuid;

fn core() -> CollabCore {
    CollabCore::with_connection(open_db_in_memory().unwrap())
}

fn join(core: &CollabCore, name: &str) -> Origin {
    let user = User::new(Uuid::new_v4(), name, format!("{name}@example.com"));
    core.register_identity(&user).unwrap();
    Origin::new(user)
}

fn groceries(core: &CollabCore, owner: &Origin) -> Note {
    core.note_create(NewNote::titled("Groceries"), owner).unwrap()
}

#[test]
fn create_appends_after_last_active_item() {
    let core = core();
    let alice = join(&core, "alice");
    let note = groceries(&core, &alice);

    let milk = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();
    let eggs = core
        .list_item_create(NewListItem::for_note(note.id, "Eggs"), &alice)
        .unwrap();

    assert_eq!(milk.item.order, 1);
    assert_eq!(eggs.item.order, 2);
    assert_eq!(eggs.item.note_id, note.id);
    assert!(!eggs.item.checked);
    assert_eq!(eggs.note.item_ids(), vec![milk.item.id, eggs.item.id]);
}

#[test]
fn create_honors_explicit_order() {
    let core = core();
    let alice = join(&core, "alice");
    let note = groceries(&core, &alice);

    let item = core
        .list_item_create(
            NewListItem {
                order: Some(7),
                checked: true,
                ..NewListItem::for_note(note.id, "Bread")
            },
            &alice,
        )
        .unwrap();
    assert_eq!(item.item.order, 7);
    assert!(item.item.checked);
}

#[test]
fn create_requires_visible_note_id() {
    let core = core();
    let alice = join(&core, "alice");
    let mallory = join(&core, "mallory");
    let note = groceries(&core, &alice);

    let missing = core
        .list_item_create(
            NewListItem {
                text: "Milk".to_string(),
                ..NewListItem::default()
            },
            &alice,
        )
        .unwrap_err();
    assert!(matches!(missing, CollabError::Validation(_)));

    let foreign = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &mallory)
        .unwrap_err();
    assert!(matches!(foreign, CollabError::NotFound(EntityKind::Note, _)));
}

#[test]
fn update_replaces_fields_and_rejects_zero_order() {
    let core = core();
    let alice = join(&core, "alice");
    let note = groceries(&core, &alice);
    let created = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();

    let updated = core
        .list_item_update(
            created.item.id,
            ListItemPatch {
                text: "Oat milk".to_string(),
                order: 3,
                checked: true,
                completed: true,
            },
            &alice,
        )
        .unwrap();
    assert_eq!(updated.item.text, "Oat milk");
    assert_eq!(updated.item.order, 3);
    assert!(updated.item.checked && updated.item.completed);
    assert!(updated.item.updated >= created.item.updated);
    assert_eq!(updated.note.list[0].text, "Oat milk");

    let mut patch = ListItemPatch::from_item(&updated.item);
    patch.order = 0;
    let err = core
        .list_item_update(created.item.id, patch, &alice)
        .unwrap_err();
    assert!(matches!(err, CollabError::Validation(_)));
}

#[test]
fn remove_then_restore_roundtrip() {
    let core = core();
    let alice = join(&core, "alice");
    let note = groceries(&core, &alice);
    let milk = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();

    let removed = core.list_item_remove(milk.item.id, &alice).unwrap();
    assert!(removed.note.list.is_empty());
    assert!(matches!(
        core.list_item_remove(milk.item.id, &alice),
        Err(CollabError::NotFound(EntityKind::ListItem, _))
    ));
    assert!(matches!(
        core.list_item_update(milk.item.id, ListItemPatch::from_item(&milk.item), &alice),
        Err(CollabError::NotFound(EntityKind::ListItem, _))
    ));

    let restored = core.list_item_restore(milk.item.id, &alice).unwrap();
    assert_eq!(restored.item.status_id, milk.item.status_id);
    assert_eq!(restored.item.text, "Milk");
    assert_eq!(restored.note.item_ids(), vec![milk.item.id]);
    assert!(matches!(
        core.list_item_restore(milk.item.id, &alice),
        Err(CollabError::NotFound(EntityKind::ListItem, _))
    ));
}

#[test]
fn item_access_follows_parent_note_grants() {
    let core = core();
    let alice = join(&core, "alice");
    let bob = join(&core, "bob");
    let note = groceries(&core, &alice);
    let grant = core
        .co_author_create(note.id, "bob@example.com", &alice)
        .unwrap();

    let added = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &bob)
        .unwrap();
    assert!(added.note.has_co_author(bob.user.id));

    core.co_author_delete(grant.id, &alice).unwrap();
    let err = core.list_item_remove(added.item.id, &bob).unwrap_err();
    assert!(matches!(err, CollabError::NotFound(EntityKind::Note, _)));
    assert!(core.list_item_remove(added.item.id, &alice).is_ok());
}

#[test]
fn result_serializes_as_bare_item() {
    let core = core();
    let alice = join(&core, "alice");
    let note = groceries(&core, &alice);
    let result = core
        .list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)
        .unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["text"], "Milk");
    assert_eq!(value["noteId"], note.id.to_string());
    assert!(value.get("note").is_none());
}
