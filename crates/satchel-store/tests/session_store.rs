use satchel_api::{CollectionEntry, CollectionKind, CourseDetail, UserData};
use satchel_fs::init_workspace;
use satchel_store::{CollectionSnapshot, SessionStore, StoredSession};
use serde_json::json;

fn fixture_session(token: &str) -> StoredSession {
    StoredSession {
        profile: "default".to_string(),
        server: "https://api.example.com".to_string(),
        email: "learner@example.com".to_string(),
        authenticated_at: "2026-08-01T00:00:00Z".to_string(),
        token: token.to_string(),
        user: UserData {
            id: "user-1".to_string(),
            email: Some("learner@example.com".to_string()),
            name: Some("Learner".to_string()),
        },
    }
}

fn fixture_store() -> (tempfile::TempDir, SessionStore) {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("workspace");
    let init =
        init_workspace(Some(&root), Some("https://api.example.com")).expect("init workspace");
    let store = SessionStore::from_workspace(&init.paths).expect("session store");
    (temp, store)
}

#[test]
fn save_load_remove_session_round_trip() {
    let (_temp, store) = fixture_store();

    store
        .save("default", &fixture_session("token-1"))
        .expect("save");

    let loaded = store
        .load("default")
        .expect("load")
        .expect("stored session");
    assert_eq!(loaded.email, "learner@example.com");
    assert_eq!(loaded.token, "token-1");
    assert_eq!(loaded.user.id, "user-1");

    store.remove("default").expect("remove");
    assert!(store.load("default").expect("load after remove").is_none());
}

#[test]
fn current_user_reflects_session_presence() {
    let (_temp, store) = fixture_store();

    assert!(
        store
            .current_user("default")
            .expect("gate without session")
            .is_none()
    );

    store
        .save("default", &fixture_session("token-2"))
        .expect("save");

    let user = store
        .current_user("default")
        .expect("gate with session")
        .expect("user");
    assert_eq!(user.id, "user-1");
}

#[test]
fn snapshot_round_trip_per_collection() {
    let (_temp, store) = fixture_store();

    let snapshot = CollectionSnapshot {
        ids: vec!["7".to_string(), "9".to_string()],
        entries: vec![CollectionEntry {
            entry_id: Some("e-7".to_string()),
            secondary_id: None,
            item_id: "7".to_string(),
            notifications_enabled: Some(true),
            added_at: None,
        }],
        items: vec![
            CourseDetail::from_value(&json!({"id": 7, "title": "Intro"})).expect("detail"),
        ],
        fetched_at: Some("2026-08-01T00:00:00Z".to_string()),
    };

    store
        .save_snapshot("default", CollectionKind::Wishlist, &snapshot)
        .expect("save snapshot");

    let loaded = store
        .load_snapshot("default", CollectionKind::Wishlist)
        .expect("load snapshot")
        .expect("snapshot");
    assert_eq!(loaded.ids, vec!["7", "9"]);
    assert_eq!(loaded.entries[0].entry_id.as_deref(), Some("e-7"));
    assert_eq!(loaded.items[0].id, "7");

    // Kinds are isolated from one another.
    assert!(
        store
            .load_snapshot("default", CollectionKind::Cart)
            .expect("load cart snapshot")
            .is_none()
    );

    store
        .clear_snapshot("default", CollectionKind::Wishlist)
        .expect("clear");
    assert!(
        store
            .load_snapshot("default", CollectionKind::Wishlist)
            .expect("load after clear")
            .is_none()
    );
}

#[test]
fn clear_all_snapshots_wipes_every_kind() {
    let (_temp, store) = fixture_store();
    let snapshot = CollectionSnapshot {
        ids: vec!["1".to_string()],
        ..CollectionSnapshot::default()
    };

    for kind in [
        CollectionKind::Wishlist,
        CollectionKind::Cart,
        CollectionKind::Enrollment,
    ] {
        store
            .save_snapshot("default", kind, &snapshot)
            .expect("save");
    }

    store.clear_all_snapshots("default").expect("clear all");

    for kind in [
        CollectionKind::Wishlist,
        CollectionKind::Cart,
        CollectionKind::Enrollment,
    ] {
        assert!(
            store
                .load_snapshot("default", kind)
                .expect("load")
                .is_none()
        );
    }
}
