use httpmock::Method::{DELETE, GET, PATCH, POST};
use httpmock::MockServer;
use satchel_api::{CollectionKind, MarketplaceApi, UserData};
use satchel_collections::{CollectionStore, hydrate};
use satchel_fs::init_workspace;
use satchel_store::{SessionStore, StoredSession};
use serde_json::json;

fn store_with_session(server_url: &str, signed_in: bool) -> (tempfile::TempDir, SessionStore) {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("workspace");
    let init = init_workspace(Some(&root), Some(server_url)).expect("init workspace");
    let sessions = SessionStore::from_workspace(&init.paths).expect("session store");

    if signed_in {
        sessions
            .save(
                "default",
                &StoredSession {
                    profile: "default".to_string(),
                    server: server_url.to_string(),
                    email: "learner@example.com".to_string(),
                    authenticated_at: "2026-08-01T00:00:00Z".to_string(),
                    token: "token-1".to_string(),
                    user: UserData {
                        id: "u1".to_string(),
                        email: Some("learner@example.com".to_string()),
                        name: None,
                    },
                },
            )
            .expect("save session");
    }

    (temp, sessions)
}

#[test]
fn fetch_without_user_resets_to_empty_without_error() {
    let server = MockServer::start();
    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), false);

    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);
    store.fetch_collection();

    assert!(store.state().ids.is_empty());
    assert!(store.state().items.is_empty());
    assert!(store.state().error.is_none());
    assert!(!store.state().is_loading);
}

#[test]
fn fetch_normalizes_wrapped_payload_and_hydrates_via_batch() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200)
            .json_body(json!({"wishlist": [{"course_id": 7}, {"course_id": 9}]}));
    });
    let batch = server.mock(|when, then| {
        when.method(GET).path("/v1/courses").query_param("ids", "7,9");
        then.status(200).json_body(json!({"data": [
            {"id": 7, "title": "Intro to Rust", "price": 9.99},
            {"id": 9, "title": "Advanced Rust", "price": 19.99},
        ]}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();

    list.assert_hits(1);
    batch.assert_hits(1);
    assert_eq!(store.state().ids, vec!["7", "9"]);
    assert_eq!(store.state().items.len(), 2);
    assert_eq!(store.state().items[0].title, "Intro to Rust");
    assert!(store.state().error.is_none());
}

#[test]
fn fetch_failure_preserves_previous_state() {
    let server = MockServer::start();
    let mut list = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!([{"course_id": 7}]));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();
    assert_eq!(store.state().ids, vec!["7"]);

    list.delete();
    server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(500).json_body(json!({"message": "backend down"}));
    });

    store.fetch_collection();

    assert_eq!(store.state().ids, vec!["7"], "prior state must survive");
    assert!(store.state().error.is_some());
    assert!(!store.state().is_loading);
}

#[test]
fn toggle_twice_round_trips_to_absent() {
    let server = MockServer::start();
    let mut toggle_on = server.mock(|when, then| {
        when.method(POST).path("/v1/users/u1/wishlist/toggle");
        then.status(200).json_body(json!({"in_collection": true}));
    });
    let detail = server.mock(|when, then| {
        when.method(GET).path("/v1/courses/7");
        then.status(200)
            .json_body(json!({"id": 7, "title": "Intro to Rust"}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.toggle("7");
    toggle_on.assert_hits(1);
    detail.assert_hits(1);
    assert!(store.state().contains("7"));
    assert_eq!(
        store.state().detail_for("7").map(|d| d.title.as_str()),
        Some("Intro to Rust")
    );

    toggle_on.delete();
    server.mock(|when, then| {
        when.method(POST).path("/v1/users/u1/wishlist/toggle");
        then.status(200).json_body(json!({"in_collection": false}));
    });

    store.toggle("7");
    assert!(!store.state().contains("7"));
    assert!(store.state().detail_for("7").is_none());
    assert!(store.state().error.is_none());
}

#[test]
fn toggle_without_user_sets_error_and_makes_no_call() {
    let server = MockServer::start();
    let toggle = server.mock(|when, then| {
        when.method(POST).path("/v1/users/u1/wishlist/toggle");
        then.status(200).json_body(json!({"in_collection": true}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), false);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.toggle("7");

    toggle.assert_hits(0);
    assert!(store.state().error.is_some());
    assert!(store.state().ids.is_empty());
}

#[test]
fn remove_when_not_member_skips_delete_and_drops_locally() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [7]}));
    });
    let check = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist/contains/7");
        then.status(200).json_body(json!({"in_collection": false}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();
    assert!(store.state().contains("7"));
    let listings_before_remove = list.hits();

    store.remove("7");

    check.assert_hits(1);
    // Not a member server-side: no delete, no toggle, no resolver listing.
    assert_eq!(list.hits(), listings_before_remove);
    assert!(!store.state().contains("7"));
    assert!(store.state().error.is_none());
}

#[test]
fn remove_member_deletes_by_resolved_entry_id() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200)
            .json_body(json!({"wishlist": [{"id": "e-7", "course_id": 7}]}));
    });
    let check = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist/contains/7");
        then.status(200).json_body(json!({"in_collection": true}));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/v1/users/u1/wishlist/entries/e-7");
        then.status(204);
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();
    store.remove("7");

    check.assert_hits(1);
    delete.assert_hits(1);
    assert!(!store.state().contains("7"));
    assert!(store.state().error.is_none());
    // Listing hits cover the initial fetch plus the entry resolution.
    assert_eq!(list.hits(), 2);
}

#[test]
fn remove_member_without_entry_id_falls_back_to_toggle() {
    let server = MockServer::start();
    // Scalar elements expose no entry identifier to key a delete on.
    server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [7]}));
    });
    let check = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist/contains/7");
        then.status(200).json_body(json!({"in_collection": true}));
    });
    let toggle = server.mock(|when, then| {
        when.method(POST).path("/v1/users/u1/wishlist/toggle");
        then.status(200).json_body(json!({"in_collection": false}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();
    store.remove("7");

    check.assert_hits(1);
    toggle.assert_hits(1);
    assert!(!store.state().contains("7"));
    assert!(store.state().error.is_none());
}

#[test]
fn clear_resets_state_on_success() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [7, 9]}));
    });
    let clear = server.mock(|when, then| {
        when.method(DELETE).path("/v1/users/u1/wishlist");
        then.status(204);
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();
    assert_eq!(store.state().ids.len(), 2);

    store.clear();

    clear.assert_hits(1);
    assert!(store.state().ids.is_empty());
    assert!(store.state().items.is_empty());
    assert!(store.state().error.is_none());
}

#[test]
fn clear_failure_leaves_state_untouched() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [7]}));
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/v1/users/u1/wishlist");
        then.status(500).json_body(json!({"message": "nope"}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();
    store.clear();

    assert_eq!(store.state().ids, vec!["7"]);
    assert!(store.state().error.is_some());
}

#[test]
fn notification_toggle_patches_resolved_entry_then_refetches_once() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [
            {"id": "e-7", "course_id": 7, "notifications_enabled": false},
        ]}));
    });
    let patch = server.mock(|when, then| {
        when.method(PATCH)
            .path("/v1/users/u1/wishlist/entries/e-7/notifications");
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/courses").query_param("ids", "7");
        then.status(200)
            .json_body(json!({"data": [{"id": 7, "title": "Intro to Rust"}]}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.toggle_notification("7");

    patch.assert_hits(1);
    // One listing to resolve the entry, one reconciliation fetch.
    list.assert_hits(2);
    assert!(store.state().error.is_none());
    assert_eq!(
        store.state().entry_for("7").and_then(|e| e.notifications_enabled),
        Some(false)
    );
}

#[test]
fn notification_toggle_falls_back_to_flagged_toggle_and_fetches_once() {
    let server = MockServer::start();
    // The listing yields no entry for the course, so resolution fails.
    let list = server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": []}));
    });
    let flagged_toggle = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/users/u1/wishlist/toggle")
            .json_body_partial(r#"{"notify": true}"#);
        then.status(200).json_body(json!({"in_collection": true}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.toggle_notification("7");

    flagged_toggle.assert_hits(1);
    // One listing for the failed resolution plus exactly one reconcile.
    list.assert_hits(2);
    assert!(store.state().error.is_none());
}

#[test]
fn hydrate_with_no_ids_makes_no_network_call() {
    let server = MockServer::start();
    let catalog = server.mock(|when, then| {
        when.method(GET).path("/v1/courses");
        then.status(200).json_body(json!([]));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let details = hydrate(&api, &[]);

    assert!(details.is_empty());
    catalog.assert_hits(0);
}

#[test]
fn hydration_failure_keeps_bare_ids_without_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [7]}));
    });
    // Batch endpoint and catalog both misbehave; membership must survive.
    server.mock(|when, then| {
        when.method(GET).path("/v1/courses");
        then.status(500).json_body(json!({"message": "catalog offline"}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);
    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);

    store.fetch_collection();

    assert_eq!(store.state().ids, vec!["7"]);
    assert!(store.state().items.is_empty());
    assert!(store.state().error.is_none());
}

#[test]
fn snapshot_seeds_a_fresh_store_for_offline_reads() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/users/u1/wishlist");
        then.status(200).json_body(json!({"wishlist": [{"course_id": 7}]}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/courses").query_param("ids", "7");
        then.status(200)
            .json_body(json!({"data": [{"id": 7, "title": "Intro to Rust"}]}));
    });

    let api = MarketplaceApi::new(&server.base_url()).expect("api");
    let (_temp, sessions) = store_with_session(&server.base_url(), true);

    let mut store = CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);
    store.fetch_collection();
    assert_eq!(store.state().ids, vec!["7"]);

    let mut rehydrated =
        CollectionStore::new(&api, &sessions, "default", CollectionKind::Wishlist);
    rehydrated.load_cached();

    assert_eq!(rehydrated.state().ids, vec!["7"]);
    assert_eq!(
        rehydrated.state().detail_for("7").map(|d| d.title.as_str()),
        Some("Intro to Rust")
    );
}
