use crate::hydrate::{hydrate, hydrate_one};
use crate::normalize::normalize;
use crate::resolve::resolve_entry;
use chrono::Utc;
use satchel_api::{CollectionEntry, CollectionKind, CourseDetail, MarketplaceApi};
use satchel_core::SatchelResult;
use satchel_store::{CollectionSnapshot, SessionStore, StoredSession};
use serde::Serialize;
use tracing::{debug, warn};

const NOT_SIGNED_IN: &str = "not signed in; run `satchel auth login` first";

/// Reactive view the UI renders from. `is_loading` is a display hint, not a
/// lock; `error` is the only failure channel, since operations never
/// return `Err` to their callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionState {
    pub ids: Vec<String>,
    pub entries: Vec<CollectionEntry>,
    pub items: Vec<CourseDetail>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl CollectionState {
    pub fn contains(&self, course_id: &str) -> bool {
        self.ids.iter().any(|id| id == course_id)
    }

    pub fn detail_for(&self, course_id: &str) -> Option<&CourseDetail> {
        self.items.iter().find(|item| item.id == course_id)
    }

    pub fn entry_for(&self, course_id: &str) -> Option<&CollectionEntry> {
        self.entries.iter().find(|entry| entry.item_id == course_id)
    }
}

/// Owns one user collection and reconciles it against the server.
///
/// Mutations are post-hoc, never optimistic: local state changes only after
/// the round trip reports what the server actually did. There is no
/// concurrency guard: overlapping operations on one store are
/// last-write-wins, matching the service's other clients.
#[derive(Debug)]
pub struct CollectionStore<'a> {
    api: &'a MarketplaceApi,
    sessions: &'a SessionStore,
    profile: String,
    kind: CollectionKind,
    state: CollectionState,
}

impl<'a> CollectionStore<'a> {
    pub fn new(
        api: &'a MarketplaceApi,
        sessions: &'a SessionStore,
        profile: impl Into<String>,
        kind: CollectionKind,
    ) -> Self {
        Self {
            api,
            sessions,
            profile: profile.into(),
            kind,
            state: CollectionState::default(),
        }
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Seeds state from the persisted snapshot, for an offline first paint.
    /// Best-effort: a missing or unreadable snapshot just leaves the store
    /// empty.
    pub fn load_cached(&mut self) {
        match self.sessions.load_snapshot(&self.profile, self.kind) {
            Ok(Some(snapshot)) => {
                self.commit(snapshot.ids, snapshot.entries, snapshot.items);
            }
            Ok(None) => {}
            Err(err) => debug!("snapshot load for {} failed: {err}", self.kind),
        }
    }

    /// Pulls the collection from the server and replaces local state.
    ///
    /// Signed out is a valid non-error state: the store resets to empty
    /// with no error. A network failure sets `error` and leaves the
    /// previous state untouched.
    pub fn fetch_collection(&mut self) {
        let session = match self.session() {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.state = CollectionState::default();
                return;
            }
            Err(err) => {
                self.state.error = Some(err.message);
                return;
            }
        };

        self.state.is_loading = true;
        let result = self.try_fetch(&session);
        self.state.is_loading = false;

        match result {
            Ok(()) => self.state.error = None,
            Err(err) => {
                warn!("fetch of {} failed: {}", self.kind, err.message);
                self.state.error = Some(err.message);
            }
        }
    }

    /// Asks the server to flip membership and applies whatever it decided.
    /// On "now a member" the single-course detail is fetched best-effort;
    /// on "no longer a member" the id and any detail record are dropped.
    pub fn toggle(&mut self, course_id: &str) {
        self.run_authenticated(|store, session| store.try_toggle(&session, course_id));
    }

    /// Removes a course, preferring a confirmed delete keyed by the entry
    /// id. When no entry can be resolved the toggle endpoint serves as a
    /// best-effort fallback, and local state drops the id either way so
    /// intent is reflected even without a server acknowledgment.
    pub fn remove(&mut self, course_id: &str) {
        self.run_authenticated(|store, session| store.try_remove(&session, course_id));
    }

    /// Empties the collection server-side, resetting local state only when
    /// the bulk delete succeeds.
    pub fn clear(&mut self) {
        self.run_authenticated(|store, session| store.try_clear(&session));
    }

    /// Flips the notification setting for one entry, then re-fetches the
    /// collection to learn the new value. The patch response carries no
    /// payload, so inferring the flag locally would risk silent drift; the
    /// extra round trip buys exactness.
    pub fn toggle_notification(&mut self, course_id: &str) {
        let session = match self.authenticated_session() {
            Some(session) => session,
            None => return,
        };

        if let Err(err) = self.try_toggle_notification(&session, course_id) {
            warn!(
                "notification toggle for course {course_id} failed: {}",
                err.message
            );
            self.state.error = Some(err.message);
            return;
        }

        // Reconcile from server truth; this is the single fetch the
        // operation performs regardless of which mutation path ran.
        self.fetch_collection();
    }

    /// Logout path: drops in-memory state and the persisted snapshot.
    /// Clearing is not a failure, so `error` ends up `None`.
    pub fn reset(&mut self) {
        if let Err(err) = self.sessions.clear_snapshot(&self.profile, self.kind) {
            debug!("snapshot clear for {} failed: {err}", self.kind);
        }
        self.state = CollectionState::default();
    }

    fn run_authenticated<F>(&mut self, operation: F)
    where
        F: FnOnce(&mut Self, StoredSession) -> SatchelResult<()>,
    {
        let session = match self.authenticated_session() {
            Some(session) => session,
            None => return,
        };

        match operation(self, session) {
            Ok(()) => self.state.error = None,
            Err(err) => {
                warn!("{} operation failed: {}", self.kind, err.message);
                self.state.error = Some(err.message);
            }
        }
    }

    /// Auth gate for mutations: unlike `fetch_collection`, a signed-out
    /// user here is an error the UI should surface.
    fn authenticated_session(&mut self) -> Option<StoredSession> {
        match self.session() {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                self.state.error = Some(NOT_SIGNED_IN.to_string());
                None
            }
            Err(err) => {
                self.state.error = Some(err.message);
                None
            }
        }
    }

    fn session(&self) -> SatchelResult<Option<StoredSession>> {
        self.sessions.load(&self.profile)
    }

    fn try_fetch(&mut self, session: &StoredSession) -> SatchelResult<()> {
        let payload = self
            .api
            .list_collection(&session.token, self.kind, &session.user.id)?;
        let normalized = normalize(&payload, self.kind.wrapper_keys());

        let items = if normalized.ids.is_empty() {
            Vec::new()
        } else {
            hydrate(self.api, &normalized.ids)
        };

        self.commit(normalized.ids, normalized.entries, items);
        self.persist()
    }

    fn try_toggle(&mut self, session: &StoredSession, course_id: &str) -> SatchelResult<()> {
        let in_collection =
            self.api
                .toggle_membership(&session.token, self.kind, &session.user.id, course_id)?;

        if in_collection {
            if !self.state.contains(course_id) {
                self.state.ids.push(course_id.to_string());
            }
            if self.state.detail_for(course_id).is_none()
                && let Some(detail) = hydrate_one(self.api, course_id)
            {
                self.state.items.push(detail);
            }
        } else {
            self.drop_local(course_id);
        }

        self.persist()
    }

    fn try_remove(&mut self, session: &StoredSession, course_id: &str) -> SatchelResult<()> {
        let is_member =
            self.api
                .check_membership(&session.token, self.kind, &session.user.id, course_id)?;

        if is_member {
            let resolved = match resolve_entry(
                self.api,
                &session.token,
                self.kind,
                &session.user.id,
                course_id,
            ) {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("entry resolution for course {course_id} failed: {}", err.message);
                    None
                }
            };

            let entry_key = resolved
                .as_ref()
                .and_then(|entry| entry.entry_id.clone().or_else(|| entry.secondary_id.clone()));

            match entry_key {
                Some(entry_id) => {
                    if let Err(err) = self.api.delete_entry(
                        &session.token,
                        self.kind,
                        &session.user.id,
                        &entry_id,
                    ) {
                        warn!(
                            "delete of entry {entry_id} failed, keeping local removal: {}",
                            err.message
                        );
                    }
                }
                None => {
                    // Fire-and-forget fallback: no entry id to key a delete
                    // on, so a toggle has to do.
                    if let Err(err) = self.api.toggle_membership(
                        &session.token,
                        self.kind,
                        &session.user.id,
                        course_id,
                    ) {
                        warn!(
                            "toggle fallback for course {course_id} failed, keeping local removal: {}",
                            err.message
                        );
                    }
                }
            }
        }

        self.drop_local(course_id);
        self.persist()
    }

    fn try_clear(&mut self, session: &StoredSession) -> SatchelResult<()> {
        self.api
            .clear_collection(&session.token, self.kind, &session.user.id)?;

        self.state = CollectionState::default();
        self.sessions.clear_snapshot(&self.profile, self.kind)
    }

    fn try_toggle_notification(
        &mut self,
        session: &StoredSession,
        course_id: &str,
    ) -> SatchelResult<()> {
        let resolved = match resolve_entry(
            self.api,
            &session.token,
            self.kind,
            &session.user.id,
            course_id,
        ) {
            Ok(entry) => entry,
            Err(err) => {
                debug!("entry resolution for course {course_id} failed: {}", err.message);
                None
            }
        };

        let entry_key = resolved
            .as_ref()
            .and_then(|entry| entry.entry_id.clone().or_else(|| entry.secondary_id.clone()));

        match entry_key {
            Some(entry_id) => self.api.patch_entry_notifications(
                &session.token,
                self.kind,
                &session.user.id,
                &entry_id,
            ),
            None => self
                .api
                .toggle_membership_with_notification(
                    &session.token,
                    self.kind,
                    &session.user.id,
                    course_id,
                )
                .map(|_| ()),
        }
    }

    /// Replaces state wholesale, enforcing the structural invariants: ids
    /// are unique in first-appearance order, and entries/details never
    /// reference an id outside the set.
    fn commit(&mut self, ids: Vec<String>, entries: Vec<CollectionEntry>, items: Vec<CourseDetail>) {
        let mut unique_ids: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique_ids.contains(&id) {
                unique_ids.push(id);
            }
        }

        let mut kept_entries: Vec<CollectionEntry> = Vec::new();
        for entry in entries {
            if unique_ids.contains(&entry.item_id)
                && !kept_entries.iter().any(|kept| kept.item_id == entry.item_id)
            {
                kept_entries.push(entry);
            }
        }

        let mut kept_items: Vec<CourseDetail> = Vec::new();
        for item in items {
            if unique_ids.contains(&item.id) && !kept_items.iter().any(|kept| kept.id == item.id) {
                kept_items.push(item);
            }
        }

        self.state.ids = unique_ids;
        self.state.entries = kept_entries;
        self.state.items = kept_items;
    }

    fn drop_local(&mut self, course_id: &str) {
        self.state.ids.retain(|id| id != course_id);
        self.state.entries.retain(|entry| entry.item_id != course_id);
        self.state.items.retain(|item| item.id != course_id);
    }

    fn persist(&self) -> SatchelResult<()> {
        let snapshot = CollectionSnapshot {
            ids: self.state.ids.clone(),
            entries: self.state.entries.clone(),
            items: self.state.items.clone(),
            fetched_at: Some(Utc::now().to_rfc3339()),
        };

        self.sessions
            .save_snapshot(&self.profile, self.kind, &snapshot)
    }
}
