use crate::normalize::normalize;
use satchel_api::{CollectionEntry, CollectionKind, MarketplaceApi};
use satchel_core::SatchelResult;

/// Finds the server-side entry for a course by listing the whole collection
/// and searching it, because the mutation endpoints key on the opaque entry
/// id rather than the course id.
///
/// The lookup is deliberately never cached: entry ids are volatile and the
/// server is the source of truth, so each resolution pays for a fresh
/// listing. `Ok(None)` means the listing succeeded but no entry references
/// the course (or the listing shape exposed no entries at all).
pub fn resolve_entry(
    api: &MarketplaceApi,
    token: &str,
    kind: CollectionKind,
    user_id: &str,
    item_id: &str,
) -> SatchelResult<Option<CollectionEntry>> {
    let payload = api.list_collection(token, kind, user_id)?;
    let normalized = normalize(&payload, kind.wrapper_keys());

    Ok(normalized
        .entries
        .into_iter()
        .find(|entry| entry.item_id == item_id))
}
