use satchel_api::{CollectionEntry, coerce_id};
use serde_json::Value;

/// Wrapper properties probed after the collection-specific ones.
const GENERIC_WRAPPER_KEYS: [&str; 4] = ["items", "data", "results", "courses"];

/// Fields that reference the course itself, tried before generic ids.
const ITEM_REF_KEYS: [&str; 5] = ["course_id", "courseId", "course", "item_id", "itemId"];

const GENERIC_ID_KEYS: [&str; 2] = ["id", "_id"];
const ENTRY_ID_KEYS: [&str; 4] = ["entry_id", "entryId", "id", "_id"];
const NOTIFICATION_KEYS: [&str; 3] = ["notifications_enabled", "notification", "notify"];
const ADDED_AT_KEYS: [&str; 2] = ["added_at", "created_at"];

#[derive(Debug, Clone, Default)]
pub struct NormalizedCollection {
    pub ids: Vec<String>,
    pub entries: Vec<CollectionEntry>,
}

/// Extracts the canonical id set (and whatever entry metadata is present)
/// from a collection payload of unpredictable shape.
///
/// The entry array is located by an ordered fallback chain:
/// 1. a well-known wrapper property (`preferred_keys`, then the generic
///    ones) holding an array;
/// 2. the payload itself being a bare array;
/// 3. scanning an unknown object's values and taking the first array.
///
/// Elements may be entry-like objects or bare scalars. Elements yielding no
/// usable id are dropped. No array anywhere is not an error: the result is
/// simply empty and the caller decides what that means. Duplicate ids keep
/// their first occurrence.
pub fn normalize(payload: &Value, preferred_keys: &[&str]) -> NormalizedCollection {
    let Some(elements) = locate_entry_array(payload, preferred_keys) else {
        return NormalizedCollection::default();
    };

    let mut normalized = NormalizedCollection::default();
    for element in elements {
        let Some(entry) = entry_from_element(element) else {
            continue;
        };

        if normalized.ids.iter().any(|id| id == &entry.item_id) {
            continue;
        }

        normalized.ids.push(entry.item_id.clone());
        normalized.entries.push(entry);
    }

    normalized
}

fn locate_entry_array<'a>(payload: &'a Value, preferred_keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(object) = payload.as_object() {
        for key in preferred_keys.iter().chain(GENERIC_WRAPPER_KEYS.iter()) {
            if let Some(array) = object.get(*key).and_then(Value::as_array) {
                return Some(array);
            }
        }
    }

    if let Some(array) = payload.as_array() {
        return Some(array);
    }

    // Unknown object shape: take the first array-valued property.
    payload
        .as_object()?
        .values()
        .find_map(|value| value.as_array())
}

fn entry_from_element(element: &Value) -> Option<CollectionEntry> {
    if let Some(item_id) = coerce_id(element) {
        return Some(CollectionEntry {
            entry_id: None,
            secondary_id: None,
            item_id,
            notifications_enabled: None,
            added_at: None,
        });
    }

    let object = element.as_object()?;

    let item_ref = ITEM_REF_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(coerce_id));

    // When the element carries no dedicated course reference, its generic id
    // IS the course id and there is no separate entry identifier to learn.
    let (item_id, entry_candidates) = match item_ref {
        Some(item_id) => {
            let mut candidates = ENTRY_ID_KEYS
                .iter()
                .filter_map(|key| object.get(*key).and_then(coerce_id))
                .filter(|candidate| candidate != &item_id);
            let picked = (candidates.next(), candidates.next());
            (item_id, picked)
        }
        None => {
            let item_id = GENERIC_ID_KEYS
                .iter()
                .find_map(|key| object.get(*key).and_then(coerce_id))?;
            (item_id, (None, None))
        }
    };

    let notifications_enabled = NOTIFICATION_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_bool));
    let added_at = ADDED_AT_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string);

    Some(CollectionEntry {
        entry_id: entry_candidates.0,
        secondary_id: entry_candidates.1,
        item_id,
        notifications_enabled,
        added_at,
    })
}
