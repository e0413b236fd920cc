use satchel_api::{CourseDetail, MarketplaceApi};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

const DETAIL_WRAPPER_KEYS: [&str; 4] = ["data", "courses", "results", "items"];

/// Resolves display records for a set of course ids, best-effort.
///
/// Strategy chain: the batch details endpoint first, accepted under several
/// response shapes; when that fails or yields nothing usable, the entire
/// catalog is fetched and filtered client-side. Total failure returns an
/// empty vector; membership is tracked by id, and a course with no detail
/// record renders as "details unavailable" rather than an error.
pub fn hydrate(api: &MarketplaceApi, ids: &[String]) -> Vec<CourseDetail> {
    if ids.is_empty() {
        return Vec::new();
    }

    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

    match api.course_details(ids) {
        Ok(payload) => {
            let details = filter_details(parse_detail_array(&payload), &wanted);
            if !details.is_empty() {
                return details;
            }
            debug!("batch detail response had no usable records; falling back to catalog scan");
        }
        Err(err) => {
            debug!("batch detail request failed ({err}); falling back to catalog scan");
        }
    }

    match api.full_catalog() {
        Ok(payload) => filter_details(parse_detail_array(&payload), &wanted),
        Err(err) => {
            debug!("catalog fallback failed ({err}); leaving ids unhydrated");
            Vec::new()
        }
    }
}

/// Single-course variant used after a toggle confirms membership. `None`
/// when the record cannot be fetched or parsed; the caller keeps the id.
pub fn hydrate_one(api: &MarketplaceApi, course_id: &str) -> Option<CourseDetail> {
    let payload = match api.course_detail(course_id) {
        Ok(payload) => payload,
        Err(err) => {
            debug!("detail request for course {course_id} failed: {err}");
            return None;
        }
    };

    detail_from_payload(&payload)
}

fn detail_from_payload(payload: &Value) -> Option<CourseDetail> {
    if let Some(detail) = CourseDetail::from_value(payload) {
        return Some(detail);
    }

    payload
        .as_object()?
        .values()
        .find_map(CourseDetail::from_value)
}

fn parse_detail_array(payload: &Value) -> Vec<CourseDetail> {
    let elements = if let Some(array) = payload.as_array() {
        Some(array)
    } else {
        payload.as_object().and_then(|object| {
            DETAIL_WRAPPER_KEYS
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_array))
        })
    };

    let Some(elements) = elements else {
        return Vec::new();
    };

    elements
        .iter()
        .filter_map(CourseDetail::from_value)
        .collect()
}

/// Hydration never invents membership: anything outside the requested id
/// set is discarded, and duplicates collapse to the first record.
fn filter_details(details: Vec<CourseDetail>, wanted: &HashSet<&str>) -> Vec<CourseDetail> {
    let mut seen = HashSet::new();
    details
        .into_iter()
        .filter(|detail| wanted.contains(detail.id.as_str()) && seen.insert(detail.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_array_parses_under_known_wrappers_and_bare() {
        let records = json!([{"id": 1, "title": "A"}, {"id": 2, "title": "B"}]);

        for payload in [
            json!({"data": records.clone()}),
            json!({"courses": records.clone()}),
            json!({"results": records.clone()}),
            records.clone(),
        ] {
            let parsed = parse_detail_array(&payload);
            assert_eq!(parsed.len(), 2, "payload: {payload}");
            assert_eq!(parsed[0].id, "1");
        }
    }

    #[test]
    fn unrecognized_shapes_parse_to_nothing() {
        assert!(parse_detail_array(&json!({"status": "ok"})).is_empty());
        assert!(parse_detail_array(&json!("nope")).is_empty());
    }

    #[test]
    fn filtering_never_invents_membership() {
        let details = parse_detail_array(&json!([
            {"id": 1, "title": "Wanted"},
            {"id": 99, "title": "Not requested"},
            {"id": 1, "title": "Duplicate"},
        ]));

        let wanted: HashSet<&str> = ["1"].into_iter().collect();
        let filtered = filter_details(details, &wanted);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Wanted");
    }

    #[test]
    fn single_detail_unwraps_envelopes() {
        let bare = detail_from_payload(&json!({"id": 7, "title": "Bare"})).expect("bare");
        assert_eq!(bare.id, "7");

        let wrapped =
            detail_from_payload(&json!({"data": {"id": 8, "title": "Wrapped"}})).expect("wrapped");
        assert_eq!(wrapped.id, "8");

        assert!(detail_from_payload(&json!({"status": "gone"})).is_none());
    }
}
