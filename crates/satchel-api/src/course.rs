use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Display record for a single course. Field coverage is best-effort: the
/// catalog endpoints omit fields freely, so everything beyond the id is
/// optional and the id tolerates numeric encodings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(deserialize_with = "de_id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl CourseDetail {
    /// Builds a detail record from an arbitrarily-shaped course object.
    /// Returns `None` when no identifier can be found; everything else
    /// degrades to defaults rather than failing.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let id = ["id", "_id", "course_id", "courseId"]
            .iter()
            .find_map(|key| object.get(*key).and_then(coerce_id))?;

        let title = ["title", "name"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let instructor = ["instructor", "teacher", "author"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        Some(Self {
            id,
            title,
            price: object.get("price").and_then(Value::as_f64),
            instructor,
            rating: object.get("rating").and_then(Value::as_f64),
            category: object
                .get("category")
                .and_then(Value::as_str)
                .map(str::to_string),
            thumbnail: object
                .get("thumbnail")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Coerces a scalar identifier to its canonical string form. Ids compare by
/// string equality throughout the client, whatever the wire encoding was.
pub fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub(crate) fn de_id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_id(&value).ok_or_else(|| serde::de::Error::custom("expected a string or numeric id"))
}
