use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use satchel_core::{SatchelError, SatchelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

mod course;

pub use course::{CourseDetail, coerce_id};

const USER_AGENT_VALUE: &str = concat!("satchel-cli/", env!("CARGO_PKG_VERSION"));

/// The three per-user course collections share one endpoint contract; only
/// the path segment and the wrapper key the server tends to use differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Wishlist,
    Cart,
    Enrollment,
}

impl CollectionKind {
    pub fn path_segment(self) -> &'static str {
        match self {
            CollectionKind::Wishlist => "wishlist",
            CollectionKind::Cart => "cart",
            CollectionKind::Enrollment => "enrollments",
        }
    }

    /// Wrapper properties the server has been observed to use for this
    /// collection, probed before the generic ones during normalization.
    pub fn wrapper_keys(self) -> &'static [&'static str] {
        match self {
            CollectionKind::Wishlist => &["wishlist", "wishlist_items"],
            CollectionKind::Cart => &["cart", "cart_items"],
            CollectionKind::Enrollment => &["enrollments", "enrolled_courses"],
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Server-side membership record. `entry_id` is an opaque identifier the
/// mutation endpoints key on; it is distinct from the course id and only
/// learned by listing the collection. Listings do not always expose it, so
/// every field except the course reference is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub entry_id: Option<String>,
    pub secondary_id: Option<String>,
    pub item_id: String,
    pub notifications_enabled: Option<bool>,
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    #[serde(deserialize_with = "course::de_id_string")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInData {
    pub token: Option<String>,
    pub user: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    data: Option<ErrorEnvelopeData>,
    message: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelopeData {
    error: Option<ErrorBody>,
    message: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MarketplaceApi {
    base_url: String,
    client: Client,
}

impl MarketplaceApi {
    pub fn new(base_url: &str) -> SatchelResult<Self> {
        let trimmed = base_url.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(SatchelError::usage("server URL cannot be empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|err| SatchelError::io(format!("failed to construct API client: {err}")))?;

        Ok(Self {
            base_url: trimmed,
            client,
        })
    }

    pub fn sign_in(&self, email: &str, password: &str) -> SatchelResult<SignInData> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SatchelError::usage(
                "email and password are required for sign in",
            ));
        }

        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response: SignInData = parse_json_response(
            self.client
                .post(self.url("/v1/auth/login"))
                .json(&body)
                .send()
                .map_err(network_error)?,
        )?;

        if response.token.is_none() {
            return Err(SatchelError::auth(
                "login response did not include a session token",
            ));
        }

        Ok(response)
    }

    pub fn sign_out(&self, token: &str) -> SatchelResult<()> {
        if token.trim().is_empty() {
            return Err(SatchelError::usage("session token is required for sign out"));
        }

        let response = self
            .client
            .post(self.url("/v1/auth/logout"))
            .bearer_auth(token)
            .send()
            .map_err(network_error)?;

        parse_no_content_response(response)
    }

    /// Lists a collection and hands back the raw payload: the response shape
    /// varies by deployment, so interpretation is left to the normalizer.
    pub fn list_collection(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
    ) -> SatchelResult<Value> {
        let request = self
            .client
            .get(self.collection_url(kind, user_id, None))
            .bearer_auth(token);
        parse_raw_json_response(request.send().map_err(network_error)?)
    }

    /// The server decides add vs remove and reports the resulting state.
    pub fn toggle_membership(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
        course_id: &str,
    ) -> SatchelResult<bool> {
        self.toggle_membership_raw(token, kind, user_id, course_id, false)
    }

    /// Toggle variant carrying a notification flag; used as the last-resort
    /// path when no entry id can be resolved for a notification patch.
    pub fn toggle_membership_with_notification(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
        course_id: &str,
    ) -> SatchelResult<bool> {
        self.toggle_membership_raw(token, kind, user_id, course_id, true)
    }

    fn toggle_membership_raw(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
        course_id: &str,
        notify: bool,
    ) -> SatchelResult<bool> {
        let mut body = serde_json::json!({
            "course_id": course_id,
            "user_id": user_id,
        });
        if notify {
            body["notify"] = Value::Bool(true);
        }

        let request = self
            .client
            .post(self.collection_url(kind, user_id, Some("toggle")))
            .bearer_auth(token)
            .json(&body);
        let payload = parse_raw_json_response(request.send().map_err(network_error)?)?;

        membership_flag(&payload).ok_or_else(|| {
            SatchelError::api(format!(
                "toggle response for {kind} did not include a membership flag"
            ))
        })
    }

    pub fn check_membership(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
        course_id: &str,
    ) -> SatchelResult<bool> {
        let suffix = format!("contains/{course_id}");
        let request = self
            .client
            .get(self.collection_url(kind, user_id, Some(&suffix)))
            .bearer_auth(token);
        let payload = parse_raw_json_response(request.send().map_err(network_error)?)?;

        membership_flag(&payload).ok_or_else(|| {
            SatchelError::api(format!(
                "membership check response for {kind} did not include a membership flag"
            ))
        })
    }

    pub fn delete_entry(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
        entry_id: &str,
    ) -> SatchelResult<()> {
        let suffix = format!("entries/{entry_id}");
        let request = self
            .client
            .delete(self.collection_url(kind, user_id, Some(&suffix)))
            .bearer_auth(token);
        parse_no_content_response(request.send().map_err(network_error)?)
    }

    pub fn clear_collection(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
    ) -> SatchelResult<()> {
        let request = self
            .client
            .delete(self.collection_url(kind, user_id, None))
            .bearer_auth(token);
        parse_no_content_response(request.send().map_err(network_error)?)
    }

    /// Patches the notification setting of a single entry. The response body
    /// is not guaranteed to carry the new value; callers reconcile by
    /// re-fetching the collection.
    pub fn patch_entry_notifications(
        &self,
        token: &str,
        kind: CollectionKind,
        user_id: &str,
        entry_id: &str,
    ) -> SatchelResult<()> {
        let suffix = format!("entries/{entry_id}/notifications");
        let request = self
            .client
            .patch(self.collection_url(kind, user_id, Some(&suffix)))
            .bearer_auth(token);
        parse_no_content_response(request.send().map_err(network_error)?)
    }

    pub fn course_detail(&self, course_id: &str) -> SatchelResult<Value> {
        let request = self.client.get(self.url(&format!("/v1/courses/{course_id}")));
        parse_raw_json_response(request.send().map_err(network_error)?)
    }

    pub fn course_details(&self, course_ids: &[String]) -> SatchelResult<Value> {
        let request = self
            .client
            .get(self.url("/v1/courses"))
            .query(&[("ids", course_ids.join(","))]);
        parse_raw_json_response(request.send().map_err(network_error)?)
    }

    pub fn full_catalog(&self) -> SatchelResult<Value> {
        let request = self.client.get(self.url("/v1/courses"));
        parse_raw_json_response(request.send().map_err(network_error)?)
    }

    fn collection_url(&self, kind: CollectionKind, user_id: &str, suffix: Option<&str>) -> String {
        let mut url = format!(
            "{}/v1/users/{}/{}",
            self.base_url,
            user_id,
            kind.path_segment()
        );
        if let Some(suffix) = suffix {
            url.push('/');
            url.push_str(suffix);
        }
        url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Extracts a boolean membership flag from whichever field name this
/// deployment uses, looking through a `data` envelope when present.
pub fn membership_flag(payload: &Value) -> Option<bool> {
    const FLAG_KEYS: [&str; 5] = ["in_collection", "inCollection", "added", "in_list", "active"];

    if let Some(flag) = payload.as_bool() {
        return Some(flag);
    }

    if let Some(object) = payload.as_object() {
        for key in FLAG_KEYS {
            if let Some(flag) = object.get(key).and_then(Value::as_bool) {
                return Some(flag);
            }
        }
        if let Some(data) = object.get("data") {
            return membership_flag(data);
        }
    }

    None
}

fn parse_no_content_response(response: Response) -> SatchelResult<()> {
    let status = response.status();
    let headers = response.headers().clone();
    if status.is_success() {
        return Ok(());
    }

    let body_text = response.text().unwrap_or_default();
    Err(parse_error_response(status, &body_text, Some(&headers)))
}

fn parse_raw_json_response(response: Response) -> SatchelResult<Value> {
    let status = response.status();
    let headers = response.headers().clone();
    let body_text = response.text().unwrap_or_default();

    if !status.is_success() {
        return Err(parse_error_response(status, &body_text, Some(&headers)));
    }

    if body_text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(&body_text)
        .map_err(|err| SatchelError::api(format!("failed to decode API response JSON: {err}")))
}

fn parse_json_response<T: DeserializeOwned>(response: Response) -> SatchelResult<T> {
    let value = parse_raw_json_response(response)?;

    if let Some(data) = value.get("data")
        && !data.is_null()
        && let Ok(parsed) = serde_json::from_value::<T>(data.clone())
    {
        return Ok(parsed);
    }

    serde_json::from_value::<T>(value).map_err(|err| {
        SatchelError::api(format!(
            "failed to map API response to expected shape: {err}"
        ))
    })
}

fn parse_error_response(
    status: StatusCode,
    body_text: &str,
    headers: Option<&HeaderMap>,
) -> SatchelError {
    let body_trimmed = body_text.trim();
    let fallback = if body_trimmed.is_empty() {
        format!("request failed with status {}", status.as_u16())
    } else {
        format!(
            "request failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(body_trimmed, 240)
        )
    };

    let parsed = serde_json::from_str::<ErrorEnvelope>(body_text).ok();
    let message = parsed
        .as_ref()
        .and_then(|payload| payload.error.as_ref())
        .and_then(|error| error.message.clone())
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|payload| payload.data.as_ref())
                .and_then(|data| data.error.as_ref())
                .and_then(|error| error.message.clone())
        })
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|payload| payload.data.as_ref())
                .and_then(|data| data.message.clone())
        })
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|payload| payload.data.as_ref())
                .and_then(|data| data.reason.clone())
        })
        .or_else(|| parsed.as_ref().and_then(|payload| payload.message.clone()))
        .or_else(|| parsed.as_ref().and_then(|payload| payload.reason.clone()))
        .unwrap_or(fallback);

    let with_retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(seconds) = headers.and_then(extract_retry_after_seconds) {
            format!("{message} [retry_after_seconds={seconds}]")
        } else {
            message
        }
    } else {
        message
    };

    if matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        SatchelError::auth(format!(
            "{} [http_status={}]",
            with_retry_after,
            status.as_u16()
        ))
    } else {
        SatchelError::api(format!(
            "{} [http_status={}]",
            with_retry_after,
            status.as_u16()
        ))
    }
}

fn extract_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .and_then(|value| value.parse::<u64>().ok())
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn network_error(err: reqwest::Error) -> SatchelError {
    SatchelError::api(format!("network request failed: {err}"))
}
