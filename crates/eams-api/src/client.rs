//! HTTP client for the course-selection REST API.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use eams_core::config::{ClientConfig, ConfigError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    CountInfo, Envelope, Lesson, LessonQueryRequest, LessonQueryResponse, QueryCondition,
    RepairedCourse, SelectDetail, StdCounts, Turn,
};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Builder for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    cookie: Option<String>,
    user_agent: String,
    headers: Vec<(String, String)>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cookie: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
        }
    }
}

impl ClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Raw `Cookie` header value, e.g. `"JSESSIONID=...; route=..."`.
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Seed a builder from the `[client]` section of eams.toml.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = Self::default()
            .base_url(config.base_url())
            .timeout(config.timeout()?);
        if let Some(cookie) = config.cookie() {
            builder = builder.cookie(cookie);
        }
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(ref headers) = config.headers {
            for (name, value) in headers {
                builder = builder.header(name.clone(), value.clone());
            }
        }
        Ok(builder)
    }

    pub fn build(self) -> ApiResult<Client> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, header_value("user-agent", &self.user_agent)?);
        if let Some(ref cookie) = self.cookie {
            headers.insert(COOKIE, header_value("cookie", cookie)?);
        }
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ApiError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value(name, value)?);
        }

        // Stale sessions are bounced to the SSO login page; keep the 3xx so
        // it can be classified instead of decoding the login HTML.
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        debug!(%base_url, timeout_ms = self.timeout.as_millis() as u64, "client built");
        Ok(Client { http, base_url })
    }
}

fn header_value(name: &str, value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Authenticated client for the course-selection service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Student ids bound to the logged-in account.
    pub async fn student_ids(&self) -> ApiResult<Vec<i64>> {
        self.get("/student/course-select/students").await
    }

    /// Enrollment rounds currently open to a student.
    pub async fn open_turns(&self, student_id: i64) -> ApiResult<Vec<Turn>> {
        self.get(&format!("/student/course-select/open-turns/{student_id}"))
            .await
    }

    /// Round configuration for a student, including the semester that
    /// lesson queries are scoped to.
    pub async fn select_detail(&self, student_id: i64, turn_id: i64) -> ApiResult<SelectDetail> {
        self.get(&format!(
            "/student/course-select/{student_id}/turn/{turn_id}/select"
        ))
        .await
    }

    /// Filter values (grades, departments, campuses...) for a round.
    pub async fn query_condition(&self, turn_id: i64) -> ApiResult<QueryCondition> {
        self.get(&format!("/student/course-select/query-condition/{turn_id}"))
            .await
    }

    pub async fn repaired_courses(&self, turn_id: i64, student_id: i64) -> ApiResult<Vec<RepairedCourse>> {
        self.get(&format!(
            "/student/course-select/repaired-courses/{turn_id}/{student_id}"
        ))
        .await
    }

    pub async fn selected_lessons(&self, turn_id: i64, student_id: i64) -> ApiResult<Vec<Lesson>> {
        self.get(&format!(
            "/student/course-select/selected-lessons/{turn_id}/{student_id}"
        ))
        .await
    }

    /// Search sections in a round. `None` lists selectable sections.
    pub async fn query_lessons(
        &self,
        student_id: i64,
        turn_id: i64,
        request: Option<LessonQueryRequest>,
    ) -> ApiResult<LessonQueryResponse> {
        let request = request.unwrap_or_else(|| LessonQueryRequest::selectable(student_id, turn_id));
        self.post(
            &format!("/student/course-select/query-lesson/{student_id}/{turn_id}"),
            &request,
        )
        .await
    }

    pub async fn count_info(&self, lesson_id: i64) -> ApiResult<CountInfo> {
        self.get_with_query(
            "/student/course-select/count-info",
            &[("lessonId", lesson_id.to_string())],
        )
        .await
    }

    /// Enrollment counters for several sections in one call.
    pub async fn std_counts(&self, lesson_ids: &[i64]) -> ApiResult<StdCounts> {
        let ids = lesson_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.get_with_query("/student/course-select/std-count", &[("lessonIds", ids)])
            .await
    }

    // ── Request plumbing ────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        let req = self.http.get(self.url(endpoint));
        self.execute(req, endpoint).await
    }

    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let req = self.http.get(self.url(endpoint)).query(query);
        self.execute(req, endpoint).await
    }

    pub(crate) async fn post<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let req = self.http.post(self.url(endpoint)).json(body);
        self.execute(req, endpoint).await
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder, endpoint: &str) -> ApiResult<T> {
        let resp = req.send().await?;
        let status = resp.status();

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, body);
            warn!(%endpoint, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        let bytes = resp.bytes().await?;
        decode_envelope(&bytes)
    }
}

/// Unwrap `{result, message, data}` into the typed payload.
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    if envelope.result != 0 {
        return Err(ApiError::RemoteRejected {
            code: envelope.result,
            message: envelope
                .message
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    Ok(serde_json::from_value(envelope.data)?)
}
