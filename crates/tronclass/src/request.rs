//! Request descriptors and per-endpoint builders
//!
//! Each portal endpoint gets its own builder with a fixed field set.

use chrono::NaiveDate;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::{Value, json};

/// Body of an `ApiRequest`.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    None,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A portal request: method, URL (portal-relative path or absolute URL),
/// header overrides, query parameters and body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: RequestBody::None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            body: RequestBody::Json(body),
            ..Self::new(Method::POST, url)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_owned(), value.into()));
        self
    }

    pub fn is_absolute(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// Conversion from an endpoint builder to a request descriptor.
pub trait ToApiRequest {
    fn to_api_request(&self) -> ApiRequest;
}

/// GET `/api/todos`
#[derive(Debug, Clone, Default)]
pub struct TodosRequest;

impl ToApiRequest for TodosRequest {
    fn to_api_request(&self) -> ApiRequest {
        ApiRequest::get("/api/todos")
    }
}

/// GET `/api/course-bulletins`, optionally limited to a date range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulletinsRequest {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl BulletinsRequest {
    /// Parse `YYYY-MM-DD` bounds. A start after the end is rejected.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, String> {
        let parse = |label: &str, raw: Option<&str>| -> Result<Option<NaiveDate>, String> {
            raw.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map_err(|e| format!("{label} must be YYYY-MM-DD, got {s:?}: {e}"))
                })
                .transpose()
        };
        let request = Self {
            start: parse("start_date", start)?,
            end: parse("end_date", end)?,
        };
        if let (Some(start), Some(end)) = (request.start, request.end) {
            if start > end {
                return Err(format!("start_date {start} is after end_date {end}"));
            }
        }
        Ok(request)
    }
}

impl ToApiRequest for BulletinsRequest {
    fn to_api_request(&self) -> ApiRequest {
        let mut request = ApiRequest::get("/api/course-bulletins");
        if let Some(start) = self.start {
            request = request.query("start_date", start.format("%Y-%m-%d").to_string());
        }
        if let Some(end) = self.end {
            request = request.query("end_date", end.format("%Y-%m-%d").to_string());
        }
        request
    }
}

/// POST `/api/my-courses` with a status/keyword/classification filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoursesRequest {
    pub status: Vec<String>,
    pub keyword: String,
    pub classify_type: String,
}

impl Default for CoursesRequest {
    fn default() -> Self {
        Self {
            status: vec!["ongoing".into(), "notStarted".into()],
            keyword: String::new(),
            classify_type: "recently_started".into(),
        }
    }
}

impl ToApiRequest for CoursesRequest {
    fn to_api_request(&self) -> ApiRequest {
        ApiRequest::post_json(
            "/api/my-courses",
            json!({
                "conditions": {
                    "status": self.status,
                    "keyword": self.keyword,
                    "classify_type": self.classify_type,
                    "display_studio_list": false,
                },
                "showScorePassedStatus": false,
            }),
        )
    }
}

/// GET `/api/courses/{course_id}/activities`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitiesRequest {
    pub course_id: u64,
}

impl ToApiRequest for ActivitiesRequest {
    fn to_api_request(&self) -> ApiRequest {
        ApiRequest::get(format!("/api/courses/{}/activities", self.course_id))
    }
}
