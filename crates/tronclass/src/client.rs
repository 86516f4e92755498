//! Authenticated portal client

use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tku_auth::Session;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult, Result};
use crate::request::{
    ActivitiesRequest, ApiRequest, BulletinsRequest, CoursesRequest, RequestBody, TodosRequest,
    ToApiRequest,
};

/// Issues portal requests through one authenticated session.
///
/// The session is moved in and dropped with the client, so its cookies never
/// outlive the invocation that created them.
#[derive(Debug)]
pub struct ApiClient {
    session: Session,
}

impl ApiClient {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolve a portal-relative path; absolute URLs pass through untouched.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            self.session.endpoints().portal_api(path)
        }
    }

    /// Issue `request` and decode a JSON reply.
    ///
    /// Transport failures are `Network`, non-2xx replies are `Http` with the
    /// body kept, and 2xx replies that are not JSON are `Decode`.
    pub async fn call(&self, request: ApiRequest) -> ApiResult {
        let method = request.method.clone();
        let url = self.url(&request.url);
        let response = send(self.bounded(request)).await?;
        debug!(%method, %url, status = response.status().as_u16(), "portal replied");
        json_body(error_for_status(response).await?).await
    }

    pub async fn todos(&self) -> ApiResult {
        self.call(TodosRequest.to_api_request()).await
    }

    pub async fn bulletins(&self, range: &BulletinsRequest) -> ApiResult {
        self.call(range.to_api_request()).await
    }

    pub async fn courses(&self, filter: &CoursesRequest) -> ApiResult {
        self.call(filter.to_api_request()).await
    }

    pub async fn activities(&self, course_id: u64) -> ApiResult {
        self.call(ActivitiesRequest { course_id }.to_api_request())
            .await
    }

    /// `builder` with the session's total timeout applied.
    pub(crate) fn bounded(&self, request: ApiRequest) -> RequestBuilder {
        self.builder(request).timeout(self.session.timeout())
    }

    /// Request without a total timeout; only the client's connect and
    /// idle-read limits apply.
    pub(crate) fn builder(&self, request: ApiRequest) -> RequestBuilder {
        let url = self.url(&request.url);
        let mut builder = self
            .session
            .client()
            .request(request.method, url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        match request.body {
            RequestBody::None => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Form(fields) => builder.form(&fields),
        }
    }
}

pub(crate) async fn send(builder: RequestBuilder) -> Result<Response> {
    builder.send().await.map_err(|e| {
        warn!(error = %e, timeout = e.is_timeout(), "portal request failed");
        ApiError::network(e)
    })
}

/// Pass 2xx responses through; read the body of anything else into an
/// `Http` error.
pub(crate) async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(http_error(response).await)
}

/// `Http` error carrying whatever body could be read.
pub(crate) async fn http_error(response: Response) -> ApiError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => Some(body),
        Err(e) => {
            debug!(error = %e, "error body unreadable");
            None
        }
    };
    warn!(status = status.as_u16(), "portal returned error status");
    ApiError::http(status, body)
}

pub(crate) async fn json_body(response: Response) -> ApiResult {
    let text = response.text().await.map_err(ApiError::network)?;
    serde_json::from_str::<Value>(&text).map_err(ApiError::decode)
}
