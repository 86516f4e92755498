//! Tool catalogue and invocation
//!
//! Every invocation is independent: parse arguments, log in from scratch,
//! run one portal operation, drop the session. The outcome is always an
//! envelope value; nothing here returns an error to the transport.

use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{Value, json};
use tku_auth::{AuthError, Credentials, Endpoints, Orchestrator, OrchestratorOptions, Session};
use tracing::{Instrument, info, info_span, warn};
use tronclass::transfer;
use tronclass::{ApiClient, ApiError, BulletinsRequest, CoursesRequest, SubmissionRequest};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::{self, ServiceMetrics};

/// Where in an invocation a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Auth,
    Call,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Auth => "auth",
            Stage::Call => "call",
        }
    }
}

/// Result of one tool call as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Ok(Value),
    Failed {
        stage: Stage,
        kind: String,
        status: Option<u16>,
        message: String,
    },
}

impl Envelope {
    fn auth(err: &AuthError) -> Self {
        Envelope::Failed {
            stage: Stage::Auth,
            kind: err.kind().to_string(),
            status: err.status(),
            message: err.to_string(),
        }
    }

    fn call(err: &ApiError) -> Self {
        Envelope::Failed {
            stage: Stage::Call,
            kind: err.kind.label().to_string(),
            status: err.kind.status(),
            message: err.message.clone(),
        }
    }

    fn invalid(err: &Error) -> Self {
        Envelope::Failed {
            stage: Stage::Call,
            kind: "invalid_arguments".to_string(),
            status: None,
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Failed { .. })
    }

    /// `ok`, or the failure kind.
    pub fn outcome(&self) -> &str {
        match self {
            Envelope::Ok(_) => "ok",
            Envelope::Failed { kind, .. } => kind,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Ok(data) => json!({ "ok": true, "data": data }),
            Envelope::Failed {
                stage,
                kind,
                status,
                message,
            } => json!({
                "ok": false,
                "stage": stage.label(),
                "error": {
                    "kind": kind,
                    "status": status,
                    "message": message,
                },
            }),
        }
    }
}

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    GetToDo,
    GetBulletins(BulletinsRequest),
    GetCourses(CoursesRequest),
    GetActivities { course_id: u64 },
    UploadFile { path: PathBuf },
    SubmitHomework(SubmissionRequest),
    DownloadFile { reference_id: u64 },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BulletinsArgs {
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CoursesArgs {
    #[serde(default)]
    status: Option<Vec<String>>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    classify_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivitiesArgs {
    course_id: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadArgs {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SubmitArgs {
    activity_id: u64,
    upload_ids: Vec<u64>,
    #[serde(default)]
    comment: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DownloadArgs {
    reference_id: u64,
}

fn args<T: for<'de> Deserialize<'de>>(arguments: &Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|e| Error::InvalidArguments(e.to_string()))
}

impl ToolCall {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self> {
        Ok(match name {
            "getToDo" => {
                args::<NoArgs>(arguments)?;
                ToolCall::GetToDo
            }
            "getBulletins" => {
                let a: BulletinsArgs = args(arguments)?;
                BulletinsRequest::parse(a.start_date.as_deref(), a.end_date.as_deref())
                    .map(ToolCall::GetBulletins)
                    .map_err(Error::InvalidArguments)?
            }
            "getCourses" => {
                let a: CoursesArgs = args(arguments)?;
                let defaults = CoursesRequest::default();
                ToolCall::GetCourses(CoursesRequest {
                    status: a.status.unwrap_or(defaults.status),
                    keyword: a.keyword.unwrap_or(defaults.keyword),
                    classify_type: a.classify_type.unwrap_or(defaults.classify_type),
                })
            }
            "getActivities" => {
                let a: ActivitiesArgs = args(arguments)?;
                ToolCall::GetActivities {
                    course_id: a.course_id,
                }
            }
            "uploadFile" => {
                let a: UploadArgs = args(arguments)?;
                if a.path.as_os_str().is_empty() {
                    return Err(Error::InvalidArguments("path must not be empty".into()));
                }
                ToolCall::UploadFile { path: a.path }
            }
            "submitHomework" => {
                let a: SubmitArgs = args(arguments)?;
                ToolCall::SubmitHomework(SubmissionRequest {
                    activity_id: a.activity_id,
                    upload_ids: a.upload_ids,
                    comment: a.comment,
                })
            }
            "downloadFile" => {
                let a: DownloadArgs = args(arguments)?;
                ToolCall::DownloadFile {
                    reference_id: a.reference_id,
                }
            }
            other => return Err(Error::UnknownTool(other.to_string())),
        })
    }
}

/// `tools/list` entries: name, description and JSON input schema.
pub fn definitions() -> Vec<Value> {
    let no_args = json!({ "type": "object", "properties": {}, "additionalProperties": false });
    vec![
        json!({
            "name": "getToDo",
            "description": "List pending to-do items (homework, quizzes) across all courses.",
            "inputSchema": no_args,
        }),
        json!({
            "name": "getBulletins",
            "description": "List course bulletins, optionally limited to a date range.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "start_date": { "type": "string", "description": "YYYY-MM-DD" },
                    "end_date": { "type": "string", "description": "YYYY-MM-DD" },
                },
                "additionalProperties": false,
            },
        }),
        json!({
            "name": "getCourses",
            "description": "List the student's courses.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "status": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Defaults to [\"ongoing\", \"notStarted\"]",
                    },
                    "keyword": { "type": "string" },
                    "classify_type": { "type": "string", "description": "Defaults to recently_started" },
                },
                "additionalProperties": false,
            },
        }),
        json!({
            "name": "getActivities",
            "description": "List the activities of one course.",
            "inputSchema": {
                "type": "object",
                "properties": { "course_id": { "type": "integer", "minimum": 0 } },
                "required": ["course_id"],
                "additionalProperties": false,
            },
        }),
        json!({
            "name": "uploadFile",
            "description": "Upload a local file and return its upload id for use in submitHomework.",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string", "description": "Local file path" } },
                "required": ["path"],
                "additionalProperties": false,
            },
        }),
        json!({
            "name": "submitHomework",
            "description": "Submit a homework activity referencing previously uploaded files.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "activity_id": { "type": "integer", "minimum": 0 },
                    "upload_ids": { "type": "array", "items": { "type": "integer", "minimum": 0 } },
                    "comment": { "type": "string" },
                },
                "required": ["activity_id", "upload_ids"],
                "additionalProperties": false,
            },
        }),
        json!({
            "name": "downloadFile",
            "description": "Download a file by reference id into the configured download directory.",
            "inputSchema": {
                "type": "object",
                "properties": { "reference_id": { "type": "integer", "minimum": 0 } },
                "required": ["reference_id"],
                "additionalProperties": false,
            },
        }),
    ]
}

/// Everything a call needs besides its arguments.
pub struct ToolContext {
    pub endpoints: Endpoints,
    pub options: OrchestratorOptions,
    pub credentials: Option<Credentials>,
    pub download_dir: PathBuf,
    pub metrics: ServiceMetrics,
}

impl ToolContext {
    pub fn from_config(config: &Config, metrics: ServiceMetrics) -> Self {
        Self {
            endpoints: config.endpoints(),
            options: config.orchestrator_options(),
            credentials: config.credentials.resolved.clone(),
            download_dir: config.transfer.download_dir.clone(),
            metrics,
        }
    }

    async fn establish(&self) -> std::result::Result<Session, AuthError> {
        let credentials = self.credentials.clone().ok_or_else(|| {
            AuthError::Config(
                "no credentials: set TKU_USERNAME and TKU_PASSWORD, or [credentials] in the config file"
                    .into(),
            )
        })?;
        let mut orchestrator =
            Orchestrator::new(credentials, self.endpoints.clone(), self.options.clone());
        let result = orchestrator.establish().await;
        metrics::record_auth_attempt(match &result {
            Ok(_) => "established",
            Err(err) => err.kind(),
        });
        result
    }
}

/// Run one named tool and wrap the outcome.
pub async fn invoke(ctx: &ToolContext, name: &str, arguments: &Value) -> Envelope {
    let invocation_id = uuid::Uuid::new_v4();
    let span = info_span!("tool_call", tool = name, %invocation_id);
    let started = Instant::now();

    let envelope = dispatch(ctx, name, arguments).instrument(span.clone()).await;

    let elapsed = started.elapsed().as_secs_f64();
    metrics::record_tool_call(&ctx.metrics, name, envelope.outcome(), elapsed);
    span.in_scope(|| match &envelope {
        Envelope::Ok(_) => info!(elapsed_secs = elapsed, "tool call succeeded"),
        Envelope::Failed {
            stage,
            kind,
            status,
            ..
        } => warn!(
            stage = stage.label(),
            kind = %kind,
            status = ?status,
            elapsed_secs = elapsed,
            "tool call failed"
        ),
    });
    envelope
}

async fn dispatch(ctx: &ToolContext, name: &str, arguments: &Value) -> Envelope {
    let call = match ToolCall::parse(name, arguments) {
        Ok(call) => call,
        Err(err) => return Envelope::invalid(&err),
    };
    let session = match ctx.establish().await {
        Ok(session) => session,
        Err(err) => return Envelope::auth(&err),
    };
    let client = ApiClient::new(session);
    match run(ctx, &client, call).await {
        Ok(data) => Envelope::Ok(data),
        Err(err) => Envelope::call(&err),
    }
}

async fn run(
    ctx: &ToolContext,
    client: &ApiClient,
    call: ToolCall,
) -> std::result::Result<Value, ApiError> {
    match call {
        ToolCall::GetToDo => client.todos().await,
        ToolCall::GetBulletins(range) => client.bulletins(&range).await,
        ToolCall::GetCourses(filter) => client.courses(&filter).await,
        ToolCall::GetActivities { course_id } => client.activities(course_id).await,
        ToolCall::UploadFile { path } => {
            let outcome = transfer::upload(client, &path).await?;
            serde_json::to_value(outcome).map_err(ApiError::decode)
        }
        ToolCall::SubmitHomework(request) => transfer::submit(client, &request).await,
        ToolCall::DownloadFile { reference_id } => {
            let outcome = transfer::download(client, reference_id, &ctx.download_dir).await?;
            serde_json::to_value(outcome).map_err(ApiError::decode)
        }
    }
}
