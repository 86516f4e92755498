//! TronClass portal API client
//!
//! Consumes an authenticated `tku_auth::Session` and relays portal operations
//! through it. Every failure is returned as an `ApiError` value classified by
//! `ErrorKind`; nothing is retried and nothing is cached.
//!
//! - `client`: generic JSON call plus to-do, bulletin, course and activity reads
//! - `request`: per-endpoint request builders with fixed field sets
//! - `transfer`: two-phase upload, streaming download, homework submission
//! - `disposition`: safe filenames from `Content-Disposition`

pub mod client;
pub mod disposition;
pub mod error;
pub mod request;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult, ErrorKind, Result};
pub use request::{
    ActivitiesRequest, ApiRequest, BulletinsRequest, CoursesRequest, RequestBody, TodosRequest,
    ToApiRequest,
};
pub use transfer::{
    DownloadOutcome, SubmissionRequest, UploadOutcome, UploadRegistration, UploadTicket,
};
