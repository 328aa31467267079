//! HTTP handler functions for the disaster reports API.

use std::sync::Arc;

use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::error::{InternalError, QueryPayloadError};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use disaster_reports_ingest::{IngestError, QueryError};
use disaster_reports_server_models::{
    ApiErrorResponse, ApiFieldError, ApiHealth, ApiReport, ApiReportTypes, NearQueryParams,
    NearReportsResponse, SubmitReportResponse,
};
use disaster_reports_upload::{ImageFormat, ImageStore, UploadError};
use disaster_reports_validation::{ProximityQueryInput, SubmissionInput, ValidationErrors};
use futures::StreamExt as _;

use crate::AppState;

/// Largest accepted text field in a submission, in bytes.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

const RATE_LIMITED_MESSAGE: &str =
    "Too many reports created from this IP, please try again after an hour";

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/report-types`
///
/// Returns the accepted disaster types and severities.
pub async fn report_types() -> HttpResponse {
    HttpResponse::Ok().json(ApiReportTypes::default())
}

/// `POST /api/reports`
///
/// Accepts a multipart submission with an optional `image` part. The image
/// is checked first, then the submission is validated and admitted, and
/// only then is the image uploaded and the report stored.
pub async fn submit_report(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> HttpResponse {
    let form = match read_submission(payload, state.image_policy.max_bytes).await {
        Ok(form) => form,
        Err(e) => {
            log::debug!("Rejected malformed submission: {e}");
            return HttpResponse::BadRequest().json(ApiErrorResponse::new("Malformed request"));
        }
    };

    let image = match form.image.map(|image| check_image(&state, image)).transpose() {
        Ok(image) => image,
        Err(e) => {
            log::debug!("Rejected image upload: {e}");
            return invalid_file_response(&e);
        }
    };

    let source_key = source_key(&req, state.trust_forwarded_for);

    let admitted = match state.ingestion.admit(&source_key, &form.input) {
        Ok(admitted) => admitted,
        Err(e) => return ingest_error_response(&e),
    };

    let image_url = match image {
        Some(image) => match image.upload().await {
            Ok(url) => Some(url),
            Err(e) => {
                log::error!("Failed to store image: {e}");
                return internal_error();
            }
        },
        None => None,
    };

    match state.ingestion.create(admitted, image_url).await {
        Ok(report) => HttpResponse::Created().json(SubmitReportResponse {
            success: true,
            message: "Report created successfully".to_string(),
            report_id: report.id.to_string(),
        }),
        Err(e) => ingest_error_response(&e),
    }
}

/// `GET /api/reports/near`
///
/// Returns reports within `radius` meters (default 5000) of `lat`/`lng`,
/// newest first.
pub async fn near_reports(
    state: web::Data<AppState>,
    params: web::Query<NearQueryParams>,
) -> HttpResponse {
    let params = params.into_inner();
    let input = ProximityQueryInput {
        lat: params.lat,
        lng: params.lng,
        radius: params.radius,
    };

    match state.proximity.near(&input).await {
        Ok(reports) => HttpResponse::Ok().json(NearReportsResponse {
            success: true,
            reports: reports.into_iter().map(ApiReport::from).collect(),
        }),
        Err(QueryError::Validation(errors)) => {
            log::debug!("Rejected proximity query: {errors}");
            validation_error_response(&errors)
        }
        Err(e @ (QueryError::Store(_) | QueryError::Timeout(_))) => {
            log::error!("Failed to query nearby reports: {e}");
            internal_error()
        }
    }
}

/// Rejects query strings that do not deserialize, such as a repeated `lat`.
pub fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("Rejected malformed query string: {err}");

    let response = HttpResponse::BadRequest().json(
        ApiErrorResponse::new("Malformed request").with_errors(vec![ApiFieldError {
            field: "query".to_string(),
            code: "malformed".to_string(),
            message: err.to_string(),
        }]),
    );

    InternalError::from_response(err, response).into()
}

/// An uploaded image part, not yet checked.
struct ImagePart {
    content_type: Option<String>,
    bytes: Vec<u8>,
    /// The part exceeded the read limit and was truncated.
    oversized: bool,
}

struct SubmissionForm {
    input: SubmissionInput,
    image: Option<ImagePart>,
}

#[derive(Debug, thiserror::Error)]
enum FormError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("field {0} is too large")]
    FieldTooLarge(String),
    #[error("field {0} is not valid UTF-8")]
    NotUtf8(String),
}

async fn read_submission(
    mut payload: Multipart,
    max_image_bytes: usize,
) -> Result<SubmissionForm, FormError> {
    let mut input = SubmissionInput::default();
    let mut image = None;

    while let Some(field) = payload.next().await {
        let mut field = field?;
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let content_type = field.content_type().map(ToString::to_string);
            let (bytes, oversized) = read_field(&mut field, max_image_bytes).await?;
            if bytes.is_empty() {
                // An empty file input still sends a part with no body.
                log::trace!("Ignoring empty image part");
                continue;
            }
            image = Some(ImagePart {
                content_type,
                bytes,
                oversized,
            });
            continue;
        }

        let (bytes, oversized) = read_field(&mut field, MAX_TEXT_FIELD_BYTES).await?;
        if oversized {
            return Err(FormError::FieldTooLarge(name));
        }
        let value = String::from_utf8(bytes).map_err(|_| FormError::NotUtf8(name.clone()))?;

        match name.as_str() {
            "type" => input.disaster_type = Some(value),
            "severity" => input.severity = Some(value),
            "description" => input.description = Some(value),
            "latitude" => input.latitude = Some(value),
            "longitude" => input.longitude = Some(value),
            _ => log::trace!("Ignoring unknown form field {name:?}"),
        }
    }

    Ok(SubmissionForm { input, image })
}

/// Reads at most `limit` bytes of a part. Returns whether more remained.
async fn read_field(field: &mut Field, limit: usize) -> Result<(Vec<u8>, bool), MultipartError> {
    let mut bytes = Vec::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > limit {
            return Ok((bytes, true));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok((bytes, false))
}

/// An image that passed [`ImagePolicy`](disaster_reports_upload::ImagePolicy)
/// and is waiting to be uploaded.
struct PendingImage {
    store: Arc<dyn ImageStore>,
    format: ImageFormat,
    bytes: Vec<u8>,
}

impl PendingImage {
    async fn upload(self) -> Result<String, UploadError> {
        self.store.store(self.format, self.bytes).await
    }
}

fn check_image(state: &AppState, image: ImagePart) -> Result<PendingImage, UploadError> {
    let Some(store) = &state.images else {
        return Err(UploadError::InvalidFile {
            reason: "image uploads are disabled".to_string(),
        });
    };

    if image.oversized {
        return Err(UploadError::InvalidFile {
            reason: format!("file exceeds {} bytes", state.image_policy.max_bytes),
        });
    }

    let format = state
        .image_policy
        .check(image.content_type.as_deref(), &image.bytes)?;

    Ok(PendingImage {
        store: Arc::clone(store),
        format,
        bytes: image.bytes,
    })
}

/// Key the rate limiter buckets a request under.
///
/// Uses the peer address unless forwarded headers are trusted.
fn source_key(req: &HttpRequest, trust_forwarded_for: bool) -> String {
    let key = if trust_forwarded_for {
        req.connection_info().realip_remote_addr().map(str::to_string)
    } else {
        req.peer_addr().map(|addr| addr.ip().to_string())
    };

    key.unwrap_or_else(|| "unknown".to_string())
}

fn ingest_error_response(error: &IngestError) -> HttpResponse {
    match error {
        IngestError::Validation(errors) => {
            log::debug!("Rejected submission: {errors}");
            validation_error_response(errors)
        }
        &IngestError::RateLimited { retry_after } => {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let secs = secs.max(1);
            HttpResponse::TooManyRequests()
                .insert_header((header::RETRY_AFTER, secs.to_string()))
                .json(ApiErrorResponse::new(RATE_LIMITED_MESSAGE).with_retry_after(secs))
        }
        e @ (IngestError::Store(_) | IngestError::Timeout(_)) => {
            log::error!("Failed to create report: {e}");
            internal_error()
        }
    }
}

fn validation_error_response(errors: &ValidationErrors) -> HttpResponse {
    let errors = errors
        .issues()
        .iter()
        .map(|issue| ApiFieldError {
            field: issue.field().to_string(),
            code: issue.code().to_string(),
            message: issue.to_string(),
        })
        .collect();

    HttpResponse::BadRequest().json(ApiErrorResponse::new("Validation error").with_errors(errors))
}

fn invalid_file_response(error: &UploadError) -> HttpResponse {
    let message = match error {
        UploadError::InvalidFile { reason } => reason.clone(),
        other => other.to_string(),
    };

    HttpResponse::BadRequest().json(ApiErrorResponse::new("Invalid file").with_errors(vec![
        ApiFieldError {
            field: "image".to_string(),
            code: "invalid_file".to_string(),
            message,
        },
    ]))
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiErrorResponse::new("Internal server error"))
}
