//! Upload-and-convert route.
//!
//! `POST /convert` takes a multipart form with a `file` part and an optional
//! `format` field, converts the upload and streams the result back as an
//! attachment. Both temporary files are handed to the workspace for deferred
//! removal once the request is done with them.

use std::path::{Path, PathBuf};

use af_av::{try_convert, ConversionJob, FileLease};
use af_core::AudioFormat;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// An upload that has been written to the workspace.
struct SavedUpload {
    original_name: String,
    lease: FileLease,
}

/// Multipart form accepted by `POST /convert`.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct ConvertForm {
    /// Audio file to convert.
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Target format; defaults to the configured format (mp3).
    format: Option<String>,
}

/// POST /convert
#[utoipa::path(
    post,
    path = "/convert",
    request_body(content = ConvertForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted audio as an attachment"),
        (status = 400, description = "No file part, no selected file, or a malformed format"),
        (status = 413, description = "Upload exceeds the configured limit"),
        (status = 500, description = "Conversion failed")
    )
)]
pub async fn convert_upload(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    handle(ctx, multipart)
        .await
        .map_err(|e| AppError::new(e).with_request_id(Some(request_id.0)))
}

async fn handle(ctx: AppContext, mut multipart: Multipart) -> af_core::Result<Response> {
    let limit = ctx.config.server.max_upload_bytes;
    let mut upload: Option<SavedUpload> = None;
    let mut requested_format: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") if upload.is_none() => {
                let original_name = match field.file_name() {
                    None => continue,
                    Some(name) => name.to_string(),
                };
                if original_name.is_empty() {
                    return Err(af_core::Error::InputMissing("No selected file".into()));
                }

                let path = ctx.workspace.allocate_path(&original_name, "");
                let lease = ctx.workspace.lease(&path, ctx.input_grace());
                let written = save_field(&mut field, &path, limit).await?;
                tracing::debug!(bytes = written, "Stored upload {:?} at {:?}", original_name, path);
                upload = Some(SavedUpload {
                    original_name,
                    lease,
                });
            }
            Some("format") => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                requested_format = Some(text);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| af_core::Error::InputMissing("No file part".into()))?;

    let format = match requested_format.as_deref().map(str::trim) {
        None | Some("") => ctx.config.conversion.default_format.clone(),
        Some(raw) => raw.parse::<AudioFormat>()?,
    };

    let output = ctx
        .workspace
        .allocate_path(&upload.original_name, &format!(".{}", format.extension()));
    let output_lease = ctx.workspace.lease(&output, ctx.output_grace());

    let _permit = ctx.admit().await?;

    let job = ConversionJob::new(upload.lease.path(), format.clone(), &output)
        .with_timeout(ctx.conversion_timeout());
    let result = try_convert(
        &ctx.tools,
        &job,
        |sample| {
            tracing::trace!(job_id = %job.id, percent = sample.percent, "Conversion progress");
        },
        None,
    )
    .await;

    if let Err(e) = result {
        discard_after_failure(&ctx, upload.lease, output_lease);
        return Err(e);
    }

    // The input is no longer needed; dropping its lease schedules removal.
    drop(upload.lease);

    let download_name = download_name(&upload.original_name, &format);
    stream_output(output_lease, &format, &download_name).await
}

/// Write one multipart field to `dest`, refusing more than `limit` bytes.
async fn save_field(field: &mut Field<'_>, dest: &Path, limit: u64) -> af_core::Result<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        written += chunk.len() as u64;
        if written > limit {
            return Err(af_core::Error::PayloadTooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

fn multipart_error(e: MultipartError, limit: u64) -> af_core::Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        af_core::Error::PayloadTooLarge { limit }
    } else {
        af_core::Error::Validation(format!("malformed multipart body: {}", e.body_text()))
    }
}

fn discard_after_failure(ctx: &AppContext, input: FileLease, output: FileLease) {
    let grace = ctx.failure_grace();
    for path in [input.keep(), output.keep()] {
        ctx.workspace.schedule_cleanup(&path, grace);
    }
}

/// Open the converted file and stream it; the lease rides along with the
/// body so cleanup starts once the body is finished or dropped.
async fn stream_output(
    lease: FileLease,
    format: &AudioFormat,
    download_name: &str,
) -> af_core::Result<Response> {
    let path: PathBuf = lease.path().to_path_buf();
    let file = tokio::fs::File::open(&path).await?;
    let len = file.metadata().await?.len();

    let stream = ReaderStream::with_capacity(file, 64 * 1024).map(move |chunk| {
        let _ = &lease;
        chunk
    });

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(download_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// `<original basename without extension>.<target extension>`.
pub(crate) fn download_name(original: &str, format: &AudioFormat) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = Path::new(base)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "converted".to_string());
    format!("{stem}.{}", format.extension())
}

/// Build an attachment header. Non-ASCII names get an ASCII fallback plus an
/// RFC 5987 `filename*` parameter.
pub(crate) fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(name)
        )
    }
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
