//! `reqwest` implementation of [`StorageConnection`].

use std::time::Duration;

use futures_util::{TryStreamExt, stream};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, RequestBuilder, Response};
use tokio_util::io::ReaderStream;
use tracing::debug;

use bucketpush_protocol::constants::{
    CHUNK_COUNT_FIELD, CHUNK_COUNT_HEADER, CHUNK_INDEX_FIELD, CHUNK_INDEX_HEADER, DATA_SUFFIX,
    FILE_FIELD, FINISH_SUFFIX, RELATIVE_PATH_FIELD, RELATIVE_PATH_HEADER, UPLOAD_SESSIONS_PATH,
    session_path,
};
use bucketpush_protocol::messages::{
    ApiErrorBody, FinalizeUploadResponse, InitiateUploadRequest, InitiateUploadResponse,
    UnitUploadResponse,
};
use bucketpush_protocol::types::FinalizeAction;
use bucketpush_transfer::{ByteRange, ChunkUnit, PayloadUnit, SourceFile, validate_relative_path};

use crate::config::ClientConfig;
use crate::connection::{ApiFuture, StorageConnection};
use crate::error::ApiError;

/// Upload API client.
pub struct HttpConnection {
    http: reqwest::Client,
    base_url: String,
}

impl HttpConnection {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.normalized_base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_url(&self, session_id: &str, suffix: &str) -> String {
        let encoded = utf8_percent_encode(session_id, NON_ALPHANUMERIC).to_string();
        format!("{}{}", self.base_url, session_path(&encoded, suffix))
    }

    fn post(&self, url: &str, token: &str) -> Result<RequestBuilder, ApiError> {
        if token.is_empty() {
            return Err(ApiError::InvalidToken);
        }
        Ok(self.http.post(url).bearer_auth(token))
    }

    async fn send_unit(
        &self,
        session_id: &str,
        unit: PayloadUnit,
        token: &str,
    ) -> Result<u64, ApiError> {
        let url = self.session_url(session_id, DATA_SUFFIX);
        let sent = unit.byte_len();

        let request = match unit {
            PayloadUnit::Batch(batch) => {
                let form = batch_form(&batch.entries)?;
                self.post(&url, token)?.multipart(form)
            }
            PayloadUnit::Chunk(chunk) => {
                let form = chunk_form(&chunk)?;
                self.post(&url, token)?
                    .header(CHUNK_INDEX_HEADER, chunk.chunk_index.to_string())
                    .header(CHUNK_COUNT_HEADER, chunk.chunk_count.to_string())
                    .header(
                        RELATIVE_PATH_HEADER,
                        utf8_percent_encode(&chunk.file.relative_path, NON_ALPHANUMERIC)
                            .to_string(),
                    )
                    .multipart(form)
            }
        };

        let resp = check_status(request.send().await?).await?;
        let body = resp.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(sent);
        }
        let parsed: UnitUploadResponse = serde_json::from_slice(&body)?;
        Ok(parsed.bytes_sent.unwrap_or(sent))
    }
}

impl StorageConnection for HttpConnection {
    fn initiate<'a>(
        &'a self,
        request: &'a InitiateUploadRequest,
        token: &'a str,
    ) -> ApiFuture<'a, InitiateUploadResponse> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, UPLOAD_SESSIONS_PATH);
            debug!(url = %url, protocol = %request.protocol, name = %request.name, "initiating upload session");
            let resp = check_status(self.post(&url, token)?.query(request).send().await?).await?;
            let body = resp.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        })
    }

    fn upload_unit<'a>(
        &'a self,
        session_id: &'a str,
        unit: PayloadUnit,
        token: &'a str,
    ) -> ApiFuture<'a, u64> {
        Box::pin(self.send_unit(session_id, unit, token))
    }

    fn finalize<'a>(
        &'a self,
        session_id: &'a str,
        action: FinalizeAction,
        token: &'a str,
    ) -> ApiFuture<'a, FinalizeUploadResponse> {
        Box::pin(async move {
            let url = self.session_url(session_id, FINISH_SUFFIX);
            debug!(session = %session_id, action = %action, "finalizing upload session");
            let resp = check_status(
                self.post(&url, token)?
                    .query(&[("action", action.as_str())])
                    .send()
                    .await?,
            )
            .await?;
            let body = resp.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        })
    }
}

/// Maps non-2xx responses to [`ApiError::Status`].
async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => text,
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Streams `file` (or one range of it), opening it on first poll.
///
/// Parts are built for a whole batch up front, so a batch of N entries
/// must not hold N descriptors while the form is assembled.
fn lazy_body(file: SourceFile, range: Option<ByteRange>) -> Body {
    let reader = stream::once(async move {
        match range {
            Some(range) => file.open_range(range).await,
            None => file.open().await,
        }
    });
    Body::wrap_stream(reader.map_ok(ReaderStream::new).try_flatten())
}

fn file_part(file: &SourceFile) -> Result<Part, ApiError> {
    validate_relative_path(&file.relative_path)
        .map_err(|e| ApiError::InvalidUnit(e.to_string()))?;
    let body = lazy_body(file.clone(), None);
    Ok(Part::stream_with_length(body, file.size).file_name(file.relative_path.clone()))
}

fn batch_form(entries: &[SourceFile]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for entry in entries {
        form = form.part(FILE_FIELD, file_part(entry)?);
    }
    Ok(form)
}

fn chunk_form(chunk: &ChunkUnit) -> Result<Form, ApiError> {
    let path = &chunk.file.relative_path;
    validate_relative_path(path).map_err(|e| ApiError::InvalidUnit(e.to_string()))?;
    if chunk.range.is_empty() || chunk.chunk_index >= chunk.chunk_count {
        return Err(ApiError::InvalidUnit(format!(
            "chunk {}/{} of {path}",
            chunk.chunk_index, chunk.chunk_count
        )));
    }

    let body = lazy_body(chunk.file.clone(), Some(chunk.range));
    let part = Part::stream_with_length(body, chunk.range.len()).file_name(path.clone());

    Ok(Form::new()
        .text(CHUNK_INDEX_FIELD, chunk.chunk_index.to_string())
        .text(CHUNK_COUNT_FIELD, chunk.chunk_count.to_string())
        .text(RELATIVE_PATH_FIELD, path.clone())
        .part(FILE_FIELD, part))
}
