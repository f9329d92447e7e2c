//! Endpoint paths, multipart field names and metadata headers.

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api-v2.bucketpush.dev";

/// Collection path for upload sessions. Session-scoped calls append `/{id}/...`.
pub const UPLOAD_SESSIONS_PATH: &str = "/v1/upload-sessions";

/// Suffix for posting a payload unit to a session.
pub const DATA_SUFFIX: &str = "data";

/// Suffix for finishing a session.
pub const FINISH_SUFFIX: &str = "finish";

/// Multipart field name used for every file part.
pub const FILE_FIELD: &str = "file";

pub const CHUNK_INDEX_FIELD: &str = "chunkIndex";
pub const CHUNK_COUNT_FIELD: &str = "chunkCount";
pub const RELATIVE_PATH_FIELD: &str = "relativePath";

pub const CHUNK_INDEX_HEADER: &str = "x-chunk-index";
pub const CHUNK_COUNT_HEADER: &str = "x-chunk-count";
pub const RELATIVE_PATH_HEADER: &str = "x-relative-path";

/// Builds the path for a session-scoped call, e.g. `/v1/upload-sessions/abc/data`.
pub fn session_path(session_id: &str, suffix: &str) -> String {
    format!("{UPLOAD_SESSIONS_PATH}/{session_id}/{suffix}")
}
