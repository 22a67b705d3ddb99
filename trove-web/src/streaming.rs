//! Payload streaming.
//!
//! The payload file is opened before any header is produced, so open
//! failures still become JSON errors. Once the response is returned the
//! file is owned by the body stream and closed when the stream finishes,
//! fails or is dropped by a disconnecting client.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use hyper::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};
use trove_core::PayloadHandle;
use trove_core::config::StreamingConfig;

use crate::error::ApiError;

/// Identifier of the streamed item, for clients of `/getRandomMedia`.
pub const ITEM_ID_HEADER: HeaderName = HeaderName::from_static("x-trove-item-id");

const FALLBACK_CACHE_CONTROL: &str = "public, max-age=3600";

/// Streams a resolved payload with content headers.
///
/// # Errors
/// - `ApiError::NotFound` - Payload vanished after resolution
/// - `ApiError::Internal` - Payload could not be opened
pub async fn stream_payload(
    handle: PayloadHandle,
    config: &StreamingConfig,
) -> Result<Response, ApiError> {
    let id = handle.item.id.clone();
    let path = handle.path.clone();

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(%id, path = %path.display(), "Payload vanished before streaming");
            return Err(ApiError::not_found(format!("File not found for item: {id}")));
        }
        Err(e) => {
            error!(%id, path = %path.display(), error = %e, "Failed to open payload");
            return Err(ApiError::internal("Failed to read file"));
        }
    };

    Ok(payload_response(&handle, file, config))
}

/// The 200 response for an opened payload.
///
/// Headers are final once this returns. A later read error is logged and
/// ends the body with an error, which makes the server drop the connection;
/// the reader is released with the stream.
pub fn payload_response<R>(
    handle: &PayloadHandle,
    reader: R,
    config: &StreamingConfig,
) -> Response
where
    R: AsyncRead + Send + 'static,
{
    let id = handle.item.id.clone();
    let path = handle.path.clone();
    let headers = payload_headers(handle, config);
    debug!(%id, size = handle.size, mime = %handle.mime_type, "Streaming payload");

    let stream = ReaderStream::with_capacity(reader, config.chunk_size.max(1)).inspect_err(
        move |e| {
            error!(%id, path = %path.display(), error = %e, "Payload read failed mid-stream");
        },
    );

    (StatusCode::OK, headers, Body::from_stream(stream)).into_response()
}

fn payload_headers(handle: &PayloadHandle, config: &StreamingConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&handle.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(handle.size));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&handle.filename))
            .unwrap_or_else(|_| HeaderValue::from_static("inline")),
    );
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_str(&config.cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CACHE_CONTROL)),
    );
    if let Ok(id) = HeaderValue::from_str(handle.item.id.as_str()) {
        headers.insert(ITEM_ID_HEADER, id);
    }

    headers
}

/// `inline` disposition naming the file.
///
/// The quoted `filename` is ASCII only; names with other characters also
/// get an RFC 5987 `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if filename.is_ascii() {
        format!("inline; filename=\"{fallback}\"")
    } else {
        format!(
            "inline; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use futures::StreamExt;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, ReadBuf};
    use trove_core::{FileKind, Item};

    use super::*;

    /// Fails every read, like a disk that went away.
    struct BrokenDisk;

    impl AsyncRead for BrokenDisk {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("device removed")))
        }
    }

    fn handle(path: &Path, size: u64) -> PayloadHandle {
        PayloadHandle {
            item: Item::new("K1", "Sunset", path),
            path: path.to_path_buf(),
            size,
            mime_type: "image/png".to_string(),
            kind: FileKind::Image,
            filename: "Sunset.png".to_string(),
        }
    }

    #[test]
    fn test_ascii_disposition() {
        assert_eq!(
            content_disposition("Sunset.png"),
            "inline; filename=\"Sunset.png\""
        );
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            "inline; filename=\"say _hi_.txt\""
        );
    }

    #[test]
    fn test_non_ascii_disposition() {
        let value = content_disposition("夕焼け.png");
        assert_eq!(
            value,
            "inline; filename=\"___.png\"; filename*=UTF-8''%E5%A4%95%E7%84%BC%E3%81%91.png"
        );
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[tokio::test]
    async fn test_stream_headers_and_body() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sunset.png");
        let payload: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        std::fs::write(&path, &payload).unwrap();

        let config = StreamingConfig {
            chunk_size: 4096,
            ..StreamingConfig::default()
        };
        let response = stream_payload(handle(&path, payload.len() as u64), &config)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(headers[CONTENT_LENGTH], "200000");
        assert_eq!(headers[CONTENT_DISPOSITION], "inline; filename=\"Sunset.png\"");
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(headers[ITEM_ID_HEADER], "K1");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_vanished_payload_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.png");
        let err = stream_payload(handle(&path, 1), &StreamingConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_read_failure_after_headers_ends_the_body_with_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sunset.png");
        let delivered: Vec<u8> = (0..=255u8).cycle().take(6_000).collect();
        let reader = io::Cursor::new(delivered.clone()).chain(BrokenDisk);

        let config = StreamingConfig {
            chunk_size: 1_024,
            ..StreamingConfig::default()
        };
        let response = payload_response(&handle(&path, 10_000), reader, &config);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "10000");

        let mut body = response.into_body().into_data_stream();
        let mut received = Vec::new();
        let mut failed = false;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => received.extend_from_slice(&bytes),
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }

        assert!(failed);
        assert_eq!(received, delivered);
    }

    #[tokio::test]
    async fn test_failed_body_does_not_collect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sunset.png");
        let reader = io::Cursor::new(vec![7u8; 100]).chain(BrokenDisk);

        let config = StreamingConfig::default();
        let response = payload_response(&handle(&path, 200), reader, &config);
        let collected = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(collected.is_err());
    }
}
