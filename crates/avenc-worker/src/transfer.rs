//! Object transfer over plain HTTP.
//!
//! Sources are fetched with GET and results stored with PUT against
//! pre-signed URLs; no credentials are negotiated here.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// URL without its query string, safe to log for pre-signed URLs.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

/// HTTP client for source downloads and destination uploads.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new() -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("avenc-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream the body at `url` into `dest`. Returns the number of bytes
    /// written.
    ///
    /// A non-success status, an empty body or an interrupted transfer is a
    /// [`WorkerError::DownloadFailed`].
    pub async fn download(&self, url: &str, dest: &Path) -> WorkerResult<u64> {
        let shown = redact_url(url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkerError::download_failed(format!("GET {}: {}", shown, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::download_failed(format!(
                "GET {} returned {}",
                shown, status
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| WorkerError::download_failed(format!("create {}: {}", dest.display(), e)))?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk
                .map_err(|e| WorkerError::download_failed(format!("GET {} interrupted: {}", shown, e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| WorkerError::download_failed(format!("write {}: {}", dest.display(), e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| WorkerError::download_failed(format!("flush {}: {}", dest.display(), e)))?;

        if written == 0 {
            return Err(WorkerError::download_failed(format!(
                "GET {} returned an empty body",
                shown
            )));
        }

        debug!(url = %shown, bytes = written, "Downloaded source");
        Ok(written)
    }

    /// PUT the file at `src` to `url` with an explicit Content-Length.
    /// Returns the number of bytes sent.
    pub async fn upload(&self, src: &Path, url: &str) -> WorkerResult<u64> {
        let shown = redact_url(url);
        let file = tokio::fs::File::open(src)
            .await
            .map_err(|e| WorkerError::upload_failed(format!("open {}: {}", src.display(), e)))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| WorkerError::upload_failed(format!("stat {}: {}", src.display(), e)))?
            .len();

        let response = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, len)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| WorkerError::upload_failed(format!("PUT {}: {}", shown, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::upload_failed(format!(
                "PUT {} returned {}",
                shown, status
            )));
        }

        debug!(url = %shown, bytes = len, "Uploaded output");
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_redact_url_drops_signature() {
        assert_eq!(
            redact_url("https://bucket.example.com/in.ogg?X-Signature=secret"),
            "https://bucket.example.com/in.ogg"
        );
        assert_eq!(redact_url("not a url"), "<invalid url>");
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/in.ogg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.ogg");
        let transfer = HttpTransfer::new().unwrap();

        let bytes = transfer
            .download(&format!("{}/in.ogg", server.uri()), &dest)
            .await
            .unwrap();
        assert_eq!(bytes, 4096);
        assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_download_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = HttpTransfer::new()
            .unwrap()
            .download(&format!("{}/in.ogg", server.uri()), &dir.path().join("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::DownloadFailed(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn test_download_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = HttpTransfer::new()
            .unwrap()
            .download(&format!("{}/in.ogg", server.uri()), &dir.path().join("s"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "download");
    }

    #[tokio::test]
    async fn test_download_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let err = HttpTransfer::new()
            .unwrap()
            .download("http://127.0.0.1:1/in.ogg", &dir.path().join("s"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "download");
    }

    #[tokio::test]
    async fn test_upload_puts_file() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/out.mp3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("output.mp3");
        std::fs::write(&src, vec![1u8; 1000]).unwrap();

        let sent = HttpTransfer::new()
            .unwrap()
            .upload(&src, &format!("{}/out.mp3?sig=abc", server.uri()))
            .await
            .unwrap();
        assert_eq!(sent, 1000);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body.len(), 1000);
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("output.mp3");
        std::fs::write(&src, b"encoded").unwrap();

        let err = HttpTransfer::new()
            .unwrap()
            .upload(&src, &format!("{}/out.mp3", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::UploadFailed(ref m) if m.contains("500")));
    }
}
