//! Resumable HTTP streaming strategy.
//!
//! [`HttpTransfer`] issues one GET per invocation, optionally with a
//! `Range: bytes=<offset>-` header, and streams the body straight into the
//! destination file while updating the session's [`ProgressModel`].
//!
//! # Resume
//!
//! - offset 0: no Range header, destination created/truncated
//! - offset > 0 and 206: destination opened for append, total = length + offset
//! - offset > 0 and 200: server ignored the range, destination truncated and
//!   progress restarted from zero so the file is still byte-exact
//! - 206 whose `Content-Range` starts at zero is treated like a 200; any other
//!   start than the offset fails with [`TransferError::RangeMismatch`]
//!
//! # Speed
//!
//! Speed is sampled on a fixed cadence independent of chunk arrival, so a
//! stalled body decays to zero.
//!
//! # Cancellation
//!
//! Connection setup and every body chunk are raced against the invocation's
//! [`CancellationToken`]. On cancellation the request is dropped, bytes
//! already written are flushed and kept, and [`TransferError::Cancelled`] is
//! returned.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::TransferError;
use super::progress::{ProgressModel, SpeedSampler};
use super::strategy::{StrategyKind, TransferRequest, TransferStrategy};
use crate::config::EngineConfig;

/// HTTP(S) download strategy with byte-range resume.
///
/// Created once per registry and shared by all HTTP sessions so they reuse
/// the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
    speed_sample_interval: Duration,
}

impl HttpTransfer {
    /// Creates the strategy from engine configuration.
    ///
    /// Redirects are followed with reqwest's default policy. No read timeout
    /// is applied; a stalled body waits until cancelled.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build. This only happens
    /// when the TLS backend cannot be initialized.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: &EngineConfig) -> Self {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            speed_sample_interval: config.speed_sample_interval,
        }
    }

    async fn send(
        &self,
        url: &str,
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, TransferError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = request.send() => result.map_err(|e| TransferError::network(url, e))?,
        };

        let status = response.status().as_u16();
        if !matches!(status, 200 | 206) {
            return Err(TransferError::http_status(url, status));
        }
        Ok(response)
    }
}

#[async_trait]
impl TransferStrategy for HttpTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    fn supports_resume(&self) -> bool {
        true
    }

    #[instrument(skip(self, progress, cancel), fields(url = %request.url, offset = request.resume_offset))]
    async fn run(
        &self,
        request: &TransferRequest,
        progress: &ProgressModel,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let url = request.url.as_str();
        let path = request.destination.as_path();
        let parsed = Url::parse(url).map_err(|_| TransferError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransferError::invalid_url(url));
        }

        progress.set_destination(path.to_path_buf());
        let offset = verified_resume_offset(path, request.resume_offset).await?;
        progress.restart_at(offset);

        let response = self.send(url, offset, cancel).await?;
        let resumed = match partial_content_start(&response, offset) {
            None => false,
            Some(start) if start == offset => offset > 0,
            Some(0) => false,
            Some(actual) => {
                return Err(TransferError::RangeMismatch {
                    url: url.to_string(),
                    expected: offset,
                    actual,
                });
            }
        };
        if offset > 0 && !resumed {
            warn!(
                status = response.status().as_u16(),
                "server ignored range request, restarting from zero"
            );
            progress.restart_at(0);
        }

        let prefix = if resumed { offset } else { 0 };
        let total = content_length(&response).map(|len| len.saturating_add(prefix));
        if let Some(total) = total {
            progress.set_total(total);
        }
        debug!(
            status = response.status().as_u16(),
            total = ?total,
            resumed,
            "response received"
        );

        let file = open_destination(path, resumed).await?;
        let written = stream_to_file(
            file,
            response,
            url,
            path,
            progress,
            cancel,
            self.speed_sample_interval,
        )
        .await?;

        info!(
            path = %path.display(),
            bytes = prefix + written,
            resumed,
            "download complete"
        );
        Ok(())
    }
}

/// Checks the partial file against the requested offset.
///
/// A file shorter than the offset cannot be resumed (returns 0); a longer one
/// is cut back to the offset so appended bytes line up.
async fn verified_resume_offset(path: &Path, offset: u64) -> Result<u64, TransferError> {
    if offset == 0 {
        return Ok(0);
    }
    let on_disk = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(TransferError::io(path, e)),
    };
    if on_disk < offset {
        warn!(
            path = %path.display(),
            offset,
            on_disk,
            "partial file shorter than resume offset, restarting from zero"
        );
        return Ok(0);
    }
    if on_disk > offset {
        debug!(path = %path.display(), offset, on_disk, "truncating partial file to resume offset");
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        file.set_len(offset)
            .await
            .map_err(|e| TransferError::io(path, e))?;
    }
    Ok(offset)
}

/// Opens the destination for append (resume) or create/truncate.
async fn open_destination(path: &Path, append: bool) -> Result<File, TransferError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TransferError::io(parent, e))?;
    }

    let result = if append {
        OpenOptions::new().create(true).append(true).open(path).await
    } else {
        File::create(path).await
    };
    result.map_err(|e| TransferError::io(path, e))
}

/// First byte position of a 206 body, `None` for any other status.
///
/// A 206 without a parseable `Content-Range` is taken to start at `offset`.
fn partial_content_start(response: &reqwest::Response, offset: u64) -> Option<u64> {
    if response.status().as_u16() != 206 {
        return None;
    }
    let start = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_start);
    Some(start.unwrap_or(offset))
}

/// Parses the first byte position of `bytes <start>-<end>/<total>`.
fn parse_content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

/// Remaining body length from the `Content-Length` header.
fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Streams the response body to `file`, returning bytes written by this call.
///
/// Written data is flushed on every exit path so the file length always
/// matches the progress model.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    progress: &ProgressModel,
    cancel: &CancellationToken,
    sample_interval: Duration,
) -> Result<u64, TransferError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut sampler = SpeedSampler::new(sample_interval, Instant::now(), progress.bytes_downloaded());
    let mut written: u64 = 0;

    // interval panics on a zero period
    let period = sample_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end: Result<(), TransferError> = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(TransferError::Cancelled),
            _ = ticker.tick() => {
                if let Some(speed) = sampler.observe(Instant::now(), progress.bytes_downloaded()) {
                    progress.set_speed(speed);
                }
                continue;
            }
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break Ok(());
        };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => break Err(TransferError::network(url, e)),
        };

        if let Err(e) = writer.write_all(&chunk).await {
            break Err(TransferError::io(path, e));
        }
        let len = chunk.len() as u64;
        written += len;
        progress.advance(len);
    };
    drop(stream);

    let flushed = writer.flush().await.map_err(|e| TransferError::io(path, e));

    match end {
        Ok(()) => flushed.map(|()| written),
        Err(TransferError::Cancelled) => {
            flushed?;
            debug!(written, "stream stopped by cancellation");
            Err(TransferError::Cancelled)
        }
        Err(error) => {
            warn!(written, error = %error, "stream failed, partial file kept");
            Err(error)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::socket_guard::{
        should_skip_socket_bound_test, start_mock_server_or_skip,
    };
    use crate::transfer::progress::TransferStatus;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Match, Mock, Request, ResponseTemplate};

    /// Matches requests that carry no Range header.
    struct NoRangeHeader;

    impl Match for NoRangeHeader {
        fn matches(&self, request: &Request) -> bool {
            !request.headers.contains_key("Range")
        }
    }

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
    }

    fn transfer() -> HttpTransfer {
        HttpTransfer::new(&EngineConfig::default())
    }

    fn request(url: String, dir: &TempDir, offset: u64) -> TransferRequest {
        TransferRequest {
            url,
            destination: dir.path().join("file.bin"),
            resume_offset: offset,
        }
    }

    #[tokio::test]
    async fn test_fresh_download_writes_file_and_progress() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let content = body(64 * 1024);

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(NoRangeHeader)
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 0);
        let progress = ProgressModel::new();
        let result = transfer()
            .run(&req, &progress, &CancellationToken::new())
            .await;

        assert!(result.is_ok(), "Expected Ok, got: {result:?}");
        assert_eq!(std::fs::read(&req.destination).unwrap(), content);
        let snap = progress.snapshot();
        assert_eq!(snap.bytes_downloaded, content.len() as u64);
        assert_eq!(snap.total_size, content.len() as u64);
        assert_eq!(snap.destination.as_deref(), Some(req.destination.as_path()));
        // the session, not the strategy, owns status
        assert_eq!(snap.status, TransferStatus::Idle);
    }

    #[tokio::test]
    async fn test_fresh_download_truncates_existing_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("file.bin"), vec![9u8; 4096]).unwrap();

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"short".to_vec()))
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 0);
        transfer()
            .run(&req, &ProgressModel::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&req.destination).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_resume_sends_range_and_appends() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let content = body(10_000);
        std::fs::write(temp_dir.path().join("file.bin"), &content[..4_000]).unwrap();

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(header("Range", "bytes=4000-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(content[4_000..].to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 4_000);
        let progress = ProgressModel::new();
        transfer()
            .run(&req, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&req.destination).unwrap(), content);
        let snap = progress.snapshot();
        assert_eq!(snap.total_size, 10_000);
        assert_eq!(snap.bytes_downloaded, 10_000);
    }

    #[tokio::test]
    async fn test_resume_ignored_by_server_restarts_from_zero() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let content = body(3_000);
        std::fs::write(temp_dir.path().join("file.bin"), &content[..1_000]).unwrap();

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 1_000);
        let progress = ProgressModel::new();
        transfer()
            .run(&req, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&req.destination).unwrap(), content);
        assert_eq!(progress.snapshot().bytes_downloaded, 3_000);
    }

    #[tokio::test]
    async fn test_partial_content_from_zero_restarts_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let content = body(3_000);
        std::fs::write(temp_dir.path().join("file.bin"), &content[..1_000]).unwrap();

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-2999/3000")
                    .set_body_bytes(content.clone()),
            )
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 1_000);
        let progress = ProgressModel::new();
        transfer()
            .run(&req, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&req.destination).unwrap(), content);
        assert_eq!(progress.snapshot().bytes_downloaded, 3_000);
        assert_eq!(progress.snapshot().total_size, 3_000);
    }

    #[tokio::test]
    async fn test_partial_content_at_wrong_offset_is_rejected() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let content = body(3_000);
        std::fs::write(temp_dir.path().join("file.bin"), &content[..1_000]).unwrap();

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(header("Range", "bytes=1000-"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 500-2999/3000")
                    .set_body_bytes(content[500..].to_vec()),
            )
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 1_000);
        let result = transfer()
            .run(&req, &ProgressModel::new(), &CancellationToken::new())
            .await;

        match result {
            Err(TransferError::RangeMismatch {
                expected: 1_000,
                actual: 500,
                ..
            }) => {}
            other => panic!("Expected RangeMismatch, got: {other:?}"),
        }
        assert_eq!(std::fs::read(&req.destination).unwrap(), &content[..1_000]);
    }

    #[tokio::test]
    async fn test_speed_decays_to_zero_while_body_stalls() {
        if should_skip_socket_bound_test() {
            return;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            for _ in 0..5 {
                socket.write_all(&[7u8; 2048]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            // stall until the client hangs up
            while socket.read(&mut buf).await.unwrap_or(0) > 0 {}
        });

        let temp_dir = TempDir::new().unwrap();
        let req = request(format!("http://{addr}/file.bin"), &temp_dir, 0);
        let config = EngineConfig::default().with_speed_sample_interval(Duration::from_millis(50));
        let transfer = HttpTransfer::new(&config);
        let progress = Arc::new(ProgressModel::new());
        let cancel = CancellationToken::new();
        let task = {
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            tokio::spawn(async move { transfer.run(&req, &progress, &cancel).await })
        };

        let mut rx = progress.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow_and_update().bytes_downloaded < 10_240 {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("drip never arrived");
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow_and_update().speed > 0.0 {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("speed stayed above zero during the stall");

        // more than two intervals later it is still zero
        tokio::time::sleep(Duration::from_millis(150)).await;
        let snap = progress.snapshot();
        assert_eq!(snap.speed, 0.0);
        assert_eq!(snap.bytes_downloaded, 10_240);

        cancel.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(TransferError::Cancelled)), "got {result:?}");
        server.abort();
    }

    #[test]
    fn test_parse_content_range_start() {
        assert_eq!(parse_content_range_start("bytes 400000-999999/1000000"), Some(400_000));
        assert_eq!(parse_content_range_start("bytes 0-9/*"), Some(0));
        assert_eq!(parse_content_range_start("bytes */1000"), None);
        assert_eq!(parse_content_range_start("items 1-2/3"), None);
    }

    #[tokio::test]
    async fn test_missing_partial_file_restarts_without_range() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .and(NoRangeHeader)
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"whole".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 500);
        transfer()
            .run(&req, &ProgressModel::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&req.destination).unwrap(), b"whole");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_status_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/missing.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let req = TransferRequest {
            url: format!("{}/missing.bin", mock_server.uri()),
            destination: temp_dir.path().join("missing.bin"),
            resume_offset: 0,
        };
        let result = transfer()
            .run(&req, &ProgressModel::new(), &CancellationToken::new())
            .await;

        match result {
            Err(TransferError::HttpStatus { status: 404, .. }) => {}
            other => panic!("Expected HttpStatus 404, got: {other:?}"),
        }
        assert!(!req.destination.exists());
    }

    #[tokio::test]
    async fn test_cancel_during_slow_response_returns_promptly() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/slow.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&mock_server)
            .await;

        let req = TransferRequest {
            url: format!("{}/slow.bin", mock_server.uri()),
            destination: temp_dir.path().join("slow.bin"),
            resume_offset: 0,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = transfer().run(&req, &ProgressModel::new(), &cancel).await;
        assert!(matches!(result, Err(TransferError::Cancelled)), "got {result:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_sends_nothing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = request(format!("{}/file.bin", mock_server.uri()), &temp_dir, 0);
        let result = transfer().run(&req, &ProgressModel::new(), &cancel).await;
        assert!(matches!(result, Err(TransferError::Cancelled)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let req = request("not-a-valid-url".to_string(), &temp_dir, 0);
        let result = transfer()
            .run(&req, &ProgressModel::new(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransferError::InvalidUrl { .. })));

        let req = request("ftp://example.com/file.bin".to_string(), &temp_dir, 0);
        let result = transfer()
            .run(&req, &ProgressModel::new(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransferError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_verified_offset_truncates_longer_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("partial.bin");
        std::fs::write(&file, vec![1u8; 100]).unwrap();

        let offset = verified_resume_offset(&file, 60).await.unwrap();
        assert_eq!(offset, 60);
        assert_eq!(std::fs::metadata(&file).unwrap().len(), 60);

        let offset = verified_resume_offset(&file, 80).await.unwrap();
        assert_eq!(offset, 0);
    }
}
