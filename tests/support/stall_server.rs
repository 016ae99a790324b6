//! Minimal HTTP/1.1 file server that can stop sending mid-body.
//!
//! wiremock can only delay a whole response, so pause/resume scenarios use
//! this server: a request starting before `stall_at` receives bytes up to
//! `stall_at` and then nothing until the client hangs up. Range requests are
//! answered with 206.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::socket_guard::should_skip_socket_bound_test;

const CHUNK: usize = 16 * 1024;

/// Deterministic test payload.
#[must_use]
pub fn payload(len: usize) -> Vec<u8> {
    #[allow(clippy::cast_possible_truncation)]
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub struct StallServer {
    addr: SocketAddr,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
    task: JoinHandle<()>,
}

impl StallServer {
    /// Serves `body`, stalling at `stall_at` bytes if given. Returns `None` when sockets are unavailable.
    #[track_caller]
    pub async fn start_or_skip(body: Vec<u8>, stall_at: Option<u64>) -> Option<Self> {
        if should_skip_socket_bound_test() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let body = Arc::new(body);

        let recorded = Arc::clone(&ranges);
        let task = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let body = Arc::clone(&body);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = serve(socket, &body, stall_at, &recorded).await;
                });
            }
        });

        Some(Self { addr, ranges, task })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    /// `Range` header of every request received so far, in order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().unwrap().clone()
    }
}

impl Drop for StallServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut socket: TcpStream,
    body: &[u8],
    stall_at: Option<u64>,
    recorded: &Mutex<Vec<Option<String>>>,
) -> std::io::Result<()> {
    let head = read_request_head(&mut socket).await?;
    let range = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });
    recorded.lock().unwrap().push(range.clone());

    let total = body.len() as u64;
    let start = range
        .as_deref()
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|value| value.strip_suffix('-'))
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|start| *start < total);

    let response_head = match start {
        Some(start) => format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nConnection: close\r\n\r\n",
            total - start,
            start,
            total - 1,
            total
        ),
        None => format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\nConnection: close\r\n\r\n"),
    };
    socket.write_all(response_head.as_bytes()).await?;

    let start = usize::try_from(start.unwrap_or(0)).unwrap();
    let stop = match stall_at {
        Some(stall) if (start as u64) < stall => usize::try_from(stall).unwrap().min(body.len()),
        _ => body.len(),
    };
    for chunk in body[start..stop].chunks(CHUNK) {
        socket.write_all(chunk).await?;
    }
    socket.flush().await?;

    if stop < body.len() {
        // Hold the connection open until the client goes away.
        let mut sink = [0u8; 256];
        while socket.read(&mut sink).await? > 0 {}
    }
    Ok(())
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
