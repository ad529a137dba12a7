//! Stub providers shared by the integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use dimple_core::{
    DocumentStatus, DocumentUploader, EmbeddingProvider, GolfBall, ProviderError, SearchRequest,
    SearchRow, VectorSearcher,
};

pub const HEADER: &str = "ignored,manufacturer,usga_lot_num,pole_marking,colour,constCode,ballSpecs,dimples,spin,pole_2,seam_marking,imageUrl";

/// Writes a catalog CSV with the standard header.
pub fn catalog_file(rows: &[String]) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "{HEADER}").unwrap();
    for row in rows {
        writeln!(f, "{row}").unwrap();
    }
    f
}

/// Rows whose manufacturers are `M1`..`Mn`.
pub fn numbered_rows(n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| format!(",M{i},LOT{i},P{i},White,C,S,{},High,,Seam,http://img/{i}", 300 + i))
        .collect()
}

/// The `n` in `Manufacturer: Mn, ...`, or 0.
pub fn marker(text: &str) -> f32 {
    text.strip_prefix("Manufacturer: M")
        .and_then(|rest| rest.split(',').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0.0)
}

/// Returns `[marker, marker + 0.5, ...]` of length `dimensions`.
/// Fails for any text whose manufacturer is `FAIL`.
pub struct StubEmbedder {
    pub dimensions: usize,
    pub calls: AtomicUsize,
    /// Earlier records take longer, so concurrent calls finish out of order.
    pub stagger: bool,
}

impl StubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
            stagger: false,
        }
    }

    pub fn staggered(dimensions: usize) -> Self {
        Self {
            stagger: true,
            ..Self::new(dimensions)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.starts_with("Manufacturer: FAIL,") {
            return Err(ProviderError::Api {
                status: 429,
                body: "rate limited".to_string(),
            });
        }
        let m = marker(text);
        if self.stagger {
            let wait = 60u64.saturating_sub(m as u64 * 10);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        Ok((0..self.dimensions).map(|i| m + 0.5 * i as f32).collect())
    }
}

/// Always returns the same vector.
pub struct FixedEmbedder(pub Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Records every batch; rejects records whose manufacturer is listed in `reject`.
#[derive(Default)]
pub struct StubUploader {
    pub batches: Mutex<Vec<Vec<GolfBall>>>,
    pub reject: Vec<String>,
    pub fail: bool,
}

impl StubUploader {
    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn uploaded(&self) -> Vec<GolfBall> {
        self.batches.lock().unwrap().concat()
    }
}

#[async_trait]
impl DocumentUploader for StubUploader {
    async fn upload_batch(&self, balls: &[GolfBall]) -> Result<Vec<DocumentStatus>, ProviderError> {
        self.batches.lock().unwrap().push(balls.to_vec());
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(balls
            .iter()
            .map(|b| {
                if self.reject.contains(&b.manufacturer) {
                    DocumentStatus::rejected(b.id.clone(), 400, "rejected by stub")
                } else {
                    DocumentStatus::accepted(b.id.clone())
                }
            })
            .collect())
    }
}

/// Returns canned rows and remembers the last request.
#[derive(Default)]
pub struct StubSearcher {
    pub rows: Vec<SearchRow>,
    pub last_request: Mutex<Option<SearchRequest>>,
    pub fail: bool,
}

#[async_trait]
impl VectorSearcher for StubSearcher {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchRow>, ProviderError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail {
            return Err(ProviderError::Other("search unavailable".to_string()));
        }
        Ok(self.rows.clone())
    }
}

/// Answers exactly one HTTP request with a fixed status and body.
pub struct CannedServer {
    pub url: String,
    request: tokio::task::JoinHandle<String>,
}

impl CannedServer {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let body = body.to_string();
        let request = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            raw
        });
        Self { url, request }
    }

    /// The raw request as the client sent it.
    pub async fn request(self) -> String {
        self.request.await.unwrap()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let head = text[..end].to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
