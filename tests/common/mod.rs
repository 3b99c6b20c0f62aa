use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One canned reply from the mock model server.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with an NDJSON body, each string sent as its own HTTP chunk.
    Stream(Vec<String>),
    /// Non-success status with a plain text body.
    Status(u16, String),
    /// 200, sends the given chunks, then goes silent without ending the body.
    Stall(Vec<String>),
}

/// A minimal Ollama stand-in on a random local port.
///
/// Replies are served in order, one per connection; the last one repeats.
pub struct MockOllama {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockOllama {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let reply = replies[served.min(replies.len() - 1)].clone();
                served += 1;
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    handle_connection(socket, reply, recorded).await;
                });
            }
        });

        Self { url, requests }
    }

    /// JSON bodies of every request received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_connection(mut socket: TcpStream, reply: MockReply, recorded: Arc<Mutex<Vec<Value>>>) {
    let body = read_request_body(&mut socket).await;
    if let Ok(json) = serde_json::from_slice::<Value>(&body) {
        recorded.lock().unwrap().push(json);
    }

    match reply {
        MockReply::Stream(chunks) => {
            write_chunks(&mut socket, chunks).await;
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        }
        MockReply::Stall(chunks) => {
            write_chunks(&mut socket, chunks).await;
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
        MockReply::Status(status, text) => {
            let head = format!(
                "HTTP/1.1 {} Error\r\n\
                 Content-Type: text/plain\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n",
                status,
                text.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(text.as_bytes()).await.unwrap();
        }
    }
    let _ = socket.shutdown().await;
}

async fn write_chunks(socket: &mut TcpStream, chunks: Vec<String>) {
    let head = "HTTP/1.1 200 OK\r\n\
                Content-Type: application/x-ndjson\r\n\
                Transfer-Encoding: chunked\r\n\
                Connection: close\r\n\r\n";
    socket.write_all(head.as_bytes()).await.unwrap();
    for chunk in chunks {
        let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
        socket.write_all(framed.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    }
}

async fn read_request_body(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return Vec::new();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    buf[header_end..].to_vec()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// One NDJSON content line.
pub fn content_line(text: &str) -> String {
    let mut line = json!({
        "model": "llama3.2-vision",
        "message": { "role": "assistant", "content": text },
        "done": false
    })
    .to_string();
    line.push('\n');
    line
}

/// Final NDJSON line carrying token counts.
pub fn done_line(prompt_tokens: u64, output_tokens: u64) -> String {
    let mut line = json!({
        "model": "llama3.2-vision",
        "message": { "role": "assistant", "content": "" },
        "done": true,
        "prompt_eval_count": prompt_tokens,
        "eval_count": output_tokens
    })
    .to_string();
    line.push('\n');
    line
}

/// Split a body into chunks of at most `size` bytes, ignoring line boundaries.
#[allow(dead_code)]
pub fn rechunk(body: &str, size: usize) -> Vec<String> {
    body.as_bytes()
        .chunks(size)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

pub const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
