//! Shared helpers for the proxy integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A message read off the wire: head (start line + headers) and body.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub head: String,
    pub body: Vec<u8>,
}

impl RawMessage {
    /// Header value lookup, ignoring case.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn header_all(&self, name: &str) -> Vec<String> {
        self.head
            .lines()
            .skip(1)
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
            .collect()
    }

    pub fn start_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }
}

/// Read one HTTP message framed by Content-Length, chunked encoding, or
/// (for responses with neither) the peer closing.
pub async fn read_message(stream: &mut TcpStream) -> Option<RawMessage> {
    let mut buf = Vec::new();

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if !fill(stream, &mut buf).await {
            return None;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut message = RawMessage {
        head,
        body: Vec::new(),
    };
    let mut rest = buf.split_off(head_end + 4);

    let chunked = message
        .header("Transfer-Encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    let length = message
        .header("Content-Length")
        .and_then(|v| v.parse::<usize>().ok());
    let status = message.start_line().split_whitespace().nth(1).unwrap_or_default();
    let bodiless = status.starts_with('1') || status == "204" || status == "304";

    if chunked {
        message.body = read_chunked(stream, &mut rest).await?;
    } else if let Some(len) = length {
        while rest.len() < len {
            if !fill(stream, &mut rest).await {
                break;
            }
        }
        rest.truncate(len);
        message.body = rest;
    } else if message.head.starts_with("HTTP/") && !bodiless {
        while fill(stream, &mut rest).await {}
        message.body = rest;
    }

    Some(message)
}

async fn read_chunked(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line = read_line(stream, buf).await?;
        let size = usize::from_str_radix(line.split(';').next()?.trim(), 16).ok()?;
        if size == 0 {
            // trailers up to the blank line
            while !read_line(stream, buf).await?.is_empty() {}
            return Some(body);
        }
        while buf.len() < size + 2 {
            if !fill(stream, buf).await {
                return None;
            }
        }
        body.extend_from_slice(&buf[..size]);
        buf.drain(..size + 2);
    }
}

async fn read_line(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<String> {
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
            buf.drain(..pos + 2);
            return Some(line);
        }
        if !fill(stream, buf).await {
            return None;
        }
    }
}

/// Append whatever the peer sends next; false on EOF or error.
async fn fill(stream: &mut TcpStream, buf: &mut Vec<u8>) -> bool {
    let mut chunk = [0u8; 8192];
    match stream.read(&mut chunk).await {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            buf.extend_from_slice(&chunk[..n]);
            true
        }
    }
}

/// Requests a mock backend has received.
pub type Received = Arc<Mutex<Vec<RawMessage>>>;

/// Start a backend that records each request and answers with `response`.
pub async fn start_mock_backend(response: String) -> (String, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&received);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                if let Some(request) = read_message(&mut socket).await {
                    log.lock().unwrap().push(request);
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), received)
}

/// Start a backend answering `200 OK` with `body`.
pub async fn start_named_backend(body: &str) -> (String, Received) {
    start_mock_backend(format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Backend: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body,
        body
    ))
    .await
}

/// An address nothing is listening on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Send raw bytes to `addr` and read one response.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> RawMessage {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    read_message(&mut stream).await.unwrap()
}
