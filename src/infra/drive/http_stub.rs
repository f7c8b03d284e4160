// A throwaway HTTP/1.1 server for the Drive adapter tests.
//
// It answers each incoming request with the next canned response, closes the
// connection, and hands back the request heads it saw once every response has
// been served.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(status: u16, content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status,
            content_type,
            body: body.to_vec(),
        }
    }
}

/// One request as the server received it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub request_line: String,
    pub headers: Vec<String>,
}

impl SeenRequest {
    /// Request target split off the request line, e.g. `/drive/v3/files?q=...`.
    pub fn target(&self) -> &str {
        self.request_line.split(' ').nth(1).unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    /// Decoded query parameter from the request target.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let url = reqwest::Url::parse(&format!("http://stub{}", self.target())).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// Starts the server and returns its base url (`http://127.0.0.1:port/drive/v3`)
/// plus a handle resolving to the requests it served.
pub async fn serve(responses: Vec<CannedResponse>) -> (String, JoinHandle<Vec<SeenRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/drive/v3", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let head = String::from_utf8_lossy(&buf).to_string();
            let mut lines = head.split("\r\n").take_while(|l| !l.is_empty());
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers = lines.map(str::to_string).collect();
            seen.push(SeenRequest {
                request_line,
                headers,
            });

            let mut reply = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                response.status,
                reason(response.status),
                response.content_type,
                response.body.len()
            )
            .into_bytes();
            reply.extend_from_slice(&response.body);
            socket.write_all(&reply).await.unwrap();
            socket.shutdown().await.ok();
        }
        seen
    });

    (base_url, handle)
}
