//! Shared reqwest plumbing for the provider clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::ProviderError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with the request timeout every provider call uses.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Send a prepared request and return the success body as text.
///
/// Non-success statuses become a [`ProviderError`] classified by status code.
pub async fn send_text(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    debug!(provider, status = status.as_u16(), bytes = body.len(), "provider responded");
    if !status.is_success() {
        return Err(ProviderError::from_status(provider, status, &body));
    }
    Ok(body)
}

/// [`send_text`], then decode the body as JSON.
pub async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let body = send_text(provider, request).await?;
    Ok(serde_json::from_str(&body)?)
}

/// One-connection-per-response HTTP server for exercising the clients.
///
/// Available to other workspace crates through the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serve JSON `responses` in order, one per connection. The handle yields
    /// the raw requests received.
    pub async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        serve_as("application/json", responses).await
    }

    /// Like [`serve`], with an explicit `content-type` for every response.
    pub async fn serve_as(
        content_type: &'static str,
        responses: Vec<(u16, &'static str)>,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            requests
        });
        (format!("http://{addr}"), handle)
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
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
