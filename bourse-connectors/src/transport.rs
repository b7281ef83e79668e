//! reqwest-backed `Transport`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use bourse_exec::{ExchangeError, ExchangeResult, HttpMethod, HttpRequest, HttpResponse, Transport};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const USER_AGENT: &str = concat!("bourse/", env!("CARGO_PKG_VERSION"));

/// HTTP transport over a shared reqwest client.
///
/// One timeout bounds each request from connect to the end of the body; no
/// retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> ExchangeResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout: request_timeout,
        })
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn transport_error(&self, url: &str, error: reqwest::Error) -> ExchangeError {
        if error.is_timeout() {
            ExchangeError::Transport(format!("Request to {} timed out after {:?}", url, self.timeout))
        } else {
            ExchangeError::Transport(format!("Request to {} failed: {}", url, error))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> ExchangeResult<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(&request.url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&request.url, e))?;

        debug!(url = %request.url, status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = HttpTransport::new(Duration::from_millis(500)).unwrap();

        // Port 9 on localhost is "discard"; nothing listens there in CI.
        let err = transport
            .send(HttpRequest::get("http://127.0.0.1:9/api/3/ticker/eth_btc"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Transport(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_covers_a_stalled_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            // Headers promise 100 bytes, only 7 ever arrive.
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            transport.send(HttpRequest::get(format!("http://{}/api/3/ticker/eth_btc", addr))),
        )
        .await
        .expect("request outlived its timeout");

        assert!(matches!(outcome, Err(ExchangeError::Transport(_))));
    }
}
