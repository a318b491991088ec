//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Query strings may carry search terms; keep them out of logs.
fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// Reqwest-based HTTP client implementation
///
/// Each `execute` is a single attempt. Every status, including 429 and 5xx, is
/// handed back with its headers so callers can read `Retry-After`.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("music-session/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap a preconfigured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn convert_error(error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout(error.to_string())
        } else if error.is_connect() {
            BridgeError::ConnectionFailed(error.to_string())
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }

    async fn read_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(Self::convert_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = ?request.method, url = %strip_query(&request.url), "Executing HTTP request");

        let response = self.build_request(request).send().await.map_err(|e| {
            warn!(error = %e, "HTTP request failed");
            Self::convert_error(e)
        })?;

        Self::read_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    /// Serves every connection with the given status and counts connections.
    async fn canned_server(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nRetry-After: 2\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/v1/search?q=halo", address), connections)
    }

    #[tokio::test]
    async fn throttled_response_is_returned_after_one_attempt() {
        let (url, connections) = canned_server("429 Too Many Requests").await;
        let client = ReqwestHttpClient::new().unwrap();

        let response = client.execute(HttpRequest::get(url)).await.unwrap();

        assert_eq!(response.status, 429);
        assert_eq!(response.header("Retry-After"), Some("2"));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let (url, connections) = canned_server("503 Service Unavailable").await;
        let client = ReqwestHttpClient::new().unwrap();

        let response = client.execute(HttpRequest::get(url)).await.unwrap();

        assert!(response.is_server_error());
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn query_is_stripped_for_logging() {
        assert_eq!(
            strip_query("https://api.spotify.com/v1/search?q=halo"),
            "https://api.spotify.com/v1/search"
        );
        assert_eq!(strip_query("https://a.test/x"), "https://a.test/x");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(500)).unwrap();
        let err = client
            .execute(HttpRequest::get("http://127.0.0.1:9/unreachable"))
            .await
            .unwrap_err();
        assert!(err.is_transport() || matches!(err, BridgeError::OperationFailed(_)));
    }
}
