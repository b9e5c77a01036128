use crate::baseline::error::{BaselineError, BaselineResult};
use crate::baseline::types::BaselineFetch;
use crate::migration::{ConnectionKill, MigrationTrigger};
use crate::transport::StreamId;
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode, Url};
use std::time::{Duration, Instant};
use tokio::time::timeout_at;

/// A transport with one request per connection.
#[async_trait]
pub trait BaselineClient: Send + Sync {
    /// Fetch `path` on a fresh connection. Timeouts and mid-body failures come
    /// back as a fetch without `elapsed`; only connection refusal is an error.
    async fn get(&self, path: &str, timeout: Duration) -> BaselineResult<BaselineFetch>;

    /// Like `get`, but once more than `threshold` bytes have arrived the
    /// connection is closed, and after `settle` the download resumes on a new one.
    /// A failed resume returns the partial fetch rather than an error.
    async fn get_disrupted(
        &self,
        path: &str,
        timeout: Duration,
        threshold: u64,
        settle: Duration,
    ) -> BaselineResult<BaselineFetch>;
}

/// HTTP/1.1 over TCP via `reqwest`, one client (and so one connection) per request.
#[derive(Debug, Clone)]
pub struct HttpBaseline {
    base_url: Url,
    accept_invalid_certs: bool,
}

impl HttpBaseline {
    pub fn new(base_url: &str, accept_invalid_certs: bool) -> BaselineResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| BaselineError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            base_url,
            accept_invalid_certs,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> BaselineResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BaselineError::InvalidUrl(format!("{path}: {e}")))
    }

    fn fresh_client(&self) -> BaselineResult<Client> {
        Client::builder()
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| BaselineError::Client(e.to_string()))
    }

    /// `Ok(None)` means the request died before a response arrived.
    async fn send(
        &self,
        client: &Client,
        url: Url,
        resume_from: Option<u64>,
        deadline: tokio::time::Instant,
    ) -> BaselineResult<Option<Response>> {
        let mut request = client.get(url);
        if let Some(offset) = resume_from {
            request = request.header(header::RANGE, format!("bytes={offset}-"));
        }

        match timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(e)) if e.is_connect() => Err(BaselineError::Connect(e.to_string())),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "baseline request failed");
                Ok(None)
            }
            Err(_) => {
                tracing::warn!("baseline request timed out before a response");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl BaselineClient for HttpBaseline {
    async fn get(&self, path: &str, timeout: Duration) -> BaselineResult<BaselineFetch> {
        let url = self.url_for(path)?;
        let client = self.fresh_client()?;
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;

        let mut fetch = BaselineFetch::default();
        let Some(mut response) = self.send(&client, url, None, deadline).await? else {
            return Ok(fetch);
        };
        fetch.status = Some(response.status().as_u16());

        loop {
            let next = timeout_at(deadline, response.chunk()).await;
            match next {
                Ok(Ok(Some(chunk))) => fetch.bytes += chunk.len() as u64,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    tracing::warn!(path, bytes = fetch.bytes, error = %e, "baseline body failed");
                    return Ok(fetch);
                }
                Err(_) => {
                    tracing::warn!(path, bytes = fetch.bytes, "baseline request timed out");
                    return Ok(fetch);
                }
            }
        }

        fetch.elapsed = Some(start.elapsed());
        Ok(fetch)
    }

    async fn get_disrupted(
        &self,
        path: &str,
        timeout: Duration,
        threshold: u64,
        settle: Duration,
    ) -> BaselineResult<BaselineFetch> {
        let url = self.url_for(path)?;
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let kill = ConnectionKill::new();
        let mut trigger = MigrationTrigger::new(StreamId(0), threshold);

        let mut fetch = BaselineFetch::default();
        let client = self.fresh_client()?;
        let Some(mut response) = self.send(&client, url.clone(), None, deadline).await? else {
            return Ok(fetch);
        };
        fetch.status = Some(response.status().as_u16());
        let total_len = response.content_length();

        loop {
            let next = timeout_at(deadline, response.chunk()).await;
            let chunk = match next {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    tracing::warn!(path, bytes = fetch.bytes, error = %e, "baseline body failed");
                    return Ok(fetch);
                }
                Err(_) => {
                    tracing::warn!(path, bytes = fetch.bytes, "baseline request timed out");
                    return Ok(fetch);
                }
            };

            fetch.bytes += chunk.len() as u64;
            trigger.on_data(StreamId(0), fetch.bytes, &kill);
            if !kill.take() {
                continue;
            }

            tracing::info!(bytes = fetch.bytes, "closing baseline connection mid-transfer");
            drop(response);
            fetch.disrupted_at = trigger.fired_at_bytes();

            if total_len.is_some_and(|len| fetch.bytes >= len) {
                break;
            }

            tokio::time::sleep(settle).await;
            let client = self.fresh_client()?;
            response = match self
                .send(&client, url.clone(), Some(fetch.bytes), deadline)
                .await
            {
                Ok(Some(response)) => response,
                Ok(None) => return Ok(fetch),
                Err(e) => {
                    tracing::warn!(path, bytes = fetch.bytes, error = %e, "could not reconnect");
                    return Ok(fetch);
                }
            };
            fetch.reconnects += 1;

            match response.status() {
                StatusCode::PARTIAL_CONTENT => {}
                status if status.is_success() => {
                    // Range ignored, the whole body comes again
                    fetch.bytes = 0;
                }
                status => {
                    tracing::warn!(path, %status, "resume refused");
                    return Ok(fetch);
                }
            }
        }

        fetch.elapsed = Some(start.elapsed());
        Ok(fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let baseline = HttpBaseline::new("http://127.0.0.1:8443", true).unwrap();
        assert_eq!(
            baseline.url_for("/files/file1.bin").unwrap().as_str(),
            "http://127.0.0.1:8443/files/file1.bin"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpBaseline::new("not a url", false),
            Err(BaselineError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let baseline = HttpBaseline::new(&format!("http://127.0.0.1:{port}"), false).unwrap();

        let result = baseline.get("/index.html", Duration::from_secs(2)).await;
        assert!(matches!(result, Err(BaselineError::Connect(_))));
    }

    #[tokio::test]
    async fn test_failed_resume_keeps_partial_fetch() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Serves one connection, then stops listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            drop(listener);

            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = b"HTTP/1.1 200 OK\r\nContent-Length: 3000000\r\n\r\n";
            if socket.write_all(head).await.is_err() {
                return;
            }
            let chunk = vec![0u8; 50_000];
            for _ in 0..60 {
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
            }
        });

        let baseline = HttpBaseline::new(&format!("http://{addr}"), false).unwrap();
        let fetch = baseline
            .get_disrupted(
                "/bigfile.bin",
                Duration::from_secs(5),
                2_000_000,
                Duration::from_millis(10),
            )
            .await
            .unwrap();

        assert_eq!(fetch.status, Some(200));
        assert!(fetch.disrupted_at.is_some());
        assert!(fetch.bytes > 2_000_000);
        assert!(fetch.bytes < 3_000_000);
        assert_eq!(fetch.reconnects, 0);
        assert!(fetch.elapsed.is_none());
    }
}
