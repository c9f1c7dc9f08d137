//! HTTP backend: `GET base/<hash>`, no sharding.

use std::io;
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use tokio_util::io::StreamReader;
use url::Url;

use crate::error::{LocatorError, Result};
use crate::hash::ContentHash;
use crate::locator::ContentLocator;
use crate::stream::ContentStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone)]
pub struct HttpLocator {
    client: Client,
    base: Url,
}

impl HttpLocator {
    /// `base` must end with `/` so hashes join beneath it.
    pub fn new(base: Url) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, base })
    }

    fn url(&self, hash: &ContentHash) -> Result<Url> {
        self.base
            .join(hash.as_str())
            .map_err(|e| LocatorError::InvalidConfig(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ContentLocator for HttpLocator {
    async fn resolve(&self, hash: &ContentHash) -> Result<ContentStream> {
        if hash.is_empty_content() {
            return Ok(ContentStream::empty());
        }

        let url = self.url(hash)?;
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LocatorError::NotFound(hash.to_string()));
        }
        if !status.is_success() {
            return Err(LocatorError::Http {
                hash: hash.to_string(),
                status,
            });
        }

        let size = response
            .content_length()
            .ok_or_else(|| LocatorError::MissingLength(hash.to_string()))?;
        tracing::debug!(%url, size, "http content response");

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(ContentStream::new(size, StreamReader::new(Box::pin(body))))
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;
    use tokio::io::AsyncReadExt;

    use super::*;

    const HASH: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
    const FORBIDDEN: &str = "0000000000000000000000000000000000000403";

    async fn serve() -> Url {
        async fn blob(Path(hash): Path<String>) -> (AxumStatus, Vec<u8>) {
            match hash.as_str() {
                HASH => (AxumStatus::OK, b"hello world".to_vec()),
                FORBIDDEN => (AxumStatus::FORBIDDEN, Vec::new()),
                _ => (AxumStatus::NOT_FOUND, Vec::new()),
            }
        }

        let app = Router::new().route("/filedir/:hash", get(blob));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Url::parse(&format!("http://{}/filedir/", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_over_http() {
        let locator = HttpLocator::new(serve().await).unwrap();

        let stream = locator
            .resolve(&ContentHash::parse(HASH).unwrap())
            .await
            .unwrap();
        assert_eq!(stream.size(), 11);

        let mut buf = Vec::new();
        stream.into_reader().read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let locator = HttpLocator::new(serve().await).unwrap();

        let missing = ContentHash::parse("1111111111111111111111111111111111111111").unwrap();
        assert!(locator.resolve(&missing).await.unwrap_err().is_not_found());

        let forbidden = ContentHash::parse(FORBIDDEN).unwrap();
        match locator.resolve(&forbidden).await.unwrap_err() {
            LocatorError::Http { status, .. } => assert_eq!(status, StatusCode::FORBIDDEN),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_hash_skips_request() {
        // nothing listens here
        let base = Url::parse("http://127.0.0.1:9/filedir/").unwrap();
        let locator = HttpLocator::new(base).unwrap();

        let stream = locator.resolve(&ContentHash::empty()).await.unwrap();
        assert_eq!(stream.size(), 0);
    }
}
