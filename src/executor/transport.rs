use crate::config::BasicAuth;
use crate::heroic::QueryBatch;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;

/// Status and body of a backend response, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Delivers a batch to the backend. Connection pooling, TLS and the like
/// belong to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_batch(&self, url: &Url, auth: Option<&BasicAuth>, batch: &QueryBatch) -> Result<RawResponse>;
}

/// `reqwest` backed transport. Cloning shares the connection pool.
///
/// Only connection setup is bounded here, the overall deadline is applied by
/// the executor.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_batch(&self, url: &Url, auth: Option<&BasicAuth>, batch: &QueryBatch) -> Result<RawResponse> {
        let mut request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(batch);

        if let Some(auth) = auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse { status, body })
    }
}
