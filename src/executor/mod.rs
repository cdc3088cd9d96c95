//! The HTTP round trip: compile, send one batch, decode.

use crate::compiler::QueryCompiler;
use crate::config::Config;
use crate::decoder::{decode, ResultSet};
use crate::heroic::QueryBatch;
use crate::model::QueryRequest;
use crate::stats::*;
use crate::{Error, Result};
use chrono::Utc;
use ringlog::*;
use std::collections::BTreeMap;
use std::future::Future;

mod transport;

pub use transport::{HttpTransport, RawResponse, Transport};

/// Runs dashboard requests against one Heroic datasource.
pub struct HeroicExecutor<T = HttpTransport> {
    config: Config,
    compiler: QueryCompiler,
    transport: T,
}

impl HeroicExecutor<HttpTransport> {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.datasource.timeout()?)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> HeroicExecutor<T> {
    pub fn with_transport(config: Config, transport: T) -> Result<Self> {
        config.validate()?;
        let compiler = QueryCompiler::new(&config.query.distributed_aggregation_feature);

        Ok(Self {
            config,
            compiler,
            transport,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compile a request into the batch that would be sent.
    pub fn compile(&self, request: &QueryRequest) -> Result<QueryBatch> {
        self.compiler.compile_batch(request, Utc::now())
    }

    /// Run a request, bounded only by the configured deadline.
    pub async fn query(&self, request: &QueryRequest) -> Result<BTreeMap<String, ResultSet>> {
        self.query_with_cancel(request, std::future::pending()).await
    }

    /// Run a request, abandoning it with [`Error::Cancelled`] as soon as
    /// `cancel` completes.
    pub async fn query_with_cancel<F>(&self, request: &QueryRequest, cancel: F) -> Result<BTreeMap<String, ResultSet>>
    where
        F: Future<Output = ()>,
    {
        let batch = self.compile(request)?;
        let response = self.send(&batch, cancel).await?;
        decode(response.status, &response.body, &batch)
    }

    /// Send a compiled batch and return the undecoded response.
    pub async fn send<F>(&self, batch: &QueryBatch, cancel: F) -> Result<RawResponse>
    where
        F: Future<Output = ()>,
    {
        let url = self.config.datasource.batch_url()?;
        let deadline = self.config.datasource.timeout()?;

        info!(
            "sending {} queries to {url} for range {}..{}",
            batch.queries.len(),
            batch.range.start,
            batch.range.end
        );
        if let Ok(payload) = serde_json::to_string(batch) {
            debug!("batch payload: {payload}");
        }

        BATCHES_SENT.increment();

        let round_trip = tokio::time::timeout(
            deadline,
            self.transport
                .post_batch(&url, self.config.datasource.basic_auth.as_ref(), batch),
        );

        let result = tokio::select! {
            result = round_trip => result.unwrap_or(Err(Error::Timeout(deadline))),
            _ = cancel => Err(Error::Cancelled),
        };

        match &result {
            Ok(response) if !(200..300).contains(&response.status) => {
                REQUEST_ERRORS.increment();
            }
            Ok(_) => {}
            Err(e) => {
                REQUEST_ERRORS.increment();
                warn!("batch request to {url} failed: {e}");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BasicAuth;
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records what it was asked to send and answers with a canned response.
    struct Canned {
        response: RawResponse,
        delay: Duration,
        seen: Mutex<Vec<(String, Option<String>, serde_json::Value)>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: RawResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                },
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn post_batch(&self, url: &Url, auth: Option<&BasicAuth>, batch: &QueryBatch) -> Result<RawResponse> {
            self.seen.lock().unwrap().push((
                url.to_string(),
                auth.map(|a| a.user.clone()),
                serde_json::to_value(batch).unwrap(),
            ));
            tokio::time::sleep(self.delay).await;
            Ok(self.response.clone())
        }
    }

    fn request() -> QueryRequest {
        QueryRequest::from_json(
            r#"{
                "range": {"from": 1000, "to": 5000},
                "queries": [
                    {"refId": "A", "select": [[]], "groupBy": [{"params": ["1m"]}], "alias": "$1"},
                    {"refId": "B", "groupBy": [{"params": ["5m"]}], "globalAggregation": true}
                ]
            }"#,
        )
        .unwrap()
    }

    const RESPONSE: &str = r#"{"results": {
        "0": {"queryId": "qa", "result": [{"key": "cpu.idle", "values": [[1000, 3]]}]},
        "1": {"queryId": "qb", "result": []}
    }}"#;

    #[tokio::test]
    async fn round_trip() {
        let config = Config::new("http://heroic:8080/api").with_basic_auth("grafana", "pw");
        let executor = HeroicExecutor::with_transport(config, Canned::new(200, RESPONSE)).unwrap();

        let results = executor.query(&request()).await.unwrap();

        assert_eq!(results["A"].series[0].name, "idle");
        assert_eq!(results["A"].query_id, "qa");
        assert!(results["B"].series.is_empty());

        let seen = executor.transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (url, user, body) = &seen[0];
        assert_eq!(url, "http://heroic:8080/api/query/batch");
        assert_eq!(user.as_deref(), Some("grafana"));
        assert_eq!(body["range"]["start"], 1000);
        assert_eq!(body["queries"]["1"]["features"][0], "com.spotify.heroic.distributed_aggregations");
        assert!(body["queries"]["0"].get("alias").is_none());
    }

    #[tokio::test]
    async fn compile_failure_sends_nothing() {
        let executor = HeroicExecutor::with_transport(Config::new("http://h"), Canned::new(200, RESPONSE)).unwrap();
        let mut request = request();
        request.queries[1].group_by.interval = Some("often".into());

        let err = executor.query(&request).await.unwrap_err();
        assert_eq!(err.ref_id(), Some("B"));
        assert!(executor.transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_error_status() {
        let executor =
            HeroicExecutor::with_transport(Config::new("http://h"), Canned::new(503, "overloaded")).unwrap();

        match executor.query(&request()).await {
            Err(Error::BackendRequest { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_wins_over_slow_backend() {
        let mut transport = Canned::new(200, RESPONSE);
        transport.delay = Duration::from_secs(30);
        let executor = HeroicExecutor::with_transport(Config::new("http://h"), transport).unwrap();

        let err = executor
            .query_with_cancel(&request(), tokio::time::sleep(Duration::from_millis(10)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn deadline_applies() {
        let mut transport = Canned::new(200, RESPONSE);
        transport.delay = Duration::from_secs(30);
        let config = Config::new("http://h").with_timeout(Duration::from_millis(20));
        let executor = HeroicExecutor::with_transport(config, transport).unwrap();

        match executor.query(&request()).await {
            Err(Error::Timeout(deadline)) => assert_eq!(deadline, Duration::from_millis(20)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(
            HeroicExecutor::with_transport(Config::new("nope"), Canned::new(200, "")),
            Err(Error::Config(_))
        ));
    }
}
