//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router around a real
//! job pipeline whose fetcher and media engine are mocks, so the whole HTTP
//! surface can be exercised without network access or ffmpeg.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use grabber_core::{
    config::ServerConfig, testing::{MockEngine, MockFetcher}, Config, CookieStore, JobPipeline,
    PipelineConfig, Transcoder, TranscoderConfig,
};
use grabber_server::state::AppState;

/// Re-export fixtures for test convenience
pub use grabber_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/jobs", json!({
///         "url": "https://media.example.com/clip",
///         "format": "mp3"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock fetcher - control source downloads
    pub fetcher: Arc<MockFetcher>,
    /// Mock media engine - control transcode outcomes
    pub engine: Arc<MockEngine>,
    pub pipeline: Arc<JobPipeline>,
    /// Cookie file backing the credential store
    pub cookies_path: PathBuf,
    pub temp_path: PathBuf,
    pub data_path: PathBuf,
    /// Temporary directory holding cookies, temp and data dirs
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Response with the raw body bytes
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cookies_path =
            fixtures::write_cookie_file(temp_dir.path()).expect("Failed to write cookie file");
        let temp_path = temp_dir.path().join("temp");
        let data_path = temp_dir.path().join("data");

        let mut config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            pipeline: PipelineConfig::default()
                .with_limits(test_config.max_concurrent_jobs, test_config.queue_depth)
                .with_dirs(&temp_path, &data_path),
            ..Default::default()
        };
        config.credentials.cookies_path = cookies_path.clone();
        config.rate_limit.enabled = test_config.requests_per_minute.is_some();
        if let Some(rpm) = test_config.requests_per_minute {
            config.rate_limit.requests_per_minute = rpm;
        }

        let credentials = Arc::new(CookieStore::new(&cookies_path));
        credentials.load().await.expect("Failed to load cookies");

        let fetcher = Arc::new(MockFetcher::new());
        let engine = Arc::new(MockEngine::new());
        let transcoder = Arc::new(Transcoder::new(
            Arc::clone(&engine) as Arc<dyn grabber_core::MediaEngine>,
            TranscoderConfig::default(),
        ));

        let pipeline = Arc::new(JobPipeline::new(
            config.pipeline.clone(),
            credentials,
            Arc::clone(&fetcher) as Arc<dyn grabber_core::Fetcher>,
            transcoder,
        ));
        pipeline.start().await.expect("Failed to start pipeline");

        let state = Arc::new(AppState::new(config, Arc::clone(&pipeline)));
        let router = grabber_server::api::create_router(state);

        Self {
            router,
            fetcher,
            engine,
            pipeline,
            cookies_path,
            temp_path,
            data_path,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and keep the body as bytes.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a request for `client_ip` through a local reverse proxy.
    pub async fn get_from(&self, path: &str, client_ip: &str) -> TestResponse {
        self.get_via(path, SocketAddr::from(([127, 0, 0, 1], 40000)), Some(client_ip))
            .await
    }

    /// Send a request from socket peer `peer`, optionally with an
    /// `X-Forwarded-For` header.
    pub async fn get_via(
        &self,
        path: &str,
        peer: SocketAddr,
        forwarded_for: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("GET")
            .uri(path)
            .extension(ConnectInfo(peer));
        if let Some(client_ip) = forwarded_for {
            builder = builder.header("X-Forwarded-For", client_ip);
        }
        Self::to_json(self.send(builder.body(Body::empty()).unwrap()).await)
    }

    /// Submit a job and return its id.
    pub async fn submit(&self, url: &str, format: &str) -> String {
        let response = self
            .post("/jobs", serde_json::json!({ "url": url, "format": format }))
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{:?}", response.body);
        response.body["job_id"]
            .as_str()
            .expect("job_id missing")
            .to_string()
    }

    /// Poll a job until it reaches `done` or `failed`.
    pub async fn wait_for_terminal(&self, job_id: &str) -> Value {
        for _ in 0..500 {
            let response = self.get(&format!("/jobs/{}", job_id)).await;
            let state = response.body["state"].as_str().unwrap_or_default();
            if state == "done" || state == "failed" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    /// Poll a job until it reaches `state`.
    pub async fn wait_for_state(&self, job_id: &str, state: &str) {
        for _ in 0..500 {
            let response = self.get(&format!("/jobs/{}", job_id)).await;
            if response.body["state"] == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", job_id, state);
    }

    /// Whether the temp directory holds no job workspaces.
    pub fn temp_dir_is_empty(&self) -> bool {
        std::fs::read_dir(&self.temp_path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        Self::to_json(self.send(request).await)
    }

    async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        RawResponse {
            status,
            headers,
            body,
        }
    }

    fn to_json(raw: RawResponse) -> TestResponse {
        let body: Value = if raw.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw.body).unwrap_or(Value::Null)
        };

        TestResponse {
            status: raw.status,
            headers: raw.headers,
            body,
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub max_concurrent_jobs: usize,
    pub queue_depth: usize,
    /// Enables rate limiting at this rate when set
    pub requests_per_minute: Option<u32>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_depth: 4,
            requests_per_minute: None,
        }
    }
}

impl TestConfig {
    /// Create config with a tiny pool, for saturation tests.
    pub fn with_limits(max_concurrent_jobs: usize, queue_depth: usize) -> Self {
        Self {
            max_concurrent_jobs,
            queue_depth,
            ..Default::default()
        }
    }

    /// Create config with rate limiting enabled.
    pub fn with_rate_limit(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute: Some(requests_per_minute),
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
