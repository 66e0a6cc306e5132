use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::time::Duration;

/// Talks to a running server the way a reader app would: open a session,
/// submit jobs, poll them and download the audio.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client<HttpConnector, Full<Bytes>>,
}

/// Status, headers and raw body of one response
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
}

/// A downloaded artifact with the metadata carried in its headers
#[derive(Debug)]
pub struct Download {
    pub audio: Vec<u8>,
    pub content_disposition: String,
    pub duration_seconds: f64,
    pub segment_count: usize,
    pub fell_back: bool,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            http: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Full::new(Bytes::from(body.to_string()))
            }
            None => Full::new(Bytes::new()),
        };

        let response = self
            .http
            .request(builder.body(body).expect("Invalid request"))
            .await
            .expect("Request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        Reply {
            status,
            headers,
            bytes,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Reply {
        self.send(Method::GET, path, None, token).await
    }

    pub async fn request_session(&self) -> Reply {
        self.send(Method::POST, "/api/sessions", None, None).await
    }

    /// Open a session and return its bearer token
    pub async fn open_session(&self) -> String {
        let reply = self
            .request_session()
            .await
            .expect_status(StatusCode::CREATED);
        reply.json()["token"]
            .as_str()
            .expect("Missing token in session response")
            .to_string()
    }

    pub async fn submit_job(&self, token: &str, body: &Value) -> Reply {
        self.send(Method::POST, "/api/jobs", Some(body), Some(token))
            .await
    }

    /// Submit a job that must be accepted and return its id
    pub async fn start_job(&self, token: &str, body: &Value) -> String {
        let reply = self
            .submit_job(token, body)
            .await
            .expect_status(StatusCode::ACCEPTED);
        reply.json()["id"]
            .as_str()
            .expect("Missing job id")
            .to_string()
    }

    pub async fn job(&self, token: &str, job_id: &str) -> Reply {
        self.get(&format!("/api/jobs/{}", job_id), Some(token)).await
    }

    pub async fn jobs(&self, token: &str) -> Reply {
        self.get("/api/jobs", Some(token)).await
    }

    pub async fn cancel_job(&self, token: &str, job_id: &str) -> Reply {
        self.send(
            Method::POST,
            &format!("/api/jobs/{}/cancel", job_id),
            None,
            Some(token),
        )
        .await
    }

    pub async fn delete_job(&self, token: &str, job_id: &str) -> Reply {
        self.send(Method::DELETE, &format!("/api/jobs/{}", job_id), None, Some(token))
            .await
    }

    pub async fn audio(&self, token: &str, job_id: &str) -> Reply {
        self.get(&format!("/api/jobs/{}/audio", job_id), Some(token))
            .await
    }

    /// Poll the job until its state is one of `states`
    pub async fn wait_for_state(&self, token: &str, job_id: &str, states: &[&str]) -> Value {
        for _ in 0..500 {
            let job = self
                .job(token, job_id)
                .await
                .expect_status(StatusCode::OK)
                .json();
            if job["state"].as_str().is_some_and(|state| states.contains(&state)) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Job {} never reached any of {:?}", job_id, states);
    }

    pub async fn wait_until_finished(&self, token: &str, job_id: &str) -> Value {
        self.wait_for_state(token, job_id, &["ready", "failed"])
            .await
    }

    /// Download a ready job's audio and decode the X-* metadata headers
    pub async fn download(&self, token: &str, job_id: &str) -> Download {
        let reply = self
            .audio(token, job_id)
            .await
            .expect_status(StatusCode::OK);
        assert_eq!(reply.header(CONTENT_TYPE.as_str()), Some("audio/mpeg"));

        let required = |name: &str| {
            reply
                .header(name)
                .unwrap_or_else(|| panic!("Missing {} header", name))
                .to_string()
        };

        Download {
            content_disposition: required(CONTENT_DISPOSITION.as_str()),
            duration_seconds: required("x-duration-seconds")
                .parse()
                .expect("Duration is not a number"),
            segment_count: required("x-segment-count")
                .parse()
                .expect("Segment count is not a number"),
            fell_back: required("x-fell-back")
                .parse()
                .expect("Fell-back flag is not a bool"),
            audio: reply.bytes.to_vec(),
        }
    }
}

impl Reply {
    pub fn expect_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status,
            expected,
            "Unexpected status; body: {}",
            String::from_utf8_lossy(&self.bytes)
        );
        self
    }

    /// Assert the `{message}` error body mentions `fragment`
    pub fn expect_message(self, fragment: &str) -> Self {
        let body = self.json();
        let message = body["message"]
            .as_str()
            .expect("Missing message field in error response");
        assert!(
            message.contains(fragment),
            "Expected error message to contain '{}', got '{}'",
            fragment,
            message
        );
        self
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or_else(|_| {
            panic!(
                "Expected a JSON body but got {:?}",
                String::from_utf8_lossy(&self.bytes)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
