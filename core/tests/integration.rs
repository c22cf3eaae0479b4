//! End-to-end sends against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then runs descriptors through a
//! real [`Client`] whose transport executes requests with ureq. Validates
//! that URL building, parameter encoding, retries and decoding line up with
//! an actual HTTP server.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use apiflow_core::{
    ApiError, Client, CompletionContext, ContentType, Decisions, Endpoint, HttpMethod, HttpRequest,
    Parameters, RawResponse, Transport, TransportError,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

/// Executes requests with a blocking ureq agent on tokio's blocking pool.
struct UreqTransport;

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        tokio::task::spawn_blocking(move || execute(request))
            .await
            .map_err(|e| TransportError::new(format!("transport task failed: {e}")))?
    }
}

/// Execute an `HttpRequest` with ureq.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses come back as data and the decision chain interprets them.
fn execute(req: HttpRequest) -> Result<RawResponse, TransportError> {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(req.timeout))
        .build()
        .new_agent();

    let url = req.url.as_str();
    let result = match (req.method, req.body) {
        (HttpMethod::Get, _) => {
            let mut builder = agent.get(url);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder.call()
        }
        (HttpMethod::Post, body) => {
            let mut builder = agent.post(url);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            match body {
                Some(body) => builder.send(body.as_slice()),
                None => builder.send_empty(),
            }
        }
    };
    let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| TransportError::new(e.to_string()))?;

    Ok(RawResponse {
        status: Some(status),
        headers,
        body: Some(body),
    })
}

/// Start a fresh mock server on a random port and return its base URL.
fn start_server() -> String {
    let _ = env_logger::builder().is_test(true).try_init();

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

async fn hits(client: &Client, base: &str) -> BTreeMap<String, usize> {
    let request = Endpoint::<BTreeMap<String, usize>>::get(base, "hits");
    client.send(&request, None).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn fetches_and_decodes_user() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let user = client
        .send(&Endpoint::<User>::get(&base, "users/1"), None)
        .await
        .unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "x".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_user_is_a_response_error() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let err = client
        .send(&Endpoint::<User>::get(&base, "users/99").retry_count(0), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_retried_then_reported() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let request = Endpoint::<User>::get(&base, "status/500").retry_count(2);
    let err = client.send(&request, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Response { status: 500, .. }), "{err:?}");
    assert!(err.is_decode());

    let request = Endpoint::<Value>::get(&base, "status/500").decisions(Decisions::strict(0));
    let err = client.send(&request, None).await.unwrap_err();
    assert!(!err.is_decode(), "{err:?}");

    let hits = hits(&client, &base).await;
    assert_eq!(hits.get("/status/500"), Some(&4));
}

#[tokio::test(flavor = "multi_thread")]
async fn flaky_endpoint_recovers_within_budget() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let request = Endpoint::<Value>::get(&base, "flaky")
        .parameters(Parameters::new().with("key", "a").with("fail", 1))
        .retry_count(1);
    let body = client.send(&request, None).await.unwrap();
    assert_eq!(body["attempts"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_parameters_arrive_as_query() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let request = Endpoint::<Value>::get(format!("{base}/search"), "")
        .parameters(Parameters::new().with("q", "hello"));
    let body = client.send(&request, None).await.unwrap();
    assert_eq!(body["raw"], "q=hello");

    let request = Endpoint::<Value>::get(format!("{base}/search?x=9"), "")
        .parameters(Parameters::new().with("a", 1).with("b", "two words"));
    let body = client.send(&request, None).await.unwrap();
    assert_eq!(
        body["pairs"],
        serde_json::json!([["x", "9"], ["a", "1"], ["b", "two words"]])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn creates_users_from_json_and_form_bodies() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let json =
        Endpoint::<User>::post(&base, "users").parameters(Parameters::new().with("name", "ann"));
    let created = client.send(&json, None).await.unwrap();
    assert_eq!(created.id, 2);
    assert_eq!(created.name, "ann");

    let form = Endpoint::<User>::post(&base, "users/form")
        .content_type(ContentType::UrlForm)
        .parameters(Parameters::new().with("name", "bo b&co"));
    let created = client.send(&form, None).await.unwrap();
    assert_eq!(created.id, 3);
    assert_eq!(created.name, "bo b&co");

    let fetched = client
        .send(&Endpoint::<User>::get(&base, "users/3"), None)
        .await
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_sees_headers_and_encoded_body() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let request = Endpoint::<Value>::post(&base, "echo")
        .header("X-Client", "apiflow")
        .timeout(Duration::from_secs(5))
        .parameters(Parameters::new().with("a", 1));
    let body = client.send(&request, None).await.unwrap();
    assert_eq!(body["content_type"], "application/json");
    assert_eq!(body["body"], r#"{"a":1}"#);
    assert_eq!(body["headers"]["x-client"], "apiflow");
}

#[tokio::test(flavor = "multi_thread")]
async fn callback_delivers_result() {
    let base = start_server();
    let client = Client::new(UreqTransport);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = client.send_with_callback(
        Endpoint::<User>::get(&base, "users/1"),
        None,
        CompletionContext::Inline,
        move |result| {
            let _ = tx.send(result);
        },
    );
    let user = rx.await.unwrap().unwrap();
    assert_eq!(user.name, "x");
    handle.join().await;
}
