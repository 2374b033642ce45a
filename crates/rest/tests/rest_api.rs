//! REST API behavior tests.
//!
//! - Full-replace semantics over HTTP
//! - Status codes and error bodies
//! - Response headers (ETag, Location)
//! - Conditional requests (If-Match, If-None-Match)
//! - Listing with filters, sort and paging
//! - Idempotency-Key replay

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::{TestResponse, TestServer};
use serde_json::{Value, json};
use stowage_persistence::backends::memory::MemoryBackend;
use stowage_rest::{ServerConfig, create_app_with_config};

const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");

fn server_with(config: ServerConfig) -> TestServer {
    let app = create_app_with_config(MemoryBackend::new(), config);
    TestServer::new(app).expect("Failed to create test server")
}

fn create_test_server() -> TestServer {
    server_with(ServerConfig::for_testing())
}

async fn create(server: &TestServer, body: Value) -> Value {
    let response = server.post("/testtype").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

fn header_str(response: &TestResponse, name: HeaderName) -> String {
    response
        .headers()
        .get(name)
        .expect("missing header")
        .to_str()
        .unwrap()
        .to_string()
}

fn errors(response: &TestResponse) -> Vec<String> {
    serde_json::from_value(response.json::<Value>()["errors"].clone()).unwrap()
}

// =============================================================================
// Full replace
// =============================================================================

mod full_replace {
    use super::*;

    #[tokio::test]
    async fn test_replace_resets_omitted_fields() {
        let server = create_test_server();

        let created = create(&server, json!({"text": "foo", "num": 5})).await;
        assert_eq!(created["text"], "foo");
        assert_eq!(created["num"], 5);
        assert_eq!(created["generation"], 0);
        let id = created["id"].as_str().unwrap().to_string();

        let fetched = server.get(&format!("/testtype/{id}")).await;
        fetched.assert_status_ok();
        assert_eq!(fetched.json::<Value>(), created);

        let replaced = server
            .put(&format!("/testtype/{id}"))
            .json(&json!({"text": "bar"}))
            .await;
        replaced.assert_status_ok();
        let replaced = replaced.json::<Value>();
        assert_eq!(replaced["text"], "bar");
        assert_eq!(replaced["num"], 0);
        assert_eq!(replaced["generation"], 1);
        assert_eq!(replaced["id"], id.as_str());

        let fetched = server.get(&format!("/testtype/{id}")).await.json::<Value>();
        assert_eq!(fetched, replaced);
    }

    #[tokio::test]
    async fn test_create_fills_zero_values() {
        let server = create_test_server();

        let created = create(&server, json!({})).await;
        assert_eq!(created["text"], "");
        assert_eq!(created["num"], 0);
    }

    #[tokio::test]
    async fn test_metadata_in_body_is_ignored() {
        let server = create_test_server();

        let created = create(
            &server,
            json!({"id": "mine", "generation": 7, "etag": "etag:00", "num": 1}),
        )
        .await;

        assert_ne!(created["id"], "mine");
        assert_eq!(created["generation"], 0);
        assert_ne!(created["etag"], "etag:00");
    }

    #[tokio::test]
    async fn test_replace_unknown_id_is_404() {
        let server = create_test_server();

        let response = server
            .put("/testtype/does-not-exist")
            .json(&json!({"text": "bar"}))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert!(errors(&response)[0].contains("not found"));
    }
}

// =============================================================================
// Status codes and error bodies
// =============================================================================

mod status_codes {
    use super::*;

    #[tokio::test]
    async fn test_get_unknown_id_is_404() {
        let server = create_test_server();

        let response = server.get("/testtype/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(errors(&response), vec!["not found: testtype/nope".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_type_is_404() {
        let server = create_test_server();

        let response = server.post("/widget").json(&json!({})).await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert!(errors(&response)[0].contains("unknown type"));
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_400() {
        let server = create_test_server();

        let response = server
            .post("/testtype")
            .json(&json!({"text": "foo", "num": "five"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_object_body_is_400() {
        let server = create_test_server();

        let response = server.post("/testtype").json(&json!([1, 2, 3])).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let server = create_test_server();

        let response = server
            .post("/testtype")
            .bytes(Bytes::from_static(b"{\"text\": "))
            .content_type("application/json")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(errors(&response)[0].contains("invalid JSON"));
    }

    #[tokio::test]
    async fn test_non_json_content_type_is_415() {
        let server = create_test_server();

        let response = server.post("/testtype").text("text=foo").await;

        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let server = server_with(ServerConfig {
            max_body_size: 64,
            ..ServerConfig::for_testing()
        });
        let body = json!({"text": "x".repeat(200), "num": 1});

        let response = server.post("/testtype").json(&body).await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let response = server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"big\""))
            .json(&body)
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!errors(&response).is_empty());

        let all = server.get("/testtype").await.json::<Vec<Value>>();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_replace_does_not_mutate() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "foo", "num": 5})).await;
        let id = created["id"].as_str().unwrap();

        let response = server
            .put(&format!("/testtype/{id}"))
            .json(&json!({"num": "oops"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let fetched = server.get(&format!("/testtype/{id}")).await.json::<Value>();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_404() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "foo"})).await;
        let id = created["id"].as_str().unwrap();

        server
            .delete(&format!("/testtype/{id}"))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/testtype/{id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .delete(&format!("/testtype/{id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let server = create_test_server();

        let response = server.get("/_health").await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
    }
}

// =============================================================================
// Response headers
// =============================================================================

mod headers {
    use super::*;

    #[tokio::test]
    async fn test_create_sets_location_and_etag() {
        let server = create_test_server();

        let response = server
            .post("/testtype")
            .json(&json!({"text": "foo", "num": 5}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();

        let location = header_str(&response, header::LOCATION);
        assert_eq!(
            location,
            format!("http://localhost:0/testtype/{}", body["id"].as_str().unwrap())
        );

        let etag = header_str(&response, header::ETAG);
        assert_eq!(etag, format!("\"{}\"", body["etag"].as_str().unwrap()));
        assert!(etag.starts_with("\"etag:"));
    }

    #[tokio::test]
    async fn test_equal_content_has_equal_etag() {
        let server = create_test_server();

        let a = create(&server, json!({"text": "same", "num": 1})).await;
        let b = create(&server, json!({"text": "same", "num": 1})).await;
        let c = create(&server, json!({"text": "same", "num": 2})).await;

        assert_eq!(a["etag"], b["etag"]);
        assert_ne!(a["etag"], c["etag"]);
    }
}

// =============================================================================
// Conditional requests
// =============================================================================

mod conditional {
    use super::*;

    #[tokio::test]
    async fn test_if_match_generation() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "foo", "num": 5})).await;
        let id = created["id"].as_str().unwrap();

        let response = server
            .put(&format!("/testtype/{id}"))
            .add_header(header::IF_MATCH, HeaderValue::from_static("\"generation:0\""))
            .json(&json!({"text": "bar"}))
            .await;
        response.assert_status_ok();

        let response = server
            .put(&format!("/testtype/{id}"))
            .add_header(header::IF_MATCH, HeaderValue::from_static("\"generation:0\""))
            .json(&json!({"text": "baz"}))
            .await;
        response.assert_status(StatusCode::PRECONDITION_FAILED);
        assert!(errors(&response)[0].contains("generation mismatch"));

        let fetched = server.get(&format!("/testtype/{id}")).await.json::<Value>();
        assert_eq!(fetched["text"], "bar");
        assert_eq!(fetched["generation"], 1);
    }

    #[tokio::test]
    async fn test_if_match_etag() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "foo"})).await;
        let id = created["id"].as_str().unwrap();
        let etag = format!("\"{}\"", created["etag"].as_str().unwrap());

        let response = server
            .put(&format!("/testtype/{id}"))
            .add_header(header::IF_MATCH, HeaderValue::from_str(&etag).unwrap())
            .json(&json!({"text": "bar"}))
            .await;
        response.assert_status_ok();

        let response = server
            .delete(&format!("/testtype/{id}"))
            .add_header(header::IF_MATCH, HeaderValue::from_str(&etag).unwrap())
            .await;
        response.assert_status(StatusCode::PRECONDITION_FAILED);
        assert!(errors(&response)[0].contains("etag mismatch"));
    }

    #[tokio::test]
    async fn test_invalid_if_match_is_400() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "foo"})).await;
        let id = created["id"].as_str().unwrap();

        let response = server
            .put(&format!("/testtype/{id}"))
            .add_header(header::IF_MATCH, HeaderValue::from_static("\"foobar\""))
            .json(&json!({"text": "bar"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(errors(&response)[0].contains("invalid If-Match"));
    }

    #[tokio::test]
    async fn test_if_match_required() {
        let server = server_with(ServerConfig {
            require_if_match: true,
            ..ServerConfig::for_testing()
        });
        let created = create(&server, json!({"text": "foo"})).await;
        let id = created["id"].as_str().unwrap();

        server
            .put(&format!("/testtype/{id}"))
            .json(&json!({"text": "bar"}))
            .await
            .assert_status(StatusCode::PRECONDITION_REQUIRED);

        server
            .delete(&format!("/testtype/{id}"))
            .await
            .assert_status(StatusCode::PRECONDITION_REQUIRED);

        server
            .put(&format!("/testtype/{id}"))
            .add_header(header::IF_MATCH, HeaderValue::from_static("\"generation:0\""))
            .json(&json!({"text": "bar"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_if_none_match_get() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "foo"})).await;
        let id = created["id"].as_str().unwrap();
        let etag = format!("\"{}\"", created["etag"].as_str().unwrap());

        server
            .get(&format!("/testtype/{id}"))
            .add_header(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap())
            .await
            .assert_status(StatusCode::NOT_MODIFIED);

        server
            .get(&format!("/testtype/{id}"))
            .add_header(header::IF_NONE_MATCH, HeaderValue::from_static("\"etag:other\""))
            .await
            .assert_status_ok();
    }
}

// =============================================================================
// Listing
// =============================================================================

mod list {
    use super::*;

    async fn seed(server: &TestServer) {
        for (text, num) in [("alpha", 3), ("beta", 1), ("gamma", 2), ("alphabet", 5)] {
            create(server, json!({"text": text, "num": num})).await;
        }
    }

    fn texts(response: &TestResponse) -> Vec<String> {
        response
            .json::<Vec<Value>>()
            .iter()
            .map(|r| r["text"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let server = create_test_server();
        seed(&server).await;

        let response = server.get("/testtype").add_query_param("_sort", "-num").await;

        response.assert_status_ok();
        assert_eq!(texts(&response), ["alphabet", "alpha", "gamma", "beta"]);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let server = create_test_server();
        seed(&server).await;

        let response = server
            .get("/testtype")
            .add_query_param("text[hp]", "alpha")
            .add_query_param("_sort", "num")
            .await;
        assert_eq!(texts(&response), ["alpha", "alphabet"]);

        let response = server
            .get("/testtype")
            .add_query_param("num[gte]", "2")
            .add_query_param("num[lt]", "5")
            .add_query_param("_sort", "text")
            .await;
        assert_eq!(texts(&response), ["alpha", "gamma"]);

        let response = server
            .get("/testtype")
            .add_query_param("num[in]", "1,5")
            .add_query_param("_sort", "num")
            .await;
        assert_eq!(texts(&response), ["beta", "alphabet"]);

        let response = server.get("/testtype").add_query_param("text", "beta").await;
        assert_eq!(texts(&response), ["beta"]);
    }

    #[tokio::test]
    async fn test_list_paging() {
        let server = create_test_server();
        seed(&server).await;

        let response = server
            .get("/testtype")
            .add_query_param("_sort", "num")
            .add_query_param("_offset", "1")
            .add_query_param("_limit", "2")
            .await;

        assert_eq!(texts(&response), ["gamma", "alpha"]);
    }

    #[tokio::test]
    async fn test_list_default_page_size() {
        let server = server_with(ServerConfig {
            default_page_size: 2,
            max_page_size: 3,
            ..ServerConfig::for_testing()
        });
        seed(&server).await;

        let response = server.get("/testtype").await;
        assert_eq!(response.json::<Vec<Value>>().len(), 2);

        let response = server.get("/testtype").add_query_param("_limit", "50").await;
        assert_eq!(response.json::<Vec<Value>>().len(), 3);
    }

    #[tokio::test]
    async fn test_list_bad_options_are_400() {
        let server = create_test_server();
        seed(&server).await;

        for (key, value) in [
            ("color", "red"),
            ("num", "abc"),
            ("num[hp]", "1"),
            ("num[between]", "1"),
            ("_bogus", "1"),
            ("_limit", "-1"),
        ] {
            let response = server.get("/testtype").add_query_param(key, value).await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_list_etag_and_304() {
        let server = create_test_server();
        seed(&server).await;

        let response = server.get("/testtype").add_query_param("_sort", "num").await;
        response.assert_status_ok();
        let etag = header_str(&response, header::ETAG);
        assert!(etag.starts_with("\"etag:"));

        server
            .get("/testtype")
            .add_query_param("_sort", "num")
            .add_header(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap())
            .await
            .assert_status(StatusCode::NOT_MODIFIED);

        create(&server, json!({"text": "delta", "num": 4})).await;

        let response = server
            .get("/testtype")
            .add_query_param("_sort", "num")
            .add_header(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap())
            .await;
        response.assert_status_ok();
        assert_ne!(header_str(&response, header::ETAG), etag);
    }

    #[tokio::test]
    async fn test_list_unknown_type_is_404() {
        let server = create_test_server();

        server
            .get("/widget")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Idempotency keys
// =============================================================================

mod idempotency {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::State,
        http::{Method, Request},
        middleware::from_fn_with_state,
        routing::post,
    };
    use stowage_rest::middleware::{IdempotencyStore, idempotency_middleware};
    use tokio::sync::Notify;
    use tokio::time::timeout;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_repeat_replays_first_response() {
        let server = create_test_server();
        let body = json!({"text": "once", "num": 1});

        let first = server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-1\""))
            .json(&body)
            .await;
        first.assert_status(StatusCode::CREATED);

        let second = server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-1\""))
            .json(&body)
            .await;
        second.assert_status(StatusCode::CREATED);

        assert_eq!(first.json::<Value>(), second.json::<Value>());
        assert_eq!(
            header_str(&first, header::LOCATION),
            header_str(&second, header::LOCATION)
        );

        let all = server.get("/testtype").await.json::<Vec<Value>>();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_different_body_is_mismatch() {
        let server = create_test_server();

        server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-2\""))
            .json(&json!({"text": "a"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-2\""))
            .json(&json!({"text": "b"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(errors(&response)[0].contains("idempotency mismatch"));
    }

    #[tokio::test]
    async fn test_different_url_is_mismatch() {
        let server = create_test_server();
        let created = create(&server, json!({"text": "a"})).await;
        let id = created["id"].as_str().unwrap();

        server
            .put(&format!("/testtype/{id}"))
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-3\""))
            .json(&json!({"text": "b"}))
            .await
            .assert_status_ok();

        let response = server
            .put("/testtype/other")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-3\""))
            .json(&json!({"text": "b"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(errors(&response)[0].contains("idempotency mismatch"));
    }

    #[tokio::test]
    async fn test_different_accept_is_mismatch() {
        let server = create_test_server();
        let body = json!({"text": "a"});

        server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-4\""))
            .add_header(header::ACCEPT, HeaderValue::from_static("application/json"))
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-4\""))
            .add_header(header::ACCEPT, HeaderValue::from_static("text/plain"))
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unquoted_key_is_400() {
        let server = create_test_server();

        let response = server
            .post("/testtype")
            .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("key-5"))
            .json(&json!({"text": "a"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(errors(&response)[0].contains("invalid Idempotency-Key"));

        let all = server.get("/testtype").await.json::<Vec<Value>>();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_error_responses_are_replayed() {
        let server = create_test_server();

        for _ in 0..2 {
            server
                .put("/testtype/missing")
                .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-6\""))
                .json(&json!({"text": "a"}))
                .await
                .assert_status(StatusCode::NOT_FOUND);
        }
    }

    #[derive(Clone, Default)]
    struct Gate {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    async fn gated(State(gate): State<Gate>) -> StatusCode {
        gate.entered.notify_one();
        gate.release.notified().await;
        StatusCode::CREATED
    }

    fn keyed_post(key: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/gated")
            .header(IDEMPOTENCY_KEY, key)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_repeat_while_first_runs_is_409() {
        let gate = Gate::default();
        let app = Router::new()
            .route("/gated", post(gated))
            .with_state(gate.clone())
            .layer(from_fn_with_state(
                Arc::new(IdempotencyStore::new(1024)),
                idempotency_middleware,
            ));

        let first = tokio::spawn(app.clone().oneshot(keyed_post("\"slow\"")));
        timeout(Duration::from_secs(5), gate.entered.notified())
            .await
            .expect("first request never reached the handler");

        let second = app.clone().oneshot(keyed_post("\"slow\"")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["errors"][0].as_str().unwrap().contains("in progress"));

        gate.release.notify_one();
        let first = timeout(Duration::from_secs(5), first)
            .await
            .expect("first request did not finish")
            .unwrap()
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let replay = timeout(Duration::from_secs(5), app.oneshot(keyed_post("\"slow\"")))
            .await
            .expect("repeat after completion should replay")
            .unwrap();
        assert_eq!(replay.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_disabled_runs_every_request() {
        let server = server_with(ServerConfig {
            enable_idempotency: false,
            ..ServerConfig::for_testing()
        });
        let body = json!({"text": "twice"});

        for _ in 0..2 {
            server
                .post("/testtype")
                .add_header(IDEMPOTENCY_KEY, HeaderValue::from_static("\"key-7\""))
                .json(&body)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let all = server.get("/testtype").await.json::<Vec<Value>>();
        assert_eq!(all.len(), 2);
    }
}
