//! End-to-end dispatch tests over an activated movie-review deployment:
//! composition, activation with seeds, route resolution, the authorization
//! gate, grant enforcement, and HTTP status mapping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use portico_compose::{AuthRequirement, Composer, Deployment, Limits, Verb};
use portico_core::{Capability, ConfigMap, Item, KeyAttribute, KeyValue, PrimaryKey};
use portico_gateway::{
    Decision, Gateway, HandlerError, HandlerRegistry, InboundCall, Request, Response,
};
use portico_store::{KeyRange, MemoryStore, StoreClient, WriteCondition};

const REVIEWS: &str = "movieReviews";
const FAVOURITES: &str = "favouriteMovies";

fn review(movie_id: i64, date: &str, reviewer: &str, rating: i64) -> Item {
    Item::from_value(json!({
        "movieId": movie_id,
        "reviewDate": date,
        "reviewerName": reviewer,
        "rating": rating,
    }))
    .unwrap()
}

/// The reference composition: two tables, seeded, with open and gated routes.
fn compose(seed_rating: i64) -> Deployment {
    let mut c = Composer::new(
        ConfigMap::new()
            .with("REVIEWS_TABLE", REVIEWS)
            .with("FAVOURITES_TABLE", FAVOURITES),
    );

    let reviews = c
        .table(
            REVIEWS,
            KeyAttribute::number("movieId"),
            Some(KeyAttribute::string("reviewDate")),
        )
        .unwrap();
    c.index(reviews, "rvrName", KeyAttribute::string("reviewerName"), None)
        .unwrap();
    let favourites = c
        .table(FAVOURITES, KeyAttribute::number("movieId"), None)
        .unwrap();

    let get_reviews = c
        .binding(
            "get-reviews-by-movie-id",
            "handlers/get-reviews",
            ConfigMap::new(),
            &["REVIEWS_TABLE"],
            Limits::default(),
        )
        .unwrap();
    c.grant(get_reviews, reviews, Capability::Read).unwrap();

    let add_review = c
        .binding(
            "add-review",
            "handlers/add-review",
            ConfigMap::new(),
            &["REVIEWS_TABLE"],
            Limits::default(),
        )
        .unwrap();
    c.grant(add_review, reviews, Capability::ReadWrite).unwrap();

    let update_review = c
        .binding(
            "update-review",
            "handlers/update-review",
            ConfigMap::new(),
            &["REVIEWS_TABLE"],
            Limits::default(),
        )
        .unwrap();
    c.grant(update_review, reviews, Capability::ReadWrite)
        .unwrap();

    let authorize = c
        .binding(
            "request-authorizer",
            "handlers/authorize",
            ConfigMap::new(),
            &[],
            Limits::default(),
        )
        .unwrap();
    let gate = c
        .authorizer("request-auth", "Cookie", authorize, Duration::ZERO)
        .unwrap();

    c.seed(
        "movie-data-v1",
        vec![
            (
                reviews,
                vec![
                    review(42, "2024-01-05", "alice", seed_rating),
                    review(42, "2024-02-10", "bob", 3),
                    review(7, "2024-03-01", "carol", 4),
                ],
            ),
            (favourites, vec![Item::from_value(json!({ "movieId": 42 })).unwrap()]),
        ],
    )
    .unwrap();

    let root = c.root();
    let movies = c.child(root, "movies").unwrap();
    let movie_id = c.child(movies, "{movieId}").unwrap();
    let movie_reviews = c.child(movie_id, "reviews").unwrap();
    c.method(movie_reviews, Verb::Get, Some(get_reviews), AuthRequirement::None)
        .unwrap();
    let reviewer = c.child(movie_reviews, "{reviewerName}").unwrap();
    c.method(
        reviewer,
        Verb::Put,
        Some(update_review),
        AuthRequirement::Custom(gate),
    )
    .unwrap();
    let post_reviews = c.child(movies, "reviews").unwrap();
    c.method(
        post_reviews,
        Verb::Post,
        Some(add_review),
        AuthRequirement::Custom(gate),
    )
    .unwrap();
    let health = c.child(root, "health").unwrap();
    c.method(health, Verb::Get, None, AuthRequirement::None)
        .unwrap();

    c.build().unwrap()
}

struct Counters {
    handler_calls: Arc<AtomicUsize>,
    decider_calls: Arc<AtomicUsize>,
}

impl Counters {
    fn new() -> Self {
        Self {
            handler_calls: Arc::new(AtomicUsize::new(0)),
            decider_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn registry(counters: &Counters) -> HandlerRegistry {
    let get_calls = counters.handler_calls.clone();
    let add_calls = counters.handler_calls.clone();
    let put_calls = counters.handler_calls.clone();
    let decide_calls = counters.decider_calls.clone();

    HandlerRegistry::new()
        .handler("handlers/get-reviews", move |req: Request, store: StoreClient| {
            let calls = get_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let movie_id: i64 = req
                    .path_param("movieId")
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| HandlerError::BadRequest("movieId must be a number".into()))?;
                let items = store
                    .query(REVIEWS, &KeyValue::N(movie_id), &KeyRange::All, None)
                    .await?;
                let body: Vec<Value> = items.into_iter().map(|item| item.to_value()).collect();
                Ok(Response::ok(Value::Array(body)))
            }
        })
        .handler("handlers/add-review", move |req: Request, store: StoreClient| {
            let calls = add_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let body = req.require_body()?.clone();
                let item = Item::from_value(body)
                    .map_err(|e| HandlerError::BadRequest(e.to_string()))?;
                store.put(REVIEWS, item, None).await?;
                Ok(Response::created(json!({ "status": "created" })))
            }
        })
        .handler("handlers/update-review", move |req: Request, store: StoreClient| {
            let calls = put_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let body = req.require_body()?.clone();
                let item = Item::from_value(body)
                    .map_err(|e| HandlerError::BadRequest(e.to_string()))?;
                store
                    .put(REVIEWS, item, Some(WriteCondition::KeyMustExist))
                    .await?;
                Ok(Response::ok(json!({ "status": "updated" })))
            }
        })
        .decider("handlers/authorize", move |credential: String| {
            let calls = decide_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if credential.contains("session=valid") {
                    Ok::<_, HandlerError>(Decision::allow("alice"))
                } else {
                    Ok(Decision::deny("invalid-session"))
                }
            }
        })
}

fn activate(deployment: Deployment, store: Arc<MemoryStore>, counters: &Counters) -> Gateway {
    Gateway::activate(deployment, &registry(counters), store).unwrap()
}

fn call(method: &str, path: &str, cookie: Option<&str>, body: Option<Value>) -> InboundCall {
    let mut headers = HashMap::new();
    if let Some(value) = cookie {
        headers.insert("Cookie".to_string(), value.to_string());
    }
    InboundCall {
        method: method.to_string(),
        path: path.to_string(),
        headers,
        query: HashMap::new(),
        body,
    }
}

#[tokio::test]
async fn test_get_reviews_returns_one_partition_ordered() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);

    let response = gateway.handle(call("GET", "/movies/42/reviews", None, None)).await;
    assert_eq!(response.status, 200);
    let rows = response.body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["reviewDate"], "2024-01-05");
    assert_eq!(rows[1]["reviewDate"], "2024-02-10");
    assert!(rows.iter().all(|r| r["movieId"] == 42));
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway.handle(call("GET", "/actors/42", None, None)).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], "not-found");
}

#[tokio::test]
async fn test_resolved_node_without_methods_is_404() {
    // /movies exists only as a structural intermediate here; it is not an
    // endpoint, so the answer is not-found rather than method-not-allowed.
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway.handle(call("GET", "/movies", None, None)).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], "not-found");
}

#[tokio::test]
async fn test_unbound_verb_is_405_with_allow_header() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway.handle(call("DELETE", "/movies/42/reviews", None, None)).await;
    assert_eq!(response.status, 405);
    let allow = response
        .headers
        .iter()
        .find(|(name, _)| name == "allow")
        .map(|(_, value)| value.as_str());
    assert_eq!(allow, Some("GET,OPTIONS"));
}

#[tokio::test]
async fn test_stub_method_is_501() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway.handle(call("GET", "/health", None, None)).await;
    assert_eq!(response.status, 501);
}

#[tokio::test]
async fn test_preflight_lists_declared_verbs() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway.handle(call("OPTIONS", "/movies/42/reviews", None, None)).await;
    assert_eq!(response.status, 204);
    let methods = response
        .headers
        .iter()
        .find(|(name, _)| name == "access-control-allow-methods")
        .map(|(_, value)| value.as_str());
    assert_eq!(methods, Some("GET,OPTIONS"));
}

#[tokio::test]
async fn test_every_response_is_cors_permissive() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    for request in [
        call("GET", "/movies/42/reviews", None, None),
        call("GET", "/nowhere", None, None),
        call("POST", "/movies/reviews", None, None),
    ] {
        let response = gateway.handle(request).await;
        assert!(response
            .headers
            .iter()
            .any(|(name, value)| name == "access-control-allow-origin" && value == "*"));
    }
}

#[tokio::test]
async fn test_missing_credential_denied_before_handler_or_storage() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let before = gateway.store().item_count(REVIEWS).unwrap();

    let response = gateway
        .handle(call(
            "POST",
            "/movies/reviews",
            None,
            Some(json!({ "movieId": 1, "reviewDate": "2024-06-01" })),
        ))
        .await;

    assert_eq!(response.status, 403);
    assert_eq!(response.body["reason"], "missing-credential");
    assert_eq!(counters.handler_calls.load(Ordering::SeqCst), 0);
    assert_eq!(counters.decider_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.store().item_count(REVIEWS).unwrap(), before);
}

#[tokio::test]
async fn test_rejected_credential_is_403_with_reason() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway
        .handle(call(
            "POST",
            "/movies/reviews",
            Some("session=expired"),
            Some(json!({ "movieId": 1, "reviewDate": "2024-06-01" })),
        ))
        .await;
    assert_eq!(response.status, 403);
    assert_eq!(response.body["reason"], "invalid-session");
    assert_eq!(counters.handler_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_valid_credential_inserts_exactly_one_item() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let before = gateway.store().item_count(REVIEWS).unwrap();

    let response = gateway
        .handle(call(
            "POST",
            "/movies/reviews",
            Some("session=valid"),
            Some(json!({
                "movieId": 42,
                "reviewDate": "2024-06-01",
                "reviewerName": "dave",
                "rating": 2,
            })),
        ))
        .await;

    assert_eq!(response.status, 201);
    assert_eq!(gateway.store().item_count(REVIEWS).unwrap(), before + 1);
    let stored = gateway
        .store()
        .get(REVIEWS, &PrimaryKey::composite(42, "2024-06-01"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("reviewerName"), Some(&json!("dave")));

    // Subsequently visible through the read route.
    let listing = gateway.handle(call("GET", "/movies/42/reviews", None, None)).await;
    assert_eq!(listing.body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_zero_ttl_reinvokes_decider_per_request() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    for _ in 0..3 {
        gateway
            .handle(call(
                "POST",
                "/movies/reviews",
                Some("session=valid"),
                Some(json!({ "movieId": 8, "reviewDate": "2024-06-01" })),
            ))
            .await;
    }
    assert_eq!(counters.decider_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_conditional_update_of_missing_item_is_409() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway
        .handle(call(
            "PUT",
            "/movies/42/reviews/nobody",
            Some("session=valid"),
            Some(json!({ "movieId": 42, "reviewDate": "1999-01-01", "rating": 1 })),
        ))
        .await;
    assert_eq!(response.status, 409);
    assert_eq!(response.body["error"], "conflict");
}

#[tokio::test]
async fn test_conditional_update_of_existing_item_succeeds() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway
        .handle(call(
            "PUT",
            "/movies/42/reviews/alice",
            Some("session=valid"),
            Some(json!({
                "movieId": 42,
                "reviewDate": "2024-01-05",
                "reviewerName": "alice",
                "rating": 1,
            })),
        ))
        .await;
    assert_eq!(response.status, 200);
    let stored = gateway
        .store()
        .get(REVIEWS, &PrimaryKey::composite(42, "2024-01-05"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("rating"), Some(&json!(1)));
}

#[tokio::test]
async fn test_bad_path_param_is_400() {
    let counters = Counters::new();
    let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
    let response = gateway.handle(call("GET", "/movies/not-a-number/reviews", None, None)).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "bad-request");
}

#[tokio::test]
async fn test_seed_rerun_with_same_content_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let counters = Counters::new();
    let first = activate(compose(5), store.clone(), &counters);
    let count = first.store().item_count(REVIEWS).unwrap();
    assert_eq!(count, 3);

    // Second activation over the same store: same stable id, same content.
    let second = activate(compose(5), store, &counters);
    assert_eq!(second.store().item_count(REVIEWS).unwrap(), count);
    assert_eq!(second.store().item_count(FAVOURITES).unwrap(), 1);
}

#[tokio::test]
async fn test_seed_with_changed_content_reapplies_without_duplicating() {
    let store = Arc::new(MemoryStore::new());
    let counters = Counters::new();
    activate(compose(5), store.clone(), &counters);

    // Same stable id, changed rating: re-applied, overwriting by key.
    let gateway = activate(compose(1), store, &counters);
    assert_eq!(gateway.store().item_count(REVIEWS).unwrap(), 3);
    let stored = gateway
        .store()
        .get(REVIEWS, &PrimaryKey::composite(42, "2024-01-05"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("rating"), Some(&json!(1)));
}

#[tokio::test]
async fn test_handler_exceeding_grants_is_500_not_403() {
    // A read-granted binding whose handler attempts a write: the denial is a
    // composition bug, surfaced as a generic 500.
    let mut c = Composer::new(ConfigMap::new());
    let reviews = c
        .table(
            REVIEWS,
            KeyAttribute::number("movieId"),
            Some(KeyAttribute::string("reviewDate")),
        )
        .unwrap();
    let sneaky = c
        .binding("report-stats", "handlers/sneaky-write", ConfigMap::new(), &[], Limits::default())
        .unwrap();
    c.grant(sneaky, reviews, Capability::Read).unwrap();
    let root = c.root();
    let stats = c.child(root, "stats").unwrap();
    c.method(stats, Verb::Get, Some(sneaky), AuthRequirement::None)
        .unwrap();
    let deployment = c.build().unwrap();

    let registry = HandlerRegistry::new().handler(
        "handlers/sneaky-write",
        |_req: Request, store: StoreClient| async move {
            store
                .put(REVIEWS, review_item(), None)
                .await?;
            Ok::<_, HandlerError>(Response::ok(json!({})))
        },
    );
    let store = Arc::new(MemoryStore::new());
    let gateway = Gateway::activate(deployment, &registry, store).unwrap();

    let response = gateway.handle(call("GET", "/stats", None, None)).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body["error"], "internal-error");
    assert_eq!(gateway.store().item_count(REVIEWS).unwrap(), 0);
}

fn review_item() -> Item {
    review(1, "2024-01-01", "eve", 5)
}

#[tokio::test]
async fn test_unresolved_entry_fails_activation() {
    let mut c = Composer::new(ConfigMap::new());
    let reviews = c
        .table(REVIEWS, KeyAttribute::number("movieId"), None)
        .unwrap();
    let orphan = c
        .binding("orphan", "handlers/nowhere", ConfigMap::new(), &[], Limits::default())
        .unwrap();
    c.grant(orphan, reviews, Capability::Read).unwrap();
    let root = c.root();
    let node = c.child(root, "orphan").unwrap();
    c.method(node, Verb::Get, Some(orphan), AuthRequirement::None)
        .unwrap();
    let deployment = c.build().unwrap();

    let error = Gateway::activate(
        deployment,
        &HandlerRegistry::new(),
        Arc::new(MemoryStore::new()),
    )
    .unwrap_err();
    assert!(matches!(
        error,
        portico_gateway::ActivationError::UnresolvedEntry { kind: "handler", .. }
    ));
}

mod over_http {
    //! The same pipeline through the axum adapter.

    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_get_reviews_over_http() {
        let counters = Counters::new();
        let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
        let app = portico_gateway::serve::router(Arc::new(gateway));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("GET")
                    .uri("/movies/42/reviews")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let rows: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_gated_post_over_http_with_cookie() {
        let counters = Counters::new();
        let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
        let app = portico_gateway::serve::router(Arc::new(gateway));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/movies/reviews")
                    .header("cookie", "session=valid")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "movieId": 11, "reviewDate": "2024-07-01" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_malformed_json_body_over_http_is_400() {
        let counters = Counters::new();
        let gateway = activate(compose(5), Arc::new(MemoryStore::new()), &counters);
        let app = portico_gateway::serve::router(Arc::new(gateway));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/movies/reviews")
                    .header("cookie", "session=valid")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
