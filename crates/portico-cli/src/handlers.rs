//! # Reference Handlers
//!
//! The runtime behavior behind each compute binding in the reference
//! deployment. Every handler goes through its grant-scoped `StoreClient`;
//! a handler that reached for a table it was not granted would get
//! `AccessDenied` no matter what it tried.
//!
//! The authorizer decider is a deliberately simple session check standing
//! in for a real identity provider: the `session` cookie value is the
//! principal, and the literal value `expired` is refused.

use serde_json::{json, Value};

use portico_core::{Item, KeyValue};
use portico_gateway::{Decision, HandlerError, HandlerRegistry, Request, Response};
use portico_store::{KeyRange, StoreClient, WriteCondition};

use crate::movies::{FAVOURITES_TABLE, REVIEWER_INDEX, REVIEWS_TABLE};

/// Entry strings, shared between composition and registration.
pub const GET_REVIEWS_BY_MOVIE: &str = "handlers/get-reviews-by-movie-id";
pub const GET_REVIEWS_BY_REVIEWER: &str = "handlers/get-reviews-by-reviewer";
pub const GET_REVIEWS_BY_MOVIE_AND_REVIEWER: &str = "handlers/get-reviews-by-movie-and-reviewer";
pub const ADD_REVIEW: &str = "handlers/add-review";
pub const ADD_FAVOURITE: &str = "handlers/add-favourite";
pub const UPDATE_REVIEW: &str = "handlers/update-review";
pub const GET_REVIEW_TRANSLATION: &str = "handlers/get-review-translation";
pub const AUTHORIZE: &str = "handlers/authorize";

/// Every reference handler and decider, keyed by entry string.
pub fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .handler(GET_REVIEWS_BY_MOVIE, get_reviews_by_movie)
        .handler(GET_REVIEWS_BY_REVIEWER, get_reviews_by_reviewer)
        .handler(
            GET_REVIEWS_BY_MOVIE_AND_REVIEWER,
            get_reviews_by_movie_and_reviewer,
        )
        .handler(ADD_REVIEW, add_review)
        .handler(ADD_FAVOURITE, add_favourite)
        .handler(UPDATE_REVIEW, update_review)
        .handler(GET_REVIEW_TRANSLATION, get_review_translation)
        .decider(AUTHORIZE, authorize)
}

fn movie_id_param(req: &Request) -> Result<i64, HandlerError> {
    req.path_param("movieId")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| HandlerError::BadRequest("movieId must be a number".into()))
}

fn reviewer_param(req: &Request) -> Result<String, HandlerError> {
    req.path_param("reviewerName")
        .map(str::to_string)
        .ok_or_else(|| HandlerError::Internal("route did not capture reviewerName".into()))
}

fn listing(items: Vec<Item>) -> Response {
    Response::ok(Value::Array(
        items.into_iter().map(|item| item.to_value()).collect(),
    ))
}

/// GET /movies/{movieId}/reviews — one partition, ordered by review date.
async fn get_reviews_by_movie(req: Request, store: StoreClient) -> Result<Response, HandlerError> {
    let movie_id = movie_id_param(&req)?;
    let items = store
        .query(REVIEWS_TABLE, &KeyValue::N(movie_id), &KeyRange::All, None)
        .await?;
    Ok(listing(items))
}

/// GET /reviews/{reviewerName} — cross-movie read through the secondary
/// index.
async fn get_reviews_by_reviewer(
    req: Request,
    store: StoreClient,
) -> Result<Response, HandlerError> {
    let reviewer = reviewer_param(&req)?;
    let items = store
        .query(
            REVIEWS_TABLE,
            &KeyValue::S(reviewer),
            &KeyRange::All,
            Some(REVIEWER_INDEX),
        )
        .await?;
    Ok(listing(items))
}

/// GET /movies/{movieId}/reviews/{reviewerName} — the partition read,
/// narrowed to one reviewer.
async fn get_reviews_by_movie_and_reviewer(
    req: Request,
    store: StoreClient,
) -> Result<Response, HandlerError> {
    let movie_id = movie_id_param(&req)?;
    let reviewer = reviewer_param(&req)?;
    let items = store
        .query(REVIEWS_TABLE, &KeyValue::N(movie_id), &KeyRange::All, None)
        .await?;
    let matching: Vec<Item> = items
        .into_iter()
        .filter(|item| item.get("reviewerName") == Some(&json!(reviewer)))
        .collect();
    if matching.is_empty() {
        return Ok(Response::not_found());
    }
    Ok(listing(matching))
}

/// POST /movies/reviews — gated insert.
async fn add_review(req: Request, store: StoreClient) -> Result<Response, HandlerError> {
    let body = req.require_body()?.clone();
    let item = Item::from_value(body).map_err(|e| HandlerError::BadRequest(e.to_string()))?;
    store.put(REVIEWS_TABLE, item, None).await?;
    Ok(Response::created(json!({ "status": "created" })))
}

/// POST /movies/favourites — gated insert keyed by movie alone.
async fn add_favourite(req: Request, store: StoreClient) -> Result<Response, HandlerError> {
    let body = req.require_body()?.clone();
    let item = Item::from_value(body).map_err(|e| HandlerError::BadRequest(e.to_string()))?;
    store.put(FAVOURITES_TABLE, item, None).await?;
    Ok(Response::created(json!({ "status": "created" })))
}

/// PUT /movies/{movieId}/reviews/{reviewerName} — gated conditional
/// overwrite. Path parameters win over whatever the body claims, and the
/// target row must already exist.
async fn update_review(req: Request, store: StoreClient) -> Result<Response, HandlerError> {
    let movie_id = movie_id_param(&req)?;
    let reviewer = reviewer_param(&req)?;
    let mut body = req.require_body()?.clone();
    let Some(fields) = body.as_object_mut() else {
        return Err(HandlerError::BadRequest("body must be an object".into()));
    };
    fields.insert("movieId".into(), json!(movie_id));
    fields.insert("reviewerName".into(), json!(reviewer));

    let item = Item::from_value(body).map_err(|e| HandlerError::BadRequest(e.to_string()))?;
    store
        .put(REVIEWS_TABLE, item, Some(WriteCondition::KeyMustExist))
        .await?;
    Ok(Response::ok(json!({ "status": "updated" })))
}

/// GET /reviews/{reviewerName}/{movieId}/translation — one reviewer's review
/// of one movie, with its content rendered in the requested `language` query
/// parameter (defaulting to `en`). The translation itself is a stand-in for
/// an external translation service.
async fn get_review_translation(
    req: Request,
    store: StoreClient,
) -> Result<Response, HandlerError> {
    let movie_id = movie_id_param(&req)?;
    let reviewer = reviewer_param(&req)?;
    let language = req
        .query
        .get("language")
        .cloned()
        .unwrap_or_else(|| "en".to_string());
    let items = store
        .query(REVIEWS_TABLE, &KeyValue::N(movie_id), &KeyRange::All, None)
        .await?;
    let Some(found) = items
        .into_iter()
        .find(|item| item.get("reviewerName") == Some(&json!(reviewer)))
    else {
        return Ok(Response::not_found());
    };
    let content = found
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(Response::ok(json!({
        "movieId": movie_id,
        "reviewerName": reviewer,
        "language": language,
        "translation": content,
    })))
}

/// The authorizer's decision binding.
async fn authorize(credential: String) -> Result<Decision, HandlerError> {
    match session_value(&credential) {
        Some("expired") | None => Ok(Decision::deny("invalid-session")),
        Some(principal) => Ok(Decision::allow(principal)),
    }
}

/// The `session` value out of a cookie header.
fn session_value(cookie: &str) -> Option<&str> {
    cookie
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("session="))
        .filter(|value| !value.is_empty())
}
