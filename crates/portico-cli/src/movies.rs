//! # The Reference Movie-Review Composition
//!
//! Two tables, seven route-bound compute bindings plus one authorizer
//! decision binding, seed data under a single stable id, and a route tree
//! with open reads, cookie-gated writes, and integration-less collection
//! GETs declared as stubs. The authorizer's cache TTL is
//! zero: a revoked session is refused on the very next request.

use std::time::Duration;

use serde_json::json;

use anyhow::Result;

use portico_compose::{AuthRequirement, Composer, Deployment, Limits, Verb};
use portico_core::{Capability, ConfigMap, Item, ItemError, KeyAttribute};

use crate::handlers;

/// Review storage: partition `movieId` (N), sort `reviewDate` (S).
pub const REVIEWS_TABLE: &str = "movieReviews";
/// Secondary index over `reviewerName` (S) for by-reviewer reads.
pub const REVIEWER_INDEX: &str = "rvrName";
/// Favourites storage: partition `movieId` (N), no sort key.
pub const FAVOURITES_TABLE: &str = "favouriteMovies";

/// The header carrying the session credential.
pub const IDENTITY_HEADER: &str = "cookie";

fn review(movie_id: i64, date: &str, reviewer: &str, rating: i64, content: &str) -> Result<Item, ItemError> {
    Item::from_value(json!({
        "movieId": movie_id,
        "reviewDate": date,
        "reviewerName": reviewer,
        "rating": rating,
        "content": content,
    }))
}

fn seed_reviews() -> Result<Vec<Item>, ItemError> {
    Ok(vec![
        review(1234, "2023-10-20", "Joe Bloggs", 5, "Great movie")?,
        review(1234, "2023-10-23", "Alice Broggs", 4, "Good movie")?,
        review(2345, "2023-10-02", "Joe Bloggs", 3, "Average movie")?,
    ])
}

fn seed_favourites() -> Result<Vec<Item>, ItemError> {
    Ok(vec![Item::from_value(json!({ "movieId": 1234 }))?])
}

/// Compose the reference deployment.
pub fn compose() -> Result<Deployment> {
    let mut c = Composer::new(
        ConfigMap::new()
            .with("REVIEWS_TABLE", REVIEWS_TABLE)
            .with("FAVOURITES_TABLE", FAVOURITES_TABLE),
    );

    let reviews = c.table(
        REVIEWS_TABLE,
        KeyAttribute::number("movieId"),
        Some(KeyAttribute::string("reviewDate")),
    )?;
    c.index(
        reviews,
        REVIEWER_INDEX,
        KeyAttribute::string("reviewerName"),
        None,
    )?;
    let favourites = c.table(FAVOURITES_TABLE, KeyAttribute::number("movieId"), None)?;

    let get_by_movie = c.binding(
        "get-reviews-by-movie-id",
        handlers::GET_REVIEWS_BY_MOVIE,
        ConfigMap::new(),
        &["REVIEWS_TABLE"],
        Limits::default(),
    )?;
    c.grant(get_by_movie, reviews, Capability::Read)?;

    let get_by_reviewer = c.binding(
        "get-reviews-by-reviewer",
        handlers::GET_REVIEWS_BY_REVIEWER,
        ConfigMap::new(),
        &["REVIEWS_TABLE"],
        Limits::default(),
    )?;
    c.grant(get_by_reviewer, reviews, Capability::Read)?;

    let get_by_both = c.binding(
        "get-reviews-by-movie-and-reviewer",
        handlers::GET_REVIEWS_BY_MOVIE_AND_REVIEWER,
        ConfigMap::new(),
        &["REVIEWS_TABLE"],
        Limits::default(),
    )?;
    c.grant(get_by_both, reviews, Capability::Read)?;

    let add_review = c.binding(
        "add-review",
        handlers::ADD_REVIEW,
        ConfigMap::new(),
        &["REVIEWS_TABLE"],
        Limits::default(),
    )?;
    c.grant(add_review, reviews, Capability::ReadWrite)?;

    let add_favourite = c.binding(
        "add-favourite",
        handlers::ADD_FAVOURITE,
        ConfigMap::new(),
        &["FAVOURITES_TABLE"],
        Limits::default(),
    )?;
    c.grant(add_favourite, favourites, Capability::ReadWrite)?;

    let update_review = c.binding(
        "update-review",
        handlers::UPDATE_REVIEW,
        ConfigMap::new(),
        &["REVIEWS_TABLE"],
        Limits::default(),
    )?;
    c.grant(update_review, reviews, Capability::ReadWrite)?;

    let get_translation = c.binding(
        "get-review-translation",
        handlers::GET_REVIEW_TRANSLATION,
        ConfigMap::new(),
        &["REVIEWS_TABLE"],
        Limits::default(),
    )?;
    c.grant(get_translation, reviews, Capability::Read)?;

    let authorize = c.binding(
        "request-authorizer",
        handlers::AUTHORIZE,
        ConfigMap::new(),
        &[],
        Limits::default(),
    )?;
    let gate = c.authorizer("request-auth", IDENTITY_HEADER, authorize, Duration::ZERO)?;

    c.seed(
        "movie-data-v1",
        vec![
            (reviews, seed_reviews()?),
            (favourites, seed_favourites()?),
        ],
    )?;

    // /movies/{movieId}/reviews[/{reviewerName}]. The collection-level GETs
    // are declared stubs with no integration, mirroring the exposed surface.
    let root = c.root();
    let movies = c.child(root, "movies")?;
    c.method(movies, Verb::Get, None, AuthRequirement::None)?;
    let movie_id = c.child(movies, "{movieId}")?;
    c.method(movie_id, Verb::Get, None, AuthRequirement::None)?;
    let movie_reviews = c.child(movie_id, "reviews")?;
    c.method(movie_reviews, Verb::Get, Some(get_by_movie), AuthRequirement::None)?;
    let by_reviewer = c.child(movie_reviews, "{reviewerName}")?;
    c.method(by_reviewer, Verb::Get, Some(get_by_both), AuthRequirement::None)?;
    c.method(
        by_reviewer,
        Verb::Put,
        Some(update_review),
        AuthRequirement::Custom(gate),
    )?;

    // /movies/reviews, /movies/favourites — gated writes
    let post_reviews = c.child(movies, "reviews")?;
    c.method(
        post_reviews,
        Verb::Post,
        Some(add_review),
        AuthRequirement::Custom(gate),
    )?;
    let post_favourites = c.child(movies, "favourites")?;
    c.method(
        post_favourites,
        Verb::Post,
        Some(add_favourite),
        AuthRequirement::Custom(gate),
    )?;

    // /reviews/{reviewerName}[/{movieId}/translation] — cross-movie reads
    let all_reviews = c.child(root, "reviews")?;
    c.method(all_reviews, Verb::Get, None, AuthRequirement::None)?;
    let reviewer_root = c.child(all_reviews, "{reviewerName}")?;
    c.method(
        reviewer_root,
        Verb::Get,
        Some(get_by_reviewer),
        AuthRequirement::None,
    )?;
    let reviewer_movie = c.child(reviewer_root, "{movieId}")?;
    let translation = c.child(reviewer_movie, "translation")?;
    c.method(
        translation,
        Verb::Get,
        Some(get_translation),
        AuthRequirement::None,
    )?;

    Ok(c.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use portico_gateway::{Gateway, InboundCall};
    use portico_store::MemoryStore;

    #[test]
    fn test_reference_deployment_builds() {
        let deployment = compose().unwrap();
        assert_eq!(deployment.tables().len(), 2);
        assert_eq!(deployment.bindings().len(), 8);
        assert_eq!(deployment.authorizers().len(), 1);

        let paths: Vec<String> = deployment
            .routes()
            .routes()
            .iter()
            .map(|entry| format!("{} {}", entry.verb, entry.path))
            .collect();
        assert!(paths.contains(&"GET /movies/{movieId}/reviews".to_string()));
        assert!(paths.contains(&"PUT /movies/{movieId}/reviews/{reviewerName}".to_string()));
        assert!(paths.contains(&"POST /movies/reviews".to_string()));
        assert!(paths.contains(&"POST /movies/favourites".to_string()));
        assert!(paths.contains(&"GET /reviews/{reviewerName}".to_string()));
        assert!(
            paths.contains(&"GET /reviews/{reviewerName}/{movieId}/translation".to_string())
        );
    }

    #[test]
    fn test_collection_gets_are_declared_stubs() {
        let deployment = compose().unwrap();
        let stubs: Vec<String> = deployment
            .routes()
            .routes()
            .into_iter()
            .filter(|entry| entry.binding.is_none())
            .map(|entry| format!("{} {}", entry.verb, entry.path))
            .collect();
        // Depth-first listing order: literals under /movies first, then the
        // wildcard, then /reviews.
        assert_eq!(
            stubs,
            vec!["GET /movies", "GET /movies/{movieId}", "GET /reviews"]
        );
    }

    #[test]
    fn test_gated_routes_reference_the_cookie_authorizer() {
        let deployment = compose().unwrap();
        let gate = &deployment.authorizers()[0];
        assert_eq!(gate.identity_header, IDENTITY_HEADER);
        assert_eq!(gate.cache_ttl, Duration::ZERO);

        let gated: Vec<_> = deployment
            .routes()
            .routes()
            .into_iter()
            .filter(|entry| entry.authorizer.is_some())
            .map(|entry| format!("{} {}", entry.verb, entry.path))
            .collect();
        assert_eq!(
            gated,
            vec![
                "POST /movies/favourites",
                "POST /movies/reviews",
                "PUT /movies/{movieId}/reviews/{reviewerName}",
            ]
        );
    }

    #[tokio::test]
    async fn test_every_entry_resolves_at_activation() {
        let gateway = Gateway::activate(
            compose().unwrap(),
            &handlers::registry(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        assert_eq!(gateway.store().item_count(REVIEWS_TABLE).unwrap(), 3);
        assert_eq!(gateway.store().item_count(FAVOURITES_TABLE).unwrap(), 1);
    }

    fn activated() -> Gateway {
        Gateway::activate(
            compose().unwrap(),
            &handlers::registry(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
    }

    fn get(path: &str, query: &[(&str, &str)]) -> InboundCall {
        InboundCall {
            method: "GET".into(),
            path: path.into(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..InboundCall::default()
        }
    }

    #[tokio::test]
    async fn test_translation_route_reads_seeded_review() {
        let gateway = activated();
        let response = gateway
            .handle(get(
                "/reviews/Joe Bloggs/1234/translation",
                &[("language", "fr")],
            ))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["reviewerName"], "Joe Bloggs");
        assert_eq!(response.body["movieId"], 1234);
        assert_eq!(response.body["language"], "fr");
        assert_eq!(response.body["translation"], "Great movie");
    }

    #[tokio::test]
    async fn test_translation_for_unknown_review_is_404() {
        let gateway = activated();
        let response = gateway
            .handle(get("/reviews/Joe Bloggs/9999/translation", &[]))
            .await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_collection_gets_answer_as_not_implemented() {
        let gateway = activated();
        for path in ["/movies", "/movies/1234", "/reviews"] {
            let response = gateway.handle(get(path, &[])).await;
            assert_eq!(response.status, 501, "{path}");
        }
    }
}
