//! HTTP 客户端集成测试（mockito）

use assert_matches::assert_matches;
use mockito::{Matcher, Server};
use practice_queue_lib::clients::{
    ConceptFrontierClient, DrillGeneratorClient, HttpPracticeClient, ReviewSubmissionClient,
};
use practice_queue_lib::practice::types::{
    Attempt, DrillRequest, Rating, ReviewMetadata, ReviewSubmission,
};
use practice_queue_lib::practice::{PracticeConfig, PracticeError};
use serde_json::json;

fn client_for(server: &Server) -> HttpPracticeClient {
    let config = PracticeConfig {
        api_base_url: format!("{}/api", server.url()),
        api_token: Some("test-token".to_string()),
        frontier_retry_attempts: 3,
        frontier_retry_initial_delay_ms: 1,
        ..Default::default()
    };
    HttpPracticeClient::new(&config).expect("client")
}

#[tokio::test]
async fn test_fetch_frontier_parses_all_lists() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/concepts/frontier")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "dueForReview": [{"conceptId": "c1", "title": "Fractions"}],
                "frontier": [{"id": "c2"}],
                "coming_soon": [{"concept_id": "c3"}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let frontier = client_for(&server).fetch_concept_frontier().await.unwrap();
    assert_eq!(frontier.due_for_review.len(), 1);
    assert_eq!(frontier.frontier.len(), 1);
    assert_eq!(frontier.coming_soon.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_frontier_retries_transient_failures() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/concepts/frontier")
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(3)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_concept_frontier()
        .await
        .unwrap_err();
    assert_matches!(err, PracticeError::Http { status: 503, .. });
    mock.assert_async().await;
}

#[tokio::test]
async fn test_frontier_does_not_retry_client_errors() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/concepts/frontier")
        .with_status(404)
        .with_body("not found")
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_concept_frontier()
        .await
        .unwrap_err();
    assert_matches!(err, PracticeError::Http { status: 404, ref endpoint, .. } if endpoint == "concepts/frontier");
    assert!(!err.is_transient());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_drills_posts_request_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/practice/drills")
        .match_body(Matcher::Json(json!({"conceptId": "c1", "count": 4})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "drills": [
                    {"question": "2 + 3 = ?", "expectedAnswer": "5", "structureSignature": "add"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let batch = client_for(&server)
        .fetch_practice_drills(&DrillRequest {
            concept_id: "c1".to_string(),
            count: 4,
        })
        .await
        .unwrap();
    assert_eq!(batch.drills.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_drill_generation_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/practice/drills")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let result = client_for(&server)
        .fetch_practice_drills(&DrillRequest {
            concept_id: "c1".to_string(),
            count: 1,
        })
        .await;
    assert_matches!(result, Err(PracticeError::Http { status: 500, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_submit_review_wraps_singleton_batch() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/reviews")
        .match_body(Matcher::Json(json!({
            "reviews": [{
                "conceptId": "c1",
                "lessonId": "L1",
                "rating": 3,
                "reviewDurationMs": 2500,
                "attempt": "graded",
                "question": "2 + 3 = ?",
                "structureSignature": "add",
                "predictedPCorrect": 0.5,
                "coreModel": "core-v1"
            }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "outcomes": [
                    {"conceptId": "c1", "mastery": 0.72, "nextReviewAt": "2026-10-21", "exposures": 5}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let submission = ReviewSubmission {
        concept_id: "c1".to_string(),
        lesson_id: Some("L1".to_string()),
        rating: Rating::Good,
        review_duration_ms: 2500,
        attempt: Attempt::Graded { answer: None },
        metadata: ReviewMetadata {
            question: "2 + 3 = ?".to_string(),
            structure_signature: "add".to_string(),
            predicted_p_correct: 0.5,
            core_model: "core-v1".to_string(),
        },
    };

    let response = client_for(&server)
        .submit_review(std::slice::from_ref(&submission))
        .await
        .unwrap();
    let outcomes = response.normalized();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].mastery, Some(0.72));
    assert_eq!(outcomes[0].exposures, Some(5));
    assert!(outcomes[0].next_review_at.is_some());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body_is_serialization_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/reviews")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let result = client_for(&server).submit_review(&[]).await;
    assert_matches!(result, Err(PracticeError::Serialization(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let config = PracticeConfig {
        api_base_url: "http://127.0.0.1:9/api".to_string(),
        frontier_retry_attempts: 1,
        request_timeout_ms: 2_000,
        ..Default::default()
    };
    let client = HttpPracticeClient::new(&config).unwrap();
    let err = client
        .fetch_practice_drills(&DrillRequest {
            concept_id: "c1".to_string(),
            count: 1,
        })
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.code(), "NETWORK_ERROR");
}
