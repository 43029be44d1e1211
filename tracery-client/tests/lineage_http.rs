//! End-to-end tests against a mock lineage service.
//!
//! Exercises the full path: submit over HTTP, poll the returned handle until
//! the computation finishes, merge the results into the session graph, lay it
//! out, and clean the server-side computation up.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tracery_client::{Error, HttpLineageApi, LineageSession, PollBackoff, SessionUpdate};

fn fast_backoff() -> PollBackoff {
    PollBackoff {
        initial_delay: Duration::from_millis(10),
        multiplier: 2,
        max_delay: Duration::from_millis(40),
    }
}

fn node(id: &str, event_type: &str, uuid: &str, millis: i64) -> Value {
    json!({
        "id": id,
        "type": "EVENT",
        "eventType": event_type,
        "flowFileUuid": uuid,
        "timestamp": "08/28/2026 12:00:00",
        "millis": millis,
    })
}

fn lineage_body(uri: &str, percent: u32, finished: bool, results: Value) -> Value {
    json!({
        "lineage": {
            "uri": uri,
            "percentCompleted": percent,
            "finished": finished,
            "results": results,
        }
    })
}

async fn session_for(server: &MockServer) -> LineageSession<HttpLineageApi> {
    let api = HttpLineageApi::new(&server.uri()).expect("client build");
    LineageSession::new(Arc::new(api)).with_backoff(fast_backoff())
}

#[tokio::test]
async fn show_lineage_polls_merges_and_cleans_up() {
    let server = MockServer::start().await;
    let handle = format!("{}/provenance/lineage/q1", server.uri());

    Mock::given(method("POST"))
        .and(path("/provenance/lineage"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(lineage_body(&handle, 0, false, json!({}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    // First poll in progress, second poll finished with a two-node chain.
    Mock::given(method("GET"))
        .and(path("/provenance/lineage/q1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(lineage_body(&handle, 40, false, json!({}))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/provenance/lineage/q1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lineage_body(
            &handle,
            100,
            true,
            json!({
                "nodes": [
                    node("A", "CREATE", "ff-1", 1000),
                    node("B", "SEND", "ff-1", 2000),
                ],
                "links": [
                    {"sourceId": "A", "targetId": "B", "flowFileUuid": "ff-1", "millis": 2000}
                ],
            }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/provenance/lineage/q1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server).await;
    let update = session
        .show_lineage("ff-1", CancellationToken::new())
        .await
        .expect("lineage query");

    let layout = match update {
        SessionUpdate::Updated(layout) => layout,
        other => panic!("unexpected update: {:?}", other),
    };

    assert_eq!(session.graph().node_count(), 2);
    assert_eq!(session.graph().link_count(), 1);
    assert_eq!(layout.position("A").expect("A placed").y, 50.0);
    assert_eq!(layout.position("B").expect("B placed").y, 90.0);
    assert_eq!(
        layout.position("A").expect("A placed").x,
        layout.position("B").expect("B placed").x
    );
}

#[tokio::test]
async fn server_reported_errors_fail_the_query_and_still_clean_up() {
    let server = MockServer::start().await;
    let handle = format!("{}/provenance/lineage/q2", server.uri());

    Mock::given(method("POST"))
        .and(path("/provenance/lineage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lineage_body(
            &handle,
            100,
            true,
            json!({"errors": ["boom"]}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/provenance/lineage/q2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server).await;
    let err = session
        .show_lineage("ff-1", CancellationToken::new())
        .await
        .expect_err("errors must fail the query");

    match err {
        Error::Computation(errors) => assert_eq!(errors, vec!["boom".to_string()]),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(session.graph().is_empty());
}

#[tokio::test]
async fn transport_failures_surface_as_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/provenance/lineage"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server).await;
    let err = session
        .show_lineage("ff-1", CancellationToken::new())
        .await
        .expect_err("500 must fail the query");

    assert!(matches!(err, Error::Transport(_)));
    assert!(session.graph().is_empty());
}

#[tokio::test]
async fn collapse_fetches_event_detail_and_removes_the_branch() {
    let server = MockServer::start().await;
    let handle = format!("{}/provenance/lineage/q3", server.uri());

    // A FORK on ff-1 spawning ff-2; the deeper ff-2 event collapses away.
    let mut child = node("C", "RECEIVE", "ff-2", 3000);
    child["parentUuids"] = json!(["ff-1"]);

    Mock::given(method("POST"))
        .and(path("/provenance/lineage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lineage_body(
            &handle,
            100,
            true,
            json!({
                "nodes": [
                    node("A", "CREATE", "ff-1", 1000),
                    node("B", "FORK", "ff-1", 2000),
                    child,
                    node("D", "DROP", "ff-2", 4000),
                ],
                "links": [
                    {"sourceId": "A", "targetId": "B", "flowFileUuid": "ff-1", "millis": 2000},
                    {"sourceId": "B", "targetId": "C", "flowFileUuid": "ff-2", "millis": 3000},
                    {"sourceId": "C", "targetId": "D", "flowFileUuid": "ff-2", "millis": 4000},
                ],
            }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/provenance/lineage/q3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/provenance/events/B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provenanceEvent": {
                "id": "B",
                "flowFileUuid": "ff-1",
                "childUuids": ["ff-2"],
                "eventType": "FORK",
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server).await;
    session
        .show_lineage("ff-1", CancellationToken::new())
        .await
        .expect("lineage query");
    assert_eq!(session.graph().node_count(), 4);

    let update = session.collapse("B").await.expect("collapse");

    assert!(matches!(update, SessionUpdate::Updated(_)));
    assert!(session.graph().node("A").is_some());
    assert!(session.graph().node("B").is_some());
    assert!(session.graph().node("C").is_some());
    assert!(session.graph().node("D").is_none());
}

#[tokio::test]
async fn submit_sends_the_expected_request_body() {
    let server = MockServer::start().await;
    let handle = format!("{}/provenance/lineage/q4", server.uri());

    let expected = json!({
        "lineageRequestType": "FLOWFILE",
        "uuid": "ff-1",
    });
    Mock::given(method("POST"))
        .and(path("/provenance/lineage"))
        .and(body_json_string(expected.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(lineage_body(
            &handle,
            100,
            true,
            json!({}),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/provenance/lineage/q4"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut session = session_for(&server).await;
    let update = session
        .show_lineage("ff-1", CancellationToken::new())
        .await
        .expect("lineage query");

    assert_eq!(update, SessionUpdate::NoResults);
}
