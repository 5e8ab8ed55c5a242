//! Sessions over the non-streaming HTTP transport.

mod server;

use std::time::Duration;

use axum::http::StatusCode;
use playground::controller::SessionController;
use playground::core::session::{SessionEvent, SessionState, TRANSPORT_FAILURE};
use playground::io::transport::HttpConnector;
use playground::test_support::{RecordingObserver, main_only};
use url::Url;

use server::Script;

fn controller_for(url: &Url) -> SessionController<HttpConnector> {
    SessionController::new(
        HttpConnector::new(url, Some(Duration::from_secs(5))).expect("connector"),
    )
}

#[tokio::test]
async fn response_becomes_output_then_completion() {
    let server = server::spawn(Script::http(
        StatusCode::OK,
        r#"{"output":"5\n","files":[{"id":"srv-1","name":"main.dingle","type":"file","content":"print 5;"}]}"#,
    ))
    .await;
    let mut controller = controller_for(&server.url());
    let observer = RecordingObserver::default();

    controller.start(main_only("print 5;"), observer.clone());
    assert_eq!(controller.wait().await, Some(SessionState::Completed));

    let events = observer.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], SessionEvent::Output("5\n".to_string()));
    assert!(matches!(&events[1], SessionEvent::Completed(tree) if tree.len() == 1));
    assert!(server.received()[0].starts_with(r#"{"files":["#));
}

#[tokio::test]
async fn empty_output_skips_output_event() {
    let server = server::spawn(Script::http(
        StatusCode::OK,
        r#"{"output":"","files":[]}"#,
    ))
    .await;
    let mut controller = controller_for(&server.url());
    let observer = RecordingObserver::default();

    controller.start(main_only(""), observer.clone());
    assert_eq!(controller.wait().await, Some(SessionState::Completed));
    assert_eq!(
        observer.events(),
        vec![SessionEvent::Completed(Default::default())]
    );
}

#[tokio::test]
async fn server_error_status_fails_the_session() {
    let server = server::spawn(Script::http(StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;
    let mut controller = controller_for(&server.url());
    let observer = RecordingObserver::default();

    controller.start(main_only(""), observer.clone());
    assert_eq!(controller.wait().await, Some(SessionState::Failed));
    assert_eq!(
        observer.events(),
        vec![SessionEvent::Failed(
            "Server Error: Internal Server Error".to_string()
        )]
    );
}

#[tokio::test]
async fn unparseable_body_is_a_transport_failure() {
    let server = server::spawn(Script::http(StatusCode::OK, "<html>")).await;
    let mut controller = controller_for(&server.url());
    let observer = RecordingObserver::default();

    controller.start(main_only(""), observer.clone());
    assert_eq!(controller.wait().await, Some(SessionState::Failed));
    assert_eq!(
        observer.events(),
        vec![SessionEvent::Failed(TRANSPORT_FAILURE.to_string())]
    );
}
