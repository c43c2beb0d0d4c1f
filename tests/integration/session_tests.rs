//! HttpSession against a mock server

use schoolscrape::config::SessionConfig;
use schoolscrape::downloader::{HttpSession, PageError, Session};
use schoolscrape::ScrapeError;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> SessionConfig {
    SessionConfig {
        retries: 2,
        backoff_ms: 1,
        user_agents: vec!["first-agent".into(), "second-agent".into()],
        ..SessionConfig::default()
    }
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_retries_bad_gateway_then_loads() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/school"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/school"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = HttpSession::new(config()).unwrap();
    let document = session.load(&url(&server, "/school"), None).await.unwrap();

    assert_eq!(document.status, 200);
    assert_eq!(document.body, "<html>ok</html>");
}

#[tokio::test]
async fn test_not_found_is_bad_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = HttpSession::new(config()).unwrap();
    let result = session.load(&url(&server, "/gone"), None).await;

    assert!(matches!(result, Err(PageError::BadRequest { .. })));
}

#[tokio::test]
async fn test_forbidden_is_refusal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut session = HttpSession::new(config()).unwrap();
    let result = session.load(&url(&server, "/blocked"), None).await;

    assert!(matches!(result, Err(PageError::Refusal { .. })));
}

#[tokio::test]
async fn test_persistent_server_error_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut session = HttpSession::new(config()).unwrap();
    let result = session.load(&url(&server, "/broken"), None).await;

    match result {
        Err(PageError::Fatal(ScrapeError::Status { status, .. })) => assert_eq!(status, 500),
        other => panic!("expected fatal status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sends_user_agent_and_referer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/first"))
        .and(header("user-agent", "first-agent"))
        .and(header("referer", "https://www.google.com/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/second"))
        .and(header("user-agent", "second-agent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = HttpSession::new(config()).unwrap();
    session
        .load(&url(&server, "/first"), Some("https://www.google.com/"))
        .await
        .unwrap();

    session.trip();
    session.reset().await.unwrap();
    session.load(&url(&server, "/second"), None).await.unwrap();
}
