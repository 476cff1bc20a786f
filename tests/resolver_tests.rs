mod common;

use std::time::Duration;

use url::Url;
use wiremock::matchers::{header, header_exists, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use link_resolver::error::FetchFailure;
use link_resolver::resolver::profiles::{FetchAttempt, HeaderProfile};
use link_resolver::resolver::{self, Deadline};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn target(server: &MockServer, path: &str) -> Url {
    Url::parse(&common::page_url(server, path)).unwrap()
}

const COMPLETE_PAGE: &str = r#"<html><head>
<meta property="og:title" content="Complete">
<meta property="og:image" content="https://img.example.org/c.png">
</head><body></body></html>"#;

const TITLE_ONLY_PAGE: &str = r#"<html><head><title>Just a title</title></head><body></body></html>"#;

#[tokio::test]
async fn complete_first_document_stops_the_plan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(COMPLETE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let meta = resolver::resolve(
        &client,
        &config,
        &target(&server, "/"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap();

    assert_eq!(meta.title.as_deref(), Some("Complete"));
    assert_eq!(meta.image.as_deref(), Some("https://img.example.org/c.png"));
}

#[tokio::test]
async fn range_attempts_ask_for_a_prefix_without_compression() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("range", "bytes=0-65535"))
        .and(header("accept-encoding", "identity"))
        .respond_with(html(COMPLETE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let meta = resolver::resolve(
        &client,
        &config,
        &target(&server, "/"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap();

    assert_eq!(meta.title.as_deref(), Some("Complete"));
}

#[tokio::test]
async fn profile_with_complete_head_is_not_fetched_again() {
    let server = MockServer::start().await;
    // Primary: one range request, its head is complete so the full fetch is skipped.
    Mock::given(method("GET"))
        .and(header_regex("user-agent", "Chrome/"))
        .respond_with(html(TITLE_ONLY_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    // Fallback: same story.
    Mock::given(method("GET"))
        .and(header_regex("user-agent", "facebookexternalhit"))
        .respond_with(html(TITLE_ONLY_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let meta = resolver::resolve(
        &client,
        &config,
        &target(&server, "/"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap();

    assert_eq!(meta.title.as_deref(), Some("Just a title"));
    assert_eq!(meta.image, None);
}

#[tokio::test]
async fn blocked_fallback_profile_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let plan = [
        FetchAttempt {
            profile: HeaderProfile::Fallback,
            use_range: false,
        },
        FetchAttempt {
            profile: HeaderProfile::Primary,
            use_range: false,
        },
    ];
    let failure = resolver::resolve_with(
        &client,
        &config,
        &target(&server, "/"),
        &plan,
        Deadline::after(config.timeout),
    )
    .await
    .unwrap_err();

    assert_eq!(failure, FetchFailure::Blocked(429));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn range_only_failure_is_reported_when_nothing_else_ran() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("range"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let plan = [FetchAttempt {
        profile: HeaderProfile::Primary,
        use_range: true,
    }];
    let failure = resolver::resolve_with(
        &client,
        &config,
        &target(&server, "/"),
        &plan,
        Deadline::after(config.timeout),
    )
    .await
    .unwrap_err();

    assert_eq!(failure, FetchFailure::UpstreamStatus(404));
}

#[tokio::test]
async fn whitespace_only_body_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("  \n\t "))
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let failure = resolver::resolve(
        &client,
        &config,
        &target(&server, "/"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap_err();

    assert_eq!(failure, FetchFailure::EmptyBody);
}

#[tokio::test]
async fn documents_captured_before_the_deadline_still_resolve() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_regex("user-agent", "Chrome/"))
        .respond_with(html(TITLE_ONLY_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header_regex("user-agent", "facebookexternalhit"))
        .respond_with(html(COMPLETE_PAGE).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let meta = resolver::resolve(
        &client,
        &config,
        &target(&server, "/"),
        Deadline::after(Duration::from_millis(500)),
    )
    .await
    .unwrap();

    assert_eq!(meta.title.as_deref(), Some("Just a title"));
}

#[tokio::test]
async fn refused_connection_is_a_network_failure() {
    // Bind then drop a listener so the port is very likely closed.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let failure = resolver::resolve(
        &client,
        &config,
        &Url::parse(&format!("http://{addr}/")).unwrap(),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap_err();

    assert!(matches!(failure, FetchFailure::Network(_)), "got {failure:?}");
}

#[tokio::test]
async fn guarded_client_refuses_redirect_to_private_ip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", common::page_url(&server, "/admin")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(html(COMPLETE_PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let client = resolver::build_client(true).unwrap();
    let config = common::test_resolver_config();
    let failure = resolver::resolve(
        &client,
        &config,
        &target(&server, "/start"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap_err();

    assert_eq!(failure, FetchFailure::PrivateAddress);
}

#[tokio::test]
async fn guarded_client_refuses_names_resolving_to_private_addresses() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("http://localhost:{port}/admin")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(html(COMPLETE_PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let client = resolver::build_client(true).unwrap();
    let config = common::test_resolver_config();
    let failure = resolver::resolve(
        &client,
        &config,
        &target(&server, "/start"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap_err();

    assert_eq!(failure, FetchFailure::PrivateAddress);
}

#[tokio::test]
async fn unguarded_client_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", common::page_url(&server, "/final")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(html(COMPLETE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = resolver::build_client(false).unwrap();
    let config = common::test_resolver_config();
    let meta = resolver::resolve(
        &client,
        &config,
        &target(&server, "/start"),
        Deadline::after(config.timeout),
    )
    .await
    .unwrap();

    assert_eq!(meta.title.as_deref(), Some("Complete"));
}
