use mockito::{Matcher, Mock, Server, ServerGuard};
use pure_client::{
    ApiVersion, Client, ClientConfig, ClientError, Credential, ListParams, Product, Response,
    TransportConfig, VersionSide,
};
use serde::Deserialize;
use serde_json::{Value, json};
use test_case::test_case;

#[derive(Debug, Deserialize, PartialEq)]
struct Volume {
    name: String,
}

fn config(server: &ServerGuard, product: Product) -> ClientConfig {
    ClientConfig::new(
        server.url(),
        product,
        Credential::ApiToken("secret-api-token".to_owned()),
    )
    .with_transport(TransportConfig::default().with_retries(0))
}

fn advertise(server: &mut ServerGuard, versions: &[&str]) -> Mock {
    server
        .mock("GET", "/api/api_version")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "version": versions }).to_string())
        .create()
}

fn accept_login(server: &mut ServerGuard, version: &str, token: &str) -> Mock {
    server
        .mock("POST", format!("/api/{version}/login").as_str())
        .match_header("api-token", "secret-api-token")
        .with_status(200)
        .with_header("x-auth-token", token)
        .create()
}

/// Target advertising FlashArray 2.5 as the newest version the client knows.
fn connected(server: &mut ServerGuard) -> (Client, Vec<Mock>) {
    connected_with(server, TransportConfig::default().with_retries(0))
}

fn connected_with(server: &mut ServerGuard, transport: TransportConfig) -> (Client, Vec<Mock>) {
    let probe = advertise(server, &["1.0", "2.0", "2.5", "2.40"]);
    let login = accept_login(server, "2.5", "session-1");
    let client = Client::connect(config(server, Product::FlashArray).with_transport(transport))
        .expect("client connects");
    (client, vec![probe, login])
}

fn volumes(range: std::ops::Range<usize>) -> Vec<Value> {
    range.map(|i| json!({ "name": format!("vol-{i}") })).collect()
}

#[test]
fn negotiates_the_newest_mutual_version() {
    let mut server = Server::new();
    let (client, mocks) = connected(&mut server);

    for mock in &mocks {
        mock.assert();
    }
    assert_eq!(client.api_version(), ApiVersion::new(2, 5));
    assert_eq!(client.product(), Product::FlashArray);
    assert!(
        client
            .operations()
            .iter()
            .any(|endpoint| endpoint.operation_id == "getVolumes")
    );
}

#[test_case(Product::FlashBlade, &["2.0", "2.15", "2.16"], "2.15"; "flashblade newer than client")]
#[test_case(Product::Pure1, &["1.4", "1.0", "1.2"], "1.4"; "pure1 unordered list")]
#[test_case(Product::FlashArray, &["2.9", "2.10"], "2.10"; "flasharray numeric ordering")]
fn negotiation_per_product(product: Product, advertised: &[&str], expected: &str) {
    let mut server = Server::new();
    let _probe = server
        .mock("GET", "/api/api_version")
        .with_status(200)
        .with_body(json!({ "versions": advertised }).to_string())
        .create();
    let login = accept_login(&mut server, expected, "session-1");

    let client = Client::connect(config(&server, product)).expect("client connects");

    login.assert();
    assert_eq!(client.api_version().to_string(), expected);
}

#[test]
fn explicit_version_must_be_advertised() {
    let mut server = Server::new();
    let _probe = advertise(&mut server, &["2.0", "2.1"]);
    let login = server
        .mock("POST", Matcher::Regex("/login$".to_owned()))
        .expect(0)
        .create();

    let error = Client::connect(config(&server, Product::FlashArray).with_version("2.4"))
        .expect_err("2.4 is not advertised");

    login.assert();
    assert!(matches!(
        error,
        ClientError::UnsupportedVersion {
            side: VersionSide::Target,
            ..
        }
    ));
}

#[test]
fn dev_version_selects_the_newest_registered_version() {
    let mut server = Server::new();
    let _probe = advertise(&mut server, &["2.35", "2.36"]);
    let login = accept_login(&mut server, "2.36", "session-1");

    let client = Client::connect(config(&server, Product::FlashArray).with_version("dev"))
        .expect("client connects");

    login.assert();
    assert_eq!(client.api_version(), ApiVersion::new(2, 36));
}

#[test]
fn no_shared_version_fails_to_connect() {
    let mut server = Server::new();
    let _probe = advertise(&mut server, &["3.0"]);

    let error = Client::connect(config(&server, Product::FlashArray)).expect_err("no overlap");
    assert!(matches!(error, ClientError::NoCompatibleVersion { .. }));
}

#[test]
fn follows_continuation_tokens_across_pages() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let first_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .match_header("x-auth-token", "session-1")
        .match_header("x-request-id", "query-1")
        .with_status(200)
        .with_body(json!({ "items": volumes(0..50), "continuation_token": "tok1" }).to_string())
        .expect(1)
        .create();
    let second_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::UrlEncoded(
            "continuation_token".to_owned(),
            "tok1".to_owned(),
        ))
        .match_header("x-request-id", "query-1")
        .with_status(200)
        .with_body(json!({ "items": volumes(50..75) }).to_string())
        .expect(1)
        .create();

    let response = client
        .list::<Volume>("getVolumes", ListParams::new().x_request_id("query-1"))
        .expect("list succeeds");
    let valid = response.into_result().expect("valid response");
    assert_eq!(valid.continuation_token.as_deref(), Some("tok1"));
    assert_eq!(valid.items.len(), 50);
    assert_eq!(valid.items.x_request_id(), "query-1");

    let names: Vec<String> = valid
        .items
        .map(|volume| volume.expect("page fetch succeeds").name)
        .collect();

    first_page.assert();
    second_page.assert();
    assert_eq!(names.len(), 75);
    assert_eq!(names[0], "vol-0");
    assert_eq!(names[74], "vol-74");
}

#[test]
fn limit_stops_iteration_without_fetching_more() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::UrlEncoded("limit".to_owned(), "3".to_owned()))
        .with_status(200)
        .with_body(
            json!({ "items": volumes(0..3), "continuation_token": "tok1", "total_item_count": 10 })
                .to_string(),
        )
        .expect(1)
        .create();

    let valid = client
        .list::<Volume>("getVolumes", ListParams::new().limit(3))
        .expect("list succeeds")
        .into_result()
        .expect("valid response");
    assert_eq!(valid.total_item_count, Some(10));
    assert_eq!(valid.items.len(), 10);

    let items: Vec<Volume> = valid
        .items
        .collect::<Result<_, _>>()
        .expect("no fetch errors");

    page.assert();
    assert_eq!(items.len(), 3);
}

#[test]
fn sorted_queries_page_by_offset() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let first_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::UrlEncoded("sort".to_owned(), "name".to_owned()))
        .with_status(200)
        .with_body(
            json!({
                "items": volumes(0..2),
                "continuation_token": "ignored",
                "more_items_remaining": true
            })
            .to_string(),
        )
        .expect(1)
        .create();
    let second_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sort".to_owned(), "name".to_owned()),
            Matcher::UrlEncoded("offset".to_owned(), "2".to_owned()),
        ]))
        .with_status(200)
        .with_body(json!({ "items": volumes(2..3), "more_items_remaining": false }).to_string())
        .expect(1)
        .create();

    let valid = client
        .list::<Volume>("getVolumes", ListParams::new().sort(["name"]))
        .expect("list succeeds")
        .into_result()
        .expect("valid response");
    let items: Vec<Volume> = valid
        .items
        .collect::<Result<_, _>>()
        .expect("no fetch errors");

    first_page.assert();
    second_page.assert();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].name, "vol-2");
}

#[test]
fn api_errors_become_error_responses() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let _volumes = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_header("x-request-id", "query-2")
        .with_body(
            json!({ "errors": [{ "context": "vol9", "message": "Volume does not exist." }] })
                .to_string(),
        )
        .create();

    let response = client
        .list::<Volume>("getVolumes", ListParams::new().names(["vol9"]))
        .expect("transport succeeds");

    assert!(!response.is_valid());
    assert_eq!(response.status_code().as_u16(), 400);
    assert_eq!(response.headers().x_request_id.as_deref(), Some("query-2"));
    match response {
        Response::Error(error) => {
            assert_eq!(error.errors.len(), 1);
            assert_eq!(error.errors[0].context.as_deref(), Some("vol9"));
            assert_eq!(error.errors[0].message, "Volume does not exist.");
        }
        Response::Valid(_) => panic!("expected an error response"),
    }
}

#[test]
fn reports_rate_limit_headers() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let _hosts = server
        .mock("GET", "/api/2.5/hosts")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("x-ratelimit-limit-second", "10")
        .with_header("x-ratelimit-remaining-second", "9")
        .with_header("x-ratelimit-limit-minute", "600")
        .with_header("x-ratelimit-remaining-minute", "598")
        .with_body(json!({ "items": [] }).to_string())
        .create();

    let response = client
        .list::<Value>("getHosts", ListParams::new())
        .expect("list succeeds");
    let headers = response.headers();

    assert_eq!(headers.x_ratelimit_sec, Some(10));
    assert_eq!(headers.x_ratelimit_remaining_sec, Some(9));
    assert_eq!(headers.x_ratelimit_min, Some(600));
    assert_eq!(headers.x_ratelimit_remaining_min, Some(598));
}

#[test]
fn expired_session_is_renewed_once() {
    let mut server = Server::new();
    let (client, mocks) = connected(&mut server);
    for mock in &mocks {
        mock.remove();
    }

    let logout = server
        .mock("POST", "/api/2.5/logout")
        .match_header("x-auth-token", "session-1")
        .with_status(200)
        .expect(1)
        .create();
    let login = accept_login(&mut server, "2.5", "session-2");
    let rejected = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .match_header("x-auth-token", "session-1")
        .with_status(401)
        .expect(1)
        .create();
    let accepted = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .match_header("x-auth-token", "session-2")
        .with_status(200)
        .with_body(json!({ "items": volumes(0..1) }).to_string())
        .expect(1)
        .create();

    let response = client
        .list::<Volume>("getVolumes", ListParams::new())
        .expect("list succeeds");

    rejected.assert();
    logout.assert();
    login.assert();
    accepted.assert();
    assert!(response.is_valid());
    assert_eq!(
        client.get_session_token(false).expect("cached token"),
        "session-2"
    );
}

#[test]
fn failed_follow_up_page_is_reported_once() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let _first_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "items": volumes(0..2), "continuation_token": "tok1" }).to_string())
        .expect(1)
        .create();
    let _second_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::UrlEncoded(
            "continuation_token".to_owned(),
            "tok1".to_owned(),
        ))
        .with_status(503)
        .with_body("maintenance")
        .create();

    let mut items = client
        .list::<Volume>("getVolumes", ListParams::new())
        .expect("list succeeds")
        .into_result()
        .expect("valid response")
        .items;

    assert!(matches!(items.next(), Some(Ok(_))));
    assert!(matches!(items.next(), Some(Ok(_))));
    match items.next() {
        Some(Err(error)) => assert_eq!(error.status().map(|s| s.as_u16()), Some(503)),
        other => panic!("expected a fetch error, got {other:?}"),
    }
    assert!(items.next().is_none());
}

#[test]
fn lenient_iteration_ends_quietly_on_failure() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let _first_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "items": volumes(0..2), "continuation_token": "tok1" }).to_string())
        .expect(1)
        .create();
    let _second_page = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::UrlEncoded(
            "continuation_token".to_owned(),
            "tok1".to_owned(),
        ))
        .with_status(500)
        .create();

    let mut items = client
        .list::<Volume>("getVolumes", ListParams::new())
        .expect("list succeeds")
        .into_result()
        .expect("valid response")
        .items
        .lenient();

    let names: Vec<String> = items.by_ref().map(|volume| volume.name).collect();
    assert_eq!(names, ["vol-0", "vol-1"]);
    assert!(items.error().is_some());
}

#[test]
fn calls_write_endpoints_with_a_json_body() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let create = server
        .mock("POST", "/api/2.5/volumes")
        .match_query(Matcher::UrlEncoded("names".to_owned(), "vol-new".to_owned()))
        .match_header("x-auth-token", "session-1")
        .match_body(Matcher::Json(json!({ "provisioned": 1_048_576 })))
        .with_status(200)
        .with_body(json!({ "items": [{ "name": "vol-new" }] }).to_string())
        .expect(1)
        .create();

    let response = client
        .call::<Volume>(
            "postVolumes",
            ListParams::new().names(["vol-new"]),
            Some(json!({ "provisioned": 1_048_576 })),
        )
        .expect("call succeeds");
    let items: Vec<Volume> = response
        .into_result()
        .expect("valid response")
        .items
        .collect::<Result<_, _>>()
        .expect("single page");

    create.assert();
    assert_eq!(
        items,
        [Volume {
            name: "vol-new".to_owned()
        }]
    );
}

#[test]
fn rejects_misused_operations() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);

    let not_paged = client
        .list::<Value>("postVolumes", ListParams::new())
        .expect_err("write endpoints are not paged");
    assert!(matches!(not_paged, ClientError::OperationNotPaged(_)));

    // Fleets only exist from 2.36 on.
    let unknown = client
        .list::<Value>("getFleets", ListParams::new())
        .expect_err("not available at 2.5");
    assert!(matches!(unknown, ClientError::UnknownOperation { .. }));
}

#[test]
fn dropping_the_last_clone_logs_out() {
    let mut server = Server::new();
    let (client, _mocks) = connected(&mut server);
    let logout = server
        .mock("POST", "/api/2.5/logout")
        .match_header("x-auth-token", "session-1")
        .with_status(200)
        .expect(1)
        .create();

    let clone = client.clone();
    drop(client);
    drop(clone);

    logout.assert();
}

#[test]
fn retries_unavailable_pages_with_the_same_request_id() {
    let mut server = Server::new();
    let (client, _mocks) =
        connected_with(&mut server, TransportConfig::default().with_retries(1));

    let unavailable = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .match_header("x-request-id", "retry-1")
        .with_status(503)
        .expect(1)
        .create();
    let recovered = server
        .mock("GET", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .match_header("x-request-id", "retry-1")
        .with_status(200)
        .with_body(json!({ "items": volumes(0..2) }).to_string())
        .expect(1)
        .create();

    let items: Vec<Volume> = client
        .list::<Volume>("getVolumes", ListParams::new().x_request_id("retry-1"))
        .expect("list succeeds")
        .into_result()
        .expect("valid response after retry")
        .items
        .collect::<Result<_, _>>()
        .expect("single page");

    unavailable.assert();
    recovered.assert();
    assert_eq!(items.len(), 2);
}

#[test]
fn throttled_pages_are_retried() {
    let mut server = Server::new();
    let (client, _mocks) =
        connected_with(&mut server, TransportConfig::default().with_retries(2));

    let throttled = server
        .mock("GET", "/api/2.5/hosts")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(1)
        .create();
    let accepted = server
        .mock("GET", "/api/2.5/hosts")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "items": [] }).to_string())
        .expect(1)
        .create();

    let response = client
        .list::<Value>("getHosts", ListParams::new())
        .expect("list succeeds");

    throttled.assert();
    accepted.assert();
    assert!(response.is_valid());
}

#[test]
fn write_calls_are_sent_once() {
    let mut server = Server::new();
    let (client, _mocks) =
        connected_with(&mut server, TransportConfig::default().with_retries(3));

    let create = server
        .mock("POST", "/api/2.5/volumes")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .expect(1)
        .create();

    let response = client
        .call::<Volume>(
            "postVolumes",
            ListParams::new().names(["vol-new"]),
            Some(json!({ "provisioned": 1_048_576 })),
        )
        .expect("transport succeeds");

    create.assert();
    assert_eq!(response.status_code().as_u16(), 503);
    assert!(matches!(response, Response::Error(_)));
}
