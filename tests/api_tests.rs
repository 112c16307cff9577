use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use quick_contract::{
    server, ContractService, LanguageModel, MockBehavior, MockProvider, ServiceConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TERMS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>ご利用条件</title></head>
<body>
    <nav><a href="/">トップ</a> <a href="/help">ヘルプ</a></nav>
    <article class="content">
        <p>本サービスの利用料金は月額980円（税込）とし、毎月末日に登録済みのクレジットカードで決済されます。</p>
        <p>解約は次回更新日の前日までにマイページから行うことができ、違約金は一切発生しません。</p>
        <p>商品の返品は到着後8日以内に限り受け付け、返送料はお客様のご負担となります。</p>
    </article>
    <footer><p>Copyright Example Inc. All rights reserved.</p></footer>
</body>
</html>"#;

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::new("test-key");
    config.system_prompt = "契約文を一文で作成してください。".to_string();
    config
}

fn app_with(provider: Arc<MockProvider>, config: &ServiceConfig) -> Router {
    let model: Arc<dyn LanguageModel> = provider;
    server::router(ContractService::with_model(config, model).unwrap())
}

async fn page_server(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

fn post_contract(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/contract")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn request_contract(app: Router, url: &str) -> (StatusCode, Value) {
    send(app, post_contract(json!({ "url": url }).to_string())).await
}

#[tokio::test]
async fn invalid_urls_fail_without_network_calls() {
    let provider = Arc::new(MockProvider::with_reply("unused"));
    let config = test_config();

    for url in ["ftp://x", "not a url", "javascript:alert(1)", ""] {
        let (status, body) = request_contract(app_with(provider.clone(), &config), url).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "url: {url}");
        assert!(body["detail"].as_str().unwrap().contains("無効なURL"), "url: {url}");
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let provider = Arc::new(MockProvider::with_reply("unused"));
    let app = app_with(provider.clone(), &test_config());

    let (status, body) = send(app, post_contract("{\"link\": 1}".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn successful_run_returns_short_contract() {
    let server = page_server("/terms", html(TERMS_PAGE)).await;
    let provider = Arc::new(MockProvider::with_reply(
        "「利用者は月額980円の利用料金を毎月末日に支払い、次回更新日の前日までいつでも違約金なしで解約でき、商品は到着後8日以内に返品できるものとする」",
    ));
    let app = app_with(provider.clone(), &test_config());
    let url = format!("{}/terms", server.uri());

    let (status, body) = request_contract(app, &url).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], url);
    let contract = body["contract"].as_str().unwrap();
    assert!(contract.chars().count() <= 60);
    assert!(contract.starts_with("利用者は月額980円"));
    assert!(!contract.contains('\n'));

    let prompt = provider.last_prompt().unwrap();
    assert!(prompt.starts_with("契約文を一文で作成してください。"));
    assert!(prompt.contains("月額980円（税込）"));
    assert!(!prompt.contains("Copyright"));
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let server = page_server("/terms", html(TERMS_PAGE)).await;
    let provider = Arc::new(MockProvider::with_reply("本サービスの利用料金は月額980円とする。"));
    let config = test_config();
    let url = format!("{}/terms", server.uri());

    let (_, first) = request_contract(app_with(provider.clone(), &config), &url).await;
    let (_, second) = request_contract(app_with(provider.clone(), &config), &url).await;

    assert_eq!(first, second);
    assert_eq!(first["contract"], "本サービスの利用料金は月額980円とする。");
}

#[tokio::test]
async fn blank_page_is_extraction_failure() {
    let server = page_server("/blank", html("<html><head></head><body></body></html>")).await;
    let provider = Arc::new(MockProvider::with_reply("unused"));
    let app = app_with(provider.clone(), &test_config());

    let (status, body) = request_contract(app, &format!("{}/blank", server.uri())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("短すぎます"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn fetch_failures_are_bad_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF", "application/pdf"))
        .mount(&server)
        .await;

    let provider = Arc::new(MockProvider::with_reply("unused"));
    let config = test_config();

    let (status, body) =
        request_contract(app_with(provider.clone(), &config), &format!("{}/gone", server.uri()))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("404"));

    let (status, body) = request_contract(
        app_with(provider.clone(), &config),
        &format!("{}/file.pdf", server.uri()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("HTMLページではありません"));
}

#[tokio::test]
async fn fetch_timeout_is_bad_request() {
    let server = page_server(
        "/slow",
        html(TERMS_PAGE).set_delay(Duration::from_secs(3)),
    )
    .await;
    let mut config = test_config();
    config.fetch_timeout = Duration::from_millis(300);
    let app = app_with(Arc::new(MockProvider::with_reply("unused")), &config);

    let (status, body) = request_contract(app, &format!("{}/slow", server.uri())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("タイムアウト"));
}

#[tokio::test]
async fn oversized_page_is_bad_request() {
    let page = format!("<html><body><p>{}</p></body></html>", "規約".repeat(2000));
    let server = page_server("/huge", html(page)).await;
    let provider = Arc::new(MockProvider::with_reply("unused"));
    let mut config = test_config();
    config.max_body_bytes = 4096;

    let (status, body) =
        request_contract(app_with(provider.clone(), &config), &format!("{}/huge", server.uri()))
            .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("大きすぎます"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn slow_fetch_is_never_reported_as_pipeline_timeout() {
    let server = page_server(
        "/slow",
        html(TERMS_PAGE).set_delay(Duration::from_secs(3)),
    )
    .await;
    let provider = Arc::new(MockProvider::with_reply("unused"));

    // An overall budget below the fetch timeout is refused up front.
    let mut config = test_config();
    config.fetch_timeout = Duration::from_secs(5);
    config.request_timeout = Duration::from_secs(1);
    let model: Arc<dyn LanguageModel> = provider.clone();
    assert!(ContractService::with_model(&config, model).is_err());

    // With a valid budget the fetch timeout fires first and maps to 400.
    config.fetch_timeout = Duration::from_millis(500);
    config.request_timeout = Duration::from_secs(1);
    let (status, body) =
        request_contract(app_with(provider.clone(), &config), &format!("{}/slow", server.uri()))
            .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("URLの取得がタイムアウト"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn model_errors_map_to_server_statuses() {
    let server = page_server("/terms", html(TERMS_PAGE)).await;
    let url = format!("{}/terms", server.uri());
    let config = test_config();

    let unavailable = Arc::new(MockProvider::new(MockBehavior::Unavailable));
    let (status, _) = request_contract(app_with(unavailable, &config), &url).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let failing = Arc::new(MockProvider::new(MockBehavior::Fail("quota".to_string())));
    let (status, body) = request_contract(app_with(failing, &config), &url).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["detail"].as_str().unwrap().contains("quota"));

    let empty = Arc::new(MockProvider::with_reply("\n「」\n"));
    let (status, _) = request_contract(app_with(empty, &config), &url).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn overall_timeout_aborts_pipeline() {
    let server = page_server("/terms", html(TERMS_PAGE)).await;
    let mut config = test_config();
    config.fetch_timeout = Duration::from_millis(200);
    config.request_timeout = Duration::from_millis(400);
    let provider = Arc::new(MockProvider::new(MockBehavior::Delay(
        Duration::from_secs(3),
        "too late".to_string(),
    )));

    let (status, body) =
        request_contract(app_with(provider, &config), &format!("{}/terms", server.uri())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("タイムアウト"));
}

#[tokio::test]
async fn long_pages_are_capped_before_generation() {
    let paragraph = format!("<p>{}</p>", "規約".repeat(250));
    let page = format!(
        "<html><body><div class=\"content\">{}</div></body></html>",
        paragraph.repeat(400)
    );
    let server = page_server("/long", html(page)).await;
    let provider = Arc::new(MockProvider::with_reply("本規約に同意する。"));
    let app = app_with(provider.clone(), &test_config());

    let (status, _) = request_contract(app, &format!("{}/long", server.uri())).await;
    assert_eq!(status, StatusCode::OK);

    let prompt = provider.last_prompt().unwrap();
    let (_, text) = prompt
        .split_once("以下のテキストから契約文を生成してください：\n\n")
        .unwrap();
    assert_eq!(text.chars().count(), 150_000);
}

#[tokio::test]
async fn health_is_always_ok() {
    let config = test_config();
    let health_request = || {
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap()
    };

    let up = app_with(Arc::new(MockProvider::with_reply("x")), &config);
    let (status, body) = send(up, health_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy", "gemini_api": "connected" }));

    let down = app_with(
        Arc::new(MockProvider::with_reply("x").with_probe(false)),
        &config,
    );
    let (status, body) = send(down, health_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["gemini_api"], "disconnected");
}

#[tokio::test]
async fn root_describes_service() {
    let app = app_with(Arc::new(MockProvider::with_reply("x")), &test_config());
    let (status, body) = send(
        app,
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
