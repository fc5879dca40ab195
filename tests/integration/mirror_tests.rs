//! Integration tests for the mirror
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full fetch, rewrite and write cycle end-to-end.

use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;
use sumi_mirror::config::Config;
use sumi_mirror::crawler::Coordinator;
use sumi_mirror::state::PageState;
use sumi_mirror::MirrorSummary;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing below `dir`
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.mirror.destination_root = dir.path().to_string_lossy().into_owned();
    config.mirror.max_concurrent_fetches = 4;
    config.user_agent.crawler_name = "TestMirror".to_string();
    config
}

async fn run_mirror(config: Config, root: &str) -> MirrorSummary {
    Coordinator::new(config, root)
        .expect("Failed to create coordinator")
        .run_until(std::future::pending())
        .await
}

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

fn attributes(html: &str, selector: &str, attribute: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attribute))
        .map(str::to_string)
        .collect()
}

/// Resolves a relative link the way a browser would from a file in the mirror
fn follow(site_root: &Path, from: &str, link: &str) -> std::path::PathBuf {
    let base = url::Url::from_file_path(site_root.join(from)).unwrap();
    base.join(link).unwrap().to_file_path().unwrap()
}

#[tokio::test]
async fn test_full_site_mirror() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><head>
<link rel="stylesheet" href="/css/site.css">
<script src="js/app.js"></script>
</head><body>
<a href="/a/b.html">B</a>
<img src="/images/logo.png">
<a href="https://elsewhere.example.org/">elsewhere</a>
</body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a/b.html"))
        .respond_with(html_response(
            r#"<html><body><a href="/a/c">C</a><a href="../">home</a></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a/c"))
        .respond_with(html_response("<html><body>leaf</body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "body { background: url(../images/bg.png); }",
            "text/css",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/js/app.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("console.log('hi');", "application/javascript"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/images/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8, b'P', b'N', b'G'], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/images/bg.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = run_mirror(create_test_config(&dir), &server.uri()).await;
    let site = summary.site_root.clone();

    assert_eq!(summary.stats.count(PageState::Mirrored), 7);
    assert_eq!(summary.stats.files_written, 7);
    assert!(!summary.stats.interrupted());

    // Home page links all point at files that exist
    let home = read(&site.join("index.html"));
    assert_eq!(attributes(&home, "a", "href")[0], "a/b.html");
    assert_eq!(
        attributes(&home, "a", "href")[1],
        "https://elsewhere.example.org/"
    );
    for (selector, attribute) in [("link", "href"), ("script", "src"), ("img", "src")] {
        for link in attributes(&home, selector, attribute) {
            assert!(
                follow(&site, "index.html", &link).is_file(),
                "{} does not lead to a file",
                link
            );
        }
    }

    // Nested page links are relative to the page's own directory
    let b = read(&site.join("a").join("b.html"));
    assert_eq!(
        attributes(&b, "a", "href"),
        vec!["c/index.html", "../index.html"]
    );
    assert!(site.join("a").join("c").join("index.html").is_file());

    // Stylesheet reference resolves to the mirrored image
    let css = read(&site.join("css").join("site.css"));
    assert_eq!(css, "body { background: url('../images/bg.png'); }");
    assert_eq!(
        std::fs::read(site.join("images").join("logo.png")).unwrap(),
        vec![0x89u8, b'P', b'N', b'G']
    );
}

#[tokio::test]
async fn test_cycle_fetched_once_each() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<a href="a.html">A</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.html"))
        .respond_with(html_response(r#"<a href="b.html">B</a><a href="/">home</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.html"))
        .respond_with(html_response(r#"<a href="a.html">A</a><a href="b.html#self">me</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = run_mirror(create_test_config(&dir), &server.uri()).await;

    assert_eq!(summary.stats.count(PageState::Mirrored), 3);
    assert_eq!(summary.stats.total_pages(), 3);

    let b = read(&summary.site_root.join("b.html"));
    assert_eq!(attributes(&b, "a", "href"), vec!["a.html", "b.html#self"]);
}

#[tokio::test]
async fn test_transport_failures_abandoned_after_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<a href="slow.html">slow</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow.html"))
        .respond_with(html_response("too late").set_delay(Duration::from_millis(500)))
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.http.request_timeout_ms = 100;
    config.mirror.max_retries = 3;

    let summary = run_mirror(config, &server.uri()).await;

    assert_eq!(summary.stats.count(PageState::Mirrored), 1);
    assert_eq!(summary.stats.count(PageState::Abandoned), 1);
    assert!(!summary.site_root.join("slow.html").exists());
}

#[tokio::test]
async fn test_error_status_skipped_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<a href="missing.html">gone</a><a href="broken.html">broken</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken.html"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = run_mirror(create_test_config(&dir), &server.uri()).await;

    assert_eq!(summary.stats.count(PageState::Skipped), 2);
    assert!(!summary.site_root.join("missing.html").exists());
    assert!(!summary.site_root.join("broken.html").exists());

    // Links to skipped pages are still rewritten to where they would live
    let home = read(&summary.site_root.join("index.html"));
    assert_eq!(
        attributes(&home, "a", "href"),
        vec!["missing.html", "broken.html"]
    );
}

#[tokio::test]
async fn test_second_run_produces_identical_tree() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<a href="docs/guide?page=2">guide</a><a href="style.css">css</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/guide"))
        .respond_with(html_response(r#"<a href="../">up</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("p { color: red; }", "text/css"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let first = run_mirror(create_test_config(&dir), &server.uri()).await;
    let paths = [
        first.site_root.join("index.html"),
        first.site_root.join("docs").join("guide").join("index_page=2.html"),
        first.site_root.join("style.css"),
    ];
    let before: Vec<Vec<u8>> = paths.iter().map(|p| std::fs::read(p).unwrap()).collect();

    let second = run_mirror(create_test_config(&dir), &server.uri()).await;
    assert_eq!(first.site_root, second.site_root);
    let after: Vec<Vec<u8>> = paths.iter().map(|p| std::fs::read(p).unwrap()).collect();

    assert_eq!(before, after);
    assert_eq!(second.stats.count(PageState::Mirrored), 3);
}

#[tokio::test]
async fn test_subtree_root_keeps_outside_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html_response(
            r#"<a href="intro.html">intro</a><a href="/blog/">blog</a><a href="../about.html">about</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/intro.html"))
        .respond_with(html_response("<p>intro</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/"))
        .respond_with(html_response("<p>blog</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = run_mirror(
        create_test_config(&dir),
        &format!("{}/docs/", server.uri()),
    )
    .await;

    assert_eq!(summary.stats.count(PageState::Mirrored), 2);

    // The root's own directories are stripped from destination paths
    let home = read(&summary.site_root.join("index.html"));
    assert_eq!(
        attributes(&home, "a", "href"),
        vec!["intro.html", "/blog/", "../about.html"]
    );
    assert!(summary.site_root.join("intro.html").is_file());
}

#[tokio::test]
async fn test_redirect_written_at_requested_path() {
    let server = MockServer::start().await;
    let new_location = format!("{}/new/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<a href="old">old</a><a href="away">away</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", new_location.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/"))
        .respond_with(html_response(r#"<a href="page.html">page</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/page.html"))
        .respond_with(html_response("<p>page</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/away"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://127.0.0.1:9/outside"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = run_mirror(create_test_config(&dir), &server.uri()).await;

    // /old is stored at its own path; its links resolve against /new/
    let old = read(&summary.site_root.join("old").join("index.html"));
    assert_eq!(attributes(&old, "a", "href"), vec!["../new/page.html"]);
    assert!(summary.site_root.join("new").join("page.html").is_file());

    assert!(!summary.site_root.join("away").exists());
    assert_eq!(summary.stats.count(PageState::Skipped), 1);
}
