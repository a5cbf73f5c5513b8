//! Integration tests for the mirror
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full download, rewrite and save cycle end-to-end.

use std::path::PathBuf;
use sumi_mirror::config::{Config, CrawlerConfig, HttpConfig, OutputConfig};
use sumi_mirror::crawler::{run_mirror, Coordinator};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration mirroring `seed` into `output_dir`
fn create_test_config(seed: &str, output_dir: &TempDir, respect_robots: bool) -> Config {
    Config {
        crawler: CrawlerConfig {
            url: seed.to_string(),
            max_depth: 2,
            workers: 3,
            rate_limit: 100,
            progress_interval: 2000,
        },
        http: HttpConfig {
            user_agent: "TestBot/1.0".to_string(),
            timeout: 5,
            respect_robots,
        },
        output: OutputConfig {
            output_dir: output_dir.path().to_path_buf(),
        },
    }
}

/// Directory the mock server's files are mirrored into
fn site_dir(server: &MockServer, output_dir: &TempDir) -> PathBuf {
    let url = url::Url::parse(&server.uri()).expect("Failed to parse server URI");
    let host = url.host_str().expect("Failed to extract host");
    let port = url.port().expect("Mock server URI has no port");
    output_dir.path().join(format!("{}_{}", host, port))
}

async fn mount(server: &MockServer, route: &str, content_type: &str, body: &str) {
    Mock::given(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", content_type)
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Mounts a small site: two pages, a stylesheet, two images and a
/// robots.txt that disallows /private
async fn mount_site(server: &MockServer) {
    mount(
        server,
        "/robots.txt",
        "text/plain",
        "User-agent: *\nDisallow: /private",
    )
    .await;

    mount(
        server,
        "/",
        "text/html; charset=utf-8",
        r#"<html><head><link rel="stylesheet" href="/style.css"></head>
<body>
<a href="/about">About</a>
<a href="/private/secret.html">Secret</a>
<a href="http://other.com/x">Elsewhere</a>
<img src="/img/logo.png">
</body></html>"#,
    )
    .await;

    mount(
        server,
        "/about",
        "text/html",
        r#"<html><body><a href="/">Home</a></body></html>"#,
    )
    .await;

    mount(
        server,
        "/style.css",
        "text/css",
        "body { background: url('/img/bg.png'); }",
    )
    .await;

    mount(server, "/img/logo.png", "image/png", "PNGDATA").await;
    mount(server, "/img/bg.png", "image/png", "BGDATA").await;
    mount(
        server,
        "/private/secret.html",
        "text/html",
        "<html>secret</html>",
    )
    .await;
}

#[tokio::test]
async fn test_full_mirror_single_site() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    let coordinator = Coordinator::new(create_test_config(&seed, &output_dir, true)).unwrap();

    coordinator.run(CancellationToken::new()).await.unwrap();

    let stats = coordinator.scheduler().stats();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.failed, 1, "robots-denied page should fail");
    assert_eq!(stats.pending(), 0);

    let site = site_dir(&server, &output_dir);
    assert!(site.join("index.html").exists());
    assert!(site.join("about.html").exists());
    assert!(site.join("style.css").exists());
    assert!(site.join("img/logo.png").exists());
    assert!(site.join("img/bg.png").exists());
    assert!(!site.join("private/secret.html").exists());

    assert_eq!(std::fs::read(site.join("img/logo.png")).unwrap(), b"PNGDATA");
}

#[tokio::test]
async fn test_links_rewritten_to_local_paths() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    run_mirror(
        create_test_config(&seed, &output_dir, true),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let site = site_dir(&server, &output_dir);

    let index = std::fs::read_to_string(site.join("index.html")).unwrap();
    assert!(index.contains(r#"href="style.css""#));
    assert!(index.contains(r#"href="about.html""#));
    assert!(index.contains(r#"src="img/logo.png""#));
    assert!(index.contains(r#"href="http://other.com/x""#));

    let about = std::fs::read_to_string(site.join("about.html")).unwrap();
    assert!(about.contains(r#"href="index.html""#));

    let css = std::fs::read_to_string(site.join("style.css")).unwrap();
    assert_eq!(css, "body { background: url('img/bg.png'); }");
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    let coordinator = Coordinator::new(create_test_config(&seed, &output_dir, false)).unwrap();

    coordinator.run(CancellationToken::new()).await.unwrap();

    let stats = coordinator.scheduler().stats();
    assert_eq!(stats.failed, 0);
    assert!(site_dir(&server, &output_dir)
        .join("private/secret.html")
        .exists());
}

#[tokio::test]
async fn test_depth_zero_saves_seed_only() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    let mut config = create_test_config(&seed, &output_dir, true);
    config.crawler.max_depth = 0;

    let coordinator = Coordinator::new(config).unwrap();
    coordinator.run(CancellationToken::new()).await.unwrap();

    let site = site_dir(&server, &output_dir);
    assert!(site.join("index.html").exists());
    assert!(!site.join("about.html").exists());
    assert_eq!(coordinator.scheduler().stats().total, 1);
}

#[tokio::test]
async fn test_broken_link_counts_as_failure() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        "text/html",
        r#"<a href="/missing">Missing</a><a href="/ok">Ok</a>"#,
    )
    .await;
    mount(&server, "/ok", "text/html", "<p>ok</p>").await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    let coordinator = Coordinator::new(create_test_config(&seed, &output_dir, false)).unwrap();

    coordinator.run(CancellationToken::new()).await.unwrap();

    let stats = coordinator.scheduler().stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);

    let summary = coordinator.scheduler().summary().unwrap();
    assert!((summary.success_rate() - 200.0 / 3.0).abs() < 0.01);
}

#[tokio::test]
async fn test_crawl_delay_lowers_rate() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/robots.txt",
        "text/plain",
        "User-agent: *\nCrawl-delay: 0.5",
    )
    .await;
    mount(&server, "/", "text/html", "<p>home</p>").await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    let coordinator = Coordinator::new(create_test_config(&seed, &output_dir, true)).unwrap();

    coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(coordinator.rate_limiter().rate(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let output_dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_mirror(create_test_config(&seed, &output_dir, false), cancel).await;
    assert!(matches!(result, Err(e) if e.is_cancelled()));
}
