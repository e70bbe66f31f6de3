//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use crate::common::{create_test_config, html_page, mount_page, open, requested_paths, temp_db};
use async_trait::async_trait;
use site_strata::config::{RenderMode, ScreenshotMode};
use site_strata::crawler::{
    crawl, crawl_with_renderer, FetchError, RenderRequest, RenderedResponse, Renderer,
};
use site_strata::storage::{open_store, PageKey, PageStore, RunStatus, META_BASE_URL};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        html_page(
            "Home",
            r#"<a href="/page1">Page 1</a> <a href="/page2">Page 2</a>"#,
        ),
    )
    .await;
    mount_page(&mock_server, "/page1", html_page("Page 1", "<p>Content 1</p>")).await;
    mount_page(&mock_server, "/page2", html_page("Page 2", "<p>Content 2</p>")).await;

    let (_dir, db_path) = temp_db();
    let config = create_test_config(&base_url, &db_path);
    let mut store = open(&db_path);

    let report = crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(report.fetched, 3);
    assert_eq!(report.successful, 3);
    assert_eq!(store.count().unwrap(), 3);

    let page1 = store
        .get(PageKey::Url(&format!("{}/page1", base_url)))
        .unwrap()
        .expect("page1 stored");
    assert_eq!(page1.status, 200);
    assert_eq!(page1.title.as_deref(), Some("Page 1"));
    assert_eq!(page1.depth, 1);

    let run = store.latest_run().unwrap().expect("run recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(store.get_meta(META_BASE_URL).unwrap().is_some());
}

#[tokio::test]
async fn test_excluded_paths_never_fetched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        html_page(
            "Home",
            r#"<a href="/about">About</a>
               <a href="/admin">Admin</a>
               <a href="/admin/users">Users</a>"#,
        ),
    )
    .await;
    mount_page(&mock_server, "/about", html_page("About", "<p>About us</p>")).await;

    Mock::given(method("GET"))
        .and(path_regex("^/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (_dir, db_path) = temp_db();
    let mut config = create_test_config(&base_url, &db_path);
    config.crawl.exclude_paths = vec!["/admin/*".to_string()];
    let mut store = open(&db_path);

    let report = crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(report.excluded, 2);
    for url in store.urls().unwrap() {
        assert!(!url.contains("/admin"), "excluded URL stored: {}", url);
    }
}

#[tokio::test]
async fn test_max_pages_budget() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (0..50)
        .map(|i| format!(r#"<a href="/p/{i}">Product {i}</a>"#))
        .collect::<Vec<_>>()
        .join("\n");
    mount_page(&mock_server, "/", html_page("Catalog", &links)).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Product", "<p>A product</p>"), "text/html"),
        )
        .mount(&mock_server)
        .await;

    let (_dir, db_path) = temp_db();
    let mut config = create_test_config(&base_url, &db_path);
    config.crawl.max_pages = 5;
    config.crawl.concurrency = 4;
    let mut store = open(&db_path);

    let report = crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(store.count_successful().unwrap(), 5);
    assert_eq!(report.successful, 5);
    assert_eq!(requested_paths(&mock_server).await.len(), 5);
}

#[tokio::test]
async fn test_max_depth_budget() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", html_page("Root", r#"<a href="/a">A</a>"#)).await;
    mount_page(&mock_server, "/a", html_page("A", r#"<a href="/b">B</a>"#)).await;
    mount_page(&mock_server, "/b", html_page("B", r#"<a href="/c">C</a>"#)).await;

    let (_dir, db_path) = temp_db();
    let mut config = create_test_config(&base_url, &db_path);
    config.crawl.max_depth = 1;
    let mut store = open(&db_path);

    crawl(&config, &mut store, false).await.expect("Crawl failed");

    let pages = store.all().unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| p.depth <= 1));
    assert!(!requested_paths(&mock_server).await.contains(&"/b".to_string()));
}

#[tokio::test]
async fn test_resume_never_refetches() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page(
                    "Home",
                    r#"<a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a>"#,
                ), "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    for page in ["/a", "/b", "/c"] {
        mount_page(&mock_server, page, html_page(page, &format!("<p>{page}</p>"))).await;
    }

    let (_dir, db_path) = temp_db();
    let mut config = create_test_config(&base_url, &db_path);
    config.crawl.max_pages = 2;

    {
        let mut store = open(&db_path);
        crawl(&config, &mut store, false).await.expect("First crawl failed");
        assert_eq!(store.count_successful().unwrap(), 2);
    }

    config.crawl.max_pages = 10;
    let mut store = open_store(&db_path, true).expect("Store must exist");
    let before = store.urls().unwrap();
    let report = crawl(&config, &mut store, true).await.expect("Resumed crawl failed");

    assert_eq!(report.fetched, 2);
    assert_eq!(store.count_successful().unwrap(), 4);
    let after = store.urls().unwrap();
    assert!(before.iter().all(|url| after.contains(url)));

    let mut paths = requested_paths(&mock_server).await;
    let total = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(total, paths.len(), "a page was fetched twice");
}

#[tokio::test]
async fn test_resume_requires_existing_store() {
    let (_dir, db_path) = temp_db();
    assert!(open_store(&db_path, true).is_err());
}

#[tokio::test]
async fn test_off_origin_links_not_followed() {
    let mock_server = MockServer::start().await;
    let other_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        html_page(
            "Home",
            &format!(r#"<a href="{}/elsewhere">Elsewhere</a>"#, other_server.uri()),
        ),
    )
    .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&other_server)
        .await;

    let (_dir, db_path) = temp_db();
    let config = create_test_config(&base_url, &db_path);
    let mut store = open(&db_path);

    let report = crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(report.excluded, 1);
}

#[tokio::test]
async fn test_identical_content_identical_hash() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        html_page("Home", r#"<a href="/x">X</a> <a href="/y">Y</a>"#),
    )
    .await;
    mount_page(&mock_server, "/x", html_page("X", "<p>Same words here</p>")).await;
    mount_page(&mock_server, "/y", html_page("Y", "<p>Same words here</p>")).await;

    let (_dir, db_path) = temp_db();
    let config = create_test_config(&base_url, &db_path);
    let mut store = open(&db_path);

    crawl(&config, &mut store, false).await.expect("Crawl failed");

    let x = store.get(PageKey::Url(&format!("{}/x", base_url))).unwrap().unwrap();
    let y = store.get(PageKey::Url(&format!("{}/y", base_url))).unwrap().unwrap();
    assert!(x.content_hash.is_some());
    assert_eq!(x.content_hash, y.content_hash);

    let duplicates = store.duplicate_content().unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].1, 2);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/",
        html_page(
            "Home",
            r#"<a href="/allowed">Allowed</a> <a href="/private">Private</a>"#,
        ),
    )
    .await;
    mount_page(&mock_server, "/allowed", html_page("Allowed", "<p>Open</p>")).await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (_dir, db_path) = temp_db();
    let config = create_test_config(&base_url, &db_path);
    let mut store = open(&db_path);

    let report = crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(report.robots_denied, 1);
    assert_eq!(store.count().unwrap(), 2);
    assert!(!store
        .contains(PageKey::Url(&format!("{}/private", base_url)))
        .unwrap());
}

#[tokio::test]
async fn test_redirect_stored_under_final_url() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", html_page("Home", r#"<a href="/old">Old</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/new", html_page("New", "<p>Moved here</p>")).await;

    let (_dir, db_path) = temp_db();
    let config = create_test_config(&base_url, &db_path);
    let mut store = open(&db_path);

    crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(store.count().unwrap(), 2);
    let new = store
        .get(PageKey::Url(&format!("{}/new", base_url)))
        .unwrap()
        .expect("redirect target stored");
    assert_eq!(new.redirect_chain, vec![format!("{}/old", base_url)]);
    assert!(!store
        .contains(PageKey::Url(&format!("{}/old", base_url)))
        .unwrap());
}

#[tokio::test]
async fn test_not_found_is_stored_with_status() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", html_page("Home", r#"<a href="/gone">Gone</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (_dir, db_path) = temp_db();
    let config = create_test_config(&base_url, &db_path);
    let mut store = open(&db_path);

    let report = crawl(&config, &mut store, false).await.expect("Crawl failed");

    assert_eq!(report.fetched, 2);
    assert_eq!(report.successful, 1);
    assert_eq!(store.by_status(404).unwrap().len(), 1);
}

/// Serves fixed HTML for every URL and attaches a fake screenshot when asked
struct FixtureRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn render(&self, url: &Url, request: RenderRequest) -> Result<RenderedResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = if url.path() == "/" {
            html_page("Rendered", r#"<a href="/inner">Inner</a>"#)
        } else {
            html_page("Inner", "<p>Rendered by script</p>")
        };
        Ok(RenderedResponse {
            final_url: Some(url.clone()),
            status: 200,
            body: Some(body),
            screenshot: (request.screenshots != ScreenshotMode::Off)
                .then(|| format!("shot:{}", url.path())),
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn test_injected_headless_renderer() {
    let (_dir, db_path) = temp_db();
    let mut config = create_test_config("http://site.test/", &db_path);
    config.crawl.render_mode = RenderMode::Headless;
    config.crawl.screenshots = ScreenshotMode::Viewport;
    config.crawl.respect_robots = false;
    let mut store = open(&db_path);

    assert!(crawl(&config, &mut store, false).await.is_err());

    let renderer = Arc::new(FixtureRenderer {
        calls: AtomicUsize::new(0),
    });
    let report = crawl_with_renderer(&config, &mut store, false, renderer.clone())
        .await
        .expect("Crawl failed");

    assert_eq!(report.successful, 2);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    let inner = store
        .get(PageKey::Url("http://site.test/inner"))
        .unwrap()
        .expect("inner page stored");
    assert_eq!(inner.screenshot.as_deref(), Some("shot:/inner"));
    assert_eq!(inner.title.as_deref(), Some("Inner"));
}
