//! End-to-end tests: crawl a mock site, then infer its content model

use crate::common::{create_test_config, html_page, mount_page, open, temp_db};
use site_strata::analysis::{analyze_store, load_model, save_model, AnalysisError};
use site_strata::crawler::crawl;
use site_strata::storage::SqlitePageStore;
use std::sync::atomic::AtomicBool;
use wiremock::MockServer;

const POSTS: &[&str] = &["first-post", "second-post", "third-post"];
const PRODUCTS: &[&str] = &["red-widget", "blue-widget", "green-widget"];

fn post_html(slug: &str) -> String {
    format!(
        r#"<html><head><title>{slug}</title>
        <meta name="author" content="Jo Writer">
        <meta property="article:published_time" content="2024-03-01">
        </head><body>
        <nav><a href="/">Home</a> <a href="/blog">Blog</a></nav>
        <main>
          <h1>{slug}</h1>
          <p>Some thoughts written down in a few plain sentences for the reader.</p>
          <h2>Details</h2>
          <p>More words follow here so the post has a body.</p>
        </main>
        </body></html>"#
    )
}

fn product_html(slug: &str) -> String {
    format!(
        r#"<html><head><title>{slug}</title>
        <meta property="product:price:amount" content="19.99">
        </head><body>
        <nav><a href="/">Home</a> <a href="/blog">Blog</a></nav>
        <main>
          <h1>{slug}</h1>
          <span class="price">$19.99</span>
          <ul class="related">
            <li class="card"><img src="/img/a.jpg"><h3>Lamp</h3><span class="price">$10</span></li>
            <li class="card"><img src="/img/b.jpg"><h3>Desk</h3><span class="price">$99</span></li>
          </ul>
        </main>
        </body></html>"#
    )
}

async fn mount_site(server: &MockServer) {
    let product_links: String = PRODUCTS
        .iter()
        .map(|p| format!(r#"<a href="/product/{p}">{p}</a>"#))
        .collect();
    mount_page(
        server,
        "/",
        html_page("Home", &format!(r#"<a href="/blog">Blog</a> {product_links}"#)),
    )
    .await;

    let post_links: String = POSTS
        .iter()
        .map(|p| format!(r#"<a href="/blog/{p}">{p}</a>"#))
        .collect();
    mount_page(server, "/blog", html_page("Blog", &post_links)).await;

    for post in POSTS {
        mount_page(server, &format!("/blog/{post}"), post_html(post)).await;
    }
    for product in PRODUCTS {
        mount_page(server, &format!("/product/{product}"), product_html(product)).await;
    }
}

async fn crawled_store() -> (tempfile::TempDir, SqlitePageStore) {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let (dir, db_path) = temp_db();
    let config = create_test_config(&mock_server.uri(), &db_path);
    let mut store = open(&db_path);
    crawl(&config, &mut store, false).await.expect("Crawl failed");
    (dir, store)
}

#[tokio::test]
async fn test_blog_and_product_pages_cluster_apart() {
    let (_dir, store) = crawled_store().await;
    let cancel = AtomicBool::new(false);

    let model = analyze_store(&store, &Default::default(), &cancel).expect("Analysis failed");

    let blog = model
        .page_types
        .iter()
        .find(|t| t.url_pattern.as_deref() == Some("/blog/:slug"))
        .expect("blog type");
    assert_eq!(blog.page_count, 3);
    assert_eq!(blog.name, "Blog Detail");
    assert!(blog.features.has_author);

    let product = model
        .page_types
        .iter()
        .find(|t| t.url_pattern.as_deref() == Some("/product/:slug"))
        .expect("product type");
    assert_eq!(product.page_count, 3);
    assert!(product.features.has_price);

    // Every page lands in exactly one type
    let total: usize = model.page_types.iter().map(|t| t.page_count).sum();
    assert_eq!(total, 8);
    assert!(model
        .page_types
        .iter()
        .all(|t| t.page_count == t.page_ids.len() && (0.0..=1.0).contains(&t.confidence)));
}

#[tokio::test]
async fn test_navigation_and_objects() {
    let (_dir, store) = crawled_store().await;
    let cancel = AtomicBool::new(false);

    let model = analyze_store(&store, &Default::default(), &cancel).expect("Analysis failed");

    let targets: Vec<&str> = model
        .navigation
        .primary_nav
        .iter()
        .map(|e| e.target_pattern.as_str())
        .collect();
    assert!(targets.contains(&"/"));

    let card = model
        .objects
        .iter()
        .find(|o| o.object_type == "product")
        .expect("related product card");
    assert_eq!(card.instances.len(), 6);
    assert_eq!(card.page_type_refs, vec!["product-slug".to_string()]);
    assert!(card.suggested_fields.iter().any(|f| f.name == "price" && f.required));

    let type_ids: Vec<&str> = model.page_types.iter().map(|t| t.id.as_str()).collect();
    assert!(model
        .relationships
        .iter()
        .all(|r| type_ids.contains(&r.from.as_str()) && type_ids.contains(&r.to.as_str())));
}

#[tokio::test]
async fn test_artifacts_persist() {
    let (_dir, mut store) = crawled_store().await;
    let cancel = AtomicBool::new(false);

    let model = analyze_store(&store, &Default::default(), &cancel).expect("Analysis failed");
    save_model(&mut store, &model).expect("Save failed");

    let loaded = load_model(&store).unwrap().expect("artifacts stored");
    assert_eq!(loaded.page_types.len(), model.page_types.len());
    assert_eq!(loaded.navigation, model.navigation);
}

#[tokio::test]
async fn test_empty_store_fails_analysis() {
    let (_dir, db_path) = temp_db();
    let store = open(&db_path);
    let cancel = AtomicBool::new(false);

    let result = analyze_store(&store, &Default::default(), &cancel);
    assert!(matches!(result, Err(AnalysisError::NoPages)));
}
