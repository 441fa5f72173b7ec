use crate::harness::{ARTICLE_HTML, ARTICLE_URL, Workspace};
use readbot::config::Config;
use readbot::coordinator::{Request, Response, StaticMarkupSource};

fn get_page(url: &str, markup: Option<&str>) -> Request {
    Request::GetPageData {
        url: url.into(),
        markup: markup.map(Into::into),
    }
}

#[tokio::test]
async fn extracted_page_is_served_from_cache_without_re_extraction() {
    // The markup source knows nothing, so a second extraction would fail.
    let ws = Workspace::new(StaticMarkupSource::new()).await;

    let first = ws
        .coordinator
        .handle(get_page(ARTICLE_URL, Some(ARTICLE_HTML)))
        .await;
    let Response::PageDataLoaded { data } = &first else {
        panic!("expected PAGE_DATA_LOADED, got {first:?}");
    };
    assert!(data.content.starts_with("# Why Rust"));
    assert!(data.content.contains("memory safety"));
    assert!(!data.content.contains("Copyright"));
    assert!(!data.content.contains("Home"));

    let second = ws.coordinator.handle(get_page(ARTICLE_URL, None)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn url_variants_share_one_cache_entry() {
    let ws = Workspace::new(StaticMarkupSource::new()).await;
    ws.coordinator
        .handle(get_page(ARTICLE_URL, Some(ARTICLE_HTML)))
        .await;

    let padded = format!("  {ARTICLE_URL}  ");
    let response = ws.coordinator.handle(get_page(&padded, None)).await;
    assert!(matches!(response, Response::PageDataLoaded { .. }));
}

#[tokio::test]
async fn cached_pages_survive_a_restart() {
    let ws = Workspace::new(StaticMarkupSource::new()).await;
    ws.coordinator
        .handle(get_page(ARTICLE_URL, Some(ARTICLE_HTML)))
        .await;

    let restarted = ws.reopen().await;
    let response = restarted.handle(get_page(ARTICLE_URL, None)).await;
    assert!(matches!(response, Response::PageDataLoaded { .. }));
}

#[tokio::test]
async fn least_recently_used_page_is_evicted_at_capacity() {
    let mut config = Config::default();
    config.cache.max_entries = 2;
    let ws = Workspace::with_config(config, StaticMarkupSource::new()).await;

    for n in 1..=3 {
        let url = format!("https://example.com/{n}");
        let html = format!("<article><h1>Page {n}</h1><p>Body of page number {n}.</p></article>");
        let response = ws.coordinator.handle(get_page(&url, Some(&html))).await;
        assert!(matches!(response, Response::PageDataLoaded { .. }));
    }

    let evicted = ws
        .coordinator
        .handle(get_page("https://example.com/1", None))
        .await;
    assert_eq!(
        evicted,
        Response::PageDataError {
            error: "page_loading".into()
        }
    );
    assert_eq!(
        ws.coordinator.cache().recent_urls().await.unwrap(),
        vec!["https://example.com/3", "https://example.com/2"]
    );
}

#[tokio::test]
async fn saved_extraction_method_applies_to_new_pages() {
    let ws = Workspace::new(StaticMarkupSource::new()).await;
    let saved = ws
        .coordinator
        .handle_json(serde_json::json!({
            "type": "SAVE_CONFIG",
            "config": {"defaultExtractionMethod": "downloadApi"}
        }))
        .await;
    assert_eq!(saved, Response::ConfigSaved);

    let response = ws
        .coordinator
        .handle(get_page(ARTICLE_URL, Some(ARTICLE_HTML)))
        .await;
    assert_eq!(
        response,
        Response::PageDataError {
            error: "Download API endpoint is required".into()
        }
    );
}
