use std::time::Duration;

use seoscan_client::{HtmlLinkExtractor, ReqwestFetcher, SeoAnalyzer};
use seoscan_core::crawl::{PageProcessor, ProcessorConfig};
use seoscan_core::job::{RetryPolicy, WorkerConfig};
use seoscan_core::models::ScanStatus;
use seoscan_core::rate_limit::{RateLimitConfig, RateLimiter};
use seoscan_core::scan::ScanService;
use seoscan_core::traits::FrontierStore;
use seoscan_core::worker::{TracingWorkerReporter, WorkerPool};
use seoscan_db::{CrawlJobRepository, FrontierRepository};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::setup_test_db;

fn html(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(format!(
            "<html><head><title>{title}</title></head><body>{body}</body></html>"
        ))
}

fn worker_pool(
    pool: &PgPool,
    worker_id: &str,
) -> WorkerPool<
    CrawlJobRepository,
    PageProcessor<FrontierRepository, CrawlJobRepository, ReqwestFetcher, HtmlLinkExtractor, SeoAnalyzer>,
> {
    let frontier = FrontierRepository::new(pool.clone());
    let queue = CrawlJobRepository::new(pool.clone());
    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(2))
        .unwrap()
        .allow_private_urls();
    let processor = PageProcessor::new(
        frontier,
        queue.clone(),
        fetcher,
        HtmlLinkExtractor::new(),
        SeoAnalyzer::new(),
        ProcessorConfig::default(),
    );
    let config = WorkerConfig::default()
        .with_worker_id(worker_id)
        .with_concurrency(4)
        .with_poll_interval(Duration::from_millis(20))
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)))
        .exit_when_idle(true);

    WorkerPool::new(
        queue,
        processor,
        RateLimiter::new(RateLimitConfig::unlimited()),
        config,
    )
}

#[tokio::test]
async fn crawls_internal_links_only_and_completes_scan() {
    let (pool, _container) = setup_test_db().await;
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            "Home",
            r#"<a href="/about">About</a><a href="http://external.test/x">Elsewhere</a>"#,
        ))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("About us", r#"<a href="/">Home</a>"#))
        .expect(1)
        .mount(&site)
        .await;

    let frontier = FrontierRepository::new(pool.clone());
    let service = ScanService::new(frontier.clone(), CrawlJobRepository::new(pool.clone()));
    let scan = service.start(&site.uri()).await.unwrap();

    worker_pool(&pool, "worker-1")
        .run(CancellationToken::new(), &TracingWorkerReporter)
        .await
        .unwrap();

    let report = service.status(scan.id).await.unwrap();
    assert_eq!(report.counts.total, 2);
    assert_eq!(report.counts.completed, 2);
    assert_eq!(report.scan.status, ScanStatus::Completed);
    assert!(!report.completed_now, "Worker should have completed the scan");

    let observations = service.observations(scan.id).await.unwrap();
    // Both titles are short and both descriptions missing.
    assert_eq!(observations.len(), 4);
    assert_eq!(
        observations.iter().filter(|o| o.kind == "missing description").count(),
        2
    );
}

#[tokio::test]
async fn unreachable_page_fails_and_scan_still_completes() {
    let (pool, _container) = setup_test_db().await;
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Home", r#"<a href="/gone">Gone</a>"#))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&site)
        .await;

    let frontier = FrontierRepository::new(pool.clone());
    let service = ScanService::new(frontier.clone(), CrawlJobRepository::new(pool.clone()));
    let scan = service.start(&site.uri()).await.unwrap();

    worker_pool(&pool, "worker-1")
        .run(CancellationToken::new(), &TracingWorkerReporter)
        .await
        .unwrap();

    let counts = frontier.page_counts(scan.id).await.unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.failed, 1);
    let scan = frontier.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(scan.status, ScanStatus::Completed);
}

#[tokio::test]
async fn concurrent_workers_fetch_each_page_once() {
    let (pool, _container) = setup_test_db().await;
    let site = MockServer::start().await;

    // Every page links to every other page.
    let pages: Vec<String> = (0..8).map(|i| format!("/p{i}")).collect();
    let nav: String = pages
        .iter()
        .map(|p| format!(r#"<a href="{p}">{p}</a>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Home", &nav))
        .expect(1)
        .mount(&site)
        .await;
    for page in &pages {
        Mock::given(method("GET"))
            .and(path(page.as_str()))
            .respond_with(html(page, &format!(r#"<a href="/">Home</a>{nav}"#)))
            .expect(1)
            .mount(&site)
            .await;
    }

    let frontier = FrontierRepository::new(pool.clone());
    let service = ScanService::new(frontier.clone(), CrawlJobRepository::new(pool.clone()));
    let scan = service.start(&site.uri()).await.unwrap();

    let first = worker_pool(&pool, "worker-1");
    let second = worker_pool(&pool, "worker-2");
    let reporter = TracingWorkerReporter;
    let (a, b) = tokio::join!(
        first.run(CancellationToken::new(), &reporter),
        second.run(CancellationToken::new(), &reporter),
    );
    a.unwrap();
    b.unwrap();

    let counts = frontier.page_counts(scan.id).await.unwrap();
    assert_eq!(counts.total, 9);
    assert_eq!(counts.completed, 9);
    let scan = frontier.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(scan.status, ScanStatus::Completed);
    // MockServer verifies the `expect(1)` counts on drop.
}
