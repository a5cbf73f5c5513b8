//! Integration tests for the scheduler
//!
//! These tests drive full runs against an in-memory site, so link
//! following, dedup, depth limits and termination are exercised without
//! any network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_mirror::config::CrawlerConfig;
use sumi_mirror::crawler::{DownloadResult, DownloadTask, Downloader, Scheduler};
use sumi_mirror::url::UrlResolver;
use sumi_mirror::MirrorError;
use tokio_util::sync::CancellationToken;

const SEED: &str = "http://example.com/";

/// What the fake site returns for a URL
#[derive(Clone)]
enum Page {
    Links(Vec<String>),
    Fail,
    /// Never answers until the run is cancelled
    Hang,
    Panic,
}

/// In-memory site; unknown URLs are empty pages
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, Page>,
    requested: Mutex<Vec<String>>,
}

impl FakeSite {
    fn page(mut self, url: &str, page: Page) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    fn requested(&self) -> Vec<String> {
        let mut urls = self.requested.lock().unwrap().clone();
        urls.sort();
        urls
    }
}

#[async_trait]
impl Downloader for FakeSite {
    async fn download(
        &self,
        cancel: &CancellationToken,
        task: &DownloadTask,
    ) -> Result<DownloadResult, MirrorError> {
        self.requested.lock().unwrap().push(task.url.clone());

        match self.pages.get(&task.url).cloned() {
            Some(Page::Links(links)) => Ok(DownloadResult {
                links,
                ..DownloadResult::new(task.clone())
            }),
            Some(Page::Fail) => Err(MirrorError::HttpStatus {
                url: task.url.clone(),
                status: 500,
            }),
            Some(Page::Hang) => {
                cancel.cancelled().await;
                Err(MirrorError::Cancelled)
            }
            Some(Page::Panic) => panic!("downloader crashed on {}", task.url),
            None => Ok(DownloadResult::new(task.clone())),
        }
    }
}

fn links(urls: &[&str]) -> Page {
    Page::Links(urls.iter().map(|u| u.to_string()).collect())
}

fn scheduler(site: Arc<FakeSite>, max_depth: u32, workers: usize) -> Scheduler {
    let config = CrawlerConfig {
        url: SEED.to_string(),
        max_depth,
        workers,
        ..CrawlerConfig::default()
    };
    Scheduler::new(config, site, Arc::new(UrlResolver))
}

async fn run(scheduler: &Scheduler) -> Result<(), MirrorError> {
    tokio::time::timeout(
        Duration::from_secs(10),
        scheduler.start(CancellationToken::new()),
    )
    .await
    .expect("scheduler did not terminate")
}

#[tokio::test]
async fn test_depth_zero_downloads_only_seed() {
    let site = Arc::new(
        FakeSite::default().page(SEED, links(&["/1", "/2", "/3", "/4", "/5"])),
    );
    let scheduler = scheduler(Arc::clone(&site), 0, 4);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!((stats.total, stats.completed, stats.failed), (1, 1, 0));
    assert_eq!(site.requested(), vec![SEED]);
}

#[tokio::test]
async fn test_fragment_variant_is_deduplicated() {
    let site = Arc::new(FakeSite::default().page(SEED, links(&["/a", "/b", "/a#frag"])));
    let scheduler = scheduler(Arc::clone(&site), 1, 4);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(
        site.requested(),
        vec!["http://example.com/", "http://example.com/a", "http://example.com/b"]
    );
}

#[tokio::test]
async fn test_cross_domain_link_never_scheduled() {
    let site = Arc::new(FakeSite::default().page(SEED, links(&["http://other.com/x"])));
    let scheduler = scheduler(Arc::clone(&site), 3, 2);

    run(&scheduler).await.unwrap();

    assert_eq!(scheduler.stats().total, 1);
    assert!(!scheduler.is_visited("http://other.com/x"));
}

#[tokio::test]
async fn test_failed_page_links_not_followed() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/a", "/b"]))
            .page("http://example.com/a", Page::Fail)
            .page("http://example.com/b", links(&["/b1", "/b2"])),
    );
    let scheduler = scheduler(Arc::clone(&site), 2, 3);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!(stats.total, 5);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 4);
    assert!(scheduler.is_visited("http://example.com/b1"));
    assert!(scheduler.is_visited("http://example.com/b2"));
}

#[tokio::test]
async fn test_cancel_after_first_result() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/slow1", "/slow2"]))
            .page("http://example.com/slow1", Page::Hang)
            .page("http://example.com/slow2", Page::Hang),
    );
    let scheduler = Arc::new(scheduler(site, 1, 2));
    let cancel = CancellationToken::new();

    let handle = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.start(cancel).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.stats().completed < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("seed never completed");

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("start did not return after cancellation")
        .unwrap();

    assert!(matches!(result, Err(MirrorError::Cancelled)));
    let stats = scheduler.stats();
    assert_eq!(stats.total, 3);
    assert!(stats.total > stats.completed + stats.failed);
}

#[tokio::test]
async fn test_shared_link_downloaded_once() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/a", "/b"]))
            .page("http://example.com/a", links(&["/shared", "/b"]))
            .page("http://example.com/b", links(&["/shared", "/a"])),
    );
    let scheduler = scheduler(Arc::clone(&site), 3, 4);

    run(&scheduler).await.unwrap();

    let requested = site.requested();
    let shared = requested
        .iter()
        .filter(|u| u.as_str() == "http://example.com/shared")
        .count();
    assert_eq!(shared, 1);
    assert_eq!(scheduler.stats().total, 4);
    assert_eq!(scheduler.visited_count(), 4);
}

#[tokio::test]
async fn test_cyclic_graph_terminates() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/a"]))
            .page("http://example.com/a", links(&["/b", "/"]))
            .page("http://example.com/b", links(&["/a", "/"])),
    );
    let scheduler = scheduler(Arc::clone(&site), 10, 2);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending(), 0);
    assert_eq!(stats.total, stats.completed + stats.failed);
}

#[tokio::test]
async fn test_wide_fan_out_with_single_worker() {
    // Far more children than the bounded queues can hold at once
    let children = (0..200).map(|i| format!("/page{}", i)).collect();
    let site = Arc::new(FakeSite::default().page(SEED, Page::Links(children)));
    let scheduler = scheduler(Arc::clone(&site), 1, 1);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!(stats.total, 201);
    assert_eq!(stats.completed, 201);
    assert_eq!(site.requested().len(), 201);
}

#[tokio::test]
async fn test_depth_ceiling() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/1"]))
            .page("http://example.com/1", links(&["/2"]))
            .page("http://example.com/2", links(&["/3"]))
            .page("http://example.com/3", links(&["/4"])),
    );
    let scheduler = scheduler(Arc::clone(&site), 2, 2);

    run(&scheduler).await.unwrap();

    assert_eq!(scheduler.stats().total, 3);
    assert!(scheduler.is_visited("http://example.com/2"));
    assert!(!scheduler.is_visited("http://example.com/3"));
}

#[tokio::test]
async fn test_stop_ends_run_with_ok() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/hang"]))
            .page("http://example.com/hang", Page::Hang),
    );
    let scheduler = Arc::new(scheduler(site, 1, 1));

    let handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start(CancellationToken::new()).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.stats().completed < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("seed never completed");

    scheduler.stop();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("start did not return after stop")
        .unwrap();

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_panicking_download_counts_as_failed() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/a", "/b"]))
            .page("http://example.com/a", Page::Panic),
    );
    let scheduler = scheduler(Arc::clone(&site), 1, 2);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!((stats.total, stats.completed, stats.failed), (3, 2, 1));
    assert_eq!(stats.pending(), 0);
}

#[tokio::test]
async fn test_panic_with_single_worker_still_finishes() {
    let site = Arc::new(
        FakeSite::default()
            .page(SEED, links(&["/a", "/b"]))
            .page("http://example.com/a", Page::Panic),
    );
    let scheduler = scheduler(Arc::clone(&site), 1, 1);

    run(&scheduler).await.unwrap();

    let stats = scheduler.stats();
    assert_eq!((stats.total, stats.completed, stats.failed), (3, 2, 1));
    assert_eq!(stats.pending(), 0);
    assert_eq!(
        site.requested(),
        vec!["http://example.com/", "http://example.com/a", "http://example.com/b"]
    );
    assert_eq!(
        scheduler.summary().unwrap().outcome,
        sumi_mirror::output::RunOutcome::Finished
    );
}
