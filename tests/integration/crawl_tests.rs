//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with an in-memory fetcher serving a
//! small synthetic site; the last one runs the HTTP fetcher against a
//! wiremock server end-to-end.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use villa_sweep::config::{Config, OutputConfig};
use villa_sweep::crawler::{Coordinator, FetchError, Fetcher};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "https://villa.az";

fn page_url(page: u32) -> String {
    format!("{}/search?category=villa&page={}", SITE, page)
}

fn listing_path(id: u32) -> String {
    format!("/satilir-villa-mardakan-{}", id)
}

/// Search page linking to `ids`, with a pagination control up to `last_page`
fn search_page(ids: &[u32], last_page: u32) -> String {
    let cards: String = ids
        .iter()
        .map(|id| format!(r#"<a href="{}">Villa {}</a>"#, listing_path(*id), id))
        .collect();
    let pagination: String = (1..=last_page)
        .map(|p| format!(r#"<li><a href="/search?category=villa&page={p}">{p}</a></li>"#))
        .collect();

    format!(
        r#"<html><body><div class="cards">{}</div><ul class="pagination">{}</ul></body></html>"#,
        cards, pagination
    )
}

/// A listing page with every core field present
fn listing_page(id: u32) -> String {
    format!(
        r#"<html><body>
          <h1 class="elan-single-wrapper-top--title">Villa {id} ID # {id}</h1>
          <div class="elan-single-wrapper-top--price">{price} AZN</div>
          <table class="table-info-1">
            <tr><td>Şəhər:</td><td>Bakı</td></tr>
            <tr><td>Kateqoriya:</td><td>Bağ evi / Villa</td></tr>
            <tr><td>Sahə:</td><td>250 m²</td></tr>
          </table>
          <ul class="elan-single-owner-phon-list">
            <li><a href="tel:+99450{id:07}">+994 50 {id:07}</a></li>
          </ul>
          <ul class="elan-single-owner-info"><li>Mülkiyyətçi</li></ul>
        </body></html>"#,
        id = id,
        price = 100_000 + id
    )
}

/// In-memory site with instrumentation
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, String>,
    missing: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
    latency: Duration,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSite {
    /// `pages` search pages of `per_page` listings each, with unique ids
    fn paginated(pages: u32, per_page: u32) -> Self {
        let mut site = Self::default();
        for page in 1..=pages {
            let ids: Vec<u32> = (0..per_page).map(|i| page * 1000 + i).collect();
            site.add_search_page(page, &ids, pages);
        }
        site
    }

    fn add_search_page(&mut self, page: u32, ids: &[u32], last_page: u32) {
        self.pages.insert(page_url(page), search_page(ids, last_page));
        for id in ids {
            self.pages
                .insert(format!("{}{}", SITE, listing_path(*id)), listing_page(*id));
        }
    }

    fn listing_fetches(&self) -> usize {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|url| !url.contains("/search"))
            .count()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == url {
                token.cancel();
            }
        }

        if self.missing.contains(url) {
            return Err(FetchError::HttpStatus(404));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or(FetchError::HttpStatus(404))
    }
}

fn test_config(dir: &TempDir) -> Config {
    let prefix = dir.path().join("listings");
    let mut config = Config::default();
    config.crawler.search_url = Some(format!("{}/search?category=villa", SITE));
    config.crawler.delay_seconds = 0.0;
    config.crawler.max_concurrent = 4;
    config.crawler.batch_size = 8;
    config.crawler.checkpoint_interval = 5;
    config.output = OutputConfig {
        log_path: dir.path().join("sweep.log").to_string_lossy().to_string(),
        ..OutputConfig::with_prefix(&prefix.to_string_lossy())
    };
    config
}

/// Reads the CSV export as header-keyed rows
fn read_export(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).expect("Failed to open export");
    let headers = reader.headers().expect("Missing header").clone();
    reader
        .records()
        .map(|row| {
            let row = row.expect("Malformed row");
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

fn column(rows: &[HashMap<String, String>], name: &str) -> Vec<String> {
    rows.iter().map(|row| row[name].clone()).collect()
}

async fn sweep(
    config: Config,
    site: Arc<FakeSite>,
    cancel: CancellationToken,
) -> villa_sweep::RunSummary {
    Coordinator::with_fetcher(config, site, cancel)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Sweep failed")
}

#[tokio::test]
async fn test_full_sweep_exports_every_listing() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::paginated(3, 10));

    let summary = sweep(test_config(&dir), Arc::clone(&site), CancellationToken::new()).await;

    assert_eq!(summary.pages_discovered, 3);
    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.listings_queued, 30);
    assert_eq!(summary.listings_completed, 30);
    assert_eq!(summary.listings_failed, 0);
    assert_eq!(summary.complete_records, 30);
    assert_eq!(summary.listings_with_phone, 30);
    assert!(!summary.cancelled);

    let rows = read_export(&summary.artifacts.csv_path);
    assert_eq!(rows.len(), 30);
    assert!(rows.iter().all(|row| row["status"] == "ok"));
    assert!(rows.iter().all(|row| row["complete"] == "true"));
    assert!(summary.artifacts.xlsx_path.exists());
    assert!(summary.artifacts.checkpoint_path.exists());

    // Each page fetched exactly once, page 1 included
    let fetched = site.fetched.lock().unwrap().clone();
    assert_eq!(fetched.iter().filter(|u| **u == page_url(1)).count(), 1);
}

#[tokio::test]
async fn test_failed_listing_still_exported() {
    let dir = TempDir::new().unwrap();
    let mut site = FakeSite::paginated(3, 10);
    let broken = format!("{}{}", SITE, listing_path(2003));
    site.missing.insert(broken.clone());

    let summary = sweep(test_config(&dir), Arc::new(site), CancellationToken::new()).await;

    assert_eq!(summary.listings_completed, 29);
    assert_eq!(summary.listings_failed, 1);

    let rows = read_export(&summary.artifacts.csv_path);
    assert_eq!(rows.len(), 30);

    let row = rows
        .iter()
        .find(|row| row["url"] == broken)
        .expect("Failed listing missing from export");
    assert_eq!(row["id"], "2003");
    assert_eq!(row["complete"], "false");
    assert!(row["status"].starts_with("failed"));
    assert_eq!(row["title"], "unknown");
}

#[tokio::test]
async fn test_listing_on_several_pages_exported_once() {
    let dir = TempDir::new().unwrap();
    let mut site = FakeSite::default();
    site.add_search_page(1, &[1, 2, 3], 2);
    site.add_search_page(2, &[3, 4, 1], 2);

    let summary = sweep(test_config(&dir), Arc::new(site), CancellationToken::new()).await;

    assert_eq!(summary.listings_queued, 4);
    let rows = read_export(&summary.artifacts.csv_path);
    let ids = column(&rows, "id");
    assert_eq!(ids, vec!["1", "2", "3", "4"]);

    // The repeated listing keeps its first discovery position
    let first = rows.iter().find(|row| row["id"] == "1").unwrap();
    assert_eq!(first["source_page"], "1");
    assert_eq!(first["page_position"], "0");
}

#[tokio::test]
async fn test_export_order_follows_pages_not_completion() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    let mut config_a = test_config(&dir_a);
    config_a.crawler.max_concurrent = 1;
    let mut config_b = test_config(&dir_b);
    config_b.crawler.max_concurrent = 8;

    let mut slow = FakeSite::paginated(3, 10);
    slow.latency = Duration::from_millis(2);

    let first = sweep(
        config_a,
        Arc::new(FakeSite::paginated(3, 10)),
        CancellationToken::new(),
    )
    .await;
    let second = sweep(config_b, Arc::new(slow), CancellationToken::new()).await;

    let urls_a = column(&read_export(&first.artifacts.csv_path), "url");
    let urls_b = column(&read_export(&second.artifacts.csv_path), "url");
    assert_eq!(urls_a, urls_b);

    let expected: Vec<String> = (1..=3)
        .flat_map(|page| (0..10).map(move |i| page * 1000 + i))
        .map(|id| format!("{}{}", SITE, listing_path(id)))
        .collect();
    assert_eq!(urls_a, expected);
}

#[tokio::test]
async fn test_finalize_twice_writes_identical_csv() {
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::with_fetcher(
        test_config(&dir),
        Arc::new(FakeSite::paginated(2, 5)),
        CancellationToken::new(),
    )
    .unwrap();

    let summary = coordinator.run().await.unwrap();
    let first = std::fs::read(&summary.artifacts.csv_path).unwrap();

    let artifacts = coordinator.sink().finalize().unwrap();
    let second = std::fs::read(&artifacts.csv_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(artifacts.rows, 10);
}

#[tokio::test]
async fn test_in_flight_requests_never_exceed_limit() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.crawler.max_concurrent = 3;
    config.crawler.batch_size = 20;

    let mut site = FakeSite::paginated(4, 10);
    site.latency = Duration::from_millis(5);
    let site = Arc::new(site);

    let summary = sweep(config, Arc::clone(&site), CancellationToken::new()).await;

    assert_eq!(summary.listings_completed, 40);
    let peak = site.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "Saw {} requests in flight", peak);
    assert!(peak >= 2, "Requests never overlapped");
}

#[tokio::test]
async fn test_cancel_after_first_page_exports_first_page_only() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.crawler.max_concurrent = 1;

    let cancel = CancellationToken::new();
    let mut site = FakeSite::paginated(3, 10);
    site.cancel_on = Some((page_url(1), cancel.clone()));
    let site = Arc::new(site);

    let summary = sweep(config, Arc::clone(&site), cancel).await;

    assert!(summary.cancelled);
    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.listings_cancelled, 10);
    assert_eq!(site.listing_fetches(), 0);

    let rows = read_export(&summary.artifacts.csv_path);
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|row| row["source_page"] == "1"));
    assert!(rows.iter().all(|row| row["status"] == "cancelled"));
    let positions = column(&rows, "page_position");
    let expected: Vec<String> = (0..10).map(|p| p.to_string()).collect();
    assert_eq!(positions, expected);
}

#[tokio::test]
async fn test_max_pages_limits_the_sweep() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.crawler.max_pages = Some(2);

    let summary = sweep(
        config,
        Arc::new(FakeSite::paginated(5, 4)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.pages_discovered, 2);
    assert_eq!(summary.listings_completed, 8);
}

#[tokio::test]
async fn test_empty_page_contributes_no_rows() {
    let dir = TempDir::new().unwrap();
    let mut site = FakeSite::default();
    site.add_search_page(1, &[1, 2], 3);
    site.add_search_page(2, &[], 3);
    site.add_search_page(3, &[3], 3);

    let summary = sweep(test_config(&dir), Arc::new(site), CancellationToken::new()).await;

    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.total_records(), 3);
}

#[tokio::test]
async fn test_missing_search_page_is_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut site = FakeSite::paginated(3, 2);
    site.missing.insert(page_url(2));

    let summary = sweep(test_config(&dir), Arc::new(site), CancellationToken::new()).await;

    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.total_records(), 4);
}

#[tokio::test]
async fn test_unreachable_first_page_aborts_without_export() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let csv_path = config.output.csv_path.clone();

    let result = Coordinator::with_fetcher(
        config,
        Arc::new(FakeSite::default()),
        CancellationToken::new(),
    )
    .unwrap()
    .run()
    .await;

    assert!(matches!(
        result,
        Err(villa_sweep::SweepError::Discovery { .. })
    ));
    assert!(!Path::new(&csv_path).exists());
}

#[tokio::test]
async fn test_resume_skips_checkpointed_listings() {
    let dir = TempDir::new().unwrap();

    let first = sweep(
        test_config(&dir),
        Arc::new(FakeSite::paginated(2, 5)),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(first.listings_completed, 10);
    let before = column(&read_export(&first.artifacts.csv_path), "url");

    let site = Arc::new(FakeSite::paginated(2, 5));
    let second = Coordinator::with_fetcher(
        test_config(&dir),
        Arc::clone(&site) as Arc<dyn Fetcher>,
        CancellationToken::new(),
    )
    .unwrap()
    .resume(true)
    .run()
    .await
    .unwrap();

    assert_eq!(site.listing_fetches(), 0);
    assert_eq!(second.listings_resumed, 10);
    assert_eq!(second.total_records(), 10);

    let after = column(&read_export(&second.artifacts.csv_path), "url");
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_resume_drops_listings_no_longer_listed() {
    let dir = TempDir::new().unwrap();

    sweep(
        test_config(&dir),
        Arc::new(FakeSite::paginated(2, 5)),
        CancellationToken::new(),
    )
    .await;

    // The site has changed: one old listing survives next to two new ones
    let mut changed = FakeSite::default();
    changed.add_search_page(1, &[1000, 9001, 9002], 1);
    let site = Arc::new(changed);

    let summary = Coordinator::with_fetcher(
        test_config(&dir),
        Arc::clone(&site) as Arc<dyn Fetcher>,
        CancellationToken::new(),
    )
    .unwrap()
    .resume(true)
    .run()
    .await
    .unwrap();

    assert_eq!(summary.listings_queued, 3);
    assert_eq!(summary.listings_resumed, 1);
    assert_eq!(summary.listings_completed, 2);
    assert_eq!(summary.total_records(), 3);
    assert_eq!(site.listing_fetches(), 2);

    let rows = read_export(&summary.artifacts.csv_path);
    assert_eq!(column(&rows, "id"), vec!["1000", "9001", "9002"]);
    assert_eq!(column(&rows, "page_position"), vec!["0", "1", "2"]);
    assert!(rows.iter().all(|row| row["source_page"] == "1"));
}

#[tokio::test]
async fn test_missing_search_url_rejected() {
    let config = Config::default();
    let result = Coordinator::with_fetcher(
        config,
        Arc::new(FakeSite::default()),
        CancellationToken::new(),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_full_sweep_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(search_page(&[11, 12], 2))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(search_page(&[21], 2))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    for id in [11, 12, 21] {
        Mock::given(method("GET"))
            .and(path(listing_path(id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(listing_page(id))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.crawler.search_url = Some(format!("{}/search?category=villa", base_url));
    config.fetcher.max_retries = 0;

    let summary = Coordinator::new(config, CancellationToken::new())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Sweep failed");

    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.listings_completed, 3);
    assert_eq!(summary.complete_records, 3);

    let rows = read_export(&summary.artifacts.csv_path);
    assert_eq!(column(&rows, "id"), vec!["11", "12", "21"]);
    assert_eq!(rows[0]["city"], "Bakı");
    assert_eq!(rows[0]["owner_type"], "owner");
}
