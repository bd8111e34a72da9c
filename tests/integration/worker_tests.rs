//! Integration tests for the crawl worker
//!
//! Listing and item pages are served by a wiremock server; the phone
//! reveal runs against an in-memory browser driver.

use async_trait::async_trait;
use ria_harvest::browser::{BrowserDriver, BrowserResult, ElementContent, Locator};
use ria_harvest::config::{parse_config, Config};
use ria_harvest::crawler::WorkerTask;
use ria_harvest::pipeline::{chunk_artifact_path, read_records};
use ria_harvest::record::ChunkJob;
use std::collections::HashMap;
use std::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ITEM_DATE: &str = "Wed, 01 May 2024 09:30:00 GMT";

/// Browser stand-in: item pages listed in `phones` show a reveal link that
/// opens the number popup when clicked
struct PhoneBookDriver {
    phones: HashMap<String, String>,
    state: Mutex<DriverState>,
}

#[derive(Default)]
struct DriverState {
    current: String,
    revealed: bool,
    navigations: Vec<String>,
}

impl PhoneBookDriver {
    fn new(phones: &[(&str, &str)]) -> Self {
        Self {
            phones: phones
                .iter()
                .map(|(path, phone)| (path.to_string(), phone.to_string()))
                .collect(),
            state: Mutex::new(DriverState::default()),
        }
    }

    fn current_phone(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        self.phones
            .iter()
            .find(|(path, _)| state.current.ends_with(path.as_str()))
            .map(|(_, phone)| phone.clone())
    }

    fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }
}

#[async_trait]
impl BrowserDriver for PhoneBookDriver {
    type Element = Locator;

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        state.current = url.to_string();
        state.revealed = false;
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> BrowserResult<Option<Locator>> {
        let has_phone = self.current_phone().is_some();
        let revealed = self.state.lock().unwrap().revealed;
        let found = match locator {
            Locator::Css(css) if css == "a.phone_show_link" => has_phone,
            Locator::Css(css) if css == "div.popup-successful-call-desk" => revealed,
            _ => false,
        };
        Ok(found.then(|| locator.clone()))
    }

    async fn is_interactable(&self, _element: &Locator) -> BrowserResult<bool> {
        Ok(true)
    }

    async fn is_displayed(&self, _element: &Locator) -> BrowserResult<bool> {
        Ok(true)
    }

    async fn click(&self, element: &Locator) -> BrowserResult<()> {
        self.dispatch_click(element).await
    }

    async fn dispatch_click(&self, _element: &Locator) -> BrowserResult<()> {
        self.state.lock().unwrap().revealed = true;
        Ok(())
    }

    async fn read(&self, _element: &Locator, attribute: Option<&str>) -> BrowserResult<ElementContent> {
        let phone = self.current_phone().unwrap_or_default();
        Ok(ElementContent {
            attribute: attribute.map(|_| phone.clone()),
            text: "(0XX) XXX XX XX".to_string(),
        })
    }

    async fn execute(&self, _script: &str) -> BrowserResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

fn test_config(base_url: &str) -> Config {
    parse_config(&format!(
        r#"
[crawler]
start-url = "{base}/uk/car/used/"
allowed-domain = "127.0.0.1"
total-pages = 2
chunks = 1
request-timeout-secs = 5

[browser]
popup-timeout-ms = 20
locate-timeout-ms = 20
reveal-timeout-ms = 100
poll-interval-ms = 5

[output]
artifact-dir = "./artifacts"
canonical-path = "./artifacts/data.json"
database-path = "./harvest.db"
"#,
        base = base_url
    ))
    .expect("test config is valid")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

fn item_page(title: &str, price: &str, vin: &str) -> ResponseTemplate {
    html(format!(
        r#"<html><head><meta property="og:image" content="https://cdn.example/{vin}.jpg"></head>
        <body>
          <h1 class="head">{title}</h1>
          <span data-currency="USD">{price}</span>
          <div class="bold dhide">120 тис. км</div>
          <span class="label-vin">{vin}</span>
          <div class="action_disp_all_block"><a class="show-all">Всі 9 фото</a></div>
        </body></html>"#
    ))
    .insert_header("Date", ITEM_DATE)
}

/// Two listing pages:
/// - page 1 links to auto_1 (has a phone) and a promoted new car
/// - page 2 links to auto_1 again, auto_2 (no phone), auto_3 (deleted)
///   and auto_4 (server error)
async fn mount_site(server: &MockServer) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/uk/car/used/"))
        .and(query_param("page", "1"))
        .respond_with(html(format!(
            r#"<html><body>
              <a class="address" href="/uk/auto_1.html">BMW</a>
              <a class="address" href="/uk/newauto/auto_99.html">New Kia</a>
              <a class="page-link js-next" href="{}/uk/car/used/?page=2">»</a>
            </body></html>"#,
            base
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/uk/car/used/"))
        .and(query_param("page", "2"))
        .respond_with(html(
            r#"<html><body>
              <a class="address" href="/uk/auto_1.html">BMW again</a>
              <a class="address" href="/uk/auto_2.html">Audi</a>
              <a class="address" href="/uk/auto_3.html">Removed</a>
              <a class="address" href="/uk/auto_4.html">Broken</a>
            </body></html>"#
                .to_string(),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/uk/auto_1.html"))
        .respond_with(item_page("BMW X5 2018", "32 500", "WBAKS410X00A12345"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/uk/auto_2.html"))
        .respond_with(item_page("Audi A4 2015", "14 200", "WAUZZZ8K9FA000001"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/uk/auto_3.html"))
        .respond_with(html(
            r#"<html><body><div class="notice_head">Оголошення видалено і не бере участі в пошуку</div></body></html>"#
                .to_string(),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/uk/auto_4.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_worker_crawls_page_range() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let config = test_config(&server.uri());
    let driver = PhoneBookDriver::new(&[("/uk/auto_1.html", "050 123 45 67")]);
    let mut task = WorkerTask::new(&config, driver).unwrap();

    let (records, report) = task.crawl(1, 2).await;

    assert_eq!(report.listing_pages, 2);
    assert_eq!(report.items_seen, 4);
    assert_eq!(report.records, 2);
    assert_eq!(report.deleted_skipped, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.phones_revealed, 1);

    let bmw = &records[0];
    assert!(bmw.url.ends_with("/uk/auto_1.html"));
    assert_eq!(bmw.title, "BMW X5 2018");
    assert_eq!(bmw.price_usd, Some(32_500));
    assert_eq!(bmw.odometer_km, Some(120_000));
    assert_eq!(bmw.vin, "WBAKS410X00A12345");
    assert_eq!(bmw.phone_number, "380501234567");
    assert_eq!(bmw.images_count, 8);
    assert_eq!(bmw.observed_at.as_deref(), Some(ITEM_DATE));

    let audi = &records[1];
    assert!(audi.url.ends_with("/uk/auto_2.html"));
    assert_eq!(audi.phone_number, "");
    assert_eq!(audi.price_usd, Some(14_200));

    // Only item pages that survived the HTTP fetch reach the browser
    let navigations = task.into_driver().navigations();
    assert_eq!(navigations.len(), 2);
}

#[tokio::test]
async fn test_worker_starts_at_its_first_page() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let config = test_config(&server.uri());
    let mut task = WorkerTask::new(&config, PhoneBookDriver::new(&[])).unwrap();

    // Page 2 has no next link, so a longer range stops after one page
    let (records, report) = task.crawl(2, 5).await;

    assert_eq!(report.listing_pages, 1);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.phone_number.is_empty()));
}

#[tokio::test]
async fn test_worker_respects_page_count() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let config = test_config(&server.uri());
    let mut task = WorkerTask::new(&config, PhoneBookDriver::new(&[])).unwrap();

    let (records, report) = task.crawl(1, 1).await;

    assert_eq!(report.listing_pages, 1);
    assert_eq!(records.len(), 1);
    assert!(records[0].url.ends_with("/uk/auto_1.html"));
}

#[tokio::test]
async fn test_worker_run_writes_artifact() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&server.uri());
    let driver = PhoneBookDriver::new(&[("/uk/auto_1.html", "0501234567")]);
    let mut task = WorkerTask::new(&config, driver).unwrap();

    let job = ChunkJob {
        index: 1,
        start_page: 1,
        end_page: 2,
        artifact_path: chunk_artifact_path(dir.path(), 1),
    };
    let report = task.run(&job).await.unwrap();

    let stored = read_records(&job.artifact_path, "380").unwrap();
    assert_eq!(stored.len() as u32, report.records);
    assert_eq!(stored[0].phone_number, "380501234567");
}

#[tokio::test]
async fn test_unreachable_listing_yields_empty_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9");
    let mut task = WorkerTask::new(&config, PhoneBookDriver::new(&[])).unwrap();

    let job = ChunkJob {
        index: 2,
        start_page: 1,
        end_page: 3,
        artifact_path: chunk_artifact_path(dir.path(), 2),
    };
    let report = task.run(&job).await.unwrap();

    assert_eq!(report.listing_pages, 0);
    assert!(read_records(&job.artifact_path, "380").unwrap().is_empty());
}
