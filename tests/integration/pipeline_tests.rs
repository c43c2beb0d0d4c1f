//! Scheduler → downloader → cache, end to end

use crate::common::{StubSession, StubSite};
use crate::scheduler_tests::{bakersfield, write_table, LINKS_CSV};
use schoolscrape::config::SessionConfig;
use schoolscrape::downloader::{Delayer, Downloader, HttpSession, Queue, RunOutcome};
use schoolscrape::output::export_datasets;
use schoolscrape::query::Query;
use schoolscrape::scheduler::{Scheduler, Source};
use schoolscrape::sites::greatschools::LinksSite;
use schoolscrape::storage::{open_storage, CacheSink, RunStatus, Storage};
use schoolscrape::vpn::VpnRotator;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing(rows: &[(&str, &str)], next: Option<&str>) -> String {
    let items: String = rows
        .iter()
        .map(|(href, name)| {
            format!(
                r#"<li><a class="name" href="{}">{}</a>
                   <div class="address">1 Main St, Bakersfield, CA 93301</div>
                   <div><span class="open-sans">Public district, K-5</span></div></li>"#,
                href, name
            )
        })
        .collect();

    let pages = match next {
        Some(href) => format!(
            r#"<a href="{}"><span class="icon-chevron-right"></span></a>"#,
            href
        ),
        None => r#"<a class="disabled" href="?"><span class="icon-chevron-right"></span></a>"#
            .to_string(),
    };

    format!(
        r#"<html><body>
             <div class="pagination-summary">Showing {} schools found</div>
             <section class="school-list"><ol>{}</ol></section>
             <div class="pagination-container">{}</div>
           </body></html>"#,
        rows.len(),
        items,
        pages
    )
}

#[tokio::test]
async fn test_bakersfield_run_caches_three_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(dir.path(), "links.csv", LINKS_CSV);
    let mut storage = open_storage(&dir.path().join("cache.db")).unwrap();

    let queue = Scheduler::new(Source::Links(table))
        .queue(&bakersfield(), 3)
        .unwrap();
    assert_eq!(queue.len(), 3);

    let (session, log) = StubSession::new();
    let mut downloader = Downloader::new(
        Box::new(StubSite::new()),
        Box::new(session),
        queue,
        Delayer::none(),
        VpnRotator::disabled(),
    );

    let run_id = storage.create_run("schools", "hash").unwrap();
    let report = {
        let mut sink = CacheSink::new(&mut storage, run_id, "schools");
        downloader.run(&mut sink).await.unwrap()
    };
    storage
        .save_query_states(run_id, "schools", downloader.queue().entries())
        .unwrap();
    storage.finish_run(run_id, RunStatus::Completed).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.yielded, 3);
    assert_eq!(log.lock().unwrap().loads.len(), 3);

    let datasets = storage.load_datasets("schools").unwrap();
    let gids: Vec<_> = datasets
        .iter()
        .map(|(query, _)| query.get("GID").unwrap().to_string())
        .collect();
    assert_eq!(
        gids,
        vec![
            "/california/bakersfield/1-Alpha/",
            "/california/bakersfield/3-Gamma/",
            "/california/bakersfield/5-Epsilon/",
        ]
    );
    assert!(datasets.iter().all(|(_, dataset)| dataset.len() == 1));

    let since = chrono::Utc::now() - chrono::Duration::days(30);
    let fresh = storage.fresh_keys("schools", since).unwrap();
    assert_eq!(fresh.len(), 3);

    // a second scheduling pass skips everything resolved within the window
    let requeued = Scheduler::new(Source::Links(dir.path().join("links.csv")))
        .skip(fresh)
        .queue(&bakersfield(), 3)
        .unwrap();
    assert!(requeued.is_empty());

    let written = export_datasets(&storage, "schools", &dir.path().join("export")).unwrap();
    assert_eq!(written.len(), 1);
    let csv = std::fs::read_to_string(&written[0]).unwrap();
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn test_links_stage_follows_pagination_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/search.zipcode"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(
            &[("/california/bakersfield/3-Gamma/", "Gamma")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/search.zipcode"))
        .and(query_param("zip", "93301"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(
            &[
                ("/california/bakersfield/1-Alpha/", "Alpha"),
                ("/california/bakersfield/2-Beta/", "Beta"),
            ],
            Some("/search/search.zipcode?zip=93301&page=2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/search.zipcode"))
        .and(query_param("zip", "99999"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<span class="heading">Your search did not return any schools</span>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut storage = open_storage(&dir.path().join("cache.db")).unwrap();

    let queries = vec![
        Query::new([("dataset", "school"), ("zipcode", "93301")]),
        Query::new([("dataset", "school"), ("zipcode", "99999")]),
    ];
    let session = HttpSession::new(SessionConfig {
        user_agents: vec!["test-agent".into()],
        ..SessionConfig::default()
    })
    .unwrap();

    let mut downloader = Downloader::new(
        Box::new(LinksSite::new(&server.uri()).unwrap()),
        Box::new(session),
        Queue::new(queries, 2),
        Delayer::none(),
        VpnRotator::disabled(),
    );

    let run_id = storage.create_run("links", "hash").unwrap();
    let report = {
        let mut sink = CacheSink::new(&mut storage, run_id, "links");
        downloader.run(&mut sink).await.unwrap()
    };

    assert_eq!(report.summary.success, 2);
    assert_eq!(downloader.vpn().trips(), 0);

    let datasets = storage.load_datasets("links").unwrap();
    assert_eq!(datasets.len(), 2);

    let (query, dataset) = &datasets[0];
    assert_eq!(query.get("zipcode"), Some("93301"));
    let links = dataset.table("links").unwrap();
    assert_eq!(links.len(), 3);
    assert_eq!(links[2]["GID"], "/california/bakersfield/3-Gamma/");
    assert!(links.iter().all(|row| row["zipcode"] == "93301"));

    assert_eq!(datasets[1].0.get("zipcode"), Some("99999"));
    assert!(datasets[1].1.is_empty());
}
