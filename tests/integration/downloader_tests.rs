//! Downloader state machine against stub pages and sessions

use crate::common::{gid, Behavior, CountingReconnector, StubSession, StubSite};
use schoolscrape::config::VpnConfig;
use schoolscrape::downloader::{Delayer, Downloader, Queue, RunOutcome, Yielded};
use schoolscrape::state::QueryState;
use schoolscrape::vpn::VpnRotator;
use schoolscrape::ScrapeError;
use std::sync::Arc;

fn downloader(site: StubSite, session: StubSession, queue: Queue, vpn: VpnRotator) -> Downloader {
    Downloader::new(
        Box::new(site),
        Box::new(session),
        queue,
        Delayer::none(),
        vpn,
    )
}

#[tokio::test]
async fn test_bad_request_is_empty_success_without_trip() {
    let query = gid(1);
    let site = StubSite::new().with(&query, Behavior::BadRequest);
    let (session, log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![query.clone()], 3),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    let report = downloader.run(&mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.success, 1);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].query, query);
    assert!(sink[0].dataset.is_empty());

    assert_eq!(downloader.vpn().trips(), 0);
    assert_eq!(log.lock().unwrap().trips, 0);
    assert_eq!(log.lock().unwrap().loads.len(), 1);
}

#[tokio::test]
async fn test_captcha_trips_once_and_abandons() {
    let blocked = gid(1);
    let site = StubSite::new().with(&blocked, Behavior::Captcha);
    let (session, log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![blocked.clone(), gid(2)], 3),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    let report = downloader.run(&mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.abandoned, 1);
    assert_eq!(report.summary.success, 1);
    assert_eq!(downloader.vpn().trips(), 1);

    let log = log.lock().unwrap();
    assert_eq!(log.trips, 1);
    // the next dequeue found the session dead and reset it
    assert_eq!(log.resets, 1);
    assert_eq!(log.loads.len(), 2);

    let entry = downloader.queue().entry(&blocked).unwrap();
    assert_eq!(entry.state, QueryState::Abandoned);
    assert_eq!(entry.attempts, 1);

    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].query, gid(2));
}

#[tokio::test]
async fn test_fatal_error_marks_errored_and_propagates() {
    let broken = gid(2);
    let site = StubSite::new().with(&broken, Behavior::Fatal);
    let (session, _log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![gid(1), broken.clone(), gid(3)], 3),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    let error = downloader.run(&mut sink).await.unwrap_err();

    assert!(matches!(error, ScrapeError::Extraction { .. }));
    assert_eq!(sink.len(), 1, "results before the error are kept");

    let queue = downloader.queue();
    assert!(queue.is_closed());
    assert_eq!(queue.entry(&broken).unwrap().state, QueryState::Error);
    assert_eq!(queue.entry(&gid(1)).unwrap().state, QueryState::Success);
    assert_eq!(queue.entry(&gid(3)).unwrap().state, QueryState::Abandoned);
}

#[tokio::test]
async fn test_stale_page_is_retried_until_attempts_run_out() {
    let flaky = gid(1);
    let site = StubSite::new().with(&flaky, Behavior::Stale);
    let (session, log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![flaky.clone(), gid(2)], 2),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    let report = downloader.run(&mut sink).await.unwrap();

    assert_eq!(report.summary.failure, 1);
    assert_eq!(report.summary.success, 1);
    assert_eq!(report.cycles, 3);

    let entry = downloader.queue().entry(&flaky).unwrap();
    assert_eq!(entry.state, QueryState::Failure);
    assert_eq!(entry.attempts, 2);
    assert_eq!(log.lock().unwrap().trips, 0);
}

#[tokio::test]
async fn test_page_without_rows_yields_empty_dataset() {
    let query = gid(1);
    let site = StubSite::new().with(&query, Behavior::Empty);
    let (session, _log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![query.clone()], 1),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    downloader.run(&mut sink).await.unwrap();

    assert_eq!(sink.len(), 1);
    assert!(sink[0].dataset.is_empty());
    assert_eq!(
        downloader.queue().entry(&query).unwrap().state,
        QueryState::Success
    );
}

#[tokio::test]
async fn test_again_reruns_extraction_in_place() {
    let query = gid(1);
    let site = StubSite::new().with(&query, Behavior::Again(3));
    let (session, log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![query.clone()], 1),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    let report = downloader.run(&mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.success, 1);
    assert_eq!(log.lock().unwrap().loads.len(), 1);

    // the first pass plus one per Again, all within the same cycle
    assert_eq!(sink.len(), 4);
    assert!(sink.iter().all(|y| y.query == query && y.cycle == sink[0].cycle));
    let passes: Vec<_> = sink
        .iter()
        .map(|y| y.dataset.table("stub").unwrap()[0]["pass"].clone())
        .collect();
    assert_eq!(passes, vec!["0", "1", "2", "3"]);
}

#[tokio::test]
async fn test_endless_continuations_are_capped() {
    let endless = gid(1);
    let site = StubSite::new().with(&endless, Behavior::AgainForever);
    let (session, log) = StubSession::new();
    let mut downloader = downloader(
        site,
        session,
        Queue::new(vec![endless.clone(), gid(2)], 1),
        VpnRotator::disabled(),
    );

    let mut sink: Vec<Yielded> = Vec::new();
    let report = downloader.run(&mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.success, 2);
    assert_eq!(log.lock().unwrap().loads.len(), 2);

    let endless_passes = sink.iter().filter(|y| y.query == endless).count();
    // the first pass plus 1000 continuation steps
    assert_eq!(endless_passes, 1001);
    assert_eq!(sink.last().unwrap().query, gid(2));
}

#[tokio::test]
async fn test_vpn_exhaustion_abandons_and_stops() {
    // first captcha rotates successfully; the second exhausts the budget
    let site = StubSite::new()
        .with(&gid(1), Behavior::Captcha)
        .with(&gid(3), Behavior::Captcha);
    let (session, _log) = StubSession::new();
    let reconnector = Arc::new(CountingReconnector::default());
    let vpn = VpnRotator::spawn(
        reconnector.clone(),
        &VpnConfig {
            enabled: true,
            max_rotations: 1,
            timeout_secs: 5,
            ..VpnConfig::default()
        },
    );

    let queries = vec![gid(1), gid(2), gid(3), gid(4), gid(5)];
    let mut downloader = downloader(site, session, Queue::new(queries, 3), vpn);

    let mut sink: Vec<Yielded> = Vec::new();
    let report = downloader.run(&mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Terminated);
    assert_eq!(report.summary.success, 1);
    assert_eq!(report.summary.abandoned, 4);
    assert_eq!(report.summary.total, 5);
    assert_eq!(*reconnector.connects.lock().unwrap(), 1);
    assert!(downloader.vpn().is_terminated());

    let queue = downloader.queue();
    assert_eq!(queue.entry(&gid(2)).unwrap().state, QueryState::Success);
    assert_eq!(queue.entry(&gid(4)).unwrap().state, QueryState::Abandoned);
    assert_eq!(queue.entry(&gid(5)).unwrap().attempts, 0);

    downloader.into_vpn().shutdown().await;
}

#[tokio::test]
async fn test_close_abandons_exactly_the_unprocessed() {
    let mut queue = Queue::new((1..=5).map(gid).collect(), 1);
    queue.open();
    for _ in 0..2 {
        let ticket = queue.pop().unwrap();
        queue.success(ticket);
    }

    let summary = queue.close();
    assert_eq!(summary.success, 2);
    assert_eq!(summary.abandoned, 3);
    assert_eq!(summary.total, 5);
}
