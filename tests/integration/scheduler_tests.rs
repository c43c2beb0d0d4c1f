//! Scheduler resolution against reference tables on disk

use schoolscrape::query::Query;
use schoolscrape::scheduler::{Filter, Scheduler, Source};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const LINKS_CSV: &str = "\
GID,link,address
/california/bakersfield/1-Alpha/,https://www.greatschools.org/california/bakersfield/1-Alpha/,\"1 A St, Bakersfield, CA 93301\"
/california/fresno/2-Beta/,https://www.greatschools.org/california/fresno/2-Beta/,\"2 B St, Fresno, CA 93650\"
/california/bakersfield/3-Gamma/,https://www.greatschools.org/california/bakersfield/3-Gamma/,\"3 C Ave, Bakersfield, CA 93304\"
/vermont/bakersfield/4-Delta/,https://www.greatschools.org/vermont/bakersfield/4-Delta/,\"4 D Rd, Bakersfield, VT 05441\"
/california/bakersfield/5-Epsilon/,https://www.greatschools.org/california/bakersfield/5-Epsilon/,\"5 E Blvd, Bakersfield, CA 93309\"
";

pub fn write_table(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn bakersfield() -> Filter {
    Filter::new().state("CA").city("Bakersfield")
}

#[test]
fn test_bakersfield_resolves_three_rows_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", LINKS_CSV);

    let keys = Scheduler::new(Source::Links(path))
        .resolve_keys(&bakersfield())
        .unwrap();

    assert_eq!(
        keys,
        vec![
            "/california/bakersfield/1-Alpha/",
            "/california/bakersfield/3-Gamma/",
            "/california/bakersfield/5-Epsilon/",
        ]
    );
}

#[test]
fn test_no_matching_rows_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", LINKS_CSV);
    let scheduler = Scheduler::new(Source::Links(path));

    assert!(scheduler
        .resolve(&Filter::new().state("TX"))
        .unwrap()
        .is_empty());
    assert!(scheduler
        .queue(&Filter::new().city("Nowhere"), 3)
        .unwrap()
        .is_empty());
}

#[test]
fn test_missing_table_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(Source::Links(dir.path().join("missing.csv")));

    assert!(scheduler.resolve(&bakersfield()).unwrap().is_empty());
}

#[test]
fn test_duplicate_key_keeps_last_matching_row() {
    let table = "\
GID,link,address
/school/1-A/,x,\"1 A St, Bakersfield, CA 93301\"
/school/2-B/,x,\"2 B St, Bakersfield, CA 93301\"
/school/1-A/,x,\"1 A St, Bakersfield, CA 93301\"
/school/3-C/,x,\"3 C St, Bakersfield, CA 93301\"
";
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", table);
    let scheduler = Scheduler::new(Source::Links(path));

    let keys = scheduler.resolve_keys(&bakersfield()).unwrap();
    assert_eq!(keys, vec!["/school/2-B/", "/school/1-A/", "/school/3-C/"]);
}

#[test]
fn test_filter_applies_before_dedup() {
    let table = "\
GID,link,address
/ca/1-A/,x,\"1 A St, Bakersfield, CA 93301\"
/ca/2-B/,x,\"2 B St, Bakersfield, CA 93301\"
/ca/1-A/,x,\"1 A St, Fresno, CA 93650\"
";
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", table);
    let scheduler = Scheduler::new(Source::Links(path));

    let keys = scheduler.resolve_keys(&bakersfield()).unwrap();
    assert_eq!(keys, vec!["/ca/1-A/", "/ca/2-B/"]);

    let fresno = scheduler.resolve_keys(&Filter::new().city("Fresno")).unwrap();
    assert_eq!(fresno, vec!["/ca/1-A/"]);

    let everything = scheduler.resolve_keys(&Filter::new()).unwrap();
    assert_eq!(everything, vec!["/ca/2-B/", "/ca/1-A/"]);
}

#[test]
fn test_resolution_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", LINKS_CSV);
    let scheduler = Scheduler::new(Source::Links(path));

    let first = scheduler.resolve_keys(&Filter::new()).unwrap();
    let second = scheduler.resolve_keys(&Filter::new()).unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(first, second);
}

#[test]
fn test_zipcode_table_schedules_standard_zipcodes() {
    let table = "\
zipcode,type,city,state,county
2108,standard,Boston,MA,Suffolk County
93301,standard,Bakersfield,CA,Kern County
93302,po box,Bakersfield,CA,Kern County
93304,standard,Bakersfield,CA,Kern County
";
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "zipcodes.csv", table);
    let scheduler = Scheduler::new(Source::Zipcodes(path));

    let kern = scheduler
        .resolve_keys(&Filter::new().county("Kern County"))
        .unwrap();
    assert_eq!(kern, vec!["93301", "93304"]);

    let boston = scheduler.resolve(&Filter::new().zipcode("2108")).unwrap();
    assert_eq!(boston.len(), 1);
    assert_eq!(boston[0].get("zipcode"), Some("02108"));
    assert_eq!(boston[0].get("dataset"), Some("school"));
}

#[test]
fn test_queue_skips_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", LINKS_CSV);

    let skip: HashSet<String> = [Query::single("GID", "/california/bakersfield/1-Alpha/").key()]
        .into_iter()
        .collect();

    let queue = Scheduler::new(Source::Links(path))
        .skip(skip)
        .limit(Some(1))
        .queue(&bakersfield(), 2)
        .unwrap();

    assert_eq!(queue.len(), 1);
    assert_eq!(
        queue.entries()[0].query.get("GID"),
        Some("/california/bakersfield/3-Gamma/")
    );
}

#[test]
fn test_boundary_queries_take_state_from_address() {
    let table = format!("{}/california/nowhere/6-Zeta/,x,\n", LINKS_CSV);
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(dir.path(), "links.csv", &table);
    let scheduler = Scheduler::new(Source::Boundaries(path));

    let queries = scheduler.resolve(&Filter::new().city("Bakersfield")).unwrap();
    let located: Vec<_> = queries
        .iter()
        .map(|q| (q.get("GID").unwrap(), q.get("state").unwrap()))
        .collect();
    assert_eq!(
        located,
        vec![
            ("/california/bakersfield/1-Alpha/", "CA"),
            ("/california/bakersfield/3-Gamma/", "CA"),
            ("/vermont/bakersfield/4-Delta/", "VT"),
            ("/california/bakersfield/5-Epsilon/", "CA"),
        ]
    );

    // a row without a parseable address cannot be located
    let keys = scheduler.resolve_keys(&Filter::new()).unwrap();
    assert_eq!(keys.len(), 5);
    assert!(!keys.contains(&"/california/nowhere/6-Zeta/".to_string()));
}
