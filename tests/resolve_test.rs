mod common;

use common::{days, debsnap, hours, now, spawn_archive, stamp};
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn resolve_prints_the_snapshot_covering_an_instant() {
    let tmp = tempdir().expect("tempdir");
    let published = now() - days(3);
    let base = spawn_archive(vec![(published, None), (published + days(2), None)]);
    let probe = published + hours(5);

    debsnap(tmp.path())
        .args(["resolve", "--archive-url", base.as_str(), "--at", stamp(probe).as_str()])
        .assert()
        .success()
        .stdout(contains(format!("requested={}", stamp(probe))))
        .stdout(contains(format!("resolved={}", stamp(published))));
}

#[test]
fn resolve_accepts_rfc3339_input() {
    let tmp = tempdir().expect("tempdir");
    let published = now() - days(3);
    let base = spawn_archive(vec![(published, None)]);
    let probe = published + hours(1);

    debsnap(tmp.path())
        .env("DEBSNAP_ARCHIVE_URL", &base)
        .args(["resolve", "--at", probe.to_rfc3339().as_str()])
        .assert()
        .success()
        .stdout(contains(format!("resolved={}", stamp(published))));
}

#[test]
fn resolve_rejects_garbage_instants() {
    let tmp = tempdir().expect("tempdir");
    debsnap(tmp.path())
        .args(["resolve", "--at", "yesterday"])
        .assert()
        .failure()
        .stderr(contains("invalid --at"));
}
