use anyhow::{Context, Result};
use log::error;

use crate::commands::CommandReport;
use crate::debsnap::config::{ConfigOverrides, load_config};
use crate::debsnap::control::ControlCodec;
use crate::debsnap::fetch::{HttpIndexFetcher, decompressor_for};
use crate::debsnap::http::{ArchiveEndpoint, download_client, probe_client};
use crate::debsnap::resolver::HttpTimeResolver;
use crate::debsnap::store::GitTreeStore;
use crate::debsnap::walker::{SnapshotWalker, SystemClock};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub overrides: ConfigOverrides,
}

pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let cfg = load_config(&opts.overrides)?;
    let mut report = CommandReport::new("run");
    let selector = cfg.selector();

    report.detail(format!("archive_url={}", cfg.archive.base_url));
    report.detail(format!("selector={selector}"));
    report.detail(format!("repo_path={}", cfg.repo.path.display()));
    report.detail(format!("step_secs={}", cfg.walk.step_secs));
    report.detail(format!("lookback_days={}", cfg.walk.lookback_days));

    let endpoint = ArchiveEndpoint::new(&cfg.archive.base_url);
    let resolver = HttpTimeResolver::new(
        probe_client(cfg.archive.timeout_secs).context("failed to build probe http client")?,
        endpoint.clone(),
    );
    let decompressor = decompressor_for(&cfg.archive.compression)
        .with_context(|| format!("unknown compression {}", cfg.archive.compression))?;
    let fetcher = HttpIndexFetcher::new(
        download_client(cfg.archive.timeout_secs).context("failed to build download http client")?,
        endpoint,
        decompressor,
    );

    let mut store = match GitTreeStore::open_or_init(&cfg.repo.path, cfg.author()) {
        Ok(store) => store,
        Err(err) => {
            error!("cannot open archive repository: {err}");
            report.snapshot_failure(&err);
            return Ok(report);
        }
    };

    let walker = SnapshotWalker {
        clock: &SystemClock,
        resolver: &resolver,
        fetcher: &fetcher,
        codec: &ControlCodec,
        store: &mut store,
        selector,
        plan: cfg.plan(),
    };

    match walker.run() {
        Ok(walk) => {
            report.detail(format!("start={}", walk.start));
            report.detail(format!("end={}", walk.end));
            report.detail(format!("commits={}", walk.commits.len()));
            for commit in &walk.commits {
                report.detail(format!(
                    "snapshot={} commit={} sources={} packages={}",
                    commit.instant, commit.commit, commit.sources, commit.packages
                ));
            }
        }
        Err(err) => report.snapshot_failure(&err),
    }

    Ok(report)
}
