use anyhow::{Context, Result};
use chrono::Utc;

use crate::commands::CommandReport;
use crate::debsnap::config::{ConfigOverrides, load_config};
use crate::debsnap::http::{ArchiveEndpoint, probe_client};
use crate::debsnap::instant::SnapshotInstant;
use crate::debsnap::resolver::{HttpTimeResolver, TimeResolver};

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub at: Option<String>,
    pub overrides: ConfigOverrides,
}

pub fn run(opts: &ResolveOptions) -> Result<CommandReport> {
    let cfg = load_config(&opts.overrides)?;
    let mut report = CommandReport::new("resolve");

    let requested = match opts.at.as_deref() {
        Some(raw) => SnapshotInstant::parse_lenient(raw).with_context(|| {
            format!("invalid --at {raw:?}: use YYYYMMDDThhmmssZ or RFC 3339")
        })?,
        None => SnapshotInstant::from_datetime(Utc::now()),
    };

    let endpoint = ArchiveEndpoint::new(&cfg.archive.base_url);
    report.detail(format!("archive_url={}", endpoint.as_str()));
    report.detail(format!("requested={requested}"));

    let resolver = HttpTimeResolver::new(
        probe_client(cfg.archive.timeout_secs).context("failed to build probe http client")?,
        endpoint,
    );
    match resolver.resolve(requested) {
        Ok(resolved) => {
            report.detail(format!("resolved={resolved}"));
            report.detail(format!("resolved_rfc3339={}", resolved.datetime().to_rfc3339()));
        }
        Err(err) => report.snapshot_failure(&err),
    }

    Ok(report)
}
