use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::debsnap::config::{ConfigOverrides, is_known_env_key, load_config, resolve_config_path};
use crate::debsnap::store::describe_head;

const ENV_PREFIX: &str = "DEBSNAP_";

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub overrides: ConfigOverrides,
}

fn unknown_env_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unknown: Vec<String> = keys
        .into_iter()
        .filter(|key| key.starts_with(ENV_PREFIX))
        .filter(|key| !is_known_env_key(key))
        .collect();
    unknown.sort();
    unknown
}

pub fn run(opts: &StatusOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    match resolve_config_path(opts.overrides.config_path.as_deref()) {
        Some(path) if path.exists() => report.detail(format!("config_file={}", path.display())),
        Some(path) => report.detail(format!("config_file={} (absent, using defaults)", path.display())),
        None => report.detail("config_file=none"),
    }

    let cfg = load_config(&opts.overrides)?;
    report.detail(format!("archive_url={}", cfg.archive.base_url));
    report.detail(format!("selector={}", cfg.selector()));
    report.detail(format!("compression={}", cfg.archive.compression));
    report.detail(format!("step_secs={}", cfg.walk.step_secs));
    report.detail(format!("lookback_days={}", cfg.walk.lookback_days));
    report.detail(format!("repo_path={}", cfg.repo.path.display()));

    match describe_head(&cfg.repo.path) {
        Ok(Some(head)) => {
            report.detail(format!("head={}", head.id));
            report.detail(format!("head_subject={}", head.subject));
            report.detail(format!("commits={}", head.commits));
        }
        Ok(None) => report.detail("head=none"),
        Err(err) => report.snapshot_failure(&err),
    }

    for key in unknown_env_keys(env::vars_os().filter_map(|(k, _)| k.into_string().ok())) {
        report.issue(format!("unknown environment variable {key}"));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_reported_sorted() {
        let got = unknown_env_keys([
            "DEBSNAP_STEPSECS".to_string(),
            "PATH".to_string(),
            "DEBSNAP_STEP_SECS".to_string(),
            "DEBSNAP_LOG".to_string(),
            "DEBSNAP_ARCH".to_string(),
        ]);
        assert_eq!(got, ["DEBSNAP_ARCH", "DEBSNAP_STEPSECS"]);
    }
}
