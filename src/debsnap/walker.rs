use crate::debsnap::control::RecordCodec;
use crate::debsnap::fetch::{IndexFetcher, Selector};
use crate::debsnap::group::{SourceGroup, parse_and_group};
use crate::debsnap::instant::SnapshotInstant;
use crate::debsnap::layout::{SnapshotTree, build_tree};
use crate::debsnap::resolver::TimeResolver;
use crate::debsnap::store::{CommitId, TreeStore};
use crate::error::SnapshotError;
use chrono::{Duration, Utc};
use log::{error, info};
use std::io::Read;

pub trait Clock {
    fn now(&self) -> SnapshotInstant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SnapshotInstant {
        SnapshotInstant::from_datetime(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkPlan {
    pub step: Duration,
    pub lookback: Duration,
}

impl Default for WalkPlan {
    fn default() -> Self {
        Self {
            step: Duration::hours(6),
            lookback: Duration::days(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommittedSnapshot {
    pub instant: SnapshotInstant,
    pub commit: CommitId,
    pub sources: usize,
    pub packages: usize,
}

#[derive(Debug, Clone)]
pub struct WalkReport {
    pub start: SnapshotInstant,
    pub end: SnapshotInstant,
    pub commits: Vec<CommittedSnapshot>,
}

enum WalkState {
    Advancing {
        from: SnapshotInstant,
    },
    Resolving {
        from: SnapshotInstant,
        candidate: SnapshotInstant,
    },
    Fetching {
        at: SnapshotInstant,
    },
    Grouping {
        at: SnapshotInstant,
        reader: Box<dyn Read>,
    },
    Materializing {
        at: SnapshotInstant,
        groups: Vec<SourceGroup>,
    },
    Done,
}

pub fn commit_message(at: SnapshotInstant, selector: &Selector, tree: &SnapshotTree) -> String {
    format!(
        "snapshot at {at}\n\nDistribution: {}\nComponent: {}\nArchitecture: {}\nSources: {}\nPackages: {}\n",
        selector.distribution,
        selector.component,
        selector.architecture,
        tree.sources(),
        tree.packages,
    )
}

/// Drives resolve -> fetch -> group -> commit over `[now - lookback, now]`.
///
/// The instant the lookback resolves to is only the starting point; the
/// first commit is for the next snapshot strictly after it. Every resolved
/// instant after that, up to the end captured at start, gets exactly one
/// commit. The first error ends the walk and is returned as is.
pub struct SnapshotWalker<'a> {
    pub clock: &'a dyn Clock,
    pub resolver: &'a dyn TimeResolver,
    pub fetcher: &'a dyn IndexFetcher,
    pub codec: &'a dyn RecordCodec,
    pub store: &'a mut dyn TreeStore,
    pub selector: Selector,
    pub plan: WalkPlan,
}

impl SnapshotWalker<'_> {
    pub fn run(mut self) -> Result<WalkReport, SnapshotError> {
        let end = self.clock.now();
        let probe = end.checked_sub(self.plan.lookback).unwrap_or(end);
        let start = self.resolver.resolve(probe).inspect_err(|err| {
            error!("failed to resolve start of walk from {probe}: {err}");
        })?;
        info!(
            "walking {} snapshots from {start} to {end} every {}s",
            self.selector,
            self.plan.step.num_seconds()
        );

        let mut report = WalkReport {
            start,
            end,
            commits: Vec::new(),
        };
        let mut state = WalkState::Advancing { from: start };
        loop {
            state = match self.step(state, end, &mut report) {
                Ok(WalkState::Done) => break,
                Ok(next) => next,
                Err(err) => {
                    error!("walk stopped: {err}");
                    return Err(err);
                }
            };
        }
        info!("walk finished with {} commits", report.commits.len());
        Ok(report)
    }

    fn step(
        &mut self,
        state: WalkState,
        end: SnapshotInstant,
        report: &mut WalkReport,
    ) -> Result<WalkState, SnapshotError> {
        let next = match state {
            WalkState::Advancing { from } => match from.checked_add(self.plan.step) {
                Some(candidate) => WalkState::Resolving { from, candidate },
                None => WalkState::Done,
            },
            WalkState::Resolving { from, candidate } => {
                if candidate > end {
                    return Ok(WalkState::Done);
                }
                let resolved = self.resolver.resolve(candidate)?;
                if resolved > end {
                    WalkState::Done
                } else if resolved > from {
                    WalkState::Fetching { at: resolved }
                } else {
                    // Still inside the previous snapshot's window.
                    match candidate.checked_add(self.plan.step) {
                        Some(candidate) => WalkState::Resolving { from, candidate },
                        None => WalkState::Done,
                    }
                }
            }
            WalkState::Fetching { at } => {
                info!("working on snapshot {at}");
                let reader = self.fetcher.fetch(at, &self.selector)?;
                WalkState::Grouping { at, reader }
            }
            WalkState::Grouping { at, reader } => {
                let groups = parse_and_group(at, reader, self.codec)?;
                WalkState::Materializing { at, groups }
            }
            WalkState::Materializing { at, groups } => {
                let tree = build_tree(&self.selector, &groups, self.codec)?;
                let message = commit_message(at, &self.selector, &tree);
                let commit = self.store.commit_snapshot(&tree, &message)?;
                info!(
                    "committed {commit} for snapshot {at} ({} sources, {} packages)",
                    tree.sources(),
                    tree.packages
                );
                report.commits.push(CommittedSnapshot {
                    instant: at,
                    commit,
                    sources: tree.sources(),
                    packages: tree.packages,
                });
                WalkState::Advancing { from: at }
            }
            WalkState::Done => WalkState::Done,
        };
        Ok(next)
    }
}
