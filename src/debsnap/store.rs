use crate::debsnap::layout::SnapshotTree;
use crate::error::SnapshotError;
use fs2::FileExt;
use git2::build::CheckoutBuilder;
use git2::{Commit, ErrorCode, IndexAddOption, Repository, Signature, Sort};
use log::{debug, warn};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "debsnap.lock";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// A versioned tree that only ever changes by whole-snapshot replacement.
pub trait TreeStore {
    /// Replace the tracked content with `tree` and commit it. On error no
    /// commit is made and the previous one stays current.
    fn commit_snapshot(&mut self, tree: &SnapshotTree, message: &str)
    -> Result<CommitId, SnapshotError>;
}

/// Git working tree at `repo_path`, locked for the lifetime of the value.
pub struct GitTreeStore {
    repo: Repository,
    workdir: PathBuf,
    author: Identity,
    _lock: File,
}

fn git_error(op: &str) -> impl Fn(git2::Error) -> SnapshotError + '_ {
    move |err| SnapshotError::materialization(op, err.message())
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> SnapshotError + '_ {
    move |err| SnapshotError::materialization(path.display().to_string(), err)
}

impl GitTreeStore {
    /// Open the repository, creating the directory and running `git init` if needed.
    pub fn open_or_init(repo_path: &Path, author: Identity) -> Result<Self, SnapshotError> {
        fs::create_dir_all(repo_path).map_err(io_error(repo_path))?;
        let repo = match Repository::open(repo_path) {
            Ok(repo) => repo,
            Err(err) if err.code() == ErrorCode::NotFound => {
                debug!("initializing git repository at {}", repo_path.display());
                Repository::init(repo_path).map_err(git_error("git init"))?
            }
            Err(err) => return Err(git_error("git open")(err)),
        };
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                SnapshotError::materialization(
                    repo_path.display().to_string(),
                    "bare repositories have no working tree",
                )
            })?;

        let lock_path = repo.path().join(LOCK_FILE);
        let lock = File::create(&lock_path).map_err(io_error(&lock_path))?;
        lock.try_lock_exclusive().map_err(|_| {
            SnapshotError::materialization(
                lock_path.display().to_string(),
                "repository is locked by another debsnap run",
            )
        })?;

        Ok(Self {
            repo,
            workdir,
            author,
            _lock: lock,
        })
    }

    fn clear_worktree(&self) -> Result<(), SnapshotError> {
        let entries = fs::read_dir(&self.workdir).map_err(io_error(&self.workdir))?;
        for entry in entries {
            let entry = entry.map_err(io_error(&self.workdir))?;
            if entry.file_name() == ".git" {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().map_err(io_error(&path))?;
            if file_type.is_dir() {
                fs::remove_dir_all(&path).map_err(io_error(&path))?;
            } else {
                fs::remove_file(&path).map_err(io_error(&path))?;
            }
        }
        Ok(())
    }

    fn write_tree(&self, tree: &SnapshotTree) -> Result<(), SnapshotError> {
        for entry in &tree.entries {
            let path = self.workdir.join(&entry.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            fs::write(&path, &entry.contents).map_err(io_error(&path))?;
        }
        Ok(())
    }

    /// Put the working tree and index back to HEAD, or to empty on an
    /// unborn branch.
    fn restore_worktree(&self) -> Result<(), SnapshotError> {
        if self.head_commit()?.is_some() {
            let mut checkout = CheckoutBuilder::new();
            checkout.force().recreate_missing(true).remove_untracked(true);
            return self
                .repo
                .checkout_head(Some(&mut checkout))
                .map_err(git_error("restore HEAD"));
        }
        self.clear_worktree()?;
        let mut index = self.repo.index().map_err(git_error("open index"))?;
        index.clear().map_err(git_error("reset index"))?;
        index.write().map_err(git_error("write index"))
    }

    fn stage_and_commit(
        &self,
        tree: &SnapshotTree,
        message: &str,
    ) -> Result<CommitId, SnapshotError> {
        self.clear_worktree()?;
        self.write_tree(tree)?;

        let mut index = self.repo.index().map_err(git_error("open index"))?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .map_err(git_error("git add"))?;
        index
            .update_all(["*"], None)
            .map_err(git_error("stage deletions"))?;
        index.write().map_err(git_error("write index"))?;
        let tree_id = index.write_tree().map_err(git_error("write tree"))?;
        let git_tree = self.repo.find_tree(tree_id).map_err(git_error("find tree"))?;

        let signature = Signature::now(&self.author.name, &self.author.email)
            .map_err(git_error("build signature"))?;
        let parent = self.head_commit()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &git_tree,
                &parents,
            )
            .map_err(git_error("git commit"))?;
        Ok(CommitId(oid.to_string()))
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>, SnapshotError> {
        match self.repo.head() {
            Ok(head) => head
                .peel_to_commit()
                .map(Some)
                .map_err(git_error("resolve HEAD")),
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(err) => Err(git_error("read HEAD")(err)),
        }
    }
}

impl TreeStore for GitTreeStore {
    fn commit_snapshot(
        &mut self,
        tree: &SnapshotTree,
        message: &str,
    ) -> Result<CommitId, SnapshotError> {
        let result = self.stage_and_commit(tree, message);
        if result.is_err() {
            if let Err(err) = self.restore_worktree() {
                warn!("could not restore {} after a failed commit: {err}", self.workdir.display());
            }
        }
        result
    }
}

#[derive(Debug, Clone)]
pub struct HeadSummary {
    pub id: CommitId,
    pub subject: String,
    pub commits: usize,
}

/// Read-only look at an existing archive repository; takes no lock.
pub fn describe_head(repo_path: &Path) -> Result<Option<HeadSummary>, SnapshotError> {
    let repo = match Repository::open(repo_path) {
        Ok(repo) => repo,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
        Err(err) => return Err(git_error("git open")(err)),
    };
    let head = match repo.head() {
        Ok(head) => head.peel_to_commit().map_err(git_error("resolve HEAD"))?,
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(None);
        }
        Err(err) => return Err(git_error("read HEAD")(err)),
    };

    let mut walk = repo.revwalk().map_err(git_error("revwalk"))?;
    walk.set_sorting(Sort::TOPOLOGICAL)
        .map_err(git_error("revwalk"))?;
    walk.push(head.id()).map_err(git_error("revwalk"))?;
    let commits = walk.count();

    Ok(Some(HeadSummary {
        id: CommitId(head.id().to_string()),
        subject: head.summary().unwrap_or_default().to_string(),
        commits,
    }))
}
