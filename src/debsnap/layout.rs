use crate::debsnap::control::RecordCodec;
use crate::debsnap::fetch::Selector;
use crate::debsnap::group::SourceGroup;
use crate::error::SnapshotError;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Full contents of the archive for one snapshot, paths relative to the repo root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotTree {
    pub entries: Vec<TreeEntry>,
    pub packages: usize,
}

impl SnapshotTree {
    pub fn sources(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn get(&self, path: &std::path::Path) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.path == path)
            .map(|entry| entry.contents.as_slice())
    }
}

/// `lib*` sources are sharded by their first four characters, the rest by one.
pub fn shard(key: &str) -> &str {
    let width = if key.starts_with("lib") { 4 } else { 1 };
    match key.char_indices().nth(width) {
        Some((end, _)) => &key[..end],
        None => key,
    }
}

fn is_safe_component(key: &str) -> bool {
    !key.is_empty() && key != "." && key != ".." && !key.contains(['/', '\\'])
}

/// `<dist>/<component>/<shard>/<key>/binary-<arch>`
pub fn source_path(selector: &Selector, key: &str) -> Result<PathBuf, SnapshotError> {
    if !is_safe_component(key) {
        return Err(SnapshotError::materialization(
            format!("source {key:?}"),
            "source name is not usable as a directory name",
        ));
    }
    Ok(PathBuf::from(&selector.distribution)
        .join(&selector.component)
        .join(shard(key))
        .join(key)
        .join(format!("binary-{}", selector.architecture)))
}

pub fn build_tree(
    selector: &Selector,
    groups: &[SourceGroup],
    codec: &dyn RecordCodec,
) -> Result<SnapshotTree, SnapshotError> {
    let mut tree = SnapshotTree::default();
    for group in groups {
        let path = source_path(selector, &group.source)?;
        let mut contents = Vec::new();
        codec
            .encode(&group.records, &mut contents)
            .map_err(|err| SnapshotError::materialization(path.display().to_string(), err))?;
        tree.packages += group.records.len();
        tree.entries.push(TreeEntry { path, contents });
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debsnap::control::{ControlCodec, PackageRecord};
    use crate::error::ErrorKind;
    use std::path::Path;

    fn selector() -> Selector {
        Selector {
            distribution: "sid".into(),
            component: "main".into(),
            architecture: "amd64".into(),
        }
    }

    #[test]
    fn shard_uses_four_chars_for_lib_prefix() {
        assert_eq!(shard("libfoo"), "libf");
        assert_eq!(shard("bash"), "b");
        assert_eq!(shard("lib"), "lib");
        assert_eq!(shard("libx"), "libx");
        assert_eq!(shard("l"), "l");
    }

    #[test]
    fn source_path_follows_archive_layout() {
        assert_eq!(
            source_path(&selector(), "libfoo").expect("path"),
            PathBuf::from("sid/main/libf/libfoo/binary-amd64")
        );
        assert_eq!(
            source_path(&selector(), "bash").expect("path"),
            PathBuf::from("sid/main/b/bash/binary-amd64")
        );
    }

    #[test]
    fn unsafe_source_names_are_rejected() {
        for key in ["", ".", "..", "a/b", "a\\b"] {
            let err = source_path(&selector(), key).expect_err(key);
            assert_eq!(err.kind(), ErrorKind::Materialization);
        }
    }

    #[test]
    fn build_tree_encodes_each_group_into_one_file() {
        let mut bash = PackageRecord::new();
        bash.push("Package", "bash");
        bash.push("Version", "5.1-2");
        let mut bash_static = PackageRecord::new();
        bash_static.push("Package", "bash-static");
        bash_static.push("Source", "bash");
        bash_static.push("Version", "5.1-2");
        let groups = vec![SourceGroup {
            source: "bash".into(),
            records: vec![bash, bash_static],
        }];

        let tree = build_tree(&selector(), &groups, &ControlCodec).expect("tree");
        assert_eq!(tree.sources(), 1);
        assert_eq!(tree.packages, 2);
        assert_eq!(
            tree.get(Path::new("sid/main/b/bash/binary-amd64")),
            Some(&b"Package: bash\nVersion: 5.1-2\n\nPackage: bash-static\nSource: bash\nVersion: 5.1-2\n"[..])
        );
    }
}
