use crate::debsnap::control::{DecodeError, PackageRecord, RecordCodec};
use crate::debsnap::instant::SnapshotInstant;
use crate::debsnap::version;
use crate::error::{SnapshotError, TransferError};
use std::cmp::Ordering;
use std::io::{BufReader, Read};

/// Binary packages built from one source package, in package/version order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    pub source: String,
    pub records: Vec<PackageRecord>,
}

/// Grouping key: `Source` without its ` (version)` suffix, else `Package`.
pub fn source_key(record: &PackageRecord) -> &str {
    let source = record
        .get("Source")
        .and_then(|raw| raw.split_whitespace().next())
        .unwrap_or_default();
    if source.is_empty() {
        record.package().trim()
    } else {
        source
    }
}

fn canonical_order(a: &PackageRecord, b: &PackageRecord) -> Ordering {
    source_key(a)
        .cmp(source_key(b))
        .then_with(|| a.package().cmp(b.package()))
        .then_with(|| version::compare(a.version(), b.version()))
}

/// Sort into canonical order and split into maximal runs sharing a source key.
pub fn group_by_source(mut records: Vec<PackageRecord>) -> Vec<SourceGroup> {
    records.sort_by(canonical_order);

    let mut groups: Vec<SourceGroup> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some(group) if group.source == source_key(&record) => group.records.push(record),
            _ => groups.push(SourceGroup {
                source: source_key(&record).to_string(),
                records: vec![record],
            }),
        }
    }
    groups
}

/// Connection failures surfacing through the decoder stay network errors;
/// everything else is a bad index.
fn index_error(at: SnapshotInstant, err: DecodeError) -> SnapshotError {
    let err = match err {
        DecodeError::Read { line, source } => match TransferError::recover(source) {
            Ok(transfer) => return transfer.into(),
            Err(source) => DecodeError::Read { line, source },
        },
        malformed => malformed,
    };
    SnapshotError::IndexParse {
        instant: at.to_string(),
        reason: err.to_string(),
    }
}

pub fn parse_and_group(
    at: SnapshotInstant,
    reader: Box<dyn Read>,
    codec: &dyn RecordCodec,
) -> Result<Vec<SourceGroup>, SnapshotError> {
    let mut buffered = BufReader::new(reader);
    let records = codec
        .decode(&mut buffered)
        .map_err(|err| index_error(at, err))?;
    Ok(group_by_source(records))
}
