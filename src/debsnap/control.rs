use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// One paragraph of a Debian control file, fields kept in their original order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageRecord {
    fields: Vec<(String, String)>,
}

impl PackageRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Multi-line values keep their continuation lines,
    /// leading whitespace included, separated by `\n`.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Case-insensitive lookup, as field names are in deb822.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn package(&self) -> &str {
        self.get("Package").unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.get("Version").unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    /// The input itself failed, including invalid UTF-8 (`InvalidData`).
    #[error("read failed after line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
}

fn malformed(line: usize, reason: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        line,
        reason: reason.into(),
    }
}

/// Serializer pair for the package index text format.
pub trait RecordCodec {
    /// All-or-nothing: any malformed paragraph fails the whole decode.
    fn decode(&self, input: &mut dyn BufRead) -> Result<Vec<PackageRecord>, DecodeError>;
    fn encode(&self, records: &[PackageRecord], out: &mut dyn Write) -> io::Result<()>;
}

/// deb822 as used by `Packages` indices.
pub struct ControlCodec;

struct ParagraphBuilder {
    record: PackageRecord,
    seen: BTreeSet<String>,
    start_line: usize,
}

impl ParagraphBuilder {
    fn new(start_line: usize) -> Self {
        Self {
            record: PackageRecord::new(),
            seen: BTreeSet::new(),
            start_line,
        }
    }

    fn finish(self) -> Result<PackageRecord, DecodeError> {
        if self.record.package().trim().is_empty() {
            return Err(malformed(self.start_line, "paragraph has no Package field"));
        }
        Ok(self.record)
    }
}

impl RecordCodec for ControlCodec {
    fn decode(&self, input: &mut dyn BufRead) -> Result<Vec<PackageRecord>, DecodeError> {
        let mut records = Vec::new();
        let mut current: Option<ParagraphBuilder> = None;
        let mut line = String::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            let read = input
                .read_line(&mut line)
                .map_err(|source| DecodeError::Read {
                    line: line_no,
                    source,
                })?;
            if read == 0 {
                break;
            }
            line_no += 1;
            let text = line.trim_end_matches(['\n', '\r']);

            if text.trim().is_empty() {
                if let Some(paragraph) = current.take() {
                    records.push(paragraph.finish()?);
                }
                continue;
            }
            if text.starts_with('#') {
                continue;
            }

            if text.starts_with([' ', '\t']) {
                let Some((_, value)) = current
                    .as_mut()
                    .and_then(|paragraph| paragraph.record.fields.last_mut())
                else {
                    return Err(malformed(line_no, "continuation line outside a field"));
                };
                value.push('\n');
                value.push_str(text);
                continue;
            }

            let Some((name, value)) = text.split_once(':') else {
                return Err(malformed(line_no, format!("expected `Field: value`, got {text:?}")));
            };
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(malformed(line_no, format!("invalid field name {name:?}")));
            }
            let paragraph = current.get_or_insert_with(|| ParagraphBuilder::new(line_no));
            if !paragraph.seen.insert(name.to_ascii_lowercase()) {
                return Err(malformed(line_no, format!("duplicate field {name:?}")));
            }
            paragraph.record.push(name, value.trim_start());
        }

        if let Some(paragraph) = current.take() {
            records.push(paragraph.finish()?);
        }
        Ok(records)
    }

    fn encode(&self, records: &[PackageRecord], out: &mut dyn Write) -> io::Result<()> {
        for (idx, record) in records.iter().enumerate() {
            if idx > 0 {
                out.write_all(b"\n")?;
            }
            for (name, value) in record.fields() {
                if value.is_empty() || value.starts_with('\n') {
                    writeln!(out, "{name}:{value}")?;
                } else {
                    writeln!(out, "{name}: {value}")?;
                }
            }
        }
        Ok(())
    }
}
