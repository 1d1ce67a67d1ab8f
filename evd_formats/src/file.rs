use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::model::{EventData, Geometry};

/// Tag carried by the header line of every event file.
pub const FORMAT_TAG: &str = "evd";

/// Header revision understood by this crate.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FileHeader {
    format: String,
    version: u32,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct EventIds {
    run: i32,
    event: i32,
}

/// Location of one event line inside an event file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub run: i32,
    pub event: i32,
    pub offset: u64,
    pub len: usize,
}

/// Line index over a JSON Lines event file. Scanning only records where each
/// event lives; trajectories and hits are decoded on demand by `read_event`.
#[derive(Debug)]
pub struct EventFileIndex {
    path: PathBuf,
    geometry: Arc<Geometry>,
    entries: Vec<IndexEntry>,
}

impl EventFileIndex {
    pub fn scan<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)
            .with_context(|| format!("opening event file {}", path_buf.display()))?;
        let mut reader = BufReader::new(file);

        let mut header: Option<FileHeader> = None;
        let mut entries = Vec::new();
        let mut offset = 0u64;
        let mut line_number = 0usize;
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .with_context(|| format!("reading event file {}", path_buf.display()))?;
            if read == 0 {
                break;
            }
            line_number += 1;
            let start = offset;
            offset += read as u64;

            let trimmed = trim_line(&line);
            if trimmed.is_empty() {
                continue;
            }

            if header.is_none() {
                let parsed: FileHeader = serde_json::from_slice(trimmed).with_context(|| {
                    format!("parsing header of event file {}", path_buf.display())
                })?;
                ensure!(
                    parsed.format == FORMAT_TAG,
                    "{} is not an event file (format tag {:?})",
                    path_buf.display(),
                    parsed.format
                );
                ensure!(
                    parsed.version == FORMAT_VERSION,
                    "{} uses unsupported format version {}",
                    path_buf.display(),
                    parsed.version
                );
                header = Some(parsed);
                continue;
            }

            let ids: EventIds = serde_json::from_slice(trimmed).with_context(|| {
                format!(
                    "parsing event identity at line {} of {}",
                    line_number,
                    path_buf.display()
                )
            })?;
            entries.push(IndexEntry {
                run: ids.run,
                event: ids.event,
                offset: start,
                len: read,
            });
        }

        let Some(header) = header else {
            bail!("event file {} has no header line", path_buf.display());
        };

        Ok(Self {
            path: path_buf,
            geometry: Arc::new(header.geometry),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories, used for display.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, run: i32, event: i32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.run == run && entry.event == event)
    }

    pub fn read_event(&self, index: usize) -> Result<EventData> {
        let Some(entry) = self.entries.get(index) else {
            bail!(
                "event index {} out of range for {} ({} entries)",
                index,
                self.path.display(),
                self.entries.len()
            );
        };

        let mut file = File::open(&self.path)
            .with_context(|| format!("opening event file {}", self.path.display()))?;
        file.seek(SeekFrom::Start(entry.offset))
            .with_context(|| format!("seeking to event {} in {}", index, self.path.display()))?;
        let mut bytes = vec![0u8; entry.len];
        file.read_exact(&mut bytes)
            .with_context(|| format!("reading event {} from {}", index, self.path.display()))?;

        let data: EventData = serde_json::from_slice(trim_line(&bytes)).with_context(|| {
            format!(
                "decoding run {} event {} from {}",
                entry.run,
                entry.event,
                self.path.display()
            )
        })?;
        ensure!(
            data.run == entry.run && data.event == entry.event,
            "{} changed on disk: expected run {} event {}, found run {} event {}",
            self.path.display(),
            entry.run,
            entry.event,
            data.run,
            data.event
        );
        Ok(data)
    }
}

pub fn write_event_file<P: AsRef<Path>>(
    path: P,
    geometry: &Geometry,
    events: &[EventData],
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("creating event file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let header = FileHeader {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        geometry: geometry.clone(),
    };
    serde_json::to_writer(&mut writer, &header)
        .with_context(|| format!("writing header to {}", path.display()))?;
    writer.write_all(b"\n")?;

    for event in events {
        serde_json::to_writer(&mut writer, event).with_context(|| {
            format!(
                "writing run {} event {} to {}",
                event.run,
                event.event,
                path.display()
            )
        })?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing event file {}", path.display()))?;
    Ok(())
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let mut start = 0;
    while start < end && line[start].is_ascii_whitespace() {
        start += 1;
    }
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hit, Trajectory, Volume};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_geometry() -> Geometry {
        Geometry {
            name: "bench".to_string(),
            volumes: vec![Volume::new("tpc", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0])],
        }
    }

    fn sample_event(run: i32, event: i32) -> EventData {
        EventData {
            run,
            event,
            trajectories: vec![Trajectory {
                track_id: 1,
                parent_id: -1,
                pdg: 13,
                points: vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
            }],
            hits: vec![Hit {
                position: [0.25, 0.25, 0.25],
                energy: 1.5,
                track_id: Some(1),
            }],
        }
    }

    #[test]
    fn scan_indexes_events_and_reads_them_back() {
        let temp = NamedTempFile::new().expect("temp file");
        let events = vec![sample_event(1, 1), sample_event(1, 2), sample_event(2, 7)];
        write_event_file(temp.path(), &sample_geometry(), &events).expect("write events");

        let index = EventFileIndex::scan(temp.path()).expect("scan");
        assert_eq!(index.len(), 3);
        assert_eq!(index.geometry().name, "bench");
        assert_eq!(index.find(2, 7), Some(2));
        assert_eq!(index.find(3, 1), None);

        let decoded = index.read_event(1).expect("read second event");
        assert_eq!(decoded, events[1]);
    }

    #[test]
    fn scan_skips_blank_lines() {
        let mut temp = NamedTempFile::new().expect("temp file");
        writeln!(
            temp,
            r#"{{"format":"evd","version":1,"geometry":{{"name":"empty"}}}}"#
        )
        .expect("write header");
        writeln!(temp).expect("write blank");
        writeln!(temp, r#"{{"run":5,"event":9}}"#).expect("write event");
        writeln!(temp, "   ").expect("write blank");

        let index = EventFileIndex::scan(temp.path()).expect("scan");
        assert_eq!(index.len(), 1);
        let event = index.read_event(0).expect("read event");
        assert_eq!((event.run, event.event), (5, 9));
        assert!(event.trajectories.is_empty());
    }

    #[test]
    fn scan_rejects_foreign_header() {
        let mut temp = NamedTempFile::new().expect("temp file");
        writeln!(
            temp,
            r#"{{"format":"other","version":1,"geometry":{{"name":"x"}}}}"#
        )
        .expect("write header");

        let error = EventFileIndex::scan(temp.path()).expect_err("foreign tag rejected");
        assert!(format!("{error}").contains("is not an event file"));
    }

    #[test]
    fn scan_reports_missing_identity_with_line_number() {
        let mut temp = NamedTempFile::new().expect("temp file");
        writeln!(
            temp,
            r#"{{"format":"evd","version":1,"geometry":{{"name":"x"}}}}"#
        )
        .expect("write header");
        writeln!(temp, r#"{{"hits":[]}}"#).expect("write bad event");

        let error = EventFileIndex::scan(temp.path()).expect_err("missing ids rejected");
        assert!(format!("{error}").contains("line 2"));
    }

    #[test]
    fn empty_file_has_no_header() {
        let temp = NamedTempFile::new().expect("temp file");
        let error = EventFileIndex::scan(temp.path()).expect_err("empty file rejected");
        assert!(format!("{error}").contains("no header line"));
    }
}
