// src/track_source.rs
//
// Recorded tracker output → frames.
//
// Input files are JSON Lines, one tracked object per line:
//   {"object_id": 4, "class_id": 3, "centroid": [612.0, 540.5], "frame_index": 17,
//    "timestamp": "2019-10-30T08:00:00.566"}
// Lines of the same frame are consecutive. `timestamp` is optional; when the
// tracker did not stamp a line it is derived from frame_index and the
// configured fps, counted from `input.start_time`.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::pipeline::FrameContext;
use crate::types::{InputConfig, Observation, Point};

const TRACK_EXTENSIONS: [&str; 3] = ["jsonl", "ndjson", "JSONL"];

#[derive(Debug, Deserialize)]
struct TrackLine {
    object_id: u32,
    class_id: u32,
    centroid: [f64; 2],
    frame_index: u64,
    #[serde(default)]
    timestamp: Option<NaiveDateTime>,
}

pub struct TrackSource {
    config: InputConfig,
}

impl TrackSource {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    pub fn find_track_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ext) = path.extension() {
                if TRACK_EXTENSIONS.contains(&ext.to_str().unwrap_or("")) {
                    files.push(path.to_path_buf());
                }
            }
        }
        files.sort();

        info!("Found {} track file(s)", files.len());
        Ok(files)
    }

    pub fn open(&self, path: &Path) -> Result<TrackReader<BufReader<File>>> {
        info!("Opening track file: {}", path.display());
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(TrackReader::new(BufReader::new(file), &self.config))
    }
}

pub struct TrackReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    pending: Option<Observation>,
    fps: f64,
    start_time: NaiveDateTime,
    pub frames_read: u64,
}

impl<R: BufRead> TrackReader<R> {
    pub fn new(reader: R, config: &InputConfig) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            pending: None,
            fps: config.fps,
            start_time: config.start_time,
            frames_read: 0,
        }
    }

    fn next_observation(&mut self) -> Result<Option<Observation>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("reading line {}", self.line_no))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let rec: TrackLine = serde_json::from_str(trimmed)
                .with_context(|| format!("malformed track record on line {}", self.line_no))?;
            let timestamp = match rec.timestamp {
                Some(t) => t,
                None => frame_time(self.start_time, self.fps, rec.frame_index).with_context(
                    || {
                        format!(
                            "frame {} on line {} is outside the representable time range",
                            rec.frame_index, self.line_no
                        )
                    },
                )?,
            };
            return Ok(Some(Observation {
                object_id: rec.object_id,
                class_id: rec.class_id,
                centroid: Point::new(rec.centroid[0], rec.centroid[1]),
                frame_index: rec.frame_index,
                timestamp,
            }));
        }
        Ok(None)
    }

    /// Next group of consecutive lines sharing a frame index.
    pub fn read_frame(&mut self) -> Result<Option<FrameContext>> {
        let first = match self.pending.take() {
            Some(obs) => obs,
            None => match self.next_observation()? {
                Some(obs) => obs,
                None => return Ok(None),
            },
        };

        let frame_index = first.frame_index;
        let mut timestamp = first.timestamp;
        let mut observations = vec![first];

        while let Some(obs) = self.next_observation()? {
            if obs.frame_index != frame_index {
                self.pending = Some(obs);
                break;
            }
            timestamp = timestamp.max(obs.timestamp);
            observations.push(obs);
        }

        self.frames_read += 1;
        debug!(
            "Frame {}: {} observation(s)",
            frame_index,
            observations.len()
        );
        Ok(Some(FrameContext::new(frame_index, timestamp, observations)))
    }
}

fn frame_time(start_time: NaiveDateTime, fps: f64, frame_index: u64) -> Option<NaiveDateTime> {
    let micros = (frame_index as f64 / fps * 1_000_000.0).round();
    if !micros.is_finite() || micros >= i64::MAX as f64 {
        return None;
    }
    start_time.checked_add_signed(Duration::microseconds(micros as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> TrackReader<Cursor<Vec<u8>>> {
        TrackReader::new(Cursor::new(text.as_bytes().to_vec()), &InputConfig::default())
    }

    #[test]
    fn test_groups_consecutive_lines_by_frame() {
        let text = r#"
{"object_id": 1, "class_id": 3, "centroid": [600, 540], "frame_index": 1}
{"object_id": 2, "class_id": 3, "centroid": [700, 300], "frame_index": 1}
# tracker restarted
{"object_id": 1, "class_id": 3, "centroid": [600, 520], "frame_index": 2}
"#;
        let mut r = reader(text);
        let f1 = r.read_frame().unwrap().unwrap();
        assert_eq!(f1.frame_index, 1);
        assert_eq!(f1.observations.len(), 2);
        assert_eq!(f1.observations[1].centroid, Point::new(700.0, 300.0));

        let f2 = r.read_frame().unwrap().unwrap();
        assert_eq!(f2.frame_index, 2);
        assert_eq!(f2.observations.len(), 1);

        assert!(r.read_frame().unwrap().is_none());
        assert_eq!(r.frames_read, 2);
    }

    #[test]
    fn test_missing_timestamp_derived_from_fps() {
        let text = r#"{"object_id": 1, "class_id": 3, "centroid": [0, 0], "frame_index": 30}"#;
        let mut r = reader(text);
        let f = r.read_frame().unwrap().unwrap();
        let start = InputConfig::default().start_time;
        assert_eq!(f.timestamp, start + Duration::seconds(1));
        assert_eq!(f.observations[0].timestamp, start + Duration::seconds(1));
    }

    #[test]
    fn test_explicit_timestamp_kept() {
        let text = r#"{"object_id": 1, "class_id": 3, "centroid": [0, 0], "frame_index": 30, "timestamp": "2021-05-01T10:00:00.250"}"#;
        let mut r = reader(text);
        let f = r.read_frame().unwrap().unwrap();
        assert_eq!(f.timestamp.to_string(), "2021-05-01 10:00:00.250");
    }

    #[test]
    fn test_out_of_range_frame_index_is_an_error() {
        let text = "{\"object_id\": 1, \"class_id\": 3, \"centroid\": [0, 0], \"frame_index\": 0}\n{\"object_id\": 1, \"class_id\": 3, \"centroid\": [0, 0], \"frame_index\": 18446744073709551615}\n";
        let mut r = reader(text);
        let err = r.read_frame().unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("line 2"), "{}", msg);
        assert!(msg.contains("18446744073709551615"), "{}", msg);
    }

    #[test]
    fn test_tiny_fps_is_an_error_not_a_panic() {
        let config = InputConfig {
            fps: 1e-13,
            ..InputConfig::default()
        };
        let text = r#"{"object_id": 1, "class_id": 3, "centroid": [0, 0], "frame_index": 5}"#;
        let mut r = TrackReader::new(Cursor::new(text.as_bytes().to_vec()), &config);
        assert!(r.read_frame().is_err());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "{\"object_id\": 1, \"class_id\": 3, \"centroid\": [0, 0], \"frame_index\": 1}\nnot json\n";
        let mut r = reader(text);
        let err = r.read_frame().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"), "{:#}", err);
    }

    #[test]
    fn test_find_track_files_filters_and_sorts() {
        let dir = std::env::temp_dir().join(format!("zone_speed_src_{}", std::process::id()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("b.jsonl"), "").unwrap();
        std::fs::write(dir.join("nested").join("a.ndjson"), "").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();

        let source = TrackSource::new(InputConfig {
            input_dir: dir.to_string_lossy().to_string(),
            ..InputConfig::default()
        });
        let files = source.find_track_files().unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() != "txt"));
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }
}
