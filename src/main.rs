// src/main.rs

mod analysis;
mod config;
mod error;
mod pipeline;
mod report;
mod track_source;
mod types;
mod zones;

use analysis::TransitionEngine;
use anyhow::{Context, Result};
use pipeline::{EngineEvent, MetricsSummary};
use report::TripReport;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use track_source::{TrackReader, TrackSource};

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = types::Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zone_speed={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🏍️  Zone Speed Estimator Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Calibration: {:.4} m/px, target classes {:?}, idle timeout {:?}s",
        config.calibration.pixel_to_meter_scale,
        config.engine.target_class_ids,
        config.engine.history_idle_timeout_secs
    );

    let mut engine = TransitionEngine::new(&config)?;
    info!("✓ Transition engine ready");

    let source = TrackSource::new(config.input.clone());
    let track_files = source.find_track_files()?;

    if track_files.is_empty() {
        error!("No track files found in {}", config.input.input_dir);
        return Ok(());
    }

    std::fs::create_dir_all(&config.input.output_dir)
        .with_context(|| format!("creating {}", config.input.output_dir))?;

    for (idx, track_path) in track_files.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing input {}/{}: {}",
            idx + 1,
            track_files.len(),
            track_path.display()
        );
        info!("========================================");

        match process_tracks(track_path, &mut engine, &source, &config) {
            Ok(stats) => {
                info!("✓ Input processed successfully!");
                info!("  Frames replayed: {}", stats.frames);
                info!("  Trips written: {}", stats.trips_written);
                stats.report.log();
                if stats.anomalies > 0 {
                    warn!("  ⏱️  Temporal anomalies: {}", stats.anomalies);
                }
                if stats.skipped > 0 {
                    warn!("  ⚠️  Objects skipped: {}", stats.skipped);
                }
                info!("  🧹 Histories expired: {}", stats.expired);
                log_metrics(&engine.metrics().summary());
            }
            Err(e) => {
                error!("Failed to process {}: {:#}", track_path.display(), e);
            }
        }
    }

    Ok(())
}

struct ProcessingStats {
    frames: u64,
    trips_written: usize,
    anomalies: usize,
    expired: usize,
    skipped: usize,
    report: TripReport,
}

fn process_tracks(
    track_path: &Path,
    engine: &mut TransitionEngine,
    source: &TrackSource,
    config: &types::Config,
) -> Result<ProcessingStats> {
    let reader = source.open(track_path)?;

    let stem = track_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tracks");
    let jsonl_path = Path::new(&config.input.output_dir).join(format!("{}_trips.jsonl", stem));
    let file = std::fs::File::create(&jsonl_path)
        .with_context(|| format!("creating {}", jsonl_path.display()))?;
    info!("💾 Results will be written to: {}", jsonl_path.display());

    replay(reader, engine, BufWriter::new(file))
}

/// Replays one input from a clean engine, writing each committed trip as a
/// JSON line to `results`.
fn replay<R: BufRead, W: Write>(
    mut reader: TrackReader<R>,
    engine: &mut TransitionEngine,
    mut results: W,
) -> Result<ProcessingStats> {
    engine.reset();

    let mut stats = ProcessingStats {
        frames: 0,
        trips_written: 0,
        anomalies: 0,
        expired: 0,
        skipped: 0,
        report: TripReport::new(),
    };

    while let Some(mut frame) = reader.read_frame()? {
        engine.process_frame(&mut frame);
        stats.frames = reader.frames_read;

        for hint in &frame.hints {
            debug!(
                "frame {} object {} cell={:?} state={:?} instant={:?} spatial={:?} lane={:?}",
                frame.frame_index,
                hint.object_id,
                hint.cell,
                hint.state,
                hint.instant_speed_kmh,
                hint.spatial_speed_kmh,
                hint.lane_label
            );
        }

        for event in engine.drain_events() {
            match &event {
                EngineEvent::TripCommitted(trip) => {
                    stats.report.add(trip);
                    serde_json::to_writer(&mut results, &event)?;
                    results.write_all(b"\n")?;
                    stats.trips_written += 1;
                }
                EngineEvent::TemporalAnomaly {
                    object_id,
                    frame_index,
                    from_cell,
                    to_cell,
                    elapsed_us,
                    ..
                } => {
                    warn!(
                        "⏱️  Object {} frame {}: {} → {} elapsed {}µs, speed skipped",
                        object_id, frame_index, from_cell, to_cell, elapsed_us
                    );
                    stats.anomalies += 1;
                }
                EngineEvent::HistoryExpired { object_id, state, .. } => {
                    debug!("Object {} expired ({})", object_id, state.as_str());
                    stats.expired += 1;
                }
                EngineEvent::ObjectSkipped {
                    object_id, reason, ..
                } => {
                    warn!("Object {} skipped: {}", object_id, reason);
                    stats.skipped += 1;
                }
            }
        }

        if stats.frames % 1000 == 0 {
            debug!(
                "Replayed {} frames, {} tracked objects",
                stats.frames,
                engine.histories().len()
            );
        }
    }

    results.flush()?;
    Ok(stats)
}

fn log_metrics(summary: &MetricsSummary) {
    info!("📊 Pipeline totals:");
    info!(
        "  Frames: {} ({:.1} FPS over {:.2}s)",
        summary.total_frames, summary.fps, summary.elapsed_secs
    );
    info!(
        "  Observations: {}, outside grid: {}",
        summary.observations, summary.geometry_misses
    );
    info!(
        "  Crossings: {}, trips: {}, anomalies: {}, expired: {}, skipped: {}",
        summary.crossings_recorded,
        summary.trips_committed,
        summary.temporal_anomalies,
        summary.histories_expired,
        summary.objects_skipped
    );
}
