// src/analysis/mod.rs
//
// Speed-and-lane measurement.
//
// Signal flow:
//   Tracker centroid → zones::Grid::locate → transition_engine ─┬→ history (crossings)
//                                                               ├→ speed (instant / spatial)
//                                                               └→ zones::LaneClassifier
//   transition_engine → OverlayHint (per frame) + EngineEvent::TripCommitted (once)

pub mod history;
pub mod speed;
pub mod transition_engine;

pub use transition_engine::TransitionEngine;
