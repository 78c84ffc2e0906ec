// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;

pub use event_bus::{EngineEvent, EventBus, SpeedSegment, TripSummary};
pub use frame_context::{FrameContext, OverlayHint};
pub use metrics::{MetricsSummary, PipelineMetrics};
