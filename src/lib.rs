pub mod error;
pub mod frame_source;
pub mod video_processor;
pub mod scene_detector;
pub mod pacing;
pub mod hook;
pub mod metadata;
pub mod processor;
pub mod benchmark;
pub mod campaign;
pub mod policy;
pub mod policy_client;
pub mod scoring;
pub mod downloader;
pub mod evaluator;
pub mod handler;
pub mod config;

pub use error::{PreflightError, PreflightResult};
pub use frame_source::{FrameSample, FrameSource, MemoryFrameSource};
pub use video_processor::VideoProcessor;
pub use scene_detector::SceneDetector;
pub use metadata::{CreativeAnalysis, CreativeDetails, CreativeMetrics, SceneAnalysisResult};
pub use processor::{AnalysisConfig, analyze_creative, analyze_video_file};
pub use benchmark::{BenchmarkTable, Industry};
pub use campaign::CampaignContext;
pub use policy::{PolicyVerdict, combine_verdicts};
pub use policy_client::{PolicyClient, ReviewerConfig};
pub use scoring::{Rating, ScoreResult};
pub use evaluator::{AnalysisReport, Evaluator, VideoInput};
pub use handler::AppState;
pub use config::{AppConfig, ConfigLoader};
