mod chunker;
pub mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod pipeline;
pub mod video;

pub use config::{FrameGeometry, TubeConfig};
pub use error::StorageError;
pub use header::HeaderRecord;
pub use pipeline::decode::{load_file, LoadReport};
pub use pipeline::encode::{save_file, SaveReport};
pub use pipeline::hook::{NoopHook, PipelineHook};
pub use pipeline::{roundtrip, RoundtripResult};
pub use video::{FfmpegBackend, RawBackend, VideoBackend};
