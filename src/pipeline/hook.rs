use std::path::{Path, PathBuf};

use anyhow::Result;

/// Runs between the save and load halves of a [`roundtrip`](super::roundtrip).
///
/// The hook receives the saved video and returns the video the load should
/// read. Returning a different path lets a test or a transport stand in for
/// wherever the video really travels.
///
/// ```rust
/// use std::fs;
/// use std::path::{Path, PathBuf};
/// use anyhow::{Context, Result};
/// use storage_tube::PipelineHook;
///
/// /// Keeps a copy of every saved video on a shelf and loads from the copy.
/// struct Shelve {
///     shelf: PathBuf,
/// }
///
/// impl PipelineHook for Shelve {
///     fn after_save(&self, video: &Path) -> Result<PathBuf> {
///         let name = video.file_name().context("video has no file name")?;
///         fs::create_dir_all(&self.shelf)?;
///         let copy = self.shelf.join(name);
///         fs::copy(video, &copy)?;
///         Ok(copy)
///     }
/// }
/// ```
pub trait PipelineHook {
    fn after_save(&self, video: &Path) -> Result<PathBuf>;
}

/// Loads straight from the saved video.
pub struct NoopHook;

impl PipelineHook for NoopHook {
    fn after_save(&self, video: &Path) -> Result<PathBuf> {
        Ok(video.to_path_buf())
    }
}
