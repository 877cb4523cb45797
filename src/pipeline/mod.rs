pub mod decode;
pub mod encode;
pub mod hook;
pub mod partition;
pub mod progress;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::config::TubeConfig;
use crate::video::VideoBackend;
use hook::PipelineHook;

/// Result of a full save → hook → load roundtrip.
pub struct RoundtripResult {
    /// SHA-256 hex digest of the original input file.
    pub original_hash: String,
    /// SHA-256 hex digest of the restored file.
    pub decoded_hash: String,
    /// Where the restored file was written.
    pub output_path: PathBuf,
    /// `true` if the hashes match (lossless round-trip).
    pub matched: bool,
}

/// Run a full save → hook → load roundtrip.
///
/// Steps:
/// 1. SHA-256 hashes `input`.
/// 2. Saves `input` → `encoded_path`.
/// 3. Calls `hook.after_save(encoded_path)`; the video may travel here.
/// 4. Loads the path returned by the hook into `output_folder` under the
///    stored file name.
/// 5. SHA-256 hashes the restored file and compares with the original.
///
/// `output_folder` must not be the folder holding `input`, or the restored
/// file replaces it.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use storage_tube::{roundtrip, FfmpegBackend, NoopHook, TubeConfig};
///
/// let result = roundtrip(
///     Path::new("input.txt"),
///     Path::new("encoded.mkv"),
///     Path::new("restored"),
///     &TubeConfig::default(),
///     &FfmpegBackend,
///     &NoopHook,
/// ).unwrap();
///
/// assert!(result.matched, "round-trip failed: {} != {}", result.original_hash, result.decoded_hash);
/// ```
pub fn roundtrip<B: VideoBackend, H: PipelineHook>(
    input: &Path,
    encoded_path: &Path,
    output_folder: &Path,
    cfg: &TubeConfig,
    backend: &B,
    hook: &H,
) -> Result<RoundtripResult> {
    let original_hash = sha256_file(input)?;

    encode::save_file(input, encoded_path, cfg, backend)?;

    let decode_from = hook
        .after_save(encoded_path)
        .context("post-save hook failed")?;

    let report = decode::load_file(&decode_from, output_folder, None, cfg, backend)?;

    let decoded_hash = sha256_file(&report.path)?;
    let matched = original_hash == decoded_hash;

    Ok(RoundtripResult {
        original_hash,
        decoded_hash,
        output_path: report.path,
        matched,
    })
}

pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
