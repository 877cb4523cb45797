use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::codec::{self, ByteLimit};
use crate::config::{FrameGeometry, TubeConfig};
use crate::error::StorageError;
use crate::header::HeaderRecord;
use crate::pipeline::partition::{effective_workers, partition, Partition};
use crate::pipeline::progress::{ProgressAggregator, ProgressSender};
use crate::video::{FrameSource, VideoBackend};

/// Outcome of a successful [`load_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Where the restored file was written.
    pub path: PathBuf,
    /// File name recorded in the header frame.
    pub file_name: String,
    pub total_bytes: u64,
    /// Frames in the source video, header included.
    pub frames: u64,
    /// Decode workers actually used.
    pub workers: usize,
    /// Payload frames the workers reported as decoded.
    pub decoded_frames: u64,
}

/// Where a load writes its output.
///
/// An explicit `output_name` keeps the extension of the stored file name;
/// otherwise the stored file name is used verbatim.
pub fn resolve_destination(output_folder: &Path, output_name: Option<&str>, stored_name: &str) -> PathBuf {
    match output_name.filter(|name| !name.is_empty()) {
        Some(name) => {
            let mut file_name = name.to_string();
            if let Some(ext) = Path::new(stored_name).extension() {
                file_name.push('.');
                file_name.push_str(&ext.to_string_lossy());
            }
            output_folder.join(file_name)
        }
        None => output_folder.join(stored_name),
    }
}

/// Shared, read-only state every worker decodes against.
struct DecodeJob<'a, B> {
    backend: &'a B,
    input: &'a Path,
    geo: FrameGeometry,
    /// Index of the globally last frame.
    last_index: u64,
    last_frame_size: usize,
    cancel: AtomicBool,
}

/// Output files of one load: worker 0 writes the staging file, every other
/// worker its own fragment. Anything not committed is removed on drop.
struct Staging {
    target: PathBuf,
    fragments: Vec<PathBuf>,
    committed: bool,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl Staging {
    fn new(destination: &Path, workers: usize) -> Self {
        Self {
            target: with_suffix(destination, ".partial"),
            fragments: (1..workers)
                .map(|i| with_suffix(destination, &format!(".part{}", i)))
                .collect(),
            committed: false,
        }
    }

    fn output_for(&self, worker: usize) -> &Path {
        match worker {
            0 => &self.target,
            n => &self.fragments[n - 1],
        }
    }

    /// Append fragments onto the staging file in worker order, deleting each.
    fn assemble(&self, expected_len: u64) -> Result<()> {
        let mut target = OpenOptions::new()
            .append(true)
            .open(&self.target)
            .map_err(StorageError::Io)
            .with_context(|| format!("failed to reopen {}", self.target.display()))?;

        for fragment in &self.fragments {
            let mut part = File::open(fragment)
                .map_err(StorageError::Io)
                .with_context(|| format!("failed to open fragment {}", fragment.display()))?;
            let copied = io::copy(&mut part, &mut target).map_err(StorageError::Io)?;
            debug!("appended {} bytes from {}", copied, fragment.display());
            drop(part);
            fs::remove_file(fragment).map_err(StorageError::Io)?;
        }
        target.sync_all().map_err(StorageError::Io)?;

        let assembled = target.metadata().map_err(StorageError::Io)?.len();
        if assembled != expected_len {
            return Err(StorageError::CorruptContainer(format!(
                "assembled {assembled} bytes, header declares {expected_len}"
            ))
            .into());
        }
        Ok(())
    }

    fn commit(mut self, destination: &Path) -> Result<()> {
        fs::rename(&self.target, destination)
            .map_err(StorageError::Io)
            .with_context(|| format!("failed to move output into {}", destination.display()))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in std::iter::once(&self.target).chain(&self.fragments) {
            match fs::remove_file(path) {
                Ok(()) => debug!("removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Open the video, read its frame count and parse the header frame.
fn read_header<B: VideoBackend>(
    input_path: &Path,
    geo: &FrameGeometry,
    backend: &B,
) -> Result<(HeaderRecord, u64)> {
    let mut source = backend
        .open_read(input_path)
        .map_err(|e| StorageError::InvalidContainer(format!("{e:#}")))?;

    let frames = source.frame_count();
    if frames == 0 {
        return Err(StorageError::InvalidContainer("video has no frames".into()).into());
    }

    let frame = source
        .read_frame()
        .map_err(|e| StorageError::InvalidContainer(format!("{e:#}")))?
        .ok_or_else(|| StorageError::InvalidContainer("header frame is missing".into()))?;
    let grid = codec::from_pixels(&frame, geo).map_err(StorageError::Codec)?;
    let header = HeaderRecord::parse(&codec::decode(&grid, ByteLimit::Frame))
        .map_err(StorageError::MalformedHeader)?;

    Ok((header, frames))
}

/// Load pipeline: video -> header -> partitioned parallel decode -> ordered
/// concatenation -> atomic rename into place.
///
/// On any failure the destination is left untouched and every staging and
/// fragment file is removed.
pub fn load_file<B: VideoBackend>(
    input_path: &Path,
    output_folder: &Path,
    output_name: Option<&str>,
    cfg: &TubeConfig,
    backend: &B,
) -> Result<LoadReport> {
    let geo = cfg.geometry().map_err(StorageError::from)?;

    info!("reading header frame: {}", input_path.display());
    let (header, frames) = read_header(input_path, &geo, backend)?;
    info!(
        "video holds {} ({} bytes) in {} frames",
        header.file_name, header.total_bytes, frames
    );

    let payload_frames = frames - 1;
    let last_frame_size = if payload_frames == 0 {
        if header.total_bytes != 0 {
            return Err(StorageError::CorruptContainer(format!(
                "header declares {} bytes but the video has no payload frames",
                header.total_bytes
            ))
            .into());
        }
        0
    } else {
        geo.last_frame_size(header.total_bytes, frames)
            .ok_or_else(|| {
                StorageError::CorruptContainer(format!(
                    "{} bytes cannot fill {} payload frames of {} bytes",
                    header.total_bytes, payload_frames, geo.chunk_bytes
                ))
            })?
    };

    let destination = resolve_destination(output_folder, output_name, &header.file_name);
    fs::create_dir_all(output_folder)
        .map_err(StorageError::Io)
        .with_context(|| format!("failed to create {}", output_folder.display()))?;

    let workers = effective_workers(cfg.workers, payload_frames, rayon::current_num_threads());
    let staging = Staging::new(&destination, workers);

    let decoded_frames = if payload_frames == 0 {
        File::create(&staging.target)
            .map_err(StorageError::Io)
            .with_context(|| format!("failed to create {}", staging.target.display()))?;
        0
    } else {
        let job = DecodeJob {
            backend,
            input: input_path,
            geo,
            last_index: frames - 1,
            last_frame_size,
            cancel: AtomicBool::new(false),
        };
        let decoded = run_workers(&job, &staging, payload_frames, workers, cfg.show_progress)?;
        staging.assemble(header.total_bytes)?;
        decoded
    };

    staging.commit(&destination)?;
    info!("load complete! output: {}", destination.display());

    Ok(LoadReport {
        path: destination,
        file_name: header.file_name,
        total_bytes: header.total_bytes,
        frames,
        workers,
        decoded_frames,
    })
}

/// Decode every payload frame on `workers` threads and wait for all of them.
/// Returns the number of frames the workers reported through the progress
/// channel.
fn run_workers<B: VideoBackend>(
    job: &DecodeJob<'_, B>,
    staging: &Staging,
    payload_frames: u64,
    workers: usize,
    show_progress: bool,
) -> Result<u64> {
    let parts = partition(payload_frames, workers);
    for part in &parts {
        debug!(
            "worker {} decodes frames {}..{}",
            part.worker,
            part.start,
            part.frames().end
        );
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("decode-{}", i))
        .build()
        .context("failed to build decode thread pool")?;

    let progress = ProgressAggregator::start("Load", payload_frames, show_progress);
    let mut results: Vec<Option<Result<()>>> = parts.iter().map(|_| None).collect();

    pool.scope(|scope| {
        for (part, slot) in parts.iter().zip(results.iter_mut()) {
            let output = staging.output_for(part.worker);
            let tx = progress.sender();
            scope.spawn(move |_| {
                let result = decode_partition(job, part, output, tx);
                if result.is_err() {
                    job.cancel.store(true, Ordering::Relaxed);
                }
                *slot = Some(result);
            });
        }
    });

    let decoded = progress.finish();
    debug!("{} of {} payload frames decoded", decoded, payload_frames);

    // All workers have joined; report the first failure in worker order.
    for (part, result) in parts.iter().zip(results) {
        match result {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(e.context(StorageError::WorkerFailure { worker: part.worker })),
            None => return Err(StorageError::WorkerFailure { worker: part.worker }.into()),
        }
    }
    Ok(decoded)
}

/// One worker: seek to the partition start and decode its frames in order
/// into `output`.
fn decode_partition<B: VideoBackend>(
    job: &DecodeJob<'_, B>,
    part: &Partition,
    output: &Path,
    progress: ProgressSender,
) -> Result<()> {
    let mut source = job
        .backend
        .open_read(job.input)
        .with_context(|| format!("failed to open {}", job.input.display()))?;
    source.seek(part.start)?;

    let file = File::create(output)
        .map_err(StorageError::Io)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    for index in part.frames() {
        if job.cancel.load(Ordering::Relaxed) {
            debug!("worker {} cancelled at frame {}", part.worker, index);
            return Ok(());
        }

        let frame = source
            .read_frame()
            .with_context(|| format!("failed to read frame {}", index))?
            .ok_or_else(|| {
                StorageError::CorruptContainer(format!("video ended before frame {}", index))
            })?;
        let grid = codec::from_pixels(&frame, &job.geo).map_err(StorageError::Codec)?;

        let limit = if index == job.last_index {
            ByteLimit::Bytes(job.last_frame_size)
        } else {
            ByteLimit::Frame
        };
        out.write_all(&codec::decode(&grid, limit))
            .map_err(StorageError::Io)?;
        progress.frame_done();
    }

    out.flush().map_err(StorageError::Io)?;
    Ok(())
}
