use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

/// Build a frame counter bar, or a hidden one when progress is switched off.
pub fn frame_bar(label: &'static str, total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos}/{len} frames ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    progress.set_style(style);
    progress.set_prefix(label);
    progress
}

/// Producer end handed to each decode worker.
#[derive(Clone)]
pub struct ProgressSender(Sender<()>);

impl ProgressSender {
    /// Report one decoded frame. Progress is advisory, so a departed consumer
    /// is not an error.
    pub fn frame_done(&self) {
        let _ = self.0.send(());
    }
}

/// Counts "frame done" signals from any number of workers on one thread.
pub struct ProgressAggregator {
    sender: Sender<()>,
    handle: JoinHandle<u64>,
}

impl ProgressAggregator {
    pub fn start(label: &'static str, total: u64, visible: bool) -> Self {
        let (sender, receiver) = mpsc::channel();
        let bar = frame_bar(label, total, visible);
        let handle = thread::spawn(move || drain(receiver, bar));
        Self { sender, handle }
    }

    pub fn sender(&self) -> ProgressSender {
        ProgressSender(self.sender.clone())
    }

    /// Wait for every sender to drop and return the number of frames counted.
    pub fn finish(self) -> u64 {
        let Self { sender, handle } = self;
        drop(sender);
        handle.join().unwrap_or_else(|_| {
            warn!("progress thread panicked");
            0
        })
    }
}

fn drain(receiver: Receiver<()>, bar: ProgressBar) -> u64 {
    let mut done = 0u64;
    for () in receiver {
        done += 1;
        bar.inc(1);
    }
    bar.finish();
    done
}
