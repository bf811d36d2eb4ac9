//! Replay of recorded frames through the capture pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use aimtrack_core::RgbImage;
use aimtrack_pipeline::{CaptureDevice, CaptureError};

use crate::detect::load_rgb;

const EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if is_image && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// [`CaptureDevice`] backed by a directory of image files.
///
/// Frames are delivered in file-name order, at most one per `interval`. At the
/// end of the list the device either starts over (`looping`) or reports
/// [`CaptureError::EndOfStream`]. A file that fails to decode is skipped with
/// a read error, which the capture loop treats like a dropped connection.
#[derive(Debug)]
pub struct ImageSequenceDevice {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    next: usize,
    looping: bool,
    interval: Duration,
    last_read: Option<Instant>,
    open: bool,
}

impl ImageSequenceDevice {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: Vec::new(),
            next: 0,
            looping: false,
            interval: Duration::ZERO,
            last_read: None,
            open: false,
        }
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Minimum time between two delivered frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files found by the last successful open.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.paths.is_empty() {
            let paths = list_images(&self.dir)
                .map_err(|e| CaptureError::Open(format!("{}: {e}", self.dir.display())))?;
            if paths.is_empty() {
                return Err(CaptureError::Open(format!(
                    "no images in {}",
                    self.dir.display()
                )));
            }
            self.paths = paths;
        }
        self.open = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if !self.open {
            return Err(CaptureError::Read("device is not open".to_owned()));
        }
        if self.next >= self.paths.len() {
            if !self.looping {
                return Err(CaptureError::EndOfStream);
            }
            self.next = 0;
        }
        self.pace();
        let path = &self.paths[self.next];
        self.next += 1;
        load_rgb(path).map_err(|e| CaptureError::Read(e.to_string()))
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
