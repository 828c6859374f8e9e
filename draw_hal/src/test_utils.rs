//! Shared helpers for unit tests (test builds only)

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use crate::log::{Logger, LogEntry};

/// Logger that stores every entry so tests can assert on diagnostics
///
/// Tests installing it must be `#[serial]`: the logger slot is process-wide.
#[derive(Clone, Default)]
pub struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    /// Install a fresh capture logger as the global logger and return a handle to it
    pub fn install() -> Self {
        let logger = Self::default();
        crate::log::set_logger(logger.clone());
        logger
    }

    /// Entries logged from `source`
    ///
    /// Other tests may log concurrently, so assertions filter by source.
    pub fn entries_from(&self, source: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|e| e.source == source).cloned().collect())
            .unwrap_or_default()
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}

/// Encode a solid-color RGBA image as PNG
pub fn encode_png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(pixel));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}
