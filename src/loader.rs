use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use image::DynamicImage;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not load preview {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub struct LoadedPreview {
    pub width: u32,
    pub height: u32,
    pub image: DynamicImage,
}

type Completion = (u64, Result<LoadedPreview, LoadError>);

/// Decodes previews on a background thread. Each request bumps a generation
/// counter; completions tagged with an older generation are dropped, so a
/// slow decode can never clobber state set up by a newer request.
pub struct PreviewLoader {
    generation: u64,
    pending: bool,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl PreviewLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            generation: 0,
            pending: false,
            tx,
            rx,
        }
    }

    fn begin(&mut self) -> (u64, Sender<Completion>) {
        self.generation += 1;
        self.pending = true;
        (self.generation, self.tx.clone())
    }

    /// True from request until the matching completion is polled. The UI
    /// keeps scheduling repaints while this holds, so a decode finishing
    /// between input events still shows up without waiting for the mouse.
    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn request(&mut self, path: PathBuf) -> u64 {
        let (generation, tx) = self.begin();
        debug!(generation, path = %path.display(), "loading preview");
        thread::spawn(move || {
            let result = image::open(&path)
                .map(|image| LoadedPreview {
                    width: image.width(),
                    height: image.height(),
                    image,
                })
                .map_err(|source| LoadError::Decode { path, source });
            let _ = tx.send((generation, result));
        });
        generation
    }

    /// Drain finished loads; only a completion for the newest request
    /// survives (last-writer-wins).
    pub fn poll(&mut self) -> Option<Result<LoadedPreview, LoadError>> {
        let mut latest = None;
        while let Ok((generation, result)) = self.rx.try_recv() {
            if generation == self.generation {
                self.pending = false;
                latest = Some(result);
            } else {
                debug!(
                    generation,
                    current = self.generation,
                    "dropping stale preview completion"
                );
            }
        }
        latest
    }
}

impl Default for PreviewLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(width: u32, height: u32) -> LoadedPreview {
        LoadedPreview {
            width,
            height,
            image: DynamicImage::new_rgb8(width, height),
        }
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut loader = PreviewLoader::new();
        let (old, old_tx) = loader.begin();
        let (new, new_tx) = loader.begin();
        assert!(old < new);

        old_tx.send((old, Ok(preview(100, 100)))).unwrap();
        assert!(loader.poll().is_none());

        new_tx.send((new, Ok(preview(640, 480)))).unwrap();
        let loaded = loader.poll().unwrap().unwrap();
        assert_eq!((loaded.width, loaded.height), (640, 480));
    }

    #[test]
    fn newest_of_several_pending_completions_wins() {
        let mut loader = PreviewLoader::new();
        let (old, tx) = loader.begin();
        let (new, _) = loader.begin();
        tx.send((old, Ok(preview(1, 1)))).unwrap();
        tx.send((new, Ok(preview(2, 2)))).unwrap();
        let loaded = loader.poll().unwrap().unwrap();
        assert_eq!(loaded.width, 2);
    }

    #[test]
    fn decode_failure_is_reported_for_current_generation() {
        let mut loader = PreviewLoader::new();
        let generation = loader.request(PathBuf::from("definitely/not/a/file.png"));
        assert_eq!(generation, 1);
        // The worker thread finishes quickly for a missing file.
        for _ in 0..200 {
            if let Some(result) = loader.poll() {
                assert!(result.is_err());
                return;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        panic!("load completion never arrived");
    }

    #[test]
    fn poll_is_quiet_with_nothing_in_flight() {
        let mut loader = PreviewLoader::new();
        assert!(!loader.pending());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn pending_holds_until_the_current_completion_is_polled() {
        let mut loader = PreviewLoader::new();
        let (old, old_tx) = loader.begin();
        let (new, new_tx) = loader.begin();
        assert!(loader.pending());

        // A stale completion does not satisfy the outstanding request.
        old_tx.send((old, Ok(preview(1, 1)))).unwrap();
        assert!(loader.poll().is_none());
        assert!(loader.pending());

        new_tx.send((new, Ok(preview(2, 2)))).unwrap();
        assert!(loader.poll().is_some());
        assert!(!loader.pending());
    }
}
