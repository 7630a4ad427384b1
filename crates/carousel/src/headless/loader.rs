use std::path::Path;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::engine::EngineError;

/// How the headless loader resolves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderMode {
    /// Resolve on the calling thread; results still surface on the next poll.
    #[default]
    Inline,
    /// Resolve on a worker thread per request.
    Threaded,
}

/// Result of probing one asset URL.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub url: String,
    pub dimensions: Result<(u32, u32), EngineError>,
}

/// Resolves image URLs to pixel dimensions off the frame path.
///
/// Supported schemes:
///
/// * `mem://WIDTHxHEIGHT/name` synthesises an image of that size,
/// * `missing://...` always fails,
/// * `file://path` or a bare path reads the image header from disk.
pub struct AssetLoader {
    mode: LoaderMode,
    sender: Sender<LoadedAsset>,
    receiver: Receiver<LoadedAsset>,
    in_flight: usize,
}

impl AssetLoader {
    pub fn new(mode: LoaderMode) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            mode,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn mode(&self) -> LoaderMode {
        self.mode
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn request(&mut self, url: &str) {
        self.in_flight += 1;
        let url = url.to_string();
        match self.mode {
            LoaderMode::Inline => {
                let dimensions = probe(&url);
                let _ = self.sender.send(LoadedAsset { url, dimensions });
            }
            LoaderMode::Threaded => {
                let sender = self.sender.clone();
                thread::spawn(move || {
                    let dimensions = probe(&url);
                    let _ = sender.send(LoadedAsset { url, dimensions });
                });
            }
        }
    }

    /// Collects every result that arrived since the last call.
    pub fn drain(&mut self) -> Vec<LoadedAsset> {
        let mut finished = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(asset) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    finished.push(asset);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        finished
    }

    /// Blocks until every outstanding request has reported back.
    pub fn wait_idle(&mut self) -> Vec<LoadedAsset> {
        let mut finished = self.drain();
        while self.in_flight > 0 {
            match self.receiver.recv() {
                Ok(asset) => {
                    self.in_flight -= 1;
                    finished.push(asset);
                }
                Err(_) => break,
            }
        }
        finished
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new(LoaderMode::default())
    }
}

pub fn probe(url: &str) -> Result<(u32, u32), EngineError> {
    if let Some(rest) = url.strip_prefix("mem://") {
        return parse_synthetic(url, rest);
    }
    if url.starts_with("missing://") {
        return Err(load_error(url, "asset does not exist"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Err(EngineError::Unsupported(format!(
            "remote asset '{url}' in headless mode"
        )));
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    image::image_dimensions(Path::new(path)).map_err(|err| load_error(url, err))
}

fn parse_synthetic(url: &str, rest: &str) -> Result<(u32, u32), EngineError> {
    let dims = rest.split('/').next().unwrap_or_default();
    let (width, height) = dims
        .split_once('x')
        .ok_or_else(|| load_error(url, "expected mem://WIDTHxHEIGHT/name"))?;
    let width: u32 = width
        .parse()
        .map_err(|_| load_error(url, format!("invalid width '{width}'")))?;
    let height: u32 = height
        .parse()
        .map_err(|_| load_error(url, format!("invalid height '{height}'")))?;
    if width == 0 || height == 0 {
        return Err(load_error(url, "zero-sized image"));
    }
    Ok((width, height))
}

fn load_error(url: &str, reason: impl ToString) -> EngineError {
    EngineError::AssetLoad {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
