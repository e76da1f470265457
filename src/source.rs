//! Image sources and the asynchronous loader.
//!
//! An [`ImageSource`] turns an opaque reference into pixels. The
//! [`ImageLoader`] runs sources off the frame thread and hands results back
//! through [`ImageLoader::poll`], tagged with the generation number the
//! caller supplied when it asked. The caller compares that number with its
//! own current generation to tell fresh results from stale ones; the loader
//! itself never cancels a decode.
//!
//! Two requests for the same reference while the first is still decoding
//! share one decode.

use crate::cache::ImageCache;
use crate::density::DecodedImage;
use crate::error::DecodeError;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

/// Something that can decode an image reference.
pub trait ImageSource: Send + Sync {
    fn decode(&self, reference: &str) -> Result<DecodedImage, DecodeError>;
}

/// Decodes files with the `image` crate. References are paths, resolved
/// against an optional root directory.
#[derive(Debug, Clone, Default)]
pub struct FsImageSource {
    root: Option<PathBuf>,
}

impl FsImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative references against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(reference),
            None => PathBuf::from(reference),
        }
    }
}

impl ImageSource for FsImageSource {
    fn decode(&self, reference: &str) -> Result<DecodedImage, DecodeError> {
        let img = image::open(self.resolve(reference)).map_err(|e| DecodeError::from_image(reference, e))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(DecodeError::Empty {
                reference: reference.to_string(),
            });
        }
        Ok(DecodedImage::from_dynamic(img))
    }
}

/// Serves pre-decoded images from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, DecodedImage>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, reference: impl Into<String>, image: DecodedImage) -> Self {
        self.images.insert(reference.into(), image);
        self
    }

    pub fn insert(&mut self, reference: impl Into<String>, image: DecodedImage) {
        self.images.insert(reference.into(), image);
    }
}

impl ImageSource for MemoryImageSource {
    fn decode(&self, reference: &str) -> Result<DecodedImage, DecodeError> {
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| DecodeError::NotFound {
                reference: reference.to_string(),
            })
    }
}

/// Where decodes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// One short-lived worker thread per decode.
    #[default]
    Threaded,
    /// On the requesting thread. Results are still only delivered by `poll`.
    Inline,
}

/// A finished load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Generation passed to [`ImageLoader::request`].
    pub generation: u64,
    pub reference: String,
    pub result: Result<Arc<DecodedImage>, Arc<DecodeError>>,
}

type Decoded = (String, Result<DecodedImage, DecodeError>);

/// Runs an [`ImageSource`] asynchronously.
pub struct ImageLoader {
    source: Arc<dyn ImageSource>,
    dispatch: Dispatch,
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
    /// Generations waiting on each in-flight reference.
    waiting: HashMap<String, Vec<u64>>,
    ready: VecDeque<LoadOutcome>,
}

impl ImageLoader {
    pub fn new(source: Arc<dyn ImageSource>, dispatch: Dispatch) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            dispatch,
            tx,
            rx,
            waiting: HashMap::new(),
            ready: VecDeque::new(),
        }
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    /// Number of references currently decoding.
    pub fn in_flight(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_loading(&self, reference: &str) -> bool {
        self.waiting.contains_key(reference)
    }

    /// Ask for `reference` on behalf of `generation`.
    ///
    /// Cached images resolve at the next poll without decoding. A reference
    /// already decoding gains another waiter instead of a second decode.
    pub fn request(&mut self, generation: u64, reference: &str, cache: &ImageCache) {
        if let Some(image) = cache.get(reference) {
            log::debug!("Cache hit for '{}' (generation {})", reference, generation);
            self.ready.push_back(LoadOutcome {
                generation,
                reference: reference.to_string(),
                result: Ok(image),
            });
            return;
        }

        if let Some(waiters) = self.waiting.get_mut(reference) {
            log::debug!("Joining in-flight decode of '{}' (generation {})", reference, generation);
            waiters.push(generation);
            return;
        }
        self.waiting.insert(reference.to_string(), vec![generation]);

        match self.dispatch {
            Dispatch::Inline => {
                let result = self.source.decode(reference);
                // The receiver lives in `self`, so this cannot fail.
                let _ = self.tx.send((reference.to_string(), result));
            }
            Dispatch::Threaded => {
                let source = Arc::clone(&self.source);
                let tx = self.tx.clone();
                let owned = reference.to_string();
                let spawned = thread::Builder::new()
                    .name("pixdust-decode".into())
                    .spawn(move || {
                        let result = source.decode(&owned);
                        // The loader may be gone; nobody is waiting then.
                        let _ = tx.send((owned, result));
                    });

                if let Err(source) = spawned {
                    log::warn!("Failed to spawn decode thread for '{}': {}", reference, source);
                    let _ = self.tx.send((
                        reference.to_string(),
                        Err(DecodeError::Io {
                            reference: reference.to_string(),
                            source,
                        }),
                    ));
                }
            }
        }
    }

    /// Collect every load that has finished since the last poll.
    ///
    /// Successful decodes are added to `cache`. Never blocks.
    pub fn poll(&mut self, cache: &mut ImageCache) -> Vec<LoadOutcome> {
        let mut outcomes: Vec<LoadOutcome> = self.ready.drain(..).collect();

        loop {
            let (reference, result) = match self.rx.try_recv() {
                Ok(decoded) => decoded,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            let result = match result {
                Ok(image) => {
                    let image = Arc::new(image);
                    cache.insert(reference.clone(), Arc::clone(&image));
                    Ok(image)
                }
                Err(e) => {
                    log::warn!("{}", e);
                    Err(Arc::new(e))
                }
            };

            let generations = self.waiting.remove(&reference).unwrap_or_default();
            outcomes.extend(generations.into_iter().map(|generation| LoadOutcome {
                generation,
                reference: reference.clone(),
                result: result.clone(),
            }));
        }

        outcomes
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("dispatch", &self.dispatch)
            .field("in_flight", &self.waiting.len())
            .field("ready", &self.ready.len())
            .finish()
    }
}
