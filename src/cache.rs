//! Decoded image cache.
//!
//! The cache is an ordinary value owned by whoever drives loading (usually the
//! [`Controller`](crate::Controller)) and passed by reference to the
//! [`ImageLoader`](crate::source::ImageLoader). Its lifetime is the session;
//! [`ImageCache::dispose`] drops everything at once.

use crate::density::DecodedImage;
use crate::error::DecodeError;
use crate::source::ImageSource;
use std::collections::HashMap;
use std::sync::Arc;

/// Decoded images keyed by reference.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<String, Arc<DecodedImage>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<Arc<DecodedImage>> {
        self.images.get(reference).cloned()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.images.contains_key(reference)
    }

    /// Store `image`, replacing any previous entry for `reference`.
    pub fn insert(&mut self, reference: impl Into<String>, image: Arc<DecodedImage>) {
        self.images.insert(reference.into(), image);
    }

    pub fn remove(&mut self, reference: &str) -> Option<Arc<DecodedImage>> {
        self.images.remove(reference)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Decode every reference not already cached, on the calling thread.
    /// Returns the failures; successful decodes are cached.
    pub fn preload<'a>(
        &mut self,
        source: &dyn ImageSource,
        references: impl IntoIterator<Item = &'a str>,
    ) -> Vec<DecodeError> {
        let mut failures = Vec::new();
        for reference in references {
            if self.contains(reference) {
                continue;
            }
            match source.decode(reference) {
                Ok(image) => self.insert(reference, Arc::new(image)),
                Err(e) => failures.push(e),
            }
        }
        failures
    }

    /// Drop every cached image.
    pub fn dispose(&mut self) {
        log::debug!("Disposing image cache ({} entries)", self.images.len());
        self.images.clear();
    }
}
