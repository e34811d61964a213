//! Session-local object URLs.
//!
//! The kiosk hands the assembled GIF to the display layer as an opaque
//! `blob:` URL. The registry owns the bytes behind each URL until it is revoked.

use std::collections::HashMap;
use std::fmt;

use super::encoded::EncodedImage;

/// Opaque handle to bytes held by a [`BlobRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: u64,
    entries: HashMap<BlobUrl, EncodedImage>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image` and return a fresh URL for it.
    pub fn issue(&mut self, image: EncodedImage) -> BlobUrl {
        self.next_id += 1;
        let url = BlobUrl(format!("blob:photobooth/{}", self.next_id));
        self.entries.insert(url.clone(), image);
        url
    }

    /// Drop the bytes behind `url`. Unknown URLs are ignored.
    pub fn revoke(&mut self, url: &BlobUrl) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn resolve(&self, url: &BlobUrl) -> Option<EncodedImage> {
        self.entries.get(url).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_revoke() {
        let mut registry = BlobRegistry::new();
        let a = registry.issue(EncodedImage::new(vec![1, 2, 3], "image/gif"));
        let b = registry.issue(EncodedImage::new(vec![4], "image/gif"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.revoke(&a));
        assert!(!registry.revoke(&a));
        assert!(registry.resolve(&a).is_none());
        assert_eq!(registry.resolve(&b).map(|img| img.bytes().to_vec()), Some(vec![4]));
    }
}
