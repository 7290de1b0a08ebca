///! Perceptual change detection between consecutive screenshots
use crate::errors::VisualError;
use image_hasher::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Distances strictly below this mean the screen did not meaningfully change.
pub const NO_CHANGE_THRESHOLD: u32 = 5;

/// Hash edge in cells; the digest is `HASH_SIZE * HASH_SIZE` bits.
const HASH_SIZE: u32 = 8;

/// Opaque perceptual hash of a screenshot.
///
/// Compared via Hamming distance. The empty fingerprint is the degenerate
/// value produced for undecodable input and behaves as all-zero bits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenshotFingerprint {
    bits: Vec<u8>,
}

impl ScreenshotFingerprint {
    pub fn from_bytes(bits: Vec<u8>) -> Self {
        Self { bits }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn is_degenerate(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }

    /// Hamming distance; shorter digests are zero-extended.
    pub fn distance(&self, other: &ScreenshotFingerprint) -> u32 {
        let len = self.bits.len().max(other.bits.len());
        (0..len)
            .map(|i| {
                let a = self.bits.get(i).copied().unwrap_or(0);
                let b = other.bits.get(i).copied().unwrap_or(0);
                (a ^ b).count_ones()
            })
            .sum()
    }

    /// Whether `other` differs enough to count as a visual change.
    pub fn changed_from(&self, other: &ScreenshotFingerprint) -> bool {
        self.distance(other) >= NO_CHANGE_THRESHOLD
    }
}

/// Fingerprint encoded screenshot bytes; never fails.
pub fn fingerprint(image_bytes: &[u8]) -> ScreenshotFingerprint {
    match try_fingerprint(image_bytes) {
        Ok(fp) => fp,
        Err(err) => {
            debug!(error = %err, "fingerprint fell back to degenerate value");
            ScreenshotFingerprint::default()
        }
    }
}

/// Hamming distance between two fingerprints.
pub fn distance(a: &ScreenshotFingerprint, b: &ScreenshotFingerprint) -> u32 {
    a.distance(b)
}

fn try_fingerprint(image_bytes: &[u8]) -> Result<ScreenshotFingerprint, VisualError> {
    if image_bytes.is_empty() {
        return Err(VisualError::InvalidInput("empty image".to_string()));
    }
    let img = image::load_from_memory(image_bytes)?;
    let hasher = HasherConfig::new()
        .hash_size(HASH_SIZE, HASH_SIZE)
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .to_hasher();
    let hash = hasher.hash_image(&img);
    Ok(ScreenshotFingerprint::from_bytes(hash.as_bytes().to_vec()))
}
