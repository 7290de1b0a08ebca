//! Synthetic cursor marker detection.
//!
//! The browser session paints a small coloured dot under the pointer:
//! red over inert areas, green over clickable targets and blue over
//! draggable ones. Detection works on wide RGB bands so that JPEG
//! artefacts around the dot still match.
//!
//! ```text
//! expected point given? ──yes──> scan ±50px square ──hit──> centroid
//!        │                              │ miss
//!        └──────────no──────────> scan top strip, left strip, centre box
//!                                       │ miss
//!                                       └──> NotFound @ expected | centre
//! ```

use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

use crate::models::{CursorColor, CursorObservation, Point};

/// Inclusive RGB band describing one marker colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBand {
    pub color: CursorColor,
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorBand {
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        (0..3).all(|i| rgb[i] >= self.lower[i] && rgb[i] <= self.upper[i])
    }
}

/// Marker bands in evaluation order.
pub const MARKER_BANDS: [ColorBand; 3] = [
    ColorBand {
        color: CursorColor::Red,
        lower: [180, 0, 0],
        upper: [255, 80, 80],
    },
    ColorBand {
        color: CursorColor::Green,
        lower: [0, 180, 0],
        upper: [80, 255, 80],
    },
    ColorBand {
        color: CursorColor::Blue,
        lower: [0, 0, 180],
        upper: [80, 80, 255],
    },
];

/// Half-width of the square scanned around the expected position.
pub const SEARCH_RADIUS: i32 = 50;

/// Rectangle in pixel space, `x1..x2` and `y1..y2` half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl Region {
    /// Clamp signed corners onto an image of the given size.
    fn clamped(x1: i32, y1: i32, x2: i32, y2: i32, width: u32, height: u32) -> Option<Self> {
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        let region = Self {
            x1: clamp(x1, width),
            y1: clamp(y1, height),
            x2: clamp(x2, width),
            y2: clamp(y2, height),
        };
        (region.x1 < region.x2 && region.y1 < region.y2).then_some(region)
    }
}

/// Locates the cursor marker in encoded screenshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorLocator;

impl CursorLocator {
    pub fn new() -> Self {
        Self
    }

    /// Decode and scan `screenshot`. Always yields a position.
    pub fn locate(&self, screenshot: &[u8], expected: Option<Point>) -> CursorObservation {
        let fallback = expected.unwrap_or_else(Point::canvas_center);
        let image = match image::load_from_memory(screenshot) {
            Ok(img) => img,
            Err(err) => {
                warn!(error = %err, "cursor detection could not decode screenshot");
                return CursorObservation::not_found(fallback);
            }
        };
        self.locate_in(&image, expected)
    }

    /// Scan an already decoded image.
    pub fn locate_in(&self, image: &DynamicImage, expected: Option<Point>) -> CursorObservation {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        if let Some(point) = expected {
            if let Some(region) = Region::clamped(
                point.x - SEARCH_RADIUS,
                point.y - SEARCH_RADIUS,
                point.x + SEARCH_RADIUS,
                point.y + SEARCH_RADIUS,
                width,
                height,
            ) {
                if let Some(found) = scan_region(&rgb, region) {
                    debug!(color = %found.color, position = %found.position, "cursor found near expected point");
                    return found;
                }
            }
        }

        for region in likely_regions(width, height) {
            if let Some(found) = scan_region(&rgb, region) {
                debug!(color = %found.color, position = %found.position, "cursor found in fallback region");
                return found;
            }
        }

        let position = expected
            .unwrap_or_else(|| Point::new((width / 2) as i32, (height / 2) as i32));
        debug!(position = %position, "cursor marker not found");
        CursorObservation::not_found(position)
    }
}

/// Top strip, left strip, centre box.
fn likely_regions(width: u32, height: u32) -> Vec<Region> {
    let (w, h) = (width as i32, height as i32);
    [
        Region::clamped(0, 0, w, 150, width, height),
        Region::clamped(0, 0, 200, h, width, height),
        Region::clamped(w / 2 - 300, h / 2 - 300, w / 2 + 300, h / 2 + 300, width, height),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// First band with any matching pixel wins; position is the match centroid.
fn scan_region(image: &RgbImage, region: Region) -> Option<CursorObservation> {
    MARKER_BANDS.iter().find_map(|band| {
        let mut sum_x: u64 = 0;
        let mut sum_y: u64 = 0;
        let mut count: u64 = 0;
        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                if band.contains(image.get_pixel(x, y).0) {
                    sum_x += u64::from(x);
                    sum_y += u64::from(y);
                    count += 1;
                }
            }
        }
        (count > 0).then(|| {
            CursorObservation::new(
                band.color,
                Point::new((sum_x / count) as i32, (sum_y / count) as i32),
            )
        })
    })
}
