// SPDX-License-Identifier: GPL-3.0-only

//! Viewport and image-space geometry shared by the overlay, coordinator and helper.

use serde::{Deserialize, Serialize};

/// Smallest accepted selection edge, in viewport pixels.
pub const MIN_SELECTION_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in viewport (CSS) pixels, relative to the visible page area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Axis-aligned bounding box of two corner points.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Zero-sized rectangle anchored at `origin`.
    #[must_use]
    pub fn collapsed(origin: Point) -> Self {
        Self::new(origin.x, origin.y, 0.0, 0.0)
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    #[must_use]
    pub fn meets_minimum(&self, min_size: f64) -> bool {
        self.width >= min_size && self.height >= min_size
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Whether the rectangle lies completely inside a viewport of the given size.
    #[must_use]
    pub fn fits_in(&self, viewport: ViewportSize) -> bool {
        self.left >= 0.0
            && self.top >= 0.0
            && self.right() <= viewport.width
            && self.bottom() <= viewport.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// What the page reports about itself at the moment a selection is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub scroll: ScrollOffset,
    pub device_pixel_ratio: f64,
    pub viewport: ViewportSize,
}

impl Default for PageMetrics {
    fn default() -> Self {
        Self {
            scroll: ScrollOffset::default(),
            device_pixel_ratio: 1.0,
            viewport: ViewportSize::default(),
        }
    }
}

/// Everything needed to map a viewport selection onto the pixels of a raw screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureContext {
    pub rect: SelectionRect,
    pub scroll: ScrollOffset,
    pub device_pixel_ratio: f64,
    pub viewport: ViewportSize,
}

impl CaptureContext {
    #[must_use]
    pub fn new(rect: SelectionRect, metrics: PageMetrics) -> Self {
        Self {
            rect,
            scroll: metrics.scroll,
            device_pixel_ratio: metrics.device_pixel_ratio,
            viewport: metrics.viewport,
        }
    }
}

/// Pixel-space rectangle extracted from a raw screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for CropWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
