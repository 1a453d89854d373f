//! Texture atlas management using skyline packing.
//!
//! The atlas packs bitmaps (in practice: one MSDF glyph page per font)
//! into a single RGBA8 texture that grows by doubling along either axis
//! instead of being rebuilt. Free space is tracked by a *front*: a list
//! of `(x, y)` points sorted by `y`, where each point states that starting
//! at row `y` (and up to the next point's row) every column from `x` to
//! the right is still free.
//!
//! Placement tries the position in front of every front point and keeps
//! the one that wastes the least space, where waste counts the growth of
//! the (power-of-two) atlas area, the pixels left unusable to the left of
//! the bitmap, and a quarter of any thin strip that would be left over
//! below it.

use image::{RgbaImage, imageops};
use tracing::{debug, info};

use crate::backend::TextureHandle;
use crate::error::AtlasFullError;

/// Default initial atlas texture size.
pub const DEFAULT_ATLAS_SIZE: u32 = 512;

/// Atlas size limit used when the device does not report one.
pub const FALLBACK_MAX_ATLAS_SIZE: u32 = 32768;

/// A placed rectangle in atlas pixel space; `x1`/`y1` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtlasRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl AtlasRect {
    /// Create a rectangle from its corners.
    #[inline]
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Whether the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Whether two rectangles share at least one pixel.
    pub fn overlaps(&self, other: &AtlasRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x0 < other.x1
            && other.x0 < self.x1
            && self.y0 < other.y1
            && other.y0 < self.y1
    }
}

/// One step of the packing front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontPoint {
    /// First free column from row `y` downwards.
    pub x: u32,
    /// Row at which this step starts.
    pub y: u32,
}

impl FrontPoint {
    const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// GPU work owed for the atlas texture since the last upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingUpload {
    /// The texture matches the pixel buffer.
    #[default]
    None,
    /// The texture must be (re)created from the whole pixel buffer.
    Full,
    /// Only these regions changed.
    Regions(Vec<AtlasRect>),
}

impl PendingUpload {
    /// Whether any upload is owed.
    #[inline]
    pub fn is_pending(&self) -> bool {
        !matches!(self, PendingUpload::None)
    }
}

/// A growable texture atlas with skyline packing.
#[derive(Debug)]
pub struct TextureAtlas {
    /// GPU texture backing this atlas.
    texture: TextureHandle,
    /// CPU copy of the texture contents.
    image: RgbaImage,
    /// Packing front, sorted by `y`; `front[0].y == 0`.
    front: Vec<FrontPoint>,
    /// Hard limit for width and height.
    max_size: u32,
    /// Uploads owed to the GPU.
    pending: PendingUpload,
}

impl TextureAtlas {
    /// Create an empty atlas.
    ///
    /// Both sizes are rounded up to powers of two and the initial size is
    /// clamped to `max_size`.
    pub fn new(texture: TextureHandle, initial_size: (u32, u32), max_size: u32) -> Self {
        let max_size = prev_power_of_two(max_size.max(1));
        let width = initial_size.0.max(1).next_power_of_two().min(max_size);
        let height = initial_size.1.max(1).next_power_of_two().min(max_size);
        debug!(
            target: "ctrlpad_render::atlas",
            width, height, max_size,
            "created texture atlas"
        );
        Self {
            texture,
            image: RgbaImage::new(width, height),
            front: vec![FrontPoint::new(0, 0)],
            max_size,
            pending: PendingUpload::Full,
        }
    }

    /// The GPU texture this atlas uploads to.
    #[inline]
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// Current size of the atlas in pixels.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Hard limit for either dimension.
    #[inline]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// The CPU copy of the atlas contents.
    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The current packing front.
    #[inline]
    pub fn front(&self) -> &[FrontPoint] {
        &self.front
    }

    /// Uploads owed to the GPU.
    #[inline]
    pub fn pending_upload(&self) -> &PendingUpload {
        &self.pending
    }

    /// Take the owed uploads, leaving the atlas marked as in sync.
    pub fn take_pending_upload(&mut self) -> PendingUpload {
        std::mem::take(&mut self.pending)
    }

    /// Place `bitmap` into the atlas and return where it went.
    ///
    /// The atlas grows as needed. Fails without touching the atlas if no
    /// placement fits within the size limit.
    pub fn put(&mut self, bitmap: &RgbaImage) -> Result<AtlasRect, AtlasFullError> {
        let (w, h) = bitmap.dimensions();
        if w == 0 || h == 0 {
            return Ok(AtlasRect::default());
        }

        let (x0, y0) = self.find_position(w, h).ok_or(AtlasFullError {
            width: w,
            height: h,
            max_size: self.max_size,
        })?;
        let rect = AtlasRect::new(x0, y0, x0 + w, y0 + h);
        self.advance_front(&rect);

        let (sx, sy) = self.size();
        let (nx, ny) = self.grown_size(&rect);
        if nx > sx || ny > sy {
            let mut grown = RgbaImage::new(nx, ny);
            imageops::replace(&mut grown, &self.image, 0, 0);
            self.image = grown;
            self.pending = PendingUpload::Full;
            info!(
                target: "ctrlpad_render::atlas",
                width = nx, height = ny,
                "texture atlas resized"
            );
        }
        imageops::replace(&mut self.image, bitmap, i64::from(x0), i64::from(y0));

        match &mut self.pending {
            PendingUpload::Full => {}
            PendingUpload::Regions(regions) => regions.push(rect),
            pending @ PendingUpload::None => *pending = PendingUpload::Regions(vec![rect]),
        }

        debug!(
            target: "ctrlpad_render::atlas",
            x0 = rect.x0, y0 = rect.y0, x1 = rect.x1, y1 = rect.y1,
            "placed bitmap"
        );
        Ok(rect)
    }

    /// Atlas size needed to contain `rect`, doubling each axis independently.
    fn grown_size(&self, rect: &AtlasRect) -> (u32, u32) {
        let (mut sx, mut sy) = self.size();
        while rect.x1 > sx {
            sx *= 2;
        }
        while rect.y1 > sy {
            sy *= 2;
        }
        (sx, sy)
    }

    /// Pick the least wasteful position for a `w`x`h` bitmap.
    fn find_position(&self, w: u32, h: u32) -> Option<(u32, u32)> {
        let (cur_w, cur_h) = self.size();
        let current_area = u64::from(cur_w) * u64::from(cur_h);

        let mut best = None;
        let mut min_waste = u64::MAX;
        for (i, start) in self.front.iter().enumerate() {
            let y = start.y;
            let y_end = y + h;
            // Front points whose rows the bitmap would span; the front is
            // sorted by `y`, so this is a contiguous run starting at `i`.
            let span = self.front[i..]
                .iter()
                .take_while(|p| p.y < y_end)
                .count();
            let covered = &self.front[i..i + span];
            let Some(x) = covered.iter().map(|p| p.x).max() else {
                continue;
            };
            let x_end = x + w;
            if x_end.max(y_end) > self.max_size {
                continue;
            }

            let (gx, gy) = self.grown_size(&AtlasRect::new(x, y, x_end, y_end));
            let mut waste = u64::from(gx) * u64::from(gy) - current_area;
            for (k, p) in covered.iter().enumerate() {
                let seg_end = self.front.get(i + k + 1).map_or(y_end, |next| next.y);
                // Pixels left of the bitmap that can never be filled.
                let left = u64::from(x - p.x) * u64::from(seg_end.min(y_end).saturating_sub(p.y));
                // A thin flat strip left below the bitmap within this step.
                let flat = if y_end < seg_end && seg_end < y_end + h {
                    u64::from(x_end - p.x) * u64::from(seg_end - y_end)
                } else {
                    0
                };
                waste += left + flat / 4;
            }

            if waste < min_waste {
                min_waste = waste;
                best = Some((x, y));
            }
        }
        best
    }

    /// Update the front after `rect` has been occupied.
    fn advance_front(&mut self, rect: &AtlasRect) {
        let (x1, y0, y1) = (rect.x1, rect.y0, rect.y1);
        let mut next: Vec<FrontPoint> = self.front.iter().copied().filter(|p| p.y < y0).collect();
        next.push(FrontPoint::new(x1, y0));

        // Below the bitmap, the step it partially covered resumes.
        if let Some(i) = self.front.iter().position(|p| p.y >= y1) {
            if i > 0 && self.front[i].y > y1 && self.front[i - 1].y >= y0 {
                next.push(FrontPoint::new(self.front[i - 1].x, y1));
            }
        }

        let below: Vec<FrontPoint> = self.front.iter().copied().filter(|p| p.y >= y1).collect();
        if below.is_empty() {
            next.push(FrontPoint::new(0, y1));
        }
        next.extend(below);
        self.front = next;
    }
}

/// Largest power of two not above `value` (which must be non-zero).
fn prev_power_of_two(value: u32) -> u32 {
    1 << (31 - value.leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas(initial: u32, max: u32) -> TextureAtlas {
        TextureAtlas::new(TextureHandle::from_raw(1), (initial, initial), max)
    }

    fn bitmap(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn test_sizes_are_powers_of_two() {
        let a = TextureAtlas::new(TextureHandle::from_raw(1), (300, 100), 5000);
        assert_eq!(a.size(), (512, 128));
        assert_eq!(a.max_size(), 4096);

        let clamped = atlas(512, 256);
        assert_eq!(clamped.size(), (256, 256));
    }

    #[test]
    fn test_first_placement_at_origin() {
        let mut a = atlas(512, 4096);
        let r = a.put(&bitmap(64, 64)).unwrap();
        assert_eq!(r, AtlasRect::new(0, 0, 64, 64));
        assert_eq!(a.front(), &[FrontPoint::new(64, 0), FrontPoint::new(0, 64)]);
    }

    #[test]
    fn test_second_placement_does_not_overlap() {
        let mut a = atlas(512, 4096);
        let r1 = a.put(&bitmap(64, 64)).unwrap();
        let r2 = a.put(&bitmap(64, 64)).unwrap();
        assert!(!r1.overlaps(&r2));
        assert!(r2 == AtlasRect::new(64, 0, 128, 64) || r2 == AtlasRect::new(0, 64, 64, 128));
        assert_eq!(a.size(), (512, 512));
    }

    #[test]
    fn test_front_restores_partially_covered_step() {
        let mut a = atlas(256, 256);
        a.put(&bitmap(100, 50)).unwrap();
        a.put(&bitmap(20, 20)).unwrap();
        let front = a.front();
        assert_eq!(front[0].y, 0);
        assert!(front.windows(2).all(|w| w[0].y < w[1].y));
    }

    #[test]
    fn test_growth_doubles_each_axis_independently() {
        let mut a = atlas(64, 1024);
        a.put(&bitmap(100, 10)).unwrap();
        let (w, h) = a.size();
        assert_eq!(w, 128);
        assert_eq!(h, 64);
        assert_eq!(a.pending_upload(), &PendingUpload::Full);
    }

    #[test]
    fn test_pending_upload_tracks_regions() {
        let mut a = atlas(128, 1024);
        assert_eq!(a.take_pending_upload(), PendingUpload::Full);
        let r = a.put(&bitmap(8, 8)).unwrap();
        assert_eq!(a.pending_upload(), &PendingUpload::Regions(vec![r]));
        assert_eq!(a.take_pending_upload(), PendingUpload::Regions(vec![r]));
        assert!(!a.pending_upload().is_pending());
    }

    #[test]
    fn test_pixels_are_copied() {
        let mut a = atlas(64, 1024);
        let r = a.put(&bitmap(4, 4)).unwrap();
        assert_eq!(a.image().get_pixel(r.x0, r.y0), &image::Rgba([255, 0, 0, 255]));
        assert_eq!(a.image().get_pixel(r.x1, r.y0), &image::Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_oversized_bitmap_is_rejected() {
        let mut a = atlas(64, 256);
        let before = a.front().to_vec();
        let err = a.put(&bitmap(257, 4)).unwrap_err();
        assert_eq!(err.width, 257);
        assert_eq!(err.max_size, 256);
        assert_eq!(a.front(), before.as_slice());
        assert_eq!(a.size(), (64, 64));
    }

    #[test]
    fn test_empty_bitmap_is_noop() {
        let mut a = atlas(64, 256);
        let r = a.put(&RgbaImage::new(0, 10)).unwrap();
        assert!(r.is_empty());
        assert_eq!(a.front(), &[FrontPoint::new(0, 0)]);
    }

    #[test]
    fn test_prev_power_of_two() {
        assert_eq!(prev_power_of_two(1), 1);
        assert_eq!(prev_power_of_two(4096), 4096);
        assert_eq!(prev_power_of_two(5000), 4096);
    }
}
