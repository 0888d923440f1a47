//! Overlay geometry
//!
//! Placement of a visual asset on the canvas: an optional crop rectangle in
//! source pixels and a destination rectangle in canvas pixels. Overlays are
//! computed when a channel (re)selects an asset and are never mutated.

use crate::config::{OverlayBounds, Range};
use crate::geometry::Rect;
use rand::Rng;

/// Crop + placement for an image, placement only for video
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    /// Source sub-rectangle (None = whole frame)
    pub src: Option<Rect>,
    pub dst: Rect,
}

/// Random position for a `w x h` box inside the canvas minus `margin`
///
/// When the box does not fit, it is pinned to the margin.
pub fn place<R: Rng + ?Sized>(w: f64, h: f64, canvas: (f64, f64), margin: f64, rng: &mut R) -> Rect {
    let (cw, ch) = canvas;
    let mx = cw * margin;
    let my = ch * margin;
    let x = mx + rng.gen::<f64>() * (cw - 2.0 * mx - w).max(0.0);
    let y = my + rng.gen::<f64>() * (ch - 2.0 * my - h).max(0.0);
    Rect::new(x, y, w, h)
}

/// Scale `(w, h)` so its major side is a random fraction of the canvas'
/// major side
fn scaled<R: Rng + ?Sized>(w: f64, h: f64, canvas: (f64, f64), scale: &Range, rng: &mut R) -> (f64, f64) {
    let target = canvas.0.max(canvas.1) * scale.sample(rng);
    let factor = target / w.max(h);
    (w * factor, h * factor)
}

/// Random crop of an image, scaled and placed
///
/// None for images without a known size.
pub fn image_overlay<R: Rng + ?Sized>(
    natural: (u32, u32),
    canvas: (f64, f64),
    bounds: &OverlayBounds,
    rng: &mut R,
) -> Option<Overlay> {
    let (nw, nh) = (natural.0 as f64, natural.1 as f64);
    if nw <= 0.0 || nh <= 0.0 {
        return None;
    }

    let src_w = (nw * bounds.crop.sample(rng)).floor().max(1.0);
    let src_h = (nh * bounds.crop.sample(rng)).floor().max(1.0);
    let src_x = (rng.gen::<f64>() * (nw - src_w)).floor();
    let src_y = (rng.gen::<f64>() * (nh - src_h)).floor();

    let (w, h) = scaled(src_w, src_h, canvas, &bounds.scale, rng);
    Some(Overlay {
        src: Some(Rect::new(src_x, src_y, src_w, src_h)),
        dst: place(w, h, canvas, bounds.margin, rng),
    })
}

/// Whole-frame video overlay, scaled and placed
pub fn video_overlay<R: Rng + ?Sized>(
    intrinsic: (u32, u32),
    canvas: (f64, f64),
    bounds: &OverlayBounds,
    rng: &mut R,
) -> Option<Overlay> {
    let (vw, vh) = (intrinsic.0 as f64, intrinsic.1 as f64);
    if vw <= 0.0 || vh <= 0.0 {
        return None;
    }
    let (w, h) = scaled(vw, vh, canvas, &bounds.scale, rng);
    Some(Overlay {
        src: None,
        dst: place(w, h, canvas, bounds.margin, rng),
    })
}

/// Largest rectangle with the video's aspect ratio centered in the canvas
pub fn letterbox(intrinsic: (u32, u32), canvas: (f64, f64)) -> Option<Rect> {
    let (vw, vh) = (intrinsic.0 as f64, intrinsic.1 as f64);
    let (cw, ch) = canvas;
    if vw <= 0.0 || vh <= 0.0 || cw <= 0.0 || ch <= 0.0 {
        return None;
    }
    let video_aspect = vw / vh;
    let (w, h) = if cw / ch > video_aspect {
        (ch * video_aspect, ch)
    } else {
        (cw, cw / video_aspect)
    };
    Some(Rect::new((cw - w) / 2.0, (ch - h) / 2.0, w, h))
}
