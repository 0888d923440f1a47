//! Canvas sizing policy

use crate::config::ViewportConfig;

/// Canvas aspect ratio as width:height
pub const ASPECT: (f64, f64) = (16.0, 9.0);

/// Largest 16:9 rectangle within `fraction` of the viewport, in whole pixels
pub fn fit_aspect(viewport_w: f64, viewport_h: f64, fraction: f64) -> (f64, f64) {
    let max_w = (viewport_w * fraction).max(0.0);
    let max_h = (viewport_h * fraction).max(0.0);
    let (aw, ah) = ASPECT;
    let (w, h) = if max_w * ah / aw <= max_h {
        (max_w, max_w * ah / aw)
    } else {
        (max_h * aw / ah, max_h)
    };
    (w.floor(), h.floor())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasPolicy {
    /// 16:9 at a fraction of the viewport
    Windowed(f64),
    /// The whole viewport, any aspect
    Fullscreen,
}

impl CanvasPolicy {
    /// Canvas size for a viewport; recomputed on every resize
    pub fn canvas_size(&self, viewport_w: f64, viewport_h: f64) -> (f64, f64) {
        match *self {
            CanvasPolicy::Windowed(fraction) => fit_aspect(viewport_w, viewport_h, fraction),
            CanvasPolicy::Fullscreen => (viewport_w.floor(), viewport_h.floor()),
        }
    }
}

impl From<&ViewportConfig> for CanvasPolicy {
    fn from(config: &ViewportConfig) -> Self {
        if config.fullscreen {
            CanvasPolicy::Fullscreen
        } else {
            CanvasPolicy::Windowed(config.fraction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_viewport_is_height_bound() {
        assert_eq!(fit_aspect(2560.0, 1080.0, 1.0), (1920.0, 1080.0));
    }

    #[test]
    fn test_tall_viewport_is_width_bound() {
        let (w, h) = fit_aspect(1000.0, 1600.0, 0.5);
        assert_eq!(w, 500.0);
        assert_eq!(h, 281.0);
    }

    #[test]
    fn test_policy_from_config() {
        let windowed = CanvasPolicy::from(&ViewportConfig::default());
        assert_eq!(windowed, CanvasPolicy::Windowed(0.85));
        let full = CanvasPolicy::from(&ViewportConfig {
            fullscreen: true,
            ..ViewportConfig::default()
        });
        assert_eq!(full.canvas_size(1366.5, 768.0), (1366.0, 768.0));
    }
}
