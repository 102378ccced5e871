use plate_core::BlockRange;
use serde::{Deserialize, Serialize};

/// A screen-space rectangle, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Host layout used to anchor popups next to document text.
pub trait RangeGeometry {
    /// Screen rectangle covering `range`, or `None` when the range is not laid
    /// out (detached, scrolled away, not rendered yet).
    fn screen_rect(&self, range: &BlockRange) -> Option<Bounds>;

    fn viewport(&self) -> Bounds;
}

/// Fixed-pitch layout: every top-level block is one line, every byte one
/// column. Good enough for terminals, tests and the demo.
#[derive(Debug, Clone, PartialEq)]
pub struct MonospaceGeometry {
    pub char_width: f32,
    pub line_height: f32,
    pub viewport: Bounds,
}

impl Default for MonospaceGeometry {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            viewport: Bounds::new(0.0, 0.0, 800.0, 600.0),
        }
    }
}

impl RangeGeometry for MonospaceGeometry {
    fn screen_rect(&self, range: &BlockRange) -> Option<Bounds> {
        let line = *range.block.first()?;
        let columns = range.range.end.saturating_sub(range.range.start).max(1);
        Some(Bounds::new(
            self.viewport.x + range.range.start as f32 * self.char_width,
            self.viewport.y + line as f32 * self.line_height,
            columns as f32 * self.char_width,
            self.line_height,
        ))
    }

    fn viewport(&self) -> Bounds {
        self.viewport
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Below,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub bounds: Bounds,
    pub side: Side,
}

/// Place a `width` x `height` popup start-aligned with `anchor`.
///
/// The popup goes on the `prefer` side unless it would overflow the viewport
/// there and fits on the other side. Horizontally it is clamped so it stays
/// inside the viewport when possible.
pub fn place_popup(
    anchor: Bounds,
    width: f32,
    height: f32,
    viewport: Bounds,
    gap: f32,
    prefer: Side,
) -> Placement {
    let below_y = anchor.bottom() + gap;
    let above_y = anchor.y - gap - height;
    let fits_below = below_y + height <= viewport.bottom();
    let fits_above = above_y >= viewport.y;

    let side = match prefer {
        Side::Below if !fits_below && fits_above => Side::Above,
        Side::Above if !fits_above && fits_below => Side::Below,
        side => side,
    };
    let y = match side {
        Side::Below => below_y,
        Side::Above => above_y,
    };

    let max_x = (viewport.right() - width).max(viewport.x);
    let x = anchor.x.clamp(viewport.x, max_x);

    Placement {
        bounds: Bounds::new(x, y, width, height),
        side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Bounds = Bounds {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 300.0,
    };

    #[test]
    fn prefers_below_when_it_fits() {
        let anchor = Bounds::new(40.0, 20.0, 16.0, 20.0);
        let placement = place_popup(anchor, 200.0, 100.0, VIEWPORT, 8.0, Side::Below);
        assert_eq!(placement.side, Side::Below);
        assert_eq!(placement.bounds, Bounds::new(40.0, 48.0, 200.0, 100.0));
    }

    #[test]
    fn flips_above_near_the_bottom() {
        let anchor = Bounds::new(40.0, 260.0, 16.0, 20.0);
        let placement = place_popup(anchor, 200.0, 100.0, VIEWPORT, 8.0, Side::Below);
        assert_eq!(placement.side, Side::Above);
        assert_eq!(placement.bounds.y, 152.0);
    }

    #[test]
    fn stays_below_when_neither_side_fits() {
        let anchor = Bounds::new(0.0, 100.0, 16.0, 20.0);
        let placement = place_popup(anchor, 200.0, 280.0, VIEWPORT, 8.0, Side::Below);
        assert_eq!(placement.side, Side::Below);
    }

    #[test]
    fn clamps_to_the_right_edge() {
        let anchor = Bounds::new(380.0, 20.0, 16.0, 20.0);
        let placement = place_popup(anchor, 200.0, 100.0, VIEWPORT, 8.0, Side::Below);
        assert_eq!(placement.bounds.x, 200.0);
    }

    #[test]
    fn monospace_rect_follows_block_and_columns() {
        let geometry = MonospaceGeometry::default();
        let rect = geometry
            .screen_rect(&BlockRange::new(vec![2], 3..5))
            .unwrap();
        assert_eq!(rect, Bounds::new(24.0, 40.0, 16.0, 20.0));
        assert!(geometry.screen_rect(&BlockRange::new(vec![], 0..1)).is_none());
    }
}
