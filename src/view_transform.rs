// View transform module
// Zoom, pan and snap-back animation state for the displayed image

use crate::geometry::{Rect, Size, Vec2};
use log::debug;
use std::time::{Duration, Instant};

/// Zoom limits relative to the fit-to-window scale
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 10.0;

/// Wheel delta units per 10% zoom step (one notch reports 120)
const WHEEL_DELTA_DIVISOR: f32 = 1200.0;

/// Length of the snap-back animation
pub const SNAP_BACK_DURATION: Duration = Duration::from_millis(300);

/// Interaction mode. Drag and animation state only exist in their variant,
/// so the two can never be active at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Idle,
    Dragging {
        last_mouse_pos: Vec2,
    },
    Animating {
        start_offset: Vec2,
        start_time: Instant,
    },
}

/// Placement of the image inside the viewport
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransform {
    zoom: f32,
    pan_offset: Vec2,
    mode: Mode,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: MIN_ZOOM,
            pan_offset: Vec2::ZERO,
            mode: Mode::Idle,
        }
    }
}

impl ViewTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Offset of the image center from the viewport center
    pub fn pan_offset(&self) -> Vec2 {
        self.pan_offset
    }

    #[allow(dead_code)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.mode, Mode::Animating { .. })
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.mode, Mode::Dragging { .. })
    }

    /// Compute where the image lands for the given viewport.
    ///
    /// The image is fitted to the viewport without ever upscaling past its
    /// native size, magnified by the zoom, centered, then shifted by the pan
    /// offset.
    pub fn compute_dest_rect(&self, viewport: Size, image: Size) -> Rect {
        let base_scale = (viewport.width / image.width)
            .min(viewport.height / image.height)
            .min(1.0);

        let width = image.width * base_scale * self.zoom;
        let height = image.height * base_scale * self.zoom;

        let center = viewport.center();
        Rect::new(
            center.x - width / 2.0 + self.pan_offset.x,
            center.y - height / 2.0 + self.pan_offset.y,
            width,
            height,
        )
    }

    /// Apply a wheel delta (120 per notch, positive zooms in).
    ///
    /// `cursor_offset` is the cursor position relative to the viewport center;
    /// the point under it stays put while zooming in. Reaching the minimum zoom
    /// from above starts the snap-back animation at `now` instead of resetting
    /// the pan directly.
    pub fn apply_zoom_delta(&mut self, wheel_delta: f32, cursor_offset: Vec2, now: Instant) {
        if wheel_delta.is_nan() {
            return;
        }

        let factor = 1.0 + wheel_delta / WHEEL_DELTA_DIVISOR;
        let old_zoom = self.zoom;
        let new_zoom = (old_zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);

        if new_zoom == MIN_ZOOM && old_zoom > MIN_ZOOM {
            debug!("Zoom reached 1x, snapping back from {:?}", self.pan_offset);
            self.mode = Mode::Animating {
                start_offset: self.pan_offset,
                start_time: now,
            };
        } else if new_zoom > MIN_ZOOM {
            if self.is_animating() {
                self.mode = Mode::Idle;
            }
            let zoom_change = new_zoom / old_zoom - 1.0;
            self.pan_offset -= cursor_offset * zoom_change;
        }

        self.zoom = new_zoom;
    }

    /// Start panning. Ignored at minimum zoom, where there is nothing to pan.
    pub fn begin_drag(&mut self, mouse_pos: Vec2) {
        if self.zoom > MIN_ZOOM {
            self.mode = Mode::Dragging {
                last_mouse_pos: mouse_pos,
            };
        }
    }

    pub fn drag_to(&mut self, mouse_pos: Vec2) {
        if let Mode::Dragging { last_mouse_pos } = &mut self.mode {
            self.pan_offset += mouse_pos - *last_mouse_pos;
            *last_mouse_pos = mouse_pos;
        }
    }

    pub fn end_drag(&mut self) {
        if self.is_dragging() {
            self.mode = Mode::Idle;
        }
    }

    /// Advance the snap-back animation to `now`.
    ///
    /// Returns whether the animation is still running. The position depends
    /// only on elapsed time, so irregular tick intervals are fine.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Mode::Animating {
            start_offset,
            start_time,
        } = self.mode
        else {
            return false;
        };

        let elapsed = now.saturating_duration_since(start_time);
        if elapsed >= SNAP_BACK_DURATION {
            self.pan_offset = Vec2::ZERO;
            self.mode = Mode::Idle;
            return false;
        }

        let t = elapsed.as_secs_f32() / SNAP_BACK_DURATION.as_secs_f32();
        self.pan_offset = start_offset.lerp(Vec2::ZERO, ease_out_cubic(t));
        true
    }

    /// Keep a fully zoomed-out view centered (used after viewport resizes)
    pub fn center_at_rest(&mut self) {
        if self.zoom == MIN_ZOOM {
            self.pan_offset = Vec2::ZERO;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Ease-out cubic: fast start, gentle landing
pub fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    fn approx_vec(a: Vec2, b: Vec2) -> bool {
        approx(a.x, b.x) && approx(a.y, b.y)
    }

    /// Transform zoomed to 2x with a known pan offset
    fn zoomed(pan: Vec2) -> ViewTransform {
        ViewTransform {
            zoom: 2.0,
            pan_offset: pan,
            mode: Mode::Idle,
        }
    }

    #[test]
    fn default_is_at_rest() {
        let t = ViewTransform::new();
        assert_eq!(t.zoom(), 1.0);
        assert_eq!(t.pan_offset(), Vec2::ZERO);
        assert_eq!(t.mode(), Mode::Idle);
    }

    #[test]
    fn dest_rect_fills_viewport_when_aspect_matches() {
        let t = ViewTransform::new();
        let rect = t.compute_dest_rect(Size::new(800.0, 600.0), Size::new(1600.0, 1200.0));
        assert_eq!(rect, Rect::new(0.0, 0.0, 800.0, 600.0));
    }

    #[test]
    fn dest_rect_never_upscales_small_images() {
        let t = ViewTransform::new();
        let rect = t.compute_dest_rect(Size::new(800.0, 600.0), Size::new(200.0, 100.0));
        assert_eq!(rect, Rect::new(300.0, 250.0, 200.0, 100.0));
    }

    #[test]
    fn dest_rect_applies_zoom_and_pan() {
        let t = zoomed(Vec2::new(10.0, -20.0));
        let rect = t.compute_dest_rect(Size::new(800.0, 600.0), Size::new(1600.0, 1200.0));
        assert_eq!(rect, Rect::new(-400.0 + 10.0, -300.0 - 20.0, 1600.0, 1200.0));
    }

    #[test]
    fn wheel_notch_from_center_zooms_without_panning() {
        let mut t = ViewTransform::new();
        t.apply_zoom_delta(120.0, Vec2::ZERO, Instant::now());
        assert!(approx(t.zoom(), 1.1));
        assert_eq!(t.pan_offset(), Vec2::ZERO);
        assert_eq!(t.mode(), Mode::Idle);
    }

    #[test]
    fn zoom_stays_within_bounds_for_any_delta() {
        let deltas = [
            f32::NEG_INFINITY,
            -1.0e9,
            -2400.0,
            -1200.0,
            -120.0,
            0.0,
            120.0,
            1200.0,
            1.0e9,
            f32::INFINITY,
        ];
        for start in [1.0, 1.5, 5.0, 10.0] {
            for delta in deltas {
                let mut t = ViewTransform::new();
                t.zoom = start;
                t.apply_zoom_delta(delta, Vec2::new(30.0, -40.0), Instant::now());
                assert!(
                    (MIN_ZOOM..=MAX_ZOOM).contains(&t.zoom()),
                    "zoom {} out of range after delta {} from {}",
                    t.zoom(),
                    delta,
                    start
                );
            }
        }
    }

    #[test]
    fn nan_delta_is_ignored() {
        let mut t = zoomed(Vec2::new(5.0, 5.0));
        t.apply_zoom_delta(f32::NAN, Vec2::new(1.0, 1.0), Instant::now());
        assert_eq!(t, zoomed(Vec2::new(5.0, 5.0)));
    }

    #[test]
    fn zoom_in_keeps_point_under_cursor() {
        let mut t = ViewTransform::new();
        let cursor = Vec2::new(100.0, -50.0);
        t.apply_zoom_delta(1200.0, cursor, Instant::now());
        assert!(approx(t.zoom(), 2.0));
        // Image point under the cursor moved from `cursor` to `cursor * 2`,
        // the pan compensates exactly.
        assert!(approx_vec(t.pan_offset(), Vec2::new(-100.0, 50.0)));
    }

    #[test]
    fn inverse_zoom_from_center_restores_pan() {
        let mut t = zoomed(Vec2::new(37.0, -12.5));
        let now = Instant::now();
        t.apply_zoom_delta(600.0, Vec2::ZERO, now);
        assert!(approx(t.zoom(), 3.0));
        // factor 2/3 undoes factor 1.5
        t.apply_zoom_delta(-400.0, Vec2::ZERO, now);
        assert!(approx(t.zoom(), 2.0));
        assert!(approx_vec(t.pan_offset(), Vec2::new(37.0, -12.5)));
    }

    #[test]
    fn reaching_min_zoom_starts_snap_back() {
        let start = Vec2::new(80.0, -60.0);
        let mut t = zoomed(start);
        let now = Instant::now();
        t.apply_zoom_delta(-1200.0, Vec2::new(500.0, 500.0), now);

        assert_eq!(t.zoom(), 1.0);
        assert_eq!(t.pan_offset(), start, "pan decays through the animation");
        assert_eq!(
            t.mode(),
            Mode::Animating {
                start_offset: start,
                start_time: now
            }
        );
    }

    #[test]
    fn wheel_out_at_min_zoom_does_not_animate() {
        let mut t = ViewTransform::new();
        t.apply_zoom_delta(-120.0, Vec2::new(10.0, 10.0), Instant::now());
        assert_eq!(t.zoom(), 1.0);
        assert_eq!(t.mode(), Mode::Idle);
    }

    #[test]
    fn snap_back_is_half_eased_at_half_duration() {
        let start = Vec2::new(200.0, -100.0);
        let mut t = zoomed(start);
        let t0 = Instant::now();
        t.apply_zoom_delta(-1200.0, Vec2::ZERO, t0);

        assert!(t.tick(t0 + SNAP_BACK_DURATION / 2));
        // eased progress is 1 - 0.5^3 = 0.875 of the way to center
        assert!(approx_vec(t.pan_offset(), start * 0.125));
    }

    #[test]
    fn snap_back_converges_monotonically() {
        let start = Vec2::new(-300.0, 140.0);
        let mut t = zoomed(start);
        let t0 = Instant::now();
        t.apply_zoom_delta(-1200.0, Vec2::ZERO, t0);

        let mut last = t.pan_offset().length();
        for ms in (0..=330).step_by(7) {
            t.tick(t0 + Duration::from_millis(ms));
            let len = t.pan_offset().length();
            assert!(len <= last + EPS, "magnitude grew at {ms}ms: {last} -> {len}");
            last = len;
        }
        assert_eq!(t.pan_offset(), Vec2::ZERO);
        assert_eq!(t.mode(), Mode::Idle);
    }

    #[test]
    fn tick_after_duration_finishes_regardless_of_offset() {
        for start in [Vec2::new(1.0e6, -1.0e6), Vec2::new(-3.0, 0.5), Vec2::ZERO] {
            let mut t = zoomed(start);
            let t0 = Instant::now();
            t.apply_zoom_delta(-1200.0, Vec2::ZERO, t0);
            assert!(!t.tick(t0 + Duration::from_secs(5)));
            assert_eq!(t.pan_offset(), Vec2::ZERO);
            assert_eq!(t.mode(), Mode::Idle);
        }
    }

    #[test]
    fn tick_is_noop_unless_animating() {
        let mut t = zoomed(Vec2::new(4.0, 4.0));
        assert!(!t.tick(Instant::now()));
        assert_eq!(t.pan_offset(), Vec2::new(4.0, 4.0));
    }

    #[test]
    fn zooming_in_cancels_snap_back() {
        let mut t = zoomed(Vec2::new(50.0, 50.0));
        let t0 = Instant::now();
        t.apply_zoom_delta(-1200.0, Vec2::ZERO, t0);
        t.tick(t0 + Duration::from_millis(100));
        let mid = t.pan_offset();

        t.apply_zoom_delta(120.0, Vec2::ZERO, t0 + Duration::from_millis(110));
        assert_eq!(t.mode(), Mode::Idle);
        assert!(approx(t.zoom(), 1.1));
        assert_eq!(t.pan_offset(), mid);
        assert!(!t.tick(t0 + Duration::from_millis(400)));
        assert_eq!(t.pan_offset(), mid);
    }

    #[test]
    fn begin_drag_is_noop_at_min_zoom() {
        let mut t = ViewTransform::new();
        t.begin_drag(Vec2::new(10.0, 10.0));
        assert_eq!(t.mode(), Mode::Idle);
        t.drag_to(Vec2::new(50.0, 50.0));
        assert_eq!(t.pan_offset(), Vec2::ZERO);
    }

    #[test]
    fn drag_accumulates_mouse_movement() {
        let mut t = zoomed(Vec2::ZERO);
        t.begin_drag(Vec2::new(10.0, 10.0));
        assert!(t.is_dragging());
        t.drag_to(Vec2::new(15.0, 7.0));
        t.drag_to(Vec2::new(25.0, 0.0));
        assert_eq!(t.pan_offset(), Vec2::new(15.0, -10.0));

        t.end_drag();
        assert_eq!(t.mode(), Mode::Idle);
        t.drag_to(Vec2::new(100.0, 100.0));
        assert_eq!(t.pan_offset(), Vec2::new(15.0, -10.0));
    }

    #[test]
    fn zooming_in_while_dragging_keeps_the_drag() {
        let mut t = zoomed(Vec2::ZERO);
        t.begin_drag(Vec2::new(0.0, 0.0));
        t.apply_zoom_delta(120.0, Vec2::ZERO, Instant::now());
        assert!(t.is_dragging());
    }

    #[test]
    fn end_drag_leaves_animation_alone() {
        let mut t = zoomed(Vec2::new(9.0, 9.0));
        t.apply_zoom_delta(-1200.0, Vec2::ZERO, Instant::now());
        t.end_drag();
        assert!(t.is_animating());
    }

    #[test]
    fn center_at_rest_only_applies_at_min_zoom() {
        let mut t = zoomed(Vec2::new(9.0, 9.0));
        t.center_at_rest();
        assert_eq!(t.pan_offset(), Vec2::new(9.0, 9.0));

        t.zoom = 1.0;
        t.center_at_rest();
        assert_eq!(t.pan_offset(), Vec2::ZERO);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut t = zoomed(Vec2::new(9.0, 9.0));
        t.begin_drag(Vec2::ZERO);
        t.reset();
        assert_eq!(t, ViewTransform::default());
    }

    #[test]
    fn ease_out_cubic_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(approx(ease_out_cubic(0.5), 0.875));
    }
}
