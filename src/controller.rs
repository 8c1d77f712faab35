// Viewer controller module
// Routes input events and frame ticks into the view transform and tracks
// what the host needs to do next (redraw, keep ticking, retitle)

use crate::geometry::{Rect, Size, Vec2};
use crate::image_loader::{self, DecodeError, ImageData};
use crate::view_transform::ViewTransform;
use log::{debug, info};
use std::path::Path;
use std::time::Instant;

type FilenameListener = Box<dyn FnMut(&str)>;

/// Owns the current image and its view transform
pub struct ViewerController {
    transform: ViewTransform,
    image: Option<ImageData>,
    filename: String,
    viewport: Size,
    // Whether the host should keep delivering frame ticks
    ticking: bool,
    redraw_requested: bool,
    filename_listeners: Vec<FilenameListener>,
}

impl Default for ViewerController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerController {
    pub fn new() -> Self {
        Self {
            transform: ViewTransform::new(),
            image: None,
            filename: String::new(),
            viewport: Size::default(),
            ticking: false,
            redraw_requested: false,
            filename_listeners: Vec::new(),
        }
    }

    /// Register a callback run whenever the displayed file changes.
    /// An empty name means no image is loaded.
    pub fn on_filename_changed(&mut self, listener: impl FnMut(&str) + 'static) {
        self.filename_listeners.push(Box::new(listener));
    }

    /// Replace the current image. Any zoom, pan, drag or animation is dropped.
    pub fn load(&mut self, image: ImageData, filename: impl Into<String>) {
        let filename = filename.into();
        info!(
            "Showing {} ({}x{})",
            if filename.is_empty() { "<unnamed>" } else { filename.as_str() },
            image.width,
            image.height
        );

        self.transform.reset();
        self.ticking = false;
        self.image = Some(image);
        self.filename = filename;
        self.notify_filename();
        self.request_redraw();
    }

    /// Decode and show a file. On failure nothing changes.
    pub fn load_file(&mut self, path: &Path) -> Result<(), DecodeError> {
        let image = image_loader::decode_file(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.load(image, filename);
        Ok(())
    }

    /// Decode and show in-memory image bytes. On failure nothing changes.
    pub fn load_bytes(&mut self, bytes: &[u8], filename: Option<&str>) -> Result<(), DecodeError> {
        let image = image_loader::decode_bytes(bytes)?;
        self.load(image, filename.unwrap_or_default());
        Ok(())
    }

    pub fn close(&mut self) {
        if self.image.take().is_some() {
            info!("Closed {}", self.filename);
        }
        self.transform.reset();
        self.ticking = false;
        self.filename.clear();
        self.notify_filename();
        self.request_redraw();
    }

    pub fn on_wheel(&mut self, delta: f32, cursor_pos: Vec2, viewport: Size, now: Instant) {
        if self.image.is_none() {
            return;
        }

        let cursor_offset = cursor_pos - viewport.center();
        self.transform.apply_zoom_delta(delta, cursor_offset, now);
        self.ticking = self.transform.is_animating();
        debug!(
            "Wheel {} -> zoom {:.3}, pan {:?}",
            delta,
            self.transform.zoom(),
            self.transform.pan_offset()
        );
        self.request_redraw();
    }

    pub fn on_mouse_down(&mut self, pos: Vec2) {
        if self.image.is_some() {
            self.transform.begin_drag(pos);
        }
    }

    pub fn on_mouse_move(&mut self, pos: Vec2) {
        if self.transform.is_dragging() {
            self.transform.drag_to(pos);
            self.request_redraw();
        }
    }

    pub fn on_mouse_up(&mut self) {
        self.transform.end_drag();
    }

    pub fn on_tick(&mut self, now: Instant) {
        if !self.transform.tick(now) {
            self.ticking = false;
        }
        self.request_redraw();
    }

    pub fn on_viewport_resized(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.transform.center_at_rest();
        self.request_redraw();
    }

    /// Consume the pending redraw request, if any
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn image(&self) -> Option<&ImageData> {
        self.image.as_ref()
    }

    #[allow(dead_code)]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[allow(dead_code)]
    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    #[allow(dead_code)]
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Where the current image should be painted, if there is one
    pub fn dest_rect(&self) -> Option<Rect> {
        self.image
            .as_ref()
            .map(|image| self.transform.compute_dest_rect(self.viewport, image.size()))
    }

    fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    fn notify_filename(&mut self) {
        for listener in &mut self.filename_listeners {
            listener(&self.filename);
        }
    }
}
