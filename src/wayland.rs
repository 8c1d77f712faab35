// Wayland integration module
// Hosts the viewer in an xdg-shell window using smithay-client-toolkit

use crate::controller::ViewerController;
use crate::dnd::{self, URI_LIST_MIME};
use crate::geometry::{Size, Vec2};
use crate::image_loader::DecodeError;
use crate::renderer;
use crate::wgpu_renderer::WgpuRenderer;
use crate::window_state::{WindowState, MIN_HEIGHT, MIN_WIDTH};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    data_device_manager::{
        data_device::{DataDevice, DataDeviceHandler},
        data_offer::{DataOfferHandler, DragOffer},
        data_source::DataSourceHandler,
        DataDeviceManagerState, WritePipe,
    },
    delegate_compositor, delegate_data_device, delegate_keyboard, delegate_output,
    delegate_pointer, delegate_registry, delegate_seat, delegate_shm, delegate_xdg_shell,
    delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::cell::RefCell;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use wayland_client::{
    globals::registry_queue_init,
    protocol::{
        wl_data_device::WlDataDevice, wl_data_device_manager::DndAction,
        wl_data_source::WlDataSource, wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm,
        wl_surface,
    },
    Connection, Proxy, QueueHandle,
};

/// Mouse button constants
const BTN_LEFT: u32 = 272;

/// Maximum buffer size (64MB to avoid Wayland buffer issues)
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Compositors report roughly 10 surface pixels per wheel notch; the view
/// transform expects 120 units per notch
const WHEEL_UNITS_PER_PIXEL: f64 = 12.0;

const APP_TITLE: &str = "imeji";
const APP_ID: &str = "imeji";

/// Where the initial image comes from
#[derive(Debug)]
pub enum ImageSource {
    None,
    File(std::path::PathBuf),
    Bytes(Vec<u8>),
}

/// Main Wayland application state
struct WaylandApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,

    // Wayland display pointer (for GPU rendering)
    display_ptr: *mut std::ffi::c_void,

    window: Window,
    controller: ViewerController,
    // Latest filename-changed notification not yet shown in the title
    pending_filename: Rc<RefCell<Option<String>>>,
    should_exit: bool,

    // Surface and buffer management
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    width: u32,
    height: u32,
    configured: bool,

    // Geometry to persist (size is only tracked while not maximized)
    restored_size: (u32, u32),
    maximized: bool,

    // Input state
    pointer_pos: (f64, f64),
    modifiers: Modifiers,

    // Drag-and-drop (absent when the compositor has no data device manager)
    data_device_manager: Option<DataDeviceManagerState>,
    data_device: Option<DataDevice>,
    drop_accepted: bool,

    // GPU rendering
    use_gpu: bool,
    gpu_renderer: Option<WgpuRenderer>,
    gpu_initialized: bool,
    // The GPU texture no longer matches the controller's image
    texture_dirty: bool,
}

impl WaylandApp {
    /// The painted area, which is also what the view is laid out for
    fn viewport(&self) -> Size {
        Size::from(renderer::surface_size(self.width, self.height))
    }

    /// Retitle the window if the displayed file changed since the last call
    fn apply_filename_changes(&mut self) {
        let pending = self.pending_filename.borrow_mut().take();
        if let Some(name) = pending {
            self.window.set_title(window_title(&name));
            self.texture_dirty = true;
        }
    }

    fn report_load_error(&mut self, source: &str, err: &DecodeError) {
        error!("Error loading image {}: {}", source, err);
        self.window.set_title(error_title(source, err));
    }

    fn load_initial(&mut self, image: ImageSource) {
        match image {
            ImageSource::None => info!("No image given, starting empty"),
            ImageSource::File(path) => {
                if let Err(e) = self.controller.load_file(&path) {
                    let name = display_name(&path);
                    self.report_load_error(&name, &e);
                }
            }
            ImageSource::Bytes(data) => {
                if let Err(e) = self.controller.load_bytes(&data, None) {
                    self.report_load_error("<stdin>", &e);
                }
            }
        }
    }

    /// Load the first file of a dropped uri list
    fn load_dropped(&mut self, payload: &str) {
        let Some(path) = dnd::parse_uri_list(payload).into_iter().next() else {
            warn!("Drop carried no local files");
            return;
        };

        info!("Loading dropped file {}", path.display());
        if let Err(e) = self.controller.load_file(&path) {
            let name = display_name(&path);
            self.report_load_error(&name, &e);
        }
    }

    fn drag_offer(&self) -> Option<DragOffer> {
        self.data_device.as_ref()?.data().drag_offer()
    }

    fn close_image(&mut self) {
        info!("Closing current image");
        self.controller.close();
    }

    /// Initialize GPU renderer from Wayland surface
    fn init_gpu_renderer(&mut self) {
        if self.gpu_initialized {
            return;
        }
        self.gpu_initialized = true;

        // With wayland-backend's client_system feature, ObjectId.as_ptr() is
        // the underlying wl_proxy
        let surface_ptr = self.window.wl_surface().id().as_ptr() as *mut std::ffi::c_void;
        let display_ptr = self.display_ptr;

        if display_ptr.is_null() {
            warn!("Display pointer is null, falling back to CPU rendering");
            self.use_gpu = false;
            return;
        }

        info!("Initializing GPU renderer ({}x{})", self.width, self.height);

        match WgpuRenderer::new(display_ptr, surface_ptr, self.width, self.height) {
            Ok(renderer) => {
                self.gpu_renderer = Some(renderer);
                self.texture_dirty = true;
                info!("GPU renderer initialized successfully");
            }
            Err(e) => {
                warn!("Failed to initialize GPU renderer: {:?}", e);
                warn!("Falling back to CPU rendering");
                self.use_gpu = false;
            }
        }
    }

    /// Paint the current frame
    fn draw(&mut self, qh: &QueueHandle<Self>) {
        if !self.configured {
            return;
        }

        // Request the next frame callback before this frame's commit so the
        // snap-back animation keeps ticking
        if self.controller.is_ticking() {
            let surface = self.window.wl_surface();
            surface.frame(qh, surface.clone());
        }

        if self.use_gpu && self.gpu_renderer.is_some() {
            if self.draw_gpu() {
                return;
            }
            warn!("GPU rendering failed, falling back to CPU");
        }

        self.draw_cpu();
    }

    /// Draw using GPU (wgpu)
    fn draw_gpu(&mut self) -> bool {
        let Some(renderer) = self.gpu_renderer.as_mut() else {
            return false;
        };

        if self.texture_dirty {
            if let Err(e) = renderer.set_image(self.controller.image()) {
                warn!("Failed to upload texture to GPU: {:?}", e);
                self.use_gpu = false;
                return false;
            }
            self.texture_dirty = false;
        }

        renderer.resize(self.width, self.height);

        match renderer.render(self.controller.dest_rect()) {
            Ok(true) => {
                self.window.wl_surface().commit();
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("GPU render error: {:?}", e);
                false
            }
        }
    }

    /// Draw using CPU (shared memory buffer)
    fn draw_cpu(&mut self) {
        let (width, height) = renderer::surface_size(self.width, self.height);

        // 4 bytes per pixel for ARGB
        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;

        if buffer_size > MAX_BUFFER_SIZE {
            error!(
                "Buffer size too large: {} bytes, max: {} bytes",
                buffer_size, MAX_BUFFER_SIZE
            );
            return;
        }

        if self.pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}. Buffer size: {} bytes", e, buffer_size);
                    return;
                }
            }
        }

        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.pool = None;
                return;
            }
        }

        let (buffer, canvas) =
            match pool.create_buffer(width as i32, height as i32, stride, wl_shm::Format::Argb8888) {
                Ok(buf) => buf,
                Err(e) => {
                    error!("Failed to create buffer {}x{}: {}", width, height, e);
                    return;
                }
            };

        let dest = self.controller.dest_rect().unwrap_or_default();
        renderer::render_frame(canvas, width, height, self.controller.image(), dest);

        let surface = self.window.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach buffer: {}", e);
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
    }

    fn window_state(&self) -> WindowState {
        WindowState {
            width: self.restored_size.0,
            height: self.restored_size.1,
            maximized: self.maximized,
        }
    }
}

/// Convert a vertical axis value (surface pixels, positive = scroll down)
/// into a wheel delta (120 per notch, positive = zoom in)
fn wheel_delta(axis_absolute: f64) -> f32 {
    (-axis_absolute * WHEEL_UNITS_PER_PIXEL) as f32
}

fn window_title(filename: &str) -> String {
    if filename.is_empty() {
        APP_TITLE.to_string()
    } else {
        filename.to_string()
    }
}

fn error_title(source: &str, err: &DecodeError) -> String {
    format!("{} - error: {}", source, err)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        if self.controller.is_ticking() {
            self.controller.on_tick(Instant::now());
        }
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for WaylandApp {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        info!("Window close requested");
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure);

        // No suggested size means we pick: keep the current one
        let (new_width, new_height) = configure.new_size;
        self.width = new_width.map_or(self.width, |w| w.get());
        self.height = new_height.map_or(self.height, |h| h.get());
        self.maximized = configure.is_maximized();
        if !self.maximized {
            self.restored_size = (self.width, self.height);
        }

        self.configured = true;
        let viewport = self.viewport();
        self.controller.on_viewport_resized(viewport);

        if self.use_gpu && !self.gpu_initialized {
            self.init_gpu_renderer();
        }
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
            if self.data_device.is_none() {
                if let Some(manager) = &self.data_device_manager {
                    self.data_device = Some(manager.get_data_device(qh, &seat));
                }
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);

        if self.modifiers.ctrl && event.keysym == Keysym::w {
            self.close_image();
        } else if event.keysym == Keysym::Escape || event.keysym == Keysym::q {
            info!("Exit key pressed");
            self.should_exit = true;
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        modifiers: Modifiers,
        _layout: u32,
    ) {
        self.modifiers = modifiers;
    }
}

impl PointerHandler for WaylandApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            match event.kind {
                PointerEventKind::Enter { .. } => {
                    debug!("Pointer entered");
                    self.pointer_pos = event.position;
                }
                PointerEventKind::Leave { .. } => {
                    debug!("Pointer left");
                    self.controller.on_mouse_up();
                }
                PointerEventKind::Motion { .. } => {
                    self.pointer_pos = event.position;
                    self.controller.on_mouse_move(Vec2::from(event.position));
                }
                PointerEventKind::Press { button, .. } => {
                    debug!("Pointer button pressed: {}", button);
                    if button == BTN_LEFT {
                        self.controller.on_mouse_down(Vec2::from(self.pointer_pos));
                    }
                }
                PointerEventKind::Release { button, .. } => {
                    if button == BTN_LEFT {
                        self.controller.on_mouse_up();
                    }
                }
                PointerEventKind::Axis { vertical, .. } => {
                    if vertical.absolute != 0.0 {
                        // Anchor at the last known pointer position
                        let viewport = self.viewport();
                        self.controller.on_wheel(
                            wheel_delta(vertical.absolute),
                            Vec2::from(self.pointer_pos),
                            viewport,
                            Instant::now(),
                        );
                    }
                }
            }
        }
    }
}

impl DataDeviceHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _data_device: &WlDataDevice,
        _x: f64,
        _y: f64,
        _surface: &wl_surface::WlSurface,
    ) {
        let Some(offer) = self.drag_offer() else {
            return;
        };

        self.drop_accepted =
            offer.with_mime_types(|types| types.iter().any(|t| t == URI_LIST_MIME));
        debug!("Drag entered, uri list offered: {}", self.drop_accepted);

        if self.drop_accepted {
            offer.accept_mime_type(offer.serial, Some(URI_LIST_MIME.to_string()));
            offer.set_actions(DndAction::Copy, DndAction::Copy);
        } else {
            offer.accept_mime_type(offer.serial, None);
        }
    }

    fn leave(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _data_device: &WlDataDevice) {
        self.drop_accepted = false;
    }

    fn motion(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _data_device: &WlDataDevice,
        _x: f64,
        _y: f64,
    ) {
    }

    fn selection(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _data_device: &WlDataDevice,
    ) {
    }

    fn drop_performed(
        &mut self,
        conn: &Connection,
        _qh: &QueueHandle<Self>,
        _data_device: &WlDataDevice,
    ) {
        let Some(offer) = self.drag_offer() else {
            return;
        };

        if std::mem::take(&mut self.drop_accepted) {
            match receive_uri_list(conn, &offer) {
                Ok(payload) => self.load_dropped(&payload),
                Err(e) => warn!("Failed to read dropped data: {:?}", e),
            }
            offer.finish();
        }
        offer.destroy();
    }
}

/// Read the dropped uri list. The request must reach the compositor before
/// the pipe can be read, hence the flush.
fn receive_uri_list(conn: &Connection, offer: &DragOffer) -> Result<String> {
    let mut pipe = offer
        .receive(URI_LIST_MIME.to_string())
        .context("Failed to open drop pipe")?;
    conn.flush().context("Failed to flush connection")?;

    let mut payload = String::new();
    pipe.read_to_string(&mut payload)
        .context("Failed to read drop pipe")?;
    Ok(payload)
}

impl DataOfferHandler for WaylandApp {
    fn source_actions(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _offer: &mut DragOffer,
        actions: DndAction,
    ) {
        debug!("Drag source actions: {:?}", actions);
    }

    fn selected_action(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _offer: &mut DragOffer,
        actions: DndAction,
    ) {
        debug!("Drag action selected: {:?}", actions);
    }
}

// The viewer never offers data, so its sources see no events
impl DataSourceHandler for WaylandApp {
    fn accept_mime(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _source: &WlDataSource,
        _mime: Option<String>,
    ) {
    }

    fn send_request(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _source: &WlDataSource,
        _mime: String,
        _fd: WritePipe,
    ) {
    }

    fn cancelled(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _source: &WlDataSource) {}

    fn dnd_dropped(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _source: &WlDataSource) {}

    fn dnd_finished(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _source: &WlDataSource,
    ) {
    }

    fn action(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _source: &WlDataSource,
        _action: DndAction,
    ) {
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_xdg_shell!(WaylandApp);
delegate_xdg_window!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_pointer!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_data_device!(WaylandApp);
delegate_registry!(WaylandApp);

/// Run the viewer until the window is closed. Returns the window state to
/// persist.
pub fn run(image: ImageSource, initial: WindowState, use_gpu: bool) -> Result<WindowState> {
    info!("Connecting to Wayland display");

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    // Get the display pointer for GPU rendering
    let display_ptr = conn.backend().display_ptr() as *mut std::ffi::c_void;

    let initial = initial.sanitized();
    let surface = compositor_state.create_surface(&qh);
    let window = xdg_shell.create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_title(APP_TITLE);
    window.set_app_id(APP_ID);
    window.set_min_size(Some((MIN_WIDTH, MIN_HEIGHT)));
    if initial.maximized {
        window.set_maximized();
    }
    window.commit();

    let data_device_manager = match DataDeviceManagerState::bind(&globals, &qh) {
        Ok(manager) => Some(manager),
        Err(e) => {
            warn!("No data device manager, drag-and-drop disabled: {}", e);
            None
        }
    };

    let pending_filename = Rc::new(RefCell::new(None));
    let mut controller = ViewerController::new();
    let listener_slot = Rc::clone(&pending_filename);
    controller.on_filename_changed(move |name| {
        *listener_slot.borrow_mut() = Some(name.to_owned());
    });

    let mut app = WaylandApp {
        registry_state: RegistryState::new(&globals),
        seat_state: SeatState::new(&globals, &qh),
        output_state: OutputState::new(&globals, &qh),
        shm,
        display_ptr,
        window,
        controller,
        pending_filename,
        should_exit: false,
        pool: None,
        buffer: None,
        width: initial.width,
        height: initial.height,
        configured: false,
        restored_size: (initial.width, initial.height),
        maximized: initial.maximized,
        pointer_pos: (0.0, 0.0),
        modifiers: Modifiers::default(),
        data_device_manager,
        data_device: None,
        drop_accepted: false,
        use_gpu,
        gpu_renderer: None,
        gpu_initialized: false,
        texture_dirty: true,
    };

    app.load_initial(image);

    info!("Starting event loop");
    info!("Controls: scroll to zoom, drag to pan, drop a file to open it, Ctrl+W to close the image, Esc/Q to quit");

    loop {
        event_queue.blocking_dispatch(&mut app)?;
        app.apply_filename_changes();

        if app.should_exit {
            info!("Exiting application");
            break;
        }

        if app.controller.take_redraw_request() {
            app.draw(&qh);
        }
    }

    Ok(app.window_state())
}
