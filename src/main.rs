// imeji - A minimal single-image viewer for Wayland
// Shows one image with wheel zoom, drag panning and an animated snap-back

mod cli;
mod controller;
mod dnd;
mod geometry;
mod image_loader;
mod renderer;
mod view_transform;
mod wayland;
mod wgpu_renderer;
mod window_state;

use anyhow::Result;
use log::{info, warn};
use wayland::ImageSource;
use window_state::WindowState;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args()?;

    info!("Starting imeji with image: {:?}", args.image_path);

    let config_dir = match window_state::config_dir(args.config_dir.as_deref()) {
        Ok(dir) => Some(dir),
        Err(e) => {
            warn!("Window state will not be persisted: {}", e);
            None
        }
    };

    let initial = match config_dir.as_deref().map(WindowState::load_from) {
        Some(Ok(state)) => state,
        Some(Err(e)) => {
            warn!("Ignoring saved window state: {}", e);
            WindowState::default()
        }
        None => WindowState::default(),
    };

    let image = match (args.image_data, args.image_path) {
        (Some(data), _) => ImageSource::Bytes(data),
        (None, Some(path)) => ImageSource::File(path),
        (None, None) => ImageSource::None,
    };

    info!("GPU rendering: {}", args.use_gpu);
    let final_state = wayland::run(image, initial, args.use_gpu)?;

    if let Some(dir) = config_dir {
        if let Err(e) = final_state.save_to(&dir) {
            warn!("Failed to save window state: {}", e);
        }
    }

    Ok(())
}
