use std::path::PathBuf;

use clap::Parser;
use vantage::{AppConfig, FormatTag};

/// Inspect a 3D model: rotate, move and recolor it, and fly the camera around.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Model file to open on startup. Files can also be dropped on the window.
    path: Option<PathBuf>,

    /// Format used to decode uploads. Never guessed from the file.
    #[arg(long, value_enum, default_value_t = FormatTag::Gltf)]
    format: FormatTag,

    /// Initial camera X; malformed values become 0.
    #[arg(long, default_value = "5", allow_hyphen_values = true)]
    camera_x: String,

    #[arg(long, default_value = "5", allow_hyphen_values = true)]
    camera_y: String,

    #[arg(long, default_value = "5", allow_hyphen_values = true)]
    camera_z: String,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    log::info!("Vantage: 1-5 select format, Q/A W/S E/D rotate, arrows and PgUp/PgDn move, C recolors");
    log::info!("   Drag to orbit, right-drag to pan, wheel to dolly, Shift+wheel for height");

    let mut config = AppConfig::new()
        .size(cli.width, cli.height)
        .format(cli.format)
        .camera(cli.camera_x, cli.camera_y, cli.camera_z);
    if let Some(path) = cli.path {
        config = config.asset(path);
    }

    if let Err(err) = vantage::run(config) {
        log::error!("event loop failed: {err}");
        std::process::exit(1);
    }
}
