#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use eframe::egui;

use notecrab::annotation::Units;
use notecrab::app::NoteCrabApp;
use notecrab::config::Settings;
use notecrab::module::{ImageModule, discover_images, read_annotations};

#[derive(Parser)]
#[command(name = "notecrab")]
#[command(about = "Draw rectangle and polygon notes on images")]
#[command(version)]
struct Cli {
    /// Image files, or directories to scan for images
    paths: Vec<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Selector to start with (rect, polygon)
    #[arg(short, long)]
    selector: Option<String>,

    /// Units for newly drawn shapes
    #[arg(short, long, value_enum)]
    units: Option<UnitsArg>,

    /// JSON file of annotations to show on startup
    #[arg(short, long)]
    annotations: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitsArg {
    Pixel,
    Fraction,
}

impl From<UnitsArg> for Units {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::Pixel => Units::Pixel,
            UnitsArg::Fraction => Units::Fraction,
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::prelude::*;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,notecrab=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    setup_logging();
    let cli = Cli::parse();

    let mut settings = Settings::load_or_default(cli.config.as_deref());
    if let Some(units) = cli.units {
        settings.units = units.into();
    }

    let mut paths = Vec::new();
    for path in &cli.paths {
        paths.extend(discover_images(path)?);
    }
    tracing::info!(images = paths.len(), "starting");

    let mut module = ImageModule::from_paths(&paths, settings);
    if let Some(name) = &cli.selector {
        module.activate_selector(None, name)?;
    }
    if let Some(path) = &cli.annotations {
        for annotation in read_annotations(path)? {
            if let Err(e) = module.add_annotation(annotation) {
                tracing::warn!("skipping annotation: {e}");
            }
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("NoteCrab"),
        ..Default::default()
    };
    eframe::run_native(
        "NoteCrab",
        options,
        Box::new(|cc| Ok(Box::new(NoteCrabApp::new(cc, module)))),
    )
    .map_err(|e| eyre!(e.to_string()))?;
    Ok(())
}
