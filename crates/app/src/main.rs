//! PDF Viewer
//!
//! Continuous-scroll PDF viewer built on eframe.

mod app;
mod logging;

use anyhow::Context as _;
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use viewer_core::ViewerConfig;

#[derive(Debug, Parser)]
#[command(name = "pdf-viewer", version, about = "View PDF documents as one continuous scroll")]
struct Args {
    /// PDF file to open at startup
    file: Option<PathBuf>,

    /// Read settings from this JSON file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the log here instead of the platform data directory
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    if let Err(err) = logging::init(&log_path) {
        eprintln!("warning: logging disabled: {err}");
    }

    if let Err(err) = run(args) {
        tracing::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref());
    let engine = pdf_engine::default_engine();
    tracing::info!(engine = engine.name(), "starting");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("PDF Viewer"),
        ..Default::default()
    };

    let initial_file = args.file;
    eframe::run_native(
        "PDF Viewer",
        options,
        Box::new(move |_cc| Ok(Box::new(app::PdfViewerApp::new(engine, config, initial_file)))),
    )
    .map_err(|err| anyhow::anyhow!("{err}"))
    .context("failed to create the viewer window")
}

fn load_config(path: Option<&std::path::Path>) -> ViewerConfig {
    let Some(path) = path else {
        return ViewerConfig::load_or_default();
    };

    match ViewerConfig::load(path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("ignoring configuration: {err}");
            ViewerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn file_argument_is_optional() {
        let args = Args::try_parse_from(["pdf-viewer"]).expect("parse");
        assert_eq!(args.file, None);

        let args = Args::try_parse_from(["pdf-viewer", "report.pdf"]).expect("parse");
        assert_eq!(args.file, Some(PathBuf::from("report.pdf")));
    }

    #[test]
    fn config_and_log_paths_are_flags() {
        let args = Args::try_parse_from([
            "pdf-viewer",
            "--config",
            "viewer.json",
            "--log-file",
            "viewer.log",
        ])
        .expect("parse");

        assert_eq!(args.config, Some(PathBuf::from("viewer.json")));
        assert_eq!(args.log_file, Some(PathBuf::from("viewer.log")));
        assert_eq!(args.file, None);
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "zoom": { "step": 0.5 } }"#).expect("write config");

        assert_eq!(load_config(Some(&path)), ViewerConfig::default());
    }

    #[test]
    fn explicit_config_is_used() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "page_gap": 4 }"#).expect("write config");

        assert_eq!(load_config(Some(&path)).page_gap, 4.0);
    }
}
