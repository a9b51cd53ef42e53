// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! framemark - video frame polygon annotator
//!
//! A desktop application that captures a still frame from a video and lets
//! the user outline polygonal regions on it, exporting the vertices in the
//! video's native resolution.

mod app;
mod config;
mod io;
mod models;
mod ui;
mod util;

use anyhow::Result;
use app::FramemarkApp;
use config::AppConfig;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config = AppConfig::load();

    // Configure egui options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([800.0, 600.0])
            .with_title("framemark - Video Frame Polygon Annotator"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "framemark",
        options,
        Box::new(|_cc| Ok(Box::new(FramemarkApp::new(config)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
