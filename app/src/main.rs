//! camkit: webcam preview, snapshots and recording.

mod config;
mod controller;
mod prompt;
mod recorder;
mod window;

use anyhow::{Context, Result};
use camkit_camera::{Camera, CameraInfo};
use clap::Parser;
use config::{Cli, Settings, TEST_PATTERN_SIZE};
use controller::{UiEvent, WebcamController};
use prompt::NativePrompter;
use std::sync::{Arc, Mutex, PoisonError};
use winit::event_loop::EventLoop;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let settings = Settings::from(&cli);

    let mut devices = Camera::list().unwrap_or_else(|e| {
        log::warn!("Failed to list cameras: {e}");
        Vec::new()
    });
    if cli.test_pattern {
        let (width, height) = TEST_PATTERN_SIZE;
        devices.push(CameraInfo::test_pattern(width, height, settings.fps));
    }

    let event_loop = EventLoop::<UiEvent>::with_user_event()
        .build()
        .context("Failed to create event loop")?;
    let proxy = Mutex::new(event_loop.create_proxy());

    let mut controller = WebcamController::new(
        settings,
        Box::new(NativePrompter),
        Arc::new(move |event: UiEvent| {
            // Fails only once the event loop has exited.
            let _ = proxy
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send_event(event);
        }),
    );

    if let Err(e) = controller.load_devices(devices) {
        controller.report(&e);
    }
    if let Some(index) = cli.device {
        if let Err(e) = controller.select(index) {
            controller.report(&e);
        }
    }

    let mut app = window::App::new(controller);
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated with an error")?;
    Ok(())
}
