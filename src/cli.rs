// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the capture screen
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Running a capture session against a real camera
//! - Feeding an image file through the upload bypass

use facecam::app::{CaptureSession, ChannelHost, HostEvent, RenderContract, SessionSettings};
use facecam::backends::camera::v4l2::V4l2Devices;
use facecam::config::Config;
use facecam::pipelines::photo::CapturedImage;
use facecam::storage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Where and how to write the captured image
pub struct OutputOptions {
    pub output: Option<PathBuf>,
    pub data_url: bool,
    pub default_dir: PathBuf,
}

impl OutputOptions {
    pub fn new(config: &Config, output: Option<PathBuf>, data_url: bool) -> Self {
        Self {
            output,
            data_url,
            default_dir: config
                .output_dir
                .clone()
                .unwrap_or_else(storage::default_output_dir),
        }
    }

    async fn write(&self, image: &CapturedImage) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let extension = if self.data_url {
            "txt"
        } else {
            storage::capture_extension()
        };
        let path =
            storage::resolve_output_path(self.output.as_deref(), &self.default_dir, extension);
        let saved = if self.data_url {
            storage::save_data_url(image, &path).await?
        } else {
            storage::save_image(image, &path).await?
        };
        Ok(saved)
    }
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let devices = V4l2Devices::new().devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {} ({})", index, device.card, device.path);
        println!("      Driver: {}", device.driver);
        if let Some(facing) = device.facing {
            println!("      Facing: {}", facing);
        }
        println!("      Formats: {}", device.formats.join(", "));
        println!();
    }

    Ok(())
}

/// Print the parts of the render contract a terminal can show
fn print_contract(contract: &RenderContract) {
    if let Some(text) = &contract.loading_text {
        println!("{}", text);
    }
    if contract.show_preview && contract.capture_enabled {
        println!("Camera ready. Press Enter to capture, Ctrl-C to go back.");
    }
    if contract.flashing {
        println!("*flash*");
    }
    if let Some(panel) = &contract.error {
        println!("{}: {}", panel.title, panel.message);
        if panel.retry_enabled {
            println!("[Enter] {}", panel.retry_label);
        }
        if panel.upload_enabled {
            println!("[facecam upload FILE] {}", panel.upload_label);
        }
    }
}

fn print_saved(image: &CapturedImage, path: &Path) {
    match image.dimensions() {
        Some(size) => println!("Saved {} photo to {}", size, path.display()),
        None => println!("Saved photo to {}", path.display()),
    }
}

/// Mount a session on the real camera and capture one photo
pub fn capture_photo(
    config: &Config,
    options: OutputOptions,
    auto: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_capture(config, options, auto))
}

async fn run_capture(
    config: &Config,
    options: OutputOptions,
    auto: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (host, mut events) = ChannelHost::new();
    let session = CaptureSession::mount(V4l2Devices::new(), host, SessionSettings::from(config));

    let interrupted = session.clone();
    ctrlc::set_handler(move || {
        interrupted.back();
        interrupted.unmount();
    })?;

    let starter = session.clone();
    tokio::spawn(async move { starter.start().await });

    let mut snapshots = session.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut auto_armed = auto.is_some();
    print_contract(&session.render());

    let outcome = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break None;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                debug!(state = %snapshot.state, flashing = snapshot.flashing, "Session changed");
                print_contract(&session.render());

                if snapshot.state.is_ready()
                    && let Some(secs) = auto.filter(|_| auto_armed)
                {
                    auto_armed = false;
                    let auto_session = session.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                        if let Err(e) = auto_session.capture().await {
                            warn!(error = %e, "Automatic capture failed");
                        }
                    });
                }
                if !session.is_mounted() {
                    break None;
                }
            }
            event = events.recv() => match event {
                Some(HostEvent::Captured(image)) => break Some(image),
                Some(HostEvent::Back) | None => break None,
            },
            line = stdin.next_line(), if stdin_open => {
                if !matches!(line, Ok(Some(_))) {
                    // stdin closed; keep waiting for --auto or Ctrl-C
                    if auto.is_none() {
                        session.back();
                        break None;
                    }
                    stdin_open = false;
                    continue;
                }
                let state = session.state();
                if state.is_error() {
                    let retrier = session.clone();
                    tokio::spawn(async move { retrier.retry().await });
                } else {
                    let capturer = session.clone();
                    tokio::spawn(async move {
                        if let Err(e) = capturer.capture().await {
                            println!("{}", e);
                        }
                    });
                }
            }
        }
    };

    session.unmount();

    match outcome {
        Some(image) => {
            let path = options.write(&image).await?;
            print_saved(&image, &path);
            Ok(())
        }
        None => {
            println!("Cancelled.");
            Ok(())
        }
    }
}

/// Run an image file through the upload bypass
pub fn upload_photo(
    config: &Config,
    file: &Path,
    options: OutputOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (host, mut events) = ChannelHost::new();
        let session =
            CaptureSession::mount(V4l2Devices::new(), host, SessionSettings::from(config));

        session.upload_file(file).await?;
        session.unmount();

        match events.recv().await {
            Some(HostEvent::Captured(image)) => {
                let path = options.write(&image).await?;
                print_saved(&image, &path);
                Ok(())
            }
            _ => Err("upload produced no image".into()),
        }
    })
}
