use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Instant;

use clap::Parser;
use framelink::prelude::*;
use framelink::runtime::settings::{
    default_settings_path, load_settings_if_exists, save_settings,
};

mod frame_clock;
mod script_host;
mod settings_watch;
mod software_viewport;

use frame_clock::FrameClock;
use script_host::{HostCommand, ScriptHost};
use settings_watch::SettingsWatch;
use software_viewport::{DEFAULT_SIZE, SoftwareViewport};

#[derive(Parser, Debug)]
#[command(
    name = "framelink-host",
    version,
    about = "Frame-stepped host exposing the framelink remote API"
)]
struct Args {
    /// Settings file; defaults to the platform config dir
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Overrides the configured listener port
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, default_value = "60")]
    fps: f32,

    /// Exit after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Write the current settings back to the settings file on exit
    #[arg(long)]
    save_on_exit: bool,
}

fn main() {
    init_logger();
    let args = Args::parse();

    if let Err(err) = run(args) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let settings_path = args.settings.clone().or_else(default_settings_path);
    let mut settings = read_settings(settings_path.as_deref())?;
    if let Some(port) = args.port {
        settings.port = port;
    }

    let mut web_api = WebApi::new(settings);
    let watch = settings_path.clone().and_then(|path| {
        SettingsWatch::start(path)
            .inspect_err(|err| warn!("settings will not hot-reload: {}", err))
            .ok()
    });

    let mut clock = FrameClock::new(args.fps);
    let mut viewport = SoftwareViewport::new(DEFAULT_SIZE);
    let mut scripts = ScriptHost::default();

    info!("Running at {} fps", clock.fps());

    'main: loop {
        for frame in clock.tick(Instant::now()) {
            viewport.present(frame);
            web_api.update(&mut viewport, &mut scripts);

            for command in scripts.take_commands() {
                match command {
                    HostCommand::SetOverlay(visible) => {
                        viewport.set_overlay_visible(visible);
                    }
                    HostCommand::Resize(width, height) => {
                        viewport.resize_viewport(width, height);
                    }
                    HostCommand::SetFps(fps) => clock.set_fps(fps),
                    HostCommand::Quit => {
                        info!("Quit requested by script");
                        break 'main;
                    }
                }
            }

            if frame % 600 == 0 {
                debug!(
                    "frame {}: {:.1} fps, overlay {}",
                    frame,
                    clock.average_fps(),
                    viewport.overlay_visible()
                );
            }

            if args.frames.is_some_and(|limit| frame >= limit) {
                break 'main;
            }
        }

        if let (Some(watch), Some(path)) = (&watch, &settings_path) {
            if watch.take_changed() {
                reload_settings(&mut web_api, path, args.port);
            }
        }

        let deadline = clock.next_deadline();
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }

    if args.save_on_exit {
        match &settings_path {
            Some(path) => {
                save_settings(path, &web_api.on_settings_save())?;
                info!("Saved settings to {}", path.display());
            }
            None => warn!("No settings path; nothing saved"),
        }
    }

    web_api.shutdown();
    Ok(())
}

fn read_settings(
    path: Option<&Path>,
) -> Result<RemoteSettings, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(RemoteSettings::default());
    };

    match load_settings_if_exists(path)? {
        Some(settings) => {
            info!("Loaded settings from {}", path.display());
            Ok(settings)
        }
        None => Ok(RemoteSettings::default()),
    }
}

/// `port_override` wins over the file, as it did at startup.
fn reload_settings(
    web_api: &mut WebApi,
    path: &Path,
    port_override: Option<u16>,
) {
    match load_settings_if_exists(path) {
        Ok(Some(mut settings)) => {
            if let Some(port) = port_override {
                settings.port = port;
            }
            info!("Reloading settings from {}", path.display());
            web_api.on_settings_changed(settings);
        }
        Ok(None) => {}
        Err(err) => warn!("Ignoring invalid settings file: {}", err),
    }
}
