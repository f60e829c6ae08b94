//! petmaestro demo runner.
//!
//! Runs a headless simulation of a few pets and logs what a desktop host
//! would draw and play:
//! - **bevy_ecs** drives the per-tick pipeline
//! - **configparser** reads the INI configuration
//! - **serde_json** reads the pack and dumps diagnostics
//!
//! Halfway through the run the first pet is picked up and thrown, and a
//! second thread asks the last pet to play a behavior through the command
//! channel.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --pack assets/packs/demo.json --pets 3 --ticks 600 --dump
//! ```

use std::path::PathBuf;

use clap::Parser;
use glam::Vec2;
use petmaestro::components::pet::PetHandle;
use petmaestro::maestro::AnimationManager;
use petmaestro::resources::packdata::PackData;
use petmaestro::resources::petconfig::PetConfig;

/// petmaestro desktop-pet engine demo
#[derive(Parser)]
#[command(version, about = "Headless desktop-pet behavior and animation engine demo")]
struct Cli {
    /// INI configuration file. Defaults are used when it is missing.
    #[arg(long, value_name = "PATH", default_value = "assets/config.ini")]
    config: PathBuf,

    /// JSON pack to load.
    #[arg(long, value_name = "PATH", default_value = "assets/packs/demo.json")]
    pack: PathBuf,

    /// Number of pets to spawn.
    #[arg(long, default_value_t = 2)]
    pets: usize,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,

    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Print every pet's diagnostics as JSON at the end.
    #[arg(long)]
    dump: bool,

    /// Behavior requested from the background thread.
    #[arg(long, default_value = "Sit")]
    trigger: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = PetConfig::with_path(cli.config.clone());
    if let Err(e) = config.load_from_file() {
        log::warn!("Using default configuration: {}", e);
    }

    let pack = match std::fs::read_to_string(&cli.pack)
        .map_err(|e| e.to_string())
        .and_then(|text| PackData::from_json(&text).map_err(|e| e.to_string()))
    {
        Ok(pack) => pack,
        Err(e) => {
            log::error!("Failed to read pack {}: {}", cli.pack.display(), e);
            std::process::exit(1);
        }
    };
    let pack_id = if pack.name.is_empty() {
        "demo".to_string()
    } else {
        pack.name.clone()
    };

    let dt = 1.0 / config.tick_rate.max(1.0);
    let mut maestro = match cli.seed {
        Some(seed) => AnimationManager::with_seed(config, seed),
        None => AnimationManager::new(config),
    };
    match maestro.load_pack(&pack_id, &pack) {
        Ok(report) if !report.is_clean() => {
            log::warn!("Pack '{}' loaded with {} issue(s)", pack_id, report.len());
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }

    let mut pets = Vec::with_capacity(cli.pets);
    for _ in 0..cli.pets {
        match maestro.register_pet(&pack_id) {
            Ok(handle) => pets.push(handle),
            Err(e) => log::error!("{}", e),
        }
    }

    let throw_at = cli.ticks / 2;
    let mut clock = 0.0_f64;
    for tick in 0..cli.ticks {
        if tick == throw_at {
            if let Some(&first) = pets.first() {
                demo_throw(&maestro, first, clock, dt);
            }
            if let Some(&last) = pets.last() {
                let sender = maestro.command_sender();
                let behavior = cli.trigger.clone();
                let helper = std::thread::spawn(move || sender.trigger(last, behavior));
                if let Ok(Err(command)) = helper.join() {
                    log::warn!("Trigger not delivered: {:?}", command);
                }
            }
        }

        let report = maestro.tick(dt);
        clock += f64::from(dt);
        for sound in &report.sounds {
            log::info!("[tick {}] {} plays '{}' at {:.2}", tick, sound.pet, sound.sound, sound.volume);
        }
        for call in &report.embedded {
            log::info!("[tick {}] {} invokes '{}' {:?}", tick, call.pet, call.action, call.data);
        }
        if tick % 30 == 0 {
            for frame in &report.frames {
                log::debug!(
                    "[tick {}] {} draws {:?} at {:?} flip={}",
                    tick,
                    frame.pet,
                    frame.image,
                    frame.position,
                    frame.flip_horizontal
                );
            }
        }
    }

    for &pet in &pets {
        match maestro.diagnostics(pet) {
            Ok(diag) => {
                log::info!(
                    "{}: behavior={:?} action={:?} mode={:?} flags={}",
                    pet,
                    diag.behavior,
                    diag.action,
                    diag.mode,
                    diag.flags.summary()
                );
                if cli.dump {
                    match serde_json::to_string_pretty(&diag) {
                        Ok(json) => println!("{}", json),
                        Err(e) => log::error!("Failed to serialize diagnostics: {}", e),
                    }
                }
            }
            Err(e) => log::error!("{}", e),
        }
    }
}

/// Grab a pet, flick it up and to the right, and let go.
fn demo_throw(maestro: &AnimationManager, pet: PetHandle, now: f64, dt: f32) {
    let Ok(diag) = maestro.diagnostics(pet) else {
        return;
    };
    let grab = diag.position + Vec2::splat(32.0);
    let step = f64::from(dt) / 4.0;
    let moves = [
        (grab, now),
        (grab + Vec2::new(20.0, -10.0), now + step),
        (grab + Vec2::new(60.0, -40.0), now + 2.0 * step),
    ];
    let sent = maestro
        .pointer_down(pet, moves[0].0, moves[0].1)
        .and_then(|_| maestro.pointer_move(pet, moves[1].0, moves[1].1))
        .and_then(|_| maestro.pointer_up(pet, moves[2].0, moves[2].1));
    if let Err(e) = sent {
        log::warn!("Demo throw failed: {}", e);
    }
}
