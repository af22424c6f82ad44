use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use log::{info, warn, error, debug, trace};

// Define modules used by main
mod body;
mod collisions;
mod control;
mod cpu_state;
mod forces;
mod grid;
mod integrator;
mod simulation;
mod trail;

use control::Controller;
use gravity_common::{SimulationConfig, Snapshot};
use simulation::GravitySimulation;

/// Command-line arguments for the simulation engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file (defaults are used when omitted and ./config.toml is absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of ticks to simulate
    #[arg(long)]
    ticks: Option<u64>,
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    match &args.config {
        Some(path) => SimulationConfig::load(path),
        None if Path::new("config.toml").exists() => SimulationConfig::load("config.toml"),
        None => {
            info!("No config.toml found, using built-in defaults.");
            Ok(SimulationConfig::default())
        }
    }
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Gravity Engine (CPU Parallel)...");

    // --- Load Configuration ---
    let mut config = load_config(&args)?;
    if let Some(ticks) = args.ticks {
        config.timing.total_ticks = ticks;
    }

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = GravitySimulation::new(config)?;
    info!(
        "Initialized {} bodies ({} influencers, merge policy {:?}).",
        sim.bodies().len(),
        sim.state.influencers.len(),
        sim.config().physics.merge_policy
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    let mut controller = Controller::new(&sim.config().commands, &sim.config().output.base_filename);

    // --- Simulation Loop ---
    let total_ticks = sim.config().timing.total_ticks;
    let record_interval = sim.config().timing.record_interval_ticks.max(1);
    info!("Recording snapshot every {} ticks.", record_interval);

    info!("Starting simulation loop for {} ticks...", total_ticks);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    sim.record_snapshot(&controller.view);

    let mut frame: u64 = 0;
    while sim.current_time_step < total_ticks {
        // Commands are only sampled between ticks.
        controller.enqueue_due(frame);
        controller.process_pending(&mut sim)?;
        frame += 1;

        if controller.view.quit_requested {
            info!("Quit requested at tick {}.", sim.current_time_step);
            break;
        }
        if controller.view.paused {
            if !controller.has_scheduled() {
                warn!("Paused with no further commands scheduled. Stopping.");
                break;
            }
            trace!("Frame {} paused.", frame);
            continue;
        }

        let step_start_time = Instant::now();
        let events = sim.step();
        let step_duration = step_start_time.elapsed();
        let tick = sim.current_time_step;

        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = tick % record_interval == 0;
        let is_last_step = tick == total_ticks;

        if should_print_status || is_record_step || is_last_step {
            info!(
                "Tick [{}/{}] (t = {:.2}, dt = {}) | Active: {} | Merges: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                tick,
                total_ticks,
                sim.time(),
                sim.dt(),
                sim.active_count(),
                sim.total_merges(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                sim.record_snapshot(&controller.view);
            }
        } else {
            trace!(
                "Tick [{}/{}] completed in {:.2} ms with {} merges",
                tick,
                total_ticks,
                step_duration.as_secs_f64() * 1000.0,
                events.len()
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished after {} ticks in {:.3} seconds.",
        sim.current_time_step,
        total_duration.as_secs_f64()
    );

    // --- Save Recorded Data ---
    let output = sim.config().output.clone();
    if output.save_snapshots {
        let format = output.format.as_deref().unwrap_or("json");
        save_snapshots(sim.get_recorded_snapshots(), &output.base_filename, format)?;
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    if output.save_final_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["x", "y", "radius", "merged", "sun"])?;
                for body in sim.body_snapshots() {
                    writer.write_record(&[
                        format!("{:.4}", body.x),
                        format!("{:.4}", body.y),
                        format!("{:.4}", body.radius),
                        body.merged.to_string(),
                        body.is_sun.to_string(),
                    ])?;
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    if output.save_trail_on_exit {
        let filename = format!("{}_trails.png", output.base_filename);
        if let Err(e) = sim.save_trail_png(&filename) {
            error!("Error saving trail image: {:#}", e);
        }
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Writes all recorded snapshots in the requested format, falling back to JSON.
fn save_snapshots(snapshots: &[Snapshot], base_filename: &str, format: &str) -> Result<()> {
    match format {
        "json" => write_json(snapshots, base_filename),
        "bincode" => {
            // Binary format (much more compact); this is what the visualizer reads.
            let filename = format!("{}_snapshots.bin", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, snapshots)
                .context("Error serializing snapshots to bincode")?;
            writer.flush()?;
            info!("{} snapshots saved to {} (binary format)", snapshots.len(), filename);
            Ok(())
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
            let mut writer = BufWriter::new(file);
            rmp_serde::encode::write(&mut writer, snapshots)
                .context("Error serializing snapshots to MessagePack")?;
            writer.flush()?;
            info!("{} snapshots saved to {} (MessagePack format)", snapshots.len(), filename);
            Ok(())
        }
        other => {
            warn!("Unknown output format: {}. Using JSON instead.", other);
            write_json(snapshots, base_filename)
        }
    }
}

fn write_json(snapshots: &[Snapshot], base_filename: &str) -> Result<()> {
    let filename = format!("{}_snapshots.json", base_filename);
    let json_string = serde_json::to_string(snapshots).context("Error serializing snapshots to JSON")?;
    let mut file = File::create(&filename)
        .with_context(|| format!("Error creating snapshot file '{}'", filename))?;
    file.write_all(json_string.as_bytes())
        .with_context(|| format!("Error writing snapshot JSON to file '{}'", filename))?;
    info!("{} snapshots saved to {} ({}MB)", snapshots.len(), filename, json_string.len() / 1_048_576);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bincode_snapshots_round_trip_through_a_file() {
        let mut config = SimulationConfig::default();
        config.seeding.grid_half_x = 1;
        config.seeding.grid_half_y = 1;
        let mut sim = GravitySimulation::new(config).unwrap();
        let view = control::ViewState::default();
        sim.record_snapshot(&view);
        sim.step();
        sim.record_snapshot(&view);

        let base = std::env::temp_dir().join(format!("engine_snapshots_{}", std::process::id()));
        let base = base.to_str().unwrap();
        save_snapshots(sim.get_recorded_snapshots(), base, "bincode").unwrap();

        let path = format!("{}_snapshots.bin", base);
        let loaded: Vec<Snapshot> = bincode::deserialize_from(File::open(&path).unwrap()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].tick, 1);
        assert_eq!(loaded[1].bodies.as_ref().map(Vec::len), Some(11));
        std::fs::remove_file(&path).ok();
    }
}
