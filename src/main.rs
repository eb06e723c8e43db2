use anyhow::Result;
use log::{error, info, trace, warn};
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use flock_engine::{Flock, FlockConfig};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting flock engine (CPU parallel)...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = FlockConfig::load(&config_path)?;

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Flock ---
    let mut flock = Flock::new(config)?;
    info!("Flock initialized with {} agents.", flock.agent_count());
    // The headless runner has no interactive toggle; start moving right away.
    flock.set_moving(true);

    // --- Simulation Loop ---
    let params = flock.params().clone();
    let total_steps = (flock.config().timing.total_time / params.dt).ceil() as u32;
    let record_interval = flock.config().timing.record_interval.max(0.0);
    let mut record_interval_steps = (record_interval / params.dt).round() as u32;

    if record_interval_steps == 0 {
        warn!(
            "Record interval ({:.3} s) is smaller than the timestep ({:.3} s). Recording every step.",
            record_interval, params.dt
        );
        record_interval_steps = 1;
    }
    info!(
        "Recording a snapshot every {} steps ({:.2} s).",
        record_interval_steps,
        record_interval_steps as f32 * params.dt
    );

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    // Initial snapshot (t = 0)
    flock.record_snapshot();

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        flock.step();
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status =
            current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step == total_steps - 1;

        if should_print_status || is_record_step || is_last_step {
            let current_sim_time = (step + 1) as f32 * params.dt;
            info!(
                "Step [{}/{}] ({:.2} s) | Agents: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                current_sim_time,
                flock.agent_count(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                flock.record_snapshot();
            }
        } else {
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                step + 1,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.3} minutes).",
        total_duration.as_secs_f64(),
        total_duration.as_secs_f64() / 60.0
    );

    // --- Save Recorded Data ---
    if flock.config().output.save_stats {
        let output_format = flock.config().output.format.as_deref().unwrap_or("json");
        let base_filename = flock.config().output.base_filename.clone();
        let snapshots = flock.recorded_snapshots();

        match output_format {
            "bincode" => {
                let filename = format!("{base_filename}_snapshots.bin");
                match File::create(&filename) {
                    Ok(file) => match bincode::serialize_into(file, snapshots) {
                        Ok(_) => info!("All snapshots saved to {filename} (binary format)"),
                        Err(e) => error!("Error serializing snapshots to bincode: {e}"),
                    },
                    Err(e) => error!("Error creating snapshot file '{filename}': {e}"),
                }
            }
            "messagepack" => {
                let filename = format!("{base_filename}_snapshots.msgpack");
                match File::create(&filename) {
                    Ok(mut file) => match rmp_serde::encode::write(&mut file, snapshots) {
                        Ok(_) => info!("All snapshots saved to {filename} (MessagePack format)"),
                        Err(e) => error!("Error serializing snapshots to MessagePack: {e}"),
                    },
                    Err(e) => error!("Error creating snapshot file '{filename}': {e}"),
                }
            }
            other => {
                if other != "json" {
                    error!("Unknown output format: {other}. Using JSON instead.");
                }
                let filename = format!("{base_filename}_snapshots.json");
                match File::create(&filename) {
                    Ok(mut file) => match serde_json::to_string(snapshots) {
                        Ok(json_string) => {
                            if let Err(e) = file.write_all(json_string.as_bytes()) {
                                error!("Error writing snapshot JSON to file '{filename}': {e}");
                            } else {
                                info!("All snapshots saved to {filename}");
                            }
                        }
                        Err(e) => error!("Error serializing snapshots to JSON: {e}"),
                    },
                    Err(e) => error!("Error creating snapshot file '{filename}': {e}"),
                }
            }
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    // Save final agent poses if requested (separate from full snapshots)
    if flock.config().output.save_poses {
        let filename = format!("{}_final_poses.csv", flock.config().output.base_filename);

        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["x", "y", "heading"])?;
                for pose in flock.agent_snapshot() {
                    writer.write_record(&[
                        format!("{:.4}", pose.position.x),
                        format!("{:.4}", pose.position.y),
                        format!("{:.4}", pose.heading),
                    ])?;
                }
                writer.flush()?;
                info!("Final poses saved to {filename}");
            }
            Err(e) => error!("Error saving CSV file '{filename}': {e}"),
        }
    } else {
        info!("Skipping saving final poses as per config.");
    }

    info!("Simulation complete.");
    Ok(())
}
