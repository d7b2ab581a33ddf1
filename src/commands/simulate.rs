use std::sync::atomic::AtomicBool;

use gridstock::{
    SimConfig, Simulation, render_ascii, render_summary, save_world_snapshot,
    save_world_snapshot_tick, snapshot_dir,
};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub ticks: Option<u64>,
    pub snapshot_every: u64,
    pub report_every: u64,
}

pub fn run_simulation(config: SimConfig, options: RunOptions) -> Result<(), String> {
    let mut sim = Simulation::from_config(&config).map_err(|e| e.to_string())?;
    let stop = AtomicBool::new(false);
    let dir = snapshot_dir();

    let ran = sim
        .run(options.ticks, &stop, |report, handle| {
            let due = |every: u64| every > 0 && report.tick % every == 0;
            if !due(options.report_every) && !due(options.snapshot_every) {
                return Ok(());
            }
            let snapshot = handle.snapshot()?;
            if due(options.report_every) {
                println!("{}", render_summary(&snapshot));
            }
            if due(options.snapshot_every) {
                save_world_snapshot(&dir, &snapshot)?;
                let path = save_world_snapshot_tick(&dir, &snapshot)?;
                info!(tick = report.tick, path = %path.display(), "snapshot written");
            }
            Ok(())
        })
        .map_err(|e| e.to_string())?;

    let snapshot = sim.handle().snapshot().map_err(|e| e.to_string())?;
    print!("{}", render_ascii(&snapshot));
    println!("{}", render_summary(&snapshot));
    println!("Completed {} tick(s)", ran);
    Ok(())
}
