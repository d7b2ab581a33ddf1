use gridstock::{
    SimConfig, Warehouse, load_world_snapshot, render_ascii, render_summary, snapshot_dir,
};

pub fn run_layout(config: SimConfig, json: bool) -> Result<(), String> {
    let warehouse = Warehouse::build(&config).map_err(|e| e.to_string())?;
    let snapshot = warehouse.snapshot();
    if json {
        let out = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
        println!("{}", out);
        return Ok(());
    }
    print!("{}", render_ascii(&snapshot));
    println!(
        "{}x{} | {} rack cell(s), {} stocked | {} bay cell(s), {} product(s) | {} robot(s)",
        snapshot.width,
        snapshot.height,
        warehouse.world().racks.len(),
        snapshot.rack_stock,
        warehouse.world().bays.len(),
        snapshot.bay_stock,
        snapshot.robots.len()
    );
    Ok(())
}

pub fn run_config(config: SimConfig) -> Result<(), String> {
    let out = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

pub fn run_show(json: bool) -> Result<(), String> {
    let dir = snapshot_dir();
    let Some(snapshot) = load_world_snapshot(&dir).map_err(|e| e.to_string())? else {
        return Err(format!(
            "no snapshot under {}; run with --snapshot-every first",
            dir.display()
        ));
    };
    if json {
        let out = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
        println!("{}", out);
        return Ok(());
    }
    print!("{}", render_ascii(&snapshot));
    println!("{}", render_summary(&snapshot));
    println!("generated at {}", snapshot.generated_at.to_rfc3339());
    Ok(())
}
