use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tw_app::{
    AppResult, ProjectLock, RunOptions, RunProgressEvent, RunStage, project_service, query, run_service,
};
use tw_core::timing;
use tw_induction::{DeviceSelection, enumerate_devices};
use tw_sim::DebugToggles;

#[derive(Parser)]
#[command(name = "turbowake")]
#[command(about = "TurboWake - free vortex wake simulation of wind turbines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// List compute devices usable for induction
    Devices,
    /// Run a simulation headless
    Run {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Compute device index (0 = CPU)
        #[arg(short = 'd')]
        device: Option<usize>,
        /// Accelerator work group size
        #[arg(short = 'g')]
        work_group: Option<usize>,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
        /// Check wake referential integrity after every step
        #[arg(long)]
        check_wake: bool,
        /// Print per-phase timing after the run
        #[arg(long)]
        timing: bool,
    },
    /// List cached runs for a project
    Runs {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// Show details of a cached run
    ShowRun {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export one channel of a run as CSV
    ExportSeries {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Run ID
        run_id: String,
        /// Channel name, e.g. "T1 power"
        channel: String,
        /// Component of a vector channel (blade, span panel)
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Devices => cmd_devices(),
        Commands::Run {
            project_path,
            device,
            work_group,
            no_cache,
            check_wake,
            timing: print_timing,
        } => {
            if print_timing {
                timing::enable_timing();
            }
            let options = RunOptions {
                use_cache: !no_cache,
                device: DeviceSelection::from_flags(device, work_group)?,
                debug: DebugToggles {
                    check_wake_integrity: check_wake,
                    ..DebugToggles::default()
                },
                ..RunOptions::default()
            };
            cmd_run(project_path, options)
        }
        Commands::Runs { project_path } => cmd_runs(&project_path),
        Commands::ShowRun {
            project_path,
            run_id,
        } => cmd_show_run(&project_path, &run_id),
        Commands::ExportSeries {
            project_path,
            run_id,
            channel,
            index,
            output,
        } => cmd_export_series(&project_path, &run_id, &channel, index, output.as_deref()),
    }
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    project_service::validate_project(&project)?;
    println!("✓ Project is valid");
    for t in project_service::list_turbines(&project) {
        println!(
            "  {} - {} ({} blades, R = {:.1} m, hub {:.1} m, {}{})",
            t.id,
            t.name,
            t.blade_count,
            t.tip_radius_m,
            t.hub_height_m,
            t.structure,
            if t.has_controller { ", controlled" } else { "" }
        );
    }
    Ok(())
}

fn cmd_devices() -> AppResult<()> {
    println!("Compute devices:");
    for device in enumerate_devices() {
        println!("  {device}");
    }
    Ok(())
}

fn cmd_run(project_path: PathBuf, options: RunOptions) -> AppResult<()> {
    println!("Running simulation on {}", options.device);

    let lock = ProjectLock::new();
    let handle = run_service::spawn_run(project_path.clone(), options, &lock)?;

    let mut last_emit = Instant::now();
    let mut last_stage = RunStage::LoadingProject;
    for event in handle.events().iter() {
        let emit_now = event.stage != last_stage || last_emit.elapsed().as_millis() >= 100;
        if emit_now {
            render_cli_progress(&event);
            last_stage = event.stage.clone();
            last_emit = Instant::now();
        }
    }
    let response = handle.wait()?;
    clear_progress_line();

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Simulation ended: {} ({:?})", response.run_id, response.manifest.outcome);
    }

    let t = &response.timing;
    println!("\nTiming summary:");
    if t.load_time_s > 0.0 {
        println!("  Cache load: {:.3}s", t.load_time_s);
    } else {
        println!("  Setup:   {:.3}s", t.setup_time_s);
        println!("  Run:     {:.3}s ({} steps)", t.run_time_s, t.steps);
        println!("  Save:    {:.3}s", t.save_time_s);
    }
    t.print_summary();

    let (_manifest, replay) = run_service::load_run(&project_path, &response.run_id)?;
    if let Ok(summary) = query::get_run_summary(&replay) {
        println!("  Stored steps: {}", summary.record_count);
        println!("  Channels:     {}", summary.channel_count);
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    if let Some(s) = &event.step {
        let width = 28usize;
        let filled = ((s.fraction_complete * width as f64).round() as usize).min(width);
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(width.saturating_sub(filled)));
        print!(
            "\r[{}] {:>6.2}%  step={}/{}  t={:.3}s  stored={}  elapsed={:.1}s",
            bar,
            s.fraction_complete * 100.0,
            s.step,
            s.number_of_timesteps,
            s.sim_time_s,
            s.stored,
            event.elapsed_wall_s
        );
    } else {
        let spinner = ['|', '/', '-', '\\'];
        let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
        let mut line = format!(
            "\r{} {}  elapsed={:.2}s",
            spinner[spin_idx],
            event.stage.label(),
            event.elapsed_wall_s
        );
        if let Some(msg) = &event.message {
            line.push_str(&format!("  {msg}"));
        }
        print!("{line}");
    }
    let _ = io::stdout().flush();
}

fn cmd_runs(project_path: &Path) -> AppResult<()> {
    let runs = run_service::list_runs(project_path)?;

    if runs.is_empty() {
        println!("No cached runs found");
    } else {
        println!("Cached runs:");
        for manifest in runs {
            println!(
                "  {} ({}, {}, {} steps stored, {:?})",
                manifest.run_id, manifest.timestamp, manifest.device, manifest.stored_steps, manifest.outcome
            );
        }
    }
    Ok(())
}

fn cmd_show_run(project_path: &Path, run_id: &str) -> AppResult<()> {
    println!("Loading run: {run_id}");

    let (manifest, replay) = run_service::load_run(project_path, run_id)?;
    let summary = query::get_run_summary(&replay)?;

    println!("\nRun Summary:");
    println!("  Project:     {}", manifest.project_name);
    println!("  Outcome:     {:?}", manifest.outcome);
    println!("  Device:      {}", manifest.device);
    println!("  Time points: {}", summary.record_count);
    println!("  Time range:  {:.3} - {:.3} s", summary.time_range.0, summary.time_range.1);
    println!("  Turbines:    {}", summary.turbine_count);
    println!("  Wake frames: {}", if summary.has_wake_frames { "yes" } else { "no" });

    println!("\nChannels:");
    for name in query::list_channels(&replay) {
        println!("  {name}");
    }
    Ok(())
}

fn cmd_export_series(
    project_path: &Path,
    run_id: &str,
    channel: &str,
    index: usize,
    output: Option<&Path>,
) -> AppResult<()> {
    let (_manifest, replay) = run_service::load_run(project_path, run_id)?;
    let series = query::extract_series(&replay, channel, index)?;
    let csv = query::series_to_csv(&series);

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!("✓ Exported {} data points to {}", series.len(), path.display());
    } else {
        print!("{csv}");
    }
    Ok(())
}
