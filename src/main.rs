//! Catchment CLI - hydro-geomorphic landscape simulator.
//!
//! Runs a simulation from a parameter file or JSON configuration, and offers
//! a few raster utilities around it.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use catchment::drainage::drainage_area;
use catchment::grid::{is_no_data, Grid};
use catchment::io::{export_grid_png, read_ascii, write_grid, PngExportOptions};
use catchment::{load_params, ModelConfig, Simulation, SyntheticValley};

/// Grid-based hydro-geomorphic catchment simulator.
#[derive(Parser)]
#[command(name = "catchment")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation to its configured duration.
    Run {
        /// Key-value parameter file.
        #[arg(short, long, conflicts_with = "config")]
        params: Option<PathBuf>,

        /// JSON configuration (see `init-config`).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the output directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write PNG previews of elevation and water depth with every snapshot.
        #[arg(long)]
        png: bool,

        /// Print a progress line every this many ticks.
        #[arg(long, default_value = "1000")]
        progress_every: u64,
    },

    /// Write the default configuration as JSON.
    InitConfig {
        /// Destination file.
        #[arg(short, long, default_value = "catchment.json")]
        out: PathBuf,
    },

    /// Compute contributing drainage area of a DEM.
    Drainage {
        /// ESRI ASCII DEM.
        #[arg(short, long)]
        dem: PathBuf,

        /// ASCII raster of drainage area (cells).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// 16-bit PNG of log drainage area.
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Print a DEM's header and check it has an outlet.
    Info {
        /// ESRI ASCII DEM.
        #[arg(short, long)]
        dem: PathBuf,
    },

    /// Write a seeded synthetic valley DEM and a configuration that runs on it.
    Synthetic {
        /// Output directory.
        #[arg(short, long, default_value = "./synthetic")]
        output: PathBuf,

        #[arg(long, default_value = "60")]
        rows: usize,

        #[arg(long, default_value = "40")]
        cols: usize,

        /// Cell size (m).
        #[arg(long, default_value = "10.0")]
        cell_size: f64,

        /// Random seed for the surface roughness.
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Uniform rainfall (mm/hr).
        #[arg(long, default_value = "10.0")]
        rain: f64,

        /// Model hours to simulate.
        #[arg(long, default_value = "24.0")]
        hours: f64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            params,
            config,
            output,
            png,
            progress_every,
        } => run_simulation(params, config, output, png, progress_every),
        Commands::InitConfig { out } => run_init_config(out),
        Commands::Drainage { dem, out, png } => run_drainage(dem, out, png),
        Commands::Info { dem } => run_info(dem),
        Commands::Synthetic {
            output,
            rows,
            cols,
            cell_size,
            seed,
            rain,
            hours,
        } => run_synthetic(output, rows, cols, cell_size, seed, rain, hours),
    }
}

fn run_simulation(
    params: Option<PathBuf>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    png: bool,
    progress_every: u64,
) {
    let mut model_config = match (params, config) {
        (Some(path), _) => load_params(&path).unwrap_or_else(|e| {
            eprintln!("Error reading parameter file: {}", e);
            std::process::exit(1);
        }),
        (None, Some(path)) => ModelConfig::load_json(&path).unwrap_or_else(|e| {
            eprintln!("Error reading configuration: {}", e);
            std::process::exit(1);
        }),
        (None, None) => {
            eprintln!("Error: one of --params or --config is required");
            std::process::exit(1);
        }
    };
    if let Some(dir) = output {
        model_config.io.write_path = dir;
    }
    if png {
        model_config.io.rasters.png_previews = true;
    }

    println!("Catchment - Hydro-geomorphic Simulator");
    println!("======================================");
    println!("DEM: {}", model_config.io.input(&model_config.io.dem_file).display());
    println!("Output: {}", model_config.io.write_path.display());
    println!("Duration: {} h", model_config.time.max_run_duration);
    println!("Transport law: {}", model_config.sediment.transport_law.name());
    if model_config.hydro_model_only {
        println!("Mode: hydrology only");
    }

    let start = Instant::now();
    let mut sim = Simulation::from_config(model_config).unwrap_or_else(|e| {
        eprintln!("Error setting up simulation: {}", e);
        std::process::exit(1);
    });
    println!("Grid: {} x {}, {} data cells", sim.state().rows(), sim.state().cols(), sim.state().data_cells);

    let every = progress_every.max(1);
    let summary = sim
        .run(|report| {
            if report.counter % every == 0 {
                println!(
                    "  tick {:>9}  t = {:>9.2} h  dt = {:>7.3} s  Qout = {:>9.4} m3/s  max depth = {:.3} m",
                    report.counter,
                    report.time_minutes / 60.0,
                    report.flow_dt,
                    report.water_out,
                    report.max_depth
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Error during simulation: {}", e);
            std::process::exit(1);
        });

    println!("\nTicks: {}", summary.ticks);
    println!("Model time: {:.2} h", summary.time_minutes / 60.0);
    println!("Sediment yield: {:.4} m3", summary.sediment_yield);
    println!("Water on grid: {:.2} m3", summary.water_volume);
    println!("Total time: {:.2?}", start.elapsed());
    println!("Done!");
}

fn run_init_config(out: PathBuf) {
    ModelConfig::default().save_json(&out).unwrap_or_else(|e| {
        eprintln!("Error writing configuration: {}", e);
        std::process::exit(1);
    });
    println!("Wrote default configuration to {}", out.display());
}

fn run_drainage(dem: PathBuf, out: Option<PathBuf>, png: Option<PathBuf>) {
    let raster = read_ascii(&dem).unwrap_or_else(|e| {
        eprintln!("Error reading DEM: {}", e);
        std::process::exit(1);
    });
    let elev = raster.to_grid();
    let start = Instant::now();
    let area = drainage_area(&elev);
    let max_area = area.max_value().unwrap_or(0.0);
    println!("Drainage area computed in {:.2?}", start.elapsed());
    println!(
        "Largest contributing area: {:.0} cells ({:.3} km2)",
        max_area,
        max_area * raster.header.cellsize * raster.header.cellsize / 1.0e6
    );

    if let Some(path) = out {
        write_grid(&path, &raster.header, &area).unwrap_or_else(|e| {
            eprintln!("Error writing drainage raster: {}", e);
            std::process::exit(1);
        });
        println!("  Wrote {}", path.display());
    }
    if let Some(path) = png {
        let log_area: Grid<f64> = area.map(|a| if a > 0.0 { a.ln() } else { 0.0 });
        let options = PngExportOptions::auto_range(&log_area);
        export_grid_png(&log_area, &path, &options).unwrap_or_else(|e| {
            eprintln!("Error exporting PNG: {}", e);
            std::process::exit(1);
        });
        println!("  Wrote {}", path.display());
    }
}

fn run_info(dem: PathBuf) {
    let raster = read_ascii(&dem).unwrap_or_else(|e| {
        eprintln!("Error reading DEM: {}", e);
        std::process::exit(1);
    });
    let header = &raster.header;
    let elev = raster.to_grid();

    let data_cells = elev.cells().filter(|&(r, c)| !is_no_data(elev.get(r, c))).count();
    let edge_cells = elev
        .cells()
        .filter(|&(r, c)| elev.is_domain_edge(r, c) && !is_no_data(elev.get(r, c)))
        .count();

    println!("Catchment - DEM Info");
    println!("====================");
    println!();
    println!("File:        {}", dem.display());
    println!("Size:        {} cols x {} rows", header.ncols, header.nrows);
    println!("Cell size:   {} m", header.cellsize);
    println!("Lower left:  ({}, {})", header.xllcorner, header.yllcorner);
    println!("No-data:     {}", header.nodata);
    println!("Data cells:  {}", data_cells);
    if let Some((min, max)) = elev.value_range() {
        println!("Elevation:   {:.3} .. {:.3} m", min, max);
    }
    println!();
    if edge_cells > 0 {
        println!("Outlet check: OK ({} data cells on the grid edge)", edge_cells);
    } else {
        println!("Outlet check: FAILED (no data cell on the grid edge; water cannot leave)");
        std::process::exit(1);
    }
}

fn run_synthetic(output: PathBuf, rows: usize, cols: usize, cell_size: f64, seed: u64, rain: f64, hours: f64) {
    if rows < 3 || cols < 3 {
        eprintln!("Error: the grid must be at least 3 x 3");
        std::process::exit(1);
    }
    let valley = SyntheticValley {
        rows,
        cols,
        cell_size,
        seed,
        ..Default::default()
    };
    let (header, elev) = valley.generate();

    let dem_path = output.join("dem.asc");
    write_grid(&dem_path, &header, &elev).unwrap_or_else(|e| {
        eprintln!("Error writing DEM: {}", e);
        std::process::exit(1);
    });

    let mut config = ModelConfig::default();
    config.io.read_path = output.clone();
    config.io.dem_file = "dem.asc".to_string();
    config.io.write_path = output.join("out");
    config.hydrology.uniform_rainfall = rain;
    config.time.max_run_duration = hours;
    let config_path = output.join("config.json");
    config.save_json(&config_path).unwrap_or_else(|e| {
        eprintln!("Error writing configuration: {}", e);
        std::process::exit(1);
    });

    println!("Wrote {} ({} x {}, seed {})", dem_path.display(), rows, cols, seed);
    println!("Wrote {}", config_path.display());
    println!("Run it with: catchment run --config {}", config_path.display());
}
