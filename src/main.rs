use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use gridsite::analysis::aggregation::aggregate_series;
use gridsite::analysis::reporting::station_summaries;
use gridsite::cli::cli::Args;
use gridsite::config::settings::Config;
use gridsite::core::balance::{BalanceEngine, BalanceInput, BalanceResult};
use gridsite::core::connector::splice_all;
use gridsite::core::router::trace_all;
use gridsite::data::{grid_loader, series_loader, stations_loader};
use gridsite::utils::csv_export;
use gridsite::utils::logging::{self, StatusLog};
use gridsite::utils::progress::ProgressHooks;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging();

    println!("gridsite: renewable siting and dispatch simulator");

    let config = Config::load(args.config())
        .with_context(|| format!("loading configuration from {}", args.config()))?;
    let mut log = StatusLog::new();

    let mut grid = grid_loader::load_grid(args.grid(), &config, &mut log)
        .with_context(|| format!("loading grid catalogue from {}", args.grid()))?;
    let stations = stations_loader::load_stations(args.stations(), &mut log)
        .with_context(|| format!("loading station catalogue from {}", args.stations()))?;
    let intermittent = stations
        .iter()
        .filter(|s| s.technology.is_intermittent())
        .count();
    println!(
        "Loaded {} trunk segments, {} load centres, {} stations ({} intermittent)",
        grid.segments.len(),
        grid.load_centres.len(),
        stations.len(),
        intermittent
    );

    let bar = station_bar(stations.len(), args.no_progress());
    let progress = |current: usize, total: usize| {
        bar.set_length(total as u64);
        bar.set_position(current as u64);
    };
    let hooks = ProgressHooks {
        progress: Some(&progress),
        cancel: None,
    };

    bar.set_message("splicing");
    let (splices, _) = splice_all(&mut grid, &stations, &hooks, &mut log);
    bar.set_message("routing");
    let (routes, _) = trace_all(&mut grid, &stations, &splices, &config, &hooks, &mut log);
    bar.finish_and_clear();

    let reachable = routes.iter().filter(|r| r.reachable).count();
    println!("Routed {} of {} stations to a load centre", reachable, stations.len());

    if let Some(path) = args.save_stations() {
        stations_loader::save_stations(path, &stations)
            .with_context(|| format!("saving station catalogue to {}", path))?;
    }

    let output_dir = Path::new(args.output_dir());
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", args.output_dir()))?;

    let series = match args.series() {
        Some(path) => series_loader::load_series(path, &mut log)
            .with_context(|| format!("loading hourly series from {}", path))?,
        None => BTreeMap::new(),
    };

    if args.series().is_some() {
        let mut input = BalanceInput::new(series.clone());
        input.storage = config.storage.clone();
        input.wrap_series = config.wrap_series;

        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = if args.iterate_shortfall() {
            let results = engine.run_shortfall_iterations()?;
            for result in &results {
                println!(
                    "Balance pass with {:.1} MW boost: shortfall {:.1} MWh, excess {:.1} MWh",
                    result.boost, result.total_shortfall, result.total_excess
                );
            }
            results.into_iter().last()
        } else {
            Some(engine.run()?)
        };

        if let Some(result) = result {
            report_balance(&result);
            csv_export::export_hourly(
                output_dir.join("hourly.csv"),
                &config.year,
                &result.series,
            )?;
            if !config.seasons.is_empty() {
                let profiles = aggregate_series(&result.series, &config.seasons);
                csv_export::export_profiles(output_dir.join("seasonal.csv"), &profiles)?;
            }
            if !config.periods.is_empty() {
                let profiles = aggregate_series(&result.series, &config.periods);
                csv_export::export_profiles(output_dir.join("periods.csv"), &profiles)?;
            }
        }
    }

    // The routing results stand on their own; the station table goes out
    // even when no hourly series was supplied.
    let summaries = station_summaries(&stations, &routes, &grid, &config, &series);
    csv_export::export_summaries(output_dir.join("stations.csv"), &summaries)?;

    let diagnostics = logging::drain_diagnostics();
    if !diagnostics.is_empty() {
        println!("{} diagnostics recorded during the run", diagnostics.len());
    }

    Ok(())
}

fn station_bar(total: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn report_balance(result: &BalanceResult) {
    println!(
        "Load {:.1} MWh, generation {:.1} MWh, shortfall {:.1} MWh, excess {:.1} MWh",
        result.total_load, result.total_generation, result.total_shortfall, result.total_excess
    );
    if result.total_storage_used > 0.0 || result.total_charge_in > 0.0 {
        println!(
            "Storage: {:.1} MWh absorbed, {:.1} MWh delivered, carry {:.1} -> {:.1} MWh",
            result.total_charge_in,
            result.total_storage_used,
            result.carry_initial,
            result.carry_final
        );
    }
}
