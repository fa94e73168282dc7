// src/main.rs  -  brevet-times  entry point
mod acp;
mod calc;
mod config;
#[cfg(feature = "server")]
mod server;

use anyhow::Result;
use clap::Parser;
use config::{AppConfig, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── --print-config  ───────────────────────────────────────────────────────
    if cli.print_config {
        print!("{}", config::DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    // ── --write-config  ───────────────────────────────────────────────────────
    if cli.write_config {
        let path = AppConfig::write_default_config(&cli)?;
        println!("Config written to: {}", path.display());
        println!("Edit it to change host/port, UTC offset or the ACP speed tables.");
        return Ok(());
    }

    // ── Load config ───────────────────────────────────────────────────────────
    let cfg = AppConfig::load(&cli)?;
    init_logging(cfg.debug);
    match &cfg.source {
        Some(p) => log::debug!("config: {}", p.display()),
        None    => log::debug!("no config file, using ACP defaults"),
    }
    log::debug!(
        "speed tables: {} max bands ({} km), {} min bands ({} km)",
        cfg.max_speeds.bands().len(),
        cfg.max_speeds.covered_km(),
        cfg.min_speeds.bands().len(),
        cfg.min_speeds.covered_km(),
    );

    // ── --serve  ──────────────────────────────────────────────────────────────
    if cli.serve {
        #[cfg(feature = "server")]
        { return server::run(&cfg); }
        #[cfg(not(feature = "server"))]
        { anyhow::bail!("server feature not compiled in."); }
    }

    // ── One-shot calculation ──────────────────────────────────────────────────
    if cli.km.is_empty() {
        anyhow::bail!("Nothing to do: pass --km <KM>[,<KM>...] (with --brevet/--start) or --serve");
    }
    let calculator = cfg.calculator();
    for &km in &cli.km {
        let query = calc::CalcQuery {
            km:             Some(km),
            brevet_dist_km: cli.brevet,
            begin_date:     cli.start.clone(),
        };
        let resp = calc::calc_times(&calculator, &cfg.policy, &query)?;
        println!("{}", serde_json::to_string(&resp)?);
    }
    Ok(())
}

/// `debug` raises the default filter; RUST_LOG still overrides it.
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
