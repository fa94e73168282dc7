// src/config.rs  -  Runtime configuration (CLI + TOML)
use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::acp::{BandTable, SpeedBand, TimeCalculator};
use crate::calc::Policy;

/// The example config is embedded directly in the binary at compile time.
/// Users can write it out with:  brevet-times --write-config
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml.example");

// ── CLI ───────────────────────────────────────────────────────────────────────
#[derive(Parser, Debug, Default)]
#[command(
    name        = "brevet-times",
    about       = "ACP brevet control open/close time calculator",
    version,
)]
pub struct Cli {
    /// Config file path (default: ~/.config/brevet-times/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Control distance(s) in km, e.g. --km 0,60,150,200
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub km: Vec<f64>,

    /// Nominal brevet distance in km: 200 | 300 | 400 | 600 | 1000
    #[arg(long)]
    pub brevet: Option<f64>,

    /// Brevet start, YYYY-MM-DDTHH:MM (default: now)
    #[arg(long)]
    pub start: Option<String>,

    /// UTC offset the start time is read in, e.g. -08:00
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Serve GET /_calc_times instead of computing from the command line
    #[arg(long, action)]
    pub serve: bool,

    /// Bind address for --serve (default: 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port for --serve (default: 5000)
    #[arg(long)]
    pub port: Option<u16>,

    /// Debug logging
    #[arg(long, action)]
    pub debug: bool,

    /// Write the built-in default config.toml to the config path and exit.
    /// Use --config <PATH> to write to a custom location.
    #[arg(long, action)]
    pub write_config: bool,

    /// Print the built-in default config.toml to stdout and exit
    #[arg(long, action)]
    pub print_config: bool,
}

// ── TOML file structure ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub server: Option<ServerCfg>,
    pub calc:   Option<CalcCfg>,
    pub bands:  Option<BandsCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCfg {
    pub host:  Option<String>,
    pub port:  Option<u16>,
    pub debug: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcCfg {
    pub utc_offset:              Option<String>,
    pub reject_beyond_brevet:    Option<bool>,
    pub strict_brevet_distances: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandsCfg {
    /// Maximum speeds → open times
    pub max_speed: Option<Vec<SpeedBand>>,
    /// Minimum speeds → close times
    pub min_speed: Option<Vec<SpeedBand>>,
}

// ── Resolved / merged config ──────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host:       String,
    pub port:       u16,
    pub debug:      bool,
    pub policy:     Policy,
    pub max_speeds: BandTable,
    pub min_speeds: BandTable,
    /// File the settings were read from, if any
    pub source:     Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host:       "0.0.0.0".into(),
            port:       5000,
            debug:      false,
            policy:     Policy::default(),
            max_speeds: BandTable::acp_max(),
            min_speeds: BandTable::acp_min(),
            source:     None,
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────────────
impl AppConfig {
    /// Write the embedded default config to disk.
    /// Returns the path it was written to.
    pub fn write_default_config(cli: &Cli) -> Result<PathBuf> {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {:?}", parent))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Writing config to {:?}", path))?;
        Ok(path)
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::default();

        // 1. Load TOML file
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading config {:?}", path))?;
            let fc: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("Parsing config {:?}", path))?;
            cfg.apply_file(&fc)
                .with_context(|| format!("Invalid config {:?}", path))?;
            cfg.source = Some(path);
        } else if cli.config.is_some() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }

        // 2. Apply CLI overrides
        cfg.apply_cli(cli)?;
        Ok(cfg)
    }

    pub fn calculator(&self) -> TimeCalculator {
        TimeCalculator::new(self.max_speeds.clone(), self.min_speeds.clone())
    }

    fn apply_file(&mut self, fc: &FileConfig) -> Result<()> {
        if let Some(s) = &fc.server {
            if let Some(v) = &s.host  { self.host  = v.clone(); }
            if let Some(v) = s.port   { self.port  = v; }
            if let Some(v) = s.debug  { self.debug = v; }
        }
        if let Some(c) = &fc.calc {
            if let Some(v) = &c.utc_offset              { self.policy.utc_offset = parse_offset(v)?; }
            if let Some(v) = c.reject_beyond_brevet     { self.policy.reject_beyond_brevet = v; }
            if let Some(v) = c.strict_brevet_distances  { self.policy.strict_brevet_distances = v; }
        }
        if let Some(b) = &fc.bands {
            if let Some(v) = &b.max_speed {
                self.max_speeds = BandTable::new(v.clone()).context("[bands] max_speed")?;
            }
            if let Some(v) = &b.min_speed {
                self.min_speeds = BandTable::new(v.clone()).context("[bands] min_speed")?;
            }
            // both walks must stop in the same band
            if !self.max_speeds.same_widths(&self.min_speeds) {
                anyhow::bail!("[bands] max_speed and min_speed must use the same band widths");
            }
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(v) = &cli.host       { self.host  = v.clone(); }
        if let Some(v) = cli.port        { self.port  = v; }
        if cli.debug                     { self.debug = true; }
        if let Some(v) = &cli.utc_offset { self.policy.utc_offset = parse_offset(v)?; }
        Ok(())
    }
}

/// "+02:00", "-0800", "Z" / "UTC"
pub fn parse_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    s.parse::<FixedOffset>()
        .map_err(|e| anyhow::anyhow!("utc_offset {s:?}: {e}"))
}

fn default_config_path() -> PathBuf {
    dirs_next().join("brevet-times").join("config.toml")
}

fn dirs_next() -> PathBuf {
    if let Ok(v) = std::env::var("XDG_CONFIG_HOME") { return PathBuf::from(v); }
    if let Ok(v) = std::env::var("APPDATA")          { return PathBuf::from(v); }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".config")
}
