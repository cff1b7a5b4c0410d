use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fishery::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    /// Override a config.toml setting, e.g. `--set fishing_policy=quota:25`.
    #[arg(long = "set", value_parser = parse_override)]
    overrides: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create {
        #[arg(long, default_value_t = 1)]
        runs: usize,
    },

    Analyze,

    Clean,
}

fn parse_override(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected `name=value`, got {arg:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(&args.sim_dir, &args.overrides).context("failed to construct mgr")?;

    match args.command {
        Command::Create { runs } => mgr.create_runs(runs)?,
        Command::Analyze => mgr.analyze_sim()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
