use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use winpan_config::WinpanConfig;
use winpan_core::alloc::Arena;
use winpan_core::process::{Pid, ProcFs, ProcessTree};
use winpan_simulator::{replay_and_validate, ReplayEngine, Scenario};
use winpan_telemetry::MetricsRecorder;

#[derive(Parser)]
#[command(name = "winpan", version, about)]
pub struct Cli {
    /// Configuration file (defaults to config/winpan.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the process tree scanned from the process filesystem
    Tree(TreeArgs),
    /// Print a process and all of its descendants, pre-order
    Descendants(DescendantsArgs),
    /// Replay a scenario through the panning controller
    Simulate(SimulateArgs),
    /// Write a generated scenario to a file
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Only print the subtree under this pid
    #[arg(long)]
    pub root: Option<Pid>,
}

#[derive(Args, Debug, Clone)]
pub struct DescendantsArgs {
    pub pid: Pid,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scenario file to replay; a generated scenario is used otherwise.
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,
    /// Number of window moves to generate (used when no scenario is provided)
    #[arg(long, default_value_t = 100)]
    pub events: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    #[arg(long)]
    pub validate_hash: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(short, long)]
    pub output: PathBuf,
    #[arg(long, default_value_t = 100)]
    pub events: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

fn scan<'a>(config: &WinpanConfig, arena: &'a Arena) -> anyhow::Result<ProcessTree<'a>> {
    let source = ProcFs::new(&config.core.process.proc_root);
    ProcessTree::scan(arena, &source, config.core.process.index_exponent).with_context(|| {
        format!(
            "scanning {} into a {} byte arena",
            config.core.process.proc_root.display(),
            config.core.memory.arena_size
        )
    })
}

pub fn print_tree(
    config: &WinpanConfig,
    args: TreeArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let arena = Arena::with_capacity(config.core.memory.arena_size);
    let tree = scan(config, &arena)?;
    debug!(nodes = tree.node_count(), pairs = tree.count(), "scan complete");
    out.write_all(tree.render(args.root).as_bytes())?;
    Ok(())
}

pub fn print_descendants(
    config: &WinpanConfig,
    args: DescendantsArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let arena = Arena::with_capacity(config.core.memory.arena_size);
    let tree = scan(config, &arena)?;
    let pids = tree.descendants(args.pid)?;
    let line: Vec<String> = pids.iter().map(Pid::to_string).collect();
    writeln!(out, "{}", line.join(" "))?;
    Ok(())
}

pub fn simulate(
    config: &WinpanConfig,
    args: SimulateArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let scenario = match &args.scenario {
        Some(path) => {
            info!("Replaying scenario from file: {}", path.display());
            Scenario::load_from_file(path)?
        }
        None => {
            info!(seed = args.seed, events = args.events, "Replaying generated scenario");
            Scenario::generate(args.seed, args.events)
        }
    };

    let metrics = Arc::new(MetricsRecorder::new()?);
    let engine = ReplayEngine::with_metrics(scenario, config, Arc::clone(&metrics))?;
    let report = replay_and_validate(engine, args.validate_hash.as_deref())?;

    for command in &report.commands {
        writeln!(
            out,
            "sink_input={} volume={:?}",
            command.index, command.volume
        )?;
    }
    writeln!(
        out,
        "steps={} window_events={} adjustments={} restored={}",
        report.steps, report.window_events, report.adjustments, report.restored
    )?;
    writeln!(out, "state_hash={}", report.state_hash)?;

    if config.telemetry.metrics.dump_on_exit {
        debug!("metrics:\n{}", metrics.gather_metrics()?);
    }
    Ok(())
}

pub fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let scenario = Scenario::generate(args.seed, args.events);
    scenario.save_to_file(&args.output)?;
    info!(path = %args.output.display(), steps = scenario.steps.len(), "Scenario written");
    Ok(())
}
