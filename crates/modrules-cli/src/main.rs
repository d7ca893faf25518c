//! modrules CLI -- resolve a module descriptor tree into a build plan.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use modrules_core::prelude::*;
use modrules_loader::{load_tree, LoadedTree, LoaderConfig};

/// modrules: module dependency descriptor resolver
///
/// Reads `*.module.json` descriptors under a root directory, validates them
/// and prints the ordered build plan.
#[derive(Debug, Parser)]
#[command(name = "modrules")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output (can be repeated: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the build plan as JSON.
    #[command(visible_alias = "r")]
    Resolve(TreeArgs),

    /// Validate and resolve, printing only a summary line.
    Check(TreeArgs),

    /// Print every static dependency edge.
    Graph(TreeArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Root directory of the descriptor tree.
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// Additional external module (repeatable). Added to those in
    /// `modrules.json`.
    #[arg(long = "external", value_name = "NAME")]
    externals: Vec<String>,

    /// Override the session default PCH mode.
    #[arg(long, value_name = "MODE")]
    default_pch: Option<PchUsage>,

    /// Descriptor file suffix.
    #[arg(long, value_name = "SUFFIX", default_value = "module.json")]
    extension: String,

    /// Only read descriptors directly under ROOT.
    #[arg(long)]
    no_recursive: bool,

    /// Allow descriptor file names that differ from the module name.
    #[arg(long)]
    lenient_names: bool,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

impl TreeArgs {
    fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            extension: self.extension.clone(),
            recursive: !self.no_recursive,
            check_file_names: !self.lenient_names,
        }
    }

    fn load(&self) -> anyhow::Result<LoadedTree> {
        let mut tree = load_tree(&self.root, &self.loader_config())
            .with_context(|| format!("loading descriptor tree {}", self.root.display()))?;
        tree.session.external_modules.extend(self.externals.iter().cloned());
        if let Some(mode) = self.default_pch {
            tree.session.default_pch = Some(mode);
        }
        Ok(tree)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_tree(args: &TreeArgs) -> anyhow::Result<BuildPlan> {
    let tree = args.load()?;
    let root = tree.root.clone();
    let mut session = tree.into_session()?;
    session
        .resolve()
        .with_context(|| format!("resolving {}", root.display()))?;
    let plan = session.into_plan()?;
    tracing::info!(
        root = %root.display(),
        modules = plan.len(),
        externals = plan.externals.len(),
        "plan ready"
    );
    Ok(plan)
}

fn print_json(
    out: &mut impl Write,
    value: &impl serde::Serialize,
    pretty: bool,
) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

fn run_resolve(args: &TreeArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let plan = resolve_tree(args)?;
    print_json(out, &plan, args.pretty)
}

fn run_check(args: &TreeArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let plan = resolve_tree(args)?;
    writeln!(
        out,
        "ok: {} modules, {} external, fingerprint {}",
        plan.len(),
        plan.externals.len(),
        plan.fingerprint()
    )?;
    Ok(())
}

fn run_graph(args: &TreeArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let tree = args.load()?;
    let set = validate(tree.descriptors, &tree.session.externals())
        .with_context(|| format!("validating {}", tree.root.display()))?;
    let graph = DependencyGraph::from_validated(&set)?;
    for edge in graph.edges() {
        writeln!(out, "{} -> {} ({})", edge.from, edge.to, edge.visibility)?;
    }
    Ok(())
}

fn run(command: &Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Resolve(args) => run_resolve(args, out),
        Command::Check(args) => run_check(args, out),
        Command::Graph(args) => run_graph(args, out),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut out = std::io::stdout().lock();
    match run(&cli.command, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
