use crate::config::{Config, load_config};
use crate::forest::{Forest, TreeId};
use crate::geometry::Size;
use crate::history::daily_series;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::milestone::{CompletionRecord, ProgressAction};
use crate::outline::Outline;
use crate::tree::{NodeId, ProgressTree};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ptree", version, about = "Lay out and update milestone progress trees")]
pub struct Args {
    /// Input file (tree or outline JSON) or '-' for stdin
    #[arg(short = 'i', long = "input", global = true)]
    pub input: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the layout as JSON
    Layout {
        /// Output file. Defaults to stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Viewport width; the canvas is never narrower
        #[arg(short = 'w', long = "width")]
        width: Option<f64>,

        /// Viewport height
        #[arg(short = 'H', long = "height")]
        height: Option<f64>,
    },
    /// List the free insertion slots
    Slots,
    /// Record progress on one node and print the outcome
    Progress {
        #[arg(short = 'n', long = "node")]
        node: u64,

        /// New absolute amount (progressive milestones). Without it, one repetition is counted.
        #[arg(short = 'a', long = "amount")]
        amount: Option<f64>,

        /// Completion time (RFC 3339). Defaults to now.
        #[arg(long = "at")]
        at: Option<DateTime<Utc>>,

        /// Write the updated tree JSON here
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Print per-day completion counts
    History {
        /// Restrict to one node
        #[arg(short = 'n', long = "node")]
        node: Option<u64>,

        /// First day (YYYY-MM-DD). Defaults to six days before --to.
        #[arg(long = "from")]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD). Defaults to today.
        #[arg(long = "to")]
        to: Option<NaiveDate>,
    },
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;
    let tree = read_tree(&input, Utc::now())?;
    tracing::info!(tree = %tree.name, nodes = tree.node_count(), "tree loaded");

    match args.command {
        Command::Layout {
            output,
            width,
            height,
        } => {
            let viewport = viewport(width, height);
            let layout_config = config.layout.clone();
            let mut forest = Forest::new(config);
            forest.set_viewport(viewport);
            let id = forest.add_tree(tree);
            let (tree, layout) = laid_out(&forest, id)?;
            match output {
                Some(path) => write_layout_dump(&path, tree, layout, &layout_config)?,
                None => print_json(&LayoutDump::from_layout(tree, layout, &layout_config))?,
            }
        }
        Command::Slots => {
            let mut forest = Forest::new(config);
            let id = forest.add_tree(tree);
            print_json(&forest.insertion_points(id)?)?;
        }
        Command::Progress {
            node,
            amount,
            at,
            output,
        } => {
            let action = match amount {
                Some(value) => ProgressAction::SetAmount(value),
                None => ProgressAction::Step,
            };
            let mut forest = Forest::new(config);
            let id = forest.add_tree(tree);
            let outcome =
                forest.progress_milestone(id, NodeId(node), action, at.unwrap_or_else(Utc::now))?;
            print_json(&outcome)?;
            if let Some(path) = output {
                let (tree, _) = laid_out(&forest, id)?;
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("cannot write {}", path.display()))?;
                serde_json::to_writer_pretty(io::BufWriter::new(file), tree)?;
            }
        }
        Command::History { node, from, to } => {
            let today = Utc::now().with_timezone(&config.history.offset()).date_naive();
            let to = to.unwrap_or(today);
            let from = from.unwrap_or(to - Duration::days(6));
            let records = collect_records(&tree, node.map(NodeId))?;
            print_json(&daily_series(records, &config.history, from, to))?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// Accepts a serialized tree (an object with `nodes`) or an outline.
fn read_tree(input: &str, now: DateTime<Utc>) -> Result<ProgressTree> {
    let value: serde_json::Value = serde_json::from_str(input).context("input is not JSON")?;
    if value.get("nodes").is_some() {
        return serde_json::from_value(value).context("invalid tree");
    }
    let outline: Outline = serde_json::from_value(value).context("invalid outline")?;
    Ok(ProgressTree::from_outline(&outline, now)?)
}

fn viewport(width: Option<f64>, height: Option<f64>) -> Option<Size> {
    if width.is_none() && height.is_none() {
        return None;
    }
    Some(Size::new(width.unwrap_or(0.0), height.unwrap_or(0.0)))
}

fn laid_out(forest: &Forest, id: TreeId) -> Result<(&ProgressTree, &crate::layout::LayoutResult)> {
    let tree = forest
        .tree(id)
        .with_context(|| format!("{id} is missing"))?;
    let layout = forest
        .layout(id)
        .with_context(|| format!("{id} has no layout"))?;
    Ok((tree, layout))
}

fn collect_records(tree: &ProgressTree, node: Option<NodeId>) -> Result<Vec<&CompletionRecord>> {
    match node {
        Some(id) => Ok(tree.get(id)?.milestone.history().iter().collect()),
        None => Ok(tree
            .nodes()
            .flat_map(|n| n.milestone.history().iter())
            .collect()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
