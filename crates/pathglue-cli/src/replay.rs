use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pathglue_config::{log_cli_info, log_tracker_debug, log_tracker_info, Config};
use pathglue_tracker::{read_trace, InodeTracker, NameString, TraceOutcome};

#[derive(Args)]
pub struct ReplayArgs {
    /// Trace file (JSON Lines)
    #[arg(value_name = "FILE")]
    pub trace: PathBuf,

    /// Print final statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the remaining tracked entries after the replay
    #[arg(long)]
    pub dump: bool,
}

pub fn run(args: ReplayArgs, config: &Config) -> Result<()> {
    let file = File::open(&args.trace)
        .with_context(|| format!("failed to open {}", args.trace.display()))?;
    let events = read_trace(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", args.trace.display()))?;
    log_cli_info!("Replaying trace", events = events.len());

    let tracker = InodeTracker::with_capacity(config.tracker.initial_capacity);
    for event in &events {
        let outcome = event.apply(&tracker);
        log_tracker_debug!("Applied event", outcome = tracing::field::debug(&outcome));
        if let Some(line) = format_outcome(&outcome) {
            println!("{}", line);
        }
    }

    let stats = tracker.statistics();
    log_tracker_info!(
        "Replay finished",
        entries = tracker.len(),
        inserts = stats.inserts,
        removes = stats.removes
    );

    if args.dump {
        print!("{}", tracker.debug_dump());
    }
    if args.json {
        let mut value = serde_json::to_value(stats)?;
        value["string_overflows"] = NameString::num_overflows().into();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", stats);
        println!("string overflows:      {}", NameString::num_overflows());
    }
    Ok(())
}

/// One output line per query-like event; mutations stay silent unless rejected.
fn format_outcome(outcome: &TraceOutcome) -> Option<String> {
    match outcome {
        TraceOutcome::Get {
            inode,
            accepted: false,
        } => Some(format!("get {}\trejected (parent not tracked)", inode)),
        TraceOutcome::Find { inode, lookup } if lookup.found => {
            Some(format!("find {}\t{}", inode, display_path(&lookup.path.to_string())))
        }
        TraceOutcome::Find { inode, lookup } if !lookup.path.is_empty() => {
            Some(format!("find {}\tpartial {}", inode, lookup.path))
        }
        TraceOutcome::Find { inode, .. } => Some(format!("find {}\tmiss", inode)),
        _ => None,
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
