//! Concurrent lookup/forget workload against a single tracker.
//!
//! Each worker repeatedly registers a private directory chain under a shared
//! root, resolves the leaf, tries a dangling lookup, and forgets the chain
//! ancestors-first so that the final forget cascades up to the root. After
//! all workers finish, only the root may remain.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use pathglue_config::{log_cli_error, log_stress_info, Config};
use pathglue_tracker::{InodeTracker, NameString, StatisticsSnapshot};

const ROOT_INODE: u64 = 1;

#[derive(Args)]
pub struct StressArgs {
    /// Worker threads (default: config, then available parallelism)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Rounds per worker
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Directory levels per round
    #[arg(short, long)]
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct StressPlan {
    pub threads: usize,
    pub iterations: u64,
    pub depth: u32,
}

impl StressPlan {
    fn resolve(args: &StressArgs, config: &Config) -> Self {
        let threads = args
            .threads
            .or(config.stress.threads)
            .unwrap_or_else(|| thread::available_parallelism().map_or(4, |n| n.get()))
            .max(1);
        Self {
            threads,
            iterations: args.iterations.unwrap_or(config.stress.iterations),
            depth: args.depth.unwrap_or(config.stress.depth).max(1),
        }
    }
}

pub fn run(args: StressArgs, config: &Config) -> Result<()> {
    let plan = StressPlan::resolve(&args, config);
    log_stress_info!(
        "Starting stress run",
        threads = plan.threads,
        iterations = plan.iterations,
        depth = plan.depth
    );

    let start = Instant::now();
    let tracker = Arc::new(InodeTracker::with_capacity(config.tracker.initial_capacity));
    let stats = execute(&tracker, plan)?;

    println!(
        "Stress run finished in {:?}: {} threads x {} rounds, depth {}",
        start.elapsed(),
        plan.threads,
        plan.iterations,
        plan.depth
    );
    println!("{}", stats);
    println!("string overflows:      {}", NameString::num_overflows());
    Ok(())
}

/// Run the workload and verify the tracker drained completely.
pub fn execute(tracker: &Arc<InodeTracker>, plan: StressPlan) -> Result<StatisticsSnapshot> {
    if !tracker.vfs_get(ROOT_INODE, 0, &NameString::new()) {
        bail!("root registration rejected");
    }

    let barrier = Arc::new(Barrier::new(plan.threads));
    let handles: Vec<_> = (0..plan.threads)
        .map(|t| {
            let tracker = tracker.clone();
            let barrier = barrier.clone();
            thread::spawn(move || worker(&tracker, &barrier, t as u64, plan))
        })
        .collect();

    let mut failures = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(e),
            Err(_) => bail!("stress worker panicked"),
        }
    }
    if let Some(first) = failures.into_iter().next() {
        log_cli_error!("Stress worker failed", error = tracing::field::display(&first));
        return Err(first);
    }

    if tracker.len() != 1 || tracker.references(ROOT_INODE) != Some(1) {
        log_cli_error!("Tracker not drained", entries = tracker.len());
        bail!("tracker not drained after stress run:\n{}", tracker.debug_dump());
    }
    tracker.vfs_put(ROOT_INODE, 1);

    let stats = tracker.statistics();
    if !tracker.is_empty() || stats.references != 0 || stats.inserts != stats.removes {
        bail!("unbalanced statistics after stress run:\n{}", stats);
    }
    Ok(stats)
}

fn worker(tracker: &InodeTracker, barrier: &Barrier, t: u64, plan: StressPlan) -> Result<()> {
    // Disjoint inode ranges per worker
    let base = (t + 1) << 32;
    let chain: Vec<(u64, u64, NameString)> = (0..u64::from(plan.depth))
        .map(|level| {
            let inode = base + level + 1;
            let parent = if level == 0 { ROOT_INODE } else { inode - 1 };
            let name = if level == 0 {
                format!("w{}", t)
            } else {
                format!("d{}", level)
            };
            (inode, parent, NameString::from(name.as_str()))
        })
        .collect();

    let expected: String = chain
        .iter()
        .map(|(_, _, name)| format!("/{}", name))
        .collect();
    let leaf = chain.last().map_or(ROOT_INODE, |(inode, _, _)| *inode);
    let dangling = base + u64::from(plan.depth) + 1;

    barrier.wait();

    for round in 0..plan.iterations {
        for (inode, parent, name) in &chain {
            if !tracker.vfs_get(*inode, *parent, name) {
                bail!("worker {} round {}: lookup of {} rejected", t, round, inode);
            }
        }

        let lookup = tracker.find(leaf);
        if !lookup.found || lookup.path.to_string() != expected {
            bail!(
                "worker {} round {}: resolved {:?}, expected {}",
                t,
                round,
                lookup.path,
                expected
            );
        }

        // Parent is never registered
        if tracker.vfs_get(dangling, dangling + 1, &NameString::from("ghost")) {
            bail!("worker {} round {}: dangling lookup accepted", t, round);
        }

        for (inode, _, _) in &chain {
            tracker.vfs_put(*inode, 1);
        }
        if tracker.contains(leaf) {
            bail!("worker {} round {}: leaf survived its last forget", t, round);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_drains_tracker() {
        let tracker = Arc::new(InodeTracker::new());
        let plan = StressPlan {
            threads: 4,
            iterations: 200,
            depth: 3,
        };

        let stats = execute(&tracker, plan).unwrap();
        assert!(tracker.is_empty());
        assert_eq!(stats.inserts, 1 + 4 * 200 * 3);
        assert_eq!(stats.removes, stats.inserts);
        assert_eq!(stats.dangling_attempts, 4 * 200);
        assert_eq!(stats.reconstruction_hits, 4 * 200);
    }

    #[test]
    fn test_plan_prefers_args_over_config() {
        let mut config = Config::default();
        config.stress.threads = Some(2);
        config.stress.iterations = 5;

        let args = StressArgs {
            threads: Some(8),
            iterations: None,
            depth: Some(0),
        };
        let plan = StressPlan::resolve(&args, &config);
        assert_eq!(plan.threads, 8);
        assert_eq!(plan.iterations, 5);
        assert_eq!(plan.depth, 1);
    }
}
