use anyhow::Result;
use tracing::{info, info_span};

use viewmap_cli::replay::{ReplayOptions, ReplayReport, replay};
use viewmap_cli::scenario::{Scenario, ScenarioStats};

use crate::cli::{CheckArgs, ReplayArgs};

pub fn run_replay(args: &ReplayArgs) -> Result<ReplayReport> {
    let span = info_span!("replay", scenario = %args.scenario.display());
    let _guard = span.enter();
    let scenario = Scenario::from_path(&args.scenario)?;
    let options = ReplayOptions {
        sink: args.sink.into(),
        no_animate: args.no_animate,
    };
    let report = replay(&scenario, &options)?;
    info!(
        steps = report.steps.len(),
        batches = report.batch_count(),
        rejected = report.rejected_batches(),
        "Replay finished"
    );
    Ok(report)
}

pub fn run_check(args: &CheckArgs) -> Result<(Scenario, ScenarioStats)> {
    let span = info_span!("check", scenario = %args.scenario.display());
    let _guard = span.enter();
    let scenario = Scenario::from_path(&args.scenario)?;
    let stats = scenario.validate()?;
    info!(steps = stats.steps, commits = stats.commits, "Scenario is valid");
    Ok((scenario, stats))
}
