use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use policygap_core::documents::extract::AutoExtractor;
use policygap_core::evidence::logs::CsvLogLoader;
use policygap_core::oracle::interface::Oracle;
use policygap_core::oracle::scripted::ScriptedOracle;
use policygap_core::report::render::{
    cited_lines, format_line_ranges, render_report_json, render_report_markdown,
};
use policygap_core::run::config::RunConfig;
use policygap_core::run::manager::PipelineRunner;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gap_runner", about = "Audit a target policy against a baseline using log evidence")]
struct Args {
    /// JSON run configuration; explicit flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    threat: Option<String>,

    /// CSV glob; wildcards only in the file name.
    #[arg(long = "logs")]
    log_glob: Option<String>,

    /// Policy document path (repeatable).
    #[arg(long = "policy")]
    policies: Vec<String>,

    #[arg(long)]
    baseline: Option<String>,

    #[arg(long)]
    target: Option<String>,

    #[arg(long = "max-policies")]
    max_policies: Option<usize>,

    #[arg(long, default_value = "http://127.0.0.1:11434")]
    oracle_endpoint: String,

    #[arg(long, default_value = "llama3.1")]
    model: String,

    #[arg(long, default_value_t = 120)]
    oracle_timeout_secs: u64,

    /// JSON array of canned oracle responses, replayed in order instead of a live model.
    #[arg(long)]
    replay: Option<PathBuf>,

    #[arg(long)]
    report_out: Option<PathBuf>,

    #[arg(long)]
    json_out: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let threat = args
                .threat
                .clone()
                .ok_or_else(|| anyhow!("--threat is required without --config"))?;
            RunConfig::new(threat, args.policies.clone())
        }
    };
    if let Some(threat) = &args.threat {
        cfg.threat = threat.clone();
    }
    if let Some(glob) = &args.log_glob {
        cfg.log_glob = glob.clone();
    }
    if args.config.is_some() && !args.policies.is_empty() {
        cfg.policy_paths = args.policies.clone();
    }
    if let Some(max) = args.max_policies {
        cfg.max_policy_choices = max;
    }
    match (&args.baseline, &args.target) {
        (Some(b), Some(t)) => cfg.selected_policy_paths = Some(vec![b.clone(), t.clone()]),
        (None, None) => {}
        _ => bail!("--baseline and --target must be given together"),
    }
    cfg.validate()?;
    Ok(cfg)
}

fn build_oracle(args: &Args) -> Result<Box<dyn Oracle>> {
    if let Some(path) = &args.replay {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay file {}", path.display()))?;
        let responses: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("replay file {} must be a JSON array of strings", path.display()))?;
        info!(responses = responses.len(), "replaying canned oracle responses");
        return Ok(Box::new(ScriptedOracle::new(responses)));
    }
    live_oracle(args)
}

#[cfg(feature = "ollama")]
fn live_oracle(args: &Args) -> Result<Box<dyn Oracle>> {
    use policygap_core::oracle::ollama::OllamaOracle;
    let timeout = std::time::Duration::from_secs(args.oracle_timeout_secs);
    let oracle = OllamaOracle::new(&args.oracle_endpoint, &args.model, Some(timeout))?;
    Ok(Box::new(oracle))
}

#[cfg(not(feature = "ollama"))]
fn live_oracle(_args: &Args) -> Result<Box<dyn Oracle>> {
    bail!("no live oracle in this build (enable the `ollama` feature or pass --replay)")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = build_config(&args)?;
    let oracle = build_oracle(&args)?;
    let mut runner = PipelineRunner::new(oracle.as_ref(), &AutoExtractor, &CsvLogLoader, &cfg);
    if args.replay.is_some() {
        runner = runner.with_run_id(cfg.deterministic_run_id()?);
    }

    let outcome = match runner.run_config(&cfg)? {
        Ok(outcome) => outcome,
        Err(failure) => {
            error!(stage = failure.stage.name(), error = %failure.error, "run failed");
            for event in failure.journal.events() {
                eprintln!("JOURNAL {} {}", event.event_type, event.details);
            }
            return Err(failure.into());
        }
    };
    outcome.journal.verify_chain()?;

    let state = &outcome.state;
    let baseline = state.baseline_policy.as_deref().unwrap_or("Policy A");
    let target = state.target_policy.as_deref().unwrap_or("Policy B");
    println!("RUN {} baseline={} target={}", outcome.journal.run_id(), baseline, target);
    for gap in state.policy_gaps_structured.as_deref().unwrap_or(&[]) {
        println!(
            "GAP {} | {} | A={} | B={}",
            if gap.verified { "VERIFIED" } else { "UNVERIFIED" },
            gap.title,
            format_line_ranges(&cited_lines(&gap.refs.baseline), "n/a"),
            format_line_ranges(&cited_lines(&gap.refs.target), "missing"),
        );
    }

    let markdown = render_report_markdown(state);
    match &args.report_out {
        Some(path) => std::fs::write(path, &markdown)
            .with_context(|| format!("writing report {}", path.display()))?,
        None => println!("\n{markdown}"),
    }
    if let Some(path) = &args.json_out {
        std::fs::write(path, render_report_json(state)?)
            .with_context(|| format!("writing json {}", path.display()))?;
    }
    Ok(())
}
