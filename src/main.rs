use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;

use active_learner::config::{load_learner_config, LearnerConfig, ModelType, StrategyKind};
use active_learner::data_handling::{prepare, read_labeled_csv, synthetic_blobs, Dataset};
use active_learner::models::build_model;
use active_learner::oracle::{SimulatedOracle, TerminalOracle};
use active_learner::report::write_report;
use active_learner::runner::{run_session, RunSummary};
use active_learner::session::{Session, TeachOutcome};
use active_learner::shared::SharedSession;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(
            env_logger::Env::default().filter_or("ACTIVE_LEARNER_LOG", "error,active_learner=info"),
        )
        .init();

    let matches = Command::new("active-learner")
        .version(clap::crate_version!())
        .about("Pool-based active learning: label the samples your model is least sure about")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run an interactive (or simulated) active learning session")
                .arg(
                    Arg::new("config")
                        .help("Path to a JSON learner configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .help(
                            "Labelled CSV file (features first, integer label last). \
                             Defaults to a synthetic dataset described in the config.",
                        )
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("no_header")
                        .long("no-header")
                        .help("The CSV file has no header row.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("budget")
                        .short('b')
                        .long("budget")
                        .help("Maximum number of label queries. Overrides the config.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("strategy")
                        .short('s')
                        .long("strategy")
                        .help("Query strategy. Overrides the config.")
                        .value_parser(["uncertainty", "margin", "entropy"]),
                )
                .arg(
                    Arg::new("model_type")
                        .short('m')
                        .long("model-type")
                        .help("Classifier. Overrides the model type from the config.")
                        .value_parser(["gbdt", "knn"]),
                )
                .arg(
                    Arg::new("simulate")
                        .long("simulate")
                        .help("Answer queries with the withheld true labels instead of asking.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("report")
                        .short('r')
                        .long("report")
                        .help("Write an HTML report with the accuracy curve to this path.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(Command::new("config").about("Print the default configuration as JSON"))
        .get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => match handle_run(run_matches) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("Session failed: {:#}", e);
                std::process::exit(1)
            }
        },
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&LearnerConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn resolve_config(matches: &ArgMatches) -> Result<LearnerConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("Using config: {:?}", path);
            load_learner_config(path)?
        }
        None => LearnerConfig::default(),
    };

    if let Some(&budget) = matches.get_one::<usize>("budget") {
        config.budget = budget;
    }
    if let Some(strategy) = matches.get_one::<String>("strategy") {
        config.strategy = StrategyKind::from_str(strategy).map_err(anyhow::Error::msg)?;
    }
    if let Some(model_type) = matches.get_one::<String>("model_type") {
        config.model.model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
    }

    if matches.get_one::<PathBuf>("config").is_none() {
        let json = serde_json::to_string_pretty(&config).unwrap_or_default();
        eprintln!("No config provided; using defaults:\n{}", json);
    }
    Ok(config)
}

fn load_data(matches: &ArgMatches, config: &LearnerConfig) -> Result<Dataset> {
    match matches.get_one::<PathBuf>("data") {
        Some(path) => read_labeled_csv(path, !matches.get_flag("no_header")),
        None => {
            log::info!("No dataset given; generating synthetic blobs");
            let mut rng = StdRng::seed_from_u64(config.random_seed);
            synthetic_blobs(&config.synthetic, &mut rng)
        }
    }
}

fn handle_run(matches: &ArgMatches) -> Result<()> {
    let config = resolve_config(matches)?;
    let data = load_data(matches, &config)?;
    data.log_summary("Dataset");

    let (params, truth) = prepare(&data, &config)?.into_session_params(&config);
    let model = build_model(config.model.clone());
    let session = SharedSession::new(Session::new(params, model)?);

    let status = session.status();
    println!(
        "Session ready: pool of {}, budget {}, baseline accuracy {:.4}",
        status.pool_size,
        status.budget,
        session.accuracy_history().first().copied().unwrap_or_default()
    );

    let history_limit = config.history_limit;
    let on_step =
        |outcome: &TeachOutcome, session: &SharedSession| print_step(outcome, session, history_limit);

    let summary = if matches.get_flag("simulate") {
        let mut oracle = SimulatedOracle::new(truth);
        run_session(&session, &mut oracle, on_step)?
    } else {
        let stdin = io::stdin();
        let mut oracle = TerminalOracle::new(stdin.lock(), io::stdout());
        run_session(&session, &mut oracle, on_step)?
    };
    print_summary(&summary);

    if let Some(path) = matches.get_one::<PathBuf>("report") {
        write_report(path, &session.snapshot(), &config)?;
    }
    Ok(())
}

fn print_step(outcome: &TeachOutcome, session: &SharedSession, history_limit: usize) {
    println!(
        "Accuracy after {} queries: {:.4} ({})",
        outcome.queries_completed, outcome.accuracy, outcome.state
    );
    let recent: Vec<String> = session
        .history(history_limit)
        .iter()
        .map(|e| format!("{}={}", e.sample_id, e.label))
        .collect();
    println!("Recent labels: {}", recent.join(", "));
}

fn print_summary(summary: &RunSummary) {
    if summary.stopped_early {
        println!(
            "Stopped after {} queries; session left {}.",
            summary.queries_completed, summary.final_state
        );
    } else {
        println!("Finished after {} queries.", summary.queries_completed);
    }
    let curve: Vec<String> = summary.accuracy.iter().map(|a| format!("{:.3}", a)).collect();
    println!("Accuracy history: [{}]", curve.join(", "));
}
