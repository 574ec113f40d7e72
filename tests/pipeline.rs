//! End-to-end runs: config, data preparation, simulated labelling and report.

use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;

use active_learner::config::{load_learner_config, LearnerConfig, ModelType, StrategyKind};
use active_learner::data_handling::{prepare, read_labeled_csv, synthetic_blobs};
use active_learner::models::build_model;
use active_learner::oracle::SimulatedOracle;
use active_learner::report::write_report;
use active_learner::runner::run_session;
use active_learner::session::{Session, SessionState};
use active_learner::shared::SharedSession;

fn small_config(model_type: ModelType, strategy: StrategyKind) -> LearnerConfig {
    let mut config = LearnerConfig::default();
    config.model.model_type = model_type;
    config.strategy = strategy;
    config.budget = 6;
    config.n_initial = 10;
    config.label_space = vec![0, 1, 2];
    config.synthetic.n_classes = 3;
    config.synthetic.samples_per_class = 20;
    config.synthetic.n_features = 4;
    config
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn partial_config_file_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "budget": 3,
            "strategy": "margin",
            "model": {{ "learning_rate": 0.1, "KNN": {{ "k": 5, "distance_weighted": true }} }}
        }}"#
    )
    .unwrap();

    let config = load_learner_config(file.path()).unwrap();
    assert_eq!(config.budget, 3);
    assert_eq!(config.strategy, StrategyKind::Margin);
    assert_eq!(
        config.model.model_type,
        ModelType::KNN {
            k: 5,
            distance_weighted: true
        }
    );
    assert_eq!(config.label_space, LearnerConfig::default().label_space);
    assert_eq!(config.history_limit, 5);
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_learner_config(dir.path().join("nope.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read config"));
}

// ---------------------------------------------------------------------------
// Simulated runs
// ---------------------------------------------------------------------------

fn simulated_run(config: &LearnerConfig) -> (SharedSession, active_learner::runner::RunSummary) {
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let data = synthetic_blobs(&config.synthetic, &mut rng).unwrap();
    let (params, truth) = prepare(&data, config).unwrap().into_session_params(config);
    let pool_size = params.pool.len();
    assert_eq!(truth.len(), pool_size);

    let session = SharedSession::new(Session::new(params, build_model(config.model.clone())).unwrap());
    let mut oracle = SimulatedOracle::new(truth);
    let summary = run_session(&session, &mut oracle, |_, _| {}).unwrap();
    assert_eq!(session.status().pool_size, pool_size - config.budget);
    (session, summary)
}

#[test]
fn knn_run_reaches_budget_with_each_strategy() {
    for strategy in [
        StrategyKind::Uncertainty,
        StrategyKind::Margin,
        StrategyKind::Entropy,
    ] {
        let config = small_config(
            ModelType::KNN {
                k: 3,
                distance_weighted: false,
            },
            strategy,
        );
        let (_, summary) = simulated_run(&config);
        assert_eq!(summary.queries_completed, config.budget);
        assert_eq!(summary.final_state, SessionState::Finished);
        assert_eq!(summary.accuracy.len(), config.budget + 1);
        assert!(summary.accuracy.iter().all(|a| (0.0..=1.0).contains(a)));
        assert!(!summary.stopped_early);
    }
}

#[test]
fn gbdt_run_reaches_budget() {
    let mut config = small_config(ModelType::default(), StrategyKind::Entropy);
    config.budget = 3;
    if let ModelType::GBDT {
        num_boost_round, ..
    } = &mut config.model.model_type
    {
        *num_boost_round = 5;
    }
    let (_, summary) = simulated_run(&config);
    assert_eq!(summary.queries_completed, 3);
    assert_eq!(summary.accuracy.len(), 4);
}

#[test]
fn same_seed_gives_same_queries() {
    let config = small_config(
        ModelType::KNN {
            k: 3,
            distance_weighted: true,
        },
        StrategyKind::Uncertainty,
    );
    let (a, _) = simulated_run(&config);
    let (b, _) = simulated_run(&config);
    let ids = |s: &SharedSession| -> Vec<_> { s.history(10).iter().map(|e| e.sample_id).collect() };
    assert_eq!(ids(&a), ids(&b));
}

// ---------------------------------------------------------------------------
// CSV input and report output
// ---------------------------------------------------------------------------

#[test]
fn csv_run_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("data.csv");
    let mut csv = std::fs::File::create(&csv_path).unwrap();
    writeln!(csv, "f1,f2,label").unwrap();
    for i in 0..40 {
        let label = i % 2;
        let base = if label == 0 { 0.0 } else { 5.0 };
        writeln!(csv, "{},{},{}", base + (i % 5) as f32 * 0.1, base - (i % 3) as f32 * 0.1, label)
            .unwrap();
    }
    drop(csv);

    let mut config = small_config(
        ModelType::KNN {
            k: 3,
            distance_weighted: false,
        },
        StrategyKind::Margin,
    );
    config.label_space = vec![0, 1];
    config.budget = 4;
    config.n_initial = 6;

    let data = read_labeled_csv(&csv_path, true).unwrap();
    assert_eq!(data.len(), 40);
    let (params, truth) = prepare(&data, &config).unwrap().into_session_params(&config);
    let session = SharedSession::new(Session::new(params, build_model(config.model.clone())).unwrap());
    run_session(&session, &mut SimulatedOracle::new(truth), |_, _| {}).unwrap();

    let report_path = dir.path().join("report.html");
    write_report(&report_path, &session.snapshot(), &config).unwrap();
    let html = std::fs::read_to_string(&report_path).unwrap();
    assert!(html.contains("Active Learning Report"));
    assert!(html.contains("Model Accuracy"));
    assert!(html.contains("margin"));
    assert!(html.contains("4 / 4"));
}
