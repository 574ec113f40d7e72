use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Central configuration for models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    /// One-vs-rest gradient boosted trees, one booster per class.
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
    /// k-nearest neighbours on euclidean distance.
    KNN { k: usize, distance_weighted: bool },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 6,
            num_boost_round: 20,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::GBDT { .. } => "gbdt",
            ModelType::KNN { .. } => "knn",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            "knn" => Ok(ModelType::KNN {
                k: 5,
                distance_weighted: false,
            }),
            _ => Err(format!("Unknown model type: {}. Expected one of: gbdt, knn", s)),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Which informativeness measure the session uses to pick queries.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Uncertainty,
    Margin,
    Entropy,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Uncertainty => "uncertainty",
            StrategyKind::Margin => "margin",
            StrategyKind::Entropy => "entropy",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uncertainty" => Ok(StrategyKind::Uncertainty),
            "margin" => Ok(StrategyKind::Margin),
            "entropy" => Ok(StrategyKind::Entropy),
            _ => Err(format!(
                "Unknown query strategy: {}. Expected one of: uncertainty, margin, entropy",
                s
            )),
        }
    }
}

/// Parameters of the built-in synthetic dataset, used when no CSV is given.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SyntheticConfig {
    pub n_classes: usize,
    pub samples_per_class: usize,
    pub n_features: usize,
    /// Half-width of the uniform jitter added around each class centre.
    pub spread: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_classes: 10,
            samples_per_class: 60,
            n_features: 64,
            spread: 6.0,
        }
    }
}

/// Everything needed to prepare data and run one active learning session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearnerConfig {
    pub model: ModelConfig,
    pub strategy: StrategyKind,
    /// Maximum number of label queries.
    pub budget: usize,
    /// Valid label values.
    pub label_space: Vec<i32>,
    /// Size of the randomly drawn labelled seed set.
    pub n_initial: usize,
    /// Fraction of the data held out for evaluation.
    pub test_fraction: f32,
    pub random_seed: u64,
    /// Number of recent label events shown after each step and in the report.
    pub history_limit: usize,
    pub synthetic: SyntheticConfig,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            strategy: StrategyKind::default(),
            budget: 10,
            label_space: (0..=9).collect(),
            n_initial: 100,
            test_fraction: 0.25,
            random_seed: 42,
            history_limit: 5,
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Load a learner configuration from a JSON file.
pub fn load_learner_config<P: AsRef<Path>>(path: P) -> Result<LearnerConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: LearnerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
