use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::gbdt::GBDTClassifier;
use crate::models::knn::KNNClassifier;

/// Build a boxed, unfitted classifier model from a `ModelConfig`.
pub fn build_model(params: ModelConfig) -> Box<dyn ClassifierModel> {
    match params.model_type {
        ModelType::GBDT { .. } => Box::new(GBDTClassifier::new(params)),
        ModelType::KNN {
            k,
            distance_weighted,
        } => Box::new(KNNClassifier::new(k, distance_weighted)),
    }
}
