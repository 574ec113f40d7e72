pub mod gbdt;
pub mod knn;

pub mod classifier_trait;
pub mod factory;

pub use classifier_trait::ClassifierModel;
pub use factory::build_model;
