//! SeaORM entities for the feature gating data model

pub mod feature_types;
pub mod features;
pub mod tlos;
