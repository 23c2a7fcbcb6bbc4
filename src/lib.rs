//! Per-TLO feature gating with version-aware state and batch rollouts.

pub mod app_config;
pub mod constants;
pub mod db;
pub mod error;
pub mod features;
pub mod jobs;
pub mod notify;
pub mod orm;
pub mod store;
pub mod version;

pub use error::FeatureError;
pub use store::Store;
