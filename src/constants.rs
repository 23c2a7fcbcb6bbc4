//! Application-wide constants

/// Feature types that cannot be safely enabled by adding a feature row.
/// Used as the default for `features.unsafe_names`.
pub const DEFAULT_UNSAFE_FEATURES: &[&str] = &["place_holder"];

/// Queue the external dispatcher routes enabler jobs to
pub const ENABLER_QUEUE: &str = "feature_batch_enabler";

/// Queue the external dispatcher routes disabler jobs to
pub const DISABLER_QUEUE: &str = "feature_batch_disabler";

/// Log event wrapping each per-TLO enable
pub const ENABLE_EVENT: &str = "job.feature_enable";

/// Log event wrapping each per-TLO disable
pub const DISABLE_EVENT: &str = "job.feature_disable";
