//! Feature gating per TLO
//!
//! A feature row materializes the state of one (owner, feature type)
//! pairing. States are `ENABLED`, `PRE_ENABLED`, and the implicit off state
//! when no row exists.

pub mod engine;
pub mod operator;
pub mod queries;
pub mod state;

use crate::orm::features::OwnerKind;
use serde::Serialize;

/// Tagged reference to the entity owning a feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeatureOwner {
    Tlo(i32),
}

impl FeatureOwner {
    pub fn kind(&self) -> OwnerKind {
        match self {
            FeatureOwner::Tlo(_) => OwnerKind::Tlo,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            FeatureOwner::Tlo(id) => *id,
        }
    }
}

impl From<&crate::orm::tlos::Model> for FeatureOwner {
    fn from(tlo: &crate::orm::tlos::Model) -> Self {
        FeatureOwner::Tlo(tlo.id)
    }
}

impl std::fmt::Display for FeatureOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureOwner::Tlo(id) => write!(f, "tlo {}", id),
        }
    }
}
