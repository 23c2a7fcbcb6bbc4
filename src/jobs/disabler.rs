//! Rollback job that turns a feature off for a set of TLOs

use super::criteria::{DisableCriteria, DisableScope};
use super::{load_feature_type, logged, BatchJob};
use crate::constants::{DISABLER_QUEUE, DISABLE_EVENT};
use crate::error::FeatureError;
use crate::features::queries::{
    tlos_in_scope, tlos_on, tlos_on_or_pre_enabled, tlos_pre_enabled, StatusScope,
};
use crate::features::state::{disable, feature_for};
use crate::features::FeatureOwner;
use crate::notify::FragmentPublisher;
use crate::orm::{feature_types, tlos};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use validator::{Validate, ValidationErrors};

/// Deletes the feature row of every TLO matched by the criteria. TLOs
/// without a row are skipped.
pub struct BatchDisabler {
    feature_type: feature_types::Model,
    criteria: DisableCriteria,
    errors: ValidationErrors,
    tlos: Option<Vec<tlos::Model>>,
}

impl BatchDisabler {
    pub async fn new(
        db: &DatabaseConnection,
        feature_type_id: i32,
        raw_criteria: &str,
    ) -> Result<Self, FeatureError> {
        let feature_type = load_feature_type(db, feature_type_id).await?;
        Ok(Self {
            feature_type,
            criteria: DisableCriteria::new(raw_criteria),
            errors: ValidationErrors::new(),
            tlos: None,
        })
    }

    /// Build and save in one go. `Err` when the feature type does not exist.
    pub async fn perform(
        db: &DatabaseConnection,
        publisher: &dyn FragmentPublisher,
        feature_type_id: i32,
        raw_criteria: &str,
    ) -> Result<bool, FeatureError> {
        Self::new(db, feature_type_id, raw_criteria)
            .await?
            .save(db, publisher)
            .await
    }

    pub fn scope(&self) -> Option<DisableScope> {
        self.criteria.scope()
    }

    pub async fn save(
        &mut self,
        db: &DatabaseConnection,
        publisher: &dyn FragmentPublisher,
    ) -> Result<bool, FeatureError> {
        super::save(self, db, publisher).await
    }
}

#[async_trait]
impl BatchJob for BatchDisabler {
    fn queue(&self) -> &'static str {
        DISABLER_QUEUE
    }

    fn feature_type(&self) -> &feature_types::Model {
        &self.feature_type
    }

    fn validate_input(&self) -> Result<(), ValidationErrors> {
        self.criteria.validate()
    }

    fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    fn set_errors(&mut self, errors: ValidationErrors) {
        self.errors = errors;
    }

    async fn tlos(&mut self, txn: &DatabaseTransaction) -> Result<Vec<tlos::Model>, FeatureError> {
        if let Some(tlos) = &self.tlos {
            return Ok(tlos.clone());
        }

        let id = self.feature_type.id;
        let selected = match self.criteria.scope() {
            Some(DisableScope::On) => tlos_on(id, StatusScope::Any).all(txn).await?,
            Some(DisableScope::PreEnabled) => {
                tlos_pre_enabled(id, StatusScope::Any).all(txn).await?
            }
            Some(DisableScope::OnOrPreEnabled) => {
                tlos_on_or_pre_enabled(id, StatusScope::Any).all(txn).await?
            }
            Some(DisableScope::PreliveOrLive) => {
                tlos_in_scope(StatusScope::PreliveOrLive).all(txn).await?
            }
            None => Vec::new(),
        };

        self.tlos = Some(selected.clone());
        Ok(selected)
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        tlo: &tlos::Model,
        _publisher: &dyn FragmentPublisher,
    ) -> Result<(), FeatureError> {
        if let Some(feature) = feature_for(txn, FeatureOwner::from(tlo), self.feature_type.id).await? {
            logged(
                DISABLE_EVENT,
                tlo.id,
                &self.feature_type.name,
                disable(txn, feature),
            )
            .await?;
        }
        Ok(())
    }
}
