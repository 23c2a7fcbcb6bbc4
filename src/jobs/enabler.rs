//! Rollout jobs that turn a feature on for a subset of TLOs

use super::criteria::{CountCriteria, PercentageCriteria};
use super::selection::{eligible_pool_size, random_tlos_with_version_priority};
use super::{default_rng, load_feature_type, logged, BatchJob};
use crate::constants::{ENABLER_QUEUE, ENABLE_EVENT};
use crate::error::FeatureError;
use crate::features::state::initialize_enable;
use crate::notify::FragmentPublisher;
use crate::orm::{feature_types, tlos};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::Rng;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use validator::{Validate, ValidationErrors};

/// Enable the feature for one TLO and announce the change.
async fn enable_feature_for_tlo(
    txn: &DatabaseTransaction,
    feature_type: &feature_types::Model,
    tlo: &tlos::Model,
    publisher: &dyn FragmentPublisher,
) -> Result<(), FeatureError> {
    logged(
        ENABLE_EVENT,
        tlo.id,
        &feature_type.name,
        initialize_enable(txn, tlo, feature_type),
    )
    .await?;
    publisher.publish_fragments(&tlo.fragment_key());
    Ok(())
}

/// Enables a feature for an explicit number of eligible TLOs.
pub struct BatchEnablerByCount<R = StdRng> {
    feature_type: feature_types::Model,
    criteria: CountCriteria,
    errors: ValidationErrors,
    tlos: Option<Vec<tlos::Model>>,
    rng: R,
}

impl BatchEnablerByCount<StdRng> {
    pub async fn new(
        db: &DatabaseConnection,
        feature_type_id: i32,
        raw_count: &str,
    ) -> Result<Self, FeatureError> {
        let feature_type = load_feature_type(db, feature_type_id).await?;
        Ok(Self {
            feature_type,
            criteria: CountCriteria::new(raw_count),
            errors: ValidationErrors::new(),
            tlos: None,
            rng: default_rng(),
        })
    }

    /// Build and save in one go. `Err` when the feature type does not exist.
    pub async fn perform(
        db: &DatabaseConnection,
        publisher: &dyn FragmentPublisher,
        feature_type_id: i32,
        raw_count: &str,
    ) -> Result<bool, FeatureError> {
        Self::new(db, feature_type_id, raw_count)
            .await?
            .save(db, publisher)
            .await
    }
}

impl<R> BatchEnablerByCount<R>
where
    R: Rng + Send + Sync,
{
    /// Replace the randomness used to break ties within a version group.
    pub fn with_rng<S: Rng + Send + Sync>(self, rng: S) -> BatchEnablerByCount<S> {
        BatchEnablerByCount {
            feature_type: self.feature_type,
            criteria: self.criteria,
            errors: self.errors,
            tlos: self.tlos,
            rng,
        }
    }

    pub fn input_count(&self) -> Option<u64> {
        self.criteria.value()
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
impl<R> BatchJob for BatchEnablerByCount<R>
where
    R: Rng + Send + Sync,
{
    fn queue(&self) -> &'static str {
        ENABLER_QUEUE
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
        let count = self.criteria.value().unwrap_or(0);
        let selected =
            random_tlos_with_version_priority(txn, &self.feature_type, count, &mut self.rng)
                .await?;
        self.tlos = Some(selected.clone());
        Ok(selected)
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        tlo: &tlos::Model,
        publisher: &dyn FragmentPublisher,
    ) -> Result<(), FeatureError> {
        enable_feature_for_tlo(txn, &self.feature_type, tlo, publisher).await
    }
}

/// Enables a feature for a percentage of the eligible pool.
///
/// The pool size, and so the resulting count, is computed the first time it
/// is needed and then kept for the life of the job.
pub struct BatchEnablerByPercentage<R = StdRng> {
    feature_type: feature_types::Model,
    criteria: PercentageCriteria,
    input_count: Option<u64>,
    errors: ValidationErrors,
    tlos: Option<Vec<tlos::Model>>,
    rng: R,
}

impl BatchEnablerByPercentage<StdRng> {
    pub async fn new(
        db: &DatabaseConnection,
        feature_type_id: i32,
        raw_percentage: &str,
    ) -> Result<Self, FeatureError> {
        let feature_type = load_feature_type(db, feature_type_id).await?;
        Ok(Self {
            feature_type,
            criteria: PercentageCriteria::new(raw_percentage),
            input_count: None,
            errors: ValidationErrors::new(),
            tlos: None,
            rng: default_rng(),
        })
    }

    /// Build and save in one go. `Err` when the feature type does not exist.
    pub async fn perform(
        db: &DatabaseConnection,
        publisher: &dyn FragmentPublisher,
        feature_type_id: i32,
        raw_percentage: &str,
    ) -> Result<bool, FeatureError> {
        Self::new(db, feature_type_id, raw_percentage)
            .await?
            .save(db, publisher)
            .await
    }
}

impl<R> BatchEnablerByPercentage<R>
where
    R: Rng + Send + Sync,
{
    pub fn with_rng<S: Rng + Send + Sync>(self, rng: S) -> BatchEnablerByPercentage<S> {
        BatchEnablerByPercentage {
            feature_type: self.feature_type,
            criteria: self.criteria,
            input_count: self.input_count,
            errors: self.errors,
            tlos: self.tlos,
            rng,
        }
    }

    /// `round(pool_size * percentage / 100)`, memoized.
    pub async fn input_count(&mut self, txn: &DatabaseTransaction) -> Result<u64, FeatureError> {
        if let Some(count) = self.input_count {
            return Ok(count);
        }
        let pool_size = eligible_pool_size(txn, &self.feature_type).await?;
        let count = self.criteria.count_for_pool(pool_size).unwrap_or(0);
        log::debug!(
            "{}% of {} eligible tlo(s) for '{}' is {}",
            self.criteria.percentage.trim(),
            pool_size,
            self.feature_type.name,
            count
        );
        self.input_count = Some(count);
        Ok(count)
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
impl<R> BatchJob for BatchEnablerByPercentage<R>
where
    R: Rng + Send + Sync,
{
    fn queue(&self) -> &'static str {
        ENABLER_QUEUE
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
        let count = self.input_count(txn).await?;
        let selected =
            random_tlos_with_version_priority(txn, &self.feature_type, count, &mut self.rng)
                .await?;
        self.tlos = Some(selected.clone());
        Ok(selected)
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        tlo: &tlos::Model,
        publisher: &dyn FragmentPublisher,
    ) -> Result<(), FeatureError> {
        enable_feature_for_tlo(txn, &self.feature_type, tlo, publisher).await
    }
}
