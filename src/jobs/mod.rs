//! Batch enable/disable jobs
//!
//! A job is created by the external dispatcher with a feature type id and
//! string criteria. [`save`] validates the criteria and then applies the
//! job's mutation to every selected TLO inside one transaction. Either the
//! whole batch commits or none of it does; a single failing TLO rolls back
//! everything, which keeps the model simple at the price of lock time on
//! large batches.

pub mod criteria;
pub mod disabler;
pub mod enabler;
pub mod selection;

pub use disabler::BatchDisabler;
pub use enabler::{BatchEnablerByCount, BatchEnablerByPercentage};

use crate::error::FeatureError;
use crate::notify::FragmentPublisher;
use crate::orm::{feature_types, tlos};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::time::Instant;
use validator::ValidationErrors;

#[async_trait]
pub trait BatchJob: Send + Sync {
    /// Queue the dispatcher routes this job to.
    fn queue(&self) -> &'static str;

    fn feature_type(&self) -> &feature_types::Model;

    fn validate_input(&self) -> Result<(), ValidationErrors>;

    /// Errors recorded by the last [`save`].
    fn errors(&self) -> &ValidationErrors;

    fn set_errors(&mut self, errors: ValidationErrors);

    /// TLOs this job will process. Computed once and reused.
    async fn tlos(&mut self, txn: &DatabaseTransaction) -> Result<Vec<tlos::Model>, FeatureError>;

    /// Mutate one TLO.
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        tlo: &tlos::Model,
        publisher: &dyn FragmentPublisher,
    ) -> Result<(), FeatureError>;

    /// Number of TLOs the job would process.
    async fn count(&mut self, db: &DatabaseConnection) -> Result<usize, FeatureError> {
        // Read only; the transaction is rolled back on drop.
        let txn = db.begin().await?;
        Ok(self.tlos(&txn).await?.len())
    }
}

/// Validate the job's criteria and, if they pass, run it in one transaction.
///
/// Returns `Ok(false)` with the job's errors populated when validation fails;
/// nothing is written in that case. Storage or version errors during the
/// batch abort it and are returned.
pub async fn save<J>(
    job: &mut J,
    db: &DatabaseConnection,
    publisher: &dyn FragmentPublisher,
) -> Result<bool, FeatureError>
where
    J: BatchJob + ?Sized,
{
    if let Err(errors) = job.validate_input() {
        log::warn!(
            "Rejected {} job for '{}': {}",
            job.queue(),
            job.feature_type().name,
            errors
        );
        job.set_errors(errors);
        return Ok(false);
    }
    job.set_errors(ValidationErrors::new());

    let started = Instant::now();
    let txn = db.begin().await?;
    let selected = job.tlos(&txn).await?;
    for tlo in &selected {
        job.apply(&txn, tlo, publisher).await?;
    }
    txn.commit().await?;

    log::info!(
        "{} job for '{}' processed {} tlo(s) in {}ms",
        job.queue(),
        job.feature_type().name,
        selected.len(),
        started.elapsed().as_millis()
    );
    Ok(true)
}

/// Run one per-TLO mutation, logging its start and outcome under `event`.
pub async fn logged<T, F>(
    event: &'static str,
    tlo_id: i32,
    feature_name: &str,
    mutation: F,
) -> Result<T, FeatureError>
where
    F: Future<Output = Result<T, FeatureError>>,
{
    let started = Instant::now();
    log::info!(
        "{} tlo_id={} feature_name={} started",
        event,
        tlo_id,
        feature_name
    );

    let result = mutation.await;
    match &result {
        Ok(_) => log::info!(
            "{} tlo_id={} feature_name={} completed in {}ms",
            event,
            tlo_id,
            feature_name,
            started.elapsed().as_millis()
        ),
        Err(e) => log::error!(
            "{} tlo_id={} feature_name={} failed: {}",
            event,
            tlo_id,
            feature_name,
            e
        ),
    }
    result
}

/// Randomness for batch selection: the configured seed when there is one.
pub fn default_rng() -> StdRng {
    match crate::app_config::jobs().seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) async fn load_feature_type(
    db: &DatabaseConnection,
    feature_type_id: i32,
) -> Result<feature_types::Model, FeatureError> {
    use sea_orm::EntityTrait;

    feature_types::Entity::find_by_id(feature_type_id)
        .one(db)
        .await?
        .ok_or_else(|| FeatureError::not_found("FeatureType", feature_type_id))
}
