//! Integration tests for rollout jobs

mod common;

use common::{database::*, fixtures::*};
use async_trait::async_trait;
use featuregate::features::state::initialize_enable;
use featuregate::jobs::{self, BatchEnablerByCount, BatchEnablerByPercentage, BatchJob};
use featuregate::notify::{FragmentPublisher, RecordingPublisher};
use featuregate::orm::features::ControlValue;
use featuregate::orm::tlos::{self, TloStatus};
use featuregate::orm::feature_types;
use featuregate::FeatureError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use validator::ValidationErrors;

/// Enables like the real enabler but fails on the second TLO it is given.
struct FailsOnSecond {
    feature_type: feature_types::Model,
    tlos: Vec<tlos::Model>,
    errors: ValidationErrors,
}

#[async_trait]
impl BatchJob for FailsOnSecond {
    fn queue(&self) -> &'static str {
        "test"
    }

    fn feature_type(&self) -> &feature_types::Model {
        &self.feature_type
    }

    fn validate_input(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    fn set_errors(&mut self, errors: ValidationErrors) {
        self.errors = errors;
    }

    async fn tlos(&mut self, _txn: &DatabaseTransaction) -> Result<Vec<tlos::Model>, FeatureError> {
        Ok(self.tlos.clone())
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        tlo: &tlos::Model,
        publisher: &dyn FragmentPublisher,
    ) -> Result<(), FeatureError> {
        if tlo.id == self.tlos[1].id {
            return Err(FeatureError::not_found("Tlo", tlo.id));
        }
        initialize_enable(txn, tlo, &self.feature_type).await?;
        publisher.publish_fragments(&tlo.fragment_key());
        Ok(())
    }
}

/// Ten live TLOs, the first six at or above 3.0.0, plus a deactivated one
/// that must never be picked.
async fn rollout_pool(db: &DatabaseConnection) -> featuregate::orm::feature_types::Model {
    let feature_type = create_feature_type(db, "dashboards", "3.0.0").await;
    for version in ["3.0.0", "3.1.0", "4.0.0", "3.0.1", "5.2.0", "3.9.9"] {
        create_live_tlo(db, version).await;
    }
    for version in ["2.9.9", "1.0.0", "2.0.0", "0.9.0"] {
        create_tlo(db, TloStatus::Prelive, version).await;
    }
    create_tlo(db, TloStatus::Deactivated, "9.0.0").await;
    feature_type
}

#[actix_rt::test]
async fn test_enable_by_count_prefers_sufficient_versions() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;
    let publisher = RecordingPublisher::new();

    let mut job = BatchEnablerByCount::new(&db, feature_type.id, "5")
        .await
        .unwrap()
        .with_rng(StdRng::seed_from_u64(11));
    assert!(job.save(&db, &publisher).await.unwrap());
    assert!(job.errors().errors().is_empty());

    let rows = features_of_type(&db, &feature_type).await;
    assert_eq!(rows.len(), 5);
    assert!(rows
        .iter()
        .all(|feature| feature.control_value == ControlValue::Enabled));
    assert_eq!(publisher.published().len(), 5);
}

#[actix_rt::test]
async fn test_enable_by_count_falls_back_to_insufficient_versions() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;
    let publisher = RecordingPublisher::new();

    let saved = BatchEnablerByCount::new(&db, feature_type.id, "8")
        .await
        .unwrap()
        .with_rng(StdRng::seed_from_u64(5))
        .save(&db, &publisher)
        .await
        .unwrap();
    assert!(saved);

    let rows = features_of_type(&db, &feature_type).await;
    let enabled = rows.iter().filter(|f| f.is_enabled()).count();
    let pre_enabled = rows.iter().filter(|f| f.is_pre_enabled()).count();
    assert_eq!(enabled, 6);
    assert_eq!(pre_enabled, 2);
}

#[actix_rt::test]
async fn test_enable_skips_tlos_that_already_have_the_feature() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;
    let publisher = RecordingPublisher::new();

    BatchEnablerByCount::perform(&db, &publisher, feature_type.id, "7")
        .await
        .unwrap();
    BatchEnablerByCount::perform(&db, &publisher, feature_type.id, "7")
        .await
        .unwrap();

    // Only ten eligible TLOs; the deactivated one is never picked
    assert_eq!(features_of_type(&db, &feature_type).await.len(), 10);
}

#[actix_rt::test]
async fn test_percentage_matches_equivalent_count() {
    let by_count_db = setup_test_database().await.expect("Failed to connect to test database");
    let by_percentage_db = setup_test_database().await.expect("Failed to connect to test database");
    let publisher = RecordingPublisher::new();

    let count_type = rollout_pool(&by_count_db).await;
    let percentage_type = rollout_pool(&by_percentage_db).await;

    let mut by_count = BatchEnablerByCount::new(&by_count_db, count_type.id, "5")
        .await
        .unwrap()
        .with_rng(StdRng::seed_from_u64(42));
    let mut by_percentage =
        BatchEnablerByPercentage::new(&by_percentage_db, percentage_type.id, "50")
            .await
            .unwrap()
            .with_rng(StdRng::seed_from_u64(42));

    assert!(by_count.save(&by_count_db, &publisher).await.unwrap());
    assert!(by_percentage
        .save(&by_percentage_db, &publisher)
        .await
        .unwrap());

    let counted: Vec<i32> = features_of_type(&by_count_db, &count_type)
        .await
        .iter()
        .map(|f| f.owner_id)
        .collect();
    let percented: Vec<i32> = features_of_type(&by_percentage_db, &percentage_type)
        .await
        .iter()
        .map(|f| f.owner_id)
        .collect();
    assert_eq!(counted.len(), 5);
    assert_eq!(counted, percented);
}

#[actix_rt::test]
async fn test_percentage_count_is_computed_once() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;

    let mut job = BatchEnablerByPercentage::new(&db, feature_type.id, "50")
        .await
        .unwrap();
    assert_eq!(job.count(&db).await.unwrap(), 5);

    // Growing the pool afterwards does not change the memoized selection
    create_live_tlo(&db, "3.0.0").await;
    create_live_tlo(&db, "3.0.0").await;
    assert_eq!(job.count(&db).await.unwrap(), 5);
}

#[actix_rt::test]
async fn test_invalid_count_writes_nothing() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;
    let publisher = RecordingPublisher::new();

    for raw in ["-1", "abc", "1.5", ""] {
        let mut job = BatchEnablerByCount::new(&db, feature_type.id, raw)
            .await
            .unwrap();
        assert!(!job.save(&db, &publisher).await.unwrap(), "accepted {:?}", raw);
        assert!(job.errors().field_errors().contains_key("count"));
    }

    assert!(features_of_type(&db, &feature_type).await.is_empty());
    assert!(publisher.published().is_empty());
}

#[actix_rt::test]
async fn test_invalid_percentage_writes_nothing() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;
    let publisher = RecordingPublisher::new();

    for raw in ["-1", "101", "50.5"] {
        let saved =
            BatchEnablerByPercentage::perform(&db, &publisher, feature_type.id, raw)
                .await
                .unwrap();
        assert!(!saved, "accepted {:?}", raw);
    }

    assert!(features_of_type(&db, &feature_type).await.is_empty());
}

#[actix_rt::test]
async fn test_unknown_feature_type_fails_the_job() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let publisher = RecordingPublisher::new();

    let result = BatchEnablerByCount::perform(&db, &publisher, 999, "1").await;
    assert!(matches!(
        result,
        Err(FeatureError::NotFound {
            entity: "FeatureType",
            id: 999
        })
    ));
}

#[actix_rt::test]
async fn test_two_tlo_rollout_end_to_end() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let publisher = RecordingPublisher::new();

    let feature_type = create_feature_type(&db, "A", "3.0.0").await;
    let t1 = create_live_tlo(&db, "3.1.0").await;
    let t2 = create_live_tlo(&db, "2.9.0").await;

    let saved = BatchEnablerByCount::perform(&db, &publisher, feature_type.id, "2")
        .await
        .unwrap();
    assert!(saved);

    assert_eq!(
        control_value(&db, &t1, &feature_type).await,
        Some(ControlValue::Enabled)
    );
    assert_eq!(
        control_value(&db, &t2, &feature_type).await,
        Some(ControlValue::PreEnabled)
    );

    // Sufficient TLOs are processed first
    assert_eq!(
        publisher.published(),
        vec![t1.fragment_key(), t2.fragment_key()]
    );
}

#[actix_rt::test]
async fn test_failure_mid_batch_rolls_back_everything() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let publisher = RecordingPublisher::new();

    let feature_type = create_feature_type(&db, "audit_log", "1.0.0").await;
    let first = create_live_tlo(&db, "1.0.0").await;
    let second = create_live_tlo(&db, "1.0.0").await;
    let third = create_live_tlo(&db, "1.0.0").await;

    let mut job = FailsOnSecond {
        feature_type: feature_type.clone(),
        tlos: vec![first.clone(), second, third],
        errors: ValidationErrors::new(),
    };
    let result = jobs::save(&mut job, &db, &publisher).await;

    assert!(matches!(result, Err(FeatureError::NotFound { .. })));
    assert!(features_of_type(&db, &feature_type).await.is_empty());
    // Publishing is not retracted by the rollback
    assert_eq!(publisher.published(), vec![first.fragment_key()]);
}

#[actix_rt::test]
async fn test_oversized_count_enables_whole_pool() {
    let db = setup_test_database().await.expect("Failed to connect to test database");
    let feature_type = rollout_pool(&db).await;
    let publisher = RecordingPublisher::new();

    let saved = BatchEnablerByCount::perform(
        &db,
        &publisher,
        feature_type.id,
        "99999999999999999999999",
    )
    .await
    .unwrap();

    assert!(saved);
    assert_eq!(features_of_type(&db, &feature_type).await.len(), 10);
}
