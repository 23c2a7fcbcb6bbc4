//! Test fixtures for creating test data
#![allow(dead_code)]

use featuregate::orm::features::{self, ControlValue};
use featuregate::orm::tlos::{self, TloStatus};
use featuregate::orm::feature_types;
use featuregate::store::{NewFeatureType, NewTlo};
use featuregate::Store;
use sea_orm::{entity::*, query::*, DatabaseConnection};

/// Store with the feature state engine registered, as in production.
pub fn store(db: &DatabaseConnection) -> Store {
    Store::with_feature_state_engine(db.clone())
}

pub async fn create_tlo(db: &DatabaseConnection, status: TloStatus, version: &str) -> tlos::Model {
    store(db)
        .create_tlo(NewTlo {
            status,
            required_version: version.to_string(),
        })
        .await
        .expect("Failed to create tlo")
}

pub async fn create_live_tlo(db: &DatabaseConnection, version: &str) -> tlos::Model {
    create_tlo(db, TloStatus::Live, version).await
}

pub async fn create_feature_type(
    db: &DatabaseConnection,
    name: &str,
    minimum_client_version: &str,
) -> feature_types::Model {
    store(db)
        .create_feature_type(NewFeatureType::new(name, minimum_client_version))
        .await
        .expect("Failed to create feature type")
}

pub async fn create_auto_on_feature_type(
    db: &DatabaseConnection,
    name: &str,
    minimum_client_version: &str,
) -> feature_types::Model {
    store(db)
        .create_feature_type(NewFeatureType::new(name, minimum_client_version).new_tlos_on(true))
        .await
        .expect("Failed to create feature type")
}

/// All feature rows of a type, ordered by owner id.
pub async fn features_of_type(
    db: &DatabaseConnection,
    feature_type: &feature_types::Model,
) -> Vec<features::Model> {
    features::Entity::find()
        .filter(features::Column::FeatureTypeId.eq(feature_type.id))
        .order_by_asc(features::Column::OwnerId)
        .all(db)
        .await
        .expect("Failed to load features")
}

/// Control value of the (tlo, type) pairing, `None` when off.
pub async fn control_value(
    db: &DatabaseConnection,
    tlo: &tlos::Model,
    feature_type: &feature_types::Model,
) -> Option<ControlValue> {
    features::Entity::find()
        .filter(features::Column::OwnerId.eq(tlo.id))
        .filter(features::Column::FeatureTypeId.eq(feature_type.id))
        .one(db)
        .await
        .expect("Failed to load feature")
        .map(|feature| feature.control_value)
}

pub fn ids(tlos: &[tlos::Model]) -> Vec<i32> {
    tlos.iter().map(|tlo| tlo.id).collect()
}
