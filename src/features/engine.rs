//! Reactions that keep features consistent with version changes

use super::state::{initialize_enable, update_status};
use super::FeatureOwner;
use crate::error::FeatureError;
use crate::orm::{feature_types, features, tlos};
use crate::store::{ChangeEvent, ChangeObserver};
use async_trait::async_trait;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseTransaction};

/// Observer registered with the store to drive feature state from TLO and
/// feature type changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureStateEngine;

#[async_trait]
impl ChangeObserver for FeatureStateEngine {
    async fn on_update(
        &self,
        txn: &DatabaseTransaction,
        event: &ChangeEvent,
    ) -> Result<(), FeatureError> {
        match event {
            ChangeEvent::TloCreated { tlo } => initiate_client_features(txn, tlo).await,
            ChangeEvent::TloVersionChanged { tlo, .. } => update_client_features(txn, tlo).await,
            ChangeEvent::MinimumVersionChanged { feature_type, .. } => {
                update_feature_list(txn, feature_type).await
            }
        }
    }
}

/// Give a new TLO every feature type flagged `new_tlos_on`.
pub async fn initiate_client_features<C>(db: &C, tlo: &tlos::Model) -> Result<(), FeatureError>
where
    C: ConnectionTrait,
{
    let feature_types = feature_types::Entity::find()
        .filter(feature_types::Column::NewTlosOn.eq(true))
        .order_by_asc(feature_types::Column::Id)
        .all(db)
        .await?;

    for feature_type in &feature_types {
        initialize_enable(db, tlo, feature_type).await?;
    }
    Ok(())
}

/// Re-evaluate the TLO's existing features after its version changed.
///
/// Only rows that already exist are touched. A TLO whose new version now
/// satisfies a type it never had does not gain that feature here.
pub async fn update_client_features<C>(db: &C, tlo: &tlos::Model) -> Result<(), FeatureError>
where
    C: ConnectionTrait,
{
    let owner = FeatureOwner::from(tlo);
    let rows = features::Entity::find()
        .filter(features::Column::OwnerKind.eq(owner.kind()))
        .filter(features::Column::OwnerId.eq(owner.id()))
        .find_also_related(feature_types::Entity)
        .all(db)
        .await?;

    for (feature, feature_type) in rows {
        if let Some(feature_type) = feature_type {
            update_status(db, feature, tlo, &feature_type).await?;
        }
    }
    Ok(())
}

/// Revalidate every feature of a type after its minimum version changed.
/// Rows whose owner no longer exists are skipped.
pub async fn update_feature_list<C>(
    db: &C,
    feature_type: &feature_types::Model,
) -> Result<(), FeatureError>
where
    C: ConnectionTrait,
{
    let rows = features::Entity::find()
        .filter(features::Column::FeatureTypeId.eq(feature_type.id))
        .order_by_asc(features::Column::Id)
        .all(db)
        .await?;

    for feature in rows {
        match feature.owner() {
            FeatureOwner::Tlo(tlo_id) => {
                match tlos::Entity::find_by_id(tlo_id).one(db).await? {
                    Some(tlo) => {
                        update_status(db, feature, &tlo, feature_type).await?;
                    }
                    None => log::warn!(
                        "Skipping feature {}: owning tlo {} is missing",
                        feature.id,
                        tlo_id
                    ),
                }
            }
        }
    }
    Ok(())
}
