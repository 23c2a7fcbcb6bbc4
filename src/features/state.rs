//! State transitions for a single (TLO, feature type) pairing

use super::FeatureOwner;
use crate::error::FeatureError;
use crate::orm::features::{self, ControlValue};
use crate::orm::{feature_types, tlos};
use crate::version::{self, VersionError};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};

/// Version gate between a TLO and a feature type.
pub fn has_sufficient_version(
    tlo: &tlos::Model,
    feature_type: &feature_types::Model,
) -> Result<bool, VersionError> {
    version::has_sufficient_version(&tlo.required_version, &feature_type.minimum_client_version)
}

/// Existing feature row for an owner and type, if any.
pub async fn feature_for<C>(
    db: &C,
    owner: FeatureOwner,
    feature_type_id: i32,
) -> Result<Option<features::Model>, DbErr>
where
    C: ConnectionTrait,
{
    features::Entity::find()
        .filter(features::Column::OwnerKind.eq(owner.kind()))
        .filter(features::Column::OwnerId.eq(owner.id()))
        .filter(features::Column::FeatureTypeId.eq(feature_type_id))
        .one(db)
        .await
}

/// Turn a feature on for a TLO: `ENABLED` when the TLO's version satisfies the
/// type's minimum, `PRE_ENABLED` otherwise.
///
/// Reuses the existing row when there is one, so repeated calls leave exactly
/// one row. A concurrent insert of the same pairing fails on the unique index.
pub async fn initialize_enable<C>(
    db: &C,
    tlo: &tlos::Model,
    feature_type: &feature_types::Model,
) -> Result<features::Model, FeatureError>
where
    C: ConnectionTrait,
{
    let control_value = ControlValue::for_version_gate(has_sufficient_version(tlo, feature_type)?);
    let now = Utc::now().naive_utc();

    match feature_for(db, FeatureOwner::from(tlo), feature_type.id).await? {
        Some(existing) if existing.control_value == control_value => Ok(existing),
        Some(existing) => {
            let mut active: features::ActiveModel = existing.into();
            active.control_value = Set(control_value);
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        None => {
            let owner = FeatureOwner::from(tlo);
            let feature = features::ActiveModel {
                control_value: Set(control_value),
                owner_kind: Set(owner.kind()),
                owner_id: Set(owner.id()),
                feature_type_id: Set(feature_type.id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            log::debug!(
                "Initialized '{}' for {} as {}",
                feature_type.name,
                owner,
                control_value.as_str()
            );
            Ok(feature)
        }
    }
}

/// Remove the row, returning the pairing to off.
pub async fn disable<C>(db: &C, feature: features::Model) -> Result<(), FeatureError>
where
    C: ConnectionTrait,
{
    features::Entity::delete_by_id(feature.id).exec(db).await?;
    log::debug!(
        "Disabled feature type {} for {}",
        feature.feature_type_id,
        feature.owner()
    );
    Ok(())
}

/// Re-evaluate an existing row against the current versions.
///
/// `PRE_ENABLED` becomes `ENABLED` once the gate passes and `ENABLED` drops to
/// `PRE_ENABLED` when it no longer does. The type's `reversible` flag is not
/// consulted.
pub async fn update_status<C>(
    db: &C,
    feature: features::Model,
    tlo: &tlos::Model,
    feature_type: &feature_types::Model,
) -> Result<features::Model, FeatureError>
where
    C: ConnectionTrait,
{
    let sufficient = has_sufficient_version(tlo, feature_type)?;
    let next = feature.control_value.after_version_change(sufficient);
    if next == feature.control_value {
        return Ok(feature);
    }

    let previous = feature.control_value;
    let mut active: features::ActiveModel = feature.into();
    active.control_value = Set(next);
    active.updated_at = Set(Utc::now().naive_utc());
    let feature = active.update(db).await?;

    log::info!(
        "Feature '{}' for tlo {} moved {} -> {}",
        feature_type.name,
        tlo.id,
        previous.as_str(),
        next.as_str()
    );
    Ok(feature)
}
