//! Operator view of a TLO's features

use super::FeatureOwner;
use crate::orm::features::{self, ControlValue};
use crate::orm::{feature_types, tlos};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use serde::Serialize;
use std::collections::HashMap;

/// A feature as shown to an operator. Types the TLO has no row for are shown
/// as an unsaved `ENABLED` record so the toggle defaults to on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeatureView {
    pub id: Option<i32>,
    pub feature_type_id: i32,
    pub owner: FeatureOwner,
    pub control_value: ControlValue,
    pub persisted: bool,
}

impl From<features::Model> for FeatureView {
    fn from(model: features::Model) -> Self {
        Self {
            id: Some(model.id),
            feature_type_id: model.feature_type_id,
            owner: model.owner(),
            control_value: model.control_value,
            persisted: true,
        }
    }
}

impl FeatureView {
    fn non_persisted_enabled(tlo: &tlos::Model, feature_type: &feature_types::Model) -> Self {
        Self {
            id: None,
            feature_type_id: feature_type.id,
            owner: FeatureOwner::from(tlo),
            control_value: ControlValue::Enabled,
            persisted: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FeatureTypeEntry {
    pub feature_type: feature_types::Model,
    pub feature: FeatureView,
}

/// Every safe-to-enable feature type, ordered by name, paired with the TLO's
/// feature of that type or a default. Reads only; nothing is written.
pub async fn features_by_type<C>(
    db: &C,
    tlo: &tlos::Model,
    unsafe_names: &[String],
) -> Result<Vec<FeatureTypeEntry>, DbErr>
where
    C: ConnectionTrait,
{
    let owner = FeatureOwner::from(tlo);
    let mut by_feature_type_id: HashMap<i32, features::Model> = features::Entity::find()
        .filter(features::Column::OwnerKind.eq(owner.kind()))
        .filter(features::Column::OwnerId.eq(owner.id()))
        .all(db)
        .await?
        .into_iter()
        .map(|feature| (feature.feature_type_id, feature))
        .collect();

    let feature_types = super::queries::safe_to_enable(db, unsafe_names).await?;

    Ok(feature_types
        .into_iter()
        .map(|feature_type| {
            let feature = match by_feature_type_id.remove(&feature_type.id) {
                Some(feature) => FeatureView::from(feature),
                None => FeatureView::non_persisted_enabled(tlo, &feature_type),
            };
            FeatureTypeEntry {
                feature_type,
                feature,
            }
        })
        .collect())
}
