//! TLO lookups by feature state
//!
//! Each lookup takes a [`StatusScope`] so callers can narrow it to live,
//! prelive, or both. Rollout batches normally use `PreliveOrLive`.

use crate::orm::features::{self, ControlValue, OwnerKind};
use crate::orm::tlos::{self, TloStatus};
use crate::orm::feature_types;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, JoinType, Select};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusScope {
    Any,
    Live,
    Prelive,
    PreliveOrLive,
}

impl StatusScope {
    fn apply(self, select: Select<tlos::Entity>) -> Select<tlos::Entity> {
        match self {
            StatusScope::Any => select,
            StatusScope::Live => select.filter(tlos::Column::Status.eq(TloStatus::Live)),
            StatusScope::Prelive => select.filter(tlos::Column::Status.eq(TloStatus::Prelive)),
            StatusScope::PreliveOrLive => select.filter(
                tlos::Column::Status.is_in([TloStatus::Prelive, TloStatus::Live]),
            ),
        }
    }
}

/// All TLOs in `scope`, ordered by id.
pub fn tlos_in_scope(scope: StatusScope) -> Select<tlos::Entity> {
    scope.apply(tlos::Entity::find().order_by_asc(tlos::Column::Id))
}

/// TLOs holding a row of this type, optionally restricted to one control value.
fn tlos_with_feature(
    feature_type_id: i32,
    control_values: &[ControlValue],
    scope: StatusScope,
) -> Select<tlos::Entity> {
    let select = tlos::Entity::find()
        .inner_join(features::Entity)
        .filter(features::Column::OwnerKind.eq(OwnerKind::Tlo))
        .filter(features::Column::FeatureTypeId.eq(feature_type_id))
        .filter(features::Column::ControlValue.is_in(control_values.iter().copied()))
        .order_by_asc(tlos::Column::Id);
    scope.apply(select)
}

/// TLOs with the feature `ENABLED`.
pub fn tlos_on(feature_type_id: i32, scope: StatusScope) -> Select<tlos::Entity> {
    tlos_with_feature(feature_type_id, &[ControlValue::Enabled], scope)
}

/// TLOs with the feature `PRE_ENABLED`.
pub fn tlos_pre_enabled(feature_type_id: i32, scope: StatusScope) -> Select<tlos::Entity> {
    tlos_with_feature(feature_type_id, &[ControlValue::PreEnabled], scope)
}

/// TLOs with any row for the feature.
pub fn tlos_on_or_pre_enabled(feature_type_id: i32, scope: StatusScope) -> Select<tlos::Entity> {
    tlos_with_feature(
        feature_type_id,
        &[ControlValue::Enabled, ControlValue::PreEnabled],
        scope,
    )
}

/// TLOs with no row at all for the feature.
///
/// Off is the absence of a row, so this is an outer join on
/// (owner, feature type) keeping only the unmatched TLOs.
pub fn tlos_off(feature_type_id: i32, scope: StatusScope) -> Select<tlos::Entity> {
    let select = tlos::Entity::find()
        .join(
            JoinType::LeftJoin,
            tlos::Relation::Features
                .def()
                .on_condition(move |_left, right| {
                    Condition::all()
                        .add(
                            Expr::col((right.clone(), features::Column::FeatureTypeId))
                                .eq(feature_type_id),
                        )
                        .add(
                            Expr::col((right, features::Column::OwnerKind))
                                .eq(OwnerKind::Tlo.to_value()),
                        )
                }),
        )
        .filter(features::Column::Id.is_null())
        .order_by_asc(tlos::Column::Id);
    scope.apply(select)
}

/// `ENABLED` feature rows of a type that are owned by TLOs.
pub fn on_features_for_tlos(feature_type_id: i32) -> Select<features::Entity> {
    features::Entity::find()
        .filter(features::Column::OwnerKind.eq(OwnerKind::Tlo))
        .filter(features::Column::FeatureTypeId.eq(feature_type_id))
        .filter(features::Column::ControlValue.eq(ControlValue::Enabled))
        .order_by_asc(features::Column::Id)
}

/// Feature types that may be toggled, i.e. whose name is not in `unsafe_names`.
pub async fn safe_to_enable<C>(
    db: &C,
    unsafe_names: &[String],
) -> Result<Vec<feature_types::Model>, DbErr>
where
    C: ConnectionTrait,
{
    feature_types::Entity::find()
        .filter(feature_types::Column::Name.is_not_in(unsafe_names.iter().cloned()))
        .order_by_asc(feature_types::Column::Name)
        .all(db)
        .await
}
