//! SeaORM Entity for features table
//!
//! One row per (owner, feature type) pairing. A missing row means the
//! feature is off for that owner.

use crate::features::FeatureOwner;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "features")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub control_value: ControlValue,
    pub owner_kind: OwnerKind,
    pub owner_id: i32,
    pub feature_type_id: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlValue {
    #[sea_orm(num_value = 1)]
    Enabled,
    #[sea_orm(num_value = 2)]
    PreEnabled,
}

impl ControlValue {
    /// State a newly initialized feature takes.
    pub fn for_version_gate(sufficient_version: bool) -> Self {
        if sufficient_version {
            ControlValue::Enabled
        } else {
            ControlValue::PreEnabled
        }
    }

    /// State after the owner's version or the type's minimum changed.
    ///
    /// An enabled feature whose owner no longer satisfies the gate drops back
    /// to pre-enabled regardless of the type's `reversible` flag.
    pub fn after_version_change(self, sufficient_version: bool) -> Self {
        match (self, sufficient_version) {
            (ControlValue::Enabled, false) => ControlValue::PreEnabled,
            (ControlValue::PreEnabled, true) => ControlValue::Enabled,
            (current, _) => current,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlValue::Enabled => "ENABLED",
            ControlValue::PreEnabled => "PRE_ENABLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum OwnerKind {
    #[sea_orm(string_value = "Tlo")]
    Tlo,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tlos::Entity",
        from = "Column::OwnerId",
        to = "super::tlos::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Tlo,
    #[sea_orm(
        belongs_to = "super::feature_types::Entity",
        from = "Column::FeatureTypeId",
        to = "super::feature_types::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    FeatureType,
}

impl Related<super::tlos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tlo.def()
    }
}

impl Related<super::feature_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeatureType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn owner(&self) -> FeatureOwner {
        match self.owner_kind {
            OwnerKind::Tlo => FeatureOwner::Tlo(self.owner_id),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.control_value == ControlValue::Enabled
    }

    pub fn is_pre_enabled(&self) -> bool {
        self.control_value == ControlValue::PreEnabled
    }
}
