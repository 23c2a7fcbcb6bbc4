//! SeaORM Entity for feature_types table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "feature_types")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub minimum_client_version: String,
    /// Newly created TLOs get this feature at creation time
    pub new_tlos_on: bool,
    /// Stored but not consulted by any state transition
    pub reversible: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::features::Entity")]
    Features,
}

impl Related<super::features::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Features.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this type may be toggled through rollouts and the operator view.
    pub fn is_safe_to_enable(&self, unsafe_names: &[String]) -> bool {
        !unsafe_names.iter().any(|name| name == &self.name)
    }
}
