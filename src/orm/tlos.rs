//! SeaORM Entity for tlos table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tlos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub status: TloStatus,
    pub required_version: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum TloStatus {
    #[sea_orm(num_value = 1)]
    Live,
    #[sea_orm(num_value = 2)]
    Prelive,
    #[sea_orm(num_value = 3)]
    Deactivated,
    #[sea_orm(num_value = 4)]
    Test,
    #[sea_orm(num_value = 5)]
    Demo,
}

impl TloStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TloStatus::Live => "live",
            TloStatus::Prelive => "prelive",
            TloStatus::Deactivated => "deactivated",
            TloStatus::Test => "test",
            TloStatus::Demo => "demo",
        }
    }

    /// Rollout batches only ever target these.
    pub fn is_prelive_or_live(&self) -> bool {
        match self {
            TloStatus::Live | TloStatus::Prelive => true,
            TloStatus::Deactivated | TloStatus::Test | TloStatus::Demo => false,
        }
    }
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
    /// Key under which cached fragments for this TLO are published.
    pub fn fragment_key(&self) -> String {
        format!("tlo/{}", self.id)
    }
}
