//! Storage adapter for TLOs and feature types
//!
//! Every write is validated, performed inside a transaction, and followed by a
//! synchronous [`ChangeEvent`] delivered to each registered [`ChangeObserver`]
//! on that same transaction. Reactions to a change therefore commit or roll
//! back together with the change itself.

use crate::error::FeatureError;
use crate::features::engine::FeatureStateEngine;
use crate::orm::{feature_types, features, tlos};
use crate::orm::tlos::TloStatus;
use crate::version::SEMVER_REGEX;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DatabaseTransaction, DbErr, PaginatorTrait, Set,
    TransactionTrait,
};
use std::sync::Arc;
use validator::{Validate, ValidationError, ValidationErrors};

/// Notification emitted after a successful write.
#[derive(Clone, Debug)]
pub enum ChangeEvent {
    TloCreated {
        tlo: tlos::Model,
    },
    TloVersionChanged {
        tlo: tlos::Model,
        previous_version: String,
    },
    MinimumVersionChanged {
        feature_type: feature_types::Model,
        previous_version: String,
    },
}

/// Receives change events from the [`Store`].
#[async_trait]
pub trait ChangeObserver: Send + Sync {
    async fn on_update(
        &self,
        txn: &DatabaseTransaction,
        event: &ChangeEvent,
    ) -> Result<(), FeatureError>;
}

#[derive(Debug, Clone, Validate)]
pub struct NewTlo {
    pub status: TloStatus,
    #[validate(regex(path = "SEMVER_REGEX", code = "semver"))]
    pub required_version: String,
}

#[derive(Debug, Clone, Validate)]
pub struct NewFeatureType {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(regex(path = "SEMVER_REGEX", code = "semver"))]
    pub minimum_client_version: String,
    pub new_tlos_on: bool,
    pub reversible: bool,
}

impl NewFeatureType {
    pub fn new(name: &str, minimum_client_version: &str) -> Self {
        Self {
            name: name.to_owned(),
            minimum_client_version: minimum_client_version.to_owned(),
            new_tlos_on: false,
            reversible: false,
        }
    }

    pub fn new_tlos_on(mut self, on: bool) -> Self {
        self.new_tlos_on = on;
        self
    }

    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }
}

pub struct Store {
    db: DatabaseConnection,
    observers: Vec<Arc<dyn ChangeObserver>>,
}

impl Store {
    /// Adapter with no observers; writes never cascade.
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            observers: Vec::new(),
        }
    }

    /// Adapter with the feature state engine registered.
    pub fn with_feature_state_engine(db: DatabaseConnection) -> Self {
        let mut store = Self::new(db);
        store.register(Arc::new(FeatureStateEngine));
        store
    }

    pub fn register(&mut self, observer: Arc<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn emit(&self, txn: &DatabaseTransaction, event: ChangeEvent) -> Result<(), FeatureError> {
        log::debug!(
            "Dispatching {:?} to {} observer(s)",
            event_name(&event),
            self.observers.len()
        );
        for observer in &self.observers {
            observer.on_update(txn, &event).await?;
        }
        Ok(())
    }

    pub async fn find_tlo(&self, id: i32) -> Result<tlos::Model, FeatureError> {
        tlos::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| FeatureError::not_found("Tlo", id))
    }

    pub async fn find_feature_type(&self, id: i32) -> Result<feature_types::Model, FeatureError> {
        feature_types::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| FeatureError::not_found("FeatureType", id))
    }

    /// Insert a TLO; observers then initialize its client features.
    pub async fn create_tlo(&self, new: NewTlo) -> Result<tlos::Model, FeatureError> {
        new.validate()?;

        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await?;
        let tlo = tlos::ActiveModel {
            status: Set(new.status),
            required_version: Set(new.required_version),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        self.emit(&txn, ChangeEvent::TloCreated { tlo: tlo.clone() })
            .await?;
        txn.commit().await?;

        log::info!(
            "Created tlo {} ({}, version {})",
            tlo.id,
            tlo.status.as_str(),
            tlo.required_version
        );
        Ok(tlo)
    }

    /// Change the version a TLO reports. Observers only hear about it when the
    /// value actually differs.
    pub async fn update_tlo_version(
        &self,
        id: i32,
        required_version: &str,
    ) -> Result<tlos::Model, FeatureError> {
        validate_version("required_version", required_version)?;

        let txn = self.db.begin().await?;
        let current = tlos::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| FeatureError::not_found("Tlo", id))?;

        if current.required_version == required_version {
            return Ok(current);
        }

        let previous_version = current.required_version.clone();
        let mut active: tlos::ActiveModel = current.into();
        active.required_version = Set(required_version.to_owned());
        active.updated_at = Set(Utc::now().naive_utc());
        let tlo = active.update(&txn).await?;

        self.emit(
            &txn,
            ChangeEvent::TloVersionChanged {
                tlo: tlo.clone(),
                previous_version: previous_version.clone(),
            },
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Tlo {} version changed {} -> {}",
            tlo.id,
            previous_version,
            tlo.required_version
        );
        Ok(tlo)
    }

    pub async fn update_tlo_status(
        &self,
        id: i32,
        status: TloStatus,
    ) -> Result<tlos::Model, FeatureError> {
        let current = self.find_tlo(id).await?;
        let mut active: tlos::ActiveModel = current.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    /// Insert a feature type. Names are unique; the check here gives a field
    /// error, the storage constraint catches concurrent inserts.
    pub async fn create_feature_type(
        &self,
        new: NewFeatureType,
    ) -> Result<feature_types::Model, FeatureError> {
        let mut errors = match new.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let taken = feature_types::Entity::find()
            .filter(feature_types::Column::Name.eq(new.name.as_str()))
            .count(&self.db)
            .await?
            > 0;
        if taken {
            let mut error = ValidationError::new("unique");
            error.message = Some("Name has already been taken".into());
            errors.add("name", error);
        }

        if !errors.errors().is_empty() {
            return Err(FeatureError::Validation(errors));
        }

        let now = Utc::now().naive_utc();
        let feature_type = feature_types::ActiveModel {
            name: Set(new.name),
            minimum_client_version: Set(new.minimum_client_version),
            new_tlos_on: Set(new.new_tlos_on),
            reversible: Set(new.reversible),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        log::info!(
            "Created feature type {} '{}' (minimum {})",
            feature_type.id,
            feature_type.name,
            feature_type.minimum_client_version
        );
        Ok(feature_type)
    }

    /// Raise or lower a feature type's minimum client version; existing
    /// features of the type are revalidated by observers.
    pub async fn update_minimum_version(
        &self,
        id: i32,
        minimum_client_version: &str,
    ) -> Result<feature_types::Model, FeatureError> {
        validate_version("minimum_client_version", minimum_client_version)?;

        let txn = self.db.begin().await?;
        let current = feature_types::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| FeatureError::not_found("FeatureType", id))?;

        if current.minimum_client_version == minimum_client_version {
            return Ok(current);
        }

        let previous_version = current.minimum_client_version.clone();
        let mut active: feature_types::ActiveModel = current.into();
        active.minimum_client_version = Set(minimum_client_version.to_owned());
        active.updated_at = Set(Utc::now().naive_utc());
        let feature_type = active.update(&txn).await?;

        self.emit(
            &txn,
            ChangeEvent::MinimumVersionChanged {
                feature_type: feature_type.clone(),
                previous_version: previous_version.clone(),
            },
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Feature type '{}' minimum version changed {} -> {}",
            feature_type.name,
            previous_version,
            feature_type.minimum_client_version
        );
        Ok(feature_type)
    }

    pub async fn set_new_tlos_on(
        &self,
        id: i32,
        new_tlos_on: bool,
    ) -> Result<feature_types::Model, FeatureError> {
        let current = self.find_feature_type(id).await?;
        let mut active: feature_types::ActiveModel = current.into();
        active.new_tlos_on = Set(new_tlos_on);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    /// Delete a feature type together with all of its features.
    /// Returns the number of features removed.
    pub async fn destroy_feature_type(&self, id: i32) -> Result<u64, FeatureError> {
        let txn = self.db.begin().await?;
        let feature_type = feature_types::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| FeatureError::not_found("FeatureType", id))?;

        let removed = features::Entity::delete_many()
            .filter(features::Column::FeatureTypeId.eq(feature_type.id))
            .exec(&txn)
            .await?
            .rows_affected;
        feature_types::Entity::delete_by_id(feature_type.id)
            .exec(&txn)
            .await?;
        txn.commit().await?;

        log::info!(
            "Destroyed feature type '{}' and {} feature(s)",
            feature_type.name,
            removed
        );
        Ok(removed)
    }
}

fn event_name(event: &ChangeEvent) -> &'static str {
    match event {
        ChangeEvent::TloCreated { .. } => "tlo_created",
        ChangeEvent::TloVersionChanged { .. } => "tlo_version_changed",
        ChangeEvent::MinimumVersionChanged { .. } => "minimum_version_changed",
    }
}

fn validate_version(field: &'static str, version: &str) -> Result<(), ValidationErrors> {
    if SEMVER_REGEX.is_match(version) {
        return Ok(());
    }
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new("semver");
    error.add_param("value".into(), &version);
    errors.add(field, error);
    Err(errors)
}

/// Unique constraint violations surface as plain `DbErr`s; this tells them
/// apart from other storage failures.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("unique") || message.contains("duplicate")
}
