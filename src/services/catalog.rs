use crate::{
    db::DbPool,
    entities::service::{self, Entity as ServiceEntity},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpsertServiceRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    #[validate(length(min = 1))]
    pub description: String,

    #[validate(length(min = 1, max = 60))]
    pub category: String,

    pub price: Decimal,

    #[validate(length(min = 3, max = 3))]
    pub currency: String,

    /// one-time | monthly | yearly
    pub billing_type: BillingType,

    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BillingType {
    OneTime,
    Monthly,
    Yearly,
}

impl BillingType {
    fn as_str(&self) -> &'static str {
        match self {
            BillingType::OneTime => "one-time",
            BillingType::Monthly => "monthly",
            BillingType::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub currency: String,
    pub billing_type: String,
    pub features: Vec<String>,
    pub requirements: Vec<String>,
    pub deliverables: Vec<String>,
    pub duration: Option<String>,
    pub is_active: bool,
}

/// Read-mostly catalog of consulting services
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Lists catalog entries; clients only see active services
    pub async fn list_services(
        &self,
        include_inactive: bool,
        category: Option<&str>,
    ) -> Result<Vec<ServiceResponse>, ServiceError> {
        let mut query = ServiceEntity::find().order_by_asc(service::Column::Name);
        if !include_inactive {
            query = query.filter(service::Column::IsActive.eq(true));
        }
        if let Some(category) = category {
            query = query.filter(service::Column::Category.eq(category));
        }

        let services = query
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(services.into_iter().map(model_to_response).collect())
    }

    pub async fn get_service(&self, id: Uuid) -> Result<Option<ServiceResponse>, ServiceError> {
        let model = ServiceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(model.map(model_to_response))
    }

    /// Resolves a service for ordering; inactive entries are treated as absent
    pub async fn resolve_orderable(&self, id: Uuid) -> Result<ServiceResponse, ServiceError> {
        let model = ServiceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        match model {
            Some(model) if model.is_active => Ok(model_to_response(model)),
            _ => Err(ServiceError::NotFound(format!("Service {} not found", id))),
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_service(
        &self,
        request: UpsertServiceRequest,
    ) -> Result<ServiceResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Service price must be greater than zero".to_string(),
            ));
        }

        let now = Utc::now();
        let model = service::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            category: Set(request.category),
            price: Set(request.price),
            currency: Set(request.currency),
            billing_type: Set(request.billing_type.as_str().to_string()),
            features: Set(Some(serde_json::json!(request.features))),
            requirements: Set(Some(serde_json::json!(request.requirements))),
            deliverables: Set(Some(serde_json::json!(request.deliverables))),
            duration: Set(request.duration),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(service_id = %model.id, "Catalog service created");
        Ok(model_to_response(model))
    }

    #[instrument(skip(self, request), fields(service_id = %id))]
    pub async fn update_service(
        &self,
        id: Uuid,
        request: UpsertServiceRequest,
    ) -> Result<ServiceResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = ServiceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", id)))?;

        let mut am: service::ActiveModel = existing.into();
        am.name = Set(request.name);
        am.description = Set(request.description);
        am.category = Set(request.category);
        am.price = Set(request.price);
        am.currency = Set(request.currency);
        am.billing_type = Set(request.billing_type.as_str().to_string());
        am.features = Set(Some(serde_json::json!(request.features)));
        am.requirements = Set(Some(serde_json::json!(request.requirements)));
        am.deliverables = Set(Some(serde_json::json!(request.deliverables)));
        am.duration = Set(request.duration);
        am.updated_at = Set(Some(Utc::now()));

        let model = am
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(model_to_response(model))
    }

    /// Soft delete: the entry disappears from client listings but existing
    /// orders keep referencing it
    #[instrument(skip(self), fields(service_id = %id))]
    pub async fn deactivate_service(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = ServiceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", id)))?;

        let mut am: service::ActiveModel = existing.into();
        am.is_active = Set(false);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(service_id = %id, "Catalog service deactivated");
        Ok(())
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn model_to_response(model: service::Model) -> ServiceResponse {
    ServiceResponse {
        id: model.id,
        name: model.name,
        description: model.description,
        category: model.category,
        price: model.price,
        currency: model.currency,
        billing_type: model.billing_type,
        features: string_list(model.features.as_ref()),
        requirements: string_list(model.requirements.as_ref()),
        deliverables: string_list(model.deliverables.as_ref()),
        duration: model.duration,
        is_active: model.is_active,
    }
}
