use crate::{
    db::DbPool,
    entities::order_document,
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const MAX_DOCUMENT_BYTES: i64 = 25 * 1024 * 1024;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterDocumentRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    #[validate(length(min = 1, max = 120))]
    pub content_type: String,

    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Opaque key into the external object store; the client uploads the
    /// bytes there directly
    pub storage_key: String,
    pub uploaded_by: Uuid,
    pub created_at: chrono::DateTime<Utc>,
}

/// Document metadata registry. Blob bytes live in the external object
/// store; this service only records and lists the references.
#[derive(Clone)]
pub struct DocumentService {
    db_pool: Arc<DbPool>,
}

impl DocumentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(order_id = %order_id, uploaded_by = %uploaded_by))]
    pub async fn register_document(
        &self,
        order_id: Uuid,
        uploaded_by: Uuid,
        request: RegisterDocumentRequest,
    ) -> Result<DocumentResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.size_bytes <= 0 {
            return Err(ServiceError::ValidationError(
                "Document size must be greater than zero".to_string(),
            ));
        }
        if request.size_bytes > MAX_DOCUMENT_BYTES {
            return Err(ServiceError::ValidationError(format!(
                "Document exceeds the {} byte limit",
                MAX_DOCUMENT_BYTES
            )));
        }

        let id = Uuid::new_v4();
        let storage_key = format!("orders/{}/{}/{}", order_id, id, request.file_name);
        let model = order_document::ActiveModel {
            id: Set(id),
            order_id: Set(order_id),
            file_name: Set(request.file_name),
            content_type: Set(request.content_type),
            size_bytes: Set(request.size_bytes),
            storage_key: Set(storage_key),
            uploaded_by: Set(uploaded_by),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(document_id = %model.id, "Order document registered");
        Ok(model_to_response(model))
    }

    pub async fn list_documents(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<DocumentResponse>, ServiceError> {
        let documents = order_document::Entity::find()
            .filter(order_document::Column::OrderId.eq(order_id))
            .order_by_asc(order_document::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(documents.into_iter().map(model_to_response).collect())
    }
}

fn model_to_response(model: order_document::Model) -> DocumentResponse {
    DocumentResponse {
        id: model.id,
        order_id: model.order_id,
        file_name: model.file_name,
        content_type: model.content_type,
        size_bytes: model.size_bytes,
        storage_key: model.storage_key,
        uploaded_by: model.uploaded_by,
        created_at: model.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> DocumentService {
        let pool = crate::db::establish_connection("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        DocumentService::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn registered_document_gets_scoped_storage_key() {
        let svc = service().await;
        let order_id = Uuid::new_v4();
        let doc = svc
            .register_document(
                order_id,
                Uuid::new_v4(),
                RegisterDocumentRequest {
                    file_name: "incorporation.pdf".into(),
                    content_type: "application/pdf".into(),
                    size_bytes: 120_000,
                },
            )
            .await
            .unwrap();

        assert!(doc.storage_key.starts_with(&format!("orders/{}/", order_id)));
        assert!(doc.storage_key.ends_with("/incorporation.pdf"));

        let listed = svc.list_documents(order_id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn size_limits_are_enforced() {
        let svc = service().await;
        let request = |size| RegisterDocumentRequest {
            file_name: "big.bin".into(),
            content_type: "application/octet-stream".into(),
            size_bytes: size,
        };

        assert!(svc
            .register_document(Uuid::new_v4(), Uuid::new_v4(), request(0))
            .await
            .is_err());
        assert!(svc
            .register_document(Uuid::new_v4(), Uuid::new_v4(), request(MAX_DOCUMENT_BYTES + 1))
            .await
            .is_err());
    }
}
