use crate::{
    db::DbPool,
    entities::{cart, cart_item},
    errors::ServiceError,
    services::catalog::ServiceResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const CART_OPEN: &str = "open";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub currency: String,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub items: Vec<CartItemResponse>,
    pub subtotal: Decimal,
}

/// Repository-backed cart aggregate: one open cart per client, explicit
/// persistence, no ambient shared state. Prices are snapshotted from the
/// catalog when an item is added.
#[derive(Clone)]
pub struct CartService {
    db_pool: Arc<DbPool>,
}

impl CartService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Finds the client's open cart, creating one on first use
    async fn open_cart(&self, client_id: Uuid) -> Result<cart::Model, ServiceError> {
        let existing = cart::Entity::find()
            .filter(cart::Column::ClientId.eq(client_id))
            .filter(cart::Column::Status.eq(CART_OPEN))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if let Some(cart) = existing {
            return Ok(cart);
        }

        let now = Utc::now();
        cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(client_id),
            status: Set(CART_OPEN.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::DatabaseError)
    }

    pub async fn get_cart(&self, client_id: Uuid) -> Result<CartResponse, ServiceError> {
        let cart = self.open_cart(client_id).await?;
        let items = cart
            .find_related(cart_item::Entity)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(to_response(cart.id, items))
    }

    /// Adds a catalog service to the cart, merging quantity when the service
    /// is already present
    #[instrument(skip(self, service), fields(client_id = %client_id, service_id = %service.id))]
    pub async fn add_item(
        &self,
        client_id: Uuid,
        service: &ServiceResponse,
        quantity: i32,
    ) -> Result<CartResponse, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let cart = self.open_cart(client_id).await?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ServiceId.eq(service.id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match existing {
            Some(item) => {
                let merged = item.quantity + quantity;
                let mut am: cart_item::ActiveModel = item.into();
                am.quantity = Set(merged);
                am.update(&*self.db_pool)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    service_id: Set(service.id),
                    service_name: Set(service.name.clone()),
                    quantity: Set(quantity),
                    unit_price: Set(service.price),
                    currency: Set(service.currency.clone()),
                    created_at: Set(Utc::now()),
                }
                .insert(&*self.db_pool)
                .await
                .map_err(ServiceError::DatabaseError)?;
            }
        }

        self.touch(cart).await?;
        self.get_cart(client_id).await
    }

    /// Sets the quantity of a cart line
    pub async fn update_item(
        &self,
        client_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartResponse, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1; remove the item instead".to_string(),
            ));
        }

        let cart = self.open_cart(client_id).await?;
        let item = self.owned_item(&cart, item_id).await?;

        let mut am: cart_item::ActiveModel = item.into();
        am.quantity = Set(quantity);
        am.update(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.touch(cart).await?;
        self.get_cart(client_id).await
    }

    pub async fn remove_item(
        &self,
        client_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartResponse, ServiceError> {
        let cart = self.open_cart(client_id).await?;
        let item = self.owned_item(&cart, item_id).await?;

        item.delete(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.touch(cart).await?;
        self.get_cart(client_id).await
    }

    /// Empties the client's cart
    pub async fn clear(&self, client_id: Uuid) -> Result<(), ServiceError> {
        let cart = self.open_cart(client_id).await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        self.touch(cart).await?;
        Ok(())
    }

    async fn owned_item(
        &self,
        cart: &cart::Model,
        item_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        cart_item::Entity::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))
    }

    async fn touch(&self, cart: cart::Model) -> Result<(), ServiceError> {
        let mut am: cart::ActiveModel = cart.into();
        am.updated_at = Set(Utc::now());
        am.update(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }
}

fn to_response(cart_id: Uuid, items: Vec<cart_item::Model>) -> CartResponse {
    let items: Vec<CartItemResponse> = items
        .into_iter()
        .map(|item| CartItemResponse {
            id: item.id,
            service_id: item.service_id,
            service_name: item.service_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            currency: item.currency,
            line_total: item.unit_price * Decimal::from(item.quantity),
        })
        .collect();
    let subtotal = items.iter().map(|i| i.line_total).sum();
    CartResponse {
        id: cart_id,
        items,
        subtotal,
    }
}
