use async_trait::async_trait;
use orderheal_core::{FailReason, Order, OrderError, OrderStatus, Product};
use orderheal_webhook::{OrderRepository, WebhookError};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tracing::debug;

use crate::{InfraError, Result};

/// Orders table; the whole record is rewritten on every save
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find(&self, pos_order_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            select id, pos_order_id, restaurant_id, delivery_service, status,
                   retry_count, fail_reason, errors, products
            from orders
            where pos_order_id = $1
            "#,
        )
        .bind(pos_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    async fn upsert(&self, order: &Order) -> Result<()> {
        let retry_count = i32::try_from(order.retry_count)
            .map_err(|_| InfraError::CorruptRow(format!("retry_count {} out of range", order.retry_count)))?;

        sqlx::query(
            r#"
            insert into orders (
              id, pos_order_id, restaurant_id, delivery_service, status,
              retry_count, fail_reason, errors, products, updated_at
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, now()
            )
            on conflict (id) do update set
              pos_order_id = excluded.pos_order_id,
              restaurant_id = excluded.restaurant_id,
              delivery_service = excluded.delivery_service,
              status = excluded.status,
              retry_count = excluded.retry_count,
              fail_reason = excluded.fail_reason,
              errors = excluded.errors,
              products = excluded.products,
              updated_at = now()
            "#,
        )
        .bind(&order.id)
        .bind(&order.pos_order_id)
        .bind(&order.restaurant_id)
        .bind(&order.delivery_service)
        .bind(order.status.as_str())
        .bind(retry_count)
        .bind(Json(&order.fail_reason))
        .bind(Json(&order.errors))
        .bind(Json(&order.products))
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order.id, status = %order.status, "Order saved");
        Ok(())
    }

    async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<u64> {
        let result = sqlx::query("update orders set status = $2, updated_at = now() where id = $1")
            .bind(order_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let retry_count: i32 = row.try_get("retry_count")?;
    let Json(fail_reason): Json<FailReason> = row.try_get("fail_reason")?;
    let Json(errors): Json<Vec<OrderError>> = row.try_get("errors")?;
    let Json(products): Json<Vec<Product>> = row.try_get("products")?;

    Ok(Order {
        id: row.try_get("id")?,
        pos_order_id: row.try_get("pos_order_id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        delivery_service: row.try_get("delivery_service")?,
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| InfraError::CorruptRow(e.to_string()))?,
        retry_count: u32::try_from(retry_count)
            .map_err(|_| InfraError::CorruptRow(format!("negative retry_count {}", retry_count)))?,
        fail_reason,
        errors,
        products,
    })
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn find_by_pos_order_id(&self, pos_order_id: &str) -> orderheal_webhook::Result<Option<Order>> {
        Ok(self.find(pos_order_id).await?)
    }

    async fn save(&self, order: &Order) -> orderheal_webhook::Result<()> {
        Ok(self.upsert(order).await?)
    }

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> orderheal_webhook::Result<()> {
        match self.set_status(order_id, status).await? {
            0 => Err(WebhookError::Repository(format!("order {} not found", order_id))),
            _ => Ok(()),
        }
    }
}
