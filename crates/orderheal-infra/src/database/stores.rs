use async_trait::async_trait;
use orderheal_core::Store;
use orderheal_webhook::StoreRepository;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};

use crate::{InfraError, Result};

#[derive(Clone)]
pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn by_id(&self, store_id: &str) -> Result<Option<Store>> {
        let row = sqlx::query(
            r#"
            select id, name, address, store_group_id, pos_organization_id, pos_token, delivery_services
            from stores
            where id = $1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| store_from_row(&r)).transpose()
    }

    /// Ordered by id so the first store is stable across calls
    async fn by_organization(&self, organization_id: &str) -> Result<Vec<Store>> {
        let rows = sqlx::query(
            r#"
            select id, name, address, store_group_id, pos_organization_id, pos_token, delivery_services
            from stores
            where pos_organization_id = $1
            order by id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(store_from_row).collect()
    }

    async fn group_budget(&self, store_group_id: &str) -> Result<Option<u32>> {
        let budget: Option<Option<i32>> =
            sqlx::query_scalar("select retry_budget from store_groups where id = $1")
                .bind(store_group_id)
                .fetch_optional(&self.pool)
                .await?;

        budget
            .flatten()
            .map(|b| {
                u32::try_from(b).map_err(|_| InfraError::CorruptRow(format!("negative retry_budget {}", b)))
            })
            .transpose()
    }
}

fn store_from_row(row: &PgRow) -> Result<Store> {
    let Json(delivery_services): Json<Vec<String>> = row.try_get("delivery_services")?;

    Ok(Store {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        store_group_id: row.try_get("store_group_id")?,
        pos_organization_id: row.try_get("pos_organization_id")?,
        pos_token: row.try_get("pos_token")?,
        delivery_services,
    })
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn find_by_id(&self, store_id: &str) -> orderheal_webhook::Result<Option<Store>> {
        Ok(self.by_id(store_id).await?)
    }

    async fn find_by_pos_organization(&self, organization_id: &str) -> orderheal_webhook::Result<Vec<Store>> {
        Ok(self.by_organization(organization_id).await?)
    }

    async fn retry_budget(&self, store_group_id: &str) -> orderheal_webhook::Result<Option<u32>> {
        Ok(self.group_budget(store_group_id).await?)
    }
}
