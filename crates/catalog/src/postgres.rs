//! Postgres-backed product store.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use modushop_core::ProductId;
use modushop_outbox::postgres::append_in_tx;

use crate::product::Product;
use crate::store::{PriceChangeRecorder, ProductStore, ProductStoreError};

#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn insert(&self, product: &Product) -> Result<(), ProductStoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, categories, description, image_file, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.categories)
        .bind(&product.description)
        .bind(&product.image_file)
        .bind(product.price)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, ProductStoreError> {
        let row = sqlx::query(
            "SELECT id, name, categories, description, image_file, price FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>, ProductStoreError> {
        let rows = sqlx::query(
            "SELECT id, name, categories, description, image_file, price FROM products ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, ProductStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, categories, description, image_file, price
            FROM products
            WHERE $1 = ANY(categories)
            ORDER BY name ASC
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products_by_category", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn update_details(&self, product: &Product) -> Result<(), ProductStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, categories = $3, description = $4, image_file = $5
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.categories)
        .bind(&product.description)
        .bind(&product.image_file)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            return Err(ProductStoreError::NotFound(product.id));
        }
        Ok(())
    }

    async fn update_price(
        &self,
        id: ProductId,
        price: Decimal,
        record: &PriceChangeRecorder,
    ) -> Result<Product, ProductStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query(
            r#"
            UPDATE products
            SET price = $2
            WHERE id = $1
            RETURNING id, name, categories, description, image_file, price
            "#,
        )
        .bind(id.as_uuid())
        .bind(price)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_price", e))?
        .ok_or(ProductStoreError::NotFound(id))?;

        let product = product_from_row(&row)?;
        let message = record(&product)?;
        append_in_tx(&mut tx, &message)
            .await
            .map_err(|e| ProductStoreError::Storage(e.to_string()))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(product)
    }

    async fn delete(&self, id: ProductId) -> Result<(), ProductStoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(ProductStoreError::NotFound(id));
        }
        Ok(())
    }
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<Product, ProductStoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("read_product_row", e);
    let id: Uuid = row.try_get("id").map_err(read)?;

    Ok(Product {
        id: ProductId::from_uuid(id),
        name: row.try_get("name").map_err(read)?,
        categories: row.try_get("categories").map_err(read)?,
        description: row.try_get("description").map_err(read)?,
        image_file: row.try_get("image_file").map_err(read)?,
        price: row.try_get("price").map_err(read)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> ProductStoreError {
    ProductStoreError::Storage(format!("{operation}: {err}"))
}
