//! Postgres-backed basket store.
//!
//! Carts are stored as a header row (`shopping_carts`) plus line rows
//! (`shopping_cart_items`). Checkout runs as one transaction: read the cart,
//! insert the outbox row, delete the cart, commit.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use modushop_core::ProductId;
use modushop_outbox::postgres::append_in_tx;

use crate::cart::{CartItem, ShoppingCart};
use crate::store::{BasketStore, BasketStoreError, OutboxMessageBuilder};

#[derive(Debug, Clone)]
pub struct PostgresBasketStore {
    pool: PgPool,
}

impl PostgresBasketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BasketStore for PostgresBasketStore {
    async fn get(&self, user_name: &str) -> Result<Option<ShoppingCart>, BasketStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        let cart = load_cart(&mut tx, user_name).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(cart)
    }

    async fn upsert(&self, cart: &ShoppingCart) -> Result<(), BasketStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query(
            r#"
            INSERT INTO shopping_carts (id, user_name)
            VALUES ($1, $2)
            ON CONFLICT (user_name) DO NOTHING
            "#,
        )
        .bind(cart.id())
        .bind(cart.user_name())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_cart", e))?;

        // Replace the line set wholesale; line-level diffing buys nothing at
        // this scale.
        sqlx::query(
            r#"
            DELETE FROM shopping_cart_items
            WHERE cart_id = (SELECT id FROM shopping_carts WHERE user_name = $1)
            "#,
        )
        .bind(cart.user_name())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("clear_cart_items", e))?;

        for item in cart.items() {
            sqlx::query(
                r#"
                INSERT INTO shopping_cart_items (
                    cart_id, product_id, product_name, color, quantity, unit_price
                )
                SELECT id, $2, $3, $4, $5, $6
                FROM shopping_carts WHERE user_name = $1
                "#,
            )
            .bind(cart.user_name())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(&item.color)
            .bind(item.quantity as i32)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_cart_item", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    async fn delete(&self, user_name: &str) -> Result<(), BasketStoreError> {
        // Items cascade on the cart foreign key.
        sqlx::query("DELETE FROM shopping_carts WHERE user_name = $1")
            .bind(user_name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_cart", e))?;
        Ok(())
    }

    async fn update_item_price(
        &self,
        product_id: ProductId,
        price: Decimal,
    ) -> Result<u64, BasketStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE shopping_cart_items
            SET unit_price = $2
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(price)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item_price", e))?;

        Ok(result.rows_affected())
    }

    async fn checkout(
        &self,
        user_name: &str,
        build: &OutboxMessageBuilder,
    ) -> Result<ShoppingCart, BasketStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let cart = load_cart(&mut tx, user_name)
            .await?
            .ok_or_else(|| BasketStoreError::NotFound(user_name.to_owned()))?;

        let message = build(&cart)?;
        append_in_tx(&mut tx, &message)
            .await
            .map_err(|e| BasketStoreError::Storage(e.to_string()))?;

        sqlx::query("DELETE FROM shopping_carts WHERE user_name = $1")
            .bind(user_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_cart", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(cart)
    }
}

async fn load_cart(
    tx: &mut Transaction<'_, Postgres>,
    user_name: &str,
) -> Result<Option<ShoppingCart>, BasketStoreError> {
    let header = sqlx::query("SELECT id, user_name FROM shopping_carts WHERE user_name = $1")
        .bind(user_name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_cart", e))?;

    let Some(header) = header else {
        return Ok(None);
    };

    let read = |e: sqlx::Error| map_sqlx_error("read_cart_row", e);
    let id: Uuid = header.try_get("id").map_err(read)?;
    let user_name: String = header.try_get("user_name").map_err(read)?;

    let rows = sqlx::query(
        r#"
        SELECT product_id, product_name, color, quantity, unit_price
        FROM shopping_cart_items
        WHERE cart_id = $1
        ORDER BY product_name ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_cart_items", e))?;

    let items = rows
        .iter()
        .map(|row| {
            let quantity: i32 = row.try_get("quantity").map_err(read)?;
            Ok(CartItem {
                product_id: ProductId::from_uuid(row.try_get("product_id").map_err(read)?),
                product_name: row.try_get("product_name").map_err(read)?,
                color: row.try_get("color").map_err(read)?,
                quantity: quantity.max(0) as u32,
                unit_price: row.try_get("unit_price").map_err(read)?,
            })
        })
        .collect::<Result<Vec<_>, BasketStoreError>>()?;

    Ok(Some(ShoppingCart::from_parts(id, user_name, items)))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> BasketStoreError {
    BasketStoreError::Storage(format!("{operation}: {err}"))
}
