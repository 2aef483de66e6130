//! Postgres-backed order store.
//!
//! Addresses and payment are stored inline on the order row; items get their
//! own table. `insert_if_absent` leans on `ON CONFLICT DO NOTHING` against
//! the primary key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use modushop_core::{CustomerId, OrderId, ProductId};

use crate::order::{Address, Order, OrderItem, Payment};
use crate::store::{InsertOutcome, OrderStore, OrderStoreError};

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, OrderStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let ship = order.shipping_address();
        let bill = order.billing_address();
        let pay = order.payment();
        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, user_name, ordered_on,
                ship_first_name, ship_last_name, ship_email_address, ship_address_line,
                ship_country, ship_state, ship_zip_code,
                bill_first_name, bill_last_name, bill_email_address, bill_address_line,
                bill_country, bill_state, bill_zip_code,
                card_name, card_number, expiration, cvv, payment_method
            )
            VALUES (
                $1, $2, $3, $4,
                $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23
            )
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.user_name())
        .bind(order.ordered_on())
        .bind(&ship.first_name)
        .bind(&ship.last_name)
        .bind(&ship.email_address)
        .bind(&ship.address_line)
        .bind(&ship.country)
        .bind(&ship.state)
        .bind(&ship.zip_code)
        .bind(&bill.first_name)
        .bind(&bill.last_name)
        .bind(&bill.email_address)
        .bind(&bill.address_line)
        .bind(&bill.country)
        .bind(&bill.state)
        .bind(&bill.zip_code)
        .bind(&pay.card_name)
        .bind(&pay.card_number)
        .bind(&pay.expiration)
        .bind(&pay.cvv)
        .bind(pay.payment_method)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(InsertOutcome::AlreadyExists);
        }

        for item in order.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_order", e))?;

        let order = match row {
            Some(row) => Some(hydrate_order(&mut tx, &row).await?),
            None => None,
        };
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(order)
    }

    async fn list_by_user(&self, user_name: &str) -> Result<Vec<Order>, OrderStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let rows = sqlx::query(
            "SELECT * FROM orders WHERE user_name = $1 ORDER BY ordered_on ASC",
        )
        .bind(user_name)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(hydrate_order(&mut tx, row).await?);
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(orders)
    }
}

async fn hydrate_order(
    tx: &mut Transaction<'_, Postgres>,
    row: &sqlx::postgres::PgRow,
) -> Result<Order, OrderStoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("read_order_row", e);

    let id: Uuid = row.try_get("id").map_err(read)?;
    let customer_id: Uuid = row.try_get("customer_id").map_err(read)?;
    let user_name: String = row.try_get("user_name").map_err(read)?;
    let ordered_on: DateTime<Utc> = row.try_get("ordered_on").map_err(read)?;

    let shipping_address = Address {
        first_name: row.try_get("ship_first_name").map_err(read)?,
        last_name: row.try_get("ship_last_name").map_err(read)?,
        email_address: row.try_get("ship_email_address").map_err(read)?,
        address_line: row.try_get("ship_address_line").map_err(read)?,
        country: row.try_get("ship_country").map_err(read)?,
        state: row.try_get("ship_state").map_err(read)?,
        zip_code: row.try_get("ship_zip_code").map_err(read)?,
    };
    let billing_address = Address {
        first_name: row.try_get("bill_first_name").map_err(read)?,
        last_name: row.try_get("bill_last_name").map_err(read)?,
        email_address: row.try_get("bill_email_address").map_err(read)?,
        address_line: row.try_get("bill_address_line").map_err(read)?,
        country: row.try_get("bill_country").map_err(read)?,
        state: row.try_get("bill_state").map_err(read)?,
        zip_code: row.try_get("bill_zip_code").map_err(read)?,
    };
    let payment = Payment {
        card_name: row.try_get("card_name").map_err(read)?,
        card_number: row.try_get("card_number").map_err(read)?,
        expiration: row.try_get("expiration").map_err(read)?,
        cvv: row.try_get("cvv").map_err(read)?,
        payment_method: row.try_get("payment_method").map_err(read)?,
    };

    let item_rows = sqlx::query(
        r#"
        SELECT product_id, product_name, quantity, unit_price
        FROM order_items
        WHERE order_id = $1
        ORDER BY product_name ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_order_items", e))?;

    let items = item_rows
        .iter()
        .map(|row| {
            let quantity: i32 = row.try_get("quantity").map_err(read)?;
            Ok(OrderItem {
                product_id: ProductId::from_uuid(row.try_get("product_id").map_err(read)?),
                product_name: row.try_get("product_name").map_err(read)?,
                quantity: quantity.max(0) as u32,
                unit_price: row.try_get("unit_price").map_err(read)?,
            })
        })
        .collect::<Result<Vec<_>, OrderStoreError>>()?;

    Ok(Order::from_parts(
        OrderId::from_uuid(id),
        CustomerId::from_uuid(customer_id),
        user_name,
        items,
        shipping_address,
        billing_address,
        payment,
        ordered_on,
    ))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> OrderStoreError {
    OrderStoreError::Storage(format!("{operation}: {err}"))
}
