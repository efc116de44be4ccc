use chrono::{DateTime, Utc};
use log::trace;
use residue_common::Quantity;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, QualityReport, ShipmentDetails, StockAllocation},
    traits::OrderQueryFilter,
};

impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let allocation = match row.try_get::<Option<Quantity>, _>("allocated_quantity_kg")? {
            Some(quantity) => Some(StockAllocation {
                quantity,
                allocated_at: row.try_get("allocated_at")?,
                prepared_by: row.try_get("allocated_by")?,
            }),
            None => None,
        };
        let quality_report = match row.try_get("quality_grade")? {
            Some(grade) => Some(QualityReport {
                grade,
                moisture_percent: row.try_get("quality_moisture_percent")?,
                remarks: row.try_get("quality_remarks")?,
                inspected_by: row.try_get("quality_inspected_by")?,
                reported_at: row.try_get("quality_reported_at")?,
            }),
            None => None,
        };
        let shipment = match row.try_get::<Option<String>, _>("tracking_id")? {
            Some(tracking_id) => Some(ShipmentDetails {
                carrier: row.try_get("carrier")?,
                tracking_id,
                shipped_on: row.try_get("shipped_on")?,
            }),
            None => None,
        };
        Ok(Order {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            buyer_id: row.try_get("buyer_id")?,
            hub_id: row.try_get("hub_id")?,
            quantity: row.try_get("quantity_kg")?,
            unit_price: row.try_get("unit_price")?,
            total_amount: row.try_get("total_amount")?,
            currency: row.try_get("currency")?,
            requested_date: row.try_get("requested_date")?,
            status: row.try_get("status")?,
            payment_status: row.try_get("payment_status")?,
            paid_amount: row.try_get("paid_amount")?,
            allocation,
            quality_report,
            shipment,
            gateway_order_id: row.try_get("gateway_order_id")?,
            gateway_payment_id: row.try_get("gateway_payment_id")?,
            accepted_quantity: row.try_get("accepted_quantity_kg")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            dispatched_at: row.try_get("dispatched_at")?,
            delivered_at: row.try_get("delivered_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
        })
    }
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// A unique-constraint error means `order_id` is taken; pick another number and try again.
pub async fn insert_order(
    order_id: &OrderId,
    order: &NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                hub_id,
                quantity_kg,
                unit_price,
                total_amount,
                currency,
                requested_date,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(&order.buyer_id)
    .bind(&order.hub_id)
    .bind(order.quantity)
    .bind(order.unit_price)
    .bind(order.total_amount)
    .bind(&order.currency)
    .bind(order.requested_date)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_id = ?").bind(order_id).fetch_optional(conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(hub_id) = query.hub_id {
        where_clause.push("hub_id = ");
        where_clause.push_bind_unseparated(hub_id);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_all(conn).await
}

/// Compare-and-set save of a transitioned order. Nothing is written unless the stored version equals
/// `order.version`. Returns `None` if the version has moved on.
///
/// The gateway correlation ids are write-once: an id already stored is never overwritten.
pub async fn update_order(order: &Order, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let allocation = order.allocation.as_ref();
    let report = order.quality_report.as_ref();
    let shipment = order.shipment.as_ref();
    sqlx::query_as(
        r#"
            UPDATE orders SET
                quantity_kg = ?,
                unit_price = ?,
                total_amount = ?,
                requested_date = ?,
                status = ?,
                payment_status = ?,
                paid_amount = ?,
                allocated_quantity_kg = ?,
                allocated_at = ?,
                allocated_by = ?,
                quality_grade = ?,
                quality_moisture_percent = ?,
                quality_remarks = ?,
                quality_inspected_by = ?,
                quality_reported_at = ?,
                carrier = ?,
                tracking_id = ?,
                shipped_on = ?,
                gateway_order_id = COALESCE(gateway_order_id, ?),
                gateway_payment_id = COALESCE(gateway_payment_id, ?),
                accepted_quantity_kg = ?,
                updated_at = ?,
                dispatched_at = ?,
                delivered_at = ?,
                cancelled_at = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            RETURNING *;
        "#,
    )
    .bind(order.quantity)
    .bind(order.unit_price)
    .bind(order.total_amount)
    .bind(order.requested_date)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.paid_amount)
    .bind(allocation.map(|a| a.quantity))
    .bind(allocation.map(|a| a.allocated_at))
    .bind(allocation.map(|a| a.prepared_by.as_str()))
    .bind(report.map(|r| r.grade))
    .bind(report.map(|r| r.moisture_percent))
    .bind(report.and_then(|r| r.remarks.as_deref()))
    .bind(report.map(|r| r.inspected_by.as_str()))
    .bind(report.map(|r| r.reported_at))
    .bind(shipment.and_then(|s| s.carrier.as_deref()))
    .bind(shipment.map(|s| s.tracking_id.as_str()))
    .bind(shipment.and_then(|s| s.shipped_on))
    .bind(order.gateway_order_id.as_deref())
    .bind(order.gateway_payment_id.as_deref())
    .bind(order.accepted_quantity)
    .bind(order.updated_at)
    .bind(order.dispatched_at)
    .bind(order.delivered_at)
    .bind(order.cancelled_at)
    .bind(order.id)
    .bind(order.version)
    .fetch_optional(conn)
    .await
}

/// Records the gateway order id of the first intent created for the order. Later intents leave it untouched.
pub async fn set_gateway_order_id_once(
    order_id: &OrderId,
    gateway_order_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET gateway_order_id = ?, updated_at = ?, version = version + 1
            WHERE order_id = ? AND gateway_order_id IS NULL
        "#,
    )
    .bind(gateway_order_id)
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
