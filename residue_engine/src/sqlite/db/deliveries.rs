use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use crate::db_types::{Delivery, DeliveryId, NewDelivery, OrderId, VehicleInfo};

impl<'r> FromRow<'r, SqliteRow> for Delivery {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Delivery {
            id: row.try_get("id")?,
            delivery_id: row.try_get("delivery_id")?,
            order_id: row.try_get("order_id")?,
            buyer_id: row.try_get("buyer_id")?,
            hub_id: row.try_get("hub_id")?,
            quantity: row.try_get("quantity_kg")?,
            vehicle: VehicleInfo {
                vehicle_number: row.try_get("vehicle_number")?,
                driver_name: row.try_get("driver_name")?,
                driver_phone: row.try_get("driver_phone")?,
            },
            moisture_percent: row.try_get("moisture_percent")?,
            bale_type: row.try_get("bale_type")?,
            status: row.try_get("status")?,
            rejection_reason: row.try_get("rejection_reason")?,
            rejection_notes: row.try_get("rejection_notes")?,
            decided_by: row.try_get("decided_by")?,
            shipped_at: row.try_get("shipped_at")?,
            arrived_at: row.try_get("arrived_at")?,
            decided_at: row.try_get("decided_at")?,
        })
    }
}

/// Inserts an `in_transit` delivery, copying the parties from the parent order.
///
/// The insert is guarded in the same statement: it only happens if the order is `dispatched` and the accepted
/// quantity, plus the quantity of every delivery still awaiting judgement, plus this delivery, fits within the ordered
/// quantity. Returns `None` if the guard fails.
pub async fn insert_delivery_guarded(
    delivery_id: &DeliveryId,
    delivery: &NewDelivery,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO deliveries (
                delivery_id,
                order_id,
                buyer_id,
                hub_id,
                quantity_kg,
                vehicle_number,
                driver_name,
                driver_phone,
                moisture_percent,
                bale_type,
                status,
                shipped_at
            )
            SELECT ?, o.order_id, o.buyer_id, o.hub_id, ?, ?, ?, ?, ?, ?, 'in_transit', ?
            FROM orders o
            WHERE o.order_id = ?
              AND o.status = 'dispatched'
              AND o.accepted_quantity_kg + ? + COALESCE(
                  (SELECT SUM(d.quantity_kg) FROM deliveries d
                   WHERE d.order_id = o.order_id AND d.status IN ('in_transit', 'delivered')), 0
              ) <= o.quantity_kg
            RETURNING *;
        "#,
    )
    .bind(delivery_id)
    .bind(delivery.quantity)
    .bind(&delivery.vehicle.vehicle_number)
    .bind(delivery.vehicle.driver_name.as_deref())
    .bind(delivery.vehicle.driver_phone.as_deref())
    .bind(delivery.moisture_percent)
    .bind(delivery.bale_type)
    .bind(now)
    .bind(&delivery.order_id)
    .bind(delivery.quantity)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_delivery(
    delivery_id: &DeliveryId,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM deliveries WHERE delivery_id = ?").bind(delivery_id).fetch_optional(conn).await
}

pub async fn fetch_deliveries_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM deliveries WHERE order_id = ? ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

/// Number of deliveries for the order still awaiting the buyer's judgement.
pub async fn count_pending(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM deliveries WHERE order_id = ? AND status IN ('in_transit', 'delivered')",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Saves an arrival, provided the delivery is still `in_transit`.
pub async fn update_arrival(delivery: &Delivery, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE deliveries SET status = ?, arrived_at = ?
            WHERE delivery_id = ? AND status = 'in_transit'
            RETURNING *;
        "#,
    )
    .bind(delivery.status)
    .bind(delivery.arrived_at)
    .bind(&delivery.delivery_id)
    .fetch_optional(conn)
    .await
}

/// Saves the buyer's decision, provided the delivery is still `delivered`.
pub async fn update_decision(
    delivery: &Delivery,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE deliveries SET
                status = ?,
                rejection_reason = ?,
                rejection_notes = ?,
                decided_by = ?,
                decided_at = ?
            WHERE delivery_id = ? AND status = 'delivered'
            RETURNING *;
        "#,
    )
    .bind(delivery.status)
    .bind(delivery.rejection_reason)
    .bind(delivery.rejection_notes.as_deref())
    .bind(delivery.decided_by.as_deref())
    .bind(delivery.decided_at)
    .bind(&delivery.delivery_id)
    .fetch_optional(conn)
    .await
}
