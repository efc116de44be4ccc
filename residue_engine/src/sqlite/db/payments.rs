use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{
    AppliedPayment,
    NewPaymentEvent,
    NewPaymentIntent,
    OrderId,
    PaymentEventRecord,
    PaymentIntent,
};

pub async fn insert_intent(
    intent: NewPaymentIntent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payment_intents (order_id, gateway_order_id, amount, currency, receipt, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(intent.order_id)
    .bind(intent.gateway_order_id)
    .bind(intent.amount)
    .bind(intent.currency)
    .bind(intent.receipt)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_intent(
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_intents WHERE gateway_order_id = ?")
        .bind(gateway_order_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_intents_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_intents WHERE order_id = ? ORDER BY id DESC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Inserts the processed-payment marker for `payment`. Returns `false`, and writes nothing, if a marker for the same
/// gateway payment id already exists.
pub async fn insert_payment_marker(
    order_id: &OrderId,
    payment: &AppliedPayment,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO applied_payments (gateway_payment_id, order_id, amount, source, applied_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (gateway_payment_id) DO NOTHING
        "#,
    )
    .bind(&payment.gateway_payment_id)
    .bind(order_id)
    .bind(payment.amount)
    .bind(payment.source)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_payment_event(
    event: NewPaymentEvent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentEventRecord, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payment_events (
                source,
                event_type,
                order_id,
                gateway_order_id,
                gateway_payment_id,
                amount,
                outcome,
                detail,
                received_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(event.source)
    .bind(event.event_type)
    .bind(event.order_id)
    .bind(event.gateway_order_id)
    .bind(event.gateway_payment_id)
    .bind(event.amount)
    .bind(event.outcome)
    .bind(event.detail)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_payment_events(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentEventRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_events WHERE order_id = ? ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}
