use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{ChargeRow, PaymentRow};

const CHARGE_COLUMNS: &str = r#"
  id,
  organization_id,
  guardian_id,
  registration_id,
  kind,
  description,
  amount_cents,
  voided_at,
  created_by,
  created_at
"#;

const PAYMENT_COLUMNS: &str = r#"
  id,
  organization_id,
  guardian_id,
  amount_cents,
  method,
  reference,
  received_at,
  recorded_by
"#;

pub struct NewCharge<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub guardian_id: Uuid,
    pub registration_id: Option<Uuid>,
    pub kind: &'a str,
    pub description: &'a str,
    pub amount_cents: i64,
    pub created_by: Uuid,
}

pub async fn insert_charge(conn: &mut PgConnection, charge: NewCharge<'_>) -> sqlx::Result<ChargeRow> {
    let sql = format!(
        r#"
INSERT INTO charges (
  id,
  organization_id,
  guardian_id,
  registration_id,
  kind,
  description,
  amount_cents,
  created_by
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING {CHARGE_COLUMNS}
"#
    );
    sqlx::query_as::<_, ChargeRow>(&sql)
        .bind(charge.id)
        .bind(charge.organization_id)
        .bind(charge.guardian_id)
        .bind(charge.registration_id)
        .bind(charge.kind)
        .bind(charge.description)
        .bind(charge.amount_cents)
        .bind(charge.created_by)
        .fetch_one(conn)
        .await
}

const SQL_VOID_REGISTRATION_CHARGES: &str = r#"
UPDATE charges
SET voided_at = now()
WHERE registration_id = $1
  AND voided_at IS NULL
"#;

pub async fn void_registration_charges(
    conn: &mut PgConnection,
    registration_id: Uuid,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_VOID_REGISTRATION_CHARGES)
        .bind(registration_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list_charges_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<ChargeRow>> {
    let sql = format!(
        "SELECT {CHARGE_COLUMNS} FROM charges WHERE guardian_id = $1 ORDER BY created_at ASC"
    );
    sqlx::query_as::<_, ChargeRow>(&sql)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}

pub struct NewPayment<'a> {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub guardian_id: Uuid,
    pub amount_cents: i64,
    pub method: &'a str,
    pub reference: Option<&'a str>,
    pub recorded_by: Uuid,
}

pub async fn insert_payment(
    conn: &mut PgConnection,
    payment: NewPayment<'_>,
) -> sqlx::Result<PaymentRow> {
    let sql = format!(
        r#"
INSERT INTO payments (
  id,
  organization_id,
  guardian_id,
  amount_cents,
  method,
  reference,
  recorded_by
) VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING {PAYMENT_COLUMNS}
"#
    );
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(payment.id)
        .bind(payment.organization_id)
        .bind(payment.guardian_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(payment.reference)
        .bind(payment.recorded_by)
        .fetch_one(conn)
        .await
}

pub async fn list_payments_for_guardian(
    conn: &mut PgConnection,
    guardian_id: Uuid,
) -> sqlx::Result<Vec<PaymentRow>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE guardian_id = $1 ORDER BY received_at ASC"
    );
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(guardian_id)
        .fetch_all(conn)
        .await
}

const SQL_ORGANIZATION_TOTALS: &str = r#"
SELECT
  (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM charges WHERE voided_at IS NULL) AS charged_cents,
  (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments) AS paid_cents
"#;

/// Totals across the organization the transaction is scoped to.
pub async fn organization_totals(conn: &mut PgConnection) -> sqlx::Result<(i64, i64)> {
    sqlx::query_as::<_, (i64, i64)>(SQL_ORGANIZATION_TOTALS)
        .fetch_one(conn)
        .await
}
