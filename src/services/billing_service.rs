use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::billing_repo::{self, NewCharge, NewPayment};
use crate::database::tenant_context::{self, with_organization_context};
use crate::database::{children_repo, users_repo};
use crate::error::AppError;
use crate::forms::FieldError;
use crate::models::billing::{CHARGE_ADJUSTMENT, CHARGE_SESSION_FEE};
use crate::models::{CampSessionRow, ChargeRow, PaymentRow, RegistrationRow, Role};
use crate::permissions::{Actor, Permission};
use crate::services::events_service;

const PAYMENT_METHODS: [&str; 4] = ["card", "bank_transfer", "cash", "check"];

/// Amounts are integer cents. A negative balance is a credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub charged_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
}

/// Sum of charges that are not voided, minus payments.
pub fn compute_balance(charges: &[ChargeRow], payments: &[PaymentRow]) -> Balance {
    let charged_cents: i64 = charges
        .iter()
        .filter(|c| c.voided_at.is_none())
        .map(|c| c.amount_cents)
        .sum();
    let paid_cents: i64 = payments.iter().map(|p| p.amount_cents).sum();
    Balance {
        charged_cents,
        paid_cents,
        balance_cents: charged_cents - paid_cents,
    }
}

#[derive(Debug, Serialize)]
pub struct Statement {
    pub guardian_id: Uuid,
    pub charges: Vec<ChargeRow>,
    pub payments: Vec<PaymentRow>,
    pub balance: Balance,
}

/// Posts the session fee for a freshly confirmed registration. Free sessions
/// post nothing.
pub async fn post_session_fee(
    conn: &mut PgConnection,
    actor: &Actor,
    session: &CampSessionRow,
    registration: &RegistrationRow,
) -> Result<Option<ChargeRow>, AppError> {
    if session.price_cents <= 0 {
        return Ok(None);
    }
    let child = children_repo::load_child(conn, registration.child_id)
        .await?
        .ok_or(AppError::NotFound("child"))?;
    let description = format!("{} for {}", session.name, child.display_name());
    let charge = billing_repo::insert_charge(
        conn,
        NewCharge {
            id: Uuid::new_v4(),
            organization_id: registration.organization_id,
            guardian_id: child.guardian_id,
            registration_id: Some(registration.id),
            kind: CHARGE_SESSION_FEE,
            description: &description,
            amount_cents: session.price_cents,
            created_by: actor.user_id,
        },
    )
    .await?;
    Ok(Some(charge))
}

pub async fn void_registration_charges(
    conn: &mut PgConnection,
    registration_id: Uuid,
) -> Result<u64, AppError> {
    Ok(billing_repo::void_registration_charges(conn, registration_id).await?)
}

async fn load_statement(conn: &mut PgConnection, guardian_id: Uuid) -> Result<Statement, AppError> {
    let charges = billing_repo::list_charges_for_guardian(conn, guardian_id).await?;
    let payments = billing_repo::list_payments_for_guardian(conn, guardian_id).await?;
    let balance = compute_balance(&charges, &payments);
    Ok(Statement {
        guardian_id,
        charges,
        payments,
        balance,
    })
}

/// Parents read their own statement; admins read anyone's.
pub async fn statement(
    pool: &PgPool,
    actor: &Actor,
    guardian_id: Option<Uuid>,
) -> Result<Statement, AppError> {
    let actor = *actor;
    let guardian_id = match guardian_id {
        Some(id) if id != actor.user_id => {
            actor.require(Permission::BillingManage)?;
            id
        }
        _ => {
            actor.require(Permission::BillingReadOwn)?;
            actor.user_id
        }
    };
    with_organization_context(pool, actor.organization_id, move |conn| {
        Box::pin(async move { load_statement(conn, guardian_id).await })
    })
    .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub guardian_id: Uuid,
    pub amount_cents: i64,
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentInput {
    pub guardian_id: Uuid,
    /// Positive adds to what is owed; negative is a credit.
    pub amount_cents: i64,
    pub description: String,
}

async fn require_parent(conn: &mut PgConnection, actor: &Actor, guardian_id: Uuid) -> Result<(), AppError> {
    let guardian = users_repo::load_org_user(conn, actor.organization_id, guardian_id)
        .await?
        .ok_or(AppError::NotFound("guardian"))?;
    if Role::parse(&guardian.role) != Some(Role::Parent) {
        return Err(AppError::BadRequest("billing applies to parents only".into()));
    }
    Ok(())
}

pub async fn record_payment(
    pool: &PgPool,
    actor: &Actor,
    input: PaymentInput,
) -> Result<Statement, AppError> {
    actor.require(Permission::BillingManage)?;
    let mut errors = Vec::new();
    if input.amount_cents <= 0 {
        errors.push(FieldError::new("amount_cents", "Amount must be greater than zero"));
    }
    let method = input.method.trim().to_ascii_lowercase();
    if !PAYMENT_METHODS.contains(&method.as_str()) {
        errors.push(FieldError::new("method", "Unknown payment method"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    require_parent(&mut tx, actor, input.guardian_id).await?;
    let payment = billing_repo::insert_payment(
        &mut tx,
        NewPayment {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            guardian_id: input.guardian_id,
            amount_cents: input.amount_cents,
            method: &method,
            reference: input.reference.as_deref().map(str::trim).filter(|r| !r.is_empty()),
            recorded_by: actor.user_id,
        },
    )
    .await?;
    events_service::record(
        &mut tx,
        actor,
        "payment.recorded",
        "payment",
        payment.id,
        json!({ "guardian_id": input.guardian_id, "amount_cents": payment.amount_cents }),
    )
    .await?;
    let statement = load_statement(&mut tx, input.guardian_id).await?;
    tx.commit().await?;

    info!(
        payment_id = %payment.id,
        guardian_id = %input.guardian_id,
        amount_cents = payment.amount_cents,
        "payment recorded"
    );
    Ok(statement)
}

pub async fn record_adjustment(
    pool: &PgPool,
    actor: &Actor,
    input: AdjustmentInput,
) -> Result<Statement, AppError> {
    actor.require(Permission::BillingManage)?;
    let description = input.description.trim();
    let mut errors = Vec::new();
    if input.amount_cents == 0 {
        errors.push(FieldError::new("amount_cents", "Amount cannot be zero"));
    }
    if description.is_empty() {
        errors.push(FieldError::new("description", "Description is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let mut tx = tenant_context::begin(pool, actor.organization_id).await?;
    require_parent(&mut tx, actor, input.guardian_id).await?;
    let charge = billing_repo::insert_charge(
        &mut tx,
        NewCharge {
            id: Uuid::new_v4(),
            organization_id: actor.organization_id,
            guardian_id: input.guardian_id,
            registration_id: None,
            kind: CHARGE_ADJUSTMENT,
            description,
            amount_cents: input.amount_cents,
            created_by: actor.user_id,
        },
    )
    .await?;
    events_service::record(
        &mut tx,
        actor,
        "charge.adjusted",
        "charge",
        charge.id,
        json!({ "guardian_id": input.guardian_id, "amount_cents": charge.amount_cents }),
    )
    .await?;
    let statement = load_statement(&mut tx, input.guardian_id).await?;
    tx.commit().await?;
    Ok(statement)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrganizationSummary {
    pub charged_cents: i64,
    pub paid_cents: i64,
    pub outstanding_cents: i64,
}

pub async fn organization_summary(
    conn: &mut PgConnection,
) -> Result<OrganizationSummary, AppError> {
    let (charged_cents, paid_cents) = billing_repo::organization_totals(conn).await?;
    Ok(OrganizationSummary {
        charged_cents,
        paid_cents,
        outstanding_cents: charged_cents - paid_cents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn charge(amount_cents: i64, voided: bool) -> ChargeRow {
        ChargeRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            guardian_id: Uuid::nil(),
            registration_id: None,
            kind: CHARGE_SESSION_FEE.to_string(),
            description: "Week 1".to_string(),
            amount_cents,
            voided_at: voided.then(Utc::now),
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    fn payment(amount_cents: i64) -> PaymentRow {
        PaymentRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            guardian_id: Uuid::nil(),
            amount_cents,
            method: "card".to_string(),
            reference: None,
            received_at: Utc::now(),
            recorded_by: Uuid::nil(),
        }
    }

    #[test]
    fn test_voided_charges_do_not_count() {
        let balance = compute_balance(
            &[charge(25_000, false), charge(25_000, true), charge(-5_000, false)],
            &[payment(10_000)],
        );
        assert_eq!(balance.charged_cents, 20_000);
        assert_eq!(balance.paid_cents, 10_000);
        assert_eq!(balance.balance_cents, 10_000);
    }

    #[test]
    fn test_overpayment_is_credit() {
        let balance = compute_balance(&[charge(12_500, false)], &[payment(15_000)]);
        assert_eq!(balance.balance_cents, -2_500);
    }

    #[test]
    fn test_empty_statement_is_zero() {
        let balance = compute_balance(&[], &[]);
        assert_eq!(
            balance,
            Balance {
                charged_cents: 0,
                paid_cents: 0,
                balance_cents: 0
            }
        );
    }
}
