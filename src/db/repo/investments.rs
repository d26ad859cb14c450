//! Plans and activated investments.

use super::{decimal_col, enum_col, opt_decimal_col};
use crate::domain::{Investment, Plan, PlanId, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn plan_from_row(row: &SqliteRow) -> Result<Plan, sqlx::Error> {
    Ok(Plan {
        id: PlanId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        duration_days: row.try_get("duration_days")?,
        min_amount: decimal_col(row, "min_amount")?,
        max_amount: opt_decimal_col(row, "max_amount")?,
        return_rate: decimal_col(row, "return_rate")?,
        active: row.try_get::<i64, _>("active")? != 0,
    })
}

fn investment_from_row(row: &SqliteRow) -> Result<Investment, sqlx::Error> {
    Ok(Investment {
        id: row.try_get("id")?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        plan_id: PlanId::new(row.try_get::<String, _>("plan_id")?),
        deposit_id: row.try_get("deposit_id")?,
        principal: decimal_col(row, "principal")?,
        status: enum_col(row, "status")?,
        start_ms: TimeMs::new(row.try_get("start_ms")?),
        end_ms: TimeMs::new(row.try_get("end_ms")?),
    })
}

pub async fn fetch_plan(
    conn: &mut SqliteConnection,
    id: &PlanId,
) -> Result<Option<Plan>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, name, duration_days, min_amount, max_amount, return_rate, active
        FROM plans WHERE id = ?
        "#,
    )
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(plan_from_row).transpose()
}

pub async fn insert_investment(
    conn: &mut SqliteConnection,
    investment: &Investment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO investments (
            id, user_id, plan_id, deposit_id, principal, status, start_ms, end_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&investment.id)
    .bind(investment.user_id.as_str())
    .bind(investment.plan_id.as_str())
    .bind(&investment.deposit_id)
    .bind(investment.principal.to_canonical_string())
    .bind(investment.status.as_str())
    .bind(investment.start_ms.as_ms())
    .bind(investment.end_ms.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_investments_for_user(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Vec<Investment>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, plan_id, deposit_id, principal, status, start_ms, end_ms
        FROM investments WHERE user_id = ?
        ORDER BY start_ms ASC, id ASC
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(investment_from_row).collect()
}
