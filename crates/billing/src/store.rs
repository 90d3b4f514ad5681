//! Bill store accessor
//!
//! `BillStore` is the injected seam over the document store: the engine never
//! touches persistence directly, so tests can substitute an in-memory fake.
//! Marking a bill paid and crediting the member balance are never exposed as
//! separate operations; they only happen jointly inside `settle`, which is the
//! single cross-record transaction in the system.

use async_trait::async_trait;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::model::{Bill, BillStatus};
use crate::reconcile::evaluate;

/// Outcome of an atomic settlement: the amounts are fixed at the moment the
/// transaction re-read the bill, not at whatever the caller last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub total_owed: i64,
    /// Amount credited to the member's balance (zero for exact payment)
    pub surplus: i64,
}

/// A bill selected by the reminder sweep, with the owing member's locale
/// so the due date can be formatted for them.
#[derive(Debug, Clone)]
pub struct ReminderCandidate {
    pub bill: Bill,
    pub locale: String,
}

#[async_trait]
pub trait BillStore: Send + Sync {
    /// Bills due within `[now, now + lookahead_days]` inclusive, still owed
    /// (`unpaid` or `overdue`; reminders go out regardless of fee state).
    async fn find_due_for_reminder(
        &self,
        now: OffsetDateTime,
        lookahead_days: i64,
    ) -> BillingResult<Vec<ReminderCandidate>>;

    /// Owed bills past their due date that have not had the late fee applied
    async fn find_overdue_unfeed(&self, now: OffsetDateTime) -> BillingResult<Vec<Bill>>;

    /// Set `fee_amount`, `fee_applied = true` and move the bills to `overdue`,
    /// as one atomic batch write. Returns the number of bills updated.
    async fn apply_fee_batch(&self, bill_ids: &[Uuid], fee_amount: i64) -> BillingResult<u64>;

    async fn get(&self, bill_id: Uuid) -> BillingResult<Bill>;

    /// Atomically settle a bill against a submitted payment.
    ///
    /// Re-reads the bill under the store's transaction, evaluates the payment
    /// against the total owed, marks the bill paid and verified, and credits
    /// any surplus to the member's balance. All-or-nothing: no observer can
    /// see the bill paid without the credit committed, or vice versa.
    async fn settle(&self, bill_id: Uuid, amount_paid: i64) -> BillingResult<Settlement>;
}

/// Row shape for `bills` queries; status is validated on conversion
#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    member_id: Uuid,
    period: String,
    principal_amount: i64,
    fee_amount: i64,
    fee_applied: bool,
    due_date: OffsetDateTime,
    status: String,
    verified: bool,
}

impl TryFrom<BillRow> for Bill {
    type Error = BillingError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        let status = BillStatus::parse(&row.status).ok_or_else(|| {
            BillingError::Database(format!(
                "bill {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        Ok(Bill {
            id: row.id,
            member_id: row.member_id,
            period: row.period,
            principal_amount: row.principal_amount,
            fee_amount: row.fee_amount,
            fee_applied: row.fee_applied,
            due_date: row.due_date,
            status,
            verified: row.verified,
        })
    }
}

/// Row shape for the reminder join; flattens a `BillRow` plus the locale
#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    #[sqlx(flatten)]
    bill: BillRow,
    locale: String,
}

const BILL_COLUMNS: &str = "id, member_id, period, principal_amount, fee_amount, \
                            fee_applied, due_date, status, verified";

/// Postgres-backed bill store
#[derive(Clone)]
pub struct PgBillStore {
    pool: PgPool,
}

impl PgBillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillStore for PgBillStore {
    async fn find_due_for_reminder(
        &self,
        now: OffsetDateTime,
        lookahead_days: i64,
    ) -> BillingResult<Vec<ReminderCandidate>> {
        let window_end = now + Duration::days(lookahead_days);

        let rows: Vec<ReminderRow> = sqlx::query_as(
            r#"
            SELECT b.id, b.member_id, b.period, b.principal_amount, b.fee_amount,
                   b.fee_applied, b.due_date, b.status, b.verified, m.locale
            FROM bills b
            JOIN members m ON m.id = b.member_id
            WHERE b.status IN ('unpaid', 'overdue')
              AND b.due_date >= $1
              AND b.due_date <= $2
            "#,
        )
        .bind(now)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ReminderCandidate {
                    bill: row.bill.try_into()?,
                    locale: row.locale,
                })
            })
            .collect()
    }

    async fn find_overdue_unfeed(&self, now: OffsetDateTime) -> BillingResult<Vec<Bill>> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BILL_COLUMNS}
            FROM bills
            WHERE status IN ('unpaid', 'overdue')
              AND due_date < $1
              AND fee_applied = FALSE
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Bill::try_from).collect()
    }

    async fn apply_fee_batch(&self, bill_ids: &[Uuid], fee_amount: i64) -> BillingResult<u64> {
        if bill_ids.is_empty() {
            return Ok(0);
        }

        // Single statement keeps the batch atomic: a bill can never end up
        // with fee_applied set but no fee amount, or the reverse. The
        // fee_applied guard also excludes bills another run already updated.
        let result = sqlx::query(
            r#"
            UPDATE bills
            SET fee_amount = $2,
                fee_applied = TRUE,
                status = 'overdue',
                updated_at = NOW()
            WHERE id = ANY($1)
              AND fee_applied = FALSE
              AND status <> 'paid'
            "#,
        )
        .bind(bill_ids)
        .bind(fee_amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get(&self, bill_id: Uuid) -> BillingResult<Bill> {
        let row: Option<BillRow> =
            sqlx::query_as(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
                .bind(bill_id)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| BillingError::NotFound(format!("bill {} not found", bill_id)))?
            .try_into()
    }

    async fn settle(&self, bill_id: Uuid, amount_paid: i64) -> BillingResult<Settlement> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent settlements of the same bill; the
        // second transaction re-reads status = 'paid' and hits the
        // AlreadyPaid guard in evaluate().
        let row: Option<BillRow> = sqlx::query_as(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 FOR UPDATE"
        ))
        .bind(bill_id)
        .fetch_optional(&mut *tx)
        .await?;

        let bill: Bill = row
            .ok_or_else(|| BillingError::NotFound(format!("bill {} not found", bill_id)))?
            .try_into()?;

        let settlement = evaluate(&bill, amount_paid)?;

        sqlx::query(
            r#"
            UPDATE bills
            SET status = 'paid',
                verified = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(bill_id)
        .execute(&mut *tx)
        .await?;

        if settlement.surplus > 0 {
            let credited = sqlx::query(
                r#"
                UPDATE members
                SET balance = balance + $2,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(bill.member_id)
            .bind(settlement.surplus)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if credited == 0 {
                // Dropping the transaction rolls back the paid transition too
                return Err(BillingError::NotFound(format!(
                    "member {} not found for surplus credit",
                    bill.member_id
                )));
            }
        }

        tx.commit().await?;

        Ok(settlement)
    }
}
