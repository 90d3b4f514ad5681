//! In-memory collaborator fakes for tests
//!
//! One mutex over the whole store state gives `settle` the same
//! all-or-nothing behavior the Postgres transaction provides, so atomicity
//! properties can be asserted without a database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use duespay_shared::Role;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dispatch::PushTransport;
use crate::error::{BillingError, BillingResult};
use crate::model::{Bill, BillStatus, DispatchResult, NotificationMessage};
use crate::reconcile::evaluate;
use crate::store::{BillStore, ReminderCandidate, Settlement};
use crate::tokens::TokenDirectory;

/// A fresh unpaid bill owed by a fresh member
pub fn bill_fixture(principal: i64, due_date: OffsetDateTime) -> Bill {
    Bill {
        id: Uuid::new_v4(),
        member_id: Uuid::new_v4(),
        period: "2026-08".to_string(),
        principal_amount: principal,
        fee_amount: 0,
        fee_applied: false,
        due_date,
        status: BillStatus::Unpaid,
        verified: false,
    }
}

#[derive(Debug, Clone)]
struct MemberRecord {
    balance: i64,
    locale: String,
}

#[derive(Default)]
struct StoreState {
    bills: HashMap<Uuid, Bill>,
    members: HashMap<Uuid, MemberRecord>,
}

#[derive(Default)]
pub struct MemoryBillStore {
    state: Mutex<StoreState>,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bill(&self, bill: Bill) {
        self.state.lock().unwrap().bills.insert(bill.id, bill);
    }

    pub fn insert_member(&self, member_id: Uuid, balance: i64) {
        self.insert_member_with_locale(member_id, balance, "en-US");
    }

    pub fn insert_member_with_locale(&self, member_id: Uuid, balance: i64, locale: &str) {
        self.state.lock().unwrap().members.insert(
            member_id,
            MemberRecord {
                balance,
                locale: locale.to_string(),
            },
        );
    }

    pub fn bill(&self, bill_id: Uuid) -> Option<Bill> {
        self.state.lock().unwrap().bills.get(&bill_id).cloned()
    }

    pub fn balance(&self, member_id: Uuid) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(&member_id)
            .map(|m| m.balance)
    }
}

#[async_trait]
impl BillStore for MemoryBillStore {
    async fn find_due_for_reminder(
        &self,
        now: OffsetDateTime,
        lookahead_days: i64,
    ) -> BillingResult<Vec<ReminderCandidate>> {
        let window_end = now + time::Duration::days(lookahead_days);
        let state = self.state.lock().unwrap();
        Ok(state
            .bills
            .values()
            .filter(|b| {
                b.status != BillStatus::Paid && b.due_date >= now && b.due_date <= window_end
            })
            .map(|b| ReminderCandidate {
                bill: b.clone(),
                locale: state
                    .members
                    .get(&b.member_id)
                    .map(|m| m.locale.clone())
                    .unwrap_or_else(|| "en-US".to_string()),
            })
            .collect())
    }

    async fn find_overdue_unfeed(&self, now: OffsetDateTime) -> BillingResult<Vec<Bill>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bills
            .values()
            .filter(|b| b.status != BillStatus::Paid && b.due_date < now && !b.fee_applied)
            .cloned()
            .collect())
    }

    async fn apply_fee_batch(&self, bill_ids: &[Uuid], fee_amount: i64) -> BillingResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for id in bill_ids {
            if let Some(bill) = state.bills.get_mut(id) {
                if !bill.fee_applied && bill.status != BillStatus::Paid {
                    bill.fee_amount = fee_amount;
                    bill.fee_applied = true;
                    bill.status = BillStatus::Overdue;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn get(&self, bill_id: Uuid) -> BillingResult<Bill> {
        self.bill(bill_id)
            .ok_or_else(|| BillingError::NotFound(format!("bill {} not found", bill_id)))
    }

    async fn settle(&self, bill_id: Uuid, amount_paid: i64) -> BillingResult<Settlement> {
        let mut state = self.state.lock().unwrap();

        let bill = state
            .bills
            .get(&bill_id)
            .ok_or_else(|| BillingError::NotFound(format!("bill {} not found", bill_id)))?
            .clone();

        let settlement = evaluate(&bill, amount_paid)?;

        // Validate everything before the first mutation so a failure leaves
        // neither the paid transition nor the credit visible.
        if settlement.surplus > 0 && !state.members.contains_key(&bill.member_id) {
            return Err(BillingError::NotFound(format!(
                "member {} not found for surplus credit",
                bill.member_id
            )));
        }

        if let Some(stored) = state.bills.get_mut(&bill_id) {
            stored.status = BillStatus::Paid;
            stored.verified = true;
        }
        if settlement.surplus > 0 {
            if let Some(member) = state.members.get_mut(&bill.member_id) {
                member.balance += settlement.surplus;
            }
        }

        Ok(settlement)
    }
}

#[derive(Default)]
pub struct MemoryTokenDirectory {
    members: Mutex<HashMap<Uuid, (Role, Vec<String>)>>,
}

impl MemoryTokenDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, member_id: Uuid, token: impl Into<String>) {
        self.register_with_role(member_id, Role::Member, token);
    }

    pub fn register_with_role(&self, member_id: Uuid, role: Role, token: impl Into<String>) {
        let mut members = self.members.lock().unwrap();
        let entry = members.entry(member_id).or_insert_with(|| (role, Vec::new()));
        entry.0 = role;
        entry.1.push(token.into());
    }
}

#[async_trait]
impl TokenDirectory for MemoryTokenDirectory {
    async fn tokens_for(&self, member_id: Uuid) -> BillingResult<Vec<String>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&member_id)
            .map(|(_, tokens)| tokens.clone())
            .unwrap_or_default())
    }

    async fn tokens_for_role(&self, role: Role) -> BillingResult<HashMap<Uuid, Vec<String>>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (r, _))| *r == role)
            .map(|(id, (_, tokens))| (*id, tokens.clone()))
            .collect())
    }
}

/// One observed multicast call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tokens: Vec<String>,
    pub message: NotificationMessage,
}

/// Transport fake that records calls and injects failures.
///
/// `fail_token` marks individual tokens as rejected (counted, not raised);
/// `set_down` simulates a total outage; `outage_for_token` fails the whole
/// call only when it includes that token.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    failing_tokens: Mutex<HashSet<String>>,
    outage_tokens: Mutex<HashSet<String>>,
    down: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_token(&self, token: &str) {
        self.failing_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn outage_for_token(&self, token: &str) {
        self.outage_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &NotificationMessage,
    ) -> BillingResult<DispatchResult> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BillingError::TransportUnavailable(
                "simulated outage".to_string(),
            ));
        }
        {
            let outage = self.outage_tokens.lock().unwrap();
            if tokens.iter().any(|t| outage.contains(t)) {
                return Err(BillingError::TransportUnavailable(
                    "simulated outage".to_string(),
                ));
            }
        }

        self.calls.lock().unwrap().push(RecordedCall {
            tokens: tokens.to_vec(),
            message: message.clone(),
        });

        let failing = self.failing_tokens.lock().unwrap();
        let failure_count = tokens.iter().filter(|t| failing.contains(*t)).count() as u32;
        Ok(DispatchResult {
            success_count: tokens.len() as u32 - failure_count,
            failure_count,
        })
    }
}
