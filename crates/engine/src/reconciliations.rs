//! Reconciliation entries.
//!
//! A `Reconciliation` is one credit line imported from a bank statement. It
//! moves through two approval stages; stage one allocates (part of) its
//! credit, stage two is a sign-off. Allocating less than the available credit
//! splits a *partial-funding child* off the entry instead of approving it.
//!
//! Balance convention, applied uniformly:
//!
//! - `available_credit = credit_amount - amount_used` (`amount_used` unset ⇒ 0)
//! - every write of `amount_used` also writes `balance = available_credit`
//! - on a parent, `amount_used` is cumulative and includes the slices split
//!   off to its children; a child's `credit_amount` is its slice.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{AccountId, EngineError, MoneyCents, ResultEngine};

pub type ReconciliationId = i32;

/// Approval stage an entry has reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalState {
    Unapproved,
    StageOneApproved,
    StageTwoApproved,
}

/// How a stage-one request maps onto the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Allocation {
    /// The request consumes every remaining cent: approve in place.
    Full,
    /// The request leaves credit behind: split a child off.
    Partial,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub id: ReconciliationId,
    pub value_date: NaiveDate,
    pub remarks: Option<String>,
    pub customer: Option<String>,
    pub credit_amount: MoneyCents,
    pub amount_used: Option<MoneyCents>,
    pub balance: Option<MoneyCents>,
    pub approved_one: bool,
    pub approved_two: bool,
    pub approval_one: Option<AccountId>,
    pub approval_two: Option<AccountId>,
    pub overturned_by: Option<AccountId>,
    pub reference: Option<String>,
    pub cancellation_number: Option<String>,
    pub way_bill_number: Option<String>,
    pub parent_id: Option<ReconciliationId>,
    pub reconcile_date_one: Option<DateTime<Utc>>,
    pub reconcile_date_two: Option<DateTime<Utc>>,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reconciliation {
    /// A freshly imported statement line: unapproved, nothing allocated.
    ///
    /// The id is assigned by the store on insert.
    pub(crate) fn imported(
        value_date: NaiveDate,
        remarks: String,
        credit_amount: MoneyCents,
        at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if credit_amount.is_negative() {
            return Err(EngineError::InvalidAmount(
                "credit_amount must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            id: 0,
            value_date,
            remarks: Some(remarks),
            customer: None,
            credit_amount,
            amount_used: None,
            balance: None,
            approved_one: false,
            approved_two: false,
            approval_one: None,
            approval_two: None,
            overturned_by: None,
            reference: None,
            cancellation_number: None,
            way_bill_number: None,
            parent_id: None,
            reconcile_date_one: None,
            reconcile_date_two: None,
            cancellation_date: None,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn state(&self) -> ApprovalState {
        match (self.approved_one, self.approved_two) {
            (true, true) => ApprovalState::StageTwoApproved,
            (true, false) => ApprovalState::StageOneApproved,
            _ => ApprovalState::Unapproved,
        }
    }

    /// Credit not yet allocated on this entry.
    pub fn available_credit(&self) -> MoneyCents {
        self.credit_amount - self.amount_used.unwrap_or(MoneyCents::ZERO)
    }

    pub fn is_partial_child(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Validates a stage-one request against the available credit.
    pub(crate) fn plan_stage_one(&self, amount: MoneyCents) -> ResultEngine<Allocation> {
        let available = self.available_credit();
        if amount.is_negative() {
            return Err(EngineError::InvalidAmount(
                "amount_used must be >= 0".to_string(),
            ));
        }
        if amount > available {
            return Err(EngineError::InvalidAmount(format!(
                "amount_used {amount} exceeds available credit {available}"
            )));
        }
        if amount == available {
            return Ok(Allocation::Full);
        }
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount(
                "partial amount_used must be > 0".to_string(),
            ));
        }
        Ok(Allocation::Partial)
    }

    /// Moves `amount` from available credit to `amount_used`.
    pub(crate) fn allocate(&mut self, amount: MoneyCents) -> ResultEngine<()> {
        let used = self
            .amount_used
            .unwrap_or(MoneyCents::ZERO)
            .checked_add(amount)
            .filter(|used| !used.is_negative() && *used <= self.credit_amount)
            .ok_or_else(|| {
                EngineError::InvalidAmount(format!(
                    "allocating {amount} exceeds credit {}",
                    self.credit_amount
                ))
            })?;
        self.set_used(used);
        Ok(())
    }

    /// Gives `amount` back to the available credit.
    pub(crate) fn release(&mut self, amount: MoneyCents) -> ResultEngine<()> {
        let used = self
            .amount_used
            .unwrap_or(MoneyCents::ZERO)
            .checked_sub(amount)
            .filter(|used| !used.is_negative())
            .ok_or_else(|| {
                EngineError::InvalidAmount(format!(
                    "releasing {amount} exceeds amount used on reconciliation {}",
                    self.id
                ))
            })?;
        self.set_used(used);
        Ok(())
    }

    fn set_used(&mut self, used: MoneyCents) {
        self.amount_used = Some(used);
        self.balance = Some(self.credit_amount - used);
    }

    /// Full stage-one approval in place.
    pub(crate) fn approve_in_full(
        &mut self,
        amount: MoneyCents,
        approver: AccountId,
        reference: String,
        way_bill_number: Option<String>,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        self.allocate(amount)?;
        self.approved_one = true;
        self.approval_one = Some(approver);
        self.reconcile_date_one = Some(at);
        self.reference = Some(reference);
        self.way_bill_number = way_bill_number;
        self.updated_at = at;
        Ok(())
    }

    /// Builds the stage-one-approved child funded with `amount` of this
    /// entry's credit. The caller allocates the amount on the parent.
    pub(crate) fn partial_child(
        &self,
        amount: MoneyCents,
        approver: AccountId,
        reference: String,
        way_bill_number: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            value_date: self.value_date,
            remarks: self.remarks.clone(),
            customer: self.customer.clone(),
            credit_amount: amount,
            amount_used: Some(amount),
            balance: Some(MoneyCents::ZERO),
            approved_one: true,
            approved_two: false,
            approval_one: Some(approver),
            approval_two: None,
            overturned_by: None,
            reference: Some(reference),
            cancellation_number: None,
            way_bill_number,
            parent_id: Some(self.id),
            reconcile_date_one: Some(at),
            reconcile_date_two: None,
            cancellation_date: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub(crate) fn approve_stage_two(&mut self, approver: AccountId, at: DateTime<Utc>) {
        self.approved_two = true;
        self.approval_two = Some(approver);
        self.reconcile_date_two = Some(at);
        self.updated_at = at;
    }

    /// Only approved entries can be reversed.
    pub(crate) fn can_reverse(&self) -> bool {
        self.approved_one
    }

    /// Resets the entry to unapproved. `retained` is the credit still held by
    /// live partial-funding children; it stays allocated and everything else
    /// returns to the available credit.
    pub(crate) fn reverse(
        &mut self,
        overturned_by: AccountId,
        cancellation_number: String,
        retained: MoneyCents,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let used = self.amount_used.unwrap_or(MoneyCents::ZERO);
        if retained.is_negative() || retained > used {
            return Err(EngineError::InvalidAmount(format!(
                "children of reconciliation {} hold {retained}, more than its {used} allocated",
                self.id
            )));
        }

        self.approved_one = false;
        self.approved_two = false;
        self.reconcile_date_one = None;
        self.reconcile_date_two = None;
        self.set_used(retained);
        self.overturned_by = Some(overturned_by);
        self.cancellation_date = Some(at);
        self.cancellation_number = Some(cancellation_number);
        self.updated_at = at;
        Ok(())
    }

    /// Active model for inserting this entry, letting the store assign the id.
    pub(crate) fn insert_model(&self) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            ..ActiveModel::from(self)
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reconciliations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub value_date: Date,
    pub remarks: Option<String>,
    pub customer: Option<String>,
    pub credit_amount: i64,
    pub amount_used: Option<i64>,
    pub balance: Option<i64>,
    pub approved_one: bool,
    pub approved_two: bool,
    pub approval_one: Option<i32>,
    pub approval_two: Option<i32>,
    pub overturned_by: Option<i32>,
    pub reference: Option<String>,
    pub cancellation_number: Option<String>,
    pub way_bill_number: Option<String>,
    pub parent_id: Option<i32>,
    pub reconcile_date_one: Option<DateTimeUtc>,
    pub reconcile_date_two: Option<DateTimeUtc>,
    pub cancellation_date: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Reconciliation> for ActiveModel {
    fn from(entry: &Reconciliation) -> Self {
        Self {
            id: ActiveValue::Set(entry.id),
            value_date: ActiveValue::Set(entry.value_date),
            remarks: ActiveValue::Set(entry.remarks.clone()),
            customer: ActiveValue::Set(entry.customer.clone()),
            credit_amount: ActiveValue::Set(entry.credit_amount.cents()),
            amount_used: ActiveValue::Set(entry.amount_used.map(MoneyCents::cents)),
            balance: ActiveValue::Set(entry.balance.map(MoneyCents::cents)),
            approved_one: ActiveValue::Set(entry.approved_one),
            approved_two: ActiveValue::Set(entry.approved_two),
            approval_one: ActiveValue::Set(entry.approval_one),
            approval_two: ActiveValue::Set(entry.approval_two),
            overturned_by: ActiveValue::Set(entry.overturned_by),
            reference: ActiveValue::Set(entry.reference.clone()),
            cancellation_number: ActiveValue::Set(entry.cancellation_number.clone()),
            way_bill_number: ActiveValue::Set(entry.way_bill_number.clone()),
            parent_id: ActiveValue::Set(entry.parent_id),
            reconcile_date_one: ActiveValue::Set(entry.reconcile_date_one),
            reconcile_date_two: ActiveValue::Set(entry.reconcile_date_two),
            cancellation_date: ActiveValue::Set(entry.cancellation_date),
            created_at: ActiveValue::Set(entry.created_at),
            updated_at: ActiveValue::Set(entry.updated_at),
        }
    }
}

impl From<Model> for Reconciliation {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            value_date: model.value_date,
            remarks: model.remarks,
            customer: model.customer,
            credit_amount: MoneyCents::new(model.credit_amount),
            amount_used: model.amount_used.map(MoneyCents::new),
            balance: model.balance.map(MoneyCents::new),
            approved_one: model.approved_one,
            approved_two: model.approved_two,
            approval_one: model.approval_one,
            approval_two: model.approval_two,
            overturned_by: model.overturned_by,
            reference: model.reference,
            cancellation_number: model.cancellation_number,
            way_bill_number: model.way_bill_number,
            parent_id: model.parent_id,
            reconcile_date_one: model.reconcile_date_one,
            reconcile_date_two: model.reconcile_date_two,
            cancellation_date: model.cancellation_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(credit: i64) -> Reconciliation {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let mut entry =
            Reconciliation::imported(date, "TRF ACME".to_string(), MoneyCents::new(credit), Utc::now())
                .unwrap();
        entry.id = 7;
        entry
    }

    fn assert_conserved(entry: &Reconciliation) {
        assert_eq!(
            entry.amount_used.unwrap_or_default() + entry.available_credit(),
            entry.credit_amount
        );
        if let (Some(used), Some(balance)) = (entry.amount_used, entry.balance) {
            assert_eq!(balance, entry.credit_amount - used);
        }
    }

    #[test]
    fn plan_distinguishes_full_and_partial() {
        let entry = entry(10_000);
        assert_eq!(entry.plan_stage_one(MoneyCents::new(10_000)).unwrap(), Allocation::Full);
        assert_eq!(entry.plan_stage_one(MoneyCents::new(4_000)).unwrap(), Allocation::Partial);
    }

    #[test]
    fn plan_rejects_out_of_range_amounts() {
        let entry = entry(10_000);
        assert!(matches!(
            entry.plan_stage_one(MoneyCents::new(10_001)),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            entry.plan_stage_one(MoneyCents::new(-1)),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            entry.plan_stage_one(MoneyCents::ZERO),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn zero_amount_closes_fully_drawn_entry() {
        let mut entry = entry(10_000);
        entry.allocate(MoneyCents::new(10_000)).unwrap();
        assert_eq!(entry.plan_stage_one(MoneyCents::ZERO).unwrap(), Allocation::Full);
    }

    #[test]
    fn allocate_and_release_keep_balance_consistent() {
        let mut entry = entry(10_000);
        assert_conserved(&entry);

        entry.allocate(MoneyCents::new(4_000)).unwrap();
        assert_eq!(entry.available_credit(), MoneyCents::new(6_000));
        assert_eq!(entry.balance, Some(MoneyCents::new(6_000)));
        assert_conserved(&entry);

        entry.allocate(MoneyCents::new(6_000)).unwrap();
        assert_eq!(entry.balance, Some(MoneyCents::ZERO));
        assert!(entry.allocate(MoneyCents::new(1)).is_err());

        entry.release(MoneyCents::new(4_000)).unwrap();
        assert_eq!(entry.available_credit(), MoneyCents::new(4_000));
        assert_conserved(&entry);
        assert!(entry.release(MoneyCents::new(6_001)).is_err());
    }

    #[test]
    fn partial_child_carries_lineage() {
        let mut parent = entry(10_000);
        parent.customer = Some("ACME LTD".to_string());
        let at = Utc::now();
        let child = parent.partial_child(MoneyCents::new(4_000), 3, "0000002".to_string(), None, at);

        assert_eq!(child.parent_id, Some(parent.id));
        assert_eq!(child.credit_amount, MoneyCents::new(4_000));
        assert_eq!(child.amount_used, Some(MoneyCents::new(4_000)));
        assert_eq!(child.balance, Some(MoneyCents::ZERO));
        assert_eq!(child.state(), ApprovalState::StageOneApproved);
        assert_eq!(child.remarks, parent.remarks);
        assert_eq!(child.customer, parent.customer);
        assert_eq!(child.reconcile_date_one, Some(at));
        assert_conserved(&child);
    }

    #[test]
    fn reverse_restores_credit_and_clears_dates() {
        let mut entry = entry(10_000);
        let at = Utc::now();
        entry
            .approve_in_full(MoneyCents::new(10_000), 1, "0000001".to_string(), None, at)
            .unwrap();
        entry.approve_stage_two(2, at);
        assert_eq!(entry.state(), ApprovalState::StageTwoApproved);
        assert!(entry.can_reverse());

        entry
            .reverse(3, "0000001".to_string(), MoneyCents::ZERO, at)
            .unwrap();
        assert_eq!(entry.state(), ApprovalState::Unapproved);
        assert_eq!(entry.reconcile_date_one, None);
        assert_eq!(entry.reconcile_date_two, None);
        assert_eq!(entry.amount_used, Some(MoneyCents::ZERO));
        assert_eq!(entry.available_credit(), MoneyCents::new(10_000));
        assert_eq!(entry.overturned_by, Some(3));
        assert!(!entry.can_reverse());
        assert_conserved(&entry);
    }

    #[test]
    fn reverse_keeps_credit_held_by_children() {
        let mut entry = entry(10_000);
        let at = Utc::now();
        entry.allocate(MoneyCents::new(4_000)).unwrap();
        assert!(!entry.can_reverse());
        entry
            .approve_in_full(MoneyCents::new(6_000), 1, "0000002".to_string(), None, at)
            .unwrap();

        entry
            .reverse(3, "0000001".to_string(), MoneyCents::new(4_000), at)
            .unwrap();
        assert_eq!(entry.amount_used, Some(MoneyCents::new(4_000)));
        assert_eq!(entry.available_credit(), MoneyCents::new(6_000));
        assert_conserved(&entry);
    }

    #[test]
    fn reverse_refuses_children_beyond_allocation() {
        let mut entry = entry(10_000);
        let at = Utc::now();
        entry
            .approve_in_full(MoneyCents::new(10_000), 1, "0000001".to_string(), None, at)
            .unwrap();
        let before = entry.clone();

        let err = entry
            .reverse(3, "0000001".to_string(), MoneyCents::new(10_001), at)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
        assert_eq!(entry, before);
    }
}
