//! Command structs for ledger write operations.
//!
//! These types group parameters for approvals and overturns, keeping call
//! sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::{AccountId, Approver, MoneyCents, ReconciliationId};

/// Stage-one approval, allocating `amount_used` of the entry's credit.
#[derive(Clone, Debug)]
pub struct StageOneCmd {
    pub id: ReconciliationId,
    pub amount_used: MoneyCents,
    pub way_bill_number: Option<String>,
    pub approver: AccountId,
    pub at: DateTime<Utc>,
}

impl StageOneCmd {
    #[must_use]
    pub fn new(
        id: ReconciliationId,
        amount_used: MoneyCents,
        approver: &impl Approver,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            amount_used,
            way_bill_number: None,
            approver: approver.approver_id(),
            at,
        }
    }

    #[must_use]
    pub fn way_bill_number(mut self, way_bill_number: impl Into<String>) -> Self {
        self.way_bill_number = Some(way_bill_number.into());
        self
    }
}

/// Stage-two sign-off.
#[derive(Clone, Debug)]
pub struct StageTwoCmd {
    pub id: ReconciliationId,
    pub approver: AccountId,
    pub at: DateTime<Utc>,
}

impl StageTwoCmd {
    #[must_use]
    pub fn new(id: ReconciliationId, approver: &impl Approver, at: DateTime<Utc>) -> Self {
        Self {
            id,
            approver: approver.approver_id(),
            at,
        }
    }
}

/// Reversal of an approval (or of a partial draw).
#[derive(Clone, Debug)]
pub struct OverturnCmd {
    pub id: ReconciliationId,
    pub approver: AccountId,
    pub at: DateTime<Utc>,
}

impl OverturnCmd {
    #[must_use]
    pub fn new(id: ReconciliationId, approver: &impl Approver, at: DateTime<Utc>) -> Self {
        Self {
            id,
            approver: approver.approver_id(),
            at,
        }
    }
}
