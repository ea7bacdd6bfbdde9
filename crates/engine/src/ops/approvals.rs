use sea_orm::TransactionTrait;

use crate::{
    EngineError, Reconciliation, ReferenceKind, ResultEngine, StageOneCmd, StageTwoCmd,
    reconciliations::Allocation,
};

use super::{Engine, insert_entry, require_entry, save_entry, with_tx};

/// Result of a successful stage-one approval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOneOutcome {
    /// The whole available credit was allocated; the entry itself is approved.
    Full {
        entry: Reconciliation,
        reference: String,
    },
    /// Part of the credit was split off into a new, approved child entry.
    /// The parent stays unapproved with the remainder available.
    Partial {
        parent: Reconciliation,
        child: Reconciliation,
        reference: String,
    },
}

impl StageOneOutcome {
    pub fn reference(&self) -> &str {
        match self {
            Self::Full { reference, .. } | Self::Partial { reference, .. } => reference,
        }
    }

    /// The entry that carries the new reference.
    pub fn approved(&self) -> &Reconciliation {
        match self {
            Self::Full { entry, .. } => entry,
            Self::Partial { child, .. } => child,
        }
    }
}

impl Engine {
    /// Stage-one approval.
    ///
    /// Allocating exactly the available credit approves the entry in place.
    /// Allocating less draws `amount_used` from it into a new child entry,
    /// approved and referenced, while the parent keeps the remainder for
    /// later approvals. Both rows are written in one transaction.
    ///
    /// Fails with `AlreadyApproved` if stage one is done, and with
    /// `InvalidAmount` (entry unchanged) for a negative amount, an amount
    /// above the available credit, or a zero amount while credit remains.
    pub async fn approve_stage_one(&self, cmd: StageOneCmd) -> ResultEngine<StageOneOutcome> {
        let _entry_guard = self.locks.lock(cmd.id).await;
        let counter = self.allocator.lock(ReferenceKind::Reference).await;

        with_tx!(self, |db_tx| {
            let mut entry = require_entry(&db_tx, cmd.id).await?;
            if entry.approved_one {
                return Err(EngineError::AlreadyApproved(format!(
                    "reconciliation {} stage one",
                    entry.id
                )));
            }

            match entry.plan_stage_one(cmd.amount_used)? {
                Allocation::Full => {
                    let reference = self.allocator.next(&db_tx, &counter).await?;
                    entry.approve_in_full(
                        cmd.amount_used,
                        cmd.approver,
                        reference.clone(),
                        cmd.way_bill_number.clone(),
                        cmd.at,
                    )?;
                    save_entry(&db_tx, &entry).await?;

                    tracing::info!(
                        id = entry.id,
                        reference = %reference,
                        amount = %cmd.amount_used,
                        "stage one approved"
                    );
                    Ok(StageOneOutcome::Full { entry, reference })
                }
                Allocation::Partial => {
                    let reference = self.allocator.next(&db_tx, &counter).await?;
                    let child = entry.partial_child(
                        cmd.amount_used,
                        cmd.approver,
                        reference.clone(),
                        cmd.way_bill_number.clone(),
                        cmd.at,
                    );
                    entry.allocate(cmd.amount_used)?;
                    entry.updated_at = cmd.at;
                    save_entry(&db_tx, &entry).await?;
                    let child = insert_entry(&db_tx, &child).await?;

                    tracing::info!(
                        parent_id = entry.id,
                        child_id = child.id,
                        reference = %reference,
                        amount = %cmd.amount_used,
                        remaining = %entry.available_credit(),
                        "stage one partially funded"
                    );
                    Ok(StageOneOutcome::Partial {
                        parent: entry,
                        child,
                        reference,
                    })
                }
            }
        })
    }

    /// Stage-two sign-off of a stage-one approved entry. Amounts are not
    /// touched.
    pub async fn approve_stage_two(&self, cmd: StageTwoCmd) -> ResultEngine<Reconciliation> {
        let _entry_guard = self.locks.lock(cmd.id).await;

        with_tx!(self, |db_tx| {
            let mut entry = require_entry(&db_tx, cmd.id).await?;
            if !entry.approved_one {
                return Err(EngineError::NotApproved(format!(
                    "reconciliation {} has not passed stage one",
                    entry.id
                )));
            }
            if entry.approved_two {
                return Err(EngineError::AlreadyApproved(format!(
                    "reconciliation {} stage two",
                    entry.id
                )));
            }

            entry.approve_stage_two(cmd.approver, cmd.at);
            save_entry(&db_tx, &entry).await?;

            tracing::info!(id = entry.id, "stage two approved");
            Ok(entry)
        })
    }
}
