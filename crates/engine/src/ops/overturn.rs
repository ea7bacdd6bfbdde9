use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

use crate::{
    EngineError, MoneyCents, OverturnCmd, Reconciliation, ReconciliationId, ReferenceKind,
    ResultEngine, reconciliations,
};

use super::{Engine, entry_not_found, find_entry, require_entry, save_entry, with_tx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverturnOutcome {
    /// A partial-funding child was removed and its slice returned to the
    /// parent's available credit.
    MergedIntoParent { parent: Reconciliation },
    /// The entry was reset to unapproved under a fresh cancellation number.
    Reversed {
        entry: Reconciliation,
        cancellation_number: String,
    },
}

impl Engine {
    /// Overturns an approval.
    ///
    /// - A child whose parent still exists and is unapproved is deleted and its
    ///   `credit_amount` released on the parent.
    /// - Any other stage-one approved entry is reset: flags and reconcile
    ///   dates cleared and a cancellation number issued. Its `amount_used`
    ///   drops to the credit its live children still hold, so only its own
    ///   draw returns to the available credit.
    ///
    /// Children are left alone, approved or not.
    pub async fn overturn(&self, cmd: OverturnCmd) -> ResultEngine<OverturnOutcome> {
        let _entry_guard = self.locks.lock(cmd.id).await;
        let parent_id = find_entry(&self.database, cmd.id)
            .await?
            .ok_or_else(|| entry_not_found(cmd.id))?
            .parent_id;
        let _parent_guard = match parent_id {
            Some(parent_id) if parent_id != cmd.id => Some(self.locks.lock(parent_id).await),
            _ => None,
        };
        let counter = self.allocator.lock(ReferenceKind::CancellationNumber).await;

        with_tx!(self, |db_tx| {
            let mut entry = require_entry(&db_tx, cmd.id).await?;
            let open_parent = match entry.parent_id {
                Some(parent_id) => find_entry(&db_tx, parent_id)
                    .await?
                    .filter(|parent| !parent.approved_one),
                None => None,
            };

            match open_parent {
                Some(mut parent) => {
                    parent.release(entry.credit_amount)?;
                    parent.updated_at = cmd.at;
                    save_entry(&db_tx, &parent).await?;
                    reconciliations::Entity::delete_by_id(entry.id)
                        .exec(&db_tx)
                        .await?;

                    tracing::info!(
                        child_id = entry.id,
                        parent_id = parent.id,
                        released = %entry.credit_amount,
                        "partial funding overturned"
                    );
                    Ok(OverturnOutcome::MergedIntoParent { parent })
                }
                None => {
                    if !entry.can_reverse() {
                        return Err(EngineError::NotApproved(format!(
                            "reconciliation {} has not passed stage one",
                            entry.id
                        )));
                    }
                    let retained = reconciliations::Entity::find()
                        .filter(reconciliations::Column::ParentId.eq(entry.id))
                        .all(&db_tx)
                        .await?
                        .into_iter()
                        .fold(MoneyCents::ZERO, |acc, child| {
                            acc + MoneyCents::new(child.credit_amount)
                        });
                    let cancellation_number = self.allocator.next(&db_tx, &counter).await?;
                    entry.reverse(cmd.approver, cancellation_number.clone(), retained, cmd.at)?;
                    save_entry(&db_tx, &entry).await?;

                    tracing::info!(
                        id = entry.id,
                        cancellation_number = %cancellation_number,
                        retained = %retained,
                        "approval overturned"
                    );
                    Ok(OverturnOutcome::Reversed {
                        entry,
                        cancellation_number,
                    })
                }
            }
        })
    }

    /// Removes an entry unconditionally. Parents and children are not
    /// compensated.
    pub async fn delete_reconciliation(&self, id: ReconciliationId) -> ResultEngine<()> {
        let _entry_guard = self.locks.lock(id).await;

        with_tx!(self, |db_tx| {
            let res = reconciliations::Entity::delete_by_id(id)
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(entry_not_found(id));
            }
            tracing::info!(id, "reconciliation deleted");
            Ok(())
        })
    }
}
