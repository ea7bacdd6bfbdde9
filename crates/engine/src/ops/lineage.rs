use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};

use crate::{MoneyCents, Reconciliation, ReconciliationId, ResultEngine, reconciliations};

use super::{Engine, require_entry, with_tx};

/// Totals for one parent and its partial-funding children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineageReport {
    pub parent_id: ReconciliationId,
    pub parent_credit: MoneyCents,
    pub parent_amount_used: MoneyCents,
    pub children: Vec<ReconciliationId>,
    pub children_credit: MoneyCents,
    /// `children_credit <= parent_amount_used <= parent_credit`
    pub consistent: bool,
}

impl LineageReport {
    fn evaluate(parent: &Reconciliation, children: &[Reconciliation]) -> Self {
        let parent_amount_used = parent.amount_used.unwrap_or(MoneyCents::ZERO);
        let children_credit = children
            .iter()
            .fold(MoneyCents::ZERO, |acc, child| acc + child.credit_amount);
        let consistent = !parent_amount_used.is_negative()
            && children_credit <= parent_amount_used
            && parent_amount_used <= parent.credit_amount;
        Self {
            parent_id: parent.id,
            parent_credit: parent.credit_amount,
            parent_amount_used,
            children: children.iter().map(|child| child.id).collect(),
            children_credit,
            consistent,
        }
    }
}

impl Engine {
    /// Checks that the slices split off a parent never exceed what was
    /// allocated on it.
    pub async fn check_lineage(&self, parent_id: ReconciliationId) -> ResultEngine<LineageReport> {
        with_tx!(self, |db_tx| {
            let parent = require_entry(&db_tx, parent_id).await?;
            let children: Vec<Reconciliation> = reconciliations::Entity::find()
                .filter(reconciliations::Column::ParentId.eq(parent_id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Reconciliation::from)
                .collect();

            let report = LineageReport::evaluate(&parent, &children);
            if !report.consistent {
                tracing::warn!(
                    parent_id,
                    parent_credit = %report.parent_credit,
                    parent_amount_used = %report.parent_amount_used,
                    children_credit = %report.children_credit,
                    "lineage inconsistent"
                );
            }
            Ok(report)
        })
    }

    /// Rewrites `balance` wherever it disagrees with
    /// `credit_amount - amount_used`. Returns the number of rows fixed.
    pub async fn recompute_balances(&self) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let models = reconciliations::Entity::find()
                .filter(reconciliations::Column::AmountUsed.is_not_null())
                .all(&db_tx)
                .await?;

            let mut fixed = 0u64;
            for model in models {
                let Some(used) = model.amount_used else {
                    continue;
                };
                let expected = model.credit_amount - used;
                if model.balance == Some(expected) {
                    continue;
                }
                tracing::warn!(
                    id = model.id,
                    stored = ?model.balance,
                    expected,
                    "balance repaired"
                );
                reconciliations::ActiveModel {
                    id: ActiveValue::Unchanged(model.id),
                    balance: ActiveValue::Set(Some(expected)),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
                fixed += 1;
            }
            Ok(fixed)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn parent(credit: i64, used: Option<i64>) -> Reconciliation {
        let mut entry = Reconciliation::imported(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "TRF".to_string(),
            MoneyCents::new(credit),
            Utc::now(),
        )
        .unwrap();
        entry.id = 1;
        entry.amount_used = used.map(MoneyCents::new);
        entry
    }

    fn child(id: i32, credit: i64) -> Reconciliation {
        let mut entry = parent(credit, Some(credit));
        entry.id = id;
        entry.parent_id = Some(1);
        entry
    }

    #[test]
    fn children_within_allocation_are_consistent() {
        let report = LineageReport::evaluate(
            &parent(10_000, Some(7_000)),
            &[child(2, 4_000), child(3, 3_000)],
        );
        assert!(report.consistent);
        assert_eq!(report.children, vec![2, 3]);
        assert_eq!(report.children_credit, MoneyCents::new(7_000));
    }

    #[test]
    fn children_beyond_allocation_are_flagged() {
        let report = LineageReport::evaluate(&parent(10_000, Some(4_000)), &[
            child(2, 4_000),
            child(3, 3_000),
        ]);
        assert!(!report.consistent);
    }

    #[test]
    fn parent_without_children_is_consistent() {
        let report = LineageReport::evaluate(&parent(10_000, None), &[]);
        assert!(report.consistent);
        assert_eq!(report.parent_amount_used, MoneyCents::ZERO);
    }
}
