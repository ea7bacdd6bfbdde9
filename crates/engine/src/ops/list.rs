use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};

use crate::{
    Account, AccountId, EngineError, Reconciliation, ReconciliationId, ResultEngine, accounts,
    reconciliations,
    util::{day_start, next_day_start},
};

use super::{Engine, require_entry, with_tx};

pub const MAX_LIST_LIMIT: u64 = 500;

/// Filters for listing reconciliations. Every set field must match.
///
/// `date_range` is inclusive on both ends and, like `single_date`, applies to
/// `value_date`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationFilter {
    pub approved_one: Option<bool>,
    pub approved_two: Option<bool>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub single_date: Option<NaiveDate>,
    pub parent_id: Option<ReconciliationId>,
    pub reference: Option<String>,
}

fn validate_list_filter(filter: &ReconciliationFilter) -> ResultEngine<()> {
    if let Some((from, to)) = filter.date_range
        && from > to
    {
        return Err(EngineError::InvalidDate(
            "invalid range: start must be <= end".to_string(),
        ));
    }
    Ok(())
}

trait ApplyReconciliationFilters: QueryFilter + Sized {
    fn apply_filters(self, filter: &ReconciliationFilter) -> Self;
}

impl<T> ApplyReconciliationFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_filters(mut self, filter: &ReconciliationFilter) -> Self {
        if let Some(approved) = filter.approved_one {
            self = self.filter(reconciliations::Column::ApprovedOne.eq(approved));
        }
        if let Some(approved) = filter.approved_two {
            self = self.filter(reconciliations::Column::ApprovedTwo.eq(approved));
        }
        if let Some((from, to)) = filter.date_range {
            self = self.filter(reconciliations::Column::ValueDate.between(from, to));
        }
        if let Some(date) = filter.single_date {
            self = self.filter(reconciliations::Column::ValueDate.eq(date));
        }
        if let Some(parent_id) = filter.parent_id {
            self = self.filter(reconciliations::Column::ParentId.eq(parent_id));
        }
        if let Some(reference) = &filter.reference {
            self = self.filter(reconciliations::Column::Reference.eq(reference.trim()));
        }
        self
    }
}

/// One line of the final report: a stage-two approved entry with the names of
/// the people who approved it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLine {
    pub entry: Reconciliation,
    pub stage_one_approver: Option<String>,
    pub stage_two_approver: Option<String>,
}

impl Engine {
    pub async fn reconciliation(&self, id: ReconciliationId) -> ResultEngine<Reconciliation> {
        require_entry(&self.database, id).await
    }

    /// Lists reconciliations ordered by id. `limit` is clamped to
    /// `1..=MAX_LIST_LIMIT`.
    pub async fn list_reconciliations(
        &self,
        filter: &ReconciliationFilter,
        limit: u64,
        offset: u64,
    ) -> ResultEngine<Vec<Reconciliation>> {
        validate_list_filter(filter)?;

        let models = reconciliations::Entity::find()
            .apply_filters(filter)
            .order_by_asc(reconciliations::Column::Id)
            .limit(limit.clamp(1, MAX_LIST_LIMIT))
            .offset(offset)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Reconciliation::from).collect())
    }

    /// Number of reconciliations matching `filter`, ignoring pagination.
    pub async fn count_reconciliations(&self, filter: &ReconciliationFilter) -> ResultEngine<u64> {
        validate_list_filter(filter)?;

        Ok(reconciliations::Entity::find()
            .apply_filters(filter)
            .count(&self.database)
            .await?)
    }

    /// Stage-two approved entries whose stage-two date falls within
    /// `[from, to]`, oldest sign-off first.
    pub async fn final_report(&self, from: NaiveDate, to: NaiveDate) -> ResultEngine<Vec<ReportLine>> {
        if from > to {
            return Err(EngineError::InvalidDate(
                "invalid range: start must be <= end".to_string(),
            ));
        }
        let lower = day_start(from);
        let upper = next_day_start(to)?;

        with_tx!(self, |db_tx| {
            let entries: Vec<Reconciliation> = reconciliations::Entity::find()
                .filter(reconciliations::Column::ApprovedTwo.eq(true))
                .filter(reconciliations::Column::ReconcileDateTwo.gte(lower))
                .filter(reconciliations::Column::ReconcileDateTwo.lt(upper))
                .order_by_asc(reconciliations::Column::ReconcileDateTwo)
                .order_by_asc(reconciliations::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Reconciliation::from)
                .collect();

            let approver_ids: HashSet<AccountId> = entries
                .iter()
                .flat_map(|entry| [entry.approval_one, entry.approval_two])
                .flatten()
                .collect();
            let mut names: HashMap<AccountId, String> = HashMap::new();
            if !approver_ids.is_empty() {
                for model in accounts::Entity::find()
                    .filter(accounts::Column::Id.is_in(approver_ids))
                    .all(&db_tx)
                    .await?
                {
                    let account = Account::try_from(model)?;
                    names.insert(account.id, account.display_name());
                }
            }

            let lines = entries
                .into_iter()
                .map(|entry| ReportLine {
                    stage_one_approver: entry.approval_one.and_then(|id| names.get(&id).cloned()),
                    stage_two_approver: entry.approval_two.and_then(|id| names.get(&id).cloned()),
                    entry,
                })
                .collect();
            Ok(lines)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_rejected() {
        let filter = ReconciliationFilter {
            date_range: Some((
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            )),
            ..ReconciliationFilter::default()
        };
        assert!(matches!(
            validate_list_filter(&filter),
            Err(EngineError::InvalidDate(_))
        ));
    }

    #[test]
    fn single_day_range_is_valid() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let filter = ReconciliationFilter {
            date_range: Some((day, day)),
            ..ReconciliationFilter::default()
        };
        assert!(validate_list_filter(&filter).is_ok());
    }
}
