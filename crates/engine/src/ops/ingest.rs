use std::{collections::HashSet, io::Read};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

use crate::{
    CandidateEntry, EngineError, IngestSummary, Reconciliation, ResultEngine, StatementLayout,
    StatementRow, read_csv_statement, reconciliations,
};

use super::{Engine, with_tx};

impl Engine {
    /// Stores every statement row not already on the ledger as an unapproved
    /// entry.
    ///
    /// A row duplicates another when `(value_date, remarks)` match exactly,
    /// either against the store or earlier in the same batch. Any unparsable
    /// row fails the whole upload; an upload with no novel rows fails with
    /// `UploadRejected`. Either way nothing is written.
    pub async fn ingest_statement(
        &self,
        rows: &[StatementRow],
        at: DateTime<Utc>,
    ) -> ResultEngine<IngestSummary> {
        let candidates = rows
            .iter()
            .map(StatementRow::to_candidate)
            .collect::<ResultEngine<Vec<CandidateEntry>>>()?;

        with_tx!(self, |db_tx| {
            let mut seen: HashSet<(NaiveDate, String)> = HashSet::new();
            let mut summary = IngestSummary::default();

            for candidate in candidates {
                let key = (candidate.value_date, candidate.remarks.clone());
                if seen.contains(&key) {
                    summary.skipped += 1;
                    continue;
                }
                let existing = reconciliations::Entity::find()
                    .filter(reconciliations::Column::ValueDate.eq(candidate.value_date))
                    .filter(reconciliations::Column::Remarks.eq(candidate.remarks.as_str()))
                    .one(&db_tx)
                    .await?;
                seen.insert(key);
                if existing.is_some() {
                    summary.skipped += 1;
                    continue;
                }

                Reconciliation::imported(
                    candidate.value_date,
                    candidate.remarks,
                    candidate.credit_amount,
                    at,
                )?
                .insert_model()
                .insert(&db_tx)
                .await?;
                summary.inserted += 1;
            }

            if summary.inserted == 0 {
                return Err(EngineError::UploadRejected(format!(
                    "no new entries among {} rows",
                    summary.skipped
                )));
            }

            tracing::info!(
                inserted = summary.inserted,
                skipped = summary.skipped,
                "statement ingested"
            );
            Ok(summary)
        })
    }

    /// Reads a CSV statement and ingests it.
    pub async fn ingest_csv<R: Read>(
        &self,
        reader: R,
        layout: &StatementLayout,
        at: DateTime<Utc>,
    ) -> ResultEngine<IngestSummary> {
        let rows = read_csv_statement(reader, layout)?;
        self.ingest_statement(&rows, at).await
    }
}
