//! Reference and cancellation number allocation.
//!
//! Numbers are 7-digit, zero-padded decimal strings. The next number is one
//! past the larger of the highest value present on the ledger and the highest
//! value ever issued (kept in `reference_counters`), so numbers freed by a
//! deleted row are never handed out again.
//!
//! Callers take the per-kind [`CounterGuard`] before opening the DB
//! transaction and keep it until the transaction has committed.

use std::sync::Arc;

use sea_orm::{ActiveValue, QuerySelect, entity::prelude::*};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{EngineError, ResultEngine, reconciliations};

pub const REFERENCE_WIDTH: usize = 7;
pub const MAX_REFERENCE: i64 = 9_999_999;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Issued on stage-one approval, stored in `reference`.
    Reference,
    /// Issued on overturn, stored in `cancellation_number`.
    CancellationNumber,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::CancellationNumber => "cancellation_number",
        }
    }

    fn column(self) -> reconciliations::Column {
        match self {
            Self::Reference => reconciliations::Column::Reference,
            Self::CancellationNumber => reconciliations::Column::CancellationNumber,
        }
    }
}

/// Formats a counter value, failing once the 7-digit space is exhausted.
pub fn format_reference(value: i64) -> ResultEngine<String> {
    if !(1..=MAX_REFERENCE).contains(&value) {
        return Err(EngineError::Conflict(format!(
            "reference counter exhausted at {value}"
        )));
    }
    Ok(format!("{value:0width$}", width = REFERENCE_WIDTH))
}

/// Numeric value of a stored number; anything non-numeric counts as 0.
pub fn parse_reference(kind: ReferenceKind, value: &str) -> i64 {
    match value.trim().parse::<i64>() {
        Ok(parsed) if parsed >= 0 => parsed,
        _ => {
            tracing::warn!(
                kind = kind.as_str(),
                value,
                "non-numeric maximum on ledger, counting from 0"
            );
            0
        }
    }
}

/// Exclusive hold on one counter kind.
#[derive(Debug)]
pub struct CounterGuard {
    kind: ReferenceKind,
    _guard: OwnedMutexGuard<()>,
}

impl CounterGuard {
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }
}

#[derive(Debug, Default)]
pub struct ReferenceAllocator {
    reference: Arc<Mutex<()>>,
    cancellation: Arc<Mutex<()>>,
}

impl ReferenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, kind: ReferenceKind) -> CounterGuard {
        let slot = match kind {
            ReferenceKind::Reference => &self.reference,
            ReferenceKind::CancellationNumber => &self.cancellation,
        };
        CounterGuard {
            kind,
            _guard: Arc::clone(slot).lock_owned().await,
        }
    }

    /// Issues the next number of `guard`'s kind inside `db`'s transaction.
    pub async fn next<C>(&self, db: &C, guard: &CounterGuard) -> ResultEngine<String>
    where
        C: ConnectionTrait,
    {
        let kind = guard.kind();

        let scanned: Option<Option<String>> = reconciliations::Entity::find()
            .select_only()
            .column_as(kind.column().max(), "max_value")
            .into_tuple::<Option<String>>()
            .one(db)
            .await?;
        let scanned = scanned
            .flatten()
            .map(|value| parse_reference(kind, &value))
            .unwrap_or(0);

        let counter = counters::Entity::find_by_id(kind.as_str().to_string())
            .one(db)
            .await?;
        let issued = counter.as_ref().map(|c| c.last_value).unwrap_or(0);

        let value = scanned.max(issued).saturating_add(1);
        let number = format_reference(value)?;

        let active = counters::ActiveModel {
            kind: ActiveValue::Set(kind.as_str().to_string()),
            last_value: ActiveValue::Set(value),
        };
        if counter.is_some() {
            active.update(db).await?;
        } else {
            active.insert(db).await?;
        }

        Ok(number)
    }
}

pub(crate) mod counters {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "reference_counters")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub kind: String,
        pub last_value: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_seven_digits() {
        assert_eq!(format_reference(1).unwrap(), "0000001");
        assert_eq!(format_reference(42).unwrap(), "0000042");
        assert_eq!(format_reference(MAX_REFERENCE).unwrap(), "9999999");
    }

    #[test]
    fn exhausted_counter_is_a_conflict() {
        assert!(matches!(
            format_reference(MAX_REFERENCE + 1),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn non_numeric_values_count_as_zero() {
        assert_eq!(parse_reference(ReferenceKind::Reference, "0000017"), 17);
        assert_eq!(parse_reference(ReferenceKind::Reference, "REF-17"), 0);
        assert_eq!(parse_reference(ReferenceKind::CancellationNumber, ""), 0);
    }

    #[tokio::test]
    async fn kinds_lock_independently() {
        let allocator = ReferenceAllocator::new();
        let reference = allocator.lock(ReferenceKind::Reference).await;
        let cancellation = allocator.lock(ReferenceKind::CancellationNumber).await;
        assert_eq!(reference.kind(), ReferenceKind::Reference);
        assert_eq!(cancellation.kind(), ReferenceKind::CancellationNumber);
        assert!(allocator.reference.try_lock().is_err());
        drop(reference);
        assert!(allocator.reference.try_lock().is_ok());
    }
}
