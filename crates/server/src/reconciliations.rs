//! Reconciliation API endpoints

use api_types::reconciliation::{
    LineageView, OverturnKind, OverturnResponse, ReconciliationListQuery,
    ReconciliationListResponse, ReconciliationView, ReportLineView, ReportQuery, ReportResponse,
    StageOneApprove, StageOneKind, StageOneResponse, UploadResponse,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use engine::{
    Account, EngineError, MoneyCents, OverturnCmd, OverturnOutcome, Reconciliation,
    ReconciliationFilter, StageOneCmd, StageOneOutcome, StageTwoCmd, StatementLayout,
    format_display_date, parse_display_date,
};

use crate::{ServerError, server::ServerState};

const DEFAULT_LIMIT: u64 = 10;

fn view(entry: &Reconciliation) -> ReconciliationView {
    ReconciliationView {
        id: entry.id,
        value_date: format_display_date(entry.value_date),
        remarks: entry.remarks.clone(),
        customer: entry.customer.clone(),
        credit_amount_minor: entry.credit_amount.cents(),
        amount_used_minor: entry.amount_used.map(MoneyCents::cents),
        balance_minor: entry.balance.map(MoneyCents::cents),
        available_credit_minor: entry.available_credit().cents(),
        approved_one: entry.approved_one,
        approved_two: entry.approved_two,
        approval_one: entry.approval_one,
        approval_two: entry.approval_two,
        overturned_by: entry.overturned_by,
        reference: entry.reference.clone(),
        cancellation_number: entry.cancellation_number.clone(),
        way_bill_number: entry.way_bill_number.clone(),
        parent_id: entry.parent_id,
        reconcile_date_one: entry.reconcile_date_one,
        reconcile_date_two: entry.reconcile_date_two,
        cancellation_date: entry.cancellation_date,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
    }
}

/// Parses `DD-MM-YYYY,DD-MM-YYYY`.
fn parse_date_range(value: &str) -> Result<(NaiveDate, NaiveDate), EngineError> {
    let (from, to) = value.split_once(',').ok_or_else(|| {
        EngineError::InvalidDate(format!("date_range must be start,end: {value}"))
    })?;
    Ok((parse_display_date(from)?, parse_display_date(to)?))
}

fn filter_from_query(query: &ReconciliationListQuery) -> Result<ReconciliationFilter, EngineError> {
    Ok(ReconciliationFilter {
        approved_one: query.approved_one,
        approved_two: query.approved_two,
        date_range: query.date_range.as_deref().map(parse_date_range).transpose()?,
        single_date: query
            .single_date
            .as_deref()
            .map(parse_display_date)
            .transpose()?,
        parent_id: query.parent_id,
        reference: query
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string),
    })
}

/// Handle a statement upload (CSV body).
pub async fn upload(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    body: String,
) -> Result<(StatusCode, Json<UploadResponse>), ServerError> {
    let summary = state
        .engine
        .ingest_csv(body.as_bytes(), &StatementLayout::default(), Utc::now())
        .await?;
    tracing::info!(account = account.id, inserted = summary.inserted, "statement uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            inserted: summary.inserted,
            skipped: summary.skipped,
        }),
    ))
}

pub async fn approve_stage_one(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<StageOneApprove>,
) -> Result<Json<StageOneResponse>, ServerError> {
    let mut cmd = StageOneCmd::new(
        id,
        MoneyCents::new(payload.amount_used_minor),
        &account,
        Utc::now(),
    );
    if let Some(way_bill_number) = payload
        .way_bill_number
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
    {
        cmd = cmd.way_bill_number(way_bill_number);
    }

    let response = match state.engine.approve_stage_one(cmd).await? {
        StageOneOutcome::Full { entry, reference } => StageOneResponse {
            kind: StageOneKind::Full,
            reference,
            entry: view(&entry),
            parent: None,
        },
        StageOneOutcome::Partial {
            parent,
            child,
            reference,
        } => StageOneResponse {
            kind: StageOneKind::Partial,
            reference,
            entry: view(&child),
            parent: Some(view(&parent)),
        },
    };
    Ok(Json(response))
}

pub async fn approve_stage_two(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<ReconciliationView>, ServerError> {
    let entry = state
        .engine
        .approve_stage_two(StageTwoCmd::new(id, &account, Utc::now()))
        .await?;
    Ok(Json(view(&entry)))
}

pub async fn overturn(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<OverturnResponse>, ServerError> {
    let response = match state
        .engine
        .overturn(OverturnCmd::new(id, &account, Utc::now()))
        .await?
    {
        OverturnOutcome::MergedIntoParent { parent } => OverturnResponse {
            kind: OverturnKind::MergedIntoParent,
            cancellation_number: None,
            entry: view(&parent),
        },
        OverturnOutcome::Reversed {
            entry,
            cancellation_number,
        } => OverturnResponse {
            kind: OverturnKind::Reversed,
            cancellation_number: Some(cancellation_number),
            entry: view(&entry),
        },
    };
    Ok(Json(response))
}

pub async fn delete(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_reconciliation(id).await?;
    tracing::info!(account = account.id, id, "reconciliation deleted via api");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get(
    _: Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<ReconciliationView>, ServerError> {
    let entry = state.engine.reconciliation(id).await?;
    Ok(Json(view(&entry)))
}

pub async fn list(
    _: Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<ReconciliationListQuery>,
) -> Result<Json<ReconciliationListResponse>, ServerError> {
    let filter = filter_from_query(&query)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, engine::MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let entries = state
        .engine
        .list_reconciliations(&filter, limit, offset)
        .await?;
    let total = state.engine.count_reconciliations(&filter).await?;

    Ok(Json(ReconciliationListResponse {
        items: entries.iter().map(view).collect(),
        total,
        limit,
        offset,
    }))
}

pub async fn lineage(
    _: Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<LineageView>, ServerError> {
    let report = state.engine.check_lineage(id).await?;
    Ok(Json(LineageView {
        parent_id: report.parent_id,
        parent_credit_minor: report.parent_credit.cents(),
        parent_amount_used_minor: report.parent_amount_used.cents(),
        children: report.children,
        children_credit_minor: report.children_credit.cents(),
        consistent: report.consistent,
    }))
}

pub async fn report(
    _: Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, ServerError> {
    let from = parse_display_date(&query.start_date)?;
    let to = parse_display_date(&query.end_date)?;

    let lines = state
        .engine
        .final_report(from, to)
        .await?
        .into_iter()
        .map(|line| ReportLineView {
            entry: view(&line.entry),
            stage_one_approver: line.stage_one_approver,
            stage_two_approver: line.stage_two_approver,
        })
        .collect();
    Ok(Json(ReportResponse { lines }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_parses_both_bounds() {
        let (from, to) = parse_date_range("01-05-2024,31-05-2024").unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
    }

    #[test]
    fn date_range_needs_two_bounds() {
        assert!(matches!(
            parse_date_range("01-05-2024"),
            Err(EngineError::InvalidDate(_))
        ));
    }

    #[test]
    fn blank_reference_is_no_filter() {
        let query = ReconciliationListQuery {
            reference: Some("  ".to_string()),
            approved_one: Some(true),
            ..ReconciliationListQuery::default()
        };
        let filter = filter_from_query(&query).unwrap();
        assert_eq!(filter.reference, None);
        assert_eq!(filter.approved_one, Some(true));
    }
}
