use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod reconciliation {
    use super::*;

    /// A reconciliation entry as exposed by the API.
    ///
    /// Amounts are integer minor units (cents). `value_date` is `DD-MM-YYYY`.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ReconciliationView {
        pub id: i32,
        pub value_date: String,
        pub remarks: Option<String>,
        pub customer: Option<String>,
        pub credit_amount_minor: i64,
        pub amount_used_minor: Option<i64>,
        pub balance_minor: Option<i64>,
        pub available_credit_minor: i64,
        pub approved_one: bool,
        pub approved_two: bool,
        pub approval_one: Option<i32>,
        pub approval_two: Option<i32>,
        pub overturned_by: Option<i32>,
        pub reference: Option<String>,
        pub cancellation_number: Option<String>,
        pub way_bill_number: Option<String>,
        pub parent_id: Option<i32>,
        pub reconcile_date_one: Option<DateTime<Utc>>,
        pub reconcile_date_two: Option<DateTime<Utc>>,
        pub cancellation_date: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    /// Request body for a stage-one approval.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct StageOneApprove {
        pub amount_used_minor: i64,
        pub way_bill_number: Option<String>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum StageOneKind {
        Full,
        Partial,
    }

    /// `entry` is the approved row: the entry itself, or the new child for a
    /// partial approval (then `parent` holds the updated parent).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct StageOneResponse {
        pub kind: StageOneKind,
        pub reference: String,
        pub entry: ReconciliationView,
        pub parent: Option<ReconciliationView>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum OverturnKind {
        MergedIntoParent,
        Reversed,
    }

    /// `entry` is the parent for a merge, the reset entry for a reversal.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct OverturnResponse {
        pub kind: OverturnKind,
        pub cancellation_number: Option<String>,
        pub entry: ReconciliationView,
    }

    /// Query string for listing.
    ///
    /// `date_range` is `DD-MM-YYYY,DD-MM-YYYY` (inclusive).
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ReconciliationListQuery {
        pub approved_one: Option<bool>,
        pub approved_two: Option<bool>,
        pub date_range: Option<String>,
        pub single_date: Option<String>,
        pub parent_id: Option<i32>,
        pub reference: Option<String>,
        pub limit: Option<u64>,
        pub offset: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReconciliationListResponse {
        pub items: Vec<ReconciliationView>,
        pub total: u64,
        pub limit: u64,
        pub offset: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UploadResponse {
        pub inserted: usize,
        pub skipped: usize,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LineageView {
        pub parent_id: i32,
        pub parent_credit_minor: i64,
        pub parent_amount_used_minor: i64,
        pub children: Vec<i32>,
        pub children_credit_minor: i64,
        pub consistent: bool,
    }

    /// Query string for the final report, both dates `DD-MM-YYYY`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportQuery {
        pub start_date: String,
        pub end_date: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportLineView {
        pub entry: ReconciliationView,
        pub stage_one_approver: Option<String>,
        pub stage_two_approver: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportResponse {
        pub lines: Vec<ReportLineView>,
    }
}

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub email: String,
        pub password: String,
        pub firstname: String,
        pub lastname: String,
        #[serde(default)]
        pub roles: Vec<String>,
    }

    /// Request body replacing an account's roles.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountRoles {
        pub roles: Vec<String>,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: i32,
        pub user_id: Uuid,
        pub email: String,
        pub firstname: String,
        pub lastname: String,
        pub roles: Vec<String>,
        pub status: String,
    }
}
