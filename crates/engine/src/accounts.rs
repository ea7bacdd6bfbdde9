//! Staff accounts that approve and overturn reconciliations.
//!
//! The ledger only sees accounts through [`Approver`]; roles are stored but
//! never interpreted by the engine.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

pub type AccountId = i32;

/// Anything that can be recorded as the actor of an approval or overturn.
pub trait Approver {
    fn approver_id(&self) -> AccountId;
}

impl Approver for AccountId {
    fn approver_id(&self) -> AccountId {
        *self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Pending,
    Deleted,
    Banned,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Deleted => "deleted",
            Self::Banned => "banned",
        }
    }

    pub fn parse(value: &str) -> ResultEngine<Self> {
        match value {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "deleted" => Ok(Self::Deleted),
            "banned" => Ok(Self::Banned),
            other => Err(EngineError::Database(DbErr::Type(format!(
                "unknown account status {other}"
            )))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub user_id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub roles: Vec<String>,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

impl Approver for Account {
    fn approver_id(&self) -> AccountId {
        self.id
    }
}

/// Input for [`crate::Engine::create_account`].
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub roles: Vec<String>,
    pub status: AccountStatus,
}

impl NewAccount {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            firstname: firstname.into(),
            lastname: lastname.into(),
            roles: Vec::new(),
            status: AccountStatus::Active,
        }
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trimmed, blanks dropped, first occurrence kept.
pub(crate) fn normalize_roles<I, S>(roles: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for role in roles {
        let role = role.as_ref().trim();
        if !role.is_empty() && !out.iter().any(|r| r == role) {
            out.push(role.to_string());
        }
    }
    out
}

pub(crate) fn encode_roles(roles: &[String]) -> ResultEngine<String> {
    serde_json::to_string(roles).map_err(|err| EngineError::Database(DbErr::Custom(err.to_string())))
}

const PASSWORD_COST: u32 = 10;

/// bcrypt hash in modular crypt format. Passwords longer than bcrypt's
/// 72-byte input are refused instead of silently truncated.
pub(crate) fn hash_password(password: &str) -> ResultEngine<String> {
    if password.is_empty() {
        return Err(EngineError::InvalidCredentials(
            "password must not be empty".to_string(),
        ));
    }
    bcrypt::non_truncating_hash(password, PASSWORD_COST)
        .map_err(|err| EngineError::InvalidCredentials(err.to_string()))
}

pub(crate) fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or_else(|err| {
        tracing::warn!("unreadable password hash: {err}");
        false
    })
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub roles: String,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let roles: Vec<String> = serde_json::from_str(&model.roles).map_err(|_| {
            EngineError::Database(DbErr::Type(format!(
                "account {} has malformed roles",
                model.id
            )))
        })?;
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            email: model.email,
            firstname: model.firstname,
            lastname: model.lastname,
            roles,
            status: AccountStatus::parse(&model.status)?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl NewAccount {
    pub(crate) fn into_active_model(self, at: DateTime<Utc>) -> ResultEngine<ActiveModel> {
        let roles = encode_roles(&normalize_roles(&self.roles))?;
        Ok(ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(Uuid::new_v4()),
            email: ActiveValue::Set(normalize_email(&self.email)),
            password: ActiveValue::Set(hash_password(&self.password)?),
            firstname: ActiveValue::Set(self.firstname.trim().to_string()),
            lastname: ActiveValue::Set(self.lastname.trim().to_string()),
            roles: ActiveValue::Set(roles),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            created_at: ActiveValue::Set(at),
            updated_at: ActiveValue::Set(at),
        })
    }
}
