use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};

use crate::{
    Account, AccountId, AccountStatus, EngineError, NewAccount, ResultEngine,
    accounts::{self, encode_roles, normalize_email, normalize_roles, verify_password},
};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a staff account. Emails are unique, compared case-insensitively.
    pub async fn create_account(
        &self,
        account: NewAccount,
        at: DateTime<Utc>,
    ) -> ResultEngine<Account> {
        let email = normalize_email(&account.email);

        with_tx!(self, |db_tx| {
            let existing = accounts::Entity::find()
                .filter(accounts::Column::Email.eq(email.as_str()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(email));
            }

            let model = account.into_active_model(at)?.insert(&db_tx).await?;
            let account = Account::try_from(model)?;
            tracing::info!(id = account.id, email = %account.email, "account created");
            Ok(account)
        })
    }

    /// Returns the active account matching the credentials, if any.
    pub async fn authenticate(&self, email: &str, password: &str) -> ResultEngine<Option<Account>> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(normalize_email(email)))
            .one(&self.database)
            .await?;
        let Some(model) = model else {
            return Ok(None);
        };
        if !verify_password(password, &model.password) {
            return Ok(None);
        }
        let account = Account::try_from(model)?;
        Ok((account.status == AccountStatus::Active).then_some(account))
    }

    /// Replaces the stored roles of an account. The engine never interprets
    /// them.
    pub async fn set_roles<I, S>(
        &self,
        id: AccountId,
        roles: I,
        at: DateTime<Utc>,
    ) -> ResultEngine<Account>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = normalize_roles(roles);
        let encoded = encode_roles(&roles)?;

        with_tx!(self, |db_tx| {
            if accounts::Entity::find_by_id(id).one(&db_tx).await?.is_none() {
                return Err(EngineError::KeyNotFound(format!("account {id}")));
            }
            let model = accounts::ActiveModel {
                id: ActiveValue::Unchanged(id),
                roles: ActiveValue::Set(encoded),
                updated_at: ActiveValue::Set(at),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            let account = Account::try_from(model)?;
            tracing::info!(id = account.id, roles = ?account.roles, "account roles updated");
            Ok(account)
        })
    }

    pub async fn account(&self, id: AccountId) -> ResultEngine<Account> {
        let model = accounts::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {id}")))?;
        Account::try_from(model)
    }
}
