/// Postgres credential store
use crate::db::CredentialStore;
use crate::error::{AuthError, Result};
use crate::models::{Account, FederatedCallback, OAuthProvider, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const ACCOUNT_WITH_ROLES: &str = r#"
    SELECT a.id, a.username, a.email, a.password_hash, a.token_version,
           a.created_at, a.updated_at,
           COALESCE(ARRAY_AGG(r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles
    FROM accounts a
    LEFT JOIN account_roles ar ON ar.account_id = a.id
    LEFT JOIN roles r ON r.id = ar.role_id
"#;

/// Row projection carrying the aggregated role names.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: Option<String>,
    token_version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl AccountRow {
    fn into_account(self) -> Account {
        let roles = self
            .roles
            .iter()
            .filter_map(|name| {
                let role = Role::parse(name);
                if role.is_none() {
                    tracing::warn!(role = %name, "unknown role name in database, ignoring");
                }
                role
            })
            .collect();

        Account {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            token_version: self.token_version,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        let query = format!("{ACCOUNT_WITH_ROLES} WHERE a.id = $1 GROUP BY a.id");
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AccountRow::into_account))
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        let query =
            format!("{ACCOUNT_WITH_ROLES} WHERE a.username = $1 OR a.email = $1 GROUP BY a.id");
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AccountRow::into_account))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = format!("{ACCOUNT_WITH_ROLES} WHERE a.email = $1 GROUP BY a.id");
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AccountRow::into_account))
    }

    async fn find_by_external_link(
        &self,
        provider: OAuthProvider,
        provider_user_id: &str,
    ) -> Result<Option<Account>> {
        let account_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT account_id FROM external_identities WHERE provider = $1 AND provider_user_id = $2",
        )
        .bind(provider.as_str())
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await?;

        match account_id {
            Some(id) => self.fetch_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn current_token_version(&self, username: &str) -> Result<Option<i32>> {
        let version: Option<i32> =
            sqlx::query_scalar("SELECT token_version FROM accounts WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        Ok(version)
    }

    async fn create_local_account(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Account> {
        let mut tx = self.pool.begin().await?;

        let account_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(tx.as_mut())
        .await
        .map_err(map_account_insert_error)?;

        grant_role(&mut tx, account_id, role).await?;
        tx.commit().await?;

        self.fetch_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::Internal("account vanished after insert".to_string()))
    }

    async fn create_federated_account(
        &self,
        username: &str,
        callback: &FederatedCallback,
        role: Role,
    ) -> Result<Account> {
        let mut tx = self.pool.begin().await?;

        let account_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (email, username, password_hash)
            VALUES ($1, $2, NULL)
            RETURNING id
            "#,
        )
        .bind(&callback.email)
        .bind(username)
        .fetch_one(tx.as_mut())
        .await
        .map_err(map_account_insert_error)?;

        grant_role(&mut tx, account_id, role).await?;
        tx.commit().await?;

        self.fetch_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::Internal("account vanished after insert".to_string()))
    }

    async fn link_external_identity(
        &self,
        account_id: Uuid,
        callback: &FederatedCallback,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO external_identities
                (account_id, provider, provider_user_id, email, display_name, picture_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account_id)
        .bind(callback.provider.as_str())
        .bind(&callback.provider_user_id)
        .bind(&callback.email)
        .bind(callback.display_name())
        .bind(&callback.picture_url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "external_identities_provider_key") {
                AuthError::ExternalLinkConflict
            } else {
                AuthError::from(e)
            }
        })?;

        Ok(())
    }

    async fn update_password(&self, account_id: Uuid, new_hash: &str) -> Result<i32> {
        // Single statement keeps the hash swap and the version bump atomic.
        // Postgres raises on int4 overflow, so the counter errors out instead
        // of wrapping.
        let version: i32 = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET password_hash = $2, token_version = token_version + 1, updated_at = now()
            WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(account_id)
        .bind(new_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }
}

async fn grant_role(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: Uuid,
    role: Role,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO account_roles (account_id, role_id)
        SELECT $1, id FROM roles WHERE name = $2
        "#,
    )
    .bind(account_id)
    .bind(role.as_str())
    .execute(tx.as_mut())
    .await?;

    Ok(())
}

fn map_account_insert_error(e: sqlx::Error) -> AuthError {
    if is_unique_violation(&e, "accounts_email_key") {
        AuthError::EmailTaken
    } else if is_unique_violation(&e, "accounts_username_key") {
        AuthError::UsernameTaken
    } else {
        AuthError::from(e)
    }
}

fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => db.constraint() == Some(constraint),
        _ => false,
    }
}
