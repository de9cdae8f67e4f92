use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Pool, Postgres, QueryBuilder};

use muxi_core::cooldown::{HEAD_IMAGE_COOLDOWN, PASSWORD_COOLDOWN, USERNAME_COOLDOWN};
use muxi_core::credentials::{hash_password, verify_password};
use muxi_core::error::AppError;
use muxi_core::models::{Group, User, UserFilter};
use muxi_core::pagination::{Page, Pagination};
use muxi_core::search::contains_pattern;

use crate::error::{db_error, map_unique};

const USERNAME_TAKEN: &str = "username already taken";

/// Repository for accounts, credentials and wallets.
#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Fails with `Conflict` when the username exists.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        group: Group,
    ) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password_hash, user_group)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(group.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, USERNAME_TAKEN))?;

        Ok(row.into())
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(r#"SELECT * FROM users WHERE username = $1"#)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    /// List accounts ordered by id, filtered by username substring and group.
    pub async fn list(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<Page<User>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_user_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
        push_user_filter(&mut select, filter);
        select
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows: Vec<UserRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            total,
            pagination,
        ))
    }

    /// Increment the token version, revoking every token issued so far.
    ///
    /// Returns false when the user does not exist.
    pub async fn bump_token_version(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET token_version = token_version + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the password after checking the cooldown window and the old password.
    ///
    /// Runs with the user row locked and bumps the token version in the same
    /// statement, so every existing token dies with the old password.
    pub async fn change_password(
        &self,
        id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let user = lock_user(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        let now = Utc::now();
        PASSWORD_COOLDOWN.check(user.password_updated_at, now)?;

        if !verify_password(old_password, &user.password_hash).await? {
            return Err(AppError::Forbidden("old password is incorrect".into()));
        }
        let new_hash = hash_password(new_password).await?;

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                password_updated_at = $3,
                token_version = token_version + 1,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&new_hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    /// Rename an account, honouring the username cooldown window.
    pub async fn change_username(&self, id: i64, new_username: &str) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let user = lock_user(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        if user.username == new_username {
            return Err(AppError::ValidationError(
                "new username is the same as the current one".into(),
            ));
        }

        let now = Utc::now();
        USERNAME_COOLDOWN.check(user.username_updated_at, now)?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = $2, username_updated_at = $3, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_username)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, USERNAME_TAKEN))?;

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }

    /// Point the account at a newly stored head image.
    ///
    /// Returns the previous image path so the caller can delete the old file.
    pub async fn change_head_image(&self, id: i64, new_path: &str) -> Result<String, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let user = lock_user(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        let now = Utc::now();
        HEAD_IMAGE_COOLDOWN.check(user.head_image_updated_at, now)?;

        sqlx::query(
            r#"
            UPDATE users
            SET head_image_path = $2, head_image_updated_at = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_path)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(user.head_image_path)
    }

    /// Apply signed deltas to both wallet balances. Neither balance may go negative.
    pub async fn adjust_coins(
        &self,
        id: i64,
        strength_delta: i64,
        select_delta: i64,
    ) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let user = lock_user(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        let strength = user.strength_coin.checked_add(strength_delta);
        let select = user.select_coin.checked_add(select_delta);
        let (Some(strength), Some(select)) = (strength, select) else {
            return Err(AppError::ValidationError("coin delta out of range".into()));
        };
        if strength < 0 || select < 0 {
            return Err(AppError::Conflict(
                "balance cannot drop below zero".into(),
            ));
        }

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET strength_coin = $2, select_coin = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(strength)
        .bind(select)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }
}

/// Read a user with `FOR UPDATE` inside an open transaction.
pub(crate) async fn lock_user(conn: &mut PgConnection, id: i64) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(r#"SELECT * FROM users WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(row.map(Into::into))
}

fn push_user_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(username) = &filter.username {
        builder
            .push(" AND username ILIKE ")
            .push_bind(contains_pattern(username));
    }
    if let Some(group) = filter.group {
        builder.push(" AND user_group = ").push_bind(group.as_str());
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    user_group: String,
    head_image_path: String,
    strength_coin: i64,
    select_coin: i64,
    token_version: i64,
    password_updated_at: Option<DateTime<Utc>>,
    username_updated_at: Option<DateTime<Utc>>,
    head_image_updated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            group: row.user_group.parse().unwrap_or(Group::User),
            head_image_path: row.head_image_path,
            strength_coin: row.strength_coin,
            select_coin: row.select_coin,
            token_version: row.token_version,
            password_updated_at: row.password_updated_at,
            username_updated_at: row.username_updated_at,
            head_image_updated_at: row.head_image_updated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
