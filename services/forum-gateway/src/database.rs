use crate::config::DatabaseConfig;
use crate::errors::{GatewayError, Result};
use crate::models::{AuthUser, CreatePostRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use economy_core::{
    taxonomy::{AdLevel, Channel, OperationType, PaymentType},
    Account, AppId, AppListing, AppSubmission, EntityKind, EntityRef, Error, SubmissionTask,
    TaskId, TaskStatus, Transaction, UserId, VersionId,
};
use economy_core::store::Store;
use economy_core::types::{CheckInClaim, NewAppVersion, TippableEntity};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use std::time::Duration;
use tracing::info;

type CoreResult<T> = economy_core::Result<T>;

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to Postgres"
        );

        Ok(PgStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::Internal(format!("Migration failed: {}", e)))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Resolve an unexpired session token to its user
    pub async fn find_session(&self, token: &str) -> Result<Option<AuthUser>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.username, u.level
            FROM tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = $1 AND t.expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<AuthUser> {
            Ok(AuthUser {
                id: UserId(row.try_get("id")?),
                username: row.try_get("username")?,
                role_level: row.try_get("level")?,
            })
        })
        .transpose()
    }

    pub async fn app_id_by_package(&self, package_name: &str) -> Result<Option<AppId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM apps WHERE package_name = $1")
            .bind(package_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(AppId))
    }

    pub async fn account(&self, user: UserId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, coins, exp, user_level, level
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| account_from_row(&row)).transpose()?)
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> CoreResult<PgTx> {
        let tx = self.pool.begin().await.map_err(Error::storage)?;
        Ok(PgTx { tx })
    }
}

/// Open Postgres transaction; rolled back on drop unless committed
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTx").finish_non_exhaustive()
    }
}

impl PgTx {
    /// Insert a forum post, returning its id
    pub async fn insert_post(
        &mut self,
        author: &AuthUser,
        post: &CreatePostRequest,
    ) -> CoreResult<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO posts (board_id, user_id, title, content, type, publisher, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(post.board_id())
        .bind(author.id.0)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.post_type())
        .bind(&author.username)
        .bind(&post.image_url)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(Error::storage)
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> CoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(Error::storage)
}

fn option_column<T>(row: &PgRow, name: &str, parse: fn(&str) -> Option<T>) -> CoreResult<T> {
    let value: String = column(row, name)?;
    parse(&value).ok_or_else(|| Error::Storage(format!("unexpected {} value '{}'", name, value)))
}

fn account_from_row(row: &PgRow) -> CoreResult<Account> {
    Ok(Account {
        id: UserId(column(row, "id")?),
        username: column(row, "username")?,
        coins: column(row, "coins")?,
        exp: column(row, "exp")?,
        user_level: column(row, "user_level")?,
        role_level: column(row, "level")?,
    })
}

fn task_from_row(row: &PgRow) -> CoreResult<SubmissionTask> {
    let reviewer: Option<i64> = column(row, "reviewer_id")?;

    Ok(SubmissionTask {
        id: TaskId(column(row, "id")?),
        submitter: UserId(column(row, "user_id")?),
        submission: AppSubmission {
            listing: AppListing {
                package_name: column(row, "package_name")?,
                name: column(row, "name")?,
                icon_url: column(row, "icon_url")?,
                description: column(row, "description")?,
                main_category: column(row, "main_category")?,
                sub_category: column(row, "sub_category")?,
                channel: option_column(row, "channel", Channel::parse)?,
                share_desc: column(row, "share_desc")?,
                developer_name: column(row, "developer_name")?,
                ad_level: option_column(row, "ad_level", AdLevel::parse)?,
                payment_type: option_column(row, "payment_type", PaymentType::parse)?,
                operation_type: option_column(row, "operation_type", OperationType::parse)?,
            },
            version: column(row, "version")?,
            version_code: column(row, "version_code")?,
            size: column(row, "size")?,
            download_url: column(row, "download_url")?,
            update_content: column(row, "update_content")?,
            screenshots: column(row, "screenshots")?,
        },
        status: option_column(row, "status", TaskStatus::parse)?,
        reject_reason: column(row, "reject_reason")?,
        reviewer: reviewer.map(UserId),
        review_time: column(row, "review_time")?,
        created_at: column(row, "created_at")?,
    })
}

#[async_trait]
impl Transaction for PgTx {
    async fn lock_account(&mut self, user: UserId) -> CoreResult<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, coins, exp, user_level, level
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        row.map(|row| account_from_row(&row)).transpose()
    }

    async fn save_account(&mut self, account: &Account) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET coins = $2, exp = $3, user_level = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(account.id.0)
        .bind(account.coins)
        .bind(account.exp)
        .bind(account.user_level)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        Ok(())
    }

    async fn username(&mut self, user: UserId) -> CoreResult<Option<String>> {
        sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
            .bind(user.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::storage)
    }

    async fn lock_entity(&mut self, target: EntityRef) -> CoreResult<Option<TippableEntity>> {
        let row = match target.kind {
            EntityKind::Post => {
                sqlx::query("SELECT user_id, coins FROM posts WHERE id = $1 FOR UPDATE")
            }
            EntityKind::Comment => {
                sqlx::query("SELECT user_id, coins FROM comments WHERE id = $1 FOR UPDATE")
            }
            EntityKind::App => sqlx::query(
                "SELECT NULL::BIGINT AS user_id, total_coins AS coins FROM apps WHERE id = $1 FOR UPDATE",
            ),
        }
        .bind(target.id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        row.map(|row| {
            let author: Option<i64> = column(&row, "user_id")?;
            Ok(TippableEntity {
                target,
                author: author.map(UserId),
                coins: column(&row, "coins")?,
            })
        })
        .transpose()
    }

    async fn credit_entity(&mut self, target: EntityRef, amount: i64) -> CoreResult<i64> {
        let coins: Option<i64> = match target.kind {
            EntityKind::Post => sqlx::query_scalar(
                "UPDATE posts SET coins = coins + $2, updated_at = now() WHERE id = $1 RETURNING coins",
            ),
            EntityKind::Comment => sqlx::query_scalar(
                "UPDATE comments SET coins = coins + $2, updated_at = now() WHERE id = $1 RETURNING coins",
            ),
            EntityKind::App => sqlx::query_scalar(
                "UPDATE apps SET total_coins = total_coins + $2, updated_at = now() WHERE id = $1 RETURNING total_coins",
            ),
        }
        .bind(target.id)
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        coins.ok_or(Error::EntityNotFound(target))
    }

    async fn insert_check_in(&mut self, claim: &CheckInClaim) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO check_ins (user_id, check_date, check_time, reward)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, check_date) DO NOTHING
            "#,
        )
        .bind(claim.user.0)
        .bind(claim.check_date)
        .bind(claim.check_time)
        .bind(claim.reward)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_task(
        &mut self,
        submitter: UserId,
        submission: &AppSubmission,
        created_at: DateTime<Utc>,
    ) -> CoreResult<TaskId> {
        let listing = &submission.listing;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO app_upload_tasks (
                user_id, package_name, name, icon_url, version, version_code, size,
                channel, main_category, sub_category, screenshots, description,
                share_desc, update_content, developer_name, ad_level, payment_type,
                operation_type, download_url, status, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, 'pending', $20, $20
            )
            RETURNING id
            "#,
        )
        .bind(submitter.0)
        .bind(&listing.package_name)
        .bind(&listing.name)
        .bind(&listing.icon_url)
        .bind(&submission.version)
        .bind(submission.version_code)
        .bind(submission.size)
        .bind(listing.channel.as_str())
        .bind(&listing.main_category)
        .bind(&listing.sub_category)
        .bind(&submission.screenshots)
        .bind(&listing.description)
        .bind(&listing.share_desc)
        .bind(&submission.update_content)
        .bind(&listing.developer_name)
        .bind(listing.ad_level.as_str())
        .bind(listing.payment_type.as_str())
        .bind(listing.operation_type.as_str())
        .bind(&submission.download_url)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        Ok(TaskId(id))
    }

    async fn lock_task(&mut self, task: TaskId) -> CoreResult<Option<SubmissionTask>> {
        let row = sqlx::query("SELECT * FROM app_upload_tasks WHERE id = $1 FOR UPDATE")
            .bind(task.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::storage)?;

        row.map(|row| task_from_row(&row)).transpose()
    }

    async fn save_review(&mut self, task: &SubmissionTask) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE app_upload_tasks
            SET status = $2, reject_reason = $3, reviewer_id = $4, review_time = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task.id.0)
        .bind(task.status.as_str())
        .bind(&task.reject_reason)
        .bind(task.reviewer.map(|id| id.0))
        .bind(task.review_time)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        Ok(())
    }

    async fn upsert_app(&mut self, listing: &AppListing) -> CoreResult<(AppId, bool)> {
        // xmax is zero only on a freshly inserted row version
        let row = sqlx::query(
            r#"
            INSERT INTO apps (
                package_name, name, icon_url, description, main_category, sub_category,
                channel, share_desc, developer_name, ad_level, payment_type, operation_type,
                rating, rating_count, total_coins, download_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, 0, 0, 0)
            ON CONFLICT (package_name) DO UPDATE
            SET name = EXCLUDED.name, icon_url = EXCLUDED.icon_url,
                description = EXCLUDED.description, main_category = EXCLUDED.main_category,
                sub_category = EXCLUDED.sub_category, channel = EXCLUDED.channel,
                share_desc = EXCLUDED.share_desc, developer_name = EXCLUDED.developer_name,
                ad_level = EXCLUDED.ad_level, payment_type = EXCLUDED.payment_type,
                operation_type = EXCLUDED.operation_type, updated_at = now()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(&listing.package_name)
        .bind(&listing.name)
        .bind(&listing.icon_url)
        .bind(&listing.description)
        .bind(&listing.main_category)
        .bind(&listing.sub_category)
        .bind(listing.channel.as_str())
        .bind(&listing.share_desc)
        .bind(&listing.developer_name)
        .bind(listing.ad_level.as_str())
        .bind(listing.payment_type.as_str())
        .bind(listing.operation_type.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        Ok((AppId(column(&row, "id")?), column(&row, "inserted")?))
    }

    async fn retire_latest_versions(&mut self, app: AppId) -> CoreResult<u64> {
        let result =
            sqlx::query("UPDATE app_versions SET is_latest = FALSE WHERE app_id = $1 AND is_latest")
                .bind(app.0)
                .execute(&mut *self.tx)
                .await
                .map_err(Error::storage)?;

        Ok(result.rows_affected())
    }

    async fn insert_version(&mut self, version: &NewAppVersion) -> CoreResult<VersionId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO app_versions (
                app_id, package_name, version, version_code, size, download_url,
                update_content, screenshots, uploader_id, uploader_name, is_latest
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
            RETURNING id
            "#,
        )
        .bind(version.app_id.0)
        .bind(&version.package_name)
        .bind(&version.version)
        .bind(version.version_code)
        .bind(version.size)
        .bind(&version.download_url)
        .bind(&version.update_content)
        .bind(&version.screenshots)
        .bind(version.uploader_id.0)
        .bind(&version.uploader_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(Error::storage)?;

        Ok(VersionId(id))
    }

    async fn commit(self) -> CoreResult<()> {
        self.tx.commit().await.map_err(Error::storage)
    }
}
