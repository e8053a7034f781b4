//! PostgreSQL repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, Campaign, CampaignId, CampaignImage, CampaignRepository, DatabaseError,
    DatabaseHealth, NON_PRIMARY_FLAG, NewCampaign, NewCampaignImage, NewUser, PRIMARY_FLAG,
    Transaction, TransactionRepository, TransactionStatus, User, UserId, UserRepository,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

const USER_COLUMNS: &str =
    "id, name, occupation, email, password_hash, avatar_file_name, created_at, updated_at";

const CAMPAIGN_COLUMNS: &str = "c.id, c.user_id, c.name, c.short_description, c.description, \
     c.perks, c.goal_amount, c.current_amount, c.slug, c.created_at, c.updated_at";

const IMAGE_COLUMNS: &str = "id, campaign_id, file_name, is_primary, created_at, updated_at";

/// Selects the newest primary image of `c` into `pi_*` columns.
const PRIMARY_IMAGE_JOIN: &str = "LEFT JOIN LATERAL ( \
         SELECT i.id, i.file_name, i.is_primary, i.created_at, i.updated_at \
         FROM campaign_images i \
         WHERE i.campaign_id = c.id AND i.is_primary = 1 \
         ORDER BY i.id DESC LIMIT 1 \
     ) pi ON TRUE";

const PRIMARY_IMAGE_COLUMNS: &str = "pi.id AS pi_id, pi.file_name AS pi_file_name, \
     pi.is_primary AS pi_is_primary, pi.created_at AS pi_created_at, \
     pi.updated_at AS pi_updated_at";

/// PostgreSQL-backed store for users, campaigns, images and pledges.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// The underlying pool, for seeding rows no repository writes.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_user(row: &PgRow, prefix: &str) -> Result<User, AppError> {
        let col = |name: &str| format!("{prefix}{name}");
        Ok(User {
            id: row.try_get(col("id").as_str())?,
            name: row.try_get(col("name").as_str())?,
            occupation: row.try_get(col("occupation").as_str())?,
            email: row.try_get(col("email").as_str())?,
            password_hash: row.try_get(col("password_hash").as_str())?,
            avatar_file_name: row.try_get(col("avatar_file_name").as_str())?,
            created_at: row.try_get(col("created_at").as_str())?,
            updated_at: row.try_get(col("updated_at").as_str())?,
        })
    }

    fn row_to_campaign(row: &PgRow) -> Result<Campaign, AppError> {
        Ok(Campaign {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            short_description: row.try_get("short_description")?,
            description: row.try_get("description")?,
            perks: row.try_get("perks")?,
            goal_amount: row.try_get("goal_amount")?,
            current_amount: row.try_get("current_amount")?,
            slug: row.try_get("slug")?,
            images: Vec::new(),
            user: None,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_image(row: &PgRow) -> Result<CampaignImage, AppError> {
        Ok(CampaignImage {
            id: row.try_get("id")?,
            campaign_id: row.try_get("campaign_id")?,
            file_name: row.try_get("file_name")?,
            is_primary: row.try_get("is_primary")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Campaign row joined with `PRIMARY_IMAGE_JOIN`.
    fn row_to_campaign_with_primary(row: &PgRow) -> Result<Campaign, AppError> {
        let mut campaign = Self::row_to_campaign(row)?;
        let image_id: Option<i64> = row.try_get("pi_id")?;
        if let Some(id) = image_id {
            campaign.images.push(CampaignImage {
                id,
                campaign_id: campaign.id,
                file_name: row.try_get("pi_file_name")?,
                is_primary: row.try_get("pi_is_primary")?,
                created_at: row.try_get("pi_created_at")?,
                updated_at: row.try_get("pi_updated_at")?,
            });
        }
        Ok(campaign)
    }

    fn row_to_transaction(row: &PgRow) -> Result<Transaction, AppError> {
        let status: String = row.try_get("t_status")?;
        Ok(Transaction {
            id: row.try_get("t_id")?,
            campaign_id: row.try_get("t_campaign_id")?,
            user_id: row.try_get("t_user_id")?,
            amount: row.try_get("t_amount")?,
            status: status
                .parse::<TransactionStatus>()
                .map_err(|e| AppError::Database(DatabaseError::Query(e)))?,
            code: row.try_get("t_code")?,
            user: None,
            campaign: None,
            created_at: row.try_get("t_created_at")?,
            updated_at: row.try_get("t_updated_at")?,
        })
    }

    async fn list_campaigns_with_primary(
        &self,
        owner: Option<UserId>,
    ) -> Result<Vec<Campaign>, AppError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS}, {PRIMARY_IMAGE_COLUMNS} \
             FROM campaigns c {PRIMARY_IMAGE_JOIN} \
             WHERE ($1::BIGINT IS NULL OR c.user_id = $1) \
             ORDER BY c.id"
        );
        let rows = sqlx::query(&sql).bind(owner).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_campaign_with_primary).collect()
    }
}

#[async_trait]
impl DatabaseHealth for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresClient {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn save(&self, user: &NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (name, occupation, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user.name)
            .bind(&user.occupation)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_user(&row, "")
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Self::row_to_user(&row, "")).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(|row| Self::row_to_user(&row, "")).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update(&self, user: &User) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET name = $2, occupation = $3, email = $4, password_hash = $5, \
             avatar_file_name = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.occupation)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.avatar_file_name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {}", user.id)))?;
        Self::row_to_user(&row, "")
    }
}

#[async_trait]
impl CampaignRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Campaign>, AppError> {
        self.list_campaigns_with_primary(None).await
    }

    #[instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Campaign>, AppError> {
        self.list_campaigns_with_primary(Some(user_id)).await
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: CampaignId) -> Result<Option<Campaign>, AppError> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c WHERE c.id = $1");
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let mut campaign = Self::row_to_campaign(&row)?;

        let images_sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM campaign_images \
             WHERE campaign_id = $1 \
             ORDER BY (is_primary = $2) DESC, id"
        );
        campaign.images = sqlx::query(&images_sql)
            .bind(id)
            .bind(PRIMARY_FLAG)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(Self::row_to_image)
            .collect::<Result<_, _>>()?;
        campaign.user = UserRepository::find_by_id(self, campaign.user_id).await?;

        Ok(Some(campaign))
    }

    #[instrument(skip(self, campaign), fields(user_id = campaign.user_id))]
    async fn save(&self, campaign: &NewCampaign) -> Result<Campaign, AppError> {
        let sql = format!(
            "INSERT INTO campaigns AS c \
                 (user_id, name, short_description, description, perks, goal_amount, slug) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(campaign.user_id)
            .bind(&campaign.name)
            .bind(&campaign.short_description)
            .bind(&campaign.description)
            .bind(&campaign.perks)
            .bind(campaign.goal_amount)
            .bind(&campaign.slug)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_campaign(&row)
    }

    #[instrument(skip(self, campaign), fields(campaign_id = campaign.id))]
    async fn update(&self, campaign: &Campaign) -> Result<Campaign, AppError> {
        let sql = format!(
            "UPDATE campaigns AS c SET name = $2, short_description = $3, description = $4, \
             perks = $5, goal_amount = $6, updated_at = NOW() \
             WHERE c.id = $1 RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(campaign.id)
            .bind(&campaign.name)
            .bind(&campaign.short_description)
            .bind(&campaign.description)
            .bind(&campaign.perks)
            .bind(campaign.goal_amount)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Campaign {}", campaign.id)))?;

        let mut updated = Self::row_to_campaign(&row)?;
        updated.images = campaign.images.clone();
        updated.user = campaign.user.clone();
        Ok(updated)
    }

    #[instrument(skip(self, image), fields(campaign_id = image.campaign_id))]
    async fn create_image(&self, image: &NewCampaignImage) -> Result<CampaignImage, AppError> {
        let sql = format!(
            "INSERT INTO campaign_images (campaign_id, file_name, is_primary) \
             VALUES ($1, $2, $3) RETURNING {IMAGE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(image.campaign_id)
            .bind(&image.file_name)
            .bind(image.is_primary)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_image(&row)
    }

    #[instrument(skip(self, image), fields(campaign_id = image.campaign_id))]
    async fn replace_primary_image(
        &self,
        image: &NewCampaignImage,
    ) -> Result<CampaignImage, AppError> {
        let mut tx = self.pool.begin().await?;

        // The campaign row lock serializes concurrent primary uploads.
        sqlx::query("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
            .bind(image.campaign_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Campaign {}", image.campaign_id)))?;

        sqlx::query(
            "UPDATE campaign_images SET is_primary = $2, updated_at = NOW() \
             WHERE campaign_id = $1 AND is_primary <> $2",
        )
        .bind(image.campaign_id)
        .bind(NON_PRIMARY_FLAG)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "INSERT INTO campaign_images (campaign_id, file_name, is_primary) \
             VALUES ($1, $2, $3) RETURNING {IMAGE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(image.campaign_id)
            .bind(&image.file_name)
            .bind(PRIMARY_FLAG)
            .fetch_one(&mut *tx)
            .await?;
        let created = Self::row_to_image(&row)?;

        tx.commit().await?;
        Ok(created)
    }
}

#[async_trait]
impl TransactionRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn find_by_campaign_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Transaction>, AppError> {
        let rows = sqlx::query(
            "SELECT t.id AS t_id, t.campaign_id AS t_campaign_id, t.user_id AS t_user_id, \
                    t.amount AS t_amount, t.status AS t_status, t.code AS t_code, \
                    t.created_at AS t_created_at, t.updated_at AS t_updated_at, \
                    u.id AS u_id, u.name AS u_name, u.occupation AS u_occupation, \
                    u.email AS u_email, u.password_hash AS u_password_hash, \
                    u.avatar_file_name AS u_avatar_file_name, \
                    u.created_at AS u_created_at, u.updated_at AS u_updated_at \
             FROM transactions t \
             JOIN users u ON u.id = t.user_id \
             WHERE t.campaign_id = $1 \
             ORDER BY t.id DESC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let mut transaction = Self::row_to_transaction(row)?;
                transaction.user = Some(Self::row_to_user(row, "u_")?);
                Ok(transaction)
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Transaction>, AppError> {
        let sql = format!(
            "SELECT t.id AS t_id, t.campaign_id AS t_campaign_id, t.user_id AS t_user_id, \
                    t.amount AS t_amount, t.status AS t_status, t.code AS t_code, \
                    t.created_at AS t_created_at, t.updated_at AS t_updated_at, \
                    {CAMPAIGN_COLUMNS}, {PRIMARY_IMAGE_COLUMNS} \
             FROM transactions t \
             JOIN campaigns c ON c.id = t.campaign_id \
             {PRIMARY_IMAGE_JOIN} \
             WHERE t.user_id = $1 \
             ORDER BY t.id DESC"
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let mut transaction = Self::row_to_transaction(row)?;
                transaction.campaign = Some(Self::row_to_campaign_with_primary(row)?);
                Ok(transaction)
            })
            .collect()
    }
}
