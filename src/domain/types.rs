use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Identifier of a registered user.
pub type UserId = i64;

/// Identifier of a campaign.
pub type CampaignId = i64;

/// Identifier of a pledge transaction.
pub type TransactionId = i64;

/// Stored value of `CampaignImage::is_primary` that marks the headline image.
/// Any other value reads as "not primary".
pub const PRIMARY_FLAG: i16 = 1;

/// Stored value written for every non-primary image.
pub const NON_PRIMARY_FLAG: i16 = 0;

/// A registered account.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub occupation: String,
    pub email: String,
    /// PHC-formatted password hash. The plaintext is never stored.
    pub password_hash: String,
    pub avatar_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("occupation", &self.occupation)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("avatar_file_name", &self.avatar_file_name)
            .finish()
    }
}

/// Data needed to persist a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub password_hash: String,
}

/// A funding project owned by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub short_description: String,
    pub description: String,
    /// Free-text, comma-separated list of rewards.
    pub perks: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub slug: String,
    /// Populated by the repository; primary image first when one exists.
    pub images: Vec<CampaignImage>,
    /// Owning user, populated only for detail reads.
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Overwrites the mutable attributes. Owner and slug are left alone.
    pub fn apply(&mut self, input: &CampaignInput) {
        self.name = input.name.clone();
        self.short_description = input.short_description.clone();
        self.description = input.description.clone();
        self.perks = input.perks.clone();
        self.goal_amount = input.goal_amount;
        self.updated_at = Utc::now();
    }
}

/// Data needed to persist a new campaign.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub user_id: UserId,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub perks: String,
    pub goal_amount: i64,
    pub slug: String,
}

/// One picture in a campaign's gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignImage {
    pub id: i64,
    pub campaign_id: CampaignId,
    /// Reference returned by blob storage.
    pub file_name: String,
    pub is_primary: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignImage {
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.is_primary == PRIMARY_FLAG
    }
}

/// Data needed to persist a new campaign image.
#[derive(Debug, Clone)]
pub struct NewCampaignImage {
    pub campaign_id: CampaignId,
    pub file_name: String,
    pub is_primary: i16,
}

/// Payment state of a pledge. Transitions belong to the payment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Failed,
}

impl TransactionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

/// A pledge by one user against one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub campaign_id: CampaignId,
    pub user_id: UserId,
    pub amount: i64,
    pub status: TransactionStatus,
    pub code: String,
    /// Pledging user, populated by the by-campaign view.
    pub user: Option<User>,
    /// Campaign with only its primary image, populated by the by-user view.
    pub campaign: Option<Campaign>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterUserInput {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "occupation is required"))]
    pub occupation: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8 to 128 characters"))]
    pub password: String,
}

/// Login payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Email availability payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckEmailInput {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

/// Payload for creating and updating a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CampaignInput {
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "short_description is required"))]
    pub short_description: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "goal_amount must be positive"))]
    pub goal_amount: i64,
    #[validate(length(min = 1, message = "perks is required"))]
    pub perks: String,
}

/// Normalizes an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(database: HealthStatus) -> Self {
        Self {
            status: database.clone(),
            database,
            timestamp: Utc::now(),
        }
    }
}
