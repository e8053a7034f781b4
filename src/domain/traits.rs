//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::AppError;
use super::types::{
    Campaign, CampaignId, CampaignImage, NewCampaign, NewCampaignImage, NewUser, Transaction,
    User, UserId,
};

/// Connectivity check for the backing store.
#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Persistence of user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `DatabaseError::Duplicate` when the email is taken.
    async fn save(&self, user: &NewUser) -> Result<User, AppError>;

    /// Look up a user by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Look up a user by id.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError>;

    /// Persist the mutable attributes of an existing user.
    async fn update(&self, user: &User) -> Result<User, AppError>;
}

/// Persistence of campaigns and their image galleries.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// All campaigns, each with only its primary image loaded.
    async fn find_all(&self) -> Result<Vec<Campaign>, AppError>;

    /// Campaigns owned by `user_id`, each with only its primary image loaded.
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Campaign>, AppError>;

    /// One campaign with its full gallery (primary first) and owning user.
    async fn find_by_id(&self, id: CampaignId) -> Result<Option<Campaign>, AppError>;

    /// Insert a new campaign.
    async fn save(&self, campaign: &NewCampaign) -> Result<Campaign, AppError>;

    /// Persist the mutable attributes of an existing campaign.
    async fn update(&self, campaign: &Campaign) -> Result<Campaign, AppError>;

    /// Insert an image without touching its siblings.
    async fn create_image(&self, image: &NewCampaignImage) -> Result<CampaignImage, AppError>;

    /// Clear the primary flag on every image of the campaign, then insert
    /// `image`, as one atomic unit. Either both steps take effect or neither
    /// does, and concurrent calls for the same campaign are serialized.
    async fn replace_primary_image(
        &self,
        image: &NewCampaignImage,
    ) -> Result<CampaignImage, AppError>;
}

/// Read access to pledges.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Pledges for a campaign, newest first, each with its pledging user.
    async fn find_by_campaign_id(&self, campaign_id: CampaignId)
    -> Result<Vec<Transaction>, AppError>;

    /// Pledges by a user, newest first, each with its campaign and that
    /// campaign's primary image only.
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Transaction>, AppError>;
}

/// First path segment of every stored-upload reference, and the route the
/// uploads are served from.
pub const PUBLIC_IMAGE_PREFIX: &str = "images";

/// Blob storage for uploaded files.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` and return a stable reference to them.
    ///
    /// `owner_id` and `filename_hint` only shape the reference; callers must
    /// not rely on its format.
    async fn store(
        &self,
        owner_id: UserId,
        filename_hint: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, AppError>;

    /// Delete a previously stored upload. Unknown references are not an
    /// error.
    async fn remove(&self, reference: &str) -> Result<(), AppError>;
}
