//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod slug;
pub mod traits;
pub mod types;

pub use error::{
    AppError, ConfigError, DatabaseError, StorageError, TokenError, ValidationError,
};
pub use self::slug::campaign_slug;
pub use traits::{
    BlobStorage, CampaignRepository, DatabaseHealth, PUBLIC_IMAGE_PREFIX, TransactionRepository,
    UserRepository,
};
pub use types::{
    Campaign, CampaignId, CampaignImage, CampaignInput, CheckEmailInput, HealthResponse,
    HealthStatus, LoginInput, NON_PRIMARY_FLAG, NewCampaign, NewCampaignImage, NewUser,
    PRIMARY_FLAG, RegisterUserInput, Transaction, TransactionId, TransactionStatus, User, UserId,
    normalize_email,
};
