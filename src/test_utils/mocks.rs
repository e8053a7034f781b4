//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate various scenarios including
//! success, failure, and edge cases.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    AppError, BlobStorage, Campaign, CampaignId, CampaignImage, CampaignRepository,
    DatabaseError, DatabaseHealth, NON_PRIMARY_FLAG, NewCampaign, NewCampaignImage, NewUser,
    PUBLIC_IMAGE_PREFIX, StorageError, Transaction, TransactionRepository, TransactionStatus,
    User, UserId, UserRepository,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Default)]
struct MockTables {
    users: BTreeMap<UserId, User>,
    campaigns: BTreeMap<CampaignId, Campaign>,
    images: Vec<CampaignImage>,
    transactions: Vec<Transaction>,
    next_user_id: i64,
    next_campaign_id: i64,
    next_image_id: i64,
    next_transaction_id: i64,
}

impl MockTables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn images_of(&self, campaign_id: CampaignId) -> impl Iterator<Item = &CampaignImage> {
        self.images
            .iter()
            .filter(move |image| image.campaign_id == campaign_id)
    }

    /// Campaign with only its primary image, as list views load it.
    fn campaign_with_primary(&self, campaign: &Campaign) -> Campaign {
        let mut campaign = campaign.clone();
        campaign.images = self
            .images_of(campaign.id)
            .filter(|image| image.is_primary())
            .cloned()
            .collect();
        campaign
    }

    /// Campaign with its full gallery, primary first, and its owner.
    fn campaign_detail(&self, campaign: &Campaign) -> Campaign {
        let mut campaign = campaign.clone();
        let mut images: Vec<CampaignImage> = self.images_of(campaign.id).cloned().collect();
        images.sort_by_key(|image| (!image.is_primary(), image.id));
        campaign.images = images;
        campaign.user = self.users.get(&campaign.user_id).cloned();
        campaign
    }

    fn insert_image(&mut self, image: &NewCampaignImage) -> CampaignImage {
        let now = Utc::now();
        let image = CampaignImage {
            id: Self::next_id(&mut self.next_image_id),
            campaign_id: image.campaign_id,
            file_name: image.file_name.clone(),
            is_primary: image.is_primary,
            created_at: now,
            updated_at: now,
        };
        self.images.push(image.clone());
        image
    }
}

/// Mock database for testing.
///
/// Implements every repository trait over one set of in-memory tables so
/// services sharing it observe each other's writes.
///
/// # Example
///
/// ```
/// use crowdfund_backend::test_utils::{MockDatabase, mocks::MockConfig};
///
/// // Create a mock that succeeds
/// let mock = MockDatabase::new();
///
/// // Create a mock that fails
/// let failing_mock = MockDatabase::with_config(MockConfig::failure("DB error"));
/// ```
pub struct MockDatabase {
    tables: Arc<Mutex<MockTables>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
    fail_image_insert: AtomicBool,
}

impl MockDatabase {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            tables: Arc::new(Mutex::new(MockTables::default())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            fail_image_insert: AtomicBool::new(false),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Makes image inserts fail while every other call keeps working.
    pub fn set_fail_image_insert(&self, fail: bool) {
        self.fail_image_insert.store(fail, Ordering::Relaxed);
    }

    /// Gets every stored image of a campaign in insertion order.
    pub fn images_for(&self, campaign_id: CampaignId) -> Vec<CampaignImage> {
        self.tables
            .lock()
            .unwrap()
            .images_of(campaign_id)
            .cloned()
            .collect()
    }

    /// Gets a stored campaign without any relations loaded.
    pub fn stored_campaign(&self, id: CampaignId) -> Option<Campaign> {
        self.tables.lock().unwrap().campaigns.get(&id).cloned()
    }

    /// Seeds a pledge. Pledges are written by the payment side, so no
    /// repository method exists for this. Later seeds get later `created_at`.
    pub fn insert_transaction(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
        amount: i64,
        status: TransactionStatus,
    ) -> Transaction {
        let mut tables = self.tables.lock().unwrap();
        let id = MockTables::next_id(&mut tables.next_transaction_id);
        let created_at = Utc::now() - Duration::minutes(1_000 - id);
        let transaction = Transaction {
            id,
            campaign_id,
            user_id,
            amount,
            status,
            code: format!("ORDER-{id:05}"),
            user: None,
            campaign: None,
            created_at,
            updated_at: created_at,
        };
        tables.transactions.push(transaction.clone());
        transaction
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock database error".to_string());
            return Err(AppError::Database(DatabaseError::Connection(msg)));
        }
        Ok(())
    }

    fn check_image_insert(&self) -> Result<(), AppError> {
        if self.fail_image_insert.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Query(
                "Mock image insert failure".to_string(),
            )));
        }
        Ok(())
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseHealth for MockDatabase {
    async fn health_check(&self) -> Result<(), AppError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }

        self.check_should_fail()
    }
}

#[async_trait]
impl UserRepository for MockDatabase {
    async fn save(&self, user: &NewUser) -> Result<User, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut tables = self.tables.lock().unwrap();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "email {} already exists",
                user.email
            ))));
        }

        let now = Utc::now();
        let stored = User {
            id: MockTables::next_id(&mut tables.next_user_id),
            name: user.name.clone(),
            occupation: user.occupation.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            avatar_file_name: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        Ok(tables.users.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut tables = self.tables.lock().unwrap();
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                existing.updated_at = Utc::now();
                Ok(existing.clone())
            }
            None => Err(AppError::Database(DatabaseError::NotFound(format!(
                "User {} not found",
                user.id
            )))),
        }
    }
}

#[async_trait]
impl CampaignRepository for MockDatabase {
    async fn find_all(&self) -> Result<Vec<Campaign>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        Ok(tables
            .campaigns
            .values()
            .map(|c| tables.campaign_with_primary(c))
            .collect())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Campaign>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        Ok(tables
            .campaigns
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| tables.campaign_with_primary(c))
            .collect())
    }

    async fn find_by_id(&self, id: CampaignId) -> Result<Option<Campaign>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        Ok(tables.campaigns.get(&id).map(|c| tables.campaign_detail(c)))
    }

    async fn save(&self, campaign: &NewCampaign) -> Result<Campaign, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let stored = Campaign {
            id: MockTables::next_id(&mut tables.next_campaign_id),
            user_id: campaign.user_id,
            name: campaign.name.clone(),
            short_description: campaign.short_description.clone(),
            description: campaign.description.clone(),
            perks: campaign.perks.clone(),
            goal_amount: campaign.goal_amount,
            current_amount: 0,
            slug: campaign.slug.clone(),
            images: Vec::new(),
            user: None,
            created_at: now,
            updated_at: now,
        };
        tables.campaigns.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, campaign: &Campaign) -> Result<Campaign, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut tables = self.tables.lock().unwrap();
        let Some(existing) = tables.campaigns.get_mut(&campaign.id) else {
            return Err(AppError::Database(DatabaseError::NotFound(format!(
                "Campaign {} not found",
                campaign.id
            ))));
        };

        existing.name = campaign.name.clone();
        existing.short_description = campaign.short_description.clone();
        existing.description = campaign.description.clone();
        existing.perks = campaign.perks.clone();
        existing.goal_amount = campaign.goal_amount;
        existing.updated_at = Utc::now();

        let mut updated = campaign.clone();
        updated.updated_at = existing.updated_at;
        Ok(updated)
    }

    async fn create_image(&self, image: &NewCampaignImage) -> Result<CampaignImage, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;
        self.check_image_insert()?;

        Ok(self.tables.lock().unwrap().insert_image(image))
    }

    async fn replace_primary_image(
        &self,
        image: &NewCampaignImage,
    ) -> Result<CampaignImage, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        // One guard spans both steps, and the failure check runs before any
        // mutation, mirroring a rolled-back transaction.
        let mut tables = self.tables.lock().unwrap();
        self.check_image_insert()?;

        for existing in tables
            .images
            .iter_mut()
            .filter(|existing| existing.campaign_id == image.campaign_id)
        {
            existing.is_primary = NON_PRIMARY_FLAG;
        }
        Ok(tables.insert_image(image))
    }
}

#[async_trait]
impl TransactionRepository for MockDatabase {
    async fn find_by_campaign_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.campaign_id == campaign_id)
            .map(|t| {
                let mut t = t.clone();
                t.user = tables.users.get(&t.user_id).cloned();
                t
            })
            .collect();
        transactions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(transactions)
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Transaction>, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let tables = self.tables.lock().unwrap();
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| {
                let mut t = t.clone();
                t.campaign = tables
                    .campaigns
                    .get(&t.campaign_id)
                    .map(|c| tables.campaign_with_primary(c));
                t
            })
            .collect();
        transactions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(transactions)
    }
}

/// Mock blob storage for testing.
///
/// Records every stored file name without touching the filesystem.
pub struct MockBlobStorage {
    stored: Arc<Mutex<Vec<String>>>,
    removed: Arc<Mutex<Vec<String>>>,
    uploads: AtomicU64,
    config: MockConfig,
}

impl MockBlobStorage {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            stored: Arc::new(Mutex::new(Vec::new())),
            removed: Arc::new(Mutex::new(Vec::new())),
            uploads: AtomicU64::new(0),
            config,
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the references currently held, in upload order.
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    /// Gets the references removed so far.
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

impl Default for MockBlobStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStorage for MockBlobStorage {
    async fn store(
        &self,
        owner_id: UserId,
        filename_hint: &str,
        _content_type: Option<&str>,
        _bytes: &[u8],
    ) -> Result<String, AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock storage error".to_string());
            return Err(AppError::Storage(StorageError::WriteFailed(msg)));
        }

        let n = self.uploads.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = format!("{PUBLIC_IMAGE_PREFIX}/{owner_id}-{n}-{filename_hint}");
        self.stored.lock().unwrap().push(reference.clone());
        Ok(reference)
    }

    async fn remove(&self, reference: &str) -> Result<(), AppError> {
        self.stored.lock().unwrap().retain(|r| r != reference);
        self.removed.lock().unwrap().push(reference.to_string());
        Ok(())
    }
}
