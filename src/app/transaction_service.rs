//! Pledge listing: the owner's per-campaign view and the backer's own view.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::domain::{
    AppError, CampaignId, CampaignRepository, Transaction, TransactionRepository, User, UserId,
};

/// Application service for pledge transactions.
pub struct TransactionService {
    repository: Arc<dyn TransactionRepository>,
    campaigns: Arc<dyn CampaignRepository>,
}

impl TransactionService {
    #[must_use]
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        campaigns: Arc<dyn CampaignRepository>,
    ) -> Self {
        Self {
            repository,
            campaigns,
        }
    }

    /// Pledges made to a campaign, newest first, each with its backer.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` when no campaign has this id.
    /// - `AppError::Forbidden` unless `acting_user` owns the campaign.
    #[instrument(skip(self, acting_user), fields(user_id = acting_user.id))]
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        acting_user: &User,
    ) -> Result<Vec<Transaction>, AppError> {
        let campaign = self
            .campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {campaign_id}")))?;

        if campaign.user_id != acting_user.id {
            warn!(
                campaign_id,
                owner_id = campaign.user_id,
                "Pledge listing denied: not the owner"
            );
            return Err(AppError::Forbidden(
                "only the campaign owner can list its transactions".to_string(),
            ));
        }

        self.repository.find_by_campaign_id(campaign_id).await
    }

    /// Pledges made by `user_id`, newest first, each with its campaign and
    /// that campaign's primary image.
    ///
    /// The caller guarantees `user_id` is the acting user's own id.
    #[instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>, AppError> {
        self.repository.find_by_user_id(user_id).await
    }
}
