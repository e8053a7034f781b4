//! Campaign lifecycle, ownership checks, and gallery management.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{
    AppError, Campaign, CampaignId, CampaignImage, CampaignInput, CampaignRepository,
    NON_PRIMARY_FLAG, NewCampaign, NewCampaignImage, PRIMARY_FLAG, User, UserId, campaign_slug,
};

/// Application service for campaigns.
///
/// Every mutating operation takes the acting user explicitly and checks
/// ownership before any write reaches the repository.
pub struct CampaignService {
    repository: Arc<dyn CampaignRepository>,
}

impl CampaignService {
    #[must_use]
    pub fn new(repository: Arc<dyn CampaignRepository>) -> Self {
        Self { repository }
    }

    /// Lists campaigns, optionally only those owned by `owner`.
    ///
    /// `None` and `Some(0)` both mean "no filter".
    #[instrument(skip(self))]
    pub async fn list_campaigns(&self, owner: Option<UserId>) -> Result<Vec<Campaign>, AppError> {
        match owner.filter(|id| *id != 0) {
            Some(user_id) => self.repository.find_by_user_id(user_id).await,
            None => self.repository.find_all().await,
        }
    }

    /// Gets one campaign with its gallery and owner loaded.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` when no campaign has this id.
    #[instrument(skip(self))]
    pub async fn get_campaign_detail(&self, id: CampaignId) -> Result<Campaign, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {id}")))
    }

    /// Creates a campaign owned by `acting_user`.
    ///
    /// The slug is derived here, once, from the name and owner id.
    #[instrument(skip(self, input, acting_user), fields(user_id = acting_user.id, name = %input.name))]
    pub async fn create_campaign(
        &self,
        input: &CampaignInput,
        acting_user: &User,
    ) -> Result<Campaign, AppError> {
        let campaign = NewCampaign {
            user_id: acting_user.id,
            name: input.name.clone(),
            short_description: input.short_description.clone(),
            description: input.description.clone(),
            perks: input.perks.clone(),
            goal_amount: input.goal_amount,
            slug: campaign_slug(&input.name, acting_user.id),
        };

        let created = self.repository.save(&campaign).await?;
        metrics::counter!("campaigns_created_total").increment(1);
        info!(campaign_id = created.id, slug = %created.slug, "Campaign created");
        Ok(created)
    }

    /// Overwrites the editable attributes of a campaign.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` when no campaign has this id.
    /// - `AppError::Forbidden` unless `acting_user` owns it; nothing is written.
    #[instrument(skip(self, input, acting_user), fields(user_id = acting_user.id))]
    pub async fn update_campaign(
        &self,
        id: CampaignId,
        input: &CampaignInput,
        acting_user: &User,
    ) -> Result<Campaign, AppError> {
        let mut campaign = self.owned_campaign(id, acting_user).await?;

        campaign.apply(input);
        let updated = self.repository.update(&campaign).await?;
        info!(campaign_id = id, "Campaign updated");
        Ok(updated)
    }

    /// Records an uploaded image for a campaign.
    ///
    /// With `is_primary`, every sibling loses its primary flag in the same
    /// atomic step that inserts the new image.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` when no campaign has this id.
    /// - `AppError::Forbidden` unless `acting_user` owns it; nothing is written.
    #[instrument(skip(self, acting_user), fields(user_id = acting_user.id))]
    pub async fn set_campaign_image(
        &self,
        campaign_id: CampaignId,
        file_name: &str,
        acting_user: &User,
        is_primary: bool,
    ) -> Result<CampaignImage, AppError> {
        self.owned_campaign(campaign_id, acting_user).await?;

        let image = NewCampaignImage {
            campaign_id,
            file_name: file_name.to_string(),
            is_primary: if is_primary {
                PRIMARY_FLAG
            } else {
                NON_PRIMARY_FLAG
            },
        };

        let created = if is_primary {
            self.repository.replace_primary_image(&image).await?
        } else {
            self.repository.create_image(&image).await?
        };

        metrics::counter!("campaign_images_uploaded_total").increment(1);
        info!(campaign_id, image_id = created.id, is_primary, "Campaign image saved");
        Ok(created)
    }

    /// Loads a campaign and checks that `acting_user` owns it.
    ///
    /// Upload handlers call this before writing any bytes to storage.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` or `AppError::Forbidden`.
    pub async fn owned_campaign(
        &self,
        id: CampaignId,
        acting_user: &User,
    ) -> Result<Campaign, AppError> {
        let campaign = self.get_campaign_detail(id).await?;
        Self::ensure_owner(&campaign, acting_user)?;
        Ok(campaign)
    }

    fn ensure_owner(campaign: &Campaign, acting_user: &User) -> Result<(), AppError> {
        if campaign.user_id != acting_user.id {
            warn!(
                campaign_id = campaign.id,
                owner_id = campaign.user_id,
                user_id = acting_user.id,
                "Campaign change denied: not the owner"
            );
            return Err(AppError::Forbidden(
                "you do not own this campaign".to_string(),
            ));
        }
        Ok(())
    }
}
