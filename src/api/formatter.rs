//! Response views. Each function is a total mapping from domain values to
//! the JSON shape clients see.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Campaign, CampaignId, Transaction, TransactionId, User, UserId};

/// Campaign as shown in lists and after create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignFormatter {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub short_description: String,
    pub image_url: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub slug: String,
}

/// Campaign detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignDetailFormatter {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub short_description: String,
    pub image_url: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub description: String,
    pub slug: String,
    pub perks: Vec<String>,
    pub user: CampaignDetailUserFormatter,
    pub images: Vec<CampaignDetailImageFormatter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignDetailUserFormatter {
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignDetailImageFormatter {
    pub image_url: String,
    pub is_primary: bool,
}

/// One pledge row on the owner's campaign view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignTransactionFormatter {
    pub id: TransactionId,
    /// Name of the pledging user.
    pub name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// One pledge row on the backer's own view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserTransactionFormatter {
    pub id: TransactionId,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub campaign: UserTransactionCampaignFormatter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserTransactionCampaignFormatter {
    pub name: String,
    pub image_url: String,
}

/// Account plus the session token just issued or presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserFormatter {
    pub id: UserId,
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub token: String,
    pub image_url: String,
}

fn first_image_url(campaign: &Campaign) -> String {
    campaign
        .images
        .first()
        .map(|image| image.file_name.clone())
        .unwrap_or_default()
}

fn split_perks(perks: &str) -> Vec<String> {
    perks.split(',').map(|perk| perk.trim().to_string()).collect()
}

#[must_use]
pub fn format_campaign(campaign: &Campaign) -> CampaignFormatter {
    CampaignFormatter {
        id: campaign.id,
        user_id: campaign.user_id,
        name: campaign.name.clone(),
        short_description: campaign.short_description.clone(),
        image_url: first_image_url(campaign),
        goal_amount: campaign.goal_amount,
        current_amount: campaign.current_amount,
        slug: campaign.slug.clone(),
    }
}

#[must_use]
pub fn format_campaigns(campaigns: &[Campaign]) -> Vec<CampaignFormatter> {
    campaigns.iter().map(format_campaign).collect()
}

/// Detail view. Perks are split on `,` and trimmed; only images carrying
/// the primary flag report `is_primary: true`.
#[must_use]
pub fn format_campaign_detail(campaign: &Campaign) -> CampaignDetailFormatter {
    let user = campaign
        .user
        .as_ref()
        .map(|owner| CampaignDetailUserFormatter {
            name: owner.name.clone(),
            image_url: owner.avatar_file_name.clone().unwrap_or_default(),
        })
        .unwrap_or_else(|| CampaignDetailUserFormatter {
            name: String::new(),
            image_url: String::new(),
        });

    CampaignDetailFormatter {
        id: campaign.id,
        user_id: campaign.user_id,
        name: campaign.name.clone(),
        short_description: campaign.short_description.clone(),
        image_url: first_image_url(campaign),
        goal_amount: campaign.goal_amount,
        current_amount: campaign.current_amount,
        description: campaign.description.clone(),
        slug: campaign.slug.clone(),
        perks: split_perks(&campaign.perks),
        user,
        images: campaign
            .images
            .iter()
            .map(|image| CampaignDetailImageFormatter {
                image_url: image.file_name.clone(),
                is_primary: image.is_primary(),
            })
            .collect(),
    }
}

#[must_use]
pub fn format_campaign_transaction(transaction: &Transaction) -> CampaignTransactionFormatter {
    CampaignTransactionFormatter {
        id: transaction.id,
        name: transaction
            .user
            .as_ref()
            .map(|user| user.name.clone())
            .unwrap_or_default(),
        amount: transaction.amount,
        created_at: transaction.created_at,
    }
}

#[must_use]
pub fn format_campaign_transactions(
    transactions: &[Transaction],
) -> Vec<CampaignTransactionFormatter> {
    transactions.iter().map(format_campaign_transaction).collect()
}

#[must_use]
pub fn format_user_transaction(transaction: &Transaction) -> UserTransactionFormatter {
    let campaign = match &transaction.campaign {
        Some(campaign) => UserTransactionCampaignFormatter {
            name: campaign.name.clone(),
            image_url: first_image_url(campaign),
        },
        None => UserTransactionCampaignFormatter {
            name: String::new(),
            image_url: String::new(),
        },
    };

    UserTransactionFormatter {
        id: transaction.id,
        amount: transaction.amount,
        status: transaction.status.to_string(),
        created_at: transaction.created_at,
        campaign,
    }
}

#[must_use]
pub fn format_user_transactions(transactions: &[Transaction]) -> Vec<UserTransactionFormatter> {
    transactions.iter().map(format_user_transaction).collect()
}

#[must_use]
pub fn format_user(user: &User, token: &str) -> UserFormatter {
    UserFormatter {
        id: user.id,
        name: user.name.clone(),
        occupation: user.occupation.clone(),
        email: user.email.clone(),
        token: token.to_string(),
        image_url: user.avatar_file_name.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignImage, NON_PRIMARY_FLAG, PRIMARY_FLAG, TransactionStatus};

    fn user(id: UserId, name: &str, avatar: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id,
            name: name.to_string(),
            occupation: "Gardener".to_string(),
            email: format!("{id}@example.com"),
            password_hash: "$argon2id$hash".to_string(),
            avatar_file_name: avatar.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn image(id: i64, file_name: &str, is_primary: i16) -> CampaignImage {
        let now = Utc::now();
        CampaignImage {
            id,
            campaign_id: 1,
            file_name: file_name.to_string(),
            is_primary,
            created_at: now,
            updated_at: now,
        }
    }

    fn campaign(perks: &str, images: Vec<CampaignImage>) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: 1,
            user_id: 7,
            name: "Save The Forest".to_string(),
            short_description: "Trees".to_string(),
            description: "Plant trees".to_string(),
            perks: perks.to_string(),
            goal_amount: 5_000,
            current_amount: 1_200,
            slug: "save-the-forest-7".to_string(),
            images,
            user: Some(user(7, "Owner", Some("images/7-me.png"))),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_perks_are_split_and_trimmed() {
        let detail = format_campaign_detail(&campaign("tshirt, poster ,sticker", vec![]));
        assert_eq!(detail.perks, vec!["tshirt", "poster", "sticker"]);
    }

    #[test]
    fn test_list_view_without_images_has_empty_url() {
        let view = format_campaign(&campaign("mug", vec![]));
        assert_eq!(view.image_url, "");
        assert_eq!(view.slug, "save-the-forest-7");
    }

    #[test]
    fn test_list_view_serializes_exact_fields() {
        let view = format_campaign(&campaign("mug", vec![image(1, "images/a.png", PRIMARY_FLAG)]));
        let json = serde_json::to_value(&view).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "current_amount",
                "goal_amount",
                "id",
                "image_url",
                "name",
                "short_description",
                "slug",
                "user_id"
            ]
        );
        assert_eq!(json["image_url"], "images/a.png");
    }

    #[test]
    fn test_detail_primary_flag_only_true_for_primary_value() {
        let detail = format_campaign_detail(&campaign(
            "mug",
            vec![
                image(1, "images/a.png", PRIMARY_FLAG),
                image(2, "images/b.png", NON_PRIMARY_FLAG),
                image(3, "images/c.png", 2),
            ],
        ));

        let flags: Vec<_> = detail.images.iter().map(|i| i.is_primary).collect();
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(detail.image_url, "images/a.png");
        assert_eq!(detail.user.name, "Owner");
        assert_eq!(detail.user.image_url, "images/7-me.png");
    }

    #[test]
    fn test_detail_owner_without_avatar() {
        let mut c = campaign("mug", vec![]);
        c.user = Some(user(7, "Owner", None));
        let detail = format_campaign_detail(&c);
        assert_eq!(detail.user.image_url, "");
        assert!(detail.images.is_empty());
    }

    fn transaction(campaign: Option<Campaign>, backer: Option<User>) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: 9,
            campaign_id: 1,
            user_id: 3,
            amount: 250,
            status: TransactionStatus::Paid,
            code: "ORDER-00009".to_string(),
            user: backer,
            campaign,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_campaign_transaction_row_uses_backer_name() {
        let row = format_campaign_transaction(&transaction(None, Some(user(3, "Backer", None))));
        assert_eq!(row.id, 9);
        assert_eq!(row.name, "Backer");
        assert_eq!(row.amount, 250);
    }

    #[test]
    fn test_user_transaction_row() {
        let row = format_user_transaction(&transaction(
            Some(campaign("mug", vec![image(1, "images/cover.png", PRIMARY_FLAG)])),
            None,
        ));
        assert_eq!(row.status, "paid");
        assert_eq!(row.campaign.name, "Save The Forest");
        assert_eq!(row.campaign.image_url, "images/cover.png");

        let bare = format_user_transaction(&transaction(Some(campaign("mug", vec![])), None));
        assert_eq!(bare.campaign.image_url, "");
    }

    #[test]
    fn test_user_view_carries_token_and_avatar() {
        let view = format_user(&user(4, "Ann", Some("images/4-ann.png")), "tok");
        assert_eq!(view.token, "tok");
        assert_eq!(view.image_url, "images/4-ann.png");
        assert_eq!(view.occupation, "Gardener");

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_empty_lists_format_to_empty_arrays() {
        assert!(format_campaigns(&[]).is_empty());
        assert!(format_campaign_transactions(&[]).is_empty());
        assert_eq!(
            serde_json::to_string(&format_user_transactions(&[])).unwrap(),
            "[]"
        );
    }
}
