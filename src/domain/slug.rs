//! URL-safe slug derivation for campaigns.

use super::types::UserId;

/// Slug for a campaign, derived once at creation from its name and owner.
///
/// Non-ASCII text is transliterated before lowercasing, and every run of
/// other characters collapses into a single `-`.
#[must_use]
pub fn campaign_slug(name: &str, owner_id: UserId) -> String {
    ::slug::slugify(format!("{name} {owner_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_slug_includes_owner() {
        assert_eq!(campaign_slug("Save The Forest", 7), "save-the-forest-7");
    }

    #[test]
    fn test_slug_is_deterministic() {
        let first = campaign_slug("Clean Water!", 12);
        let second = campaign_slug("Clean Water!", 12);
        assert_eq!(first, second);
        assert_eq!(first, "clean-water-12");
    }

    #[test]
    fn test_runs_of_punctuation_collapse() {
        assert_eq!(campaign_slug("  Hello,   World -- 2024 ", 3), "hello-world-2024-3");
        assert_eq!(campaign_slug("a__b..c", 3), "a-b-c-3");
    }

    #[test]
    fn test_accented_latin_is_transliterated() {
        assert_eq!(campaign_slug("Café Crème", 7), "cafe-creme-7");
        assert_eq!(campaign_slug("Grüne Straße", 7), "grune-strasse-7");
    }

    #[test]
    fn test_non_latin_script_keeps_content() {
        let slug = campaign_slug("日本の森", 7);
        assert!(slug.ends_with("-7"));
        assert!(slug.len() > "-7".len());
        assert!(
            slug.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        );
    }

    #[test]
    fn test_symbol_only_name_leaves_owner() {
        assert_eq!(campaign_slug("!!!", 9), "9");
    }
}
