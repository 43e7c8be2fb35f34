use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Display language of the storefront. Arabic is the primary locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ar,
    En,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Ar => "ar",
            Locale::En => "en",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ar" | "ar-eg" | "ar-sa" => Some(Locale::Ar),
            "en" | "en-us" | "en-gb" => Some(Locale::En),
            _ => None,
        }
    }

    /// Pick the field for this locale, falling back to the other language when blank.
    pub fn pick<'a>(self, ar: &'a str, en: &'a str) -> &'a str {
        let (primary, fallback) = match self {
            Locale::Ar => (ar, en),
            Locale::En => (en, ar),
        };
        if primary.trim().is_empty() {
            fallback
        } else {
            primary
        }
    }

    pub fn pick_opt<'a>(self, ar: Option<&'a str>, en: Option<&'a str>) -> Option<&'a str> {
        let picked = self.pick(ar.unwrap_or_default(), en.unwrap_or_default());
        (!picked.trim().is_empty()).then_some(picked)
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_requested_language_with_fallback() {
        assert_eq!(Locale::Ar.pick("قميص", "Shirt"), "قميص");
        assert_eq!(Locale::En.pick("قميص", "Shirt"), "Shirt");
        assert_eq!(Locale::En.pick("قميص", "  "), "قميص");
        assert_eq!(Locale::Ar.pick_opt(None, Some("Terms")), Some("Terms"));
        assert_eq!(Locale::Ar.pick_opt(None, None), None);
    }

    #[test]
    fn parses_region_tags() {
        assert_eq!(Locale::parse("EN-us"), Some(Locale::En));
        assert_eq!(Locale::parse("ar"), Some(Locale::Ar));
        assert_eq!(Locale::parse("fr"), None);
    }
}
