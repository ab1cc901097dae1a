use serde::{Deserialize, Serialize};

/// Emphasis tag applied to response text, rendered as `[emN]...[/emN]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmTag {
    None,
    Em1,
    Em2,
    Em3,
    Em4,
}

impl Default for EmTag {
    fn default() -> Self {
        Self::None
    }
}

impl EmTag {
    /// Numeric index used in the markup, or `None` for no tag.
    pub fn index(&self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::Em1 => Some(1),
            Self::Em2 => Some(2),
            Self::Em3 => Some(3),
            Self::Em4 => Some(4),
        }
    }
}

/// How player responses are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseDisplaySettings {
    /// Tag for responses the player has already chosen before.
    #[serde(default)]
    pub em_tag_for_old_responses: EmTag,
    /// Tag for responses kept visible although their condition is false.
    #[serde(default)]
    pub em_tag_for_invalid_responses: EmTag,
    /// Show player responses whose condition is false instead of hiding them.
    #[serde(default)]
    pub include_invalid_entries: bool,
}

impl ResponseDisplaySettings {
    /// Parse settings from a RON string.
    pub fn parse_ron(input: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn em_tag_indices() {
        assert_eq!(EmTag::None.index(), None);
        assert_eq!(EmTag::Em1.index(), Some(1));
        assert_eq!(EmTag::Em4.index(), Some(4));
    }

    #[test]
    fn settings_parse_with_defaults() {
        let settings =
            ResponseDisplaySettings::parse_ron("(em_tag_for_old_responses: Em2)").unwrap();
        assert_eq!(settings.em_tag_for_old_responses, EmTag::Em2);
        assert_eq!(settings.em_tag_for_invalid_responses, EmTag::None);
        assert!(!settings.include_invalid_entries);
    }
}
