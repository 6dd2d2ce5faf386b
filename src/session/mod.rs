use serde::{Deserialize, Serialize};

pub mod store;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub schema_version: u32,
    pub email: String,
    pub mode: EnhancementMode,
}

impl SessionRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            email: email.into(),
            mode: EnhancementMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementMode {
    #[default]
    FineDining,
    QualityFix,
    BrandStyle,
}

impl EnhancementMode {
    pub const ALL: [EnhancementMode; 3] = [
        EnhancementMode::FineDining,
        EnhancementMode::QualityFix,
        EnhancementMode::BrandStyle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::FineDining => "Fine dining",
            Self::QualityFix => "Quality fix",
            Self::BrandStyle => "Brand style",
        }
    }

    pub fn needs_reference(self) -> bool {
        matches!(self, Self::BrandStyle)
    }
}
