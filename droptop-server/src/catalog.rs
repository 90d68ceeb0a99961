//! Community resource kinds served by the gateway

use serde::Serialize;

use crate::config::CatalogConfig;

/// A community-submitted resource collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    App,
    Theme,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::App, ResourceKind::Theme];

    /// Singular noun used in messages
    pub fn noun(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Theme => "theme",
        }
    }

    /// Path segment under `/v1` and `/v1/downloads`
    pub fn segment(&self) -> &'static str {
        match self {
            Self::App => "community-apps",
            Self::Theme => "community-themes",
        }
    }

    pub fn list_path(&self) -> String {
        format!("/v1/{}", self.segment())
    }

    pub fn collection<'a>(&self, catalog: &'a CatalogConfig) -> &'a str {
        match self {
            Self::App => &catalog.apps_collection,
            Self::Theme => &catalog.themes_collection,
        }
    }
}
