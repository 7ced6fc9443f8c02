use serde::Deserialize;
use utoipa::IntoParams;

/// Common pagination query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl PaginationParams {
    pub fn default_page() -> u64 {
        1
    }

    pub fn default_per_page() -> u64 {
        20
    }
}

fn default_page() -> u64 {
    PaginationParams::default_page()
}

fn default_per_page() -> u64 {
    PaginationParams::default_per_page()
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}
