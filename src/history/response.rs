use std::fmt::Display;

use serde::Serialize;

/// Envelope returned to the frontend instead of a rejected promise.
///
/// `allLoaded` is only present on recent-shot listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_loaded: Option<bool>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            all_loaded: None,
        }
    }

    pub fn failure(error: impl Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            all_loaded: None,
        }
    }

    pub fn with_all_loaded(mut self, all_loaded: bool) -> Self {
        self.all_loaded = Some(all_loaded);
        self
    }
}
