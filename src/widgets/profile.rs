// src/widgets/profile.rs

use async_trait::async_trait;
use validator::Validate;

use crate::{
    error::AppError,
    models::profile::{UpdatePhotoRequest, UserProfile},
    widgets::persistence::{LocalStore, PROFILE_PICTURE_URL_KEY},
};

/// Where the profile picture is synced to.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn update_photo(&self, req: &UpdatePhotoRequest) -> Result<UserProfile, AppError>;
}

/// Talks to `PUT /api/profile/photo` with the signed-in user's token.
/// Only admin sessions carry a token, so other users have no backend to pass.
pub struct ReqwestProfileBackend {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl ReqwestProfileBackend {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/profile/photo", base_url.trim_end_matches('/')),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl ProfileBackend for ReqwestProfileBackend {
    async fn update_photo(&self, req: &UpdatePhotoRequest) -> Result<UserProfile, AppError> {
        let response = self
            .client
            .put(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "photoUrl": req.photo_url }))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSync {
    Synced,
    /// Saved on this device only.
    LocalOnly,
}

pub struct ProfilePhotoWidget {
    store: LocalStore,
}

impl ProfilePhotoWidget {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn current(&self) -> Option<String> {
        self.store.load(PROFILE_PICTURE_URL_KEY)
    }

    /// Validates and saves the picture locally, then syncs it when a backend is given.
    /// Sync failures are logged; the local copy stays.
    pub async fn set(
        &self,
        backend: Option<&dyn ProfileBackend>,
        photo_url: &str,
    ) -> Result<PhotoSync, AppError> {
        let req = UpdatePhotoRequest {
            photo_url: photo_url.trim().to_string(),
        };
        req.validate()?;

        self.store
            .save(PROFILE_PICTURE_URL_KEY, &req.photo_url)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        let Some(backend) = backend else {
            return Ok(PhotoSync::LocalOnly);
        };
        match backend.update_photo(&req).await {
            Ok(_) => Ok(PhotoSync::Synced),
            Err(e) => {
                tracing::warn!("Profile photo sync failed: {}", e);
                Ok(PhotoSync::LocalOnly)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    #[async_trait]
    impl ProfileBackend for Offline {
        async fn update_photo(&self, _req: &UpdatePhotoRequest) -> Result<UserProfile, AppError> {
            Err(AppError::InternalServerError("offline".into()))
        }
    }

    struct Accepting;

    #[async_trait]
    impl ProfileBackend for Accepting {
        async fn update_photo(&self, req: &UpdatePhotoRequest) -> Result<UserProfile, AppError> {
            Ok(UserProfile {
                username: "alice".into(),
                photo_url: Some(req.photo_url.clone()),
                updated_at: chrono::Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn sync_failure_keeps_local_copy() {
        let widget = ProfilePhotoWidget::new(LocalStore::in_memory());
        let url = "https://avatars.example.com/a.png";

        assert_eq!(widget.set(Some(&Offline), url).await.unwrap(), PhotoSync::LocalOnly);
        assert_eq!(widget.current().as_deref(), Some(url));

        assert_eq!(widget.set(Some(&Accepting), url).await.unwrap(), PhotoSync::Synced);
        assert_eq!(widget.set(None, url).await.unwrap(), PhotoSync::LocalOnly);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_saving() {
        let widget = ProfilePhotoWidget::new(LocalStore::in_memory());
        assert!(matches!(
            widget.set(Some(&Accepting), "data:image/png;base64,AAAA").await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(widget.current(), None);
    }
}
