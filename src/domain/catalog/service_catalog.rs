use std::sync::Arc;

use uuid::Uuid;

use crate::domain::Requester;
use crate::store::ServiceRepository;
use super::errors::CatalogError;
use super::images::{guess_content_type, image_key, ImageStore};
use super::value_objects::{NewService, Service, ServiceFilter, ServicePatch};

// ============================================================================
// Catalog - read access for everyone, administration for staff
// ============================================================================

pub struct Catalog {
    repo: Arc<dyn ServiceRepository>,
    images: Arc<dyn ImageStore>,
}

impl Catalog {
    pub fn new(repo: Arc<dyn ServiceRepository>, images: Arc<dyn ImageStore>) -> Self {
        Self { repo, images }
    }

    /// Active services, ordered by name.
    pub async fn list_services(&self, filter: &ServiceFilter) -> Result<Vec<Service>, CatalogError> {
        let services = self.repo.list_services(filter).await?;
        tracing::debug!(count = services.len(), search = ?filter.term(), "Services listed");
        Ok(services)
    }

    /// An active service. Soft-deleted services are not found.
    pub async fn get_service(&self, id: Uuid) -> Result<Service, CatalogError> {
        self.repo
            .find_service(id)
            .await?
            .filter(Service::is_active)
            .ok_or(CatalogError::NotFound(id))
    }

    pub async fn create_service(&self, requester: Requester, new: NewService) -> Result<Service, CatalogError> {
        require_staff(&requester, "create services")?;
        new.validate()?;

        let service = Service {
            id: Uuid::now_v7(),
            name: new.name,
            description: new.description,
            image: None,
            power_multiplier: new.power_multiplier,
            is_deleted: false,
        };
        self.repo.insert_service(&service).await?;

        tracing::info!(service_id = %service.id, name = %service.name, "Service created");
        Ok(service)
    }

    pub async fn update_service(
        &self,
        requester: Requester,
        id: Uuid,
        patch: ServicePatch,
    ) -> Result<Service, CatalogError> {
        require_staff(&requester, "edit services")?;
        patch.validate()?;

        let service = self
            .repo
            .patch_service(id, &patch)
            .await?
            .ok_or(CatalogError::NotFound(id))?;

        tracing::info!(service_id = %service.id, "Service updated");
        Ok(service)
    }

    /// Hide a service from the catalog. Order items keep referring to it.
    pub async fn soft_delete_service(&self, requester: Requester, id: Uuid) -> Result<(), CatalogError> {
        require_staff(&requester, "delete services")?;
        let (service, old_image) = self
            .repo
            .delete_service(id)
            .await?
            .ok_or(CatalogError::NotFound(id))?;

        if let Some(key) = old_image {
            self.discard_image(&key).await;
        }

        tracing::info!(service_id = %service.id, "Service deleted");
        Ok(())
    }

    /// Store a new image for a service under a fresh key, replacing the old one.
    pub async fn upload_image(
        &self,
        requester: Requester,
        id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Service, CatalogError> {
        require_staff(&requester, "upload service images")?;
        if bytes.is_empty() {
            return Err(CatalogError::EmptyImage);
        }
        self.get_service(id).await?;

        let key = image_key(filename);
        let size = bytes.len();
        self.images
            .put(&key, bytes, guess_content_type(filename))
            .await
            .map_err(|e| CatalogError::ImageStorage(e.to_string()))?;

        // The service may have been deleted since the lookup
        let (service, old_image) = match self.repo.replace_service_image(id, &key).await {
            Ok(Some(replaced)) => replaced,
            Ok(None) => {
                self.discard_image(&key).await;
                return Err(CatalogError::NotFound(id));
            }
            Err(e) => {
                self.discard_image(&key).await;
                return Err(e.into());
            }
        };

        if let Some(old) = old_image {
            self.discard_image(&old).await;
        }

        tracing::info!(service_id = %service.id, key = %key, size, "Service image uploaded");
        Ok(service)
    }

    /// Public URL of a service's image, if it has one.
    pub fn image_url(&self, service: &Service) -> Option<String> {
        service.image.as_deref().map(|key| self.images.url(key))
    }

    async fn discard_image(&self, key: &str) {
        if let Err(e) = self.images.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete service image");
        }
    }
}

fn require_staff(requester: &Requester, action: &'static str) -> Result<(), CatalogError> {
    if requester.is_staff {
        Ok(())
    } else {
        Err(CatalogError::Forbidden(action))
    }
}
