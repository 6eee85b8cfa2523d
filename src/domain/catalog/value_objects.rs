use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::CatalogError;

// ============================================================================
// Catalog Value Objects
// ============================================================================

/// A drone flight mode offered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Object-storage key of the service image
    pub image: Option<String>,
    pub power_multiplier: f64,
    pub is_deleted: bool,
}

impl Service {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Payload for creating a catalog entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub power_multiplier: f64,
}

impl NewService {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        validate_power_multiplier(self.power_multiplier)
    }
}

/// Fields a moderator may change on an existing entry. All optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub power_multiplier: Option<f64>,
}

impl ServicePatch {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
        }
        if let Some(multiplier) = self.power_multiplier {
            validate_power_multiplier(multiplier)?;
        }
        Ok(())
    }

    /// Overwrite the given fields of an already validated patch.
    pub fn write_to(&self, service: &mut Service) {
        if let Some(name) = &self.name {
            service.name = name.clone();
        }
        if let Some(description) = &self.description {
            service.description = description.clone();
        }
        if let Some(multiplier) = self.power_multiplier {
            service.power_multiplier = multiplier;
        }
    }
}

/// Catalog listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceFilter {
    /// Case-insensitive substring of the service name
    pub search: Option<String>,
}

impl ServiceFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self { search: Some(term.into()) }
    }

    /// The search term, if it is non-blank.
    pub fn term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, service: &Service) -> bool {
        match self.term() {
            Some(term) => service.name.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}

fn validate_power_multiplier(value: f64) -> Result<(), CatalogError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidPowerMultiplier(value))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hovering() -> Service {
        Service {
            id: Uuid::new_v4(),
            name: "Hovering".to_string(),
            description: "Stable position hold".to_string(),
            image: None,
            power_multiplier: 0.6,
            is_deleted: false,
        }
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let service = hovering();
        assert!(ServiceFilter::search("HOVER").matches(&service));
        assert!(ServiceFilter::search("ver").matches(&service));
        assert!(!ServiceFilter::search("video").matches(&service));
    }

    #[test]
    fn test_blank_filter_matches_everything() {
        let service = hovering();
        assert!(ServiceFilter::default().matches(&service));
        assert!(ServiceFilter::search("   ").matches(&service));
    }

    #[test]
    fn test_new_service_rejects_non_positive_multiplier() {
        let service = NewService {
            name: "Broken".to_string(),
            description: String::new(),
            power_multiplier: 0.0,
        };
        assert!(matches!(service.validate(), Err(CatalogError::InvalidPowerMultiplier(_))));

        let service = NewService { power_multiplier: f64::NAN, ..service };
        assert!(matches!(service.validate(), Err(CatalogError::InvalidPowerMultiplier(_))));
    }

    #[test]
    fn test_patch_with_one_bad_field_is_refused() {
        let patch = ServicePatch {
            name: Some("Hover hold".to_string()),
            description: None,
            power_multiplier: Some(-1.0),
        };
        assert!(matches!(patch.validate(), Err(CatalogError::InvalidPowerMultiplier(_))));

        let patch = ServicePatch { name: Some("  ".to_string()), ..Default::default() };
        assert!(matches!(patch.validate(), Err(CatalogError::EmptyName)));
    }

    #[test]
    fn test_patch_updates_only_given_fields() {
        let mut service = hovering();
        let patch = ServicePatch {
            power_multiplier: Some(0.7),
            ..Default::default()
        };

        patch.validate().unwrap();
        patch.write_to(&mut service);
        assert_eq!(service.name, "Hovering");
        assert_eq!(service.power_multiplier, 0.7);
    }
}
