//! Version registry.
//!
//! Each product registers a contiguous range of API versions and a table of
//! endpoints tagged with the version that introduced them. The endpoint set
//! for one `(product, version)` pair is assembled on first use and cached for
//! the rest of the process; entries are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::ClientError;
use crate::endpoints::{EndpointDefinition, Product};
use crate::error::VersionSide;
use crate::version::ApiVersion;

/// Endpoint set available at one API version of one product.
#[derive(Debug)]
pub struct VersionModule {
    product: Product,
    version: ApiVersion,
    endpoints: Vec<&'static EndpointDefinition>,
}

impl VersionModule {
    fn build(product: Product, version: ApiVersion) -> Self {
        let endpoints = product
            .endpoints()
            .iter()
            .filter(|endpoint| endpoint.since <= version)
            .collect();
        Self {
            product,
            version,
            endpoints,
        }
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Endpoints callable at this version.
    pub fn endpoints(&self) -> &[&'static EndpointDefinition] {
        &self.endpoints
    }

    /// Looks up an endpoint by operation id.
    pub fn find(&self, operation_id: &str) -> Result<&'static EndpointDefinition, ClientError> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.operation_id == operation_id)
            .copied()
            .ok_or_else(|| ClientError::UnknownOperation {
                operation_id: operation_id.to_owned(),
                version: self.version.to_string(),
            })
    }
}

type ModuleCache = Mutex<HashMap<(Product, ApiVersion), Arc<VersionModule>>>;

fn cache() -> &'static ModuleCache {
    static CACHE: OnceLock<ModuleCache> = OnceLock::new();
    CACHE.get_or_init(ModuleCache::default)
}

/// API versions the client implements for `product`, oldest first.
pub fn supported_versions(product: Product) -> Vec<ApiVersion> {
    let (min, max) = product.version_range();
    (min.minor..=max.minor)
        .map(|minor| ApiVersion::new(min.major, minor))
        .collect()
}

/// Returns the endpoint module for `version`, building it on first use.
pub fn module(product: Product, version: ApiVersion) -> Result<Arc<VersionModule>, ClientError> {
    if !supported_versions(product).contains(&version) {
        return Err(ClientError::UnsupportedVersion {
            version: version.to_string(),
            side: VersionSide::Client,
        });
    }

    // The cache only memoizes pure data, so a poisoned lock is still usable.
    let mut modules = cache().lock().unwrap_or_else(PoisonError::into_inner);
    let module = modules
        .entry((product, version))
        .or_insert_with(|| Arc::new(VersionModule::build(product, version)));
    Ok(Arc::clone(module))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{module, supported_versions};
    use crate::ClientError;
    use crate::endpoints::Product;
    use crate::version::ApiVersion;

    #[test]
    fn lists_versions_in_ascending_order() {
        let versions = supported_versions(Product::Pure1);
        assert_eq!(versions.first(), Some(&ApiVersion::new(1, 0)));
        assert_eq!(versions.last(), Some(&ApiVersion::new(1, 4)));
        assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn memoizes_modules_per_version() {
        let first = module(Product::FlashArray, ApiVersion::new(2, 4)).expect("known");
        let second = module(Product::FlashArray, ApiVersion::new(2, 4)).expect("known");
        assert!(Arc::ptr_eq(&first, &second));

        let other = module(Product::FlashArray, ApiVersion::new(2, 5)).expect("known");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn filters_endpoints_by_introduction_version() {
        let old = module(Product::FlashArray, ApiVersion::new(2, 0)).expect("known");
        let new = module(Product::FlashArray, ApiVersion::new(2, 36)).expect("known");
        assert!(old.find("getFleets").is_err());
        assert!(new.find("getFleets").is_ok());
        assert!(old.find("getVolumes").is_ok());
    }

    #[test]
    fn rejects_unregistered_versions() {
        let error = module(Product::FlashBlade, ApiVersion::new(3, 0)).expect_err("unknown");
        assert!(matches!(error, ClientError::UnsupportedVersion { .. }));
    }
}
