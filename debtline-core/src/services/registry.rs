//! Provider registry - one provider instance per source, fixed at startup

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::demo::DemoProvider;
use crate::adapters::manual::ManualProvider;
use crate::adapters::method::MethodProvider;
use crate::adapters::plaid::PlaidProvider;
use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::AccountSource;
use crate::ports::LiabilityProvider;

/// Immutable map from source tag to provider.
///
/// Built once; shared read-only by every request.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<AccountSource, Arc<dyn LiabilityProvider>>,
}

impl ProviderRegistry {
    /// Register every built-in provider. Aggregators without credentials are
    /// still registered; they report themselves unavailable.
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .with(Arc::new(PlaidProvider::new(&config.plaid, config.request_timeout_secs)))
            .with(Arc::new(MethodProvider::new(&config.method, config.request_timeout_secs)))
            .with(Arc::new(DemoProvider::new()))
            .with(Arc::new(ManualProvider))
            .build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            providers: HashMap::new(),
        }
    }

    /// `UnknownProvider` when nothing is registered for the source
    pub fn get(&self, source: AccountSource) -> Result<&Arc<dyn LiabilityProvider>> {
        self.providers
            .get(&source)
            .ok_or_else(|| Error::UnknownProvider(source.to_string()))
    }

    /// Registered sources with their availability, in declaration order
    pub fn sources(&self) -> Vec<(AccountSource, bool)> {
        AccountSource::ALL
            .iter()
            .filter_map(|s| self.providers.get(s).map(|p| (*s, p.is_available())))
            .collect()
    }
}

pub struct RegistryBuilder {
    providers: HashMap<AccountSource, Arc<dyn LiabilityProvider>>,
}

impl RegistryBuilder {
    /// Register a provider under its own source tag. A later registration
    /// for the same source replaces the earlier one.
    pub fn with(mut self, provider: Arc<dyn LiabilityProvider>) -> Self {
        self.providers.insert(provider.source(), provider);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_registers_all_sources() {
        let registry = ProviderRegistry::from_config(&Config::default());
        let sources = registry.sources();

        assert_eq!(sources.len(), 4);
        assert!(sources.contains(&(AccountSource::Demo, true)));
        assert!(sources.contains(&(AccountSource::Manual, true)));
        // No credentials in a default config
        assert!(sources.contains(&(AccountSource::Plaid, false)));
        assert!(sources.contains(&(AccountSource::Method, false)));
    }

    #[test]
    fn test_unregistered_source_is_unknown() {
        let registry = ProviderRegistry::builder()
            .with(Arc::new(DemoProvider::new()))
            .build();

        assert!(registry.get(AccountSource::Demo).is_ok());
        assert!(matches!(
            registry.get(AccountSource::Plaid),
            Err(Error::UnknownProvider(_))
        ));
    }
}
