//! Share selection for unarchiving
//!
//! A [`ShareFinder`] picks the live share a dataset is restored into. Free
//! space is read from each candidate at selection time. Policies are looked
//! up by name in a [`ShareFinderRegistry`]:
//!
//! - `simple`: first share, in enumeration order, other than the dataset's
//!   current one with enough free space
//! - `mapping`: like `simple` but restricted to the mapped share ids, tried
//!   in mapping order

use crate::router::DestinationRouter;
use coldstore_core::{ConfigError, DatasetDescriptor, Share};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks a destination share for a dataset.
pub trait ShareFinder: Send + Sync {
    /// A share with room for `dataset`, or `None`.
    fn try_to_find_share(&self, dataset: &DatasetDescriptor, shares: &[Share]) -> Option<Share>;
}

/// Inputs available to every share finder factory.
#[derive(Debug, Clone, Default)]
pub struct ShareFinderContext {
    /// Free-form parameters from the configuration
    pub params: BTreeMap<String, String>,
    /// Router of the archiver being built
    pub router: Arc<DestinationRouter>,
}

impl ShareFinderContext {
    /// Parameter `key` parsed as `T`, or `None` if absent.
    pub fn param<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::invalid_value(key, format!("cannot parse '{}'", raw))),
        }
    }
}

fn has_room(share: &Share, needed: u64) -> bool {
    match share.free_space() {
        Ok(free) => free >= needed,
        Err(e) => {
            warn!(share = share.id(), error = %e, "Cannot determine free space, share skipped");
            false
        }
    }
}

/// First sufficient share other than the current one.
#[derive(Debug, Clone, Default)]
pub struct SimpleShareFinder {
    reserve_bytes: u64,
}

impl SimpleShareFinder {
    /// Finder that keeps `reserve_bytes` free on every share.
    pub fn with_reserve(reserve_bytes: u64) -> Self {
        SimpleShareFinder { reserve_bytes }
    }
}

impl ShareFinder for SimpleShareFinder {
    fn try_to_find_share(&self, dataset: &DatasetDescriptor, shares: &[Share]) -> Option<Share> {
        let needed = dataset.size.unwrap_or(0).saturating_add(self.reserve_bytes);
        let found = shares
            .iter()
            .filter(|s| s.id() != dataset.share_id)
            .find(|s| has_room(s, needed))
            .cloned();
        debug!(code = %dataset.code, share = ?found.as_ref().map(Share::id), "Simple share selection");
        found
    }
}

/// First sufficient share among the mapped share ids.
pub struct MappingShareFinder {
    router: Arc<DestinationRouter>,
}

impl MappingShareFinder {
    /// Finder using the share ids resolved by `router`.
    pub fn new(router: Arc<DestinationRouter>) -> Self {
        MappingShareFinder { router }
    }
}

impl ShareFinder for MappingShareFinder {
    fn try_to_find_share(&self, dataset: &DatasetDescriptor, shares: &[Share]) -> Option<Share> {
        let needed = dataset.size.unwrap_or(0);
        self.router
            .resolve_share_ids(dataset)
            .iter()
            .filter(|id| **id != dataset.share_id)
            .filter_map(|id| shares.iter().find(|s| s.id() == id))
            .find(|s| has_room(s, needed))
            .cloned()
    }
}

/// Constructor of a share finder from its context.
pub type ShareFinderFactory =
    fn(&ShareFinderContext) -> Result<Box<dyn ShareFinder>, ConfigError>;

fn simple_factory(context: &ShareFinderContext) -> Result<Box<dyn ShareFinder>, ConfigError> {
    let reserve = context.param::<u64>("reserve_bytes")?.unwrap_or(0);
    Ok(Box::new(SimpleShareFinder::with_reserve(reserve)))
}

fn mapping_factory(context: &ShareFinderContext) -> Result<Box<dyn ShareFinder>, ConfigError> {
    if !context.router.has_mapping() {
        return Err(ConfigError::invalid_value(
            "share_finder.kind",
            "'mapping' share finder requires a mapping file",
        ));
    }
    Ok(Box::new(MappingShareFinder::new(Arc::clone(&context.router))))
}

/// Share finder policies by name.
pub struct ShareFinderRegistry {
    factories: HashMap<String, ShareFinderFactory>,
}

impl Default for ShareFinderRegistry {
    fn default() -> Self {
        let mut registry = ShareFinderRegistry {
            factories: HashMap::new(),
        };
        registry.register("simple", simple_factory);
        registry.register("mapping", mapping_factory);
        registry
    }
}

impl ShareFinderRegistry {
    /// Registry with the built-in `simple` and `mapping` policies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the policy `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ShareFinderFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Instantiate the policy `name`.
    pub fn create(
        &self,
        name: &str,
        context: &ShareFinderContext,
    ) -> Result<Box<dyn ShareFinder>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownShareFinder(name.to_string()))?;
        factory(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTable;
    use coldstore_core::FixedFreeSpace;
    use std::path::Path;

    fn share(id: &str, free: u64) -> Share {
        Share::with_free_space(id, format!("/store/{}", id), Arc::new(FixedFreeSpace(free)))
    }

    fn dataset(size: u64, current: &str) -> DatasetDescriptor {
        DatasetDescriptor::new("ds1", "a/ds1")
            .with_size(size)
            .with_share_id(current)
            .with_experiment("S", "P", "E")
    }

    #[test]
    fn test_simple_picks_share_with_enough_space() {
        let shares = vec![share("1", 10), share("2", 12)];
        let found = SimpleShareFinder::default().try_to_find_share(&dataset(11, "9"), &shares);
        assert_eq!(found.unwrap().id(), "2");
    }

    #[test]
    fn test_simple_first_fit_in_enumeration_order() {
        let shares = vec![share("1", 100), share("2", 1000)];
        let found = SimpleShareFinder::default().try_to_find_share(&dataset(11, "9"), &shares);
        assert_eq!(found.unwrap().id(), "1");
    }

    #[test]
    fn test_simple_excludes_current_share() {
        let shares = vec![share("1", 100), share("2", 100)];
        let found = SimpleShareFinder::default().try_to_find_share(&dataset(11, "1"), &shares);
        assert_eq!(found.unwrap().id(), "2");
    }

    #[test]
    fn test_simple_none_when_nothing_fits() {
        let shares = vec![share("1", 10), share("2", 5)];
        assert!(SimpleShareFinder::default()
            .try_to_find_share(&dataset(11, "9"), &shares)
            .is_none());
        assert!(SimpleShareFinder::with_reserve(100)
            .try_to_find_share(&dataset(11, "9"), &[share("3", 50)])
            .is_none());
    }

    #[test]
    fn test_mapping_uses_mapped_order() {
        let table = MappingTable::parse(
            Path::new("m.tsv"),
            "Identifier\tShare IDs\n/S/P/E\t3, 1, 2\n",
        )
        .unwrap();
        let finder = MappingShareFinder::new(Arc::new(DestinationRouter::new(table)));
        let shares = vec![share("1", 100), share("2", 100), share("3", 5)];

        let found = finder.try_to_find_share(&dataset(11, "9"), &shares);
        assert_eq!(found.unwrap().id(), "1");
        let found = finder.try_to_find_share(&dataset(11, "1"), &shares);
        assert_eq!(found.unwrap().id(), "2");
    }

    #[test]
    fn test_registry() {
        let registry = ShareFinderRegistry::new();
        let context = ShareFinderContext::default();
        assert!(registry.create("simple", &context).is_ok());
        assert!(matches!(
            registry.create("mapping", &context),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            registry.create("nope", &context),
            Err(ConfigError::UnknownShareFinder(name)) if name == "nope"
        ));
    }

    struct AlwaysFirst;

    impl ShareFinder for AlwaysFirst {
        fn try_to_find_share(&self, _: &DatasetDescriptor, shares: &[Share]) -> Option<Share> {
            shares.first().cloned()
        }
    }

    #[test]
    fn test_registry_custom_policy_and_params() {
        let mut registry = ShareFinderRegistry::new();
        registry.register("first", |_| Ok(Box::new(AlwaysFirst)));
        let context = ShareFinderContext::default();
        let finder = registry.create("first", &context).unwrap();
        let found = finder.try_to_find_share(&dataset(1_000, "1"), &[share("1", 0)]);
        assert_eq!(found.unwrap().id(), "1");

        let mut context = ShareFinderContext::default();
        context.params.insert("reserve_bytes".into(), "lots".into());
        assert!(matches!(
            registry.create("simple", &context),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
