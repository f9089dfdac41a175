use std::collections::BTreeMap;

use crate::capability::{Capability, CapabilitySet};
use crate::component::Component;
use crate::error::DefinitionError;

/// Factory producing a fresh component.
///
/// `Ok(None)` means the builder cannot produce an instance right now; the
/// resolver treats it like a failure.
pub type Factory = Box<dyn Fn() -> anyhow::Result<Option<Box<dyn Component>>> + Send + Sync>;

/// A named factory together with the capability it produces.
pub struct Builder {
    name: String,
    capability: &'static Capability,
    produces: CapabilitySet,
    factory: Factory,
}

impl Builder {
    pub fn new<F>(name: impl Into<String>, capability: &'static Capability, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Option<Box<dyn Component>>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            capability,
            produces: CapabilitySet::of(capability),
            factory: Box::new(factory),
        }
    }

    /// Builder for a component type that can be default-constructed.
    pub fn of_default<T>(name: impl Into<String>, capability: &'static Capability) -> Self
    where
        T: Component + Default,
    {
        Self::new(name, capability, || {
            let component: Box<dyn Component> = Box::new(T::default());
            Ok(Some(component))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> &'static Capability {
        self.capability
    }

    /// Every capability the produced component satisfies.
    pub fn produces(&self) -> &CapabilitySet {
        &self.produces
    }

    pub fn create(&self) -> anyhow::Result<Option<Box<dyn Component>>> {
        (self.factory)()
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("capability", &self.capability.name())
            .finish_non_exhaustive()
    }
}

/// Builders available to the resolver, keyed by unique name.
///
/// Iteration is in name order, which is also the order the resolver tries
/// builders in.
#[derive(Debug, Default)]
pub struct Registry {
    builders: BTreeMap<String, Builder>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a builder. A name can only be registered once; the existing builder is kept.
    pub fn register(&mut self, builder: Builder) -> Result<(), DefinitionError> {
        if self.builders.contains_key(builder.name()) {
            return Err(DefinitionError::DuplicateBuilder(builder.name.clone()));
        }
        tracing::debug!(
            builder = %builder.name,
            capability = builder.capability.name(),
            "Builder registered"
        );
        self.builders.insert(builder.name.clone(), builder);
        Ok(())
    }

    pub fn register_default<T>(
        &mut self,
        name: impl Into<String>,
        capability: &'static Capability,
    ) -> Result<(), DefinitionError>
    where
        T: Component + Default,
    {
        self.register(Builder::of_default::<T>(name, capability))
    }

    pub fn unregister(&mut self, name: &str) -> Option<Builder> {
        let removed = self.builders.remove(name);
        if removed.is_some() {
            tracing::debug!(builder = name, "Builder unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Builder> {
        self.builders.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Builders whose product is-a `capability`, regardless of name.
    pub fn find_by_type(&self, capability: &Capability) -> Vec<&Builder> {
        self.builders
            .values()
            .filter(|builder| builder.produces.contains(capability))
            .collect()
    }

    pub fn builders(&self) -> impl Iterator<Item = &Builder> {
        self.builders.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TRANSPORT: Capability = Capability::root("transport");
    static TCP: Capability = Capability::extends("tcp", &[&TRANSPORT]);
    static CODEC: Capability = Capability::root("codec");

    #[derive(Default)]
    struct Tcp;

    impl Component for Tcp {
        fn capability(&self) -> &'static Capability {
            &TCP
        }
    }

    #[derive(Default)]
    struct Codec;

    impl Component for Codec {
        fn capability(&self) -> &'static Capability {
            &CODEC
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = Registry::new();
        registry.register_default::<Tcp>("net", &TCP).unwrap();

        let err = registry.register_default::<Codec>("net", &CODEC).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateBuilder(name) if name == "net"));
        assert_eq!(registry.get("net").unwrap().capability().name(), "tcp");
    }

    #[test]
    fn unregister_removes_builder() {
        let mut registry = Registry::new();
        registry.register_default::<Tcp>("net", &TCP).unwrap();

        assert!(registry.unregister("net").is_some());
        assert!(registry.unregister("net").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn find_by_type_follows_capability_ancestry() {
        let mut registry = Registry::new();
        registry.register_default::<Tcp>("tcp", &TCP).unwrap();
        registry.register_default::<Codec>("json", &CODEC).unwrap();

        let transports: Vec<_> = registry
            .find_by_type(&TRANSPORT)
            .into_iter()
            .map(Builder::name)
            .collect();
        assert_eq!(transports, vec!["tcp"]);
        assert!(registry.find_by_type(&TCP).len() == 1);
        assert_eq!(registry.find_by_type(&crate::COMPONENT).len(), 2);
    }

    #[test]
    fn builders_iterate_in_name_order() {
        let mut registry = Registry::new();
        registry.register_default::<Codec>("zeta", &CODEC).unwrap();
        registry.register_default::<Codec>("alpha", &CODEC).unwrap();

        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn factory_can_decline() {
        let builder = Builder::new("lazy", &CODEC, || Ok(None));
        assert!(builder.create().unwrap().is_none());

        let failing = Builder::new("broken", &CODEC, || anyhow::bail!("no config"));
        match failing.create() {
            Err(e) => assert_eq!(e.to_string(), "no config"),
            Ok(_) => panic!("factory should have failed"),
        }
    }
}
