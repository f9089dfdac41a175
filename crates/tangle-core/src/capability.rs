use std::collections::BTreeSet;

/// What a component is, for matching purposes.
///
/// Capabilities are declared as statics. A capability may extend any number of
/// parents, so a component producing `B` is accepted by links that require any
/// ancestor of `B`:
///
/// ```
/// use tangle_core::Capability;
///
/// static SINK: Capability = Capability::root("sink");
/// static CLOSEABLE: Capability = Capability::root("closeable");
/// static FILE_SINK: Capability = Capability::extends("file_sink", &[&SINK, &CLOSEABLE]);
///
/// assert!(FILE_SINK.is_a(&SINK));
/// assert!(FILE_SINK.is_a(&CLOSEABLE));
/// assert!(!SINK.is_a(&FILE_SINK));
/// ```
#[derive(Debug)]
pub struct Capability {
    name: &'static str,
    parents: &'static [&'static Capability],
}

/// Root capability. Every component is-a `COMPONENT`.
pub static COMPONENT: Capability = Capability::root("component");

impl Capability {
    pub const fn root(name: &'static str) -> Self {
        Self { name, parents: &[] }
    }

    pub const fn extends(name: &'static str, parents: &'static [&'static Capability]) -> Self {
        Self { name, parents }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parents(&self) -> &'static [&'static Capability] {
        self.parents
    }

    /// Walks the declared ancestry. Prefer [`CapabilitySet`] on hot paths.
    pub fn is_a(&self, other: &Capability) -> bool {
        other == &COMPONENT || self == other || self.parents.iter().any(|p| p.is_a(other))
    }
}

/// Capabilities are identified by name: two descriptors with the same name
/// are the same capability, wherever they are declared.
impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Capability {}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Transitive closure of a capability and all of its ancestors, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    primary: &'static str,
    names: BTreeSet<&'static str>,
}

impl CapabilitySet {
    pub fn of(capability: &'static Capability) -> Self {
        let mut names = BTreeSet::new();
        names.insert(COMPONENT.name);

        let mut pending = vec![capability];
        while let Some(cap) = pending.pop() {
            // Diamonds are common; only expand each ancestor once.
            if names.insert(cap.name) {
                pending.extend(cap.parents.iter().copied());
            }
        }

        Self {
            primary: capability.name,
            names,
        }
    }

    /// The capability the set was built from.
    pub fn primary(&self) -> &'static str {
        self.primary
    }

    pub fn contains(&self, capability: &Capability) -> bool {
        self.names.contains(capability.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }
}
