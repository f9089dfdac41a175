use std::collections::{BTreeMap, BTreeSet};

use crate::capability::CapabilitySet;
use crate::component::Component;
use crate::error::{BoxError, GraphError};
use crate::graph::{Graph, Handle, Origin};
use crate::link::{NamePattern, NodeId};
use crate::registry::{Builder, Registry};

type Report<'r> = Box<dyn FnMut(GraphError) + 'r>;

/// Builds a [`Graph`] from seed components and requested builder names.
///
/// Resolution runs in three passes:
///
/// 1. Seed components are wired to each other.
/// 2. Requested builders are instantiated, then every unsatisfied
///    `CREATE_IF_NOT_EXIST` link pulls in a matching builder until no link can
///    trigger another creation.
/// 3. Owned components left with an unsatisfied `REQUIRED` link are pruned,
///    repeatedly, since pruning one can break another. Links freed by a prune
///    go back through step 2 until a pass prunes nothing.
///
/// Failures never abort resolution. They go to the `on_error` callback, or are
/// dropped when no callback is set.
///
/// ```
/// use tangle_core::{Builder, Capability, Component, Registry, Resolver};
///
/// static CLOCK: Capability = Capability::root("clock");
///
/// #[derive(Default)]
/// struct Clock;
///
/// impl Component for Clock {
///     fn capability(&self) -> &'static Capability {
///         &CLOCK
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.register(Builder::of_default::<Clock>("clock", &CLOCK)).unwrap();
///
/// let graph = Resolver::new(&registry).request("clock").resolve();
/// assert!(graph.contains("clock"));
/// ```
pub struct Resolver<'r, 'a> {
    registry: &'r Registry,
    seeds: BTreeMap<String, &'a mut (dyn Component + 'static)>,
    requests: Vec<String>,
    report: Option<Report<'r>>,
}

impl<'r, 'a> Resolver<'r, 'a> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            seeds: BTreeMap::new(),
            requests: Vec::new(),
            report: None,
        }
    }

    /// Add a caller-owned component. Seeding the same name twice keeps the last one.
    pub fn seed(
        mut self,
        name: impl Into<String>,
        component: &'a mut (dyn Component + 'static),
    ) -> Self {
        self.seeds.insert(name.into(), component);
        self
    }

    /// Request every builder whose name matches `pattern`.
    pub fn request(mut self, pattern: impl Into<String>) -> Self {
        self.requests.push(pattern.into());
        self
    }

    pub fn requests<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requests.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn on_error(mut self, report: impl FnMut(GraphError) + 'r) -> Self {
        self.report = Some(Box::new(report));
        self
    }

    pub fn resolve(self) -> Graph<'a> {
        let Resolver {
            registry,
            seeds,
            requests,
            report,
        } = self;

        let mut graph = Graph::new();
        for (name, component) in seeds {
            graph.insert(&name, Origin::Seed, Handle::Seed(component));
        }

        let mut resolution = Resolution {
            registry,
            graph,
            broken: BTreeSet::new(),
            report,
        };
        resolution.cross_wire_seeds();
        resolution.create_requested(&requests);
        let mut created = resolution.grow();
        // Pruning can free creatable links that another builder may still fill.
        while resolution.prune() > 0 {
            created += resolution.grow();
        }
        resolution.report_unmet_seeds();

        tracing::info!(
            components = resolution.graph.len(),
            created,
            "Graph resolved"
        );
        resolution.graph
    }
}

struct Resolution<'r, 'a> {
    registry: &'r Registry,
    graph: Graph<'a>,
    /// Builders that failed this pass; never retried.
    broken: BTreeSet<String>,
    report: Option<Report<'r>>,
}

impl<'r> Resolution<'r, '_> {
    fn report(&mut self, error: GraphError) {
        tracing::warn!(
            kind = ?error.kind(),
            name = error.name(),
            error = %error,
            "Resolution error"
        );
        if let Some(report) = self.report.as_mut() {
            report(error);
        }
    }

    fn cross_wire_seeds(&mut self) {
        for id in self.graph.live_ids(Origin::Seed) {
            self.graph.wire_links_of(id, |meta| meta.origin == Origin::Seed);
        }
    }

    fn create_requested(&mut self, requests: &[String]) {
        for request in requests {
            let pattern = match NamePattern::new(request) {
                Ok(pattern) => pattern,
                Err(e) => {
                    self.report(GraphError::NotCreatable {
                        name: request.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let matching: Vec<&'r Builder> = self
                .registry
                .builders()
                .filter(|builder| pattern.matches(builder.name()))
                .collect();
            if matching.is_empty() {
                self.report(GraphError::NotCreatable {
                    name: request.clone(),
                    reason: "no registered builder matches".into(),
                });
                continue;
            }

            for builder in matching {
                if self.is_available(builder) {
                    self.instantiate(builder);
                }
            }
        }
    }

    /// Create components until no unsatisfied creatable link has a usable builder.
    fn grow(&mut self) -> usize {
        let mut created = 0;
        while let Some(builder) = self.next_creatable() {
            if self.instantiate(builder).is_some() {
                created += 1;
            }
        }
        tracing::debug!(created, broken = self.broken.len(), "Fixed point reached");
        created
    }

    fn is_available(&self, builder: &Builder) -> bool {
        !self.graph.is_instantiated(builder.name()) && !self.broken.contains(builder.name())
    }

    /// First builder, in link declaration order then registry order, that an
    /// unsatisfied creatable link could use.
    fn next_creatable(&self) -> Option<&'r Builder> {
        let registry = self.registry;
        for origin in [Origin::Seed, Origin::Owned] {
            for id in self.graph.live_ids(origin) {
                let Some(component) = self.graph.component(id) else {
                    continue;
                };
                for link in component.links() {
                    if link.satisfied() || !link.creates() {
                        continue;
                    }
                    let found = registry.builders().find(|builder| {
                        link.matches_name(builder.name())
                            && self.is_available(builder)
                            && link.can_accept(builder.produces())
                    });
                    if found.is_some() {
                        return found;
                    }
                }
            }
        }
        None
    }

    fn instantiate(&mut self, builder: &'r Builder) -> Option<NodeId> {
        let name = builder.name();
        tracing::debug!(builder = name, "Creating component");

        let component = match builder.create() {
            Ok(Some(component)) => component,
            Ok(None) => {
                self.fail(builder, "factory returned no instance".into());
                return None;
            }
            Err(e) => {
                self.fail(builder, e.into());
                return None;
            }
        };

        let actual = CapabilitySet::of(component.capability());
        if !actual.contains(builder.capability()) {
            self.fail(
                builder,
                format!(
                    "component is a {} but the builder declares {}",
                    actual.primary(),
                    builder.capability().name()
                )
                .into(),
            );
            return None;
        }

        let id = self.graph.insert(name, Origin::Owned, Handle::Owned(component));
        let inbound = self.graph.wire_to(id);
        let outbound = self.graph.wire_links_of(id, |_| true);
        tracing::info!(component = name, inbound, outbound, "Component created");
        Some(id)
    }

    fn fail(&mut self, builder: &Builder, source: BoxError) {
        self.broken.insert(builder.name().to_string());
        self.report(GraphError::CreateFailed {
            name: builder.name().to_string(),
            source,
        });
    }

    /// Remove owned components with unmet required links until none is left.
    /// Returns how many were removed.
    fn prune(&mut self) -> usize {
        let mut pruned = 0;
        loop {
            let doomed = self
                .graph
                .live_ids(Origin::Owned)
                .into_iter()
                .find_map(|id| {
                    let unmet = self.graph.unmet_required(id);
                    (!unmet.is_empty()).then_some((id, unmet))
                });
            let Some((id, links)) = doomed else {
                break;
            };

            let name = self.graph.nodes[id.index()].name.clone();
            let unbound = self.graph.unbind_everywhere(id);
            self.graph.retire(id);
            tracing::info!(component = %name, unbound, "Component pruned");
            self.report(GraphError::LinksUnsatisfied { name, links });
            pruned += 1;

            // Links freed by the pruned component may fit another survivor.
            for survivor in self
                .graph
                .live_ids(Origin::Seed)
                .into_iter()
                .chain(self.graph.live_ids(Origin::Owned))
            {
                self.graph.wire_links_of(survivor, |_| true);
            }
        }
        pruned
    }

    fn report_unmet_seeds(&mut self) {
        for id in self.graph.live_ids(Origin::Seed) {
            let links = self.graph.unmet_required(id);
            if !links.is_empty() {
                let name = self.graph.nodes[id.index()].name.clone();
                self.report(GraphError::LinksUnsatisfied { name, links });
            }
        }
    }
}
