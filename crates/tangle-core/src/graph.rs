use std::collections::BTreeSet;

use serde::Serialize;

use crate::capability::CapabilitySet;
use crate::component::{Component, Peers};
use crate::error::UnmetLink;
use crate::link::{NamePattern, NodeId, PeerRef};

/// Where a component in the graph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Supplied by the caller; wired but never dropped by the graph.
    Seed,
    /// Created through a builder; owned by the graph.
    Owned,
}

pub(crate) enum Handle<'a> {
    Seed(&'a mut (dyn Component + 'static)),
    Owned(Box<dyn Component>),
}

impl Handle<'_> {
    pub(crate) fn get(&self) -> &dyn Component {
        match self {
            Handle::Seed(component) => &**component,
            Handle::Owned(component) => component.as_ref(),
        }
    }

    pub(crate) fn get_mut(&mut self) -> &mut dyn Component {
        match self {
            Handle::Seed(component) => &mut **component,
            Handle::Owned(component) => component.as_mut(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodeMeta {
    pub(crate) name: String,
    pub(crate) origin: Origin,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) live: bool,
}

impl NodeMeta {
    fn peer(&self, id: NodeId) -> PeerRef<'_> {
        PeerRef {
            id,
            name: &self.name,
            capabilities: &self.capabilities,
        }
    }
}

/// A live edge in the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub requires: &'static str,
}

/// The resolved object graph.
///
/// Built once by [`Resolver::resolve`](crate::Resolver::resolve). Seed
/// components are borrowed for `'a`; components created from builders are
/// owned and dropped with the graph. Node ids stay stable for the graph's
/// whole life, including ids of components that were pruned.
pub struct Graph<'a> {
    pub(crate) nodes: Vec<NodeMeta>,
    pub(crate) slots: Vec<Option<Handle<'a>>>,
    /// Names already instantiated (or seeded); never re-created.
    pub(crate) instantiated: BTreeSet<String>,
}

impl<'a> Graph<'a> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            slots: Vec::new(),
            instantiated: BTreeSet::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: &str, origin: Origin, handle: Handle<'a>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let capabilities = CapabilitySet::of(handle.get().capability());
        self.nodes.push(NodeMeta {
            name: name.to_string(),
            origin,
            capabilities,
            live: true,
        });
        self.slots.push(Some(handle));
        self.instantiated.insert(name.to_string());
        id
    }

    /// Remove a node from the graph. Owned components are dropped here.
    pub(crate) fn retire(&mut self, id: NodeId) {
        let meta = &mut self.nodes[id.0];
        meta.live = false;
        self.slots[id.0] = None;
    }

    pub(crate) fn is_instantiated(&self, name: &str) -> bool {
        self.instantiated.contains(name)
    }

    pub(crate) fn live_ids(&self, origin: Origin) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, meta)| meta.live && meta.origin == origin)
            .map(|(idx, _)| NodeId(idx))
            .collect()
    }

    /// Offer every live node accepted by `filter` to the unsatisfied links of `id`.
    ///
    /// Single links stop at their first successful bind.
    pub(crate) fn wire_links_of(
        &mut self,
        id: NodeId,
        filter: impl Fn(&NodeMeta) -> bool,
    ) -> usize {
        let Graph { nodes, slots, .. } = self;
        let Some(handle) = slots[id.0].as_mut() else {
            return 0;
        };

        let owner = &nodes[id.0].name;
        let mut bound = 0;
        for link in handle.get_mut().links_mut() {
            for (idx, meta) in nodes.iter().enumerate() {
                if link.satisfied() {
                    break;
                }
                if idx == id.0 || !meta.live || !filter(meta) || !link.matches_name(&meta.name) {
                    continue;
                }
                if link.bind(meta.peer(NodeId(idx))) {
                    tracing::debug!(
                        component = %owner,
                        peer = %meta.name,
                        requires = link.spec().requires().name(),
                        "Link bound"
                    );
                    bound += 1;
                }
            }
        }
        bound
    }

    /// Offer `target` to every unsatisfied link on every other live node.
    pub(crate) fn wire_to(&mut self, target: NodeId) -> usize {
        let Graph { nodes, slots, .. } = self;
        let meta = &nodes[target.0];
        let mut bound = 0;
        for (idx, slot) in slots.iter_mut().enumerate() {
            if idx == target.0 || !nodes[idx].live {
                continue;
            }
            let Some(handle) = slot.as_mut() else {
                continue;
            };
            for link in handle.get_mut().links_mut() {
                if link.satisfied() || !link.matches_name(&meta.name) {
                    continue;
                }
                if link.bind(meta.peer(target)) {
                    tracing::debug!(
                        component = %nodes[idx].name,
                        peer = %meta.name,
                        requires = link.spec().requires().name(),
                        "Link bound"
                    );
                    bound += 1;
                }
            }
        }
        bound
    }

    /// Drop every binding that points at `target`.
    pub(crate) fn unbind_everywhere(&mut self, target: NodeId) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter_mut().flatten() {
            for link in slot.get_mut().links_mut() {
                if link.unbind(target) {
                    removed += 1;
                }
            }
        }
        removed
    }

    pub(crate) fn unmet_required(&self, id: NodeId) -> Vec<UnmetLink> {
        let Some(handle) = self.slots[id.0].as_ref() else {
            return Vec::new();
        };
        handle
            .get()
            .links()
            .into_iter()
            .filter(|link| link.is_required() && !link.satisfied())
            .map(|link| UnmetLink {
                requires: link.spec().requires().name(),
                pattern: link.spec().pattern().as_str().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|meta| meta.live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all live components, seeds first, each group in insertion order.
    pub fn names(&self) -> Vec<&str> {
        [Origin::Seed, Origin::Owned]
            .into_iter()
            .flat_map(|origin| self.live_ids(origin))
            .map(|id| self.nodes[id.0].name.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.id_of(name).is_some()
    }

    /// Id of the first live component called `name`.
    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|meta| meta.live && meta.name == name)
            .map(NodeId)
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .get(id.0)
            .filter(|meta| meta.live)
            .map(|meta| meta.name.as_str())
    }

    pub fn origin(&self, id: NodeId) -> Option<Origin> {
        self.nodes
            .get(id.0)
            .filter(|meta| meta.live)
            .map(|meta| meta.origin)
    }

    pub fn capabilities(&self, id: NodeId) -> Option<&CapabilitySet> {
        self.nodes
            .get(id.0)
            .filter(|meta| meta.live)
            .map(|meta| &meta.capabilities)
    }

    pub fn component(&self, id: NodeId) -> Option<&dyn Component> {
        self.slots.get(id.0)?.as_ref().map(Handle::get)
    }

    pub fn component_mut(&mut self, id: NodeId) -> Option<&mut dyn Component> {
        self.slots.get_mut(id.0)?.as_mut().map(Handle::get_mut)
    }

    pub fn get<T: Component>(&self, id: NodeId) -> Option<&T> {
        self.component(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_mut<T: Component>(&mut self, id: NodeId) -> Option<&mut T> {
        self.component_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// First live component whose name matches `pattern` and whose type is `T`.
    ///
    /// An invalid pattern matches nothing.
    pub fn node<T: Component>(&self, pattern: &str) -> Option<(&str, &T)> {
        self.matching(pattern)
            .into_iter()
            .find_map(|id| Some((self.nodes[id.0].name.as_str(), self.get::<T>(id)?)))
    }

    pub fn node_mut<T: Component>(&mut self, pattern: &str) -> Option<(&str, &mut T)> {
        let id = self
            .matching(pattern)
            .into_iter()
            .find(|id| self.get::<T>(*id).is_some())?;
        let Graph { nodes, slots, .. } = self;
        let component = slots[id.0].as_mut()?.get_mut().as_any_mut().downcast_mut::<T>()?;
        Some((nodes[id.0].name.as_str(), component))
    }

    /// Every live component whose name matches `pattern` and whose type is `T`.
    pub fn nodes<T: Component>(&self, pattern: &str) -> Vec<(&str, &T)> {
        self.matching(pattern)
            .into_iter()
            .filter_map(|id| Some((self.nodes[id.0].name.as_str(), self.get::<T>(id)?)))
            .collect()
    }

    /// Every bound link between live components.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(handle) = slot else {
                continue;
            };
            for link in handle.get().links() {
                for peer in link.bound() {
                    if let Some(to) = self.name_of(peer) {
                        edges.push(Edge {
                            from: self.nodes[idx].name.clone(),
                            to: to.to_string(),
                            requires: link.spec().requires().name(),
                        });
                    }
                }
            }
        }
        edges
    }

    pub fn peers(&self) -> Peers<'_> {
        Peers::new(&self.nodes, &self.slots)
    }

    fn matching(&self, pattern: &str) -> Vec<NodeId> {
        let pattern = match NamePattern::new(pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid lookup pattern");
                return Vec::new();
            }
        };
        [Origin::Seed, Origin::Owned]
            .into_iter()
            .flat_map(|origin| self.live_ids(origin))
            .filter(|id| pattern.matches(&self.nodes[id.0].name))
            .collect()
    }
}

impl std::fmt::Debug for Graph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}
