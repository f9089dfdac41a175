use std::any::Any;

use crate::capability::Capability;
use crate::graph::{Handle, NodeMeta};
use crate::link::{Link, Multi, NodeId, Single};

/// Downcasting support for components. Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of the composed system.
///
/// A component declares what it is through [`Component::capability`] and what
/// it needs through its links. Links are plain fields; `links` and `links_mut`
/// must list the same links in the same (declaration) order.
///
/// ```
/// use tangle_core::{Capability, Component, Flags, Link, Single};
///
/// static CLOCK: Capability = Capability::root("clock");
/// static SCHEDULER: Capability = Capability::root("scheduler");
///
/// struct Scheduler {
///     clock: Single,
/// }
///
/// impl Component for Scheduler {
///     fn capability(&self) -> &'static Capability {
///         &SCHEDULER
///     }
///
///     fn links(&self) -> Vec<&dyn Link> {
///         vec![&self.clock]
///     }
///
///     fn links_mut(&mut self) -> Vec<&mut dyn Link> {
///         vec![&mut self.clock]
///     }
/// }
///
/// let scheduler = Scheduler {
///     clock: Single::new(&CLOCK, Flags::CREATE_REQUIRED, "clock").unwrap(),
/// };
/// assert_eq!(scheduler.links().len(), 1);
/// ```
pub trait Component: AsAny {
    fn capability(&self) -> &'static Capability;

    fn links(&self) -> Vec<&dyn Link> {
        Vec::new()
    }

    fn links_mut(&mut self) -> Vec<&mut dyn Link> {
        Vec::new()
    }

    fn initialize(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn start(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn deinitialize(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Read access to the rest of the graph while a lifecycle hook runs.
///
/// The component whose hook is running is not reachable through its own
/// `Peers`; looking it up yields `None`.
pub struct Peers<'g> {
    nodes: &'g [NodeMeta],
    slots: &'g [Option<Handle<'g>>],
}

impl<'g> Peers<'g> {
    pub(crate) fn new(nodes: &'g [NodeMeta], slots: &'g [Option<Handle<'g>>]) -> Self {
        Self { nodes, slots }
    }

    pub fn component(&self, id: NodeId) -> Option<&'g dyn Component> {
        let live = self.nodes.get(id.0).is_some_and(|meta| meta.live);
        if !live {
            return None;
        }
        self.slots.get(id.0)?.as_ref().map(Handle::get)
    }

    pub fn get<T: Component>(&self, id: NodeId) -> Option<&'g T> {
        self.component(id)
            .and_then(|component| component.as_any().downcast_ref::<T>())
    }

    pub fn name(&self, id: NodeId) -> Option<&'g str> {
        self.nodes
            .get(id.0)
            .filter(|meta| meta.live)
            .map(|meta| meta.name.as_str())
    }

    /// The peer bound to a single link, if it is a `T`.
    pub fn single<T: Component>(&self, link: &Single) -> Option<&'g T> {
        link.peer().and_then(|id| self.get::<T>(id))
    }

    /// Every peer bound to a multi link that is a `T`, in name order.
    pub fn multi<T: Component>(&self, link: &Multi) -> Vec<(&'g str, &'g T)> {
        link.peers()
            .filter_map(|(_, id)| Some((self.name(id)?, self.get::<T>(id)?)))
            .collect()
    }
}
