//! Declarative component wiring.
//!
//! Components declare what they are (a [`Capability`]) and what they need
//! (links matched by name pattern and capability). Given a [`Registry`] of
//! named builders, the [`Resolver`] creates only the components that are
//! transitively required, binds compatible components to each other and
//! prunes the ones whose required links cannot be met. The resulting
//! [`Graph`] then drives the `initialize`/`start`/`deinitialize` lifecycle.
//!
//! # Quick start
//!
//! ```rust
//! use tangle_core::{Builder, Capability, Component, Flags, Link, Registry, Resolver, Single};
//!
//! static STORE: Capability = Capability::root("store");
//! static SERVICE: Capability = Capability::root("service");
//!
//! #[derive(Default)]
//! struct Store;
//!
//! impl Component for Store {
//!     fn capability(&self) -> &'static Capability {
//!         &STORE
//!     }
//! }
//!
//! struct Service {
//!     store: Single,
//! }
//!
//! impl Default for Service {
//!     fn default() -> Self {
//!         Self {
//!             store: Single::new(&STORE, Flags::CREATE_REQUIRED, "store").unwrap(),
//!         }
//!     }
//! }
//!
//! impl Component for Service {
//!     fn capability(&self) -> &'static Capability {
//!         &SERVICE
//!     }
//!
//!     fn links(&self) -> Vec<&dyn Link> {
//!         vec![&self.store]
//!     }
//!
//!     fn links_mut(&mut self) -> Vec<&mut dyn Link> {
//!         vec![&mut self.store]
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register(Builder::of_default::<Store>("store", &STORE)).unwrap();
//! registry.register(Builder::of_default::<Service>("service", &SERVICE)).unwrap();
//!
//! let mut errors = Vec::new();
//! let mut graph = Resolver::new(&registry)
//!     .request("service")
//!     .on_error(|e| errors.push(e))
//!     .resolve();
//!
//! assert_eq!(graph.names(), vec!["service", "store"]);
//! graph.initialize(|e| eprintln!("{e}"));
//! graph.deinitialize(|e| eprintln!("{e}"));
//! ```

pub mod capability;
pub mod component;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod link;
pub mod registry;
pub mod resolver;

pub use capability::{COMPONENT, Capability, CapabilitySet};
pub use component::{Component, Peers};
pub use error::{DefinitionError, ErrorKind, GraphError, LifecyclePhase, UnmetLink};
pub use graph::{Edge, Graph, Origin};
pub use link::{Flags, Link, LinkSpec, Multi, NamePattern, NodeId, PeerRef, Single};
pub use registry::{Builder, Registry};
pub use resolver::Resolver;
