//! Built-in components available to the `tangle` binary.
//!
//! A small in-process service stack: an HTTP front end that needs a store and
//! a log sink, pluggable request handlers, and a backup job whose storage
//! backend cannot be created without a data directory.

use std::time::{SystemTime, UNIX_EPOCH};

use tangle_core::{
    Builder, Capability, Component, DefinitionError, Flags, Link, Multi, Peers, Registry, Single,
};

pub static CLOCK: Capability = Capability::root("clock");
pub static SINK: Capability = Capability::root("sink");
pub static CONSOLE_SINK: Capability = Capability::extends("console_sink", &[&SINK]);
pub static STORE: Capability = Capability::root("store");
pub static MEMORY_STORE: Capability = Capability::extends("memory_store", &[&STORE]);
pub static DISK_STORE: Capability = Capability::extends("disk_store", &[&STORE]);
pub static SERVICE: Capability = Capability::root("service");
pub static HTTP_SERVER: Capability = Capability::extends("http_server", &[&SERVICE]);
pub static PLUGIN: Capability = Capability::root("plugin");
pub static JOB: Capability = Capability::root("job");

/// Register every built-in builder.
pub fn register(registry: &mut Registry) -> Result<(), DefinitionError> {
    registry.register_default::<SystemClock>("clock", &CLOCK)?;
    registry.register_default::<ConsoleSink>("console", &CONSOLE_SINK)?;
    registry.register(Builder::new("memory_store", &MEMORY_STORE, || {
        let store: Box<dyn Component> = Box::new(MemoryStore::new()?);
        Ok(Some(store))
    }))?;
    registry.register(Builder::new("disk_store", &DISK_STORE, || {
        anyhow::bail!("no data directory configured")
    }))?;
    registry.register(Builder::new("http_server", &HTTP_SERVER, || {
        let server: Box<dyn Component> = Box::new(HttpServer::new()?);
        Ok(Some(server))
    }))?;
    registry.register(Builder::new("plugin_health", &PLUGIN, || {
        let plugin: Box<dyn Component> = Box::new(Plugin::new("/health"));
        Ok(Some(plugin))
    }))?;
    registry.register(Builder::new("plugin_metrics", &PLUGIN, || {
        let plugin: Box<dyn Component> = Box::new(Plugin::new("/metrics"));
        Ok(Some(plugin))
    }))?;
    registry.register(Builder::new("backup", &JOB, || {
        let job: Box<dyn Component> = Box::new(Backup::new()?);
        Ok(Some(job))
    }))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn now_millis(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    }
}

impl Component for SystemClock {
    fn capability(&self) -> &'static Capability {
        &CLOCK
    }
}

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Component for ConsoleSink {
    fn capability(&self) -> &'static Capability {
        &CONSOLE_SINK
    }

    fn start(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
        tracing::info!(sink = "console", "Sink ready");
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    clock: Single,
    opened_at: Option<u128>,
}

impl MemoryStore {
    pub fn new() -> Result<Self, DefinitionError> {
        Ok(Self {
            clock: Single::new(&CLOCK, Flags::CREATE_IF_NOT_EXIST, "clock")?,
            opened_at: None,
        })
    }
}

impl Component for MemoryStore {
    fn capability(&self) -> &'static Capability {
        &MEMORY_STORE
    }

    fn links(&self) -> Vec<&dyn Link> {
        vec![&self.clock]
    }

    fn links_mut(&mut self) -> Vec<&mut dyn Link> {
        vec![&mut self.clock]
    }

    fn initialize(&mut self, peers: &Peers<'_>) -> anyhow::Result<()> {
        self.opened_at = peers
            .single::<SystemClock>(&self.clock)
            .map(SystemClock::now_millis);
        tracing::info!(opened_at = ?self.opened_at, "Memory store opened");
        Ok(())
    }
}

#[derive(Debug)]
pub struct HttpServer {
    store: Single,
    sink: Single,
    plugins: Multi,
    routes: Vec<String>,
}

impl HttpServer {
    pub fn new() -> Result<Self, DefinitionError> {
        Ok(Self {
            store: Single::new(&STORE, Flags::CREATE_REQUIRED, "memory_store")?,
            sink: Single::new(&SINK, Flags::CREATE_REQUIRED, "console")?,
            plugins: Multi::new(&PLUGIN, Flags::CREATE_IF_NOT_EXIST, "plugin_.*")?,
            routes: Vec::new(),
        })
    }
}

impl Component for HttpServer {
    fn capability(&self) -> &'static Capability {
        &HTTP_SERVER
    }

    fn links(&self) -> Vec<&dyn Link> {
        vec![&self.store, &self.sink, &self.plugins]
    }

    fn links_mut(&mut self) -> Vec<&mut dyn Link> {
        vec![&mut self.store, &mut self.sink, &mut self.plugins]
    }

    fn start(&mut self, peers: &Peers<'_>) -> anyhow::Result<()> {
        self.routes = peers
            .multi::<Plugin>(&self.plugins)
            .into_iter()
            .map(|(_, plugin)| plugin.route.to_string())
            .collect();
        tracing::info!(
            store = self.store.peer_name().unwrap_or("-"),
            routes = ?self.routes,
            "HTTP server started"
        );
        Ok(())
    }

    fn deinitialize(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
        self.routes.clear();
        Ok(())
    }
}

#[derive(Debug)]
pub struct Plugin {
    route: &'static str,
}

impl Plugin {
    pub fn new(route: &'static str) -> Self {
        Self { route }
    }
}

impl Component for Plugin {
    fn capability(&self) -> &'static Capability {
        &PLUGIN
    }
}

/// Periodic backup; needs a disk store, which cannot be built here.
#[derive(Debug)]
pub struct Backup {
    target: Single,
}

impl Backup {
    pub fn new() -> Result<Self, DefinitionError> {
        Ok(Self {
            target: Single::new(&STORE, Flags::CREATE_REQUIRED, "disk_store")?,
        })
    }
}

impl Component for Backup {
    fn capability(&self) -> &'static Capability {
        &JOB
    }

    fn links(&self) -> Vec<&dyn Link> {
        vec![&self.target]
    }

    fn links_mut(&mut self) -> Vec<&mut dyn Link> {
        vec![&mut self.target]
    }
}
