use crate::component::Peers;
use crate::error::{GraphError, LifecyclePhase};
use crate::graph::{Graph, Origin};
use crate::link::NodeId;

impl Graph<'_> {
    /// Run `initialize` on every component, then `start` on every component.
    ///
    /// Seeds go first, then owned components, each group in name order. A
    /// failing hook is reported and the remaining hooks still run, including
    /// `start` on the component whose `initialize` failed.
    pub fn initialize(&mut self, mut report: impl FnMut(GraphError)) {
        let order = self.lifecycle_order();
        for phase in [LifecyclePhase::Initialize, LifecyclePhase::Start] {
            for &id in &order {
                if let Err(error) = self.run_hook(id, phase) {
                    report(error);
                }
            }
        }
    }

    /// Run `deinitialize` on every component, in the reverse of the
    /// initialization order. Failures are isolated like in [`Graph::initialize`].
    pub fn deinitialize(&mut self, mut report: impl FnMut(GraphError)) {
        let mut order = self.lifecycle_order();
        order.reverse();
        for id in order {
            if let Err(error) = self.run_hook(id, LifecyclePhase::Deinitialize) {
                report(error);
            }
        }
    }

    fn lifecycle_order(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        for origin in [Origin::Seed, Origin::Owned] {
            let mut ids = self.live_ids(origin);
            // Stable sort keeps creation order between equal names.
            ids.sort_by(|a, b| self.nodes[a.index()].name.cmp(&self.nodes[b.index()].name));
            order.extend(ids);
        }
        order
    }

    fn run_hook(&mut self, id: NodeId, phase: LifecyclePhase) -> Result<(), GraphError> {
        // Take the component out so its hook can see every other node through `Peers`.
        let Some(mut handle) = self.slots[id.index()].take() else {
            return Ok(());
        };
        let name = &self.nodes[id.index()].name;
        tracing::info!(component = %name, phase = %phase, "Running lifecycle hook");

        let result = {
            let peers = Peers::new(&self.nodes, &self.slots);
            let component = handle.get_mut();
            match phase {
                LifecyclePhase::Initialize => component.initialize(&peers),
                LifecyclePhase::Start => component.start(&peers),
                LifecyclePhase::Deinitialize => component.deinitialize(&peers),
            }
        };
        self.slots[id.index()] = Some(handle);

        result.map_err(|e| {
            let name = self.nodes[id.index()].name.clone();
            tracing::warn!(component = %name, phase = %phase, error = %e, "Lifecycle hook failed");
            match phase {
                LifecyclePhase::Deinitialize => GraphError::DeinitializeFailed {
                    name,
                    source: e.into(),
                },
                _ => GraphError::InitializeFailed {
                    name,
                    phase,
                    source: e.into(),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::capability::Capability;
    use crate::component::Component;
    use crate::error::ErrorKind;
    use crate::link::{Flags, Link, Single};
    use crate::registry::{Builder, Registry};
    use crate::resolver::Resolver;

    static PROBE: Capability = Capability::root("probe");

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Probe {
        name: &'static str,
        journal: Journal,
        fail_on: Option<LifecyclePhase>,
        upstream: Option<Single>,
        seen_upstream: Option<String>,
    }

    impl Probe {
        fn new(name: &'static str, journal: &Journal) -> Self {
            Self {
                name,
                journal: Arc::clone(journal),
                fail_on: None,
                upstream: None,
                seen_upstream: None,
            }
        }

        fn record(&self, phase: &str) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push(format!("{phase}:{}", self.name));
            Ok(())
        }

        fn check(&self, phase: LifecyclePhase) -> anyhow::Result<()> {
            if self.fail_on == Some(phase) {
                anyhow::bail!("{} refused to {phase}", self.name);
            }
            Ok(())
        }
    }

    impl Component for Probe {
        fn capability(&self) -> &'static Capability {
            &PROBE
        }

        fn links(&self) -> Vec<&dyn Link> {
            self.upstream.iter().map(|l| l as &dyn Link).collect()
        }

        fn links_mut(&mut self) -> Vec<&mut dyn Link> {
            self.upstream.iter_mut().map(|l| l as &mut dyn Link).collect()
        }

        fn initialize(&mut self, peers: &Peers<'_>) -> anyhow::Result<()> {
            self.record("init")?;
            if let Some(link) = &self.upstream {
                self.seen_upstream = peers.single::<Probe>(link).map(|p| p.name.to_string());
            }
            self.check(LifecyclePhase::Initialize)
        }

        fn start(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
            self.record("start")?;
            self.check(LifecyclePhase::Start)
        }

        fn deinitialize(&mut self, _peers: &Peers<'_>) -> anyhow::Result<()> {
            self.record("deinit")?;
            self.check(LifecyclePhase::Deinitialize)
        }
    }

    #[test]
    fn seeds_run_before_owned_and_teardown_reverses() {
        let journal = Journal::default();
        let for_builder = Arc::clone(&journal);
        let mut registry = Registry::new();
        registry
            .register(Builder::new("owned", &PROBE, move || {
                let probe: Box<dyn Component> = Box::new(Probe::new("owned", &for_builder));
                Ok(Some(probe))
            }))
            .unwrap();

        let mut b = Probe::new("b", &journal);
        let mut a = Probe::new("a", &journal);
        let mut graph = Resolver::new(&registry)
            .seed("b", &mut b)
            .seed("a", &mut a)
            .request("owned")
            .resolve();

        graph.initialize(|e| panic!("unexpected {e}"));
        graph.deinitialize(|e| panic!("unexpected {e}"));

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "init:a", "init:b", "init:owned", "start:a", "start:b", "start:owned",
                "deinit:owned", "deinit:b", "deinit:a",
            ]
        );
    }

    #[test]
    fn failing_initialize_still_starts_everyone() {
        let journal = Journal::default();
        let registry = Registry::new();
        let mut y = Probe::new("y", &journal);
        let mut z = Probe::new("z", &journal);
        z.fail_on = Some(LifecyclePhase::Initialize);

        let mut graph = Resolver::new(&registry)
            .seed("y", &mut y)
            .seed("z", &mut z)
            .resolve();

        let mut errors = Vec::new();
        graph.initialize(|e| errors.push(e));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::InitializeFailed);
        assert_eq!(errors[0].name(), "z");
        assert!(errors[0].to_string().contains("refused to initialize"));
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["init:y", "init:z", "start:y", "start:z"]
        );
    }

    #[test]
    fn failing_deinitialize_is_reported_and_isolated() {
        let journal = Journal::default();
        let registry = Registry::new();
        let mut a = Probe::new("a", &journal);
        let mut b = Probe::new("b", &journal);
        b.fail_on = Some(LifecyclePhase::Deinitialize);

        let mut graph = Resolver::new(&registry)
            .seed("a", &mut a)
            .seed("b", &mut b)
            .resolve();

        let mut errors = Vec::new();
        graph.deinitialize(|e| errors.push(e));

        assert!(matches!(
            &errors[..],
            [GraphError::DeinitializeFailed { name, .. }] if name == "b"
        ));
        assert_eq!(*journal.lock().unwrap(), vec!["deinit:b", "deinit:a"]);
    }

    #[test]
    fn hooks_reach_bound_peers() {
        let journal = Journal::default();
        let registry = Registry::new();
        let mut source = Probe::new("source", &journal);
        let mut sink = Probe::new("sink", &journal);
        sink.upstream = Some(Single::new(&PROBE, Flags::REQUIRED, "source").unwrap());

        let mut graph = Resolver::new(&registry)
            .seed("source", &mut source)
            .seed("sink", &mut sink)
            .resolve();
        graph.initialize(|e| panic!("unexpected {e}"));
        drop(graph);

        assert_eq!(sink.seen_upstream.as_deref(), Some("source"));
    }

    #[test]
    fn start_failure_names_the_phase() {
        let journal = Journal::default();
        let registry = Registry::new();
        let mut a = Probe::new("a", &journal);
        a.fail_on = Some(LifecyclePhase::Start);

        let mut graph = Resolver::new(&registry).seed("a", &mut a).resolve();
        let mut errors = Vec::new();
        graph.initialize(|e| errors.push(e));

        assert!(matches!(
            &errors[..],
            [GraphError::InitializeFailed { phase: LifecyclePhase::Start, .. }]
        ));
    }
}
