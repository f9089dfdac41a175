use std::collections::BTreeMap;

use regex::Regex;

use crate::capability::{Capability, CapabilitySet};
use crate::error::DefinitionError;

bitflags::bitflags! {
    /// How a link takes part in resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// Instantiate a matching builder when no peer exists yet.
        const CREATE_IF_NOT_EXIST = 1 << 0;
        /// The owner is pruned from the graph when this link stays unbound.
        const REQUIRED = 1 << 1;
        const CREATE_REQUIRED = Self::CREATE_IF_NOT_EXIST.bits() | Self::REQUIRED.bits();
    }
}

impl Flags {
    /// Bind if something fits, otherwise stay unbound.
    pub const OPTIONAL: Self = Self::empty();
}

/// Index of a component inside a [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anchored regular expression matched against component names.
///
/// The whole name has to match. An empty pattern matches every name.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Regex(Regex),
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, DefinitionError> {
        if pattern.is_empty() || pattern == ".*" {
            return Ok(Self::any());
        }
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            DefinitionError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            matcher: Matcher::Regex(regex),
        })
    }

    /// Pattern matching every name.
    pub fn any() -> Self {
        Self {
            source: ".*".into(),
            matcher: Matcher::Any,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Regex(regex) => regex.is_match(name),
        }
    }
}

/// Declaration shared by every link: required capability, flags and name pattern.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    requires: &'static Capability,
    flags: Flags,
    pattern: NamePattern,
}

impl LinkSpec {
    pub fn new(
        requires: &'static Capability,
        flags: Flags,
        pattern: &str,
    ) -> Result<Self, DefinitionError> {
        if pattern.is_empty() && flags.contains(Flags::CREATE_IF_NOT_EXIST) {
            return Err(DefinitionError::InvalidLink {
                requires: requires.name(),
            });
        }
        Ok(Self {
            requires,
            flags,
            pattern: NamePattern::new(pattern)?,
        })
    }

    pub fn requires(&self) -> &'static Capability {
        self.requires
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn pattern(&self) -> &NamePattern {
        &self.pattern
    }
}

/// A candidate peer offered to a link during wiring.
#[derive(Debug, Clone, Copy)]
pub struct PeerRef<'a> {
    pub(crate) id: NodeId,
    pub(crate) name: &'a str,
    pub(crate) capabilities: &'a CapabilitySet,
}

impl<'a> PeerRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn capabilities(&self) -> &'a CapabilitySet {
        self.capabilities
    }
}

/// A typed dependency slot owned by a component.
///
/// The resolver only talks to links through this trait. [`Single`] and
/// [`Multi`] cover the usual cases.
pub trait Link {
    fn spec(&self) -> &LinkSpec;

    /// Whether the link is fulfilled and needs no further peers.
    fn satisfied(&self) -> bool;

    /// Record `peer` if its capabilities fit. Returns `true` when a new binding was made.
    fn bind(&mut self, peer: PeerRef<'_>) -> bool;

    /// Drop any binding to `id`. Returns `true` when something was removed.
    fn unbind(&mut self, id: NodeId) -> bool;

    /// Every peer currently bound. Multi links list peers in name order.
    fn bound(&self) -> Vec<NodeId>;

    fn flags(&self) -> Flags {
        self.spec().flags()
    }

    fn matches_name(&self, name: &str) -> bool {
        self.spec().pattern().matches(name)
    }

    fn can_accept(&self, capabilities: &CapabilitySet) -> bool {
        capabilities.contains(self.spec().requires())
    }

    fn is_required(&self) -> bool {
        self.flags().contains(Flags::REQUIRED)
    }

    fn creates(&self) -> bool {
        self.flags().contains(Flags::CREATE_IF_NOT_EXIST)
    }

    fn is_bound_to(&self, id: NodeId) -> bool {
        self.bound().contains(&id)
    }
}

#[derive(Debug, Clone)]
struct Bound {
    id: NodeId,
    name: String,
}

/// Link to at most one peer.
#[derive(Debug, Clone)]
pub struct Single {
    spec: LinkSpec,
    peer: Option<Bound>,
}

impl Single {
    pub fn new(
        requires: &'static Capability,
        flags: Flags,
        pattern: &str,
    ) -> Result<Self, DefinitionError> {
        Ok(Self {
            spec: LinkSpec::new(requires, flags, pattern)?,
            peer: None,
        })
    }

    /// Optional link accepting any name.
    pub fn any(requires: &'static Capability) -> Self {
        Self {
            spec: LinkSpec {
                requires,
                flags: Flags::OPTIONAL,
                pattern: NamePattern::any(),
            },
            peer: None,
        }
    }

    pub fn peer(&self) -> Option<NodeId> {
        self.peer.as_ref().map(|b| b.id)
    }

    pub fn peer_name(&self) -> Option<&str> {
        self.peer.as_ref().map(|b| b.name.as_str())
    }
}

impl Link for Single {
    fn spec(&self) -> &LinkSpec {
        &self.spec
    }

    fn satisfied(&self) -> bool {
        self.peer.is_some()
    }

    fn bind(&mut self, peer: PeerRef<'_>) -> bool {
        if self.peer.is_some() || !self.can_accept(peer.capabilities) {
            return false;
        }
        self.peer = Some(Bound {
            id: peer.id,
            name: peer.name.to_string(),
        });
        true
    }

    fn unbind(&mut self, id: NodeId) -> bool {
        if self.peer.as_ref().is_some_and(|b| b.id == id) {
            self.peer = None;
            return true;
        }
        false
    }

    fn bound(&self) -> Vec<NodeId> {
        self.peer().into_iter().collect()
    }
}

/// Link collecting every fitting peer, keyed by peer name.
///
/// A multi link never reports itself satisfied, so it keeps collecting peers
/// for the whole resolution without ever blocking it.
#[derive(Debug, Clone)]
pub struct Multi {
    spec: LinkSpec,
    peers: BTreeMap<String, Vec<NodeId>>,
}

impl Multi {
    /// `REQUIRED` is rejected: a multi link can never count as satisfied.
    pub fn new(
        requires: &'static Capability,
        flags: Flags,
        pattern: &str,
    ) -> Result<Self, DefinitionError> {
        if flags.contains(Flags::REQUIRED) {
            return Err(DefinitionError::RequiredMulti {
                requires: requires.name(),
            });
        }
        Ok(Self {
            spec: LinkSpec::new(requires, flags, pattern)?,
            peers: BTreeMap::new(),
        })
    }

    pub fn any(requires: &'static Capability) -> Self {
        Self {
            spec: LinkSpec {
                requires,
                flags: Flags::OPTIONAL,
                pattern: NamePattern::any(),
            },
            peers: BTreeMap::new(),
        }
    }

    pub fn peers(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.peers
            .iter()
            .flat_map(|(name, ids)| ids.iter().map(move |id| (name.as_str(), *id)))
    }

    pub fn len(&self) -> usize {
        self.peers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Link for Multi {
    fn spec(&self) -> &LinkSpec {
        &self.spec
    }

    fn satisfied(&self) -> bool {
        false
    }

    fn bind(&mut self, peer: PeerRef<'_>) -> bool {
        if !self.can_accept(peer.capabilities) || self.is_bound_to(peer.id) {
            return false;
        }
        self.peers
            .entry(peer.name.to_string())
            .or_default()
            .push(peer.id);
        true
    }

    fn unbind(&mut self, id: NodeId) -> bool {
        let mut removed = false;
        self.peers.retain(|_, ids| {
            let before = ids.len();
            ids.retain(|bound| *bound != id);
            removed |= ids.len() != before;
            !ids.is_empty()
        });
        removed
    }

    fn bound(&self) -> Vec<NodeId> {
        self.peers().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::COMPONENT;

    static CODEC: Capability = Capability::root("codec");
    static JSON_CODEC: Capability = Capability::extends("json_codec", &[&CODEC]);
    static CLOCK: Capability = Capability::root("clock");

    fn peer<'a>(id: usize, name: &'a str, caps: &'a CapabilitySet) -> PeerRef<'a> {
        PeerRef {
            id: NodeId(id),
            name,
            capabilities: caps,
        }
    }

    #[test]
    fn empty_pattern_matches_every_name() {
        let link = Single::new(&CODEC, Flags::OPTIONAL, "").unwrap();
        assert!(link.matches_name("json"));
        assert!(link.matches_name(""));
        assert_eq!(link.spec().pattern().as_str(), ".*");
    }

    #[test]
    fn anchored_pattern_matches_exact_name_only() {
        let link = Single::new(&CODEC, Flags::OPTIONAL, "^foo$").unwrap();
        assert!(link.matches_name("foo"));
        assert!(!link.matches_name("foobar"));
        assert!(!link.matches_name("xfoo"));
    }

    #[test]
    fn bare_pattern_must_match_whole_name() {
        let link = Single::new(&CODEC, Flags::OPTIONAL, "A").unwrap();
        assert!(link.matches_name("A"));
        assert!(!link.matches_name("AB"));
    }

    #[test]
    fn create_with_empty_pattern_is_rejected() {
        let err = Single::new(&CODEC, Flags::CREATE_IF_NOT_EXIST, "").unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidLink { requires: "codec" }));

        let err = Multi::new(&CODEC, Flags::CREATE_IF_NOT_EXIST, "").unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidLink { .. }));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = Single::new(&CODEC, Flags::OPTIONAL, "(unclosed").unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidPattern { .. }));
    }

    #[test]
    fn required_multi_is_rejected() {
        let err = Multi::new(&CODEC, Flags::REQUIRED, ".*").unwrap_err();
        assert!(matches!(err, DefinitionError::RequiredMulti { .. }));
    }

    #[test]
    fn single_accepts_more_specific_capability() {
        let json = CapabilitySet::of(&JSON_CODEC);
        let clock = CapabilitySet::of(&CLOCK);
        let mut link = Single::any(&CODEC);

        assert!(!link.bind(peer(0, "clock", &clock)));
        assert!(!link.satisfied());

        assert!(link.bind(peer(1, "json", &json)));
        assert!(link.satisfied());
        assert_eq!(link.peer(), Some(NodeId(1)));
        assert_eq!(link.peer_name(), Some("json"));
    }

    #[test]
    fn single_keeps_first_peer() {
        let json = CapabilitySet::of(&JSON_CODEC);
        let mut link = Single::any(&CODEC);

        assert!(link.bind(peer(1, "a", &json)));
        assert!(!link.bind(peer(2, "b", &json)));
        assert_eq!(link.peer(), Some(NodeId(1)));
    }

    #[test]
    fn single_unbind_clears_satisfaction() {
        let json = CapabilitySet::of(&JSON_CODEC);
        let mut link = Single::any(&CODEC);
        link.bind(peer(3, "json", &json));

        assert!(!link.unbind(NodeId(4)));
        assert!(link.satisfied());
        assert!(link.unbind(NodeId(3)));
        assert!(!link.satisfied());
        assert!(link.bound().is_empty());
    }

    #[test]
    fn multi_never_satisfied_and_skips_duplicates() {
        let json = CapabilitySet::of(&JSON_CODEC);
        let mut link = Multi::any(&COMPONENT);

        assert!(link.bind(peer(1, "b", &json)));
        assert!(link.bind(peer(2, "a", &json)));
        assert!(!link.bind(peer(1, "b", &json)));

        assert!(!link.satisfied());
        assert_eq!(link.len(), 2);
        let names: Vec<_> = link.peers().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn multi_unbind_removes_only_that_peer() {
        let json = CapabilitySet::of(&JSON_CODEC);
        let mut link = Multi::any(&CODEC);
        link.bind(peer(1, "a", &json));
        link.bind(peer(2, "b", &json));

        assert!(link.unbind(NodeId(1)));
        assert!(!link.is_bound_to(NodeId(1)));
        assert!(link.is_bound_to(NodeId(2)));
        assert!(!link.unbind(NodeId(1)));
    }

    #[test]
    fn create_required_sets_both_flags() {
        let link = Single::new(&CODEC, Flags::CREATE_REQUIRED, "json").unwrap();
        assert!(link.is_required());
        assert!(link.creates());

        let optional = Single::any(&CODEC);
        assert!(!optional.is_required());
        assert!(!optional.creates());
    }
}
