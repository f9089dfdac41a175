use std::fmt::Write as _;

use serde::Serialize;
use tangle_core::{Edge, ErrorKind, Graph, GraphError, Origin};

/// Outcome of one `tangle run`, printable as text or JSON.
#[derive(Debug, Serialize)]
pub struct Report {
    pub components: Vec<ComponentEntry>,
    pub edges: Vec<Edge>,
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Serialize)]
pub struct ComponentEntry {
    pub name: String,
    pub origin: Origin,
    pub capability: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub kind: ErrorKind,
    pub name: String,
    pub message: String,
}

impl From<&GraphError> for ErrorEntry {
    fn from(error: &GraphError) -> Self {
        Self {
            kind: error.kind(),
            name: error.name().to_string(),
            message: error.to_string(),
        }
    }
}

impl Report {
    pub fn new(graph: &Graph<'_>, errors: &[GraphError]) -> Self {
        let components = graph
            .names()
            .into_iter()
            .filter_map(|name| {
                let id = graph.id_of(name)?;
                Some(ComponentEntry {
                    name: name.to_string(),
                    origin: graph.origin(id)?,
                    capability: graph.capabilities(id)?.primary(),
                })
            })
            .collect();

        Self {
            components,
            edges: graph.edges(),
            errors: errors.iter().map(ErrorEntry::from).collect(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "components ({}):", self.components.len());
        for component in &self.components {
            let origin = match component.origin {
                Origin::Seed => " [seed]",
                Origin::Owned => "",
            };
            let _ = writeln!(out, "  {} ({}){}", component.name, component.capability, origin);
        }
        if !self.edges.is_empty() {
            let _ = writeln!(out, "links:");
            for edge in &self.edges {
                let _ = writeln!(out, "  {} -> {} [{}]", edge.from, edge.to, edge.requires);
            }
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "errors ({}):", self.errors.len());
            for error in &self.errors {
                let _ = writeln!(out, "  {}", error.message);
            }
        }
        out
    }
}
