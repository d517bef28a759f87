//! Definition instantiation graph and reachability from the tops.
//!
//! Nodes are definitions; an edge `a -> b` means some elaborated body of `a`
//! (including its generate blocks) instantiates `b`. Definitions not reachable
//! from any top are the ones elaboration never built.

use petgraph::graphmap::DiGraphMap;
use std::collections::{HashSet, VecDeque};

use crate::design::{DeclId, Design, Member, ScopeId, ScopeKind};

/// Builds the instantiation graph over every definition of the design.
pub fn build_hierarchy(design: &Design) -> DiGraphMap<DeclId, ()> {
    let mut g = DiGraphMap::new();
    for def in &design.definitions {
        g.add_node(*def);
    }

    for scope in &design.scopes {
        let Some(parent) = scope.definition() else {
            continue;
        };
        let mut pending: Vec<&Member> = scope.members.iter().collect();
        while let Some(member) = pending.pop() {
            match member {
                Member::Instance(inst) => {
                    if let Some(child) = design.scope(inst.body).definition() {
                        g.add_edge(parent, child, ());
                    }
                }
                Member::Generate { branches, .. } => {
                    pending.extend(branches.iter().flat_map(|b| nested_members(design, *b)));
                }
                Member::Scope(s) if design.scope(*s).kind == ScopeKind::Generate => {
                    pending.extend(nested_members(design, *s));
                }
                _ => {}
            }
        }
    }
    g
}

fn nested_members(design: &Design, scope: ScopeId) -> impl Iterator<Item = &Member> {
    design.scope(scope).members.iter()
}

/// Multi-source BFS from `roots`. Unknown roots are logged and skipped.
pub fn reachable_definitions(
    g: &DiGraphMap<DeclId, ()>,
    roots: impl IntoIterator<Item = DeclId>,
) -> HashSet<DeclId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if g.contains_node(root) {
            if visited.insert(root) {
                queue.push_back(root);
            }
        } else {
            tracing::warn!(root = %root, "top definition not found in hierarchy");
        }
    }

    while let Some(node) = queue.pop_front() {
        for n in g.neighbors(node) {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }
    visited
}

/// Generates a Graphviz DOT representation of the hierarchy.
///
/// - definitions reachable from a top are lightgreen
/// - the rest are lightcoral
#[cfg(feature = "dot")]
pub fn to_dot(design: &Design, g: &DiGraphMap<DeclId, ()>, reachable: &HashSet<DeclId>) -> String {
    use std::fmt::Write;

    let mut dot = String::with_capacity(g.node_count() * 80 + g.edge_count() * 40 + 150);
    let result: std::fmt::Result = (|| {
        writeln!(dot, "digraph undriven {{")?;
        writeln!(dot, "  rankdir=TB;")?;
        writeln!(dot, "  node [shape=box, style=filled, fontname=\"JetBrains Mono\"];")?;
        writeln!(dot)?;

        let mut nodes: Vec<DeclId> = g.nodes().collect();
        nodes.sort();
        for id in &nodes {
            let color = if reachable.contains(id) {
                "lightgreen"
            } else {
                "lightcoral"
            };
            writeln!(
                dot,
                "  \"{}\" [label=\"{}\", fillcolor={}];",
                id,
                design.decl(*id).name,
                color
            )?;
        }
        writeln!(dot)?;

        let mut edges: Vec<(DeclId, DeclId)> = g.all_edges().map(|(a, b, _)| (a, b)).collect();
        edges.sort();
        for (from, to) in edges {
            writeln!(dot, "  \"{}\" -> \"{}\";", from, to)?;
        }
        writeln!(dot, "}}")
    })();

    if let Err(e) = result {
        tracing::error!(error = %e, "failed to generate DOT string");
        return "digraph undriven {\n}\n".to_string();
    }
    dot
}
