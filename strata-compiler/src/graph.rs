//! Relationship graph between resources.
//!
//! Nodes are resource names and edges are looked up by name, so mutual
//! references need no shared ownership. Cycles are expected and reported
//! as informational findings; only a cycle made entirely of cascading
//! deletes is an error, since no delete order can satisfy it.

use indexmap::IndexMap;
use strata_ir::{CascadePolicy, RelationKind};
use strata_syntax::Span;

use crate::{
    pipeline::{Diagnostic, FileId, codes},
    symbols::SymbolTable,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub field: String,
    pub kind: RelationKind,
    pub on_delete: CascadePolicy,
    pub file: FileId,
    pub span: Span,
}

impl Edge {
    /// A belongs-to edge that deletes the owner along with its target.
    pub fn cascades(&self) -> bool {
        self.kind == RelationKind::BelongsTo && self.on_delete == CascadePolicy::Cascade
    }
}

/// A cycle of belongs-to edges, starting and ending at the same resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub edges: Vec<Edge>,
}

impl Cycle {
    /// Resource names along the cycle, the first repeated at the end.
    pub fn path(&self) -> Vec<&str> {
        let mut path: Vec<&str> = self.edges.iter().map(|e| e.from.as_str()).collect();
        if let Some(first) = self.edges.first() {
            path.push(first.from.as_str());
        }
        path
    }

    pub fn is_cascading(&self) -> bool {
        self.edges.iter().all(|e| e.on_delete == CascadePolicy::Cascade)
    }
}

#[derive(Debug, Default)]
pub struct RelationshipGraph {
    nodes: IndexMap<String, Vec<Edge>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnStack,
    Done,
}

/// Tarjan's strongly connected components over cascade edges.
struct Tarjan<'g> {
    graph: &'g RelationshipGraph,
    /// Discovery index and lowest reachable index per node.
    visited: IndexMap<&'g str, (usize, usize)>,
    stack: Vec<&'g str>,
    groups: Vec<Vec<&'g str>>,
}

impl<'g> Tarjan<'g> {
    fn visit(&mut self, node: &'g str) {
        let index = self.visited.len();
        self.visited.insert(node, (index, index));
        self.stack.push(node);

        let graph = self.graph;
        for edge in graph.edges(node).iter().filter(|e| e.cascades()) {
            let to = edge.to.as_str();
            match self.visited.get(to).copied() {
                None => {
                    self.visit(to);
                    if let Some((_, low)) = self.visited.get(to).copied() {
                        self.lower(node, low);
                    }
                }
                Some((index, _)) if self.stack.contains(&to) => self.lower(node, index),
                Some(_) => {}
            }
        }

        if self.visited.get(node).is_some_and(|&(index, low)| index == low) {
            let mut group = Vec::new();
            while let Some(member) = self.stack.pop() {
                group.push(member);
                if member == node {
                    break;
                }
            }
            self.groups.push(group);
        }
    }

    fn lower(&mut self, node: &str, low: usize) {
        if let Some(entry) = self.visited.get_mut(node) {
            entry.1 = entry.1.min(low);
        }
    }
}

impl RelationshipGraph {
    pub fn build(symbols: &SymbolTable) -> Self {
        let mut nodes = IndexMap::new();
        for symbol in symbols.iter() {
            let edges = symbol
                .relations
                .iter()
                .filter(|r| symbols.contains(&r.ir.target))
                .map(|r| Edge {
                    from: symbol.name.clone(),
                    to: r.ir.target.clone(),
                    field: r.ir.field.clone(),
                    kind: r.ir.kind,
                    on_delete: r.ir.on_delete,
                    file: symbol.file,
                    span: r.span,
                })
                .collect();
            nodes.insert(symbol.name.clone(), edges);
        }
        Self { nodes }
    }

    pub fn edges(&self, from: &str) -> &[Edge] {
        self.nodes.get(from).map_or(&[], Vec::as_slice)
    }

    /// Resources whose belongs-to edges point at `name`.
    pub fn dependents<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.nodes
            .values()
            .flatten()
            .filter(move |e| e.kind == RelationKind::BelongsTo && e.to == name)
    }

    /// Every belongs-to cycle, found by depth-first search with an explicit
    /// recursion stack. Each cycle is reported once, starting from the
    /// earliest declared resource that reaches it.
    pub fn cycles(&self) -> Vec<Cycle> {
        self.find_cycles(|e| e.kind == RelationKind::BelongsTo)
    }

    /// Groups of resources that reach each other through cascading deletes,
    /// in declaration order. Every group is a strongly connected component
    /// of the cascade edges, so no member can be deleted before the others.
    pub fn cascade_groups(&self) -> Vec<Vec<&str>> {
        let mut tarjan = Tarjan {
            graph: self,
            visited: IndexMap::new(),
            stack: Vec::new(),
            groups: Vec::new(),
        };
        for node in self.nodes.keys() {
            if !tarjan.visited.contains_key(node.as_str()) {
                tarjan.visit(node);
            }
        }

        let mut groups: Vec<Vec<&str>> = tarjan
            .groups
            .into_iter()
            .filter(|group| match group.as_slice() {
                [single] => self.edges(single).iter().any(|e| e.cascades() && e.to == *single),
                _ => true,
            })
            .map(|mut group| {
                group.sort_by_key(|name| self.nodes.get_index_of(*name));
                group
            })
            .collect();
        groups.sort_by_key(|group| group.first().and_then(|name| self.nodes.get_index_of(*name)));
        groups
    }

    fn find_cycles(&self, follow: impl Fn(&Edge) -> bool) -> Vec<Cycle> {
        let mut state: IndexMap<&str, Visit> =
            self.nodes.keys().map(|k| (k.as_str(), Visit::New)).collect();
        let mut cycles = Vec::new();

        for start in self.nodes.keys() {
            if state.get(start.as_str()) != Some(&Visit::New) {
                continue;
            }
            // (node, index of next edge to follow)
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            let mut path: Vec<&Edge> = Vec::new();
            state.insert(start.as_str(), Visit::OnStack);

            while let Some(top) = stack.len().checked_sub(1) {
                let (node, next) = stack[top];
                let edge = self.edges(node).iter().filter(|&e| follow(e)).nth(next);
                let Some(edge) = edge else {
                    state.insert(node, Visit::Done);
                    stack.pop();
                    path.pop();
                    continue;
                };
                stack[top].1 += 1;

                match state.get(edge.to.as_str()).copied() {
                    Some(Visit::New) => {
                        state.insert(edge.to.as_str(), Visit::OnStack);
                        stack.push((edge.to.as_str(), 0));
                        path.push(edge);
                    }
                    Some(Visit::OnStack) => {
                        let begin = path
                            .iter()
                            .position(|e| e.from == edge.to)
                            .unwrap_or(path.len());
                        let mut edges: Vec<Edge> =
                            path[begin..].iter().map(|e| (*e).clone()).collect();
                        edges.push(edge.clone());
                        cycles.push(Cycle { edges });
                    }
                    _ => {}
                }
            }
        }
        cycles
    }

    /// Report cycles and invalid relationship shapes.
    pub fn validate(&self, symbols: &SymbolTable) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        // All-cascade cycles are reported per group below.
        for cycle in self.cycles().iter().filter(|c| !c.is_cascading()) {
            let Some(first) = cycle.edges.first() else {
                continue;
            };
            diagnostics.push(
                Diagnostic::new(
                    codes::CYCLE,
                    format!("relationship cycle: {}", cycle.path().join(" -> ")),
                )
                .at(first.file, first.span),
            );
        }

        let cascade_cycles = self.find_cycles(Edge::cascades);
        for group in self.cascade_groups() {
            let Some(cycle) = cascade_cycles
                .iter()
                .find(|c| c.edges.first().is_some_and(|e| group.contains(&e.from.as_str())))
            else {
                continue;
            };
            let Some(first) = cycle.edges.first() else {
                continue;
            };
            let mut diagnostic = Diagnostic::new(
                codes::CASCADE_CYCLE,
                format!(
                    "cascading deletes form a cycle with no valid delete order: {}",
                    cycle.path().join(" -> ")
                ),
            )
            .at(first.file, first.span);
            for member in group {
                diagnostic = diagnostic.for_resource(member.to_string());
            }
            diagnostics.push(diagnostic);
        }

        for edge in self.nodes.values().flatten() {
            if edge.kind != RelationKind::HasMany {
                continue;
            }
            let Some(owner) = symbols.get(&edge.from) else {
                continue;
            };
            let Some(relation) = owner.relations.iter().find(|r| r.ir.field == edge.field) else {
                continue;
            };
            let foreign_key = &relation.ir.foreign_key;
            let has_back_reference = self
                .edges(&edge.to)
                .iter()
                .filter(|e| e.kind == RelationKind::BelongsTo && e.to == edge.from)
                .filter_map(|e| symbols.get(&e.from)?.relations.iter().find(|r| r.ir.field == e.field))
                .any(|r| &r.ir.foreign_key == foreign_key);
            if !has_back_reference {
                diagnostics.push(
                    Diagnostic::new(
                        codes::DANGLING_FOREIGN_KEY,
                        format!(
                            "`{}.{}` expects `{}` to belong to `{}` through `{foreign_key}`, but no such relationship is declared",
                            edge.from, edge.field, edge.to, edge.from
                        ),
                    )
                    .at(edge.file, edge.span),
                );
            }
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use strata_syntax::parse_source;

    use super::*;
    use crate::pipeline::Severity;

    fn graph(src: &str) -> (SymbolTable, RelationshipGraph) {
        let (program, errors) = parse_source(src);
        assert!(errors.is_empty(), "{errors:?}");
        let (symbols, diagnostics) = SymbolTable::build(&[program]);
        let symbols = symbols.unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let graph = RelationshipGraph::build(&symbols);
        (symbols, graph)
    }

    #[test]
    fn test_mutual_reference_is_informational() {
        let (symbols, graph) = graph(
            "resource User { id: uuid! profile: Profile! }
             resource Profile { owner: User! }",
        );
        let diagnostics = graph.validate(&symbols);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity(), Severity::Info);
        assert_eq!(diagnostics[0].message, "relationship cycle: User -> Profile -> User");
    }

    #[test]
    fn test_self_reference_cycle() {
        let (_, graph) = graph("resource Category { id: uuid! parent: Category? }");
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path(), ["Category", "Category"]);
    }

    #[test]
    fn test_cascade_cycle_is_error_for_every_member() {
        let (symbols, graph) = graph(
            "resource A { id: uuid! b: B! @on_delete(cascade) }
             resource B { id: uuid! c: C! @on_delete(cascade) }
             resource C { id: uuid! a: A! @on_delete(cascade) }",
        );
        let diagnostics = graph.validate(&symbols);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::CASCADE_CYCLE);
        assert_eq!(diagnostics[0].resources, ["A", "B", "C"]);
        assert!(diagnostics[0].message.ends_with("A -> B -> C -> A"));
    }

    #[test]
    fn test_cascade_cycle_behind_mixed_cycle() {
        let (symbols, graph) = graph(
            "resource A { id: uuid! b: B! c: C! @on_delete(cascade) }
             resource C { id: uuid! b: B! @on_delete(cascade) }
             resource B { id: uuid! a: A! @on_delete(cascade) }",
        );
        let diagnostics = graph.validate(&symbols);
        let found: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(found, [codes::CYCLE, codes::CASCADE_CYCLE]);
        assert_eq!(diagnostics[0].message, "relationship cycle: A -> B -> A");
        assert_eq!(diagnostics[1].resources, ["A", "C", "B"]);
        assert!(diagnostics[1].message.ends_with("A -> C -> B -> A"));
    }

    #[test]
    fn test_cascade_group_includes_every_reachable_member() {
        let (_, graph) = graph(
            "resource A { id: uuid! b: B! @on_delete(cascade) c: C! @on_delete(cascade) }
             resource B { id: uuid! a: A! @on_delete(cascade) }
             resource C { id: uuid! b: B! @on_delete(cascade) }
             resource D { id: uuid! a: A! @on_delete(cascade) }",
        );
        assert_eq!(graph.cascade_groups(), [vec!["A", "B", "C"]]);
    }

    #[test]
    fn test_mixed_policy_cycle_is_not_fatal() {
        let (symbols, graph) = graph(
            "resource A { id: uuid! b: B! @on_delete(cascade) }
             resource B { id: uuid! a: A? @on_delete(set_null) }",
        );
        let diagnostics = graph.validate(&symbols);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::CYCLE);
    }

    #[test]
    fn test_acyclic_graph() {
        let (symbols, graph) = graph(
            "resource User { id: uuid! posts: array<Post>! }
             resource Post { id: uuid! user: User! }",
        );
        assert!(graph.cycles().is_empty());
        assert!(graph.validate(&symbols).is_empty());
        assert_eq!(graph.dependents("User").count(), 1);
    }

    #[test]
    fn test_dangling_foreign_key() {
        let (symbols, graph) = graph(
            "resource User { id: uuid! posts: array<Post>! }
             resource Post { id: uuid! author: User! }",
        );
        let diagnostics = graph.validate(&symbols);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::DANGLING_FOREIGN_KEY);
        assert!(diagnostics[0].message.contains("user_id"));
    }
}
