use std::collections::VecDeque;

use graphql_syntax::query::{Definition, Document, Selection, SelectionSet};
use indexmap::IndexMap;

/// A closed chain of spreads starting at one fragment, e.g. `[A, B, A]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentCycle {
    pub path: Vec<String>,
    /// Fragments sharing a component are mutually reachable.
    pub component: usize,
}

impl FragmentCycle {
    /// The fragment this cycle starts and ends at.
    pub fn fragment(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    pub fn message(&self) -> String {
        format!(
            "Found a circular reference from fragment `{}`: {}",
            self.fragment(),
            self.path.join(" -> ")
        )
    }
}

/// Spread edges between fragments of a whole batch.
#[derive(Debug, Default)]
pub struct FragmentGraph {
    edges: IndexMap<String, Vec<String>>,
}

impl FragmentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: &Document) {
        for definition in &document.definitions {
            if let Definition::Fragment(fragment) = definition {
                let mut targets = vec![];
                collect_spreads(&fragment.selection_set, &mut targets);
                self.edges
                    .entry(fragment.name.clone())
                    .or_default()
                    .extend(targets);
            }
        }
    }

    /// Returns one cycle for every fragment that can reach itself, in
    /// declaration order. Each path is the shortest one through that fragment.
    ///
    /// Components are found with an iterative Tarjan walk, so arbitrarily
    /// long chains never exhaust the stack.
    pub fn find_cycles(&self) -> Vec<FragmentCycle> {
        let adjacency: Vec<Vec<usize>> = self
            .edges
            .values()
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|target| self.edges.get_index_of(target.as_str()))
                    .collect()
            })
            .collect();

        let mut cycles = vec![];
        let mut in_component = vec![false; adjacency.len()];
        let circular = strongly_connected(&adjacency)
            .into_iter()
            .filter(|members| match members.as_slice() {
                [single] => adjacency[*single].contains(single),
                _ => true,
            });

        for (component, members) in circular.enumerate() {
            for &member in &members {
                in_component[member] = true;
            }
            for &member in &members {
                if let Some(path) = shortest_cycle(&adjacency, &in_component, member) {
                    cycles.push(FragmentCycle {
                        path: path
                            .into_iter()
                            .filter_map(|index| self.edges.get_index(index))
                            .map(|(name, _)| name.clone())
                            .collect(),
                        component,
                    });
                }
            }
            for &member in &members {
                in_component[member] = false;
            }
        }

        cycles.sort_by_key(|cycle| self.edges.get_index_of(cycle.fragment()));
        cycles
    }
}

const UNVISITED: usize = usize::MAX;

struct Tarjan<'a> {
    adjacency: &'a [Vec<usize>],
    index: Vec<usize>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    work: Vec<(usize, usize)>,
    next: usize,
}

impl Tarjan<'_> {
    fn enter(&mut self, node: usize) {
        self.index[node] = self.next;
        self.low[node] = self.next;
        self.next += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
        self.work.push((node, 0));
    }
}

/// Strongly connected components, each sorted by node index.
fn strongly_connected(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let count = adjacency.len();
    let mut state = Tarjan {
        adjacency,
        index: vec![UNVISITED; count],
        low: vec![0; count],
        on_stack: vec![false; count],
        stack: vec![],
        work: vec![],
        next: 0,
    };
    let mut components = vec![];

    for root in 0..count {
        if state.index[root] != UNVISITED {
            continue;
        }
        state.enter(root);

        while let Some(top) = state.work.len().checked_sub(1) {
            let (node, cursor) = state.work[top];
            if let Some(&child) = state.adjacency[node].get(cursor) {
                state.work[top].1 += 1;
                if state.index[child] == UNVISITED {
                    state.enter(child);
                } else if state.on_stack[child] {
                    state.low[node] = state.low[node].min(state.index[child]);
                }
                continue;
            }

            state.work.pop();
            if let Some(&(parent, _)) = state.work.last() {
                state.low[parent] = state.low[parent].min(state.low[node]);
            }
            if state.low[node] == state.index[node] {
                let mut component = vec![];
                while let Some(member) = state.stack.pop() {
                    state.on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components
}

/// Breadth-first search for the shortest closed path through `start`,
/// staying inside its component.
fn shortest_cycle(adjacency: &[Vec<usize>], in_component: &[bool], start: usize) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; adjacency.len()];
    let mut seen = vec![false; adjacency.len()];
    let mut queue = VecDeque::from([start]);
    seen[start] = true;

    while let Some(node) = queue.pop_front() {
        for &child in &adjacency[node] {
            if child == start {
                let mut tail = vec![];
                let mut current = node;
                while current != start {
                    tail.push(current);
                    match parent[current] {
                        Some(previous) => current = previous,
                        None => break,
                    }
                }
                let mut path = vec![start];
                path.extend(tail.into_iter().rev());
                path.push(start);
                return Some(path);
            }
            if in_component[child] && !seen[child] {
                seen[child] = true;
                parent[child] = Some(node);
                queue.push_back(child);
            }
        }
    }

    None
}

fn collect_spreads(selection_set: &SelectionSet, targets: &mut Vec<String>) {
    for item in &selection_set.items {
        match item {
            Selection::Field(field) => collect_spreads(&field.selection_set, targets),
            Selection::InlineFragment(fragment) => {
                collect_spreads(&fragment.selection_set, targets)
            }
            Selection::FragmentSpread(spread) => {
                if !targets.contains(&spread.fragment_name) {
                    targets.push(spread.fragment_name.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use graphql_syntax::parse_query;

    use super::FragmentGraph;

    fn graph(source: &str) -> FragmentGraph {
        let mut graph = FragmentGraph::new();
        graph.add_document(&parse_query(source).unwrap());
        graph
    }

    #[test]
    fn two_fragment_cycle() {
        let cycles = graph(
            "fragment A on User { ...B } fragment B on User { name ...A } fragment C on User { ...A }",
        )
        .find_cycles();
        let messages: Vec<String> = cycles.iter().map(|cycle| cycle.message()).collect();
        assert_eq!(
            messages,
            vec![
                "Found a circular reference from fragment `A`: A -> B -> A",
                "Found a circular reference from fragment `B`: B -> A -> B",
            ]
        );
        assert_eq!(cycles[0].component, cycles[1].component);
    }

    #[test]
    fn self_spread() {
        let cycles = graph("fragment A on User { friends { ...A } }").find_cycles();
        assert_eq!(cycles[0].path, vec!["A", "A"]);
    }

    #[test]
    fn long_chain_is_found_without_recursion() {
        let source = (0..50)
            .map(|i| format!("fragment F{} on User {{ ...F{} }}", i, (i + 1) % 50))
            .collect::<Vec<_>>()
            .join("\n");
        let cycles = graph(&source).find_cycles();
        assert_eq!(cycles.len(), 50);
        for (i, cycle) in cycles.iter().enumerate() {
            assert_eq!(cycle.fragment(), format!("F{}", i));
            assert_eq!(cycle.path.len(), 51);
            assert_eq!(cycle.path.first(), cycle.path.last());
            assert_eq!(cycle.component, 0);
        }
    }

    #[test]
    fn every_fragment_of_a_component_gets_its_own_cycle() {
        let cycles = graph(
            "fragment A on User { ...B ...C } fragment B on User { ...A } fragment C on User { ...B }",
        )
        .find_cycles();
        let paths: Vec<String> = cycles.iter().map(|cycle| cycle.path.join(" -> ")).collect();
        assert_eq!(paths, vec!["A -> B -> A", "B -> A -> B", "C -> B -> A -> C"]);
        assert!(cycles.iter().all(|cycle| cycle.component == cycles[0].component));
    }

    #[test]
    fn separate_components_are_numbered_apart() {
        let cycles = graph(
            "fragment A on User { ...A } fragment B on User { ...C } fragment C on User { ...B } fragment D on User { ...A }",
        )
        .find_cycles();
        let paths: Vec<String> = cycles.iter().map(|cycle| cycle.path.join(" -> ")).collect();
        assert_eq!(paths, vec!["A -> A", "B -> C -> B", "C -> B -> C"]);
        assert_ne!(cycles[0].component, cycles[1].component);
        assert_eq!(cycles[1].component, cycles[2].component);
    }

    #[test]
    fn acyclic_graph() {
        let cycles = graph("fragment A on User { ...B ...C } fragment B on User { ...C } fragment C on User { id }")
            .find_cycles();
        assert!(cycles.is_empty());
    }
}
