use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::executor::scope::{first_overlap, parse_patterns};
use crate::executor::types::{Unit, UnitSpec, UnitState};

/// Unit dependency graph (DAG)
///
/// Units live in an index-addressed arena; edges are adjacency lists of
/// arena indices in both directions. The graph is never mutated after
/// [`Graph::build`]; run state is tracked by the engine on its own copies.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Units in declaration order
    units: Vec<Unit>,

    /// unit id -> arena index
    index: HashMap<String, usize>,

    /// Dependency edges: unit -> units it depends on
    dependencies: Vec<Vec<usize>>,

    /// Reverse edges: unit -> units that depend on it
    dependents: Vec<Vec<usize>>,
}

/// One group of units that may run concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLevel {
    pub index: usize,
    pub unit_ids: Vec<String>,
}

impl ExecutionLevel {
    pub fn contains(&self, unit_id: &str) -> bool {
        self.unit_ids.iter().any(|id| id == unit_id)
    }

    pub fn len(&self) -> usize {
        self.unit_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unit_ids.is_empty()
    }
}

/// Two units whose scopes overlap although neither depends on the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeOverlapWarning {
    pub first: String,
    pub second: String,
    pub first_pattern: String,
    pub second_pattern: String,
}

impl std::fmt::Display for ScopeOverlapWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "units '{}' and '{}' have overlapping scopes ('{}' / '{}') but no dependency between them",
            self.first, self.second, self.first_pattern, self.second_pattern
        )
    }
}

/// Output of [`validate_and_layer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPlan {
    pub levels: Vec<ExecutionLevel>,
    pub warnings: Vec<ScopeOverlapWarning>,
}

impl LevelPlan {
    /// Level index of `unit_id`, if planned.
    pub fn level_of(&self, unit_id: &str) -> Option<usize> {
        self.levels
            .iter()
            .find(|level| level.contains(unit_id))
            .map(|level| level.index)
    }

    pub fn unit_count(&self) -> usize {
        self.levels.iter().map(ExecutionLevel::len).sum()
    }

    pub fn as_id_lists(&self) -> Vec<Vec<String>> {
        self.levels.iter().map(|l| l.unit_ids.clone()).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl Graph {
    /// Construct the graph from unit specifications
    pub fn build(specs: Vec<UnitSpec>) -> Result<Self, GraphError> {
        let mut units = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());

        // Add all nodes
        for spec in specs {
            let id = spec.id.trim().to_string();
            if id.is_empty() {
                return Err(GraphError::EmptyUnitId);
            }
            if index.contains_key(&id) {
                return Err(GraphError::DuplicateUnitId(id));
            }

            let scope = parse_patterns(&spec.scope).map_err(|(pattern, reason)| {
                GraphError::InvalidScope {
                    unit_id: id.clone(),
                    pattern,
                    reason,
                }
            })?;

            let mut seen = HashSet::new();
            let dependencies: Vec<String> = spec
                .dependencies
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| seen.insert(d.clone()))
                .collect();

            index.insert(id.clone(), units.len());
            units.push(Unit {
                id,
                description: spec.description,
                dependencies,
                scope,
                checkpoint: spec.checkpoint,
                command: spec.command,
                max_attempts: spec.max_attempts,
                // 0 is treated as unset
                timeout: spec
                    .timeout_secs
                    .filter(|&secs| secs > 0)
                    .map(std::time::Duration::from_secs),
                state: UnitState::Pending,
                attempt_count: 0,
            });
        }

        // Materialize edges once every id is known
        let mut dependencies = vec![Vec::new(); units.len()];
        let mut dependents = vec![Vec::new(); units.len()];
        for (idx, unit) in units.iter().enumerate() {
            for dep in &unit.dependencies {
                let Some(&dep_idx) = index.get(dep) else {
                    return Err(GraphError::UnknownDependency {
                        unit_id: unit.id.clone(),
                        missing: dep.clone(),
                    });
                };
                dependencies[idx].push(dep_idx);
                dependents[dep_idx].push(idx);
            }
        }

        Ok(Self {
            units,
            index,
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units in declaration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.index.get(id).map(|&idx| &self.units[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Direct dependencies of `id`.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.dependencies)
    }

    /// Direct dependents of `id` (units that declared `id` as a dependency).
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.dependents)
    }

    /// Every unit reachable from `id` over dependent edges, in BFS order.
    pub fn transitive_dependents(&self, id: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut visited = vec![false; self.units.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for &next in &self.dependents[current] {
                if !visited[next] {
                    visited[next] = true;
                    order.push(self.units[next].id.as_str());
                    queue.push_back(next);
                }
            }
        }

        order
    }

    fn neighbours<'a>(&'a self, id: &str, edges: &[Vec<usize>]) -> Vec<&'a str> {
        self.index
            .get(id)
            .map(|&idx| {
                edges[idx]
                    .iter()
                    .map(|&n| self.units[n].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Detect circular dependencies with a white/gray/black DFS over
    /// dependency edges.
    ///
    /// Returns the cycle with its first unit repeated at the end.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut color = vec![Color::White; self.units.len()];
        let mut path: Vec<usize> = Vec::new();

        for root in 0..self.units.len() {
            if color[root] != Color::White {
                continue;
            }

            // Explicit stack of (node, next edge to follow)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            color[root] = Color::Gray;
            path.push(root);

            while let Some(frame) = stack.last_mut() {
                let (node, edge) = *frame;
                if let Some(&dep) = self.dependencies[node].get(edge) {
                    frame.1 += 1;
                    match color[dep] {
                        Color::White => {
                            color[dep] = Color::Gray;
                            path.push(dep);
                            stack.push((dep, 0));
                        }
                        Color::Gray => {
                            let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                            let mut cycle: Vec<String> = path[start..]
                                .iter()
                                .map(|&n| self.units[n].id.clone())
                                .collect();
                            cycle.push(self.units[dep].id.clone());
                            return Some(cycle);
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    path.pop();
                    stack.pop();
                }
            }
        }

        None
    }

    /// Kahn waves: each wave holds every unit whose dependencies all sit in
    /// earlier waves. Declaration order is kept inside a wave.
    fn layer_indices(&self) -> Vec<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut current: Vec<usize> = (0..self.units.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();
        let mut waves = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &idx in &current {
                for &dependent in &self.dependents[idx] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();
            waves.push(std::mem::replace(&mut current, next));
        }

        waves
    }

    /// For each unit, the set of all units it transitively depends on.
    fn ancestor_sets(&self, waves: &[Vec<usize>]) -> Vec<HashSet<usize>> {
        let mut ancestors: Vec<HashSet<usize>> = vec![HashSet::new(); self.units.len()];
        for wave in waves {
            for &idx in wave {
                let mut acc = HashSet::new();
                for &dep in &self.dependencies[idx] {
                    acc.insert(dep);
                    acc.extend(ancestors[dep].iter().copied());
                }
                ancestors[idx] = acc;
            }
        }
        ancestors
    }

    fn overlap_warnings(&self, waves: &[Vec<usize>]) -> Vec<ScopeOverlapWarning> {
        let ancestors = self.ancestor_sets(waves);
        let mut warnings = Vec::new();

        for a in 0..self.units.len() {
            for b in (a + 1)..self.units.len() {
                if ancestors[a].contains(&b) || ancestors[b].contains(&a) {
                    continue;
                }
                let (ua, ub) = (&self.units[a], &self.units[b]);
                if let Some((pa, pb)) = first_overlap(&ua.scope, &ub.scope) {
                    warnings.push(ScopeOverlapWarning {
                        first: ua.id.clone(),
                        second: ub.id.clone(),
                        first_pattern: pa.to_string(),
                        second_pattern: pb.to_string(),
                    });
                }
            }
        }

        warnings
    }
}

/// Validate the graph and compute its execution levels.
///
/// Fails with [`GraphError::CyclicDependency`] carrying the full cycle.
/// Otherwise returns the minimum-level layering plus a warning for every
/// pair of dependency-unrelated units whose scopes overlap.
///
/// # Time Complexity
///
/// O(V + E) for cycle detection and layering; the overlap scan is
/// O(V² · P²) for P patterns per unit.
pub fn validate_and_layer(graph: &Graph) -> Result<LevelPlan, GraphError> {
    if let Some(path) = graph.find_cycle() {
        return Err(GraphError::CyclicDependency { path });
    }

    let waves = graph.layer_indices();
    let warnings = graph.overlap_warnings(&waves);
    for warning in &warnings {
        tracing::warn!(
            first = %warning.first,
            second = %warning.second,
            "{}",
            warning
        );
    }

    let levels = waves
        .iter()
        .enumerate()
        .map(|(index, wave)| ExecutionLevel {
            index,
            unit_ids: wave.iter().map(|&i| graph.units[i].id.clone()).collect(),
        })
        .collect();

    Ok(LevelPlan { levels, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(id: &str, deps: &[&str]) -> UnitSpec {
        UnitSpec::new(id).depends_on(deps.iter().copied())
    }

    #[test]
    fn zero_unit_timeout_is_no_timeout() {
        let graph = Graph::build(vec![
            UnitSpec::new("a").with_timeout_secs(0),
            UnitSpec::new("b").with_timeout_secs(7),
        ])
        .unwrap();
        assert_eq!(graph.unit("a").unwrap().timeout, None);
        assert_eq!(
            graph.unit("b").unwrap().timeout,
            Some(std::time::Duration::from_secs(7))
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Graph::build(vec![unit("a", &[]), unit("a", &[])]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateUnitId("a".into()));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = Graph::build(vec![unit("a", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                unit_id: "a".into(),
                missing: "ghost".into(),
            }
        );
    }

    #[test]
    fn rejects_empty_id_and_bad_scope() {
        assert_eq!(
            Graph::build(vec![unit("  ", &[])]).unwrap_err(),
            GraphError::EmptyUnitId
        );
        let err = Graph::build(vec![UnitSpec::new("a").with_scope(["src/[x"])]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidScope { ref unit_id, .. } if unit_id == "a"));
    }

    #[test]
    fn edges_are_materialized_both_ways() {
        let graph = Graph::build(vec![unit("a", &[]), unit("b", &["a"]), unit("c", &["a", "a"])])
            .unwrap();
        assert_eq!(graph.dependents_of("a"), vec!["b", "c"]);
        assert_eq!(graph.dependencies_of("c"), vec!["a"]);
        assert!(graph.dependencies_of("missing").is_empty());
        assert_eq!(graph.unit("b").unwrap().state, UnitState::Pending);
    }

    #[test]
    fn fan_out_layers_into_two_levels() {
        let graph = Graph::build(vec![unit("A", &[]), unit("B", &["A"]), unit("C", &["A"])])
            .unwrap();
        let plan = validate_and_layer(&graph).unwrap();
        assert_eq!(
            plan.as_id_lists(),
            vec![vec!["A".to_string()], vec!["B".to_string(), "C".to_string()]]
        );
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn cycle_path_is_reported_in_order() {
        let graph =
            Graph::build(vec![unit("A", &["B"]), unit("B", &["C"]), unit("C", &["A"])]).unwrap();
        let err = validate_and_layer(&graph).unwrap_err();
        assert_eq!(
            err,
            GraphError::CyclicDependency {
                path: vec!["A".into(), "B".into(), "C".into(), "A".into()],
            }
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = Graph::build(vec![unit("solo", &["solo"])]).unwrap();
        let err = validate_and_layer(&graph).unwrap_err();
        assert_eq!(
            err,
            GraphError::CyclicDependency {
                path: vec!["solo".into(), "solo".into()],
            }
        );
    }

    #[test]
    fn cycle_behind_acyclic_prefix_excludes_prefix() {
        let graph = Graph::build(vec![
            unit("entry", &["x"]),
            unit("x", &["y"]),
            unit("y", &["x"]),
        ])
        .unwrap();
        let err = validate_and_layer(&graph).unwrap_err();
        assert_eq!(
            err,
            GraphError::CyclicDependency {
                path: vec!["x".into(), "y".into(), "x".into()],
            }
        );
    }

    #[test]
    fn levels_follow_longest_dependency_chain() {
        // d depends on a directly and on c through b, so it lands on level 3.
        let graph = Graph::build(vec![
            unit("d", &["a", "c"]),
            unit("c", &["b"]),
            unit("b", &["a"]),
            unit("a", &[]),
            unit("e", &[]),
        ])
        .unwrap();
        let plan = validate_and_layer(&graph).unwrap();
        assert_eq!(
            plan.as_id_lists(),
            vec![
                vec!["a".to_string(), "e".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string()],
                vec!["d".to_string()],
            ]
        );
        assert_eq!(plan.level_of("d"), Some(3));
        assert_eq!(plan.unit_count(), 5);
    }

    #[test]
    fn overlapping_unrelated_scopes_warn() {
        let graph = Graph::build(vec![
            UnitSpec::new("A").with_scope(["src/a/*"]),
            UnitSpec::new("B").with_scope(["src/a/utils.py"]),
        ])
        .unwrap();
        let plan = validate_and_layer(&graph).unwrap();
        assert_eq!(plan.levels.len(), 1);
        assert_eq!(
            plan.warnings,
            vec![ScopeOverlapWarning {
                first: "A".into(),
                second: "B".into(),
                first_pattern: "src/a/*".into(),
                second_pattern: "src/a/utils.py".into(),
            }]
        );
    }

    #[test]
    fn related_units_may_share_scope() {
        let graph = Graph::build(vec![
            UnitSpec::new("gen").with_scope(["src/**"]),
            UnitSpec::new("mid").depends_on(["gen"]),
            UnitSpec::new("fmt")
                .depends_on(["mid"])
                .with_scope(["src/lib.rs"]),
        ])
        .unwrap();
        let plan = validate_and_layer(&graph).unwrap();
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn transitive_dependents_walks_every_branch() {
        let graph = Graph::build(vec![
            unit("root", &[]),
            unit("left", &["root"]),
            unit("right", &["root"]),
            unit("leaf", &["left", "right"]),
            unit("other", &[]),
        ])
        .unwrap();
        let mut reached = graph.transitive_dependents("root");
        reached.sort_unstable();
        assert_eq!(reached, vec!["leaf", "left", "right"]);
        assert!(graph.transitive_dependents("other").is_empty());
    }
}
