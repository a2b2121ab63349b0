//! Import graph - file to file edges with cycle and order queries
//!
//! Edge `A -> B` means "A imports B". Forward and reverse adjacency are
//! kept side by side and every mutation updates both. Nodes are keyed by
//! `path_key`; the first spelling seen is kept for messages.
//!
//! Ordered maps keep every traversal, and therefore every reported cycle
//! and compile order, deterministic.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::path::{normalize_path, path_key};

#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    forward: BTreeMap<String, BTreeSet<String>>,
    reverse: BTreeMap<String, BTreeSet<String>>,
    display: BTreeMap<String, String>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns its key
    pub fn add_file(&mut self, path: &str) -> String {
        let key = path_key(path);
        self.forward.entry(key.clone()).or_default();
        self.reverse.entry(key.clone()).or_default();
        self.display
            .entry(key.clone())
            .or_insert_with(|| normalize_path(path));
        key
    }

    pub fn add_edge(&mut self, importer: &str, imported: &str) {
        let from = self.add_file(importer);
        let to = self.add_file(imported);
        self.forward.entry(from.clone()).or_default().insert(to.clone());
        self.reverse.entry(to).or_default().insert(from);
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Spelling of a node as first added
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.display.get(key).map_or(key, String::as_str)
    }

    pub fn has_cycle(&self) -> bool {
        self.get_cycle().is_some()
    }

    /// One cycle as a closed path (`[a, b, a]`; a self import gives `[a, a]`)
    pub fn get_cycle(&self) -> Option<Vec<String>> {
        let mut done: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut on_stack: BTreeSet<&str> = BTreeSet::new();

        fn dfs<'a>(
            node: &'a str,
            forward: &'a BTreeMap<String, BTreeSet<String>>,
            done: &mut BTreeSet<&'a str>,
            stack: &mut Vec<&'a str>,
            on_stack: &mut BTreeSet<&'a str>,
        ) -> Option<Vec<&'a str>> {
            stack.push(node);
            on_stack.insert(node);

            if let Some(targets) = forward.get(node) {
                for target in targets {
                    let target = target.as_str();
                    if on_stack.contains(target) {
                        let start = stack.iter().position(|n| *n == target).unwrap_or(0);
                        let mut cycle: Vec<&str> = stack[start..].to_vec();
                        cycle.push(target);
                        return Some(cycle);
                    }
                    if !done.contains(target) {
                        if let Some(cycle) = dfs(target, forward, done, stack, on_stack) {
                            return Some(cycle);
                        }
                    }
                }
            }

            stack.pop();
            on_stack.remove(node);
            done.insert(node);
            None
        }

        for node in self.forward.keys() {
            if done.contains(node.as_str()) {
                continue;
            }
            if let Some(cycle) = dfs(node, &self.forward, &mut done, &mut stack, &mut on_stack) {
                return Some(
                    cycle
                        .into_iter()
                        .map(|k| self.display_name(k).to_string())
                        .collect(),
                );
            }
        }
        None
    }

    /// Every file after all the files it imports
    ///
    /// Reverse postorder of a DFS along the dependents direction. Fails with
    /// the offending cycle when the graph is cyclic.
    pub fn get_topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        if let Some(cycle) = self.get_cycle() {
            return Err(cycle);
        }

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut postorder: Vec<&str> = Vec::with_capacity(self.forward.len());

        fn dfs<'a>(
            node: &'a str,
            reverse: &'a BTreeMap<String, BTreeSet<String>>,
            visited: &mut BTreeSet<&'a str>,
            postorder: &mut Vec<&'a str>,
        ) {
            visited.insert(node);
            if let Some(dependents) = reverse.get(node) {
                for dependent in dependents {
                    if !visited.contains(dependent.as_str()) {
                        dfs(dependent, reverse, visited, postorder);
                    }
                }
            }
            postorder.push(node);
        }

        for node in self.reverse.keys() {
            if !visited.contains(node.as_str()) {
                dfs(node, &self.reverse, &mut visited, &mut postorder);
            }
        }

        Ok(postorder
            .into_iter()
            .rev()
            .map(|k| self.display_name(k).to_string())
            .collect())
    }

    /// Dependencies-first order that tolerates cycles by ignoring back edges
    pub fn dependency_postorder(&self) -> Vec<String> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut postorder: Vec<&str> = Vec::with_capacity(self.forward.len());

        fn dfs<'a>(
            node: &'a str,
            forward: &'a BTreeMap<String, BTreeSet<String>>,
            visited: &mut BTreeSet<&'a str>,
            postorder: &mut Vec<&'a str>,
        ) {
            visited.insert(node);
            if let Some(targets) = forward.get(node) {
                for target in targets {
                    if !visited.contains(target.as_str()) {
                        dfs(target, forward, visited, postorder);
                    }
                }
            }
            postorder.push(node);
        }

        for node in self.forward.keys() {
            if !visited.contains(node.as_str()) {
                dfs(node, &self.forward, &mut visited, &mut postorder);
            }
        }

        postorder
            .into_iter()
            .map(|k| self.display_name(k).to_string())
            .collect()
    }

    /// Files that import `path`, directly or transitively
    pub fn get_dependents_of(&self, path: &str) -> Vec<String> {
        self.closure(&self.reverse, path)
    }

    /// Files `path` imports, directly or transitively
    pub fn get_dependencies_of(&self, path: &str) -> Vec<String> {
        self.closure(&self.forward, path)
    }

    fn closure(&self, edges: &BTreeMap<String, BTreeSet<String>>, path: &str) -> Vec<String> {
        let start = path_key(path);
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut out = Vec::new();

        if let Some((key, _)) = edges.get_key_value(&start) {
            queue.push_back(key.as_str());
        }
        while let Some(current) = queue.pop_front() {
            if let Some(next) = edges.get(current) {
                for n in next {
                    if seen.insert(n.as_str()) {
                        out.push(self.display_name(n).to_string());
                        queue.push_back(n.as_str());
                    }
                }
            }
        }
        out
    }
}
