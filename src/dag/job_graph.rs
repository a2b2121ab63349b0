//! JobGraph - dependency structure of one workflow's jobs
//!
//! Nodes are top-level jobs, cycle body jobs and cycles themselves. A cycle
//! node depends on every job of its body, so a job that needs the cycle
//! transitively waits for the loop.
//!
//! Performance notes:
//! - Arc<str> for zero-cost cloning of job names
//! - FxHashMap for faster hashing
//! - SmallVec for stack-allocated small dependency lists (0-4 items)

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ast::{JobDecl, Workflow};

/// Stack-allocated deps: most jobs have 0-4 dependencies
pub type DepVec = SmallVec<[Arc<str>; 4]>;

pub struct JobGraph {
    /// job -> jobs it depends on (`needs` and `after`, de-duplicated)
    dependencies: FxHashMap<Arc<str>, DepVec>,
    /// Declaration order
    job_ids: Vec<Arc<str>>,
}

impl JobGraph {
    /// Build from a workflow; edges to unknown jobs are dropped
    pub fn from_workflow(workflow: &Workflow) -> Self {
        let mut declared: Vec<(Arc<str>, Vec<&str>)> = Vec::new();
        for job in &workflow.jobs {
            declared.push((Arc::from(job.name()), dependency_names(job)));
        }
        for cycle in &workflow.cycles {
            for job in &cycle.body {
                declared.push((Arc::from(job.name()), dependency_names(job)));
            }
            let body: Vec<&str> = cycle.body.iter().map(|j| j.name()).collect();
            declared.push((Arc::from(cycle.name.as_str()), body));
        }

        let capacity = declared.len();
        let mut dependencies: FxHashMap<Arc<str>, DepVec> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut job_ids: Vec<Arc<str>> = Vec::with_capacity(capacity);
        let mut known: FxHashSet<Arc<str>> =
            FxHashSet::with_capacity_and_hasher(capacity, Default::default());

        for (id, _) in &declared {
            if known.insert(Arc::clone(id)) {
                job_ids.push(Arc::clone(id));
                dependencies.insert(Arc::clone(id), DepVec::new());
            }
        }

        for (id, deps) in &declared {
            for dep in deps {
                let Some(dep_arc) = known.get(*dep).cloned() else {
                    continue;
                };
                let entry = dependencies.entry(Arc::clone(id)).or_default();
                if entry.iter().any(|d| d == &dep_arc) {
                    continue;
                }
                entry.push(dep_arc);
            }
        }

        Self {
            dependencies,
            job_ids,
        }
    }

    #[inline]
    pub fn get_dependencies(&self, job: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.dependencies
            .get(job)
            .map_or(EMPTY, SmallVec::as_slice)
    }

    /// Detect dependency cycles using DFS with three-color marking.
    ///
    /// Returns the cycle as a closed path (`[a, b, a]`) when one exists.
    pub fn detect_cycles(&self) -> Result<(), Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: FxHashMap<Arc<str>, Color> = self
            .job_ids
            .iter()
            .map(|id| (Arc::clone(id), Color::White))
            .collect();
        let mut stack: Vec<Arc<str>> = Vec::new();

        fn dfs(
            node: Arc<str>,
            dependencies: &FxHashMap<Arc<str>, DepVec>,
            colors: &mut FxHashMap<Arc<str>, Color>,
            stack: &mut Vec<Arc<str>>,
        ) -> Result<(), Vec<String>> {
            colors.insert(Arc::clone(&node), Color::Gray);
            stack.push(Arc::clone(&node));

            if let Some(deps) = dependencies.get(&node) {
                for dep in deps {
                    match colors.get(dep) {
                        Some(Color::Gray) => {
                            // Gray means dep is on the current DFS path
                            let start = stack
                                .iter()
                                .position(|x| x.as_ref() == dep.as_ref())
                                .unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|s| s.to_string()).collect();
                            cycle.push(dep.to_string());
                            return Err(cycle);
                        }
                        Some(Color::White) | None => {
                            dfs(Arc::clone(dep), dependencies, colors, stack)?;
                        }
                        Some(Color::Black) => {}
                    }
                }
            }

            stack.pop();
            colors.insert(node, Color::Black);
            Ok(())
        }

        for job in &self.job_ids {
            if colors.get(job) == Some(&Color::White) {
                dfs(Arc::clone(job), &self.dependencies, &mut colors, &mut stack)?;
            }
        }

        Ok(())
    }
}

fn dependency_names(job: &JobDecl) -> Vec<&str> {
    job.dependencies().iter().map(String::as_str).collect()
}
