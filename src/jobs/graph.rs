//! JobGraph - `needs:` DAG over the generated jobs
//!
//! - Ordered adjacency list (job order = insertion order)
//! - Unknown `needs` targets are rejected
//! - Cycle detection using DFS three-color algorithm
//! - Topological order (dependencies first, ties broken by insertion order)

use rustc_hash::FxHashMap;

use super::Job;
use crate::error::{AwError, Result};

/// Graph of job dependencies
#[derive(Debug, Clone)]
pub struct JobGraph {
    /// job id in insertion order
    ids: Vec<String>,
    /// job index -> indices of the jobs it needs
    needs: Vec<Vec<usize>>,
}

impl JobGraph {
    pub fn from_jobs(jobs: &[Job]) -> Result<Self> {
        let index: FxHashMap<&str, usize> = jobs
            .iter()
            .enumerate()
            .map(|(i, job)| (job.id.as_str(), i))
            .collect();
        if index.len() != jobs.len() {
            return Err(AwError::JobGraph {
                reason: "duplicate job id".to_string(),
            });
        }

        let mut needs = Vec::with_capacity(jobs.len());
        for job in jobs {
            let mut deps = Vec::with_capacity(job.needs.len());
            for need in &job.needs {
                let Some(&dep) = index.get(need.as_str()) else {
                    return Err(AwError::JobGraph {
                        reason: format!("job '{}' needs unknown job '{}'", job.id, need),
                    });
                };
                deps.push(dep);
            }
            needs.push(deps);
        }

        Ok(Self {
            ids: jobs.iter().map(|j| j.id.clone()).collect(),
            needs,
        })
    }

    /// Jobs `id` depends on, directly
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.ids
            .iter()
            .position(|j| j == id)
            .map(|i| self.needs[i].iter().map(|d| self.ids[*d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Dependencies-first order; errors on a cycle.
    ///
    /// - White: not visited
    /// - Gray: on the DFS stack
    /// - Black: done
    pub fn topological_order(&self) -> Result<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs(
            node: usize,
            graph: &JobGraph,
            colors: &mut [Color],
            stack: &mut Vec<usize>,
            order: &mut Vec<String>,
        ) -> std::result::Result<(), String> {
            colors[node] = Color::Gray;
            stack.push(node);
            for &dep in &graph.needs[node] {
                match colors[dep] {
                    Color::Gray => {
                        let start = stack.iter().position(|n| *n == dep).unwrap_or(0);
                        let cycle: Vec<&str> =
                            stack[start..].iter().map(|n| graph.ids[*n].as_str()).collect();
                        return Err(format!("{} → {}", cycle.join(" → "), graph.ids[dep]));
                    }
                    Color::White => dfs(dep, graph, colors, stack, order)?,
                    Color::Black => {}
                }
            }
            stack.pop();
            colors[node] = Color::Black;
            order.push(graph.ids[node].clone());
            Ok(())
        }

        let mut colors = vec![Color::White; self.ids.len()];
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.ids.len());
        for node in 0..self.ids.len() {
            if colors[node] == Color::White {
                dfs(node, self, &mut colors, &mut stack, &mut order).map_err(|cycle| {
                    AwError::JobGraph {
                        reason: format!("cycle detected: {}", cycle),
                    }
                })?;
            }
        }
        Ok(order)
    }
}
