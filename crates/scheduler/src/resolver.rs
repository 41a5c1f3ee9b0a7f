//! "Runs after" bookkeeping: which prerequisites each waiting job still needs.

use std::collections::{HashMap, HashSet};

use fairtick_core::JobStatus;

#[derive(Debug, Default)]
pub(crate) struct DependencyResolver {
    /// Waiting job -> prerequisite ids not yet done.
    outstanding: HashMap<String, HashSet<String>>,
    /// Prerequisite id -> waiting jobs, in registration order.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new job's prerequisites and decide its initial status.
    ///
    /// Prerequisites already done count as satisfied. Unknown ids stay
    /// outstanding forever.
    pub fn register(
        &mut self,
        id: &str,
        after: &[String],
        is_done: impl Fn(&str) -> bool,
    ) -> JobStatus {
        let pending: HashSet<String> = after
            .iter()
            .filter(|dep| !is_done(dep))
            .cloned()
            .collect();

        if pending.is_empty() {
            return JobStatus::Running;
        }

        for dep in &pending {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(id.to_string());
        }
        self.outstanding.insert(id.to_string(), pending);
        JobStatus::Waiting
    }

    /// `id` reached done. Returns the jobs that no longer wait on anything.
    pub fn complete(&mut self, id: &str) -> Vec<String> {
        let Some(waiting) = self.dependents.remove(id) else {
            return Vec::new();
        };

        let mut unblocked = Vec::new();
        for job in waiting {
            if let Some(pending) = self.outstanding.get_mut(&job) {
                pending.remove(id);
                if pending.is_empty() {
                    self.outstanding.remove(&job);
                    unblocked.push(job);
                }
            }
        }
        unblocked
    }

    /// Drop a removed job's own bookkeeping. Jobs waiting on it keep waiting.
    pub fn forget(&mut self, id: &str) {
        if let Some(pending) = self.outstanding.remove(id) {
            for dep in pending {
                if let Some(list) = self.dependents.get_mut(&dep) {
                    list.retain(|job| job != id);
                    if list.is_empty() {
                        self.dependents.remove(&dep);
                    }
                }
            }
        }
    }

    /// Outstanding prerequisites of `id`, sorted.
    pub fn pending(&self, id: &str) -> Vec<String> {
        let mut pending: Vec<String> = self
            .outstanding
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        pending.sort();
        pending
    }

    pub fn clear(&mut self) {
        self.outstanding.clear();
        self.dependents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_prerequisites_runs_immediately() {
        let mut resolver = DependencyResolver::new();
        assert_eq!(resolver.register("a", &[], |_| false), JobStatus::Running);
        assert!(resolver.pending("a").is_empty());
    }

    #[test]
    fn done_prerequisites_are_satisfied() {
        let mut resolver = DependencyResolver::new();
        let status = resolver.register("b", &ids(&["a"]), |id| id == "a");
        assert_eq!(status, JobStatus::Running);
    }

    #[test]
    fn waits_until_all_prerequisites_done() {
        let mut resolver = DependencyResolver::new();
        assert_eq!(
            resolver.register("c", &ids(&["a", "b"]), |_| false),
            JobStatus::Waiting
        );
        assert_eq!(resolver.pending("c"), ids(&["a", "b"]));

        assert!(resolver.complete("a").is_empty());
        assert_eq!(resolver.pending("c"), ids(&["b"]));
        assert_eq!(resolver.complete("b"), ids(&["c"]));
        assert!(resolver.pending("c").is_empty());

        // Completing again promotes nothing.
        assert!(resolver.complete("b").is_empty());
    }

    #[test]
    fn several_dependents_promoted_in_registration_order() {
        let mut resolver = DependencyResolver::new();
        resolver.register("y", &ids(&["a"]), |_| false);
        resolver.register("x", &ids(&["a"]), |_| false);
        assert_eq!(resolver.complete("a"), ids(&["y", "x"]));
    }

    #[test]
    fn unknown_prerequisite_never_resolves() {
        let mut resolver = DependencyResolver::new();
        resolver.register("b", &ids(&["ghost"]), |_| false);
        assert!(resolver.complete("a").is_empty());
        assert_eq!(resolver.pending("b"), ids(&["ghost"]));
    }

    #[test]
    fn forget_removes_waiting_job() {
        let mut resolver = DependencyResolver::new();
        resolver.register("b", &ids(&["a"]), |_| false);
        resolver.register("c", &ids(&["a"]), |_| false);
        resolver.forget("b");
        assert!(resolver.pending("b").is_empty());
        assert_eq!(resolver.complete("a"), ids(&["c"]));
    }

    #[test]
    fn clear_drops_everything() {
        let mut resolver = DependencyResolver::new();
        resolver.register("b", &ids(&["a"]), |_| false);
        resolver.clear();
        assert!(resolver.pending("b").is_empty());
        assert!(resolver.complete("a").is_empty());
    }
}
