// Capture cycle bookkeeping: last submission wins
//
// Every user action (capture, upload, sample) begins a new cycle and gets a
// fresh id. In-flight work is never cancelled; when it finishes it commits
// against the coordinator, which only applies results from the latest cycle.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::core::errors::PipelineError;
use crate::core::types::{CycleId, PipelineResult, PipelineStage};
use crate::utils::Metrics;

struct CycleState {
    latest: CycleId,
    stage: PipelineStage,
    applied: Option<(CycleId, PipelineResult)>,
}

/// Tracks the latest cycle of one client and its last applied result
pub struct CycleCoordinator {
    state: Mutex<CycleState>,
    metrics: Option<Metrics>,
}

impl CycleCoordinator {
    pub fn new(metrics: Option<Metrics>) -> Self {
        Self {
            state: Mutex::new(CycleState {
                latest: 0,
                stage: PipelineStage::Idle,
                applied: None,
            }),
            metrics,
        }
    }

    /// Start a new cycle, superseding whatever is in flight
    pub fn begin(&self) -> CycleId {
        let mut state = self.state.lock();
        state.latest += 1;
        state.stage = PipelineStage::Capturing;
        debug!(cycle = state.latest, "Cycle started");
        state.latest
    }

    /// Record a stage transition. Ignored unless `id` is the latest cycle.
    pub fn advance(&self, id: CycleId, stage: PipelineStage) -> bool {
        let mut state = self.state.lock();
        if id != state.latest {
            return false;
        }
        state.stage = stage;
        true
    }

    /// Apply `result` if `id` is still the latest cycle.
    ///
    /// A superseded cycle gets `StaleCycleDiscarded` back and the shared state
    /// is left untouched.
    pub fn commit(&self, id: CycleId, result: PipelineResult) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        if id != state.latest {
            let latest = state.latest;
            drop(state);

            debug!(cycle = id, latest, "Discarding result of superseded cycle");
            if let Some(ref m) = self.metrics {
                m.record_stale_discard();
            }
            return Err(PipelineError::StaleCycleDiscarded { cycle: id, latest });
        }

        state.stage = result.stage();
        state.applied = Some((id, result));
        Ok(())
    }

    /// Last applied result and the cycle that produced it
    pub fn current(&self) -> Option<(CycleId, PipelineResult)> {
        self.state.lock().applied.clone()
    }

    /// Latest cycle id and its stage
    pub fn stage(&self) -> (CycleId, PipelineStage) {
        let state = self.state.lock();
        (state.latest, state.stage)
    }
}

/// One coordinator per client session (a browser tab, in practice)
#[derive(Clone)]
pub struct OverlaySessions {
    sessions: Arc<DashMap<String, Arc<CycleCoordinator>>>,
    metrics: Option<Metrics>,
}

impl OverlaySessions {
    pub fn new(metrics: Option<Metrics>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            metrics,
        }
    }

    pub fn get_or_create(&self, session: &str) -> Arc<CycleCoordinator> {
        self.sessions
            .entry(session.to_string())
            .or_insert_with(|| Arc::new(CycleCoordinator::new(self.metrics.clone())))
            .clone()
    }

    pub fn get(&self, session: &str) -> Option<Arc<CycleCoordinator>> {
        self.sessions.get(session).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(text: &str) -> PipelineResult {
        PipelineResult::Empty {
            full_text: text.to_string(),
        }
    }

    #[test]
    fn test_ids_increase_monotonically() {
        let coordinator = CycleCoordinator::new(None);
        let a = coordinator.begin();
        let b = coordinator.begin();
        assert!(b > a);
        assert_eq!(coordinator.stage(), (b, PipelineStage::Capturing));
    }

    #[test]
    fn test_latest_cycle_commits() {
        let coordinator = CycleCoordinator::new(None);
        assert!(coordinator.current().is_none());
        assert_eq!(coordinator.stage().1, PipelineStage::Idle);

        let id = coordinator.begin();
        assert!(coordinator.advance(id, PipelineStage::Recognizing));
        coordinator.commit(id, empty("")).unwrap();

        assert_eq!(coordinator.current(), Some((id, empty(""))));
        assert_eq!(coordinator.stage(), (id, PipelineStage::Ready));
    }

    #[test]
    fn test_stale_commit_is_discarded() {
        let metrics = Metrics::new();
        let coordinator = CycleCoordinator::new(Some(metrics.clone()));

        let a = coordinator.begin();
        let b = coordinator.begin();
        coordinator.commit(b, empty("b")).unwrap();

        let err = coordinator.commit(a, empty("a")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StaleCycleDiscarded { cycle, latest } if cycle == a && latest == b
        ));
        assert_eq!(coordinator.current(), Some((b, empty("b"))));
        assert_eq!(metrics.snapshot().stale_discarded, 1);
    }

    #[test]
    fn test_stale_commit_before_latest_finishes_leaves_previous_result() {
        let coordinator = CycleCoordinator::new(None);
        let first = coordinator.begin();
        coordinator.commit(first, empty("first")).unwrap();

        let a = coordinator.begin();
        let _b = coordinator.begin();
        assert!(coordinator.commit(a, empty("a")).is_err());
        assert!(!coordinator.advance(a, PipelineStage::Translating));

        // B still in flight: the last applied result is untouched
        assert_eq!(coordinator.current(), Some((first, empty("first"))));
        assert_eq!(coordinator.stage().1, PipelineStage::Capturing);
    }

    #[test]
    fn test_sessions_are_independent() {
        let sessions = OverlaySessions::new(None);
        let tab1 = sessions.get_or_create("tab-1");
        let tab2 = sessions.get_or_create("tab-2");

        let a = tab1.begin();
        let b = tab2.begin();
        tab1.commit(a, empty("one")).unwrap();
        tab2.commit(b, empty("two")).unwrap();

        assert_eq!(sessions.len(), 2);
        assert!(sessions.get("tab-3").is_none());
        assert!(Arc::ptr_eq(&sessions.get_or_create("tab-1"), &tab1));
        assert_eq!(tab1.current().unwrap().1, empty("one"));
    }
}
