//! Per-step observability: stage timers and event counters.
//!
//! `StepStats` is a first-class per-step return value rather than an
//! optional rolling-history overlay for a debug UI: scenario tests
//! routinely read `ray_hits`/`contact_patches` every step, so collection is
//! unconditional and cheap (plain counters, no allocation).

use web_time::Instant;

/// Which of the nine per-step stages a [`ScopedTimer`] is measuring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    ActiveDomainResolve,
    RayCastDispatch,
    PatchSegment,
    ConstitutiveUpdate,
    ForceDistribute,
    BulldozeBoundaryRaise,
    BulldozeDilate,
    BulldozeSmooth,
    VisualizationBridge,
}

impl Stage {
    const ALL: [Stage; 9] = [
        Stage::ActiveDomainResolve,
        Stage::RayCastDispatch,
        Stage::PatchSegment,
        Stage::ConstitutiveUpdate,
        Stage::ForceDistribute,
        Stage::BulldozeBoundaryRaise,
        Stage::BulldozeDilate,
        Stage::BulldozeSmooth,
        Stage::VisualizationBridge,
    ];

    fn index(self) -> usize {
        Stage::ALL.iter().position(|s| *s == self).unwrap()
    }
}

/// Counters and stage timers produced by one call to [`crate::Scm::step`]
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    pub ray_casts: u64,
    pub ray_hits: u64,
    pub contact_patches: u64,
    pub erosion_nodes: u64,
    stage_ms: [f64; 9],
}

impl StepStats {
    pub fn stage_ms(&self, stage: Stage) -> f64 {
        self.stage_ms[stage.index()]
    }

    fn set_stage_ms(&mut self, stage: Stage, ms: f64) {
        self.stage_ms[stage.index()] = ms;
    }
}

/// RAII scoped timer: records elapsed milliseconds into `stats` on drop.
///
/// `web_time::Instant`-based timing, generalized to wrap every stage
/// rather than just the whole pipeline.
pub struct ScopedTimer<'a> {
    stats: &'a mut StepStats,
    stage: Stage,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn start(stats: &'a mut StepStats, stage: Stage) -> Self {
        Self {
            stats,
            stage,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.stats.set_stage_ms(self.stage, elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_timer_records_nonzero_elapsed() {
        let mut stats = StepStats::default();
        {
            let _timer = ScopedTimer::start(&mut stats, Stage::RayCastDispatch);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(stats.stage_ms(Stage::RayCastDispatch) > 0.0);
        assert_eq!(stats.stage_ms(Stage::ConstitutiveUpdate), 0.0);
    }

    #[test]
    fn default_counters_are_zero() {
        let stats = StepStats::default();
        assert_eq!(stats.ray_casts, 0);
        assert_eq!(stats.ray_hits, 0);
    }
}
