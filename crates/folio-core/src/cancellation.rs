use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Monotonic marker tied to the identity of the active reading session.
///
/// Async work captures a [`Generation`] when it starts and checks it again
/// before touching shared state; a bump in between means the work was
/// superseded and its result must be dropped.
#[derive(Clone, Debug, Default)]
pub struct SessionGeneration {
    current: Arc<AtomicU64>,
}

/// Snapshot of a [`SessionGeneration`] taken by one piece of async work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generation(u64);

impl SessionGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    /// Invalidate every outstanding [`Generation`] and return the new one.
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_invalidates_previous_generation() {
        let generations = SessionGeneration::new();
        let first = generations.current();
        assert!(generations.is_current(first));

        let second = generations.advance();
        assert!(!generations.is_current(first));
        assert!(generations.is_current(second));
        assert_eq!(second.value(), first.value() + 1);
    }

    #[test]
    fn clones_share_the_same_counter() {
        let generations = SessionGeneration::new();
        let observer = generations.clone();
        let before = observer.current();
        generations.advance();
        assert!(!observer.is_current(before));
    }
}
