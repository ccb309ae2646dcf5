//! Target registry shared between the caller and the tick task.
//!
//! Every operation takes the same mutex for its whole read-modify-write,
//! so concurrent `add`/`remove` on one lesson resolve last-writer-wins and
//! a snapshot never observes half an operation. The lock is never held
//! across an await point.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use eams_core::Target;

/// Ordered, de-duplicated set of enrollment targets.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Arc<Mutex<Vec<Target>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list, later duplicates replacing earlier ones.
    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        let registry = Self::new();
        for target in targets {
            registry.insert(target);
        }
        registry
    }

    /// Insert or replace the target for `lesson_id`.
    ///
    /// A replaced target keeps its position in the insertion order.
    pub fn add(&self, lesson_id: i64, virtual_cost: i64, priority: i32) {
        self.insert(Target::new(lesson_id, virtual_cost, priority));
    }

    pub fn insert(&self, target: Target) {
        let mut targets = self.lock();
        match targets.iter_mut().find(|t| t.lesson_id == target.lesson_id) {
            Some(existing) => {
                *existing = target;
                debug!(lesson_id = target.lesson_id, priority = target.priority, "target replaced");
            }
            None => {
                targets.push(target);
                debug!(lesson_id = target.lesson_id, priority = target.priority, "target added");
            }
        }
    }

    /// Remove the target for `lesson_id`. Returns whether one was present.
    pub fn remove(&self, lesson_id: i64) -> bool {
        let mut targets = self.lock();
        let before = targets.len();
        targets.retain(|t| t.lesson_id != lesson_id);
        let removed = targets.len() != before;
        if removed {
            debug!(lesson_id, "target removed");
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Independent copy of the current targets in insertion order.
    pub fn snapshot(&self) -> Vec<Target> {
        self.lock().clone()
    }

    pub fn get(&self, lesson_id: i64) -> Option<Target> {
        self.lock().iter().find(|t| t.lesson_id == lesson_id).copied()
    }

    pub fn contains(&self, lesson_id: i64) -> bool {
        self.get(lesson_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while the lock is held cannot leave a half-written Target,
    // so a poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<Target>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
