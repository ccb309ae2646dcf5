//! Shared types used across eams crates.

use serde::{Deserialize, Serialize};

/// A course section the robber should try to enroll in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Section (lesson) identifier on the course-selection service.
    pub lesson_id: i64,
    /// Virtual-wallet cost bid for the section. Zero when the round
    /// does not use the wallet.
    #[serde(default)]
    pub virtual_cost: i64,
    /// Higher priorities are attempted first within a tick.
    #[serde(default)]
    pub priority: i32,
}

impl Target {
    pub fn new(lesson_id: i64, virtual_cost: i64, priority: i32) -> Self {
        Self {
            lesson_id,
            virtual_cost,
            priority,
        }
    }
}

/// Point-in-time seat counts for one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatCount {
    pub capacity: i64,
    pub occupied: i64,
}

impl SeatCount {
    pub fn new(capacity: i64, occupied: i64) -> Self {
        Self { capacity, occupied }
    }

    /// Free seats, never negative. Over-enrolled sections report zero.
    pub fn available(&self) -> i64 {
        (self.capacity - self.occupied).max(0)
    }

    /// Whether at least one seat is free right now.
    pub fn is_open(&self) -> bool {
        self.capacity - self.occupied > 0
    }
}
