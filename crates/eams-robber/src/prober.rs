//! Seat availability probe.

use std::sync::Arc;

use tracing::debug;

use eams_api::CourseSelectService;
use eams_core::SeatCount;

use crate::error::{RobberError, RobberResult};

/// Fetches current seat counts for one section.
///
/// Results are never cached; the remote service is the only source of
/// truth and other clients race for the same seats.
pub struct AvailabilityProber<S> {
    service: Arc<S>,
}

impl<S> Clone for AvailabilityProber<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: CourseSelectService> AvailabilityProber<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub async fn probe(&self, lesson_id: i64) -> RobberResult<SeatCount> {
        let seats = self
            .service
            .seat_count(lesson_id)
            .await
            .map_err(|source| RobberError::ProbeFailed { lesson_id, source })?;

        debug!(
            lesson_id,
            capacity = seats.capacity,
            occupied = seats.occupied,
            open = seats.is_open(),
            "seat probe"
        );
        Ok(seats)
    }
}
