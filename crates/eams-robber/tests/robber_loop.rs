//! End-to-end robber behaviour against an in-memory portal whose seat
//! counts change as enrollments commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use eams_api::{
    ApiError, ApiResult, CourseSelectService, OperationKind, OperationRequest, OperationResult,
};
use eams_robber::{PollSettings, Robber, RobberSettings, SeatCount};

const STUDENT: i64 = 1001;
const TURN: i64 = 7;

#[derive(Default)]
struct Portal {
    seats: HashMap<i64, SeatCount>,
    /// Lessons whose predicate is rejected with this reason.
    conflicts: HashMap<i64, String>,
    pending: HashMap<String, OperationRequest>,
    enrolled: Vec<i64>,
    next_id: u64,
}

/// Predicates pass unless a conflict is configured; commits take a seat
/// and fail once the section is full.
#[derive(Default)]
struct FakePortal {
    state: Mutex<Portal>,
}

impl FakePortal {
    fn with_seats(seats: &[(i64, i64, i64)]) -> Arc<Self> {
        let portal = FakePortal::default();
        {
            let mut state = portal.state.lock().unwrap();
            for &(lesson, capacity, occupied) in seats {
                state.seats.insert(lesson, SeatCount::new(capacity, occupied));
            }
        }
        Arc::new(portal)
    }

    fn conflict(&self, lesson_id: i64, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .conflicts
            .insert(lesson_id, reason.to_string());
    }

    fn set_seats(&self, lesson_id: i64, capacity: i64, occupied: i64) {
        self.state
            .lock()
            .unwrap()
            .seats
            .insert(lesson_id, SeatCount::new(capacity, occupied));
    }

    fn enrolled(&self) -> Vec<i64> {
        self.state.lock().unwrap().enrolled.clone()
    }

    fn track(&self, prefix: &str, request: &OperationRequest) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("{prefix}-{}", state.next_id);
        state.pending.insert(id.clone(), *request);
        id
    }

    fn take(&self, tracking_id: &str) -> ApiResult<OperationRequest> {
        self.state
            .lock()
            .unwrap()
            .pending
            .remove(tracking_id)
            .ok_or_else(|| ApiError::RemoteRejected {
                code: 404,
                message: format!("unknown request {tracking_id}"),
            })
    }
}

#[async_trait]
impl CourseSelectService for FakePortal {
    async fn seat_count(&self, lesson_id: i64) -> ApiResult<SeatCount> {
        self.state
            .lock()
            .unwrap()
            .seats
            .get(&lesson_id)
            .copied()
            .ok_or(ApiError::RemoteRejected {
                code: 404,
                message: "lesson not found".to_string(),
            })
    }

    async fn submit_predicate(&self, request: &OperationRequest) -> ApiResult<String> {
        Ok(self.track("pred", request))
    }

    async fn poll_predicate_result(
        &self,
        _student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>> {
        let request = self.take(tracking_id)?;
        let state = self.state.lock().unwrap();
        Ok(Some(match state.conflicts.get(&request.lesson_id) {
            Some(reason) => OperationResult::rejected(reason.clone()),
            None => OperationResult::accepted(),
        }))
    }

    async fn submit_commit(&self, request: &OperationRequest) -> ApiResult<String> {
        Ok(self.track("commit", request))
    }

    async fn poll_commit_result(
        &self,
        _student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>> {
        let request = self.take(tracking_id)?;
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let Some(seats) = state.seats.get_mut(&request.lesson_id) else {
            return Ok(Some(OperationResult::rejected("lesson not found")));
        };

        match request.kind {
            OperationKind::Add if seats.is_open() => {
                seats.occupied += 1;
                state.enrolled.push(request.lesson_id);
                Ok(Some(OperationResult::accepted()))
            }
            OperationKind::Add => Ok(Some(OperationResult::rejected("名额已满"))),
            OperationKind::Drop => {
                seats.occupied = (seats.occupied - 1).max(0);
                state.enrolled.retain(|&id| id != request.lesson_id);
                Ok(Some(OperationResult::accepted()))
            }
        }
    }
}

fn settings(interval: Duration) -> RobberSettings {
    RobberSettings {
        interval,
        max_retries: 3,
        poll: PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        },
    }
}

#[tokio::test]
async fn seats_opening_later_are_picked_up_on_next_tick() {
    // A is full, B has one seat left.
    let portal = FakePortal::with_seats(&[(100, 30, 30), (200, 30, 29)]);
    let robber = Robber::new(Arc::clone(&portal), STUDENT, TURN, settings(Duration::from_secs(1)));
    robber.add_target(100, 0, 10);
    robber.add_target(200, 0, 1);

    let first = robber.tick().await;
    assert_eq!(first.skipped, vec![100]);
    assert_eq!(first.committed, vec![200]);
    assert_eq!(portal.enrolled(), vec![200]);
    assert_eq!(robber.list_targets().len(), 1);

    // Someone drops A between ticks.
    portal.set_seats(100, 30, 29);

    let second = robber.tick().await;
    assert_eq!(second.committed, vec![100]);
    assert!(robber.list_targets().is_empty());
    assert_eq!(portal.enrolled(), vec![200, 100]);
}

#[tokio::test]
async fn full_target_stays_while_open_one_commits() {
    // 300 has one seat left, 400 none.
    let portal = FakePortal::with_seats(&[(300, 10, 9), (400, 10, 10)]);
    let robber = Robber::new(Arc::clone(&portal), STUDENT, TURN, settings(Duration::from_secs(1)));
    robber.add_target(400, 0, 1);
    robber.add_target(300, 0, 9);

    let report = robber.tick().await;
    assert_eq!(report.committed, vec![300]);
    assert_eq!(report.skipped, vec![400]);

    let report = robber.tick().await;
    assert_eq!(report.skipped, vec![400]);
    assert!(report.committed.is_empty());
}

#[tokio::test]
async fn predicate_conflict_is_retried_every_tick() {
    let portal = FakePortal::with_seats(&[(500, 30, 0)]);
    portal.conflict(500, "时间冲突");
    let robber = Robber::new(Arc::clone(&portal), STUDENT, TURN, settings(Duration::from_secs(1)));
    robber.add_target(500, 0, 1);

    for _ in 0..3 {
        let report = robber.tick().await;
        assert_eq!(report.attempted, vec![500]);
        assert_eq!(report.failed, vec![500]);
    }
    assert!(robber.registry().contains(500));
    assert!(portal.enrolled().is_empty());
}

#[tokio::test]
async fn background_loop_drains_registry_then_idles() {
    let portal = FakePortal::with_seats(&[(600, 5, 4), (700, 5, 5)]);
    let robber = Robber::new(Arc::clone(&portal), STUDENT, TURN, settings(Duration::from_millis(10)));
    robber.add_target(600, 0, 1);
    robber.add_target(700, 0, 1);
    robber.start().unwrap();

    let registry = robber.registry();
    let wait_for = |lesson: i64| {
        let registry = registry.clone();
        async move {
            tokio::time::timeout(Duration::from_secs(5), async {
                while registry.contains(lesson) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
        }
    };

    wait_for(600).await.expect("600 should be enrolled");
    assert!(registry.contains(700));

    portal.set_seats(700, 5, 3);
    wait_for(700).await.expect("700 should be enrolled once a seat frees up");

    robber.shutdown().await.unwrap();
    assert!(!robber.is_running());
    let mut enrolled = portal.enrolled();
    enrolled.sort_unstable();
    assert_eq!(enrolled, vec![600, 700]);
}

#[tokio::test]
async fn targets_added_while_running_are_picked_up() {
    let portal = FakePortal::with_seats(&[(800, 5, 0)]);
    let robber = Robber::new(Arc::clone(&portal), STUDENT, TURN, settings(Duration::from_millis(10)));
    robber.start().unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    robber.add_target(800, 2, 1);

    let registry = robber.registry();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("late target should be enrolled");

    robber.shutdown().await.unwrap();
    assert_eq!(portal.enrolled(), vec![800]);
}

#[tokio::test]
async fn manual_drop_releases_seat() {
    let portal = FakePortal::with_seats(&[(900, 5, 5)]);
    let robber = Robber::new(Arc::clone(&portal), STUDENT, TURN, settings(Duration::from_secs(1)));

    robber.try_drop(900).await.unwrap();
    assert_eq!(portal.seat_count(900).await.unwrap(), SeatCount::new(5, 4));

    robber.try_enroll(900, 0).await.unwrap();
    assert_eq!(portal.enrolled(), vec![900]);
    assert!(!robber.registry().contains(900));
}
