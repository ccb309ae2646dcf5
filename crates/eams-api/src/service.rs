//! The enrollment seam consumed by the robber.

use async_trait::async_trait;
use eams_core::SeatCount;
use tracing::debug;

use crate::client::Client;
use crate::error::ApiResult;
use crate::models::{AddDropResponse, AddPayload, DropPredicate, DropRequest, RequestMiddleDto};

/// Which side of the add/drop protocol a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Add,
    Drop,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Drop => "drop",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by the predicate and commit submissions of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub student_id: i64,
    pub turn_id: i64,
    pub lesson_id: i64,
    /// Ignored for drops.
    pub virtual_cost: i64,
}

impl OperationRequest {
    pub fn add(student_id: i64, turn_id: i64, lesson_id: i64, virtual_cost: i64) -> Self {
        Self {
            kind: OperationKind::Add,
            student_id,
            turn_id,
            lesson_id,
            virtual_cost,
        }
    }

    pub fn drop(student_id: i64, turn_id: i64, lesson_id: i64) -> Self {
        Self {
            kind: OperationKind::Drop,
            student_id,
            turn_id,
            lesson_id,
            virtual_cost: 0,
        }
    }

    pub(crate) fn add_payload(&self) -> AddPayload {
        AddPayload {
            student_assoc: self.student_id,
            course_select_turn_assoc: self.turn_id,
            request_middle_dtos: vec![RequestMiddleDto {
                lesson_assoc: self.lesson_id,
                virtual_cost: self.virtual_cost,
            }],
            course_pack_assoc: None,
        }
    }

    pub(crate) fn drop_predicate(&self) -> DropPredicate {
        DropPredicate {
            student_assoc: self.student_id,
            course_select_turn_assoc: self.turn_id,
            lesson_assoc_set: vec![self.lesson_id],
        }
    }

    pub(crate) fn drop_request(&self) -> DropRequest {
        DropRequest {
            student_assoc: self.student_id,
            course_select_turn_assoc: self.turn_id,
            lesson_assocs: vec![self.lesson_id],
            course_pack_assoc: None,
        }
    }
}

/// Terminal verdict of a predicate or commit submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub reason: Option<String>,
}

impl OperationResult {
    pub fn accepted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

impl From<AddDropResponse> for OperationResult {
    fn from(resp: AddDropResponse) -> Self {
        Self {
            success: resp.success,
            reason: resp.error_message,
        }
    }
}

/// Remote operations the enrollment robber depends on.
///
/// Poll methods return `Ok(None)` while the service has not produced a
/// verdict for the tracking id yet.
#[async_trait]
pub trait CourseSelectService: Send + Sync {
    async fn seat_count(&self, lesson_id: i64) -> ApiResult<SeatCount>;

    async fn submit_predicate(&self, request: &OperationRequest) -> ApiResult<String>;

    async fn poll_predicate_result(
        &self,
        student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>>;

    async fn submit_commit(&self, request: &OperationRequest) -> ApiResult<String>;

    async fn poll_commit_result(
        &self,
        student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>>;
}

#[async_trait]
impl CourseSelectService for Client {
    async fn seat_count(&self, lesson_id: i64) -> ApiResult<SeatCount> {
        Ok(self.count_info(lesson_id).await?.into())
    }

    async fn submit_predicate(&self, request: &OperationRequest) -> ApiResult<String> {
        debug!(kind = %request.kind, lesson_id = request.lesson_id, "submitting predicate");
        match request.kind {
            OperationKind::Add => {
                self.post("/student/course-select/add-predicate", &request.add_payload())
                    .await
            }
            OperationKind::Drop => {
                self.post(
                    "/student/course-select/drop-predicate",
                    &request.drop_predicate(),
                )
                .await
            }
        }
    }

    async fn poll_predicate_result(
        &self,
        student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>> {
        let endpoint =
            format!("/student/course-select/predicate-response/{student_id}/{tracking_id}");
        let resp: Option<AddDropResponse> = self.get(&endpoint).await?;
        Ok(resp.map(OperationResult::from))
    }

    async fn submit_commit(&self, request: &OperationRequest) -> ApiResult<String> {
        debug!(kind = %request.kind, lesson_id = request.lesson_id, "submitting commit");
        match request.kind {
            OperationKind::Add => {
                self.post("/student/course-select/add-request", &request.add_payload())
                    .await
            }
            OperationKind::Drop => {
                self.post("/student/course-select/drop-request", &request.drop_request())
                    .await
            }
        }
    }

    async fn poll_commit_result(
        &self,
        student_id: i64,
        tracking_id: &str,
    ) -> ApiResult<Option<OperationResult>> {
        let endpoint =
            format!("/student/course-select/add-drop-response/{student_id}/{tracking_id}");
        let resp: Option<AddDropResponse> = self.get(&endpoint).await?;
        Ok(resp.map(OperationResult::from))
    }
}
