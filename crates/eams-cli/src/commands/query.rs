use eams_api::models::{Lesson, LessonQueryRequest};
use eams_core::SeatCount;
use serde::Serialize;
use tracing::debug;

use crate::session::Session;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lessons(lessons: &[Lesson]) {
    for lesson in lessons {
        println!(
            "{:<10} {:<14} {:<24} {:<16} {:>4.1} cr  {}",
            lesson.id,
            lesson.code,
            lesson.course.name_zh,
            lesson.teacher_names(),
            lesson.course.credits,
            lesson.date_time_place.text_zh,
        );
    }
}

pub async fn students(session: &Session, json: bool) -> anyhow::Result<()> {
    let ids = session.client.student_ids().await?;
    if json {
        return print_json(&ids);
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

pub async fn turns(session: &Session, json: bool) -> anyhow::Result<()> {
    let student_id = session.student_id().await?;
    let turns = session.client.open_turns(student_id).await?;
    if json {
        return print_json(&turns);
    }
    if turns.is_empty() {
        println!("No open enrollment rounds for student {student_id}");
    }
    for turn in turns {
        println!("{:<8} {}", turn.id, turn.name);
        println!(
            "         select {} → {}",
            turn.select_date_time_range.start_date_time, turn.select_date_time_range.end_date_time
        );
    }
    Ok(())
}

pub async fn count(session: &Session, lesson_id: i64, json: bool) -> anyhow::Result<()> {
    let info = session.client.count_info(lesson_id).await?;
    if json {
        return print_json(&info);
    }
    let seats = SeatCount::from(info);
    println!(
        "lesson {lesson_id}: {}/{} taken, {} available",
        seats.occupied,
        seats.capacity,
        seats.available()
    );
    Ok(())
}

pub async fn selected(session: &Session, json: bool) -> anyhow::Result<()> {
    let (student_id, turn_id) = session.student_and_turn().await?;
    let lessons = session.client.selected_lessons(turn_id, student_id).await?;
    if json {
        return print_json(&lessons);
    }
    if lessons.is_empty() {
        println!("No sections selected in turn {turn_id}");
    }
    print_lessons(&lessons);
    Ok(())
}

pub async fn search(
    session: &Session,
    name: Option<String>,
    teacher: Option<String>,
    page: u32,
    json: bool,
) -> anyhow::Result<()> {
    let (student_id, turn_id) = session.student_and_turn().await?;

    let detail = session.client.select_detail(student_id, turn_id).await?;
    debug!(semester_id = detail.semester.id, semester = %detail.semester.name_zh, "searching semester");

    let mut request =
        LessonQueryRequest::selectable(student_id, turn_id).in_semester(detail.semester.id);
    request.page_no = page.max(1);
    if let Some(name) = name {
        request.course_name_or_code = name;
    }
    if let Some(teacher) = teacher {
        request.teacher_name_or_code = teacher;
    }

    let response = session
        .client
        .query_lessons(student_id, turn_id, Some(request))
        .await?;
    if json {
        return print_json(&response);
    }
    print_lessons(&response.lessons);
    println!(
        "page {}/{} ({} sections)",
        response.page_info.current_page, response.page_info.total_pages, response.page_info.total_rows
    );
    Ok(())
}

pub async fn conditions(session: &Session, json: bool) -> anyhow::Result<()> {
    let (_, turn_id) = session.student_and_turn().await?;
    let condition = session.client.query_condition(turn_id).await?;
    if json {
        return print_json(&condition);
    }
    println!("grades:      {}", condition.grades.join(", "));
    for department in &condition.departments {
        println!("department   {:<8} {}", department.id, department.name_zh);
    }
    for campus in &condition.campuses {
        println!("campus       {:<8} {}", campus.id, campus.name_zh);
    }
    for course_type in &condition.course_types {
        println!("course type  {:<8} {}", course_type.id, course_type.name_zh);
    }
    Ok(())
}

pub async fn repaired(session: &Session, json: bool) -> anyhow::Result<()> {
    let (student_id, turn_id) = session.student_and_turn().await?;
    let courses = session.client.repaired_courses(turn_id, student_id).await?;
    if json {
        return print_json(&courses);
    }
    if courses.is_empty() {
        println!("No courses to retake in turn {turn_id}");
    }
    for course in courses {
        println!(
            "{:<14} {:<24} {:>4.1} cr  {}",
            course.code,
            course.name_zh,
            course.credits,
            if course.passed { "passed" } else { "not passed" }
        );
    }
    Ok(())
}
