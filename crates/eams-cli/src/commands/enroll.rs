use eams_robber::{Robber, RobberSettings};

use crate::session::Session;

async fn one_shot(session: &Session) -> anyhow::Result<Robber<eams_api::Client>> {
    let (student_id, turn_id) = session.student_and_turn().await?;
    let settings = RobberSettings::from_config(&session.config.robber())?;
    Ok(Robber::new(
        session.client.clone(),
        student_id,
        turn_id,
        settings,
    ))
}

pub async fn enroll(session: &Session, lesson_id: i64, cost: i64) -> anyhow::Result<()> {
    let robber = one_shot(session).await?;
    match robber.try_enroll(lesson_id, cost).await {
        Ok(()) => {
            println!("✓ Enrolled in lesson {lesson_id}");
            Ok(())
        }
        Err(e) => {
            eprintln!("Enrollment failed: {e}");
            if e.is_auth_expired() {
                eprintln!("  Session expired: refresh the cookie and retry.");
            }
            Err(e.into())
        }
    }
}

pub async fn drop(session: &Session, lesson_id: i64) -> anyhow::Result<()> {
    let robber = one_shot(session).await?;
    match robber.try_drop(lesson_id).await {
        Ok(()) => {
            println!("✓ Dropped lesson {lesson_id}");
            Ok(())
        }
        Err(e) => {
            eprintln!("Drop failed: {e}");
            if e.is_auth_expired() {
                eprintln!("  Session expired: refresh the cookie and retry.");
            }
            Err(e.into())
        }
    }
}
