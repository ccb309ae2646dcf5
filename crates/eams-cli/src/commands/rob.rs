use std::time::Duration;

use anyhow::{Context, bail};
use tracing::info;

use eams_core::parse_duration;
use eams_robber::{Robber, RobberSettings, TargetRegistry};

use crate::session::Session;

const DRAIN_CHECK: Duration = Duration::from_millis(200);

pub async fn rob(session: &Session, interval: Option<&str>) -> anyhow::Result<()> {
    if session.config.targets.is_empty() {
        bail!("no [[targets]] configured");
    }

    let mut settings = RobberSettings::from_config(&session.config.robber())?;
    if let Some(raw) = interval {
        settings.interval =
            parse_duration(raw).with_context(|| format!("invalid interval: {raw}"))?;
    }

    let (student_id, turn_id) = session.student_and_turn().await?;
    let robber = Robber::new(session.client.clone(), student_id, turn_id, settings);
    for target in &session.config.targets {
        robber.add_target(target.lesson_id, target.virtual_cost, target.priority);
    }

    println!(
        "Robbing {} section(s) for student {student_id} in turn {turn_id} every {:?}. Ctrl-C to stop.",
        robber.list_targets().len(),
        settings.interval
    );
    robber.start()?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("shutdown signal received");
        }
        _ = drained(robber.registry()) => {
            info!("all targets enrolled");
        }
    }

    robber.shutdown().await?;

    let remaining = robber.list_targets();
    if remaining.is_empty() {
        println!("✓ Enrolled in every target");
    } else {
        println!("Stopped with {} target(s) left:", remaining.len());
        for target in remaining {
            println!("  lesson {} (priority {})", target.lesson_id, target.priority);
        }
    }
    Ok(())
}

async fn drained(registry: TargetRegistry) {
    while !registry.is_empty() {
        tokio::time::sleep(DRAIN_CHECK).await;
    }
}
