//! eams — course-selection client and enrollment robber.
//!
//! # Usage
//!
//! ```text
//! eams init                      # write an eams.toml scaffold
//! eams turns                     # list open enrollment rounds
//! eams count 123456              # seats in one section
//! eams rob                       # enroll in [[targets]] as seats open up
//! ```
//!
//! The session cookie comes from `client.cookie` or `EAMS_COOKIE`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod session;

#[derive(Parser)]
#[command(
    name = "eams",
    about = "Course-selection client and enrollment robber",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to eams.toml.
    #[arg(short, long, global = true, default_value = "eams.toml")]
    config: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write an eams.toml scaffold.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Student ids bound to the session.
    Students,
    /// Enrollment rounds open to the student.
    Turns,
    /// Seat counts for one section.
    Count { lesson_id: i64 },
    /// Sections the student is enrolled in.
    Selected,
    /// Filter values (grades, departments, campuses) for the round.
    Conditions,
    /// Courses available for retake in the round.
    Repaired,
    /// Search selectable sections in the round's semester.
    Search {
        /// Course name or code.
        #[arg(short, long)]
        name: Option<String>,
        /// Teacher name or code.
        #[arg(short, long)]
        teacher: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Validate and commit enrollment in one section, once.
    Enroll {
        lesson_id: i64,
        /// Virtual currency bid.
        #[arg(long, default_value = "0")]
        cost: i64,
    },
    /// Validate and commit dropping one section, once.
    Drop { lesson_id: i64 },
    /// Poll [[targets]] and enroll as seats open up.
    ///
    /// Runs until every target is committed or Ctrl-C.
    Rob {
        /// Override robber.interval, e.g. "500ms".
        #[arg(short, long)]
        interval: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eams=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Init { force } = cli.command {
        return commands::init::init(&cli.config, force);
    }

    let session = session::Session::open(&cli.config)?;
    let json = cli.json;

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Students => commands::query::students(&session, json).await,
        Command::Turns => commands::query::turns(&session, json).await,
        Command::Count { lesson_id } => commands::query::count(&session, lesson_id, json).await,
        Command::Selected => commands::query::selected(&session, json).await,
        Command::Conditions => commands::query::conditions(&session, json).await,
        Command::Repaired => commands::query::repaired(&session, json).await,
        Command::Search {
            name,
            teacher,
            page,
        } => commands::query::search(&session, name, teacher, page, json).await,
        Command::Enroll { lesson_id, cost } => {
            commands::enroll::enroll(&session, lesson_id, cost).await
        }
        Command::Drop { lesson_id } => commands::enroll::drop(&session, lesson_id).await,
        Command::Rob { interval } => commands::rob::rob(&session, interval.as_deref()).await,
    }
}
