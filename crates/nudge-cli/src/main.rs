use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nudge_core::app::{AppBuilder, DailySchedule, mailer_from_config};
use nudge_core::config::NudgeConfig;
use nudge_core::domain::{InvitationId, Task, TaskStatus, Team, TeamInvitation, TeamRole, User};
use nudge_core::impls::{InMemoryNotificationSink, InMemoryTaskStore, RecordingMailer};
use nudge_core::notification::{LinkBuilder, LinkSigner};
use nudge_core::pipeline::RunReport;
use nudge_core::ports::{FixedClock, RecordingSleeper};

/// nudge: daily task reminders and notification dispatch.
#[derive(Parser)]
#[command(name = "nudge", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "nudge.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed an in-memory store, run two ticks and print the reports.
    Demo {
        /// Pretend it is this instant (RFC 3339).
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Print reports as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run the daily trigger until Ctrl-C.
    Serve {
        /// Seed the in-memory store with demo tasks.
        #[arg(long)]
        demo_data: bool,
    },
    /// Print the next trigger times.
    NextRuns {
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Print a signed invitation accept link.
    InviteLink {
        /// Invitation id (`invitation-<ulid>` or bare ULID); generated when omitted.
        #[arg(long)]
        invitation: Option<InvitationId>,

        #[arg(long)]
        expires: DateTime<Utc>,
    },
    /// Verify an invitation accept link.
    VerifyLink {
        #[arg(long)]
        url: String,

        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = NudgeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Demo { now, json } => demo(config, now.unwrap_or_else(Utc::now), json).await,
        Command::Serve { demo_data } => serve(config, demo_data).await,
        Command::NextRuns { count } => {
            let schedule = DailySchedule::from_config(&config.schedule)?;
            for at in schedule.upcoming(Utc::now(), count) {
                println!("{}", at.to_rfc3339());
            }
            Ok(())
        }
        Command::InviteLink {
            invitation,
            expires,
        } => {
            let links = link_builder(&config)?;
            let id = invitation.unwrap_or_else(InvitationId::generate);
            println!("{}", links.invitation_accept_url(id, expires));
            Ok(())
        }
        Command::VerifyLink { url, now } => {
            let links = link_builder(&config)?;
            let id = links
                .signer()
                .verify_accept_url(&url, now.unwrap_or_else(Utc::now))?;
            println!("valid: {id}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "nudge_core=debug,nudge=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn link_builder(config: &NudgeConfig) -> Result<LinkBuilder> {
    Ok(LinkBuilder::new(
        config.links.base_url.clone(),
        LinkSigner::new(config.links.signing_secret.as_bytes())?,
    ))
}

struct DemoData {
    team: Team,
    owner: User,
    newcomer: User,
    review: Task,
}

async fn seed(store: &InMemoryTaskStore, now: DateTime<Utc>) -> DemoData {
    let team = Team::new("Platform");
    let alice = User::new("Alice", "alice@example.com");
    let bob = User::new("Bob", "bob@example.com");
    let carol = User::new("Carol", "carol@example.com");
    store.insert_team(team.clone()).await;
    for user in [&alice, &bob, &carol] {
        store.insert_user(user.clone()).await;
    }

    let review = Task::new("Review release notes", team.id)
        .with_due_date(now + Duration::days(3))
        .with_assignee(bob.id);
    let tasks = [
        Task::new("Ship 2.0", team.id)
            .with_description("Tag, build and publish the release.")
            .with_due_date(now + Duration::hours(12))
            .with_assignee(alice.id)
            .with_watchers([bob.id, carol.id]),
        Task::new("Rotate credentials", team.id).with_due_date(now + Duration::days(2)),
        review.clone(),
        Task::new("Plan Q3", team.id)
            .with_due_date(now + Duration::days(10))
            .with_assignee(alice.id),
        Task::new("Fix flaky test", team.id)
            .with_due_date(now + Duration::days(1))
            .with_assignee(carol.id)
            .with_status(TaskStatus::completed()),
    ];
    for task in tasks {
        store.insert_task(task).await;
    }

    DemoData {
        team,
        owner: alice,
        newcomer: User::new("Dave", "dave@example.com"),
        review,
    }
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!(
            "{} [{:?}] attempts={} selected={} reminded={} failed_tasks={} persisted={} emailed={} delivery_failures={}",
            report.tick,
            report.outcome,
            report.attempts,
            report.tasks_selected,
            report.tasks_reminded,
            report.task_failures,
            report.deliveries.persisted,
            report.deliveries.emailed,
            report.deliveries.failed,
        );
    }
    Ok(())
}

async fn demo(config: NudgeConfig, now: DateTime<Utc>, json: bool) -> Result<()> {
    let store = InMemoryTaskStore::new();
    let sink = InMemoryNotificationSink::new();
    let mailer = RecordingMailer::new();
    let clock = FixedClock::new(now);
    let data = seed(&store, now).await;

    let app = AppBuilder::new(config)
        .task_store(Arc::new(store.clone()))
        .notification_sink(Arc::new(sink.clone()))
        .mailer(Arc::new(mailer.clone()))
        .clock(Arc::new(clock.clone()))
        .sleeper(Arc::new(RecordingSleeper::new()))
        .build()?;

    println!("== first run");
    print_report(&app.run_tick().await, json)?;

    clock.advance(Duration::hours(2));
    println!("== second run, same day (suppressed)");
    print_report(&app.run_tick().await, json)?;

    println!("== companion notifications");
    app.notify_task_assigned(data.review.id, &data.owner).await?;
    let invitation = TeamInvitation {
        id: InvitationId::generate(),
        team: data.team,
        inviter: data.owner,
        invitee: data.newcomer,
        role: TeamRole::Member,
        expires_at: app.now() + Duration::days(7),
    };
    app.notify_team_invitation(&invitation).await?;

    println!("== outbox");
    for message in mailer.sent().await {
        println!("-- to {} <{}>: {}", message.to_name, message.to_address, message.subject);
        if json {
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
    }
    println!(
        "feed entries: {}, reminder records: {}",
        sink.stored().await.len(),
        store.reminders().await.len()
    );
    Ok(())
}

async fn serve(config: NudgeConfig, demo_data: bool) -> Result<()> {
    let mailer = mailer_from_config(&config.mail)?;
    // Production task DB lives in the web application; the CLI only carries
    // the in-memory adapter.
    let store = InMemoryTaskStore::new();
    if demo_data {
        seed(&store, Utc::now()).await;
    } else {
        tracing::warn!("serving with an empty in-memory task store");
    }

    let app = AppBuilder::new(config)
        .task_store(Arc::new(store))
        .notification_sink(Arc::new(InMemoryNotificationSink::new()))
        .mailer(mailer)
        .build()?;

    let trigger = app.spawn_trigger();
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    trigger.shutdown_and_join().await;

    for report in app.history().recent(10).await {
        tracing::info!(
            run_id = %report.run_id,
            tick = %report.tick,
            outcome = ?report.outcome,
            "run"
        );
    }
    Ok(())
}
