//! `bowler email` command - scheduled emails

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{escape_tsv, truncate_str};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::{Context, GlobalOpts, OutputFormat};
use crate::service::email::{self, ScheduleRequest};

#[derive(Subcommand, Debug)]
pub enum EmailCommands {
    /// Queue an email
    Schedule(ScheduleArgs),

    /// Send every queued email that is due
    Run {
        /// Log instead of sending
        #[arg(long)]
        dry_run: bool,
    },

    /// List queued and sent emails
    List {
        /// Include every user's emails
        #[arg(long)]
        all: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct ScheduleArgs {
    /// Recipient address (repeatable)
    #[arg(long = "to", required = true)]
    pub to: Vec<String>,

    #[arg(long, short = 's')]
    pub subject: String,

    /// HTML body
    #[arg(long, short = 'b', conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the HTML body from a file
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Send time (RFC 3339); sends on the next run if omitted
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

pub fn run(cmd: EmailCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        EmailCommands::Schedule(args) => run_schedule(&ctx, args),
        EmailCommands::Run { dry_run } => run_send(&ctx, dry_run),
        EmailCommands::List { all } => run_list(&ctx, all),
    }
}

fn run_schedule(ctx: &Context, args: ScheduleArgs) -> Result<()> {
    let user = ctx.current_user()?;
    let body = match (args.body, args.body_file) {
        (Some(body), _) => body,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| miette!("Failed to read {}: {}", path.display(), e))?,
        (None, None) => String::new(),
    };

    let job = email::schedule_email(
        &ctx.store,
        ScheduleRequest {
            user_id: user,
            recipients: args.to,
            subject: args.subject,
            body,
            send_at: args.at,
        },
    )
    .into_diagnostic()?;

    match ctx.format {
        OutputFormat::Id => println!("{}", job.id),
        _ => {
            let when = job
                .send_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "next run".to_string());
            println!(
                "{} Scheduled {} for {}",
                style("✓").green(),
                style(&job.id).cyan(),
                when
            );
        }
    }
    Ok(())
}

fn run_send(ctx: &Context, dry_run: bool) -> Result<()> {
    let sender = ctx.email_sender(dry_run)?;
    let report = email::run_due(&ctx.store, sender.as_ref(), Utc::now()).into_diagnostic()?;

    if print_structured(&report, ctx.format)? {
        return Ok(());
    }
    let verb = if dry_run { "Dry run" } else { "Sent" };
    println!(
        "{} {}: {} sent, {} failed ({} queued)",
        style("✓").green(),
        verb,
        report.sent,
        report.failed,
        report.scanned
    );
    if report.failed > 0 {
        return Err(miette!("{} email(s) failed to send; run with -v for details", report.failed));
    }
    Ok(())
}

fn run_list(ctx: &Context, all: bool) -> Result<()> {
    let user = if all { None } else { Some(ctx.current_user()?) };
    let jobs = email::list_jobs(&ctx.store, user.as_deref()).into_diagnostic()?;

    let format = effective_format(ctx.format, true);
    if print_structured(&jobs, format)? {
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No emails queued.");
        return Ok(());
    }

    match format {
        OutputFormat::Id => {
            for job in &jobs {
                println!("{}", job.id);
            }
        }
        _ => {
            println!(
                "{:<6} {:<20} {:<30} {}",
                style("STATE").bold(),
                style("SEND AT").bold(),
                style("SUBJECT").bold(),
                style("TO").bold()
            );
            for job in &jobs {
                println!(
                    "{:<6}\t{:<20}\t{:<30}\t{}",
                    if job.sent { "sent" } else { "queued" },
                    job.send_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    escape_tsv(&truncate_str(&job.subject, 30)),
                    escape_tsv(&job.recipients.join(", "))
                );
            }
        }
    }
    Ok(())
}
