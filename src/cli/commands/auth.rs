//! `bowler auth` command - accounts and sessions

use clap::Subcommand;
use console::style;
use dialoguer::Password;
use miette::{IntoDiagnostic, Result};

use crate::cli::output::print_structured;
use crate::cli::{Context, GlobalOpts, OutputFormat};
use crate::service::auth::{self, ProfileUpdate, SignupRequest};
use crate::store::keys::ACTIVE_SESSION_KEY;
use crate::store::KvStore;

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Create an account
    Signup(SignupArgs),

    /// Log in and remember the session
    Login(LoginArgs),

    /// End the current session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Change your password
    Passwd(PasswdArgs),

    /// Update profile fields
    Profile(ProfileArgs),

    /// Show a user's public profile
    User {
        /// Username
        username: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct SignupArgs {
    pub username: String,

    /// Password (prompted for if omitted)
    #[arg(long, env = "BOWLER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    pub username: String,

    /// Password (prompted for if omitted)
    #[arg(long, env = "BOWLER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PasswdArgs {
    /// Current password (prompted for if omitted)
    #[arg(long)]
    pub old: Option<String>,

    /// New password (prompted for if omitted)
    #[arg(long)]
    pub new: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ProfileArgs {
    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,
}

pub fn run(cmd: AuthCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        AuthCommands::Signup(args) => run_signup(&ctx, args),
        AuthCommands::Login(args) => run_login(&ctx, args),
        AuthCommands::Logout => run_logout(&ctx),
        AuthCommands::Whoami => run_whoami(&ctx),
        AuthCommands::Passwd(args) => run_passwd(&ctx, args),
        AuthCommands::Profile(args) => run_profile(&ctx, args),
        AuthCommands::User { username } => show_profile(&ctx, &username),
    }
}

fn prompt_password(prompt: &str, given: Option<String>, confirm: bool) -> Result<String> {
    if let Some(p) = given {
        return Ok(p);
    }
    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords don't match");
    }
    input.interact().into_diagnostic()
}

fn run_signup(ctx: &Context, args: SignupArgs) -> Result<()> {
    let password = prompt_password("Password", args.password, true)?;
    let profile = auth::signup(
        &ctx.store,
        SignupRequest {
            username: args.username,
            password,
            email: args.email,
            first_name: args.first_name,
            last_name: args.last_name,
        },
    )
    .into_diagnostic()?;

    println!(
        "{} Created account {}",
        style("✓").green(),
        style(&profile.username).cyan()
    );
    Ok(())
}

fn run_login(ctx: &Context, args: LoginArgs) -> Result<()> {
    let password = prompt_password("Password", args.password, false)?;
    let session = auth::login(&ctx.store, &args.username, &password).into_diagnostic()?;

    // Replace any previous session
    if let Some(old) = ctx.store.get(ACTIVE_SESSION_KEY).into_diagnostic()? {
        let _ = auth::logout(&ctx.store, &old);
    }
    ctx.store
        .put(ACTIVE_SESSION_KEY, &session.token)
        .into_diagnostic()?;

    println!(
        "{} Logged in as {}",
        style("✓").green(),
        style(&session.username).cyan()
    );
    Ok(())
}

fn run_logout(ctx: &Context) -> Result<()> {
    match ctx.store.get(ACTIVE_SESSION_KEY).into_diagnostic()? {
        Some(token) => {
            if let Err(e) = auth::logout(&ctx.store, &token) {
                tracing::warn!("{}", e);
            }
            ctx.store.delete(ACTIVE_SESSION_KEY).into_diagnostic()?;
            println!("{} Logged out", style("✓").green());
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

fn run_whoami(ctx: &Context) -> Result<()> {
    let user = ctx.current_user()?;
    match ctx.format {
        OutputFormat::Id | OutputFormat::Tsv => println!("{}", user),
        _ => show_profile(ctx, &user)?,
    }
    Ok(())
}

fn run_passwd(ctx: &Context, args: PasswdArgs) -> Result<()> {
    let user = ctx.current_user()?;
    let old = prompt_password("Current password", args.old, false)?;
    let new = prompt_password("New password", args.new, true)?;
    auth::change_password(&ctx.store, &user, &old, &new).into_diagnostic()?;
    println!("{} Password changed", style("✓").green());
    Ok(())
}

fn run_profile(ctx: &Context, args: ProfileArgs) -> Result<()> {
    let user = ctx.current_user()?;
    auth::update_profile(
        &ctx.store,
        &user,
        ProfileUpdate {
            email: args.email,
            first_name: args.first_name,
            last_name: args.last_name,
        },
    )
    .into_diagnostic()?;
    show_profile(ctx, &user)
}

fn show_profile(ctx: &Context, username: &str) -> Result<()> {
    let profile = auth::get_user(&ctx.store, username).into_diagnostic()?;
    if print_structured(&profile, ctx.format)? {
        return Ok(());
    }

    let full_name = [profile.first_name.as_deref(), profile.last_name.as_deref()]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    println!("{}: {}", style("User").bold(), style(&profile.username).cyan());
    if !full_name.is_empty() {
        println!("{}: {}", style("Name").bold(), full_name);
    }
    if let Some(email) = &profile.email {
        println!("{}: {}", style("Email").bold(), email);
    }
    println!("{}: {}", style("Role").bold(), profile.role);
    println!(
        "{}: {}",
        style("Since").bold(),
        profile.created.format("%Y-%m-%d")
    );
    Ok(())
}
