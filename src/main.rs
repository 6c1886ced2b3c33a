//! localauth - Entry Point
//!
//! Drives the auth, email and theme services from the terminal. The durable
//! tier is the SQLite file from `LOCALAUTH_DB_PATH`; the volatile tier lives
//! only as long as this process, so sessions started without `--remember` end
//! when the command exits.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use localauth::{
    AccountType, AdminRequestForm, AuthService, Config, EmailService, MemoryStore, ProfileUpdate,
    RegistrationForm, SqliteStore, StorageTiers, Theme, ThemeController,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "localauth", version, about = "Local user accounts, sessions and theme preference")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "regular")]
        user_type: AccountType,
    },
    /// Start a session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Keep the session in durable storage
        #[arg(long)]
        remember: bool,
    },
    /// End the session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Change the logged-in user's password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Show or update the logged-in user's profile
    Profile(ProfileArgs),
    /// Admin account requests
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Simulated email inbox
    Inbox {
        /// Mark a notification as read
        #[arg(long)]
        read: Option<String>,
        /// Only show mail for this recipient
        #[arg(long)]
        recipient: Option<String>,
    },
    /// Theme preference
    #[command(subcommand)]
    Theme(ThemeCommand),
}

#[derive(Args)]
struct ProfileArgs {
    #[arg(long)]
    avatar: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    position: Option<String>,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Ask for an admin account
    Request {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        position: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// List requests (pending only unless --all)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Approve a pending request
    ///
    /// Needs an admin session (log in with --remember). Without a session the
    /// decision is allowed only while no admin account exists yet, and is
    /// recorded as made by "system".
    Approve { id: String },
    /// Reject a pending request
    ///
    /// Same rules as approve: an admin session, or no session while no admin
    /// account exists yet.
    Reject {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum ThemeCommand {
    /// Show the applied theme
    Show,
    /// Flip between light and dark
    Toggle,
    /// Choose a theme explicitly
    Set { theme: Theme },
    /// Report the OS preference; applies only without an explicit choice
    System {
        #[arg(long)]
        dark: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    let durable = Arc::new(SqliteStore::open(&config.db_path)?);
    let tiers = StorageTiers::new(durable.clone(), Arc::new(MemoryStore::new()));

    info!("localauth v{}", env!("CARGO_PKG_VERSION"));

    let email = EmailService::new(durable.clone(), config.site_email.clone(), config.email_delay)
        .with_default_admin_password(config.auth.default_admin_password.clone());
    let theme = ThemeController::new(durable);
    let auth = AuthService::new(tiers, config.auth)?;

    run(&auth, &email, &theme, cli.command).await
}

async fn run(auth: &AuthService, email: &EmailService, theme: &ThemeController, command: Command) -> Result<()> {
    match command {
        Command::Register {
            first_name,
            last_name,
            email: address,
            password,
            confirm_password,
            user_type,
        } => {
            let user = auth.register(&RegistrationForm {
                first_name,
                last_name,
                email: address,
                user_type,
                password,
                confirm_password,
            })?;
            println!("Account created for {}. You can now log in.", user.email);
        }
        Command::Login {
            email: address,
            password,
            remember,
        } => {
            let session = auth.login(&address, &password, remember)?;
            println!("Logged in as {}", session.user.display_name());
            if remember {
                println!("Session valid for {} days.", auth.issuer().lifetime().num_days());
            } else {
                println!("Session not remembered; it ends when this command exits.");
            }
        }
        Command::Logout => {
            auth.logout()?;
            println!("Logged out");
        }
        Command::Whoami => match auth.current_user() {
            Some(user) => {
                println!("[{}] {} <{}>", user.initials(), user.display_name(), user.email);
                println!("  id:   {}", user.id);
                println!("  type: {}", user.user_type);
            }
            None => println!("Not logged in"),
        },
        Command::Passwd { current, new } => {
            auth.change_password(&current, &new)?;
            println!("Password changed");
        }
        Command::Profile(args) => {
            let patch = ProfileUpdate {
                avatar: args.avatar,
                phone: args.phone,
                address: args.address,
                bio: args.bio,
                position: args.position,
            };
            let profile = if patch.is_empty() {
                match auth.current_user() {
                    Some(user) => user.profile,
                    None => bail!("Not logged in"),
                }
            } else {
                auth.update_profile(&patch)?
            };
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Admin(cmd) => run_admin(auth, email, cmd).await?,
        Command::Inbox { read, recipient } => {
            if let Some(id) = read {
                if !email.mark_as_read(&id)? {
                    bail!("No notification with id {}", id);
                }
            }

            let notifications = match recipient {
                Some(recipient) => email.notifications_for(&recipient),
                None => email.notifications(),
            };
            for n in &notifications {
                let marker = if n.read { " " } else { "*" };
                println!(
                    "{} {}  {}  to {}  {}",
                    marker,
                    n.id,
                    n.sent_at.format("%Y-%m-%d %H:%M"),
                    n.recipient,
                    n.subject
                );
            }
            println!("{} unread", email.unread_count());
        }
        Command::Theme(cmd) => run_theme(theme, cmd)?,
    }

    Ok(())
}

async fn run_admin(auth: &AuthService, email: &EmailService, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Request {
            first_name,
            last_name,
            email: address,
            phone,
            position,
            reason,
        } => {
            let request = auth.submit_admin_request(&AdminRequestForm {
                first_name,
                last_name,
                email: address,
                phone,
                position,
                reason,
            })?;
            email.send_admin_request_notification(&request)?;
            println!(
                "Request {} submitted; {} has been notified and will review it",
                request.id,
                email.site_email()
            );
        }
        AdminCommand::List { all } => {
            let requests = if all {
                auth.all_admin_requests()
            } else {
                auth.pending_admin_requests()
            };
            for r in &requests {
                println!(
                    "{}  {:<8}  {} {} <{}>  {}",
                    r.id, r.status, r.first_name, r.last_name, r.email, r.position
                );
            }
            if requests.is_empty() {
                println!("No requests");
            }
        }
        AdminCommand::Approve { id } => {
            ensure_may_decide(auth)?;
            let request = auth.handle_admin_approval(&id, true)?;
            let (subject, body) = email.approval_message(&request.email, true, None);
            email.send_email(&request.email, subject, &body).await?;
            println!("Approved {}; admin account created for {}", request.id, request.email);
        }
        AdminCommand::Reject { id, reason } => {
            ensure_may_decide(auth)?;
            let request = auth.handle_admin_approval(&id, false)?;
            email.send_approval_notification(&request.email, false, reason.as_deref())?;
            println!("Rejected {}", request.id);
        }
    }

    Ok(())
}

/// Only admins decide requests. With nobody logged in a decision is allowed
/// just until the first admin exists, and is recorded as made by the system.
fn ensure_may_decide(auth: &AuthService) -> Result<()> {
    if auth.is_logged_in() {
        if !auth.can_approve_admin_requests() {
            bail!("Only admins can approve or reject admin requests");
        }
        return Ok(());
    }

    if auth.admin_exists() {
        bail!("An admin account exists; log in as an admin with --remember to decide requests");
    }
    Ok(())
}

fn run_theme(theme: &ThemeController, command: ThemeCommand) -> Result<()> {
    match command {
        ThemeCommand::Show => {}
        ThemeCommand::Toggle => {
            theme.toggle_theme()?;
        }
        ThemeCommand::Set { theme: choice } => theme.set_theme(choice)?,
        ThemeCommand::System { dark } => {
            if theme.on_system_preference_change(dark).is_none() {
                println!("Explicit theme saved; system preference ignored");
            }
        }
    }

    let (name, value) = theme.attribute();
    println!("{}={}", name, value);
    println!("{}", theme.toggle_title());
    Ok(())
}
