use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use cvisionary_core::auth::{SessionContext, SessionState};
use cvisionary_core::routes::{landing_view, nav_links, resolve, Resolution, View};
use cvisionary_core::{ApiClient, Config, Role};

/// Environment variables that pre-fill credentials (e.g. from `.env`)
const ENV_EMAIL: &str = "CVISIONARY_EMAIL";
const ENV_PASSWORD: &str = "CVISIONARY_PASSWORD";

/// Maximum length for the email prompt
const MAX_EMAIL_LENGTH: usize = 254;

// ============================================================================
// Prompts
// ============================================================================

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (true, Some(last)) => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

fn resolve_email(explicit: Option<String>, config: &Config) -> Result<String> {
    let email = match explicit.or_else(|| std::env::var(ENV_EMAIL).ok()) {
        Some(email) => email.trim().to_string(),
        None => prompt_email(config.last_identity.as_deref())?,
    };
    validate_email(&email)?;
    Ok(email)
}

fn resolve_password() -> Result<String> {
    match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => rpassword::prompt_password("Password: ").context("Failed to read password"),
    }
}

/// Reject input the backend would refuse anyway, before a round trip.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_control) {
        anyhow::bail!("Email is not valid");
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

/// Log in; returns the identity that logged in.
pub async fn login(context: &SessionContext, config: &Config, email: Option<String>, role: Role) -> Result<String> {
    let email = resolve_email(email, config)?;
    let password = resolve_password()?;
    if password.is_empty() {
        anyhow::bail!("Email and password required");
    }

    eprintln!("Logging in...");
    let session = context.login(&email, &password, role).await?;

    println!("Login successful! Logged in as {} ({}).", session.identity(), session.role().display_name());
    println!("Dashboard: {}", landing_view(session.role()));
    Ok(session.identity().to_string())
}

pub async fn signup(context: &SessionContext, config: &Config, email: Option<String>, role: Role) -> Result<()> {
    let email = resolve_email(email, config)?;
    let password = resolve_password()?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    let confirmation = context.signup(&email, &password, role).await?;
    println!("{}", confirmation);
    println!("Log in with: cvisionary login --email {} --role {}", email, role);
    Ok(())
}

pub fn logout(context: &SessionContext) {
    let was_authenticated = context.is_authenticated();
    context.logout();
    if was_authenticated {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
}

pub fn status(context: &SessionContext) {
    println!("{}", describe_state(&context.state()));
}

pub fn describe_state(state: &SessionState) -> String {
    match state.session() {
        None => "Not logged in.".to_string(),
        Some(session) => {
            let mut line = format!(
                "Logged in as {} ({})",
                session.identity(),
                session.role().display_name()
            );
            if let Some(minutes) = session.minutes_until_expiry(Utc::now()) {
                line.push_str(&format!(", token expires in {}m", minutes));
            }
            line
        }
    }
}

pub fn open(context: &SessionContext, view: &str) -> Result<()> {
    let view: View = view.parse()?;
    println!("{}", describe_resolution(resolve(&context.state(), view)));
    Ok(())
}

pub fn describe_resolution(resolution: Resolution) -> String {
    match resolution {
        Resolution::Render(view) => format!("{} -> {} (allowed)", view, view.title()),
        Resolution::Login { after_login } => {
            format!("{} -> {} (log in first, then continue to {})", after_login, View::Login, after_login)
        }
        Resolution::AccessDenied { requested } => format!(
            "{} -> {}: you do not have permission to view this page with your current account",
            requested,
            View::AccessDenied.title()
        ),
    }
}

pub fn nav(context: &SessionContext) {
    for view in nav_links(&context.state()) {
        println!("{:<24} {}", view.path(), view.title());
    }
}

pub async fn resumes(context: &SessionContext, api: &ApiClient) -> Result<()> {
    let resolution = resolve(&context.state(), View::Recruiter);
    if !matches!(resolution, Resolution::Render(_)) {
        anyhow::bail!(describe_resolution(resolution));
    }

    let resumes = api.list_resumes().await.context("Failed to fetch resumes")?;
    if resumes.is_empty() {
        println!("No resumes analysed yet.");
        return Ok(());
    }
    println!("{:>5}  {:<32} {:>7}  {}", "ID", "Student", "Score", "Matched skills");
    for resume in &resumes {
        println!(
            "{:>5}  {:<32} {:>7.1}  {}",
            resume.id,
            resume.student_email,
            resume.ats_score,
            resume.matched_skill_list().join(", ")
        );
    }
    Ok(())
}

/// Record the last identity in the config file, without the environment
/// overrides that were applied for this run.
pub fn remember_identity(config_path: Option<&Path>, identity: &str) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&path)?;
    config.last_identity = Some(identity.to_string());
    config.save_to(&path)
}
