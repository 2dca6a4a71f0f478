use std::env;
use std::fmt;

use mentor_core::model::{BearerToken, Mentee, MenteeId, SessionDraft};
use mentor_core::time::local_offset;
use services::{AppServices, Clock, SchedulingError, SyncConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://mentor-sync.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidToken,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidToken => write!(f, "--token must not be blank"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  mentor-sync login --token <token> [--db <sqlite_url>]");
    eprintln!("  mentor-sync logout                [--db <sqlite_url>]");
    eprintln!("  mentor-sync mentees               [--db <sqlite_url>]");
    eprintln!("  mentor-sync check                 [--db <sqlite_url>]");
    eprintln!("  mentor-sync schedule --mentee <id> --title <text> --description <text>");
    eprintln!("                       [--date <YYYY-MM-DD>] [--time <HH:MM>] [--link <url>]");
    eprintln!("                       [--db <sqlite_url>]");
    eprintln!("  mentor-sync watch                 [--db <sqlite_url>]");
    eprintln!();
    eprintln!("schedule defaults to tomorrow at the next half hour after now + 1h.");
    eprintln!("With no subcommand, `watch` runs until interrupted.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MENTOR_DB_URL (default {DEFAULT_DB_URL}), MENTOR_API_URL,");
    eprintln!("  MENTOR_COMPLETION_POLL_SECS, MENTOR_MENTEE_POLL_SECS,");
    eprintln!("  MENTOR_CACHE_TTL_DAYS, MENTOR_HTTP_TIMEOUT_SECS, MENTOR_DEBUG_LOG, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Login,
    Logout,
    Mentees,
    Check,
    Schedule,
    Watch,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "mentees" => Some(Self::Mentees),
            "check" => Some(Self::Check),
            "schedule" => Some(Self::Schedule),
            "watch" => Some(Self::Watch),
            _ => None,
        }
    }
}

/// Scheduling fields given on the command line; anything left out keeps the
/// form default.
#[derive(Debug, Default)]
struct DraftFlags {
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    meeting_link: Option<String>,
}

impl DraftFlags {
    fn apply_to(self, mut draft: SessionDraft) -> SessionDraft {
        let fields = [
            (self.title, &mut draft.title),
            (self.description, &mut draft.description),
            (self.date, &mut draft.date),
            (self.time, &mut draft.time),
            (self.meeting_link, &mut draft.meeting_link),
        ];
        for (flag, field) in fields {
            if let Some(value) = flag {
                *field = value;
            }
        }
        draft
    }
}

struct Args {
    db_url: String,
    token: Option<String>,
    mentee: Option<String>,
    draft: DraftFlags,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: env::var("MENTOR_DB_URL")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            token: None,
            mentee: None,
            draft: DraftFlags::default(),
        };

        while let Some(arg) = args.next() {
            match (cmd, arg.as_str()) {
                (_, "--db") => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                (_, "--help" | "-h") => {
                    print_usage();
                    std::process::exit(0);
                }
                (Command::Login, "--token") => {
                    parsed.token = Some(require_value(args, "--token")?);
                }
                (Command::Schedule, "--mentee") => {
                    parsed.mentee = Some(require_value(args, "--mentee")?);
                }
                (Command::Schedule, "--title") => {
                    parsed.draft.title = Some(require_value(args, "--title")?);
                }
                (Command::Schedule, "--description") => {
                    parsed.draft.description = Some(require_value(args, "--description")?);
                }
                (Command::Schedule, "--date") => {
                    parsed.draft.date = Some(require_value(args, "--date")?);
                }
                (Command::Schedule, "--time") => {
                    parsed.draft.time = Some(require_value(args, "--time")?);
                }
                (Command::Schedule, "--link") => {
                    parsed.draft.meeting_link = Some(require_value(args, "--link")?);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        match cmd {
            Command::Login if parsed.token.is_none() => {
                Err(ArgsError::MissingFlag { flag: "--token" })
            }
            Command::Schedule if parsed.mentee.is_none() => {
                Err(ArgsError::MissingFlag { flag: "--mentee" })
            }
            _ => Ok(parsed),
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_logging() {
    let debug_enabled = env::var("MENTOR_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_mentees(mentees: &[Mentee]) {
    if mentees.is_empty() {
        println!("No mentees.");
        return;
    }
    for mentee in mentees {
        let next = mentee.next_session().map_or_else(
            || "-".to_string(),
            |next| {
                let mark = if next.completed { " (completed)" } else { "" };
                format!("{}{mark}", next.display)
            },
        );
        println!(
            "{id}\t{name}\t{done}/{total} ({progress}%)\tnext: {next}",
            id = mentee.id(),
            name = mentee.name(),
            done = mentee.sessions_completed(),
            total = mentee.total_sessions(),
            progress = mentee.progress(),
        );
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Watch,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Watch,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_logging();

    let config = SyncConfig::from_env()?;
    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, &config, Clock::default_clock(), local_offset())
            .await?;

    match cmd {
        Command::Login => {
            let token = parsed
                .token
                .as_deref()
                .and_then(BearerToken::new)
                .ok_or(ArgsError::InvalidToken)?;
            services.credentials().store_token(&token).await?;
            println!("Signed in.");
        }
        Command::Logout => {
            services.credentials().clear().await?;
            println!("Signed out.");
        }
        Command::Mentees => {
            let mentees = services.mentees().fetch().await?;
            print_mentees(&mentees);
        }
        Command::Check => {
            let counts = services.reconciler().check_completed_sessions().await;
            println!(
                "Server sweep: {} updated, {} failed.",
                counts.updated, counts.failed
            );
            let mentees = services.mentees();
            mentees.refresh().await;
            let report = mentees.check_cached_sessions().await;
            for id in &report.completed {
                println!("Marked completed: {id}");
            }
            for id in &report.failed {
                println!("Could not mark completed: {id}");
            }
            print_mentees(&mentees.snapshot().await);
        }
        Command::Schedule => {
            let mentee: MenteeId = parsed
                .mentee
                .unwrap_or_default()
                .parse()
                .map_err(mentor_core::Error::from)?;
            services.mentees().refresh().await;
            let scheduling = services.scheduling();
            let draft = parsed.draft.apply_to(scheduling.form_defaults());
            match scheduling.schedule_session(&mentee, &draft).await
            {
                Ok(scheduled) => {
                    println!(
                        "Scheduled {} for {} (session {}).",
                        scheduled.details.title, scheduled.display, scheduled.session_id
                    );
                }
                Err(SchedulingError::Validation(errors)) => {
                    for (field, message) in errors.iter() {
                        eprintln!("{}: {message}", field.as_str());
                    }
                    return Err(Box::new(SchedulingError::Validation(errors)));
                }
                Err(err) => {
                    eprintln!("{}", err.user_message());
                    return Err(Box::new(err));
                }
            }
        }
        Command::Watch => {
            let mentees = services.mentees().refresh().await;
            info!(count = mentees.len(), "Loaded mentees");
            let driver = services.start_polling();
            tokio::signal::ctrl_c().await?;
            info!("Shutting down pollers");
            driver.shutdown().await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: Command, args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(cmd, &mut iter)
    }

    #[test]
    fn schedule_flags_fill_the_draft() {
        let args = parse(
            Command::Schedule,
            &[
                "--mentee", "m1", "--title", "Intro", "--description", "Chat", "--date",
                "2030-01-02", "--time", "09:30", "--link", "https://meet.example.com",
            ],
        )
        .unwrap();
        assert_eq!(args.mentee.as_deref(), Some("m1"));
        let draft = args.draft.apply_to(SessionDraft::default());
        assert_eq!(draft.date, "2030-01-02");
        assert_eq!(draft.time, "09:30");
        assert_eq!(draft.meeting_link, "https://meet.example.com");
    }

    #[test]
    fn omitted_schedule_flags_keep_form_defaults() {
        let args = parse(
            Command::Schedule,
            &["--mentee", "m1", "--title", "Intro", "--description", "Chat"],
        )
        .unwrap();
        let defaults = SessionDraft {
            date: "2030-01-03".into(),
            time: "10:30".into(),
            ..SessionDraft::default()
        };

        let draft = args.draft.apply_to(defaults);

        assert_eq!(draft.title, "Intro");
        assert_eq!(draft.description, "Chat");
        assert_eq!(draft.date, "2030-01-03");
        assert_eq!(draft.time, "10:30");
        assert!(draft.meeting_link.is_empty());
    }

    #[test]
    fn command_specific_flags_are_rejected_elsewhere() {
        assert!(matches!(
            parse(Command::Mentees, &["--token", "abc"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(Command::Login, &[]),
            Err(ArgsError::MissingFlag { flag: "--token" })
        ));
        assert!(matches!(
            parse(Command::Schedule, &["--title"]),
            Err(ArgsError::MissingValue { flag: "--title" })
        ));
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(
            normalize_sqlite_url("sqlite://already.db".into()),
            "sqlite://already.db"
        );
        let normalized = normalize_sqlite_url("sqlite:/tmp/mentor.db".into());
        assert_eq!(normalized, "sqlite:///tmp/mentor.db");
    }
}
