mod commands;

use clap::{Parser, Subcommand};
use satchel_api::{CollectionKind, MarketplaceApi};
use satchel_core::{ExitCode, SatchelError, SatchelResult};
use satchel_fs::{WorkspacePaths, init_workspace, load_config, resolve_profile, resolve_workspace};
use satchel_store::SessionStore;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "satchel",
    version,
    about = "Workspace-first course collection CLI",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true)]
    profile: Option<String>,

    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init,
    Doctor,
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Courses saved for later.
    Wishlist {
        #[command(subcommand)]
        command: CollectionCommand,
    },
    /// Courses staged for checkout.
    Cart {
        #[command(subcommand)]
        command: CollectionCommand,
    },
    /// Courses the user is enrolled in.
    Enroll {
        #[command(subcommand)]
        command: CollectionCommand,
    },
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    List,
    Use {
        name: String,
    },
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        server: String,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    Login,
    Status,
    Logout,
}

#[derive(Debug, Subcommand)]
enum CollectionCommand {
    /// Fetch the collection from the server and display it.
    List {
        /// Render the persisted snapshot without contacting the server.
        #[arg(long)]
        cached: bool,
    },
    /// Ask the server to flip membership for a course.
    Toggle { course_id: String },
    /// Remove a course, confirming membership with the server first.
    Remove { course_id: String },
    /// Empty the whole collection server-side. Requires --yes.
    Clear,
    /// Flip the notification setting for a course's entry.
    Notify { course_id: String },
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    Show { course_id: String },
}

#[derive(Debug, Clone)]
struct GlobalOptions {
    profile: Option<String>,
    workspace: Option<PathBuf>,
    server: Option<String>,
    json: bool,
    yes: bool,
}

#[derive(Debug)]
struct AuthContext {
    paths: WorkspacePaths,
    profile: String,
    server: String,
    api: MarketplaceApi,
    sessions: SessionStore,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    workspace: String,
    created: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProfileChangedOutput {
    profile: String,
    server: String,
}

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.debug, cli.json, cli.no_color);

    let globals = GlobalOptions {
        profile: cli.profile,
        workspace: cli.workspace,
        server: cli.server,
        json: cli.json,
        yes: cli.yes,
    };

    let result = run_command(cli.command, &globals);

    let exit = match result {
        Ok(code) => code,
        Err(error) => {
            render_error(&error, globals.json);
            error.exit_code()
        }
    };

    std::process::exit(exit.as_i32());
}

fn configure_logging(debug: bool, json: bool, no_color: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_command(command: Command, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    match command {
        Command::Init => commands::profile::cmd_init(globals),
        Command::Doctor => commands::profile::cmd_doctor(globals),
        Command::Profile { command } => commands::profile::cmd_profile(command, globals),
        Command::Auth { command } => commands::auth::cmd_auth(command, globals),
        Command::Wishlist { command } => {
            commands::collection::cmd_collection(CollectionKind::Wishlist, command, globals)
        }
        Command::Cart { command } => {
            commands::collection::cmd_collection(CollectionKind::Cart, command, globals)
        }
        Command::Enroll { command } => {
            commands::collection::cmd_collection(CollectionKind::Enrollment, command, globals)
        }
        Command::Catalog { command } => commands::catalog::cmd_catalog(command, globals),
    }
}

fn with_auth_context<F>(globals: &GlobalOptions, run: F) -> SatchelResult<ExitCode>
where
    F: FnOnce(AuthContext) -> SatchelResult<ExitCode>,
{
    let target = workspace_target(globals)?;
    if !target.join(".satchel").is_dir() {
        init_workspace(Some(&target), globals.server.as_deref())?;
    }

    let paths = resolve_workspace(Some(&target))?;
    let config = load_config(&paths)?;
    let resolved = resolve_profile(
        &config,
        globals.profile.as_deref(),
        globals.server.as_deref(),
    )?;
    let api = MarketplaceApi::new(&resolved.server)?;
    let sessions = SessionStore::from_workspace(&paths)?;

    run(AuthContext {
        paths,
        profile: resolved.name,
        server: resolved.server,
        api,
        sessions,
    })
}

fn workspace_target(globals: &GlobalOptions) -> SatchelResult<PathBuf> {
    if let Some(path) = &globals.workspace {
        return absolutize(path);
    }

    std::env::current_dir().map_err(|err| {
        SatchelError::io(format!(
            "failed to resolve current directory for default workspace: {err}"
        ))
    })
}

fn absolutize(path: &Path) -> SatchelResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().map_err(|err| {
        SatchelError::io(format!(
            "failed to resolve current directory for path: {err}"
        ))
    })?;

    Ok(cwd.join(path))
}

fn render_error(error: &SatchelError, json_output: bool) {
    if json_output {
        let payload = json!({
            "ok": false,
            "error": {
                "kind": error.kind,
                "message": &error.message,
            }
        });
        let serialized = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"ok\":false,\"error\":{\"kind\":\"io\",\"message\":\"failed to serialize error\"}}".to_string()
        });
        eprintln!("{serialized}");
    } else {
        eprintln!("error: {}", error.message);
    }
}

fn print_json<T: Serialize>(value: &T) -> SatchelResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| SatchelError::io(format!("failed to render JSON output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
