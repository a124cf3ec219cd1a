use std::env;
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use config::{Config, Environment, File, FileFormat};
use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use swimdesk::api::{self, AppState};
use swimdesk::auth::{self, AuthConfig, password::REPAIR_MIN_COST};
use swimdesk::db::Database;
use swimdesk::repair::{RecordOutcome, RepairJob, RepairReport};
use swimdesk::user::{CreateUserRequest, UserInfo, UserListQuery, UserRepository, UserRole, UserService};

const APP_NAME: &str = "swimdesk";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Serve(cmd) => run_async(handle_serve(&ctx, cmd)),
        Command::RepairPasswords(cmd) => run_async(handle_repair_passwords(&ctx, cmd)),
        Command::Users { command } => run_async(handle_users(&ctx, command)),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

fn run_async<F>(fut: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(fut)
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Swimdesk - swim school management server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    /// Output machine readable YAML
    #[arg(long, global = true)]
    yaml: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Do not change anything on disk or in the database
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
    /// Assume "yes" for interactive prompts
    #[arg(short = 'y', long = "yes", alias = "force", global = true)]
    assume_yes: bool,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Hash plaintext passwords left in the user table
    RepairPasswords(RepairPasswordsCommand),
    /// Manage user accounts
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct RepairPasswordsCommand {
    /// Role whose accounts are repaired
    #[arg(long, default_value = "INSTRUCTOR")]
    role: UserRole,
}

#[derive(Debug, Subcommand)]
enum UsersCommand {
    /// Create a user account
    Create(UsersCreateCommand),
    /// List user accounts
    List(UsersListCommand),
}

#[derive(Debug, Clone, Args)]
struct UsersCreateCommand {
    /// Login email
    #[arg(long)]
    email: String,
    /// Initial password
    #[arg(long, env = "SWIMDESK_USER_PASSWORD", hide_env_values = true)]
    password: String,
    /// Role of the new account
    #[arg(long, default_value = "PARENT")]
    role: UserRole,
    /// Organization the account belongs to
    #[arg(long)]
    organization: Option<String>,
    /// Display name (defaults to the email)
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct UsersListCommand {
    /// Filter by role
    #[arg(long)]
    role: Option<UserRole>,
    /// Filter by organization
    #[arg(long)]
    organization: Option<String>,
    /// Maximum number of users to list
    #[arg(short, long, default_value = "100")]
    limit: i64,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let mut paths = AppPaths::discover(common.config.clone())?;
        let config = load_or_init_config(&mut paths, &common)?;
        let paths = paths.apply_overrides(&config)?;
        let ctx = Self {
            common,
            paths,
            config,
        };
        ctx.ensure_directories()?;
        Ok(ctx)
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("swimdesk={level},tower_http={level}")));

        // Logs go to stderr so --json/--yaml output on stdout stays parseable.
        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }

        // Also init env_logger for compatibility with log crate users
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.config.logging.level.as_str()),
        );
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Info),
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn ensure_directories(&self) -> Result<()> {
        if self.common.dry_run {
            info!(
                "dry-run: would ensure data dir {}",
                self.paths.data_dir.display()
            );
            return Ok(());
        }

        fs::create_dir_all(&self.paths.data_dir).with_context(|| {
            format!("creating data directory {}", self.paths.data_dir.display())
        })?;
        Ok(())
    }

    fn database_path(&self) -> Result<PathBuf> {
        match self.config.database.path {
            Some(ref path) => expand_str_path(path),
            None => Ok(self.paths.data_dir.join("swimdesk.db")),
        }
    }

    async fn open_database(&self) -> Result<Database> {
        let db_path = self.database_path()?;
        info!("Database path: {}", db_path.display());
        Database::new(&db_path)
            .await
            .with_context(|| format!("opening database {}", db_path.display()))
    }
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!("invalid config file path: {config_file:?}"));
        }

        Ok(Self {
            config_file,
            data_dir: default_data_dir()?,
        })
    }

    fn apply_overrides(mut self, cfg: &AppConfig) -> Result<Self> {
        if let Some(ref data_override) = cfg.paths.data_dir {
            self.data_dir = expand_str_path(data_override)?;
        }
        Ok(self)
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}",
            self.config_file.display(),
            self.data_dir.display()
        )
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    logging: LoggingConfig,
    paths: PathsConfig,
    server: ServerConfig,
    database: DatabaseConfig,
    auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PathsConfig {
    data_dir: Option<String>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration. Without a path the database lives in the data dir.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DatabaseConfig {
    path: Option<String>,
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }

    if ctx.common.dry_run {
        info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }

    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let mut shown = ctx.config.clone();
            if shown.auth.jwt_secret.is_some() {
                shown.auth.jwt_secret = Some("<redacted>".to_string());
            }
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&shown).context("serializing config to JSON")?
                );
            } else if ctx.common.yaml {
                println!(
                    "{}",
                    serde_yaml::to_string(&shown).context("serializing config to YAML")?
                );
            } else {
                println!("{:#?}", shown);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting swimdesk server...");

    let auth_config = ctx.config.auth.clone();
    auth_config
        .validate()
        .context("Invalid auth configuration")?;
    info!(
        "Auth mode: {}",
        if auth_config.dev_mode {
            "development"
        } else {
            "production"
        }
    );
    let auth_state = auth::AuthState::new(auth_config)?;

    let database = ctx.open_database().await?;
    let users = UserService::new(
        UserRepository::new(database.pool().clone()),
        *auth_state.hasher(),
    );
    let app = api::create_router(AppState::new(users, auth_state));

    let host = cmd.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("parsing listen address {host}:{port}"))?;
    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server");

    database.close().await;
    info!("Shutdown complete");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

async fn handle_repair_passwords(ctx: &RuntimeContext, cmd: RepairPasswordsCommand) -> Result<()> {
    let hasher = ctx
        .config
        .auth
        .password_hasher()
        .context("Invalid auth configuration")?
        .with_min_cost(REPAIR_MIN_COST);

    let database = ctx.open_database().await?;
    let repo = UserRepository::new(database.pool().clone());

    info!(
        "Repairing {} passwords (cost {}{})",
        cmd.role,
        hasher.cost(),
        if ctx.common.dry_run { ", dry run" } else { "" }
    );
    let result = RepairJob::new(&repo, hasher)
        .dry_run(ctx.common.dry_run)
        .run(cmd.role)
        .await;

    database.close().await;

    let report = result.context("password repair aborted")?;
    print_repair_report(ctx, &report)
}

fn print_repair_report(ctx: &RuntimeContext, report: &RepairReport) -> Result<()> {
    if ctx.common.json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("serializing report to JSON")?
        );
        return Ok(());
    }
    if ctx.common.yaml {
        println!(
            "{}",
            serde_yaml::to_string(report).context("serializing report to YAML")?
        );
        return Ok(());
    }

    let summary = &report.summary;
    if summary.matched == 0 {
        println!("No {} accounts found.", report.role);
        return Ok(());
    }

    for record in &report.records {
        if let RecordOutcome::Failed { error } = &record.outcome {
            println!("failed  {} ({}): {}", record.email, record.user_id, error);
        }
    }

    let verb = if report.dry_run { "would change" } else { "changed" };
    println!(
        "{} {} account(s): {} {} (rehashed {}, unwrapped {}), skipped {}, failed {}",
        summary.matched,
        report.role,
        verb,
        report.changed(),
        summary.rehashed,
        summary.unwrapped,
        summary.skipped,
        summary.failed
    );
    Ok(())
}

async fn handle_users(ctx: &RuntimeContext, command: UsersCommand) -> Result<()> {
    let hasher = ctx
        .config
        .auth
        .password_hasher()
        .context("Invalid auth configuration")?;
    let database = ctx.open_database().await?;
    let service = UserService::new(UserRepository::new(database.pool().clone()), hasher);

    let result = match command {
        UsersCommand::Create(cmd) => create_user(ctx, &service, cmd).await,
        UsersCommand::List(cmd) => list_users(ctx, &service, cmd).await,
    };

    database.close().await;
    result
}

async fn create_user(
    ctx: &RuntimeContext,
    service: &UserService,
    cmd: UsersCreateCommand,
) -> Result<()> {
    if ctx.common.dry_run {
        info!("dry-run: would create {} account {}", cmd.role, cmd.email);
        return Ok(());
    }

    let user = service
        .create_user(CreateUserRequest {
            email: cmd.email,
            password: cmd.password,
            display_name: cmd.name,
            role: Some(cmd.role),
            organization_id: cmd.organization,
        })
        .await?;

    let info = UserInfo::from(user);
    if ctx.common.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else if ctx.common.yaml {
        println!("{}", serde_yaml::to_string(&info)?);
    } else {
        println!("Created {} {} ({})", info.role, info.email, info.id);
    }
    Ok(())
}

async fn list_users(ctx: &RuntimeContext, service: &UserService, cmd: UsersListCommand) -> Result<()> {
    let users: Vec<UserInfo> = service
        .list_users(UserListQuery {
            role: cmd.role,
            organization_id: cmd.organization,
            limit: Some(cmd.limit),
            ..Default::default()
        })
        .await?
        .into_iter()
        .map(UserInfo::from)
        .collect();

    if ctx.common.json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else if ctx.common.yaml {
        println!("{}", serde_yaml::to_string(&users)?);
    } else if users.is_empty() {
        println!("No users found.");
    } else {
        for user in &users {
            println!(
                "{:<20} {:<11} {:<14} {}{}",
                user.id,
                user.role,
                user.organization_id.as_deref().unwrap_or("-"),
                user.email,
                if user.is_active { "" } else { " (inactive)" }
            );
        }
    }
    Ok(())
}

fn load_or_init_config(paths: &mut AppPaths, common: &CommonOpts) -> Result<AppConfig> {
    if !paths.config_file.exists() {
        if common.dry_run {
            info!(
                "dry-run: would create default config at {}",
                paths.config_file.display()
            );
        } else {
            write_default_config(&paths.config_file)?;
        }
    }

    let built = Config::builder()
        .set_default("logging.level", "info")?
        .add_source(
            File::from(paths.config_file.as_path())
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(&env_prefix()).separator("__"))
        .build()?;

    let config: AppConfig = built.try_deserialize()?;
    Ok(config)
}

/// Write the default config with a freshly generated JWT secret.
fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some(AuthConfig::generate_jwt_secret());

    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    format!(
        "# Configuration for {APP_NAME}\n# File: {}\n# Every key can be overridden with {}__SECTION__KEY.\n\n",
        path.display(),
        env_prefix()
    )
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = dirs::data_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("share").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine data directory"))
}

fn env_prefix() -> String {
    APP_NAME.to_ascii_uppercase()
}
