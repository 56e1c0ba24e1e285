use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use handy_cache::{
    CacheClient, CacheConfig, CacheStore, DEFAULT_RETAINED, Identity, Lookup, MemoryStore, Outcome,
    StoreInfo,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "handy-cache")]
#[command(about = "handy-cache CLI - inspect and maintain a scoped Redis cache", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Store host (overrides config)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Store port (overrides config)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Act on behalf of this user (keys are scoped to `user_<name>_`)
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Use an in-process store instead of Redis
    #[arg(long)]
    memory: bool,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

struct Shell<S: CacheStore> {
    client: CacheClient<S>,
    identity: Identity,
}

impl<S: CacheStore> Shell<S> {
    fn new(client: CacheClient<S>, user: Option<String>) -> Self {
        Self {
            client,
            identity: Identity { username: user },
        }
    }

    async fn execute_command(&mut self, command: &str, args: &[String]) -> Result<String> {
        let start = Instant::now();

        let response = match command.to_uppercase().as_str() {
            "GET" => self.cmd_get(args).await?,
            "SET" => self.cmd_set(args).await?,
            "TTL" => self.cmd_ttl(args).await?,
            "EXISTS" => self.cmd_exists(args).await?,
            "DEL" | "DELETE" => self.cmd_del(args, false).await?,
            "DELPREFIX" => self.cmd_del(args, true).await?,
            "KEYS" | "SCAN" => self.cmd_keys(args).await?,
            "PRUNE" => self.cmd_prune(args).await?,
            "KEEP" => self.cmd_keep(args).await?,
            "FLUSHDB" => self.cmd_flushdb().await?,
            "INFO" => self.cmd_info(args).await?,
            "PING" => self.cmd_ping().await?,
            "USER" => self.cmd_user(args),
            "HELP" => self.help_text(),
            _ => return Err(anyhow::anyhow!("Unknown command: {}", command)),
        };

        let elapsed = start.elapsed();
        Ok(format!(
            "{}\n{}",
            response,
            format!("({:.2?})", elapsed).dimmed()
        ))
    }

    async fn cmd_get(&self, args: &[String]) -> Result<String> {
        let key = args.first().context("Usage: GET key")?;

        match self.client.get::<serde_json::Value>(&self.identity, key).await {
            Lookup::Hit(value) => Ok(serde_json::to_string_pretty(&value)?),
            Lookup::Miss => Ok("(nil)".dimmed().to_string()),
            Lookup::Degraded(reason) => Ok(format!(
                "{} {}",
                "(nil)".dimmed(),
                format!("[{}]", reason).yellow()
            )),
        }
    }

    async fn cmd_set(&self, args: &[String]) -> Result<String> {
        if args.len() < 2 {
            return Err(anyhow::anyhow!("Usage: SET key value [ttl]"));
        }

        let value = parse_value(&args[1]);
        let outcome = match args.get(2) {
            Some(ttl) => {
                let ttl = ttl
                    .parse::<u64>()
                    .with_context(|| format!("invalid ttl '{}'", ttl))?;
                self.client
                    .set_with_ttl(&self.identity, &args[0], &value, ttl)
                    .await
            }
            None => self.client.set(&self.identity, &args[0], &value).await,
        };

        settle(outcome)?;
        Ok("OK".green().to_string())
    }

    async fn cmd_ttl(&self, args: &[String]) -> Result<String> {
        let key = args.first().context("Usage: TTL key")?;

        match self.client.get_ttl(&self.identity, key).await {
            Lookup::Hit(ttl) => Ok(format!("(integer) {}", ttl.as_secs())),
            Lookup::Miss => Ok("(nil)".dimmed().to_string()),
            Lookup::Degraded(reason) => Err(reason.into()),
        }
    }

    async fn cmd_exists(&self, args: &[String]) -> Result<String> {
        let key = args.first().context("Usage: EXISTS key")?;

        let effective = self.client.effective_key(&self.identity, key);
        let exists = settle(self.client.exists(&effective).await)?;
        Ok(format!("(integer) {}", if exists { 1 } else { 0 }))
    }

    async fn cmd_del(&self, args: &[String], recursive: bool) -> Result<String> {
        let usage = if recursive {
            "Usage: DELPREFIX prefix"
        } else {
            "Usage: DEL key [key ...]"
        };
        if args.is_empty() {
            return Err(anyhow::anyhow!(usage));
        }

        let mut deleted = 0;
        for key in args {
            deleted += settle(
                self.client
                    .delete_keys(&self.identity, key, recursive)
                    .await,
            )?;
        }
        Ok(format!("(integer) {}", deleted))
    }

    async fn cmd_keys(&self, args: &[String]) -> Result<String> {
        let pattern = args.first().map(String::as_str).unwrap_or("*");

        let mut keys = self.client.scanner(pattern).collect_all().await?;
        if keys.is_empty() {
            return Ok("(empty list or set)".dimmed().to_string());
        }

        keys.sort();
        Ok(keys
            .iter()
            .enumerate()
            .map(|(i, key)| format!("{}) \"{}\"", i + 1, key))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn cmd_prune(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: PRUNE prefix [prefix ...]"));
        }

        let deleted = settle(self.client.delete_without_prefixes(args).await)?;
        Ok(format!("(integer) {}", deleted))
    }

    async fn cmd_keep(&self, args: &[String]) -> Result<String> {
        let keep = args.first().map_or(DEFAULT_RETAINED, String::as_str);

        let deleted = settle(self.client.delete_all_except(keep).await)?;
        Ok(format!("(integer) {}", deleted))
    }

    async fn cmd_flushdb(&self) -> Result<String> {
        settle(self.client.flush().await)?;
        Ok("OK".green().to_string())
    }

    async fn cmd_info(&self, args: &[String]) -> Result<String> {
        let info = settle(self.client.info().await)?;
        Ok(match args.first() {
            Some(section) => {
                let fields = info
                    .section(section)
                    .with_context(|| format!("no such section: {}", section))?;
                format_section(section, fields)
            }
            None => format_info(&info),
        })
    }

    async fn cmd_ping(&self) -> Result<String> {
        settle(self.client.ping().await)?;
        Ok("PONG".green().to_string())
    }

    fn cmd_user(&mut self, args: &[String]) -> String {
        self.identity = Identity {
            username: args.first().cloned(),
        };
        match self.identity.username() {
            Some(name) => format!("Acting as {}", name.bold()),
            None => "Acting anonymously".to_string(),
        }
    }

    fn prompt(&self, target: &str) -> String {
        let who = self.identity.username().unwrap_or("-");
        format!("{}> ", format!("handy-cache {} ({})", target, who).green())
    }

    fn help_text(&self) -> String {
        format!(
            r#"{}

{}
  GET key                    Get the cached value of key
  SET key value [ttl]        Cache a JSON value (plain text otherwise), default TTL 6h
  TTL key                    Remaining time to live in seconds
  EXISTS key                 Check if key exists

{}
  DEL key [key ...]          Delete keys
  DELPREFIX prefix           Delete every key starting with prefix
  PRUNE prefix [prefix ...]  Delete every key not starting with one of the prefixes
  KEEP [substring]           Delete every key not containing substring (default PHPREDIS_SESSION)
  FLUSHDB                    Remove all keys from database

{}
  KEYS [pattern]             Scan keys matching a glob pattern
  INFO [section]             Store status report
  PING                       Ping the store

{}
  USER [name]                Act as user (no name: anonymous)
  HELP                       Show this help message
  QUIT                       Exit the CLI

Keys are scoped to user_<name>_ unless they contain _noUserData_.
DELPREFIX is scoped; KEYS, PRUNE and KEEP see raw store keys.
"#,
            "handy-cache CLI - Available Commands".bold().cyan(),
            "Entry Commands:".bold(),
            "Maintenance Commands:".bold(),
            "Store Commands:".bold(),
            "Session Commands:".bold(),
        )
    }
}

/// Turn a degraded outcome into an error for display
fn settle<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome {
        Outcome::Done(value) => Ok(value),
        Outcome::Degraded(reason) => Err(reason.into()),
    }
}

/// JSON when it parses, plain string otherwise
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn format_section(name: &str, fields: &std::collections::BTreeMap<String, String>) -> String {
    let mut out = format!("# {}", name).bold().to_string();
    for (field, value) in fields {
        out.push_str(&format!("\n{}:{}", field, value));
    }
    out
}

fn format_info(info: &StoreInfo) -> String {
    info.sections()
        .map(|(name, fields)| format_section(name, fields))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn load_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CacheConfig::default(),
    };
    config.apply_env_overrides()?;

    if let Some(host) = &args.host {
        config.store.host = host.clone();
    }
    if let Some(port) = args.port {
        config.store.port = port;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &CacheConfig) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config);

    let target = if args.memory {
        "memory".to_string()
    } else {
        format!("{}:{}", config.store.host, config.store.port)
    };

    if args.memory {
        let client = CacheClient::with_store(MemoryStore::new(), &config);
        run(Shell::new(client, args.user), args.command, &target).await
    } else {
        let client = CacheClient::connect(&config)?;
        run(Shell::new(client, args.user), args.command, &target).await
    }
}

async fn run<S: CacheStore>(mut shell: Shell<S>, command: Vec<String>, target: &str) -> Result<()> {
    if let Some((cmd, cmd_args)) = command.split_first() {
        // Command mode: execute single command and exit
        match shell.execute_command(cmd, cmd_args).await {
            Ok(output) => {
                info!("{}", output);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "{}", format!("Error: {}", e).red());
                std::process::exit(1);
            }
        }
    } else {
        run_interactive(shell, target).await
    }
}

async fn run_interactive<S: CacheStore>(mut shell: Shell<S>, target: &str) -> Result<()> {
    info!(
        "{}",
        format!("handy-cache CLI v{}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    if !shell.client.is_enabled() {
        info!("{}", "Cache is disabled: reads miss and writes are dropped".yellow());
    }
    info!("Store: {}", target);
    info!("Type {} for available commands\n", "HELP".bold());

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(&shell.prompt(target));

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                rl.add_history_entry(&line)?;

                let parts: Vec<String> = line.split_whitespace().map(String::from).collect();
                let Some((cmd, args)) = parts.split_first() else {
                    continue;
                };

                if cmd.eq_ignore_ascii_case("QUIT") || cmd.eq_ignore_ascii_case("EXIT") {
                    info!("Goodbye!");
                    break;
                }

                match shell.execute_command(cmd, args).await {
                    Ok(output) => info!("{}", output),
                    Err(e) => {
                        error!(error = %e, "{}", format!("Error: {}", e).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                info!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                info!("Goodbye!");
                break;
            }
            Err(err) => {
                error!(error = ?err, "Readline error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
