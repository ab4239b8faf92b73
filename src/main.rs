use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use smart_gid::backend::{GoatRepository, HttpGoatRepository, InMemoryGoatRepository, NameSuggester};
use smart_gid::console::{parse_birth_date, parse_health_tags, say, RegistrationSession};
use smart_gid::device::mock::{MockCameraDevice, MockSensorDevice};
use smart_gid::device::{DeviceLink, ImagePayload, LinkTimings, SensorReading};
use smart_gid::draft::{Gender, GoatAttributes, RegistrationDraftStore};
use smart_gid::events::EventBus;
use smart_gid::wizard::{WizardController, WizardSettings};
use smart_gid::SmartGidConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "smart-gid")]
#[command(about = "Goat registration station for the Smart G-ID sensor and camera")]
#[command(version)]
#[command(long_about = "Registers goats by reading their RFID tag, weight and height from the \
sensor station, photographing them with the camera station and saving the record to the \
Smart G-ID registry.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "smart-gid.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a goat
    Register(RegisterArgs),
    /// Continue the registration saved at wizard.draft_path
    Resume {
        /// Use scripted devices and an in-memory registry
        #[arg(long)]
        simulate: bool,
    },
    /// Inspect or remove registered goats
    Goat {
        #[command(subcommand)]
        command: GoatCommand,
    },
}

#[derive(clap::Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    name: Option<String>,
    /// Male or Female
    #[arg(long)]
    gender: Option<Gender>,
    #[arg(long)]
    breed: Option<String>,
    /// YYYY-MM-DD
    #[arg(long, value_parser = parse_birth_date)]
    birth_date: Option<chrono::NaiveDate>,
    /// Comma-separated health tags
    #[arg(long)]
    health: Option<String>,
    /// Owner id, overrides wizard.owner_id
    #[arg(long)]
    owner: Option<String>,
    /// Use scripted devices and an in-memory registry
    #[arg(long)]
    simulate: bool,
}

#[derive(Subcommand, Debug)]
enum GoatCommand {
    Get { id: String },
    Delete { id: String },
    /// Goats of an owner, defaults to wizard.owner_id
    List { owner: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting Smart G-ID v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match SmartGidConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e).context("loading configuration");
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate().context("invalid configuration")?;

    match args.command {
        Some(Command::Register(register)) => run_register(config, register).await,
        Some(Command::Resume { simulate }) => run_resume(config, simulate).await,
        Some(Command::Goat { command }) => run_goat(config, command).await,
        None => {
            eprintln!("Nothing to do, try `smart-gid register` or `smart-gid --help`");
            Ok(())
        }
    }
}

async fn run_register(mut config: SmartGidConfig, args: RegisterArgs) -> Result<()> {
    if let Some(owner) = &args.owner {
        config.wizard.owner_id = owner.clone();
    }
    if config.wizard.owner_id.trim().is_empty() {
        bail!("an owner id is required: pass --owner or set wizard.owner_id");
    }

    let mut store = RegistrationDraftStore::new(&config.wizard.owner_id, config.camera.shot_count);
    if let Some(path) = &config.wizard.draft_path {
        if path.exists() {
            bail!(
                "an unfinished registration is saved at {}; run `smart-gid resume` or delete the file",
                path.display()
            );
        }
        store = store.with_checkpoint(path);
    }

    let preset = GoatAttributes {
        name: args.name.unwrap_or_default(),
        gender: args.gender,
        breed: args.breed.unwrap_or_default(),
        birth_date: args.birth_date,
        health_status: args.health.as_deref().map(parse_health_tags).unwrap_or_default(),
    };

    let (link, repository) = connect(&config, args.simulate)?;
    let wizard = WizardController::new(
        link,
        repository,
        store,
        EventBus::new(config.system.event_bus_capacity),
        WizardSettings::from_config(&config),
    );
    drive(config, wizard, preset, args.simulate).await
}

async fn run_resume(config: SmartGidConfig, simulate: bool) -> Result<()> {
    let Some(path) = &config.wizard.draft_path else {
        bail!("wizard.draft_path is not configured, there is nothing to resume");
    };
    let Some(mut store) = RegistrationDraftStore::load(path, config.camera.shot_count)
        .await
        .context("reading the saved registration")?
    else {
        bail!("no unfinished registration at {}", path.display());
    };
    if !config.wizard.owner_id.is_empty() && store.draft().owner_id.is_empty() {
        store.set_owner(&config.wizard.owner_id);
    }

    let (link, repository) = connect(&config, simulate)?;
    let wizard = WizardController::resume(
        link,
        repository,
        store,
        EventBus::new(config.system.event_bus_capacity),
        WizardSettings::from_config(&config),
    );
    drive(config, wizard, GoatAttributes::default(), simulate).await
}

async fn drive(
    config: SmartGidConfig,
    wizard: WizardController,
    preset: GoatAttributes,
    simulate: bool,
) -> Result<()> {
    let session_token = wizard.session_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, aborting registration");
            session_token.cancel();
        }
    });

    let mut session = RegistrationSession::new(wizard, preset);
    if !simulate {
        let client = reqwest::Client::builder()
            .timeout(config.backend.request_timeout())
            .build()
            .context("building HTTP client")?;
        session = session.with_name_suggestions(NameSuggester::new(
            client,
            &config.backend.name_suggestion_url,
        ));
    }

    match session.run().await {
        Ok(Some(record)) => {
            info!("Registration finished, record {}", record.id);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            error!("Registration failed: {}", e);
            say(&e.user_message());
            Err(e.into())
        }
    }
}

fn connect(
    config: &SmartGidConfig,
    simulate: bool,
) -> Result<(DeviceLink, Arc<dyn GoatRepository>)> {
    if simulate {
        info!("Using simulated devices and an in-memory registry");
        return Ok((simulated_link(config)?, Arc::new(InMemoryGoatRepository::new())));
    }

    let link = DeviceLink::connect(&config.sensor, &config.camera)?;
    let repository = HttpGoatRepository::from_config(&config.backend)?;
    Ok((link, Arc::new(repository)))
}

fn simulated_link(config: &SmartGidConfig) -> Result<DeviceLink> {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let reading = SensorReading {
        tag_id: format!("SIM-{}", &tag[..8].to_uppercase()),
        weight_kg: 41.7,
        height_cm: 68.0,
    };
    let sensor = MockSensorDevice::ready_after(3, reading).with_latency(Duration::from_millis(150));

    // 1x1 transparent GIF
    let image = ImagePayload::new("R0lGODlhAQABAAAAACwAAAAAAQABAAA=")
        .context("simulated image payload")?;
    let camera = MockCameraDevice::new(image).with_latency(Duration::from_millis(400));
    camera.push_error("simulated flash failure");

    Ok(DeviceLink::new(
        Arc::new(sensor),
        Arc::new(camera),
        LinkTimings::from_config(&config.sensor, &config.camera),
    ))
}

async fn run_goat(config: SmartGidConfig, command: GoatCommand) -> Result<()> {
    let repository = HttpGoatRepository::from_config(&config.backend)?;
    match command {
        GoatCommand::Get { id } => {
            let record = repository.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        GoatCommand::Delete { id } => {
            repository.delete(&id).await?;
            println!("Deleted goat {}", id);
        }
        GoatCommand::List { owner } => {
            let owner = owner.unwrap_or(config.wizard.owner_id);
            if owner.is_empty() {
                bail!("an owner id is required: pass one or set wizard.owner_id");
            }
            let goats = repository.list_for_owner(&owner).await?;
            for goat in &goats {
                println!(
                    "{}  {:<16} {:<8} {:<14} {}",
                    goat.id,
                    goat.name,
                    goat.gender,
                    goat.breed,
                    goat.rfid_tag.as_deref().unwrap_or("-")
                );
            }
            println!("{} goats", goats.len());
        }
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("smart_gid={}", log_level)));

    // stdout belongs to the operator console
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "smart-gid.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# Smart G-ID Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every value can be overridden with SMARTGID_<SECTION>__<KEY> environment variables");
    println!();

    let default_config = r#"[sensor]
# Sensor station (RFID reader, scale, height sensor)
address = "http://192.168.1.106"
# Time between polls of /get-data
poll_interval_ms = 1000
# Timeout of a single poll
request_timeout_ms = 2000
# Give up scanning after this many seconds
deadline_seconds = 20

[camera]
# Camera station
address = "http://10.15.33.35"
# Timeout of a single /capture request
request_timeout_ms = 10000
# Photos per goat
shot_count = 4
# Pause after each photo so the goat can be turned
reposition_ms = 1500
# Wait before retrying a failed photo
retry_backoff_ms = 2000
# Attempts per photo before giving up, 0 retries forever
max_attempts_per_shot = 5

[backend]
# Smart G-ID registry
base_url = "http://10.10.108.187:5000"
request_timeout_ms = 15000
# Random name suggestions for the details form
name_suggestion_url = "https://randomuser.me/api/?inc=name&nat=us,gb"

[wizard]
# Owner of registered goats
owner_id = ""
# Seconds the completion screen stays up
complete_countdown_seconds = 10
# Save the unfinished registration here so it can be resumed (optional)
# draft_path = "./smart-gid-draft.json"

[system]
# Event bus capacity
event_bus_capacity = 100
"#;

    println!("{}", default_config);
}
