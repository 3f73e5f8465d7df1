use clap::{Parser, Subcommand};
use montylite::cli::{self as prog_cli, Command, OutputMode};
use montylite::{MontyClient, MontyConfig};
use std::path::PathBuf;

fn find_config_path(cli_cfg: Option<PathBuf>) -> Option<PathBuf> {
    // Precedence: CLI > env > ./montylite.toml > ~/.config/montylite.toml
    if cli_cfg.is_some() {
        return cli_cfg;
    }
    if let Ok(p) = std::env::var("MONTYLITE_CONFIG") {
        return Some(PathBuf::from(p));
    }
    let mut paths: Vec<PathBuf> = vec![];
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("montylite.toml"));
    }
    if let Ok(home) = std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME")) {
        paths.push(PathBuf::from(home).join(".config").join("montylite.toml"));
    }
    paths.into_iter().find(|p| p.exists())
}

#[derive(Parser, Debug)]
#[command(name = "montylite", version, about = "MontyLite document database CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, defaults are used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Flat-file repository directory. Takes precedence over config/env.")]
    repository: Option<PathBuf>,
    #[arg(long, default_value = "test", help = "Database name")]
    db: String,
    #[arg(long, help = "Pretty-print JSON output")]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "List collections in the database")]
    Collections,
    #[command(about = "Drop a collection")]
    Drop { collection: String },
    #[command(about = "Insert one JSON object or an array of objects")]
    Insert {
        collection: String,
        #[arg(help = "Extended JSON document(s); '-' reads stdin")]
        json: String,
        #[arg(long, help = "Keep inserting after a failure")]
        unordered: bool,
    },
    #[command(about = "Query documents")]
    Find {
        collection: String,
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long)]
        projection: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: u64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        limit: i64,
        #[arg(long)]
        max_time_ms: Option<u64>,
    },
    #[command(about = "Count matching documents")]
    Count {
        collection: String,
        #[arg(long, default_value = "{}")]
        filter: String,
    },
    #[command(about = "Distinct values of a field")]
    Distinct {
        collection: String,
        key: String,
        #[arg(long, default_value = "{}")]
        filter: String,
    },
    #[command(about = "Apply an update document")]
    Update {
        collection: String,
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long)]
        update: String,
        #[arg(long, help = "Update every matching document")]
        many: bool,
        #[arg(long)]
        upsert: bool,
        #[arg(long, help = "JSON array of array filters")]
        array_filters: Option<String>,
    },
    #[command(about = "Delete matching documents")]
    Delete {
        collection: String,
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long, help = "Delete every matching document")]
        many: bool,
    },
    #[command(about = "Print telemetry counters")]
    Metrics,
}

fn read_payload(json: String) -> Result<String, montylite::DbError> {
    if json != "-" {
        return Ok(json);
    }
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn to_command(cmd: Commands) -> Result<Command, montylite::DbError> {
    Ok(match cmd {
        Commands::Collections => Command::Collections,
        Commands::Drop { collection } => Command::Drop { collection },
        Commands::Insert { collection, json, unordered } => {
            Command::Insert { collection, docs_json: read_payload(json)?, ordered: !unordered }
        }
        Commands::Find { collection, filter, projection, sort, skip, limit, max_time_ms } => {
            Command::Find { collection, filter_json: filter, projection, sort, skip, limit, max_time_ms }
        }
        Commands::Count { collection, filter } => Command::Count { collection, filter_json: filter },
        Commands::Distinct { collection, key, filter } => Command::Distinct { collection, key, filter_json: filter },
        Commands::Update { collection, filter, update, many, upsert, array_filters } => {
            Command::Update { collection, filter_json: filter, update_json: update, many, upsert, array_filters }
        }
        Commands::Delete { collection, filter, many } => Command::Delete { collection, filter_json: filter, many },
        Commands::Metrics => Command::Metrics,
    })
}

fn run(cli: Cli) -> Result<(), montylite::DbError> {
    let cfg_path = find_config_path(cli.config);
    let cfg = MontyConfig::resolve(cfg_path.as_deref(), cli.repository.as_deref())?;
    if cfg.logging.dir.is_some() {
        montylite::utils::logger::configure_from_config(&cfg.logging)?;
    } else if std::env::var_os("MONTYLITE_LOG_DIR").is_some() {
        montylite::utils::logger::configure_from_env()?;
    }
    let client = MontyClient::open(cfg)?;
    let mode = if cli.pretty { OutputMode::Pretty } else { OutputMode::Json };
    let cmd = to_command(cli.command)?;
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    prog_cli::run_with_writer(&client, &cli.db, cmd, mode, &mut lock)?;
    client.close()
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
