use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use directories::ProjectDirs;
use seedvault::{
    BlobStore, FileStore, KdfParams, PUBLIC_ID_LEN, RecoveryConfig, RecoveryCoordinator,
    RestoreState,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 memory cost in KiB for backup encryption (default: 65536)
    #[arg(long = "argon-mem", global = true, env = "SEEDVAULT_ARGON_MEM")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations for backup encryption (default: 3)
    #[arg(long = "argon-time", global = true, env = "SEEDVAULT_ARGON_TIME")]
    time_cost: Option<u32>,

    /// Argon2 parallelism for backup encryption (default: 1)
    #[arg(long = "argon-parallelism", global = true, env = "SEEDVAULT_ARGON_PARALLELISM")]
    parallelism: Option<u32>,
}

impl Argon2Args {
    fn is_set(&self) -> bool {
        self.mem_cost_kib.is_some() || self.time_cost.is_some() || self.parallelism.is_some()
    }

    fn to_kdf_params(&self, base: KdfParams) -> Result<KdfParams> {
        Ok(KdfParams::new(
            self.mem_cost_kib.unwrap_or(base.mem_cost_kib()),
            self.time_cost.unwrap_or(base.time_cost()),
            self.parallelism.unwrap_or(base.parallelism()),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "seedvault")]
#[command(
    version,
    about = "Derive wallets from identity assertions and keep encrypted backups."
)]
struct Cli {
    /// Directory holding backup envelopes
    #[arg(long, global = true, value_name = "DIR", env = "SEEDVAULT_STORE")]
    store: Option<PathBuf>,

    /// JSON file with KDF costs and passphrase policy
    #[arg(long, global = true, value_name = "PATH", env = "SEEDVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Minimum passphrase length in bytes
    #[arg(long, global = true, env = "SEEDVAULT_MIN_PASSPHRASE_LEN")]
    min_passphrase_len: Option<usize>,

    #[command(flatten)]
    argon2: Argon2Args,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Derives the wallet for an identity assertion and prints its public identifier
    Derive,

    /// Derives the wallet and stores an encrypted backup of its seed
    #[command(arg_required_else_help = true)]
    Backup {
        /// Name of the backup in the store
        #[arg(long)]
        name: String,
    },

    /// Restores a wallet from a stored backup
    #[command(arg_required_else_help = true)]
    Restore {
        /// Name of the backup in the store
        #[arg(long)]
        name: String,

        /// Public identifier (hex) the backup must belong to
        #[arg(long, value_name = "HEX")]
        expect_id: Option<String>,
    },

    /// Shows the envelope metadata of a stored backup
    #[command(arg_required_else_help = true)]
    Inspect {
        #[arg(long)]
        name: String,
    },

    /// Prints the effective configuration as JSON
    Config,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SEEDVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(args: &Cli) -> Result<RecoveryConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            RecoveryConfig::from_json(&data)?
        }
        None => RecoveryConfig::default(),
    };

    // wallet_kdf only comes from the config file; the same assertion must
    // keep deriving the same wallet whatever flags are passed.
    if args.argon2.is_set() {
        config.backup_kdf = args.argon2.to_kdf_params(config.backup_kdf)?;
    }
    if let Some(min) = args.min_passphrase_len {
        config.min_passphrase_len = min;
    }

    config.validate()?;
    Ok(config)
}

fn default_store() -> Result<FileStore> {
    let project_dirs =
        ProjectDirs::from("", "", "seedvault").context("could not determine platform directories")?;

    Ok(FileStore::new(project_dirs.data_dir().join("backups")))
}

fn resolve_store(path: Option<PathBuf>) -> Result<FileStore> {
    match path {
        Some(p) => Ok(FileStore::new(p)),
        None => default_store(),
    }
}

const ID_SUFFIX: &str = ".id";

/// Blob under which the public identifier of backup `name` is kept.
fn id_key(name: &str) -> String {
    format!("{name}{ID_SUFFIX}")
}

/// Backup names must not collide with the identifier blobs.
fn check_backup_name(name: &str) -> Result<()> {
    if name.ends_with(ID_SUFFIX) {
        bail!("backup name must not end with '{ID_SUFFIX}'");
    }
    Ok(())
}

fn parse_identifier(hex_id: &str) -> Result<Vec<u8>> {
    let id = hex::decode(hex_id.trim()).context("public identifier must be hex")?;
    if id.len() != PUBLIC_ID_LEN {
        bail!("public identifier must be {PUBLIC_ID_LEN} bytes");
    }
    Ok(id)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Cli::parse();
    let config = resolve_config(&args)?;
    debug!(?config, "configuration resolved");

    match args.command {
        Commands::Derive => {
            let coordinator = RecoveryCoordinator::new(config)?;
            let assertion = auth::read_assertion()?;
            let material = coordinator.create_wallet(assertion.as_bytes())?;
            println!("{}", hex::encode(material.public_identifier()));
        }
        Commands::Backup { name } => {
            check_backup_name(&name)?;
            let coordinator = RecoveryCoordinator::new(config)?;
            let store = resolve_store(args.store)?;
            let assertion = auth::read_assertion()?;
            let passphrase = auth::read_new_passphrase_with_confirmation()?;

            let material = coordinator.create_wallet(assertion.as_bytes())?;
            drop(assertion);
            let envelope = coordinator.backup_wallet(&material, passphrase.as_bytes())?;
            drop(passphrase);

            coordinator.store_backup(&store, &name, &envelope)?;
            store.put(&id_key(&name), hex::encode(material.public_identifier()).as_bytes())?;

            println!("backup '{name}' stored");
            println!("{}", hex::encode(material.public_identifier()));
        }
        Commands::Restore { name, expect_id } => {
            check_backup_name(&name)?;
            let coordinator = RecoveryCoordinator::new(config)?;
            let store = resolve_store(args.store)?;
            let envelope = coordinator
                .load_backup(&store, &name)
                .with_context(|| format!("failed to load backup '{name}'"))?;

            let expected = match expect_id {
                Some(hex_id) => parse_identifier(&hex_id)?,
                None => {
                    let stored = store
                        .get(&id_key(&name))?
                        .with_context(|| format!("no identifier stored for '{name}'; pass --expect-id"))?;
                    parse_identifier(&String::from_utf8_lossy(&stored))?
                }
            };

            let passphrase = auth::read_passphrase()?;
            let attempt = coordinator.restore(&envelope, passphrase.as_bytes(), Some(expected.as_slice()));
            drop(passphrase);

            let state = attempt.state();
            let material = attempt.into_result().with_context(|| match state {
                RestoreState::AuthFailed => "restore failed: wrong passphrase or corrupted backup".to_string(),
                RestoreState::IdentifierMismatch => {
                    "restore failed: backup belongs to a different wallet".to_string()
                }
                other => format!("restore rejected ({other:?})"),
            })?;

            println!("wallet restored");
            println!("{}", hex::encode(material.public_identifier()));
        }
        Commands::Inspect { name } => {
            check_backup_name(&name)?;
            let coordinator = RecoveryCoordinator::new(config)?;
            let store = resolve_store(args.store)?;
            let envelope = coordinator.load_backup(&store, &name)?;

            println!("version:    {}", envelope.version());
            println!("salt:       {} bytes", envelope.salt().len());
            println!("nonce:      {} bytes", envelope.nonce().len());
            println!("auth tag:   {} bytes", envelope.auth_tag().len());
            println!("ciphertext: {} bytes", envelope.ciphertext().len());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
