//! tokenctl - inspect and manage stored tokens from the command line
//!
//! Uses the same settings and vault as applications embedding
//! `token-store-core`, so it can seed a login, check what is stored for a
//! user, or log a user out.

mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use token_store_core::{
    BackendKind, MultiUserTokenStore, SecureStorage, SettingsManager, StoreError, StoreSettings,
    TokenInfo, TokenVault,
};

/// Manage per-user tokens in the secure vault
#[derive(Parser, Debug)]
#[command(name = "tokenctl")]
#[command(version)]
#[command(about = "Read, write and clear per-user tokens in the OS keychain")]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, env = "TOKENCTL_CONFIG")]
    config: Option<PathBuf>,

    /// User whose tokens to operate on. If omitted, `write` resolves the
    /// owner from the access token.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Passphrase for the encrypted file backend. Prompted for if unset.
    #[arg(long, global = true, env = "TOKENCTL_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored token bundle
    Read {
        /// Print token values instead of masked prefixes
        #[arg(long)]
        reveal: bool,
    },
    /// Store a token bundle
    Write {
        #[arg(long)]
        access_token: String,

        #[arg(long)]
        refresh_token: Option<String>,

        /// Seconds until the access token expires
        #[arg(long)]
        expires_in: Option<i64>,

        #[arg(long)]
        token_type: Option<String>,

        #[arg(long)]
        scope: Option<String>,
    },
    /// Remove the stored token bundle
    Clear,
    /// Show which backend and key are in use
    Status,
}

impl Command {
    fn token(&self) -> Option<TokenInfo> {
        let Command::Write {
            access_token,
            refresh_token,
            expires_in,
            token_type,
            scope,
        } = self
        else {
            return None;
        };

        let mut token = TokenInfo::new(access_token.as_str());
        if let Some(refresh_token) = refresh_token {
            token = token.with_refresh_token(refresh_token.as_str());
        }
        if let Some(seconds) = expires_in {
            token = token.with_expires_in(*seconds);
        }
        if let Some(token_type) = token_type {
            token = token.with_token_type(token_type.as_str());
        }
        if let Some(scope) = scope {
            token = token.with_scope(scope.as_str());
        }
        Some(token)
    }
}

/// Log filter from `RUST_LOG` directives, INFO when unset or unparsable
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Open the configured backend, unlocking the encrypted file store if needed
async fn open_storage(
    settings: &StoreSettings,
    passphrase: Option<String>,
) -> Result<Arc<dyn SecureStorage>, Box<dyn std::error::Error>> {
    match settings.resolve_backend() {
        BackendKind::Auto | BackendKind::Keychain => Ok(Arc::new(settings.keychain())),
        BackendKind::EncryptedFile => {
            let storage = settings.encrypted_file()?;
            let passphrase = match passphrase {
                Some(passphrase) => passphrase,
                None => rpassword::prompt_password("Vault passphrase: ")?,
            };
            storage.unlock(&passphrase).await?;
            Ok(Arc::new(storage))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let settings_path = match args.config.clone() {
        Some(path) => path,
        None => SettingsManager::default_path()?,
    };
    let settings = SettingsManager::open(&settings_path)
        .map_err(|e| format!("Failed to load settings from {:?}: {}", settings_path, e))?;
    let settings = settings.get();
    debug!("Using settings from {:?}", settings_path);

    let storage = open_storage(settings, args.passphrase.clone()).await?;
    let resolver = Arc::new(settings.identity_resolver()?);
    let store = MultiUserTokenStore::new(
        TokenVault::new(storage.clone()),
        resolver,
        args.user.clone(),
    )
    .with_key_prefix(settings.key_prefix.as_str());

    match &args.command {
        Command::Read { reveal } => match store.read().await {
            Ok(token) => {
                let view = output::token_view(&token, *reveal);
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            Err(StoreError::NoValue) => println!("no stored token"),
            Err(e) => return Err(e.into()),
        },
        command @ Command::Write { .. } => {
            if let Some(token) = command.token() {
                store.write(&token).await?;
                if let Some(user_id) = store.user_id() {
                    info!("Stored token for user {}", user_id);
                    println!("{}", user_id);
                }
            }
        }
        Command::Clear => {
            store.clear().await?;
            println!("cleared");
        }
        Command::Status => {
            let key = store.storage_key();
            let stored = match key.as_str() {
                Some(key) => storage.exists(key).await?,
                None => false,
            };
            let status = serde_json::json!({
                "backend": storage.backend_name(),
                "hardwareBacked": storage.is_hardware_backed(),
                "user": store.user_id(),
                "storageKey": key.as_str(),
                "stored": stored,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
