use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use keyring::{Backend, BackendType, Config, Item, fixed_string_prompt, terminal_prompt};
use std::io::{self, Write};
use std::path::PathBuf;

/// Environment variable holding the file backend passphrase, for non-interactive use.
const PASSPHRASE_ENV: &str = "KEYRING_FILE_PASSPHRASE";

#[derive(Parser, Debug)]
#[command(name = "keyring", version, about = "Store and retrieve secrets across credential stores")]
struct Cli {
    /// The keyring service to use
    #[arg(long, default_value = "example")]
    service: String,

    /// The key to use
    #[arg(long, default_value = "example")]
    key: String,

    /// A specific backend to use
    #[arg(long)]
    backend: Option<String>,

    /// Directory for the file backend
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Print debugging output to stderr
    #[arg(long)]
    debug: bool,

    /// List the backends available on this platform
    #[arg(long)]
    list_backends: bool,

    /// List keys stored on the keyring
    #[arg(long, conflicts_with_all = ["set", "remove", "metadata"])]
    list_keys: bool,

    /// Store VALUE under the key
    #[arg(long, value_name = "VALUE", conflicts_with_all = ["remove", "metadata"])]
    set: Option<String>,

    /// Remove the key
    #[arg(long, conflicts_with = "metadata")]
    remove: bool,

    /// Print the key's modification time without decrypting it
    #[arg(long)]
    metadata: bool,

    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn default_dir(service: &str) -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("keyring").join(service))
        .unwrap_or_else(|| PathBuf::from("~").join(".keyring").join(service))
}

fn build_config(cli: &Cli) -> Result<Config, String> {
    let available = keyring::available_backends();
    let allowed: Vec<BackendType> = match &cli.backend {
        Some(name) => {
            let backend: BackendType = name.parse().map_err(|e| format!("{e}"))?;
            if !available.contains(&backend) {
                return Err(format!(
                    "Backend {name:?} isn't available. Use --list-backends to see what is."
                ));
            }
            vec![backend]
        }
        None => available,
    };

    let prompt = match std::env::var(PASSPHRASE_ENV) {
        Ok(passphrase) => fixed_string_prompt(passphrase),
        Err(_) => terminal_prompt(),
    };

    Ok(Config::new()
        .with_service_name(&cli.service)
        .with_backends(allowed)
        .with_file_dir(cli.dir.clone().unwrap_or_else(|| default_dir(&cli.service)))
        .with_file_password_func(prompt))
}

fn run(cli: &Cli, ring: &mut dyn Backend) -> Result<(), String> {
    let backend = ring.backend_type();
    let mut stdout = io::stdout().lock();

    if cli.list_keys {
        tracing::debug!(service = %cli.service, %backend, "listing keys");
        let keys = ring
            .keys()
            .map_err(|e| format!("Failed to list keys: {e}"))?;
        for key in keys {
            writeln!(stdout, "{key}").map_err(|e| e.to_string())?;
        }
    } else if let Some(value) = &cli.set {
        tracing::debug!(key = %cli.key, service = %cli.service, %backend, "setting key");
        ring.set(&Item::new(cli.key.as_str(), value.as_bytes()))
            .map_err(|e| e.to_string())?;
    } else if cli.remove {
        tracing::debug!(key = %cli.key, service = %cli.service, %backend, "removing key");
        ring.remove(&cli.key).map_err(|e| e.to_string())?;
    } else if cli.metadata {
        let metadata = ring.get_metadata(&cli.key).map_err(|e| e.to_string())?;
        let modified = chrono::DateTime::<chrono::Local>::from(metadata.modification_time);
        writeln!(stdout, "{}", modified.to_rfc3339()).map_err(|e| e.to_string())?;
    } else {
        tracing::debug!(key = %cli.key, service = %cli.service, %backend, "getting key");
        let item = ring.get(&cli.key).map_err(|e| e.to_string())?;
        stdout.write_all(&item.data).map_err(|e| e.to_string())?;
    }
    stdout.flush().map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "keyring", &mut io::stdout());
        return;
    }

    if cli.list_backends {
        for backend in keyring::available_backends() {
            println!("{backend}");
        }
        return;
    }

    keyring::set_debug(cli.debug);

    let result = build_config(&cli).and_then(|cfg| {
        let mut ring = keyring::open(&cfg).map_err(|e| e.to_string())?;
        run(&cli, ring.as_mut())
    });
    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
