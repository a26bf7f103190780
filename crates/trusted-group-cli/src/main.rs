mod demo;
mod events;

use clap::{Parser, Subcommand};
use trusted_group::{GroupChannel, GroupToken, KeyPair};

use events::{emit, EventKeygen};

#[derive(Parser)]
#[command(name = "trusted-group", about = "Owner-gated encrypted group channel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an in-memory group: key exchange, broadcasts, refused outsider.
    Demo {
        /// Number of members besides the owner.
        #[arg(long, default_value = "2")]
        members: usize,
        /// Text each member broadcasts.
        #[arg(long, default_value = "hello")]
        message: String,
        /// Group token passphrase (random token if omitted).
        #[arg(long)]
        token: Option<String>,
    },

    /// Print a fresh X25519 keypair as JSON.
    Keygen,

    /// Encrypt a message under a group token, print hex.
    Seal {
        /// Group token passphrase.
        #[arg(long)]
        token: String,
        /// Plaintext.
        #[arg(long)]
        message: String,
    },

    /// Decrypt hex ciphertext under a group token.
    Open {
        /// Group token passphrase.
        #[arg(long)]
        token: String,
        /// Ciphertext (hex).
        #[arg(long)]
        ciphertext: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            members,
            message,
            token,
        } => {
            eprintln!("trusted-group v{}", env!("CARGO_PKG_VERSION"));
            let token = match token {
                Some(phrase) => GroupToken::from_passphrase(&phrase)?,
                None => GroupToken::generate(),
            };
            demo::run(demo::DemoConfig {
                members,
                message,
                token,
            })
            .await?;
        }

        Command::Keygen => {
            let keypair = KeyPair::generate();
            emit(&EventKeygen::new(&keypair));
        }

        Command::Seal { token, message } => {
            println!("{}", seal_hex(&token, &message)?);
        }

        Command::Open { token, ciphertext } => {
            println!("{}", open_hex(&token, &ciphertext)?);
        }
    }

    Ok(())
}

/// Encrypt `message` under the passphrase token, hex-encoded.
fn seal_hex(passphrase: &str, message: &str) -> anyhow::Result<String> {
    let token = GroupToken::from_passphrase(passphrase)?;
    let sealed = GroupChannel::seal(message, Some(&token))?;
    Ok(hex::encode(sealed))
}

/// Decrypt hex ciphertext produced by `seal_hex`.
fn open_hex(passphrase: &str, ciphertext: &str) -> anyhow::Result<String> {
    let token = GroupToken::from_passphrase(passphrase)?;
    let sealed = hex::decode(ciphertext.trim())
        .map_err(|e| anyhow::anyhow!("ciphertext is not valid hex: {e}"))?;
    Ok(GroupChannel::open(&sealed, &token)?)
}
