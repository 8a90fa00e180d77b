use clap::{Args, Parser, Subcommand};
use scholar_token::maker::{DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_KEY_DIRECTORY};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "scholar", version, about = "Scholar key and token tooling")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signing key management
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Mint and verify access tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Create private.key / public.key unless both already exist.
    Generate {
        #[arg(long, env = "SCHOLAR_KEY_DIR", default_value = DEFAULT_KEY_DIRECTORY)]
        dir: PathBuf,
    },

    /// Print the public key as base64.
    Show {
        #[arg(long, env = "SCHOLAR_KEY_DIR", default_value = DEFAULT_KEY_DIRECTORY)]
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Mint a token for a user.
    Mint {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        email: String,

        /// Repeat for several roles.
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Token lifetime, e.g. "15m" or "2h".
        #[arg(long, default_value = "15m")]
        lifetime: String,

        #[command(flatten)]
        maker: MakerArgs,
    },

    /// Verify a token (or a file containing one) and print its claims as JSON.
    Verify {
        token: String,

        #[command(flatten)]
        maker: MakerArgs,
    },
}

/// Settings shared by the token commands.
#[derive(Args, Debug)]
pub struct MakerArgs {
    #[arg(long, env = "SCHOLAR_KEY_DIR", default_value = DEFAULT_KEY_DIRECTORY)]
    pub key_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_ISSUER)]
    pub issuer: String,

    #[arg(long, default_value = DEFAULT_AUDIENCE)]
    pub audience: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { dir } => commands::keys::generate(&dir)?,
            KeysCommand::Show { dir } => println!("{}", commands::keys::show(&dir)?),
        },
        Command::Token { cmd } => match cmd {
            TokenCommand::Mint {
                user_id,
                email,
                roles,
                lifetime,
                maker,
            } => println!(
                "{}",
                commands::token::mint(&maker, &user_id, &email, roles, &lifetime)?
            ),
            TokenCommand::Verify { token, maker } => {
                let payload = commands::token::verify(&maker, &token)?;
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        },
    }

    Ok(())
}
