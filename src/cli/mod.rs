pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "credctl")]
#[command(about = "credctl - Operator tooling for the Cred Management+ API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the first administrator account")]
    SeedAdmin(commands::seed::SeedAdminArgs),

    #[command(about = "Issue a session token for an identity")]
    IssueToken(commands::token::IssueTokenArgs),

    #[command(about = "Verify a session token and print its claims")]
    VerifyToken {
        #[arg(help = "Token to verify (with or without the Bearer prefix)")]
        token: String,
    },

    #[command(about = "Hash a password with the configured bcrypt cost")]
    HashPassword {
        #[arg(help = "Plain-text password")]
        password: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::SeedAdmin(args) => commands::seed::handle(args, &config, output_format).await,
        Commands::IssueToken(args) => commands::token::issue(args, &config, output_format),
        Commands::VerifyToken { token } => commands::token::verify(&token, &config, output_format),
        Commands::HashPassword { password } => {
            commands::password::handle(password, &config, output_format).await
        }
    }
}
