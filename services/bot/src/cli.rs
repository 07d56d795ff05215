use crate::catalog_check::{run_catalog_check, CatalogCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use hr_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "HR Intake Bot",
    about = "Collect job applications over Telegram and record them in Google Sheets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bot (default command)
    Serve(ServeArgs),
    /// Inspect an openings catalog without contacting any service
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Validate an openings CSV export and print what the bot would offer
    Check(CatalogCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override BOT_MODE (`polling` or `webhook`)
    #[arg(long)]
    pub(crate) mode: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Catalog {
            command: CatalogCommand::Check(args),
        } => run_catalog_check(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["hr-intake-bot"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn catalog_check_requires_csv_path() {
        let cli = Cli::try_parse_from(["hr-intake-bot", "catalog", "check", "--csv", "openings.csv"])
            .expect("parses");
        match cli.command {
            Some(Command::Catalog {
                command: CatalogCommand::Check(args),
            }) => assert_eq!(args.csv.to_str(), Some("openings.csv")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["hr-intake-bot", "catalog", "check"]).is_err());
    }

    #[test]
    fn serve_accepts_mode_override() {
        let cli = Cli::try_parse_from(["hr-intake-bot", "serve", "--mode", "webhook", "--port", "8080"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.mode.as_deref(), Some("webhook"));
                assert_eq!(args.port, Some(8080));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
