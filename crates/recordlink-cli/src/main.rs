//! recordlink command-line client
//!
//! Runs one use case against a company database: connect, do the work,
//! report, disconnect.

mod commands;
mod formatter;
mod options;

use std::process::ExitCode;

use clap::Parser;
use recordlink_client::{Error, Session};

use commands::{Command, Output};
use formatter::{Formatter, OutputFormat};
use options::ConnectionArgs;

/// recordlink command-line client
#[derive(Parser, Debug)]
#[command(name = "recordlink")]
#[command(version, about = "Run record use cases against a company database")]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout carries the results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recordlink=info")),
        )
        .init();

    let args = Args::parse();
    let formatter = formatter::create_formatter(args.format);

    match run(args, formatter.as_ref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Setup(e)) => {
            eprintln!("{}", formatter.format_error(&e.failure()));
            ExitCode::FAILURE
        }
        Err(RunError::Reported(_)) => ExitCode::FAILURE,
    }
}

/// How a run failed.
#[derive(Debug)]
enum RunError {
    /// The session could not be configured; nothing has been printed.
    Setup(Error),
    /// The use case failed and the failure has been printed.
    Reported(Error),
}

fn run(args: Args, formatter: &dyn Formatter) -> Result<(), RunError> {
    let config = args.connection.into_config().map_err(RunError::Setup)?;
    let mut session = Session::new(config);

    // Printed before the session is disconnected.
    let report = |e: &Error| eprintln!("{}", formatter.format_error(&e.failure()));
    let output = commands::execute(&mut session, &args.command, report)
        .map_err(RunError::Reported)?;

    match output {
        Output::Message(message) => println!("{}", formatter.format_message(&message)),
        Output::Rows { columns, rows } => println!("{}", formatter.format_rows(&columns, &rows)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use recordlink_client::client_codes;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_add_document() {
        let args = Args::try_parse_from([
            "recordlink",
            "--server",
            "dbserver",
            "add-document",
            "sales-order",
            "--partner",
            "C20000",
            "--line",
            "ITEM001:1",
            "--line",
            "ITEM002:5",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.connection.server.as_deref(), Some("dbserver"));
        assert_eq!(args.format, OutputFormat::Json);
        match args.command {
            Command::AddDocument(document) => {
                assert_eq!(document.lines.len(), 2);
                assert_eq!(document.lines[1].quantity, 5.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_trusted() {
        let parse = |flags: &[&str]| {
            let mut argv = vec!["recordlink"];
            argv.extend_from_slice(flags);
            Args::try_parse_from(argv).unwrap().connection.trusted
        };
        assert_eq!(parse(&["connect"]), None);
        assert_eq!(parse(&["--trusted", "connect"]), Some(true));
        assert_eq!(parse(&["connect", "--trusted=false"]), Some(false));
    }

    #[test]
    fn test_run_failures_are_classified() {
        let formatter = formatter::create_formatter(OutputFormat::Json);

        let args = Args::try_parse_from([
            "recordlink",
            "--profile",
            "/nonexistent/recordlink.toml",
            "connect",
        ])
        .unwrap();
        assert!(matches!(
            run(args, formatter.as_ref()),
            Err(RunError::Setup(Error::Configuration(_)))
        ));

        // Validation fails before any socket is opened.
        let args = Args::try_parse_from(["recordlink", "--user", "manager", "connect"]).unwrap();
        match run(args, formatter.as_ref()) {
            Err(RunError::Reported(e)) => assert_eq!(e.code(), client_codes::CONFIGURATION),
            other => panic!("expected a reported failure, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(Args::try_parse_from(["recordlink", "add-document", "partner", "--line", "A:1"]).is_err());
        assert!(Args::try_parse_from(["recordlink", "update-catalog", "--partner", "V10000", "--mapping", "A00001"]).is_err());
        assert!(Args::try_parse_from(["recordlink", "unlock-user", "jsmith"]).is_err());
    }
}
