use std::env;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use ledger_engine::csv::{read_operations, write_transactions, write_users};
use ledger_engine::{Engine, InMemoryStore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

const USAGE: &str = "usage: ledger-engine <operations.csv> [--transactions]";

#[tokio::main]
async fn main() -> ExitCode {
    let default_level: Directive = tracing::Level::WARN.into();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level))
        .with_writer(io::stderr)
        .init();

    let mut path = None;
    let mut show_transactions = false;
    for arg in env::args().skip(1) {
        if arg == "--transactions" {
            show_transactions = true;
        } else if path.is_none() {
            path = Some(arg);
        } else {
            error!(arg, "{USAGE}");
            return ExitCode::FAILURE;
        }
    }
    let Some(path) = path else {
        error!("{USAGE}");
        return ExitCode::FAILURE;
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let operations = match read_operations(path.clone()) {
        Ok(operations) => operations,
        Err(e) => {
            error!(path, "{e}");
            return ExitCode::FAILURE;
        }
    };

    let engine = Engine::new(Arc::new(InMemoryStore::new()));
    let (op_sender, op_receiver) = tokio::sync::mpsc::channel(16);

    let reader = tokio::spawn(async move {
        for result in operations {
            match result {
                Ok(op) => {
                    if op_sender.send(op).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(op_receiver)).await;
    if let Err(e) = reader.await {
        error!("operation reader stopped: {e}");
        return ExitCode::FAILURE;
    }

    let written = if show_transactions {
        match engine.transactions().await {
            Ok(transactions) => write_transactions(io::stdout().lock(), &transactions),
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match engine.users().await {
            Ok(users) => write_users(io::stdout().lock(), &users),
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    };

    if let Err(e) = written {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
