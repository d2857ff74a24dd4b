//! query-chat - ask questions about your data in plain language.

mod cli;

use anyhow::{bail, Context, Result};
use cli::Cli;
use query_chat::config::Config;
use query_chat::conversation::Role;
use query_chat::error::ChatError;
use query_chat::gateway::{
    check_connectivity, DataGateway, HttpDataGateway, HttpModelGateway, MockDataGateway,
    MockModelGateway, ModelGateway,
};
use query_chat::logging;
use query_chat::orchestrator::{Orchestrator, SessionEvent};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ChatError>() {
            Some(chat_error) => error!("{}: {e:#}", chat_error.category()),
            None => error!("{e:#}"),
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Precedence: CLI flags, then environment, then config file
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.gateway.apply_env_overrides();
    cli.apply_to(&mut config);

    let schema = config.session.load_schema()?;

    let (model, data): (Box<dyn ModelGateway>, Box<dyn DataGateway>) = if cli.mock {
        info!("Using mock gateways");
        (
            Box::new(MockModelGateway::new()),
            Box::new(MockDataGateway::with_sample_rows()),
        )
    } else {
        let http = config
            .gateway
            .to_http_config()
            .context("Cannot reach the backend without a URL and token")?;
        info!("Backend: {}", config.gateway.display_string());
        let model = HttpModelGateway::new(&http)?;
        let data = HttpDataGateway::new(&http)?;
        if cli.check {
            println!("model endpoint: {}", model.url());
            println!("data endpoint:  {}", data.url());
        }
        (Box::new(model), Box::new(data))
    };

    if cli.check {
        let report = check_connectivity(model.as_ref(), data.as_ref()).await;
        match &report.model {
            Ok(_) => println!("model gateway: ok"),
            Err(e) => println!("model gateway: FAILED ({e})"),
        }
        match &report.data {
            Ok(rows) => println!("data gateway:  ok ({rows} row(s))"),
            Err(e) => println!("data gateway:  FAILED ({e})"),
        }
        if !report.is_ok() {
            bail!("connectivity check failed");
        }
        return Ok(());
    }

    let mut orchestrator =
        Orchestrator::new(model, data, schema).with_greeting(config.session.greeting.clone());
    let mut events = orchestrator.subscribe();

    for turn in orchestrator.session().conversation().turns() {
        println!("{}\n", turn.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }

        orchestrator.send_message(&line).await;
        print_events(&mut events);
    }

    Ok(())
}

/// Prints everything the last chain produced, in order.
fn print_events(events: &mut UnboundedReceiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::TurnAppended(turn) if turn.role == Role::Assistant => {
                println!("{}\n", turn.content);
            }
            SessionEvent::ResultsReady(results) => {
                println!("{}\n", results.render_table());
            }
            SessionEvent::ErrorRaised(message) => {
                eprintln!("[error] {message}");
            }
            _ => {}
        }
    }
}
