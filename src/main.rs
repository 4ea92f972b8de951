use anyhow::{Context, Result};
use colored::*;
use domain::document::Document;
use empapp_client::App;
use log::*;
use service::config::{Command, Config};
use service::logging::Logger;
use sse::message::COUNTER_EVENT;
use std::time::Duration;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    let command = config.command.clone();
    let mut app =
        App::init(config, Document::terminal()).context("Failed to initialize the client")?;

    match command {
        Command::Fetch => {
            app.fetch()
                .await
                .context("Failed to fetch the employee list")?;
        }
        Command::Listen => {
            let listener = app.listen().context("Failed to open the messages stream")?;
            tokio::select! {
                _ = listener.closed() => warn!("Messages stream ended"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted, closing the messages stream"),
            }
        }
        Command::Counter {
            ticks,
            tick_timeout_secs,
        } => {
            let listener = app
                .follow_counter()
                .context("Failed to open the counter stream")?;
            for tick in 1..=ticks {
                listener
                    .wait_for_event(COUNTER_EVENT, Duration::from_secs(tick_timeout_secs))
                    .await
                    .with_context(|| format!("No counter event {tick} of {ticks}"))?;
            }
            println!("{} Received {ticks} counter events", "✓".green());
        }
        Command::Chat => {
            app.join_chat()
                .await
                .context("Failed to connect to the chat endpoint")?;
            println!(
                "{} Connected. Type a message and press enter to send it.",
                "→".blue()
            );

            let stdin = BufReader::new(tokio::io::stdin());
            let result = tokio::select! {
                result = app.relay_lines(stdin) => result.map(Some),
                _ = tokio::signal::ctrl_c() => Ok(None),
            };
            app.shutdown().await;

            if let Some(sent) = result.context("Chat relay stopped")? {
                info!("Sent {sent} messages");
            }
        }
    }

    Ok(())
}
