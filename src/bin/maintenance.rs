use std::env;

use anyhow::Result;

use backoffice::{config::AppConfig, models::NotificationQueueEntry, state::AppState};

const USAGE: &str = "Usage: maintenance <list-failed | requeue-failed [entry-id]>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("list-failed") => list_failed().await?,
        Some("requeue-failed") => requeue_failed(args.next()).await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn build_state() -> Result<AppState> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        graphql_endpoint = %config.redacted_endpoint(),
        "loaded backoffice configuration"
    );
    AppState::from_config(config)
}

async fn list_failed() -> Result<()> {
    let state = build_state()?;
    let entries = state.public_services().notifications.list_failed().await?;
    if entries.is_empty() {
        println!("No failed notifications.");
        return Ok(());
    }
    for entry in &entries {
        print_entry(entry);
    }
    println!("{} failed notification(s).", entries.len());
    Ok(())
}

async fn requeue_failed(id: Option<String>) -> Result<()> {
    let state = build_state()?;
    let notifications = state.public_services().notifications;
    let ids: Vec<String> = match id {
        Some(id) => vec![id],
        None => notifications
            .list_failed()
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect(),
    };

    if ids.is_empty() {
        println!("Nothing to requeue.");
        return Ok(());
    }

    let mut requeued = 0usize;
    for id in &ids {
        match notifications.requeue(id).await {
            Ok(_) => requeued += 1,
            Err(err) => eprintln!("Failed to requeue {id}: {err}"),
        }
    }
    println!("Requeued {requeued} of {} notification(s).", ids.len());
    Ok(())
}

fn print_entry(entry: &NotificationQueueEntry) {
    println!(
        "{}\t{}\t{}\t{}\tretries={}\t{}",
        entry.id,
        entry.channel,
        entry.recipient,
        entry.template_id,
        entry.retry_count,
        entry.last_error.as_deref().unwrap_or("-"),
    );
}
