use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{ClientEvent, CodeOperationsClient, HttpBackend};
use shared::{domain::ProjectId, protocol::GenerateCodeRequest};
use storage::Storage;
use tracing::info;

mod config;

use config::{load_settings, normalize_database_url};

#[derive(Parser, Debug)]
#[command(about = "Trigger a code-generation run and resync the local project cache")]
struct Args {
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    /// Block until the cached project snapshot has been refreshed (or the
    /// refresh has failed) instead of returning as soon as generation is
    /// acknowledged.
    #[arg(long)]
    wait_for_refresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(database_url) = args.database_url {
        settings.database_url = database_url;
    }

    let backend = Arc::new(HttpBackend::new(&settings.server_url)?);
    let cache = Storage::new(&normalize_database_url(&settings.database_url)).await?;
    let client = CodeOperationsClient::new(backend, cache);

    let mut events = client.subscribe_events();
    let response = client
        .generate_code(GenerateCodeRequest {
            project_id: ProjectId::new(args.project_id),
        })
        .await?;
    info!(
        project_id = response.project_id.as_str(),
        "generate-code acknowledged"
    );
    println!(
        "Generated code for project '{}': {}",
        response.project_id, response.message
    );

    if args.wait_for_refresh {
        let outcome = tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                match events.recv().await {
                    Ok(ClientEvent::ProjectRefreshed { id, version }) => {
                        break format!("project '{id}' cached at version {version}");
                    }
                    Ok(ClientEvent::ProjectRefreshFailed { message }) => {
                        break format!("project refresh failed: {message}");
                    }
                    Ok(_) => {}
                    Err(err) => break format!("event channel closed: {err}"),
                }
            }
        })
        .await
        .unwrap_or_else(|_| "timed out waiting for project refresh".to_string());
        info!("{outcome}");
        println!("{outcome}");
    }

    Ok(())
}
