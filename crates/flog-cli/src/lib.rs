//! Publishing client for Flog.
//!
//! Reads `entry.md` or `sidebar.yaml` from a directory, renders it, uploads
//! referenced media and submits the result to the blog's client API using
//! credentials found in the nearest `credentials.yaml`.

pub mod args;
pub mod client;
pub mod credentials;
pub mod document;
pub mod linkcheck;
pub mod markup;
pub mod publish;
pub mod references;
pub mod sidebar;


use std::time::Duration;

pub use args::{Action, Cli};
pub use client::{CliError, Ctx};
pub use publish::{PublishOptions, PublishSummary, UploadOutcome, publish_entry};
pub use sidebar::publish_sidebar;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|source| CliError::InputFile {
            path: ".".to_string(),
            source,
        })?,
    };
    let options = PublishOptions {
        dir,
        remote: cli.remote,
        check_links: !cli.nocheck,
        timeout: Duration::from_secs(cli.timeout),
    };

    match cli.action() {
        Action::Entry => {
            publish_entry(&options).await?;
        }
        Action::Sidebar => {
            publish_sidebar(&options).await?;
        }
    }
    Ok(())
}
