//! Upload orchestration: wires configuration, store and retry together.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use resumable_transfer::{FileStore, FinishOutcome, RetryExecutor, Upload, UploadClient};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Uploads `file` until it completes, fails for good, or Ctrl-C is pressed.
pub async fn run(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current request");
            interrupt.cancel();
        }
    });

    let mut client = UploadClient::new(config.client_config()?)?;
    match config.store_path() {
        Some(path) => {
            let store = FileStore::open(&path)
                .with_context(|| format!("opening resume store {}", path.display()))?;
            tracing::debug!(path = %path.display(), "resume store opened");
            client.enable_resuming(Arc::new(store));
        }
        None => tracing::warn!("no resume store location, uploads will not be resumable"),
    }
    client.on_complete(|done| {
        tracing::info!(url = %done.url, size = done.size, "upload complete");
    });

    let upload = Upload::from_file(&file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    tracing::info!(
        file = %file.display(),
        size = ?upload.size(),
        fingerprint = upload.fingerprint(),
        "starting upload"
    );

    let executor = RetryExecutor::new(config.retry_schedule());
    let client = &client;
    let upload = &upload;
    let token = &cancel;
    let outcome = executor
        .make_attempts_with_cancel(&cancel, move |attempt| async move {
            let mut transfer = client.resume_or_create_upload(upload).await?;
            tracing::info!(attempt, offset = transfer.offset(), url = %transfer.url(), "transferring");
            while !token.is_cancelled() {
                if transfer.transfer_chunk().await? == 0 {
                    break;
                }
                tracing::debug!(offset = transfer.offset(), size = ?transfer.size(), "progress");
            }
            transfer.finish().await
        })
        .await?;

    match outcome {
        Some(FinishOutcome::Completed(done)) => println!("{}", done.url),
        Some(FinishOutcome::Stopped { offset }) => {
            tracing::info!(offset, "upload stopped, run again to resume");
        }
        None => tracing::info!("upload cancelled"),
    }
    Ok(())
}
