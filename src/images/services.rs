use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::StorageClient;

const DISCARD_ATTEMPTS: u32 = 3;
const DISCARD_BACKOFF: Duration = Duration::from_millis(100);

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

/// What happened to a superseded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    Removed,
    /// Remote URL (e.g. the placeholder); nothing of ours to delete.
    Skipped,
    /// Every attempt failed; the file is left behind.
    Orphaned,
}

/// Stores a profile image and returns the reference to save on the user row.
pub async fn store_profile_image(
    storage: &dyn StorageClient,
    image: UploadItem<'_>,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(image.content_type).unwrap_or("bin");
    let key = format!("uploads/{}.{}", Uuid::new_v4(), ext);
    storage
        .put_object(&key, image.body, image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    debug!(%key, "profile image stored");
    Ok(format!("/{}", key))
}

/// Best-effort removal of an image we no longer reference. Never fails the caller.
pub async fn discard_image(storage: &dyn StorageClient, reference: &str) -> Discard {
    let Some(key) = local_key(reference) else {
        debug!(%reference, "remote image reference, nothing to delete");
        return Discard::Skipped;
    };

    for attempt in 1..=DISCARD_ATTEMPTS {
        match storage.delete_object(key).await {
            Ok(()) => {
                info!(%key, "old image deleted");
                return Discard::Removed;
            }
            Err(e) if attempt < DISCARD_ATTEMPTS => {
                warn!(error = %e, %key, attempt, "image delete failed, retrying");
                tokio::time::sleep(DISCARD_BACKOFF * 2u32.pow(attempt - 1)).await;
            }
            Err(e) => {
                warn!(error = %e, orphan = %key, "image delete gave up; file orphaned");
            }
        }
    }
    Discard::Orphaned
}

fn local_key(reference: &str) -> Option<&str> {
    if reference.is_empty() || reference.contains("://") {
        return None;
    }
    Some(reference.trim_start_matches('/'))
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
