//! Workspace store: the per-execution bucket and the local ⇄ bucket sync.

use std::path::Path;

use anyhow::{Context, Result};
use ephemeral_common::Tags;
use futures_util::future::try_join_all;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::application::ports::{ObjectStorageApi, WorkspaceFs};
use crate::application::services::filter_compiler::{SyncDirection, compile_filters};
use crate::domain::error::{CloudError, codes};
use crate::domain::teardown::TeardownAction;

/// Objects transferred concurrently during a sync.
const SYNC_CONCURRENCY: usize = 16;

/// A created bucket and the action that removes it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketResource {
    pub name: String,
    pub teardown: TeardownAction,
}

/// One direction-agnostic sync request.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    pub local_path: &'a Path,
    pub bucket: &'a str,
    pub includes: &'a [String],
    pub excludes: &'a [String],
}

/// Policy granting `principal` full access to `bucket` and its objects.
#[must_use]
pub fn access_policy(bucket: &str, principal: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": principal },
            "Action": "s3:*",
            "Resource": [
                format!("arn:aws:s3:::{bucket}"),
                format!("arn:aws:s3:::{bucket}/*"),
            ],
        }],
    })
    .to_string()
}

/// Create a private bucket, tag it, and grant `access_principal` full access
/// so the sidecar containers can read and write it.
///
/// # Errors
///
/// Returns an error if any storage call fails. A bucket that was created
/// before a later call failed is left behind; [`delete_bucket_if_exists`]
/// removes it.
pub async fn create_bucket(
    storage: &impl ObjectStorageApi,
    name: &str,
    access_principal: &str,
    tags: &Tags,
) -> Result<BucketResource> {
    storage
        .create_bucket(name)
        .await
        .with_context(|| format!("failed to create bucket {name}"))?;
    debug!(bucket = %name, "created bucket");

    storage
        .put_bucket_tagging(name, tags)
        .await
        .with_context(|| format!("failed to tag bucket {name}"))?;
    storage
        .put_bucket_policy(name, &access_policy(name, access_principal))
        .await
        .with_context(|| format!("failed to attach policy to bucket {name}"))?;

    Ok(BucketResource {
        name: name.to_string(),
        teardown: TeardownAction::DeleteBucket {
            bucket: name.to_string(),
        },
    })
}

/// Upload the filtered local workspace into the bucket.
///
/// # Errors
///
/// Returns an error if the filters are invalid or a transfer fails.
pub async fn sync_up(
    storage: &impl ObjectStorageApi,
    fs: &impl WorkspaceFs,
    request: SyncRequest<'_>,
) -> Result<usize> {
    let chain = compile_filters(
        fs,
        request.local_path,
        request.excludes,
        request.includes,
        SyncDirection::Up,
    )
    .await?;
    let keys: Vec<String> = fs
        .list_files(request.local_path)
        .await?
        .into_iter()
        .filter(|key| chain.allows(key))
        .collect();

    let count = keys.len();
    stream::iter(keys)
        .map(|key| async move {
            let body = fs.read(request.local_path, &key).await?;
            storage
                .put_object(request.bucket, &key, body)
                .await
                .with_context(|| format!("failed to upload {key}"))
        })
        .buffer_unordered(SYNC_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    info!(bucket = %request.bucket, files = count, "workspace uploaded");
    Ok(count)
}

/// Download the filtered bucket contents into the local workspace.
/// Keys under `.git/` are never downloaded.
///
/// # Errors
///
/// Returns an error if the filters are invalid or a transfer fails.
pub async fn sync_down(
    storage: &impl ObjectStorageApi,
    fs: &impl WorkspaceFs,
    request: SyncRequest<'_>,
) -> Result<usize> {
    let chain = compile_filters(
        fs,
        request.local_path,
        request.excludes,
        request.includes,
        SyncDirection::Down,
    )
    .await?;
    let keys: Vec<String> = list_all_keys(storage, request.bucket)
        .await?
        .into_iter()
        .filter(|key| chain.allows(key))
        .collect();

    let count = keys.len();
    stream::iter(keys)
        .map(|key| async move {
            let body = storage
                .get_object(request.bucket, &key)
                .await
                .with_context(|| format!("failed to download {key}"))?;
            fs.write(request.local_path, &key, &body).await
        })
        .buffer_unordered(SYNC_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    info!(bucket = %request.bucket, files = count, "workspace downloaded");
    Ok(count)
}

/// Every key of `bucket`, following continuation tokens.
async fn list_all_keys(storage: &impl ObjectStorageApi, bucket: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = storage
            .list_objects(bucket, token.as_deref())
            .await
            .with_context(|| format!("failed to list objects of {bucket}"))?;
        keys.extend(page.keys);
        match page.next_continuation_token {
            Some(next) => token = Some(next),
            None => return Ok(keys),
        }
    }
}

/// Delete every object of `bucket`, then the bucket itself.
///
/// # Errors
///
/// Returns an error if any storage call fails, including when the bucket
/// does not exist.
pub async fn delete_bucket(storage: &impl ObjectStorageApi, bucket: &str) -> Result<()> {
    let keys = list_all_keys(storage, bucket).await?;
    let objects = keys.len();
    try_join_all(keys.iter().map(|key| async move {
        storage
            .delete_object(bucket, key)
            .await
            .with_context(|| format!("failed to delete object {key}"))
    }))
    .await?;
    storage
        .delete_bucket(bucket)
        .await
        .with_context(|| format!("failed to delete bucket {bucket}"))?;
    info!(bucket = %bucket, objects, "bucket deleted");
    Ok(())
}

/// [`delete_bucket`], treating a missing bucket as already deleted.
///
/// # Errors
///
/// Returns an error for any failure other than the bucket not existing.
pub async fn delete_bucket_if_exists(storage: &impl ObjectStorageApi, bucket: &str) -> Result<()> {
    match delete_bucket(storage, bucket).await {
        Err(err) if CloudError::has_code(&err, codes::NO_SUCH_BUCKET) => {
            warn!(bucket = %bucket, "bucket does not exist, nothing to delete");
            Ok(())
        }
        other => other,
    }
}
