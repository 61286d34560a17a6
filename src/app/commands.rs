use crate::core::resource::{ResourceClient, ResourceOf};
use crate::core::transport::Client;
use crate::domain::ports::ResourceKind;
use crate::utils::error::Result;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
}

/// Creates `desired`, or updates it in place when it already exists.
///
/// An update carries the server's current resource version so the API can
/// reject writes against a stale copy.
pub async fn apply<K: ResourceKind>(
    client: &Client,
    mut desired: ResourceOf<K>,
) -> Result<(ApplyOutcome, ResourceOf<K>)> {
    let resources = ResourceClient::<K>::new(client.clone());

    match resources.find(&desired.full_name).await? {
        None => {
            let created = resources.create(&desired).await?;
            Ok((ApplyOutcome::Created, created))
        }
        Some(existing) => {
            if desired.meta.resource_version.is_none() {
                desired.meta.resource_version = existing.meta.resource_version;
            }
            if desired.meta.uid.is_none() {
                desired.meta.uid = existing.meta.uid;
            }
            let updated = resources.update(&desired).await?;
            Ok((ApplyOutcome::Updated, updated))
        }
    }
}

pub async fn apply_file<K: ResourceKind>(
    client: &Client,
    path: &Path,
) -> Result<(ApplyOutcome, ResourceOf<K>)> {
    let content = tokio::fs::read(path).await?;
    let desired: ResourceOf<K> = serde_json::from_slice(&content)?;
    apply::<K>(client, desired).await
}

pub async fn describe<K: ResourceKind>(client: &Client, name: &K::Name) -> Result<serde_json::Value> {
    let resource = ResourceClient::<K>::new(client.clone()).get(name).await?;
    Ok(serde_json::to_value(resource)?)
}

/// Lists `K` under `parents`; `query` carries the parent's scope such as
/// `fullName.managementClusterName`.
pub async fn list<K: ResourceKind>(
    client: &Client,
    parents: &[String],
    query: &[(String, String)],
) -> Result<serde_json::Value> {
    let listed = ResourceClient::<K>::new(client.clone())
        .list(parents, query)
        .await?;
    Ok(serde_json::to_value(listed.items)?)
}

/// Deletes the resource; a resource that is already gone counts as deleted.
pub async fn remove<K: ResourceKind>(client: &Client, name: &K::Name, force: bool) -> Result<bool> {
    let extra = if force {
        vec![("force".to_string(), "true".to_string())]
    } else {
        Vec::new()
    };

    match ResourceClient::<K>::new(client.clone())
        .delete_with(name, &extra)
        .await
    {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            tracing::warn!("{} {:?} was already deleted", K::KIND, name);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
