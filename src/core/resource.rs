use crate::core::transport::Client;
use crate::domain::model::Resource;
use crate::domain::ports::{FullName, ResourceKind};
use crate::utils::error::{Result, TmcError};
use serde::Deserialize;
use std::marker::PhantomData;

pub type ResourceOf<K> = Resource<<K as ResourceKind>::Spec, <K as ResourceKind>::Name>;

#[derive(Debug, Clone)]
pub struct ResourceList<K: ResourceKind> {
    pub items: Vec<ResourceOf<K>>,
    pub total_count: Option<u64>,
}

/// CRUD over one resource kind, shared by every kind the API exposes.
pub struct ResourceClient<K: ResourceKind> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> Clone for ResourceClient<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K: ResourceKind> ResourceClient<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    pub async fn create(&self, resource: &ResourceOf<K>) -> Result<ResourceOf<K>> {
        let (parents, _) = split_name::<K>(&resource.full_name)?;
        let path = collection_path(K::BASE_PATH, &parents)?;
        tracing::info!("Creating {} {:?}", K::KIND, resource.full_name.path_segments());

        let response: serde_json::Value = self.client.create(&path, &wrap::<K>(resource)?).await?;
        unwrap_single::<K>(response)
    }

    pub async fn get(&self, name: &K::Name) -> Result<ResourceOf<K>> {
        let path = item_path::<K>(name)?;
        let response: serde_json::Value = self.client.get(&path, &name.query_params()).await?;
        unwrap_single::<K>(response)
    }

    /// Like `get`, but a 404 from the API becomes `None`.
    pub async fn find(&self, name: &K::Name) -> Result<Option<ResourceOf<K>>> {
        match self.get(name).await {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update(&self, resource: &ResourceOf<K>) -> Result<ResourceOf<K>> {
        let path = item_path::<K>(&resource.full_name)?;
        tracing::info!("Updating {} {:?}", K::KIND, resource.full_name.path_segments());

        let response: serde_json::Value = self.client.update(&path, &wrap::<K>(resource)?).await?;
        unwrap_single::<K>(response)
    }

    pub async fn delete(&self, name: &K::Name) -> Result<()> {
        self.delete_with(name, &[]).await
    }

    /// DELETE with extra query parameters such as `force=true`.
    pub async fn delete_with(&self, name: &K::Name, extra: &[(String, String)]) -> Result<()> {
        let path = item_path::<K>(name)?;
        let mut query = name.query_params();
        query.extend_from_slice(extra);
        tracing::info!("Deleting {} {:?}", K::KIND, name.path_segments());

        self.client.delete_discard(&path, &query).await
    }

    /// Lists resources under `parents`, the names filling the collection
    /// path placeholders.
    pub async fn list(
        &self,
        parents: &[String],
        query: &[(String, String)],
    ) -> Result<ResourceList<K>> {
        let path = collection_path(K::BASE_PATH, parents)?;
        let mut response: serde_json::Value = self.client.get(&path, query).await?;

        let items = match response.get_mut(K::PLURAL).map(serde_json::Value::take) {
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(items) => serde_json::from_value(items)?,
        };
        let total_count = response
            .get("totalCount")
            .cloned()
            .map(serde_json::from_value::<Count>)
            .transpose()?
            .map(|count| count.0);

        tracing::debug!("Listed {} {} resources", items.len(), K::KIND);
        Ok(ResourceList { items, total_count })
    }
}

/// `totalCount` arrives as a string or as a number depending on the endpoint.
struct Count(u64);

impl<'de> Deserialize<'de> for Count {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Count(n)),
            Raw::Text(s) => s.parse().map(Count).map_err(serde::de::Error::custom),
        }
    }
}

fn split_name<K: ResourceKind>(name: &K::Name) -> Result<(Vec<String>, String)> {
    let mut segments = name.path_segments();
    for segment in &segments {
        if segment.is_empty() || segment.contains('/') {
            return Err(TmcError::InvalidConfigValue {
                field: format!("{}.fullName", K::KIND),
                value: segment.clone(),
                reason: "Name parts must be non-empty and must not contain '/'".to_string(),
            });
        }
    }
    let own = segments.pop().ok_or_else(|| TmcError::MissingConfig {
        field: format!("{}.fullName.name", K::KIND),
    })?;
    Ok((segments, own))
}

fn item_path<K: ResourceKind>(name: &K::Name) -> Result<String> {
    let (parents, own) = split_name::<K>(name)?;
    Ok(format!("{}/{}", collection_path(K::BASE_PATH, &parents)?, own))
}

/// Fills each `{}` in `template` with the next parent name.
pub fn collection_path(template: &str, parents: &[String]) -> Result<String> {
    let pieces: Vec<&str> = template.split("{}").collect();
    if pieces.len() != parents.len() + 1 {
        return Err(TmcError::Config {
            message: format!(
                "Path '{}' needs {} parent name(s), got {}",
                template,
                pieces.len() - 1,
                parents.len()
            ),
        });
    }

    let mut path = String::from(pieces[0]);
    for (parent, piece) in parents.iter().zip(&pieces[1..]) {
        path.push_str(parent);
        path.push_str(piece);
    }
    Ok(path)
}

fn wrap<K: ResourceKind>(resource: &ResourceOf<K>) -> Result<serde_json::Value> {
    let mut body = serde_json::Map::new();
    body.insert(K::SINGULAR.to_string(), serde_json::to_value(resource)?);
    Ok(serde_json::Value::Object(body))
}

fn unwrap_single<K: ResourceKind>(mut response: serde_json::Value) -> Result<ResourceOf<K>> {
    match response.get_mut(K::SINGULAR).map(serde_json::Value::take) {
        Some(inner) => Ok(serde_json::from_value(inner)?),
        None => Err(TmcError::Serialization(serde::de::Error::custom(format!(
            "response is missing the '{}' object",
            K::SINGULAR
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kinds::{ClusterName, NodePool, NodePoolName};

    #[test]
    fn test_collection_path_fills_placeholders() {
        let path = collection_path("v1alpha1/clusters/{}/nodepools", &["c1".to_string()]).unwrap();
        assert_eq!(path, "v1alpha1/clusters/c1/nodepools");
        assert_eq!(
            collection_path("v1alpha1/clustergroups", &[]).unwrap(),
            "v1alpha1/clustergroups"
        );
    }

    #[test]
    fn test_collection_path_rejects_wrong_parent_count() {
        assert!(collection_path("v1alpha1/clusters/{}/nodepools", &[]).is_err());
        assert!(collection_path("v1alpha1/clustergroups", &["x".to_string()]).is_err());
    }

    #[test]
    fn test_item_path_for_nested_kind() {
        let name = NodePoolName::new(ClusterName::attached("c1"), "np1");
        assert_eq!(
            item_path::<NodePool>(&name).unwrap(),
            "v1alpha1/clusters/c1/nodepools/np1"
        );
    }

    #[test]
    fn test_item_path_rejects_slash_in_name() {
        let name = NodePoolName::new(ClusterName::attached("c1"), "a/b");
        assert!(matches!(
            item_path::<NodePool>(&name),
            Err(TmcError::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_count_accepts_string_and_number() {
        let a: Count = serde_json::from_value(serde_json::json!("12")).unwrap();
        let b: Count = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!((a.0, b.0), (12, 3));
    }
}
