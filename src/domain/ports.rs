use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Composite key of a resource across its scopes.
pub trait FullName: Serialize + DeserializeOwned + Clone + Debug + Send + Sync {
    /// Name parts that appear in the URL path, outermost first.
    fn path_segments(&self) -> Vec<String>;

    /// Scope fields sent as `fullName.<field>` query parameters. Unset
    /// fields are skipped.
    fn query_fields(&self) -> Vec<(&'static str, Option<String>)> {
        Vec::new()
    }

    fn query_params(&self) -> Vec<(String, String)> {
        self.query_fields()
            .into_iter()
            .filter_map(|(field, value)| {
                value
                    .filter(|v| !v.is_empty())
                    .map(|v| (format!("fullName.{}", field), v))
            })
            .collect()
    }
}

/// Describes one API resource kind for the generic resource client.
pub trait ResourceKind: Send + Sync + 'static {
    type Name: FullName;
    type Spec: Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync;

    /// Resource kind as used in log lines.
    const KIND: &'static str;

    /// Collection path template. `{}` placeholders are filled, in order,
    /// with the leading path segments of the full name; the last segment
    /// is the resource's own name.
    const BASE_PATH: &'static str;

    /// JSON key wrapping a single resource in request and response bodies.
    const SINGULAR: &'static str;

    /// JSON key of the array in list responses.
    const PLURAL: &'static str;
}
