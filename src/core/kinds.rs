use crate::domain::ports::{FullName, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ATTACHED: &str = "attached";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGroupName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl ClusterGroupName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            org_id: None,
        }
    }
}

impl FullName for ClusterGroupName {
    fn path_segments(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterGroupSpec {}

#[derive(Debug, Clone, Copy)]
pub struct ClusterGroup;

impl ResourceKind for ClusterGroup {
    type Name = ClusterGroupName;
    type Spec = ClusterGroupSpec;

    const KIND: &'static str = "cluster group";
    const BASE_PATH: &'static str = "v1alpha1/clustergroups";
    const SINGULAR: &'static str = "clusterGroup";
    const PLURAL: &'static str = "clusterGroups";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl ClusterName {
    pub fn new(
        name: impl Into<String>,
        management_cluster_name: impl Into<String>,
        provisioner_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            management_cluster_name: Some(management_cluster_name.into()),
            provisioner_name: Some(provisioner_name.into()),
            org_id: None,
        }
    }

    /// Cluster attached to the platform rather than provisioned by it.
    pub fn attached(name: impl Into<String>) -> Self {
        Self::new(name, ATTACHED, ATTACHED)
    }
}

impl FullName for ClusterName {
    fn path_segments(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn query_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("managementClusterName", self.management_cluster_name.clone()),
            ("provisionerName", self.provisioner_name.clone()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub cluster_group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<String>,
    /// Provider-specific topology, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct Cluster;

impl ResourceKind for Cluster {
    type Name = ClusterName;
    type Spec = ClusterSpec;

    const KIND: &'static str = "cluster";
    const BASE_PATH: &'static str = "v1alpha1/clusters";
    const SINGULAR: &'static str = "cluster";
    const PLURAL: &'static str = "clusters";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolName {
    pub name: String,
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl NodePoolName {
    pub fn new(cluster: ClusterName, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster_name: cluster.name,
            management_cluster_name: cluster.management_cluster_name,
            provisioner_name: cluster.provisioner_name,
            org_id: cluster.org_id,
        }
    }
}

impl FullName for NodePoolName {
    fn path_segments(&self) -> Vec<String> {
        vec![self.cluster_name.clone(), self.name.clone()]
    }

    fn query_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("managementClusterName", self.management_cluster_name.clone()),
            ("provisionerName", self.provisioner_name.clone()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_node_count: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cloud_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tkg_service_vsphere: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct NodePool;

impl ResourceKind for NodePool {
    type Name = NodePoolName;
    type Spec = NodePoolSpec;

    const KIND: &'static str = "node pool";
    const BASE_PATH: &'static str = "v1alpha1/clusters/{}/nodepools";
    const SINGULAR: &'static str = "nodepool";
    const PLURAL: &'static str = "nodepools";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl WorkspaceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            org_id: None,
        }
    }
}

impl FullName for WorkspaceName {
    fn path_segments(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSpec {}

#[derive(Debug, Clone, Copy)]
pub struct Workspace;

impl ResourceKind for Workspace {
    type Name = WorkspaceName;
    type Spec = WorkspaceSpec;

    const KIND: &'static str = "workspace";
    const BASE_PATH: &'static str = "v1alpha1/workspaces";
    const SINGULAR: &'static str = "workspace";
    const PLURAL: &'static str = "workspaces";
}
