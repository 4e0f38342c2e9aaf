//! Hydrated manifest lists
//!
//! `kpt fn source` prints the package as a `ResourceList` envelope. Each item
//! is re-serialized on its own so downstream consumers get plain resource
//! documents without the envelope.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeSet;

use crate::artifact::image_name;
use crate::error::{CoreError, Result};

const RESOURCE_LIST_KIND: &str = "ResourceList";
const CONTAINER_KEYS: [&str; 3] = ["containers", "initContainers", "ephemeralContainers"];

/// Ordered list of single-document YAML manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestList(Vec<String>);

impl ManifestList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append multi-document YAML, one entry per non-empty document
    pub fn append(&mut self, content: &str) {
        let mut current = String::new();
        for line in content.lines() {
            if is_separator(line) {
                self.push_document(&current);
                current.clear();
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        self.push_document(&current);
    }

    fn push_document(&mut self, doc: &str) {
        if !doc.trim().is_empty() {
            self.0.push(doc.to_string());
        }
    }

    /// Parse the output of `kpt fn source`
    ///
    /// Accepts a `ResourceList` envelope or a plain stream of resources.
    /// Empty output gives an empty list.
    pub fn from_resource_list(bytes: &[u8]) -> Result<Self> {
        let mut manifests = Self::new();
        if bytes.is_empty() {
            return Ok(manifests);
        }

        let text = std::str::from_utf8(bytes).map_err(|e| CoreError::InvalidManifest {
            message: format!("resource list is not valid UTF-8: {e}"),
        })?;

        let mut docs = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(text) {
            let value = Value::deserialize(doc)?;
            if !value.is_null() {
                docs.push(value);
            }
        }

        let items = match docs.as_slice() {
            [envelope] if is_resource_list(envelope) => resource_list_items(envelope)?,
            _ => docs,
        };

        for item in &items {
            if !item.is_mapping() {
                return Err(CoreError::InvalidManifest {
                    message: "resource list item is not a mapping".to_string(),
                });
            }
            manifests.0.push(serde_yaml::to_string(item)?);
        }
        Ok(manifests)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Distinct namespaces declared by the manifests, sorted
    ///
    /// Cluster-scoped resources and resources relying on the default
    /// namespace do not contribute.
    pub fn collect_namespaces(&self) -> Result<Vec<String>> {
        let mut namespaces = BTreeSet::new();
        for doc in &self.0 {
            let value: Value = serde_yaml::from_str(doc)?;
            let namespace = value
                .get("metadata")
                .and_then(|m| m.get("namespace"))
                .and_then(Value::as_str);
            if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
                namespaces.insert(ns.to_string());
            }
        }
        Ok(namespaces.into_iter().collect())
    }

    /// Distinct image names used by containers in the manifests, sorted
    ///
    /// Documents that fail to parse are skipped.
    pub fn collect_images(&self) -> Vec<String> {
        let mut images = BTreeSet::new();
        for doc in &self.0 {
            if let Ok(value) = serde_yaml::from_str::<Value>(doc) {
                find_images(&value, &mut images);
            }
        }
        images.into_iter().collect()
    }
}

impl std::fmt::Display for ManifestList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, doc) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f, "---")?;
            }
            write!(f, "{}", doc)?;
        }
        Ok(())
    }
}

fn is_separator(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line.starts_with("--- ")
}

fn is_resource_list(value: &Value) -> bool {
    value.get("kind").and_then(Value::as_str) == Some(RESOURCE_LIST_KIND)
}

fn resource_list_items(envelope: &Value) -> Result<Vec<Value>> {
    match envelope.get("items") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => Ok(items.clone()),
        Some(_) => Err(CoreError::InvalidManifest {
            message: "ResourceList items must be a sequence".to_string(),
        }),
    }
}

fn find_images(value: &Value, images: &mut BTreeSet<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_containers = key
                    .as_str()
                    .is_some_and(|k| CONTAINER_KEYS.contains(&k));
                if let (true, Some(containers)) = (is_containers, child.as_sequence()) {
                    for image in containers
                        .iter()
                        .filter_map(|c| c.get("image").and_then(Value::as_str))
                    {
                        images.insert(image_name(image).to_string());
                    }
                } else {
                    find_images(child, images);
                }
            }
        }
        Value::Sequence(items) => items.iter().for_each(|item| find_images(item, images)),
        _ => {}
    }
}
