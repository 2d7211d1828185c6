//! The metadata document consumed by the runtime.
//!
//! Resources are keyed by name in a sorted map so serialization is
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current metadata schema version.
pub const METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub version: u32,
    pub resources: BTreeMap<String, ResourceMetadata>,
}

impl Default for MetadataDocument {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub table: String,
    pub primary_key: Option<String>,
    pub fields: Vec<FieldMetadata>,
    pub relationships: Vec<RelationshipMetadata>,
    pub hooks: Vec<HookMetadata>,
    pub computed: Vec<ComputedMetadata>,
    pub routes: Vec<RouteMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub nullable: bool,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub field: String,
    pub kind: String,
    pub target: String,
    pub foreign_key: String,
    pub on_delete: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookMetadata {
    pub timing: String,
    pub event: String,
    pub transactional: bool,
    #[serde(rename = "async")]
    pub is_async: bool,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub nullable: bool,
}

/// A derived REST-style route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMetadata {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub middleware: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_key_names() {
        let hook = HookMetadata {
            timing: "after".into(),
            event: "create".into(),
            transactional: false,
            is_async: true,
            method: "after_create".into(),
        };
        let json = serde_json::to_value(&hook).unwrap();
        assert_eq!(json["async"], true);

        let field = FieldMetadata {
            name: "title".into(),
            ty: "string".into(),
            nullable: false,
            constraints: vec![],
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "string");
    }

    #[test]
    fn test_default_document_version() {
        let doc = MetadataDocument::default();
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"version":1,"resources":{}}"#);
    }
}
