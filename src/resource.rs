//! Declarative resource registrations.
//!
//! A resource type names its collection path once; the generic operations
//! below handle addressing, CRUD and the "missing object is `None`" rule.

use crate::context::CallContext;
use crate::error::Result;
use crate::path::ResourcePath;
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An appliance object type reachable under a fixed collection path
pub trait Resource: Serialize + DeserializeOwned {
    /// Collection path, e.g. `mgmt/tm/ltm/rule`
    const PATH: &'static str;

    /// Path of the collection
    fn collection() -> ResourcePath {
        ResourcePath::new(Self::PATH)
    }

    /// Path of one object, `name` plain or partition-qualified
    fn object(name: &str) -> ResourcePath {
        ResourcePath::new(Self::PATH).name(name)
    }
}

/// List envelope returned by collection reads
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl Session {
    /// List every object of a resource type
    pub fn list<R: Resource>(&self, cx: &CallContext) -> Result<Vec<R>> {
        let collection: Collection<R> = self.get_json(cx, &R::collection())?;
        Ok(collection.items)
    }

    /// Read one object; `None` when it does not exist
    pub fn fetch<R: Resource>(&self, cx: &CallContext, name: &str) -> Result<Option<R>> {
        Ok(self.get_for_entity(cx, &R::object(name))?.into_option())
    }

    /// Create an object in its collection
    pub fn create<R: Resource>(&self, cx: &CallContext, resource: &R) -> Result<()> {
        self.post(cx, &R::collection(), resource)
    }

    /// Partially update an object
    pub fn modify<R: Resource>(&self, cx: &CallContext, name: &str, resource: &R) -> Result<()> {
        self.patch(cx, &R::object(name), resource)
    }

    /// Replace an object
    pub fn replace<R: Resource>(&self, cx: &CallContext, name: &str, resource: &R) -> Result<()> {
        self.put(cx, &R::object(name), resource)
    }

    /// Delete an object
    pub fn remove<R: Resource>(&self, cx: &CallContext, name: &str) -> Result<()> {
        self.delete(cx, &R::object(name))
    }
}

/// LTM iRule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    /// Rule source
    #[serde(default, rename = "apiAnonymous", skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Resource for IRule {
    const PATH: &'static str = "mgmt/tm/ltm/rule";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irule_paths() {
        assert_eq!(IRule::collection().to_string(), "/mgmt/tm/ltm/rule");
        assert_eq!(IRule::object("/Common/redirect").to_string(), "/mgmt/tm/ltm/rule/~Common~redirect");
    }

    #[test]
    fn test_irule_serialization() {
        let rule = IRule {
            name: "redirect".to_string(),
            partition: Some("Common".to_string()),
            rule: Some("when HTTP_REQUEST { HTTP::redirect https://[HTTP::host][HTTP::uri] }".to_string()),
            ..IRule::default()
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["name"], "redirect");
        assert!(value["apiAnonymous"].as_str().unwrap().starts_with("when HTTP_REQUEST"));
        assert!(value.get("fullPath").is_none());
    }

    #[test]
    fn test_collection_without_items() {
        let collection: Collection<IRule> = serde_json::from_str(r#"{"kind": "tm:ltm:rule:rulecollectionstate"}"#).unwrap();
        assert!(collection.items.is_empty());
    }
}
