//! Resource URI construction.
//!
//! iControl REST addresses a partition-qualified object such as
//! `/Common/web_pool` through a single path segment in which the partition
//! delimiters are replaced by `~` (`~Common~web_pool`). The appliance splits
//! that segment back into partition, folder and name itself, so the name must
//! never be broken into several segments.

use crate::error::Result;
use url::Url;

/// Appliance-specific query suffix.
///
/// iControl REST filtering does not follow generic key/value conventions, so
/// each option renders as one complete query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOption {
    /// `expandSubcollections=true`
    ExpandSubcollections,
    /// `options=<value>`, e.g. `options=extension,my_ext`
    Options(String),
    /// `$filter=<expression>`, e.g. `$filter=partition eq Common`
    Filter(String),
    /// Passed through untouched
    Raw(String),
}

impl QueryOption {
    /// Render the option as a query string (without the leading `?`)
    pub fn render(&self) -> String {
        match self {
            QueryOption::ExpandSubcollections => "expandSubcollections=true".to_string(),
            QueryOption::Options(value) => format!("options={}", value),
            QueryOption::Filter(expr) => format!("$filter={}", expr),
            QueryOption::Raw(raw) => raw.clone(),
        }
    }
}

/// Encode an object name as a single segment.
///
/// `/Common/web` becomes `~Common~web`; names without a partition are kept.
pub fn encode_name(name: &str) -> String {
    name.replace('/', "~")
}

/// Ordered description of a resource URI, rendered relative to the
/// appliance base address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    segments: Vec<String>,
    partition: Option<String>,
    name: Option<String>,
    sub_collection: Vec<String>,
    query: Option<QueryOption>,
}

impl ResourcePath {
    /// Start from a collection path such as `mgmt/tm/ltm/pool`.
    ///
    /// The collection is split on `/`; empty pieces are dropped.
    pub fn new(collection: &str) -> Self {
        ResourcePath::default().segments(collection)
    }

    /// Append literal segments, splitting on `/`
    pub fn segments(mut self, path: &str) -> Self {
        self.segments.extend(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        );
        self
    }

    /// Partition used when the name is not already partition-qualified
    pub fn partition(mut self, partition: &str) -> Self {
        let partition = partition.trim_matches('/');
        if !partition.is_empty() {
            self.partition = Some(partition.to_string());
        }
        self
    }

    /// Object name, plain (`web`) or partition-qualified (`/Common/web`).
    ///
    /// Without a partition attribute, `Common/web` is read as `/Common/web`.
    pub fn name(mut self, name: &str) -> Self {
        if !name.is_empty() {
            self.name = Some(name.to_string());
        }
        self
    }

    /// Sub-collection below the named object, e.g. `members`
    pub fn sub_collection(mut self, path: &str) -> Self {
        self.sub_collection.extend(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
        );
        self
    }

    /// Attach an appliance query option
    pub fn query(mut self, option: QueryOption) -> Self {
        self.query = Some(option);
        self
    }

    /// The encoded object segment, if a name was given
    pub fn object_segment(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        if name.starts_with('/') {
            return Some(encode_name(name));
        }
        match self.partition {
            Some(ref partition) => Some(encode_name(&format!("/{}/{}", partition, name))),
            None if name.contains('/') => Some(encode_name(&format!("/{}", name))),
            None => Some(encode_name(name)),
        }
    }

    /// All path segments in order, before percent-encoding
    pub fn to_segments(&self) -> Vec<String> {
        let mut out = self.segments.clone();
        out.extend(self.object_segment());
        out.extend(self.sub_collection.iter().cloned());
        out
    }

    /// Render against a base URL; every segment is percent-encoded on its own
    pub fn to_url(&self, base: &Url) -> Result<Url> {
        let mut url = base.clone();
        url.set_query(None);
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                crate::error::BigIpError::Config(format!("base URL cannot carry a path: {}", base))
            })?;
            path.pop_if_empty();
            for segment in self.to_segments() {
                path.push(&segment);
            }
        }
        if let Some(ref query) = self.query {
            url.set_query(Some(&query.render()));
        }
        Ok(url)
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.to_segments().join("/"))?;
        if let Some(ref query) = self.query {
            write!(f, "?{}", query.render())?;
        }
        Ok(())
    }
}
