//! iRules LX workspaces.
//!
//! Workspaces and extensions are ordinary CRUD objects; their rule and
//! extension source files live on the appliance file system and go through
//! the chunked file transfer.

use crate::context::CallContext;
use crate::error::{BigIpError, Result};
use crate::path::QueryOption;
use crate::resource::Resource;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Root of the workspace tree on the appliance file system
pub const WORKSPACE_UPLOAD_PATH: &str = "/var/ilx/workspaces";

/// ILX workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IlxWorkspace {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub full_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub staged_directory: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IlxFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
}

impl Resource for IlxWorkspace {
    const PATH: &'static str = "mgmt/tm/ilx/workspace";
}

/// Source file in a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlxFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

/// Node.js extension of a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<IlxFile>,
}

/// Files an extension may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionFile {
    PackageJson,
    IndexJs,
}

impl ExtensionFile {
    /// File name on the appliance
    pub fn file_name(&self) -> &'static str {
        match self {
            ExtensionFile::PackageJson => "package.json",
            ExtensionFile::IndexJs => "index.js",
        }
    }
}

impl FromStr for ExtensionFile {
    type Err = BigIpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "package.json" => Ok(ExtensionFile::PackageJson),
            "index.js" => Ok(ExtensionFile::IndexJs),
            other => Err(BigIpError::Config(format!("invalid extension file: {}", other))),
        }
    }
}

/// Workspace addressed by partition and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub workspace_name: String,
    pub partition: String,
}

impl WorkspaceConfig {
    pub fn new(workspace_name: &str, partition: &str) -> Self {
        WorkspaceConfig {
            workspace_name: workspace_name.to_string(),
            partition: partition.to_string(),
        }
    }

    fn root(&self) -> String {
        format!("{}/{}/{}", WORKSPACE_UPLOAD_PATH, self.partition, self.workspace_name)
    }

    /// File-system path of a rule file
    pub fn rule_path(&self, filename: &str) -> String {
        format!("{}/rules/{}", self.root(), filename)
    }
}

/// Extension inside a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    pub workspace: WorkspaceConfig,
    pub extension_name: String,
}

impl ExtensionConfig {
    pub fn new(workspace: WorkspaceConfig, extension_name: &str) -> Self {
        ExtensionConfig {
            workspace,
            extension_name: extension_name.to_string(),
        }
    }

    /// File-system path of an extension file
    pub fn file_path(&self, file: ExtensionFile) -> String {
        format!(
            "{}/extensions/{}/{}",
            self.workspace.root(),
            self.extension_name,
            file.file_name()
        )
    }
}

impl Session {
    /// Read a workspace; `None` when it does not exist
    pub fn get_workspace(&self, cx: &CallContext, name: &str) -> Result<Option<IlxWorkspace>> {
        self.fetch(cx, name)
    }

    /// Create an empty workspace
    pub fn create_workspace(&self, cx: &CallContext, name: &str) -> Result<()> {
        let workspace = IlxWorkspace {
            name: name.to_string(),
            ..IlxWorkspace::default()
        };
        self.create(cx, &workspace)
    }

    /// Delete a workspace
    pub fn delete_workspace(&self, cx: &CallContext, name: &str) -> Result<()> {
        self.remove::<IlxWorkspace>(cx, name)
    }

    /// Add an extension to a workspace
    pub fn create_extension(&self, cx: &CallContext, opts: &ExtensionConfig) -> Result<()> {
        let workspace = IlxWorkspace {
            name: opts.workspace.workspace_name.clone(),
            ..IlxWorkspace::default()
        };
        let path = IlxWorkspace::collection()
            .query(QueryOption::Options(format!("extension,{}", opts.extension_name)));
        self.post(cx, &path, &workspace)
    }

    /// Upload a rule file into a workspace
    pub fn write_rule_file(&self, cx: &CallContext, opts: &WorkspaceConfig, content: &str, filename: &str) -> Result<()> {
        self.write_file(cx, content.as_bytes(), &opts.rule_path(filename))?;
        Ok(())
    }

    /// Upload `package.json` or `index.js` into an extension
    pub fn write_extension_file(
        &self,
        cx: &CallContext,
        opts: &ExtensionConfig,
        content: &str,
        file: ExtensionFile,
    ) -> Result<()> {
        self.write_file(cx, content.as_bytes(), &opts.file_path(file))?;
        Ok(())
    }

    /// Download a rule file from a workspace
    pub fn read_rule_file(&self, cx: &CallContext, opts: &WorkspaceConfig, filename: &str) -> Result<IlxFile> {
        self.read_text_file(cx, &opts.rule_path(filename), filename)
    }

    /// Download an extension file
    pub fn read_extension_file(&self, cx: &CallContext, opts: &ExtensionConfig, file: ExtensionFile) -> Result<IlxFile> {
        self.read_text_file(cx, &opts.file_path(file), file.file_name())
    }

    fn read_text_file(&self, cx: &CallContext, path: &str, name: &str) -> Result<IlxFile> {
        let bytes = self.read_file(cx, path)?;
        let content = String::from_utf8(bytes)
            .map_err(|_| BigIpError::Protocol(format!("{} is not valid UTF-8", path)))?;
        Ok(IlxFile {
            name: name.to_string(),
            content,
        })
    }
}
