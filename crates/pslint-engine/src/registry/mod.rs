//! Registry of externally available commands.
//!
//! The analyzer never inspects external commands; it only needs to know that
//! a name exists. [`CommandRegistry`] collects descriptors from the built-in
//! list, JSON manifests, and explicit registrations, then produces one
//! immutable [`ExternalCommands`] map before any analysis starts.
//!
//! Manifests use the shape PowerShell itself emits:
//!
//! ```text
//! Get-Command -Module Pester | Select-Object Name, ModuleName, CommandType |
//!     ConvertTo-Json > pester.json
//! ```

mod builtins;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of command a descriptor names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Alias,
    Function,
    Filter,
    Cmdlet,
    ExternalScript,
    Application,
    Script,
    Configuration,
    Unknown,
}

impl CommandKind {
    /// Map PowerShell's `CommandTypes` flag value.
    fn from_flag(flag: u64) -> Self {
        match flag {
            1 => CommandKind::Alias,
            2 => CommandKind::Function,
            4 => CommandKind::Filter,
            8 => CommandKind::Cmdlet,
            16 => CommandKind::ExternalScript,
            32 => CommandKind::Application,
            64 => CommandKind::Script,
            256 => CommandKind::Configuration,
            _ => CommandKind::Unknown,
        }
    }

    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "alias" => CommandKind::Alias,
            "function" => CommandKind::Function,
            "filter" => CommandKind::Filter,
            "cmdlet" => CommandKind::Cmdlet,
            "externalscript" => CommandKind::ExternalScript,
            "application" => CommandKind::Application,
            "script" => CommandKind::Script,
            "configuration" => CommandKind::Configuration,
            _ => CommandKind::Unknown,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Alias => "alias",
            CommandKind::Function => "function",
            CommandKind::Filter => "filter",
            CommandKind::Cmdlet => "cmdlet",
            CommandKind::ExternalScript => "externalscript",
            CommandKind::Application => "application",
            CommandKind::Script => "script",
            CommandKind::Configuration => "configuration",
            CommandKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// A command known to exist outside the analyzed scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    pub name: String,
    /// Owning module. `None` for host built-ins, which are always available.
    pub module: Option<String>,
    pub kind: CommandKind,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            module: None,
            kind,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Immutable name → descriptor map handed to the analyzer.
///
/// Lookups are case-insensitive. Iteration is in lowercase-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCommands {
    commands: BTreeMap<String, CommandDescriptor>,
}

impl ExternalCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a command by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    /// Insert unless the name is already present. The first entry wins.
    fn insert_first(&mut self, descriptor: CommandDescriptor) {
        self.commands
            .entry(descriptor.name.to_lowercase())
            .or_insert(descriptor);
    }
}

impl FromIterator<CommandDescriptor> for ExternalCommands {
    fn from_iter<T: IntoIterator<Item = CommandDescriptor>>(iter: T) -> Self {
        let mut commands = ExternalCommands::new();
        for descriptor in iter {
            commands.insert_first(descriptor);
        }
        commands
    }
}

/// Errors loading a command manifest.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One object of `Get-Command | ConvertTo-Json` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    module_name: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    command_type: Option<RawKind>,
}

/// `CommandType` serializes as a flag number, or as a name with `-EnumsAsStrings`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKind {
    Flag(u64),
    Name(String),
}

/// `ConvertTo-Json` emits a bare object when there is exactly one command.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Many(Vec<ManifestEntry>),
    One(ManifestEntry),
}

impl From<ManifestEntry> for CommandDescriptor {
    fn from(entry: ManifestEntry) -> Self {
        let kind = match entry.command_type {
            Some(RawKind::Flag(flag)) => CommandKind::from_flag(flag),
            Some(RawKind::Name(name)) => CommandKind::from_name(&name),
            None => CommandKind::Unknown,
        };
        // Applications and scripts report a file path as their source.
        let source_is_module = !matches!(kind, CommandKind::Application | CommandKind::ExternalScript);
        let module = entry
            .module_name
            .filter(|m| !m.is_empty())
            .or_else(|| entry.source.filter(|s| source_is_module && !s.is_empty()));
        CommandDescriptor {
            name: entry.name,
            module,
            kind,
        }
    }
}

/// Collects command descriptors from every configured source.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the host's built-in cmdlets, functions, and aliases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins = builtins::CMDLETS
            .iter()
            .map(|name| (name, CommandKind::Cmdlet))
            .chain(builtins::FUNCTIONS.iter().map(|name| (name, CommandKind::Function)))
            .chain(builtins::ALIASES.iter().map(|name| (name, CommandKind::Alias)));
        for (name, kind) in builtins {
            registry.register(CommandDescriptor::new(*name, kind));
        }
        registry
    }

    /// Register a command.
    pub fn register(&mut self, descriptor: CommandDescriptor) {
        self.entries.push(descriptor);
    }

    /// Load a JSON manifest from disk. Returns the number of commands added.
    pub fn load_manifest(&mut self, path: impl AsRef<Path>) -> Result<usize, RegistryError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_manifest_str(&text).map_err(|source| RegistryError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a JSON manifest from a string. Returns the number of commands added.
    pub fn load_manifest_str(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let entries = match serde_json::from_str::<Manifest>(json)? {
            Manifest::Many(entries) => entries,
            Manifest::One(entry) => vec![entry],
        };
        let count = entries.len();
        self.entries.extend(entries.into_iter().map(CommandDescriptor::from));
        tracing::debug!(count, "loaded command manifest");
        Ok(count)
    }

    /// Number of registered descriptors, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produce the external command map.
    ///
    /// Commands without a module are always included. Module commands are
    /// included when `modules` is empty or names their module (ignoring case).
    /// When a name appears more than once, the first registration wins.
    pub fn list_external_commands(&self, modules: &[String]) -> ExternalCommands {
        let wanted = |descriptor: &CommandDescriptor| match &descriptor.module {
            None => true,
            Some(module) => modules.is_empty() || modules.iter().any(|m| m.eq_ignore_ascii_case(module)),
        };
        let commands: ExternalCommands = self.entries.iter().filter(|d| wanted(*d)).cloned().collect();
        tracing::debug!(commands = commands.len(), modules = ?modules, "built external command map");
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_case_insensitively() {
        let commands = CommandRegistry::with_builtins().list_external_commands(&[]);
        assert!(commands.contains("Get-ChildItem"));
        assert!(commands.contains("get-childitem"));
        assert!(commands.contains("GCI"));
        assert!(commands.contains("%"));
        assert!(!commands.contains("Get-Nothing"));
        assert_eq!(commands.get("write-host").map(|d| d.kind), Some(CommandKind::Cmdlet));
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandDescriptor::new("Invoke-Build", CommandKind::Function).with_module("First"));
        registry.register(CommandDescriptor::new("invoke-build", CommandKind::Cmdlet).with_module("Second"));

        let commands = registry.list_external_commands(&[]);
        assert_eq!(commands.len(), 1);
        let descriptor = commands.get("INVOKE-BUILD").unwrap();
        assert_eq!(descriptor.name, "Invoke-Build");
        assert_eq!(descriptor.module.as_deref(), Some("First"));
    }

    #[test]
    fn module_filter() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandDescriptor::new("Core-Thing", CommandKind::Cmdlet));
        registry.register(CommandDescriptor::new("Invoke-Pester", CommandKind::Function).with_module("Pester"));
        registry.register(CommandDescriptor::new("Invoke-Build", CommandKind::Function).with_module("InvokeBuild"));

        let all = registry.list_external_commands(&[]);
        assert_eq!(all.len(), 3);

        let pester = registry.list_external_commands(&["pester".to_string()]);
        assert!(pester.contains("Core-Thing"));
        assert!(pester.contains("Invoke-Pester"));
        assert!(!pester.contains("Invoke-Build"));
    }

    #[test]
    fn manifest_with_numeric_command_types() {
        let json = r#"[
            { "Name": "Invoke-Pester", "ModuleName": "Pester", "CommandType": 2 },
            { "Name": "Should", "Source": "Pester", "CommandType": 2 },
            { "Name": "git.exe", "Source": "C:\\Program Files\\Git\\cmd\\git.exe", "CommandType": 32 }
        ]"#;
        let mut registry = CommandRegistry::new();
        assert_eq!(registry.load_manifest_str(json).unwrap(), 3);

        let commands = registry.list_external_commands(&[]);
        let should = commands.get("should").unwrap();
        assert_eq!(should.module.as_deref(), Some("Pester"));
        assert_eq!(should.kind, CommandKind::Function);

        let git = commands.get("git.exe").unwrap();
        assert_eq!(git.kind, CommandKind::Application);
        assert_eq!(git.module, None);
    }

    #[test]
    fn manifest_with_string_command_types_and_single_object() {
        let mut registry = CommandRegistry::new();
        let json = r#"{ "Name": "Get-Widget", "ModuleName": "Widgets", "CommandType": "Cmdlet" }"#;
        assert_eq!(registry.load_manifest_str(json).unwrap(), 1);
        let commands = registry.list_external_commands(&[]);
        assert_eq!(commands.get("Get-Widget").map(|d| d.kind), Some(CommandKind::Cmdlet));
    }

    #[test]
    fn invalid_manifest_is_an_error() {
        let mut registry = CommandRegistry::new();
        assert!(registry.load_manifest_str("{ not json").is_err());
        assert!(registry.load_manifest_str(r#"[{ "Module": "x" }]"#).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_manifest_file_reports_path() {
        let mut registry = CommandRegistry::new();
        let err = registry.load_manifest("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
