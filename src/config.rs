//! Compiler configuration loaded from `querygen.toml`.
//!
//! ```toml
//! [provider]
//! name = "SqlServer"
//! version = "2012"
//!
//! reserved_words = "extra_words.txt"
//!
//! [[entities]]
//! name = "Person"
//! table = "People"
//! [[entities.columns]]
//! member = "Id"
//! column = "PersonID"
//! type = "int"
//! primary_key = 1
//! identity = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::ast::ReservedWords;
use crate::error::{QueryError, QueryResult};
use crate::mapping::{EntityDescriptor, MappingSchema};
use crate::sql_provider::DataProvider;

/// File looked up in the working directory.
pub const LOCAL_CONFIG: &str = "querygen.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Extra reserved words, one per line, added to the built-in list.
    #[serde(default)]
    pub reserved_words: Option<PathBuf>,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    /// Directory of the file this was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    /// `2000`, `2005`, `2008`, `2012`, `2014` or `default`; SQL Server only.
    #[serde(default)]
    pub version: Option<String>,
}

fn default_provider_name() -> String {
    "SqlServer".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            version: None,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml(content: &str) -> QueryResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> QueryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        debug!(path = %path.display(), entities = config.entities.len(), "loaded config");
        Ok(config)
    }

    /// Load from `explicit`, else `./querygen.toml`, else the user config
    /// directory. No file at all yields the defaults; an explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> QueryResult<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(QueryError::Config(format!(
                    "config file '{}' not found",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }
        for path in Self::search_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        debug!("no config file found; using defaults");
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("querygen").join("config.toml"));
        }
        paths
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn reserved_words(&self) -> QueryResult<ReservedWords> {
        let builtin = ReservedWords::builtin();
        match &self.reserved_words {
            Some(path) => builtin.with_file(&self.resolve(path)),
            None => Ok(builtin),
        }
    }

    /// The configured provider. A version overrides the one in the name.
    pub fn provider(&self) -> QueryResult<DataProvider> {
        let name = self.provider.name.as_str();
        let provider = match (&self.provider.version, name) {
            (Some(version), "SqlServer") => DataProvider::sql_server(version),
            (Some(_), "Generic") => {
                return Err(QueryError::Config(
                    "the Generic provider has no versions".to_string(),
                ));
            }
            _ => DataProvider::from_name(name)?,
        };
        Ok(provider.with_reserved_words(self.reserved_words()?))
    }

    pub fn schema(&self) -> MappingSchema {
        MappingSchema::from_entities(self.entities.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mapping::DataType;

    const PEOPLE: &str = r#"
[provider]
name = "SqlServer"
version = "2000"

[[entities]]
name = "Person"
table = "People"

[[entities.columns]]
member = "Id"
column = "PersonID"
type = "int"
primary_key = 1
identity = true

[[entities.columns]]
member = "Name"
type = "nvarchar(50)"
can_be_null = true
"#;

    #[test]
    fn test_parse_entities() {
        let config = CompilerConfig::from_toml(PEOPLE).unwrap();
        let schema = config.schema();
        let person = schema.entity("Person").unwrap();
        assert_eq!(person.table_name(), "People");
        assert_eq!(person.columns.len(), 2);

        let id = person.find_member("Id").unwrap();
        assert_eq!(id.column_name(), "PersonID");
        assert_eq!(id.data_type.data_type, DataType::Int32);
        assert!(id.identity);
        assert_eq!(id.primary_key, Some(1));

        let name = person.find_member("Name").unwrap();
        assert_eq!(name.data_type.length, Some(50));
        assert!(name.can_be_null);
    }

    #[test]
    fn test_provider_from_config() {
        let config = CompilerConfig::from_toml(PEOPLE).unwrap();
        let provider = config.provider().unwrap();
        assert_eq!(provider.name(), "SqlServer.2000");
        assert!(!provider.flags().is_skip_supported);
    }

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_toml("").unwrap();
        assert_eq!(config.provider.name, "SqlServer");
        assert!(config.entities.is_empty());
        assert_eq!(config.provider().unwrap().name(), "SqlServer.2008");
    }

    #[test]
    fn test_generic_has_no_versions() {
        let config = CompilerConfig::from_toml("[provider]\nname = \"Generic\"\nversion = \"2012\"").unwrap();
        assert!(matches!(config.provider(), Err(QueryError::Config(_))));

        let config = CompilerConfig::from_toml("[provider]\nname = \"Oracle\"").unwrap();
        assert!(matches!(config.provider(), Err(QueryError::Config(_))));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let content = "[[entities]]\nname = \"X\"\n[[entities.columns]]\nmember = \"A\"\ntype = \"frobnicate\"";
        assert!(matches!(CompilerConfig::from_toml(content), Err(QueryError::Toml(_))));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = CompilerConfig::load(Some(Path::new("/nonexistent/querygen.toml"))).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)), "{}", err);
    }

    #[test]
    fn test_reserved_words_file_relative_to_config() {
        let dir = std::env::temp_dir().join(format!("querygen-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("words.txt"), "frobnicate\n").unwrap();
        let path = dir.join("querygen.toml");
        std::fs::write(&path, "reserved_words = \"words.txt\"\n").unwrap();

        let config = CompilerConfig::load(Some(&path)).unwrap();
        let words = config.reserved_words().unwrap();
        assert!(words.is_reserved("FROBNICATE"));
        assert!(words.is_reserved("select"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
