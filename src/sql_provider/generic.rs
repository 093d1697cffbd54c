//! ANSI-leaning dialect used when no vendor dialect is configured.

use super::flags::SqlProviderFlags;
use super::generator::{ConvertType, SqlGenerator};

/// Double-quoted identifiers, `:name` parameters, LIMIT/OFFSET paging.
#[derive(Debug, Default)]
pub struct GenericGenerator;

impl GenericGenerator {
    pub fn new() -> Self {
        Self
    }
}

fn quote(name: &str) -> String {
    if name.starts_with('"') {
        return name.to_string();
    }
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqlGenerator for GenericGenerator {
    fn name(&self) -> &'static str {
        "Generic"
    }

    fn flags(&self) -> SqlProviderFlags {
        SqlProviderFlags::default()
    }

    fn convert_name(&self, name: &str, kind: ConvertType) -> String {
        match kind {
            ConvertType::NameToQueryParameter
            | ConvertType::NameToCommandParameter
            | ConvertType::NameToSprocParameter => format!(":{}", name),
            ConvertType::SprocParameterToName => name.strip_prefix(':').unwrap_or(name).to_string(),
            ConvertType::NameToDatabase | ConvertType::NameToOwner | ConvertType::NameToQueryTable => {
                if name.starts_with('"') {
                    name.to_string()
                } else {
                    name.split('.').map(quote).collect::<Vec<_>>().join(".")
                }
            }
            ConvertType::NameToQueryField
            | ConvertType::NameToQueryFieldAlias
            | ConvertType::NameToQueryTableAlias => quote(name),
        }
    }

    fn identity_query(&self) -> Option<&'static str> {
        Some("SELECT LAST_INSERT_ID()")
    }
}
