//! Registry of entity descriptors, keyed by entity name.

use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};

use super::descriptor::EntityDescriptor;

#[derive(Debug, Clone, Default)]
pub struct MappingSchema {
    entities: HashMap<String, EntityDescriptor>,
}

impl MappingSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        let mut schema = Self::new();
        for entity in entities {
            schema.register(entity);
        }
        schema
    }

    /// Register or replace an entity.
    pub fn register(&mut self, entity: EntityDescriptor) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn entity(&self, name: &str) -> QueryResult<&EntityDescriptor> {
        self.entities
            .get(name)
            .ok_or_else(|| QueryError::UnknownEntity(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_entity() {
        let schema = MappingSchema::from_entities([EntityDescriptor::new("Person")]);
        assert!(schema.entity("Person").is_ok());
        assert!(matches!(
            schema.entity("Animal"),
            Err(QueryError::UnknownEntity(name)) if name == "Animal"
        ));
    }
}
