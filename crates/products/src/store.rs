use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, StoreId};

/// Store: owner of a set of products.
///
/// Aggregation is always scoped to one store's active products; an inactive
/// store is reported as not found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    id: StoreId,
    name: String,
    active: bool,
}

impl Store {
    pub fn new(id: StoreId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.trim().to_string(),
            active: true,
        })
    }

    /// Rebuild a store from persisted columns.
    pub fn rehydrate(id: StoreId, name: String, active: bool) -> Self {
        Self { id, name, active }
    }

    pub fn id_typed(&self) -> StoreId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
