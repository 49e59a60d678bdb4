//! Category service
//!
//! CRUD for categories. Names are sealed, so lookups by name decrypt the
//! category list; deletion checks references through the plaintext index.

use tracing::info;

use crate::audit::EntityType;
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::category::{is_reserved_name, validate_name};
use crate::models::{Amount, Category, CategoryId, CategoryRecord, CategoryRef, CategoryType};
use crate::storage::Storage;

/// Service for category management
pub struct CategoryService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
}

impl<'a> CategoryService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession) -> Self {
        Self { storage, session }
    }

    /// Create a new category
    pub fn create(
        &self,
        name: &str,
        limit: Option<Amount>,
        category_type: CategoryType,
    ) -> StrongboxResult<Category> {
        validate_name(name)?;
        if category_type == CategoryType::Transfer {
            return Err(StrongboxError::Validation(
                "Transfer is not a category type that can be created".into(),
            ));
        }

        let name = name.trim();
        if self.find_by_name(name)?.is_some() {
            return Err(StrongboxError::Duplicate {
                entity_type: "Category",
                identifier: name.to_string(),
            });
        }

        let record = CategoryRecord::seal(self.session, name, limit.as_ref(), category_type)?;
        let record = self.storage.categories.insert(record)?;
        self.storage.log_create(EntityType::Category, record.id)?;
        info!(id = %record.id, "Created category");

        record.open(self.session)
    }

    pub fn get(&self, id: CategoryId) -> StrongboxResult<Option<Category>> {
        self.storage
            .categories
            .get(id)?
            .map(|record| record.open(self.session))
            .transpose()
    }

    /// All categories, sorted by name
    pub fn list(&self) -> StrongboxResult<Vec<Category>> {
        let mut categories = self
            .storage
            .categories
            .all()?
            .iter()
            .map(|record| record.open(self.session))
            .collect::<StrongboxResult<Vec<_>>>()?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Exact-name lookup
    pub fn find_by_name(&self, name: &str) -> StrongboxResult<Option<Category>> {
        let name = name.trim();
        for record in self.storage.categories.all()? {
            let category = record.open(self.session)?;
            if category.name == name {
                return Ok(Some(category));
            }
        }
        Ok(None)
    }

    /// Find a category by name or id string
    pub fn find(&self, identifier: &str) -> StrongboxResult<Option<Category>> {
        if let Some(category) = self.find_by_name(identifier)? {
            return Ok(Some(category));
        }
        if let Ok(id) = identifier.parse::<CategoryId>() {
            return self.get(id);
        }
        Ok(None)
    }

    /// Resolve a category name to a row assignment
    ///
    /// The reserved transfer name maps to the sentinel; anything else must
    /// name a stored category.
    pub fn resolve_ref(&self, name: &str) -> StrongboxResult<Option<CategoryRef>> {
        if is_reserved_name(name) {
            return Ok(Some(CategoryRef::Transfer));
        }
        Ok(self.find_by_name(name)?.map(|c| c.category_ref()))
    }

    pub fn update_limit(&self, id: CategoryId, limit: Option<Amount>) -> StrongboxResult<Category> {
        let mut record = self.storage.categories.require(id)?;
        record.reseal_limit(self.session, limit.as_ref())?;
        self.storage.categories.update(record.clone())?;
        self.storage.log_update(EntityType::Category, id)?;
        record.open(self.session)
    }

    /// Delete a category that no transaction references
    pub fn delete(&self, id: CategoryId) -> StrongboxResult<()> {
        self.storage.categories.require(id)?;

        let references = self.storage.transactions.ids_by_category(id)?.len();
        if references > 0 {
            return Err(StrongboxError::InUse {
                entity_type: "Category",
                identifier: id.to_string(),
                references,
            });
        }

        self.storage.categories.delete(id)?;
        self.storage.log_delete(EntityType::Category, id)?;
        info!(id = %id, "Deleted category");
        Ok(())
    }
}
