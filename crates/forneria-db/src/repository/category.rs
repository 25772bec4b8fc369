//! # Category Repository

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use forneria_core::validation::validate_name;
use forneria_core::{Category, CoreError};

const SELECT_CATEGORY: &str = "SELECT id, name, description FROM categories";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!("{SELECT_CATEGORY} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!("{SELECT_CATEGORY} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    /// Creates a category. The name is optional but must not be blank when
    /// given.
    pub async fn insert(
        &self,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ServiceResult<Category> {
        if let Some(name) = name {
            validate_name("name", name)?;
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.map(|n| n.trim().to_string()),
            description: description.map(str::to_string),
        };

        debug!(id = %category.id, name = ?category.name, "Inserting category");

        sqlx::query("INSERT INTO categories (id, name, description) VALUES (?1, ?2, ?3)")
            .bind(&category.id)
            .bind(&category.name)
            .bind(&category.description)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    /// Deletes a category.
    ///
    /// ## Errors
    /// - `Domain(CategoryInUse)` while products still reference it
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        debug!(id = %id, "Deleting category");

        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from);

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(CoreError::CategoryNotFound(id.to_string()).into())
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_foreign_key() => Err(CoreError::CategoryInUse(id.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }
}
