//! # Client Repository
//!
//! Customers. The walk-in client ("Varios") is created by migration and can
//! not be deleted while it has sales, like any other client.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use forneria_core::validation::{validate_email, validate_name, validate_tax_id};
use forneria_core::{Client, CoreError};

const SELECT_CLIENT: &str = "SELECT id, tax_id, name, email FROM clients";

#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!("{SELECT_CLIENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    pub async fn list(&self) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(&format!("{SELECT_CLIENT} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        Ok(clients)
    }

    pub async fn insert(
        &self,
        name: &str,
        tax_id: Option<&str>,
        email: Option<&str>,
    ) -> ServiceResult<Client> {
        validate_name("name", name)?;
        if let Some(tax_id) = tax_id {
            validate_tax_id(tax_id)?;
        }
        if let Some(email) = email {
            validate_email(email)?;
        }

        let client = Client {
            id: Uuid::new_v4().to_string(),
            tax_id: tax_id.map(|t| t.trim().to_string()),
            name: name.trim().to_string(),
            email: email.map(|e| e.trim().to_string()),
        };

        debug!(id = %client.id, "Inserting client");

        sqlx::query("INSERT INTO clients (id, tax_id, name, email) VALUES (?1, ?2, ?3, ?4)")
            .bind(&client.id)
            .bind(&client.tax_id)
            .bind(&client.name)
            .bind(&client.email)
            .execute(&self.pool)
            .await?;

        Ok(client)
    }

    /// Deletes a client.
    ///
    /// ## Errors
    /// - `Domain(ClientInUse)` while sales reference it
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        debug!(id = %id, "Deleting client");

        let result = sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from);

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(CoreError::ClientNotFound(id.to_string()).into())
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_foreign_key() => Err(CoreError::ClientInUse(id.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }
}
