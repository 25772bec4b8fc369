//! # Nutrition Repository
//!
//! Nutrition facts are owned by their product: the schema deletes the
//! record when the product is deleted.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbResult, ServiceResult};
use forneria_core::validation::validate_nutrition;
use forneria_core::NutritionInfo;

#[derive(Debug, Clone)]
pub struct NutritionRepository {
    pool: SqlitePool,
}

impl NutritionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NutritionRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<NutritionInfo>> {
        let info = sqlx::query_as::<_, NutritionInfo>(
            r#"
            SELECT id, calories, proteins_centigrams, fats_centigrams,
                   carbohydrates_centigrams, sugars_centigrams, sodium_centigrams
            FROM nutrition_info
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(info)
    }

    /// Stores nutrition facts under a fresh id; the `id` field of `info` is
    /// ignored.
    pub async fn insert(&self, info: &NutritionInfo) -> ServiceResult<NutritionInfo> {
        validate_nutrition(info)?;

        let stored = NutritionInfo {
            id: Uuid::new_v4().to_string(),
            ..info.clone()
        };

        debug!(id = %stored.id, "Inserting nutrition info");

        sqlx::query(
            r#"
            INSERT INTO nutrition_info (
                id, calories, proteins_centigrams, fats_centigrams,
                carbohydrates_centigrams, sugars_centigrams, sodium_centigrams
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&stored.id)
        .bind(stored.calories)
        .bind(stored.proteins_centigrams)
        .bind(stored.fats_centigrams)
        .bind(stored.carbohydrates_centigrams)
        .bind(stored.sugars_centigrams)
        .bind(stored.sodium_centigrams)
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{draft, seed_category, test_db};
    use forneria_core::NutritionInfo;

    #[tokio::test]
    async fn test_deleting_product_deletes_nutrition() {
        let db = test_db().await;
        let category = seed_category(&db).await;
        let info = db
            .nutrition()
            .insert(&NutritionInfo {
                calories: Some(270),
                carbohydrates_centigrams: Some(5_600),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut d = draft(&category.id, "PAN-01", 200, 5);
        d.nutrition_id = Some(info.id.clone());
        let product = db.products().insert(&d).await.unwrap();

        db.products().delete(&product.id).await.unwrap();
        assert!(db.nutrition().get_by_id(&info.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let db = test_db().await;
        let result = db
            .nutrition()
            .insert(&NutritionInfo {
                fats_centigrams: Some(-1),
                ..Default::default()
            })
            .await;
        assert!(result.is_err());
    }
}
