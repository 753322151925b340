use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use shipquote_core::domain::product::{Product, ProductId};

use super::{parse_decimal, ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sku: String = row.try_get("sku").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: i64 =
        row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let weight: Option<String> =
        row.try_get("weight").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(id),
        sku,
        name,
        active: active != 0,
        weight: weight.as_deref().map(|value| parse_decimal("weight", value)).transpose()?,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT id, sku, name, active, weight FROM product WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn find_weights(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Decimal>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, sku, name, active, weight FROM product WHERE weight IS NOT NULL AND id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(&id.0);
        }
        separated.push_unseparated(")");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut weights = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product = row_to_product(row)?;
            if let Some(weight) = product.weight {
                weights.insert(product.id, weight);
            }
        }
        Ok(weights)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, sku, name, active, weight)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 sku = excluded.sku,
                 name = excluded.name,
                 active = excluded.active,
                 weight = excluded.weight,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(&product.id.0)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(i64::from(product.active))
        .bind(product.weight.map(|weight| weight.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shipquote_core::domain::product::{Product, ProductId};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlProductRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProductRepository::new(pool)
    }

    fn product(id: &str, weight: Option<Decimal>) -> Product {
        Product {
            id: ProductId(id.to_string()),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            active: true,
            weight,
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let repo = setup().await;
        let tee = product("tee", Some(Decimal::new(5, 1)));

        repo.save(tee.clone()).await.expect("save");
        let found = repo.find_by_id(&tee.id).await.expect("find");

        assert_eq!(found, Some(tee));
    }

    #[tokio::test]
    async fn find_weights_skips_unknown_and_weightless_products() {
        let repo = setup().await;
        repo.save(product("tee", Some(Decimal::new(5, 1)))).await.expect("tee");
        repo.save(product("poster", None)).await.expect("poster");

        let weights = repo
            .find_weights(&[
                ProductId("tee".to_string()),
                ProductId("poster".to_string()),
                ProductId("ghost".to_string()),
            ])
            .await
            .expect("weights");

        assert_eq!(weights.len(), 1);
        assert_eq!(weights.get(&ProductId("tee".to_string())), Some(&Decimal::new(5, 1)));
    }

    #[tokio::test]
    async fn find_weights_with_no_ids_is_empty() {
        let repo = setup().await;
        assert!(repo.find_weights(&[]).await.expect("weights").is_empty());
    }
}
