use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub token_id: Option<Uuid>,
    pub stock: i32,
    pub is_active: bool,
}

/// Stock as shown to shoppers: inactive or deleted products report 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StockLevelRow {
    pub id: Uuid,
    pub stock: i32,
}

#[derive(Debug, Clone)]
/// Fetch non-deleted products by id. Missing ids are simply absent from the output.
pub struct GetProductsByIds {
    pub ids: Vec<Uuid>,
}

impl Processor<GetProductsByIds> for DatabaseProcessor {
    type Output = Vec<ProductRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetProductsByIds")]
    async fn process(&self, query: GetProductsByIds) -> Result<Vec<ProductRow>, sqlx::Error> {
        if query.ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, price, token_id, stock, is_active
            FROM products
            WHERE id = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(&query.ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct GetStockLevels {
    pub ids: Vec<Uuid>,
}

impl Processor<GetStockLevels> for DatabaseProcessor {
    type Output = Vec<StockLevelRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetStockLevels")]
    async fn process(&self, query: GetStockLevels) -> Result<Vec<StockLevelRow>, sqlx::Error> {
        if query.ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, StockLevelRow>(
            r#"
            SELECT
                id,
                CASE WHEN is_active AND deleted_at IS NULL THEN stock ELSE 0 END AS stock
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(&query.ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
