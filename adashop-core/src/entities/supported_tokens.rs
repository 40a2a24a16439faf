use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SupportedTokenRow {
    pub id: Uuid,
    pub policy_id: String,
    pub asset_name: String,
    pub display_name: Option<String>,
    pub decimals: i16,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct GetSupportedTokensByIds {
    pub ids: Vec<Uuid>,
}

impl Processor<GetSupportedTokensByIds> for DatabaseProcessor {
    type Output = Vec<SupportedTokenRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSupportedTokensByIds")]
    async fn process(
        &self,
        query: GetSupportedTokensByIds,
    ) -> Result<Vec<SupportedTokenRow>, sqlx::Error> {
        if query.ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, SupportedTokenRow>(
            r#"
            SELECT id, policy_id, asset_name, display_name, decimals, is_active
            FROM supported_tokens
            WHERE id = ANY($1)
            "#,
        )
        .bind(&query.ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
