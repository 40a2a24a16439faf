use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderItemRow {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub token_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct OrderItemInsert {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub token_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
/// Insert all line items of an order in a single statement.
pub struct InsertOrderItems {
    pub order_id: Uuid,
    pub items: Vec<OrderItemInsert>,
}

impl Processor<InsertOrderItems> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOrderItems")]
    async fn process(&self, insert: InsertOrderItems) -> Result<u64, sqlx::Error> {
        if insert.items.is_empty() {
            return Ok(0);
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO order_items (order_id, product_id, quantity, price, token_id) ",
        );
        let order_id = insert.order_id;
        query_builder.push_values(insert.items, |mut b, item| {
            b.push_bind(order_id)
                .push_bind(item.product_id)
                .push_bind(item.quantity)
                .push_bind(item.price)
                .push_bind(item.token_id);
        });

        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Line items of several orders, with the product name joined in.
pub struct GetOrderItems {
    pub order_ids: Vec<Uuid>,
}

impl Processor<GetOrderItems> for DatabaseProcessor {
    type Output = Vec<OrderItemRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderItems")]
    async fn process(&self, query: GetOrderItems) -> Result<Vec<OrderItemRow>, sqlx::Error> {
        if query.order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT oi.order_id, oi.product_id, p.name AS product_name,
                   oi.quantity, oi.price, oi.token_id
            FROM order_items oi
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.id
            "#,
        )
        .bind(&query.order_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
