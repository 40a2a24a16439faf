use crate::entities::OrderStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub wallet_address: String,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub cardano_tx_hash: Option<String>,
    pub payment_error: Option<String>,
    pub token_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Insert a new `pending` order.
pub struct InsertOrder {
    pub id: Uuid,
    pub wallet_address: String,
    pub total_amount: i64,
    pub token_id: Option<Uuid>,
}

impl Processor<InsertOrder> for DatabaseProcessor {
    type Output = OrderRow;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOrder")]
    async fn process(&self, insert: InsertOrder) -> Result<OrderRow, sqlx::Error> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (id, wallet_address, total_amount, token_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, wallet_address, total_amount, status,
                      cardano_tx_hash, payment_error, token_id, created_at
            "#,
        )
        .bind(insert.id)
        .bind(insert.wallet_address)
        .bind(insert.total_amount)
        .bind(insert.token_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[derive(Debug, Clone)]
/// Hard-delete an order together with its line items.
///
/// Only used to undo a half-created order; everything else soft-deletes.
pub struct DeleteOrder {
    pub id: Uuid,
}

impl Processor<DeleteOrder> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteOrder")]
    async fn process(&self, cmd: DeleteOrder) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            WITH purged_items AS (
                DELETE FROM order_items WHERE order_id = $1
            )
            DELETE FROM orders WHERE id = $1
            "#,
        )
        .bind(cmd.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Fetch one live order, optionally requiring it to belong to a wallet.
pub struct GetOrderById {
    pub id: Uuid,
    pub wallet_address: Option<String>,
}

impl Processor<GetOrderById> for DatabaseProcessor {
    type Output = Option<OrderRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderById")]
    async fn process(&self, query: GetOrderById) -> Result<Option<OrderRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, wallet_address, total_amount, status,
                   cardano_tx_hash, payment_error, token_id, created_at
            FROM orders
            WHERE id = $1
              AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR wallet_address = $2)
            "#,
        )
        .bind(query.id)
        .bind(query.wallet_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[derive(Debug, Clone)]
/// All live orders of a wallet, newest first.
pub struct GetOrdersByWallet {
    pub wallet_address: String,
}

impl Processor<GetOrdersByWallet> for DatabaseProcessor {
    type Output = Vec<OrderRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrdersByWallet")]
    async fn process(&self, query: GetOrdersByWallet) -> Result<Vec<OrderRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, wallet_address, total_amount, status,
                   cardano_tx_hash, payment_error, token_id, created_at
            FROM orders
            WHERE wallet_address = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(query.wallet_address)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl OrderRow {
    /// Lock the order row for the rest of the transaction and read its status.
    ///
    /// Returns `None` when the order does not exist.
    pub async fn lock_status_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
    ) -> Result<Option<OrderStatus>, sqlx::Error> {
        let status: Option<(OrderStatus,)> = sqlx::query_as(
            r#"
            SELECT status
            FROM orders
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(status.map(|(status,)| status))
    }

    /// Set the status inside an open transaction.
    ///
    /// `tx_hash` and `error` only overwrite the stored values when present.
    /// Returns `false` when the order does not exist.
    pub async fn update_status_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
        status: OrderStatus,
        tx_hash: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                cardano_tx_hash = COALESCE($3, cardano_tx_hash),
                payment_error = COALESCE($4, payment_error),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(order_id)
        .bind(status)
        .bind(tx_hash)
        .bind(error)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
