//! Stock holds.
//!
//! Availability of a product is its shelf stock minus every `held` row that
//! has not expired yet. All mutating helpers here expect to run inside a
//! transaction that first locked the affected product rows with
//! [`StockReservation::lock_availability_tx`].

use crate::entities::ReservationStatus;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StockReservation {
    pub id: i64,
    pub reservation_id: Uuid,
    pub product_id: Uuid,
    pub order_id: Option<Uuid>,
    pub quantity: i32,
    pub status: ReservationStatus,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AvailabilityRow {
    pub id: Uuid,
    pub name: String,
    pub stock: i32,
    pub is_active: bool,
    pub held: i64,
}

impl AvailabilityRow {
    pub fn available(&self) -> i64 {
        (i64::from(self.stock) - self.held).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct HoldInsert {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl StockReservation {
    /// Lock the product rows and report their availability.
    ///
    /// Rows are locked in id order so concurrent checkouts touching the same
    /// products cannot deadlock.
    pub async fn lock_availability_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        product_ids: &[Uuid],
    ) -> Result<Vec<AvailabilityRow>, sqlx::Error> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, AvailabilityRow>(
            r#"
            SELECT
                p.id,
                p.name,
                p.stock,
                (p.is_active AND p.deleted_at IS NULL) AS is_active,
                COALESCE((
                    SELECT SUM(r.quantity)
                    FROM stock_reservations r
                    WHERE r.product_id = p.id
                      AND r.status = 'held'
                      AND r.expires_at > NOW()
                ), 0)::BIGINT AS held
            FROM products p
            WHERE p.id = ANY($1)
            ORDER BY p.id
            FOR UPDATE OF p
            "#,
        )
        .bind(product_ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Release every hold of `reservation_id` that is not bound to an order.
    pub async fn release_unbound_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reservation_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE stock_reservations
            SET status = 'released'
            WHERE reservation_id = $1 AND order_id IS NULL AND status = 'held'
            "#,
        )
        .bind(reservation_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn release_by_ids_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ids: &[i64],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE stock_reservations SET status = 'released' WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Unbound, unexpired holds of a reservation for the given products.
    pub async fn active_unbound_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reservation_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<Vec<StockReservation>, sqlx::Error> {
        sqlx::query_as::<_, StockReservation>(
            r#"
            SELECT id, reservation_id, product_id, order_id, quantity, status, expires_at
            FROM stock_reservations
            WHERE reservation_id = $1
              AND product_id = ANY($2)
              AND order_id IS NULL
              AND status = 'held'
              AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(reservation_id)
        .bind(product_ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Bind holds to an order and push their expiry out.
    pub async fn bind_to_order_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ids: &[i64],
        order_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE stock_reservations
            SET order_id = $2, expires_at = $3
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(order_id)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_holds_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reservation_id: Uuid,
        order_id: Option<Uuid>,
        holds: Vec<HoldInsert>,
        expires_at: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        if holds.is_empty() {
            return Ok(0);
        }
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO stock_reservations \
            (reservation_id, product_id, order_id, quantity, status, expires_at) ",
        );
        query_builder.push_values(holds, |mut b, hold| {
            b.push_bind(reservation_id)
                .push_bind(hold.product_id)
                .push_bind(order_id)
                .push_bind(hold.quantity)
                .push_bind(ReservationStatus::Held)
                .push_bind(expires_at);
        });
        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// Turn an order's holds into a stock decrement.
    pub async fn consume_for_order_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            WITH consumed AS (
                UPDATE stock_reservations
                SET status = 'consumed'
                WHERE order_id = $1 AND status = 'held'
                RETURNING product_id, quantity
            ),
            totals AS (
                SELECT product_id, SUM(quantity)::INTEGER AS quantity
                FROM consumed
                GROUP BY product_id
            )
            UPDATE products p
            SET stock = GREATEST(p.stock - t.quantity, 0), updated_at = NOW()
            FROM totals t
            WHERE p.id = t.product_id
            "#,
        )
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn release_for_order_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE stock_reservations
            SET status = 'released'
            WHERE order_id = $1 AND status = 'held'
            "#,
        )
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_never_negative() {
        let row = AvailabilityRow {
            id: Uuid::nil(),
            name: "Mug".to_string(),
            stock: 3,
            is_active: true,
            held: 5,
        };
        assert_eq!(row.available(), 0);
    }
}
