use crate::framework::DatabaseProcessor;
use adashop_sdk::objects::ShippingInfo;
use kanau::processor::Processor;

#[derive(Debug, Clone)]
/// Insert or overwrite the shipping address of a wallet.
pub struct UpsertShippingInfo {
    pub wallet_address: String,
    pub info: ShippingInfo,
}

impl Processor<UpsertShippingInfo> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertShippingInfo")]
    async fn process(&self, cmd: UpsertShippingInfo) -> Result<(), sqlx::Error> {
        let UpsertShippingInfo {
            wallet_address,
            info,
        } = cmd;
        sqlx::query(
            r#"
            INSERT INTO shipping_info
                (wallet_address, full_name, email, phone, address, city, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (wallet_address) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address = EXCLUDED.address,
                city = EXCLUDED.city,
                postal_code = EXCLUDED.postal_code,
                country = EXCLUDED.country,
                updated_at = NOW()
            "#,
        )
        .bind(wallet_address)
        .bind(info.full_name)
        .bind(info.email)
        .bind(info.phone)
        .bind(info.address)
        .bind(info.city)
        .bind(info.postal_code)
        .bind(info.country)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
