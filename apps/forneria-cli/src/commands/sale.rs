//! # Sale Commands

use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::ApiError;
use forneria_core::{EditSale, NewSale, Sale, SaleReceipt};
use forneria_db::{Database, TotalsCheck};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleIdResponse {
    pub sale_id: String,
}

/// Receipt as handed to the printer front end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub store_name: String,
    #[serde(flatten)]
    pub receipt: SaleReceipt,
}

pub async fn create(
    db: &Database,
    config: &AppConfig,
    input: &NewSale,
) -> Result<SaleIdResponse, ApiError> {
    debug!(lines = input.cart.len(), "sale create command");
    let sale_id = db.sale_manager(config.sales_config()).create_sale(input).await?;
    Ok(SaleIdResponse { sale_id })
}

pub async fn edit(
    db: &Database,
    config: &AppConfig,
    sale_id: &str,
    input: &EditSale,
) -> Result<SaleIdResponse, ApiError> {
    debug!(sale_id, lines = input.cart.len(), "sale edit command");
    db.sale_manager(config.sales_config()).edit_sale(sale_id, input).await?;
    Ok(SaleIdResponse {
        sale_id: sale_id.to_string(),
    })
}

pub async fn delete(
    db: &Database,
    config: &AppConfig,
    sale_id: &str,
) -> Result<SaleIdResponse, ApiError> {
    debug!(sale_id, "sale delete command");
    db.sale_manager(config.sales_config()).delete_sale(sale_id).await?;
    Ok(SaleIdResponse {
        sale_id: sale_id.to_string(),
    })
}

pub async fn show(
    db: &Database,
    config: &AppConfig,
    sale_id: &str,
) -> Result<ReceiptResponse, ApiError> {
    let receipt = db.sale_manager(config.sales_config()).get_receipt(sale_id).await?;
    Ok(ReceiptResponse {
        store_name: config.store_name.clone(),
        receipt,
    })
}

pub async fn list(db: &Database, config: &AppConfig, limit: u32) -> Result<Vec<Sale>, ApiError> {
    Ok(db.sale_manager(config.sales_config()).list_sales(limit).await?)
}

pub async fn verify(
    db: &Database,
    config: &AppConfig,
    sale_id: &str,
) -> Result<TotalsCheck, ApiError> {
    Ok(db.sale_manager(config.sales_config()).verify_totals(sale_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{parse_json, seed};
    use crate::error::ErrorCode;
    use forneria_db::DbConfig;

    async fn seeded() -> (Database, AppConfig) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed::run(&db).await.unwrap();
        (db, AppConfig::default())
    }

    #[tokio::test]
    async fn test_create_show_delete_from_json() {
        let (db, config) = seeded().await;

        let input: NewSale = parse_json(
            r#"{
                "channel": "store",
                "cart": [
                    { "productRef": "PAN-MARR", "quantity": 3 },
                    { "productRef": "PAS-KUCH", "quantity": 1, "discountPct": "10" }
                ],
                "amountPaid": "20000"
            }"#,
        )
        .unwrap();

        let created = create(&db, &config, &input).await.unwrap();
        let receipt = show(&db, &config, &created.sale_id).await.unwrap();
        assert_eq!(receipt.store_name, "Forneria");
        assert_eq!(receipt.receipt.lines.len(), 2);
        assert_eq!(receipt.receipt.client_name, "Varios");

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["storeName"], "Forneria");
        assert!(json["lines"].is_array());

        let check = verify(&db, &config, &created.sale_id).await.unwrap();
        assert!(check.consistent);

        delete(&db, &config, &created.sale_id).await.unwrap();
        let err = show(&db, &config, &created.sale_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_errors_surface_as_codes() {
        let (db, config) = seeded().await;

        let empty: NewSale = parse_json(r#"{ "cart": [] }"#).unwrap();
        assert_eq!(create(&db, &config, &empty).await.unwrap_err().code, ErrorCode::EmptyCart);

        let too_many: NewSale =
            parse_json(r#"{ "cart": [{ "productRef": "PAN-MARR", "quantity": 100000 }] }"#)
                .unwrap();
        assert_eq!(
            create(&db, &config, &too_many).await.unwrap_err().code,
            ErrorCode::InsufficientStock
        );

        let bad = parse_json::<NewSale>(r#"{ "cart": "nope" }"#).unwrap_err();
        assert_eq!(bad.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_edit_and_list() {
        let (db, config) = seeded().await;
        let input: NewSale =
            parse_json(r#"{ "cart": [{ "productRef": "PAN-HALL", "quantity": 2 }] }"#).unwrap();
        let created = create(&db, &config, &input).await.unwrap();

        let edit_input: EditSale = parse_json(
            r#"{ "cart": [{ "productRef": "PAN-HALL", "quantity": 5 }], "fullPayment": false }"#,
        )
        .unwrap();
        edit(&db, &config, &created.sale_id, &edit_input).await.unwrap();

        let sales = list(&db, &config, 10).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].amount_paid_cents, None);
        let lines = db.sales().get_lines(&created.sale_id).await.unwrap();
        assert_eq!(lines[0].quantity, 5);
    }
}
