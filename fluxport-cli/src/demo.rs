//! Built-in demo business handlers and the export units that call them.
//!
//! | biz type         | handler                          | authorizer       |
//! |------------------|----------------------------------|------------------|
//! | `ORDER_EXPORT`   | `order_service.query_orders`     | `order_managers` |
//! | `PRODUCT_EXPORT` | `product_service.query_products` | default          |
//! | `EMPTY_EXPORT`   | `report_service.query_empty`     | default          |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fluxport_core::{AllowList, ExportUnit, NamedAuthorizers, ParamShape, ParamShaped};
use fluxport_pipeline::HandlerTable;

pub const ORDER_MANAGERS: &str = "order_managers";

const ORDER_COUNT: u32 = 100;
const ORDER_STATUSES: [&str; 4] = ["PENDING", "PAID", "SHIPPED", "CANCELLED"];
const CUSTOMERS: [&str; 5] = ["Acme Corp", "Globex", "Initech", "Umbrella", "Hooli"];

const PRODUCTS: [(&str, &str, &str, f64); 8] = [
    ("P-100", "Mechanical keyboard", "electronics", 89.0),
    ("P-101", "USB-C dock", "electronics", 149.5),
    ("P-102", "27\" monitor", "electronics", 279.99),
    ("P-200", "Standing desk", "furniture", 420.0),
    ("P-201", "Ergonomic chair", "furniture", 310.0),
    ("P-300", "Notebook, dotted", "stationery", 6.5),
    ("P-301", "Fountain pen", "stationery", 32.0),
    ("P-302", "Desk organizer", "stationery", 18.75),
];

// ---------------------------------------------------------------------------
// Parameter shapes and rows
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderParams {
    #[serde(default)]
    pub status: Option<String>,
}

impl ParamShaped for OrderParams {
    const SHAPE: &'static str = "OrderParams";
}

#[derive(Debug, Serialize)]
pub struct OrderRow {
    pub order_id: String,
    pub customer: String,
    pub status: String,
    pub amount: f64,
    pub created_on: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductParams {
    #[serde(default)]
    pub category: Option<String>,
}

impl ParamShaped for ProductParams {
    const SHAPE: &'static str = "ProductParams";
}

#[derive(Debug, Serialize)]
pub struct ProductRow {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Deterministic order book; the same index always yields the same order.
fn order(index: u32) -> OrderRow {
    let day = index % 28 + 1;
    OrderRow {
        order_id: format!("ORD-{:04}", index + 1),
        customer: CUSTOMERS[(index as usize) % CUSTOMERS.len()].to_string(),
        status: ORDER_STATUSES[(index as usize * 7 / 3) % ORDER_STATUSES.len()].to_string(),
        amount: f64::from((index * 3779) % 50_000 + 500) / 100.0,
        created_on: format!("2024-03-{day:02}"),
    }
}

fn query_orders(params: OrderParams) -> anyhow::Result<Vec<OrderRow>> {
    let wanted = params.status.map(|s| s.to_ascii_uppercase());
    Ok((0..ORDER_COUNT)
        .map(order)
        .filter(|row| wanted.as_deref().map_or(true, |s| row.status == s))
        .collect())
}

fn query_products(params: ProductParams) -> anyhow::Result<Vec<ProductRow>> {
    let wanted = params.category.map(|c| c.to_ascii_lowercase());
    Ok(PRODUCTS
        .iter()
        .filter(|(_, _, category, _)| wanted.as_deref().map_or(true, |c| *category == c))
        .map(|&(sku, name, category, price)| ProductRow {
            sku: sku.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            price,
        })
        .collect())
}

fn query_empty(_: Value) -> anyhow::Result<Vec<Value>> {
    Ok(Vec::new())
}

pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table
        .register("order_service", "query_orders", query_orders)
        .register("product_service", "query_products", query_products)
        .register("report_service", "query_empty", query_empty);
    table
}

pub fn units() -> Vec<ExportUnit> {
    vec![
        ExportUnit::new(
            "ORDER_EXPORT",
            "order_service",
            "query_orders",
            ParamShape::of::<OrderParams>(),
        )
        .with_authorizer(ORDER_MANAGERS),
        ExportUnit::new(
            "PRODUCT_EXPORT",
            "product_service",
            "query_products",
            ParamShape::of::<ProductParams>(),
        ),
        ExportUnit::new(
            "EMPTY_EXPORT",
            "report_service",
            "query_empty",
            ParamShape::of::<Value>(),
        ),
    ]
}

pub fn authorizers() -> NamedAuthorizers {
    NamedAuthorizers::new().with(ORDER_MANAGERS, AllowList::new(["admin", "order-manager"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxport_core::{Dispatcher, DispatchError};
    use serde_json::json;

    #[test]
    fn every_demo_unit_has_a_handler() {
        let table = handlers();
        for unit in units() {
            assert!(table.contains(&unit.target, &unit.operation), "{}", unit.biz_type);
        }
    }

    #[test]
    fn orders_are_generated_and_filterable() {
        let all = query_orders(OrderParams::default()).unwrap();
        assert_eq!(all.len(), 100);
        assert_eq!(all[0].order_id, "ORD-0001");

        let paid = query_orders(OrderParams { status: Some("paid".into()) }).unwrap();
        assert!(!paid.is_empty());
        assert!(paid.len() < all.len());
        assert!(paid.iter().all(|o| o.status == "PAID"));
    }

    #[test]
    fn order_rows_keep_field_order() {
        let rows = handlers()
            .invoke(
                "order_service",
                "query_orders",
                &ParamShape::of::<OrderParams>(),
                &json!({"status": "SHIPPED"}),
            )
            .unwrap();
        assert_eq!(rows.columns, ["order_id", "customer", "status", "amount", "created_on"]);
    }

    #[test]
    fn unknown_order_filter_field_is_rejected() {
        let err = handlers()
            .invoke(
                "order_service",
                "query_orders",
                &ParamShape::of::<OrderParams>(),
                &json!({"colour": "red"}),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParams { .. }), "got: {err}");
    }

    #[test]
    fn products_filter_by_category() {
        let rows = query_products(ProductParams { category: Some("Furniture".into()) }).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
