//! Transform stage: join the six sources and aggregate daily product sales.
//!
//! The join chain is fixed:
//!
//! 1. `detalle_pedidos ⨝ pedidos` on `pedido_id`
//! 2. `⨝ productos` on `producto_id`
//! 3. `⨝ categorias` on `id_categoria_producto = categoria_id`
//! 4. `⨝ marcas` on `id_marca_producto = marca_id`
//! 5. `⨝ clientes[cliente_id, ciudad]` on `id_cliente_pedido = cliente_id`
//!
//! Columns that share a name across sources are renamed first (see
//! [`RENAMES`]) so no join depends on extraction order.

use crate::dataset::Dataset;
use crate::error::{EtlError, EtlResult};
use crate::extract::{Entity, Extraction};

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Column renames applied to each source before any join.
pub const RENAMES: &[(Entity, &[(&str, &str)])] = &[
    (Entity::Orders, &[("cliente_id", "id_cliente_pedido")]),
    (
        Entity::Products,
        &[
            ("nombre", "nombre_producto"),
            ("categoria_id", "id_categoria_producto"),
            ("marca_id", "id_marca_producto"),
        ],
    ),
    (Entity::Categories, &[("nombre", "nombre_categoria")]),
    (Entity::Brands, &[("nombre", "nombre_marca")]),
];

/// Columns kept from the customer relation.
const CUSTOMER_COLUMNS: &[&str] = &["cliente_id", "ciudad"];

/// One step of the join chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStep {
    pub right: Entity,
    pub left_on: &'static str,
    pub right_on: &'static str,
}

/// The join chain, applied to `detalle_pedidos` in order.
pub const JOIN_CHAIN: [JoinStep; 5] = [
    JoinStep {
        right: Entity::Orders,
        left_on: "pedido_id",
        right_on: "pedido_id",
    },
    JoinStep {
        right: Entity::Products,
        left_on: "producto_id",
        right_on: "producto_id",
    },
    JoinStep {
        right: Entity::Categories,
        left_on: "id_categoria_producto",
        right_on: "categoria_id",
    },
    JoinStep {
        right: Entity::Brands,
        left_on: "id_marca_producto",
        right_on: "marca_id",
    },
    JoinStep {
        right: Entity::Customers,
        left_on: "id_cliente_pedido",
        right_on: "cliente_id",
    },
];

/// A row of the daily per-product sales summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyProductSales {
    pub sale_date: NaiveDate,
    pub product_name: String,
    pub category_name: String,
    pub brand_name: String,
    pub customer_city: String,
    /// Mean unit price, absent when every price in the group is null.
    pub avg_unit_price: Option<Decimal>,
    pub quantity_sold: i64,
    pub total_sales: Decimal,
    pub order_count: i64,
}

/// Output of [`transform`].
#[derive(Debug, Clone, Default)]
pub struct Transformation {
    /// Row count after each join step, in chain order.
    pub steps: Vec<(JoinStep, usize)>,
    /// Rows that survived the joins.
    pub joined_rows: usize,
    /// Summary rows sorted by their key.
    pub rows: Vec<DailyProductSales>,
}

/// Round a money amount to cents, half to even.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

type GroupKey = (NaiveDate, String, String, String, String);

#[derive(Default)]
struct Accumulator {
    price_sum: Decimal,
    price_count: u32,
    quantity: i64,
    total: Decimal,
    orders: HashSet<crate::value::Key>,
}

/// Build the daily sales summary.
///
/// Refuses with [`EtlError::NotComputable`] when any source is absent.
/// Joins that produce no rows are fine and lead to an empty summary.
pub fn transform(extraction: &Extraction) -> EtlResult<Transformation> {
    let missing = extraction.missing();
    if !missing.is_empty() {
        return Err(EtlError::NotComputable {
            missing: missing.into_iter().map(Entity::name).collect(),
        });
    }

    let source = |entity: Entity| -> EtlResult<Dataset> {
        let dataset = extraction
            .get(entity)
            .cloned()
            .ok_or_else(|| EtlError::NotComputable {
                missing: vec![entity.name()],
            })?;
        let renamed = RENAMES
            .iter()
            .filter(|(e, _)| *e == entity)
            .fold(dataset, |ds, (_, renames)| ds.rename(renames));
        if entity == Entity::Customers {
            return renamed.project(CUSTOMER_COLUMNS);
        }
        Ok(renamed)
    };

    let mut joined = source(Entity::OrderLines)?;
    let mut steps = Vec::with_capacity(JOIN_CHAIN.len());
    for (n, step) in JOIN_CHAIN.iter().enumerate() {
        joined = joined.inner_join(&source(step.right)?, step.left_on, step.right_on)?;
        info!(step = n + 1, with = step.right.name(), rows = joined.len(), "join");
        steps.push((*step, joined.len()));
    }

    let rows = aggregate(&joined)?;
    info!(rows = rows.len(), "transform complete");

    Ok(Transformation {
        steps,
        joined_rows: joined.len(),
        rows,
    })
}

/// Group the joined rows by day, product, category, brand and city.
fn aggregate(joined: &Dataset) -> EtlResult<Vec<DailyProductSales>> {
    let date_col = joined.require("fecha_pedido")?;
    let product_col = joined.require("nombre_producto")?;
    let category_col = joined.require("nombre_categoria")?;
    let brand_col = joined.require("nombre_marca")?;
    let city_col = joined.require("ciudad")?;
    let price_col = joined.require("precio_unitario_en_momento_compra")?;
    let quantity_col = joined.require("cantidad")?;
    let subtotal_col = joined.require("subtotal")?;
    let order_col = joined.require("pedido_id")?;

    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();

    for row in joined.rows() {
        let date = row[date_col].as_date().map_err(EtlError::Transform)?;
        // Rows with a null key column do not belong to any group.
        let (Some(date), Some(product), Some(category), Some(brand), Some(city)) = (
            date,
            row[product_col].as_label(),
            row[category_col].as_label(),
            row[brand_col].as_label(),
            row[city_col].as_label(),
        ) else {
            continue;
        };

        let acc = groups
            .entry((date, product, category, brand, city))
            .or_default();

        if let Some(price) = row[price_col].as_decimal().map_err(EtlError::Transform)? {
            acc.price_sum += price;
            acc.price_count += 1;
        }
        if let Some(quantity) = row[quantity_col].as_i64().map_err(EtlError::Transform)? {
            acc.quantity += quantity;
        }
        if let Some(subtotal) = row[subtotal_col].as_decimal().map_err(EtlError::Transform)? {
            acc.total += subtotal;
        }
        if let Some(order) = row[order_col].key() {
            acc.orders.insert(order);
        }
    }

    Ok(groups
        .into_iter()
        .map(|((sale_date, product_name, category_name, brand_name, customer_city), acc)| {
            DailyProductSales {
                sale_date,
                product_name,
                category_name,
                brand_name,
                customer_city,
                avg_unit_price: (acc.price_count > 0)
                    .then(|| round_money(acc.price_sum / Decimal::from(acc.price_count))),
                quantity_sold: acc.quantity,
                total_sales: round_money(acc.total),
                order_count: acc.orders.len() as i64,
            }
        })
        .collect())
}
