//! Load stage: replace the reporting table with the new summary.
//!
//! The destination is rebuilt on every run (drop, create, insert). Only the
//! insert runs inside a transaction; DDL auto-commits on MySQL.

use crate::config::LoadConfig;
use crate::engine::{Dialect, SalesDb};
use crate::error::{EtlError, EtlResult};
use crate::transform::DailyProductSales;
use crate::value::Value;

use tracing::{error, info, warn};

/// Destination table.
pub const TABLE: &str = "ventas_diarias_productos";

/// A column of the destination table, after the synthetic `id`.
#[derive(Debug, Clone, Copy)]
pub struct SinkColumn {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
}

const fn column(name: &'static str, sql_type: &'static str, nullable: bool) -> SinkColumn {
    SinkColumn {
        name,
        sql_type,
        nullable,
    }
}

/// Declared columns, in insert order.
pub const COLUMNS: [SinkColumn; 9] = [
    column("fecha_venta", "DATE", false),
    column("nombre_producto", "VARCHAR(255)", false),
    column("nombre_categoria", "VARCHAR(100)", true),
    column("nombre_marca", "VARCHAR(100)", true),
    column("ciudad_cliente", "VARCHAR(100)", true),
    column("precio_unitario_promedio_dia", "DECIMAL(10, 2)", true),
    column("cantidad_vendida_dia", "INT", true),
    column("total_ventas_dia", "DECIMAL(10, 2)", true),
    column("numero_pedidos_dia", "INT", true),
];

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Whether the previous table was dropped cleanly.
    pub dropped: bool,
    pub inserted: u64,
}

/// Generate the `CREATE TABLE` statement for the destination.
pub fn create_table_sql(dialect: Dialect, config: &LoadConfig) -> String {
    let id = match dialect {
        Dialect::MySql => "id INT AUTO_INCREMENT PRIMARY KEY",
        Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
    };

    let mut defs = vec![format!("    {}", id)];
    for col in &COLUMNS {
        let mut line = format!("    {} {}", col.name, col.sql_type);
        if !col.nullable {
            line.push_str(" NOT NULL");
        }
        defs.push(line);
    }

    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", TABLE);
    sql.push_str(&defs.join(",\n"));
    if config.legacy_trailing_comma {
        sql.push(',');
    }
    sql.push_str("\n)");
    sql
}

/// Generate the parameterized `INSERT` statement.
pub fn insert_sql() -> String {
    let names: Vec<&str> = COLUMNS.iter().map(|c| c.name).collect();
    let placeholders = vec!["?"; COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        TABLE,
        names.join(", "),
        placeholders
    )
}

impl DailyProductSales {
    /// Parameters in [`COLUMNS`] order. The summary's customer city lands in
    /// `ciudad_cliente`.
    pub fn to_params(&self) -> Vec<Value> {
        vec![
            self.sale_date.into(),
            self.product_name.clone().into(),
            self.category_name.clone().into(),
            self.brand_name.clone().into(),
            self.customer_city.clone().into(),
            self.avg_unit_price.into(),
            self.quantity_sold.into(),
            self.total_sales.into(),
            self.order_count.into(),
        ]
    }
}

/// Replace the destination table with `rows`.
///
/// A failed drop is only a warning. A failed create aborts before any row
/// is written. A failed insert rolls back the whole batch.
pub async fn load(db: &SalesDb, rows: &[DailyProductSales], config: &LoadConfig) -> EtlResult<LoadReport> {
    let dropped = match db.execute(&format!("DROP TABLE IF EXISTS {}", TABLE)).await {
        Ok(_) => {
            info!(table = TABLE, "dropped (if it existed)");
            true
        }
        Err(e) => {
            warn!(table = TABLE, "drop failed: {}", e);
            false
        }
    };

    let create = create_table_sql(db.dialect(), config);
    if let Err(e) = db.execute(&create).await {
        let err = EtlError::CreateTable {
            table: TABLE.to_string(),
            message: e.to_string(),
        };
        error!("{}", err);
        return Err(err);
    }
    info!(table = TABLE, "created");

    let params: Vec<Vec<Value>> = rows.iter().map(DailyProductSales::to_params).collect();
    match db.execute_batch(&insert_sql(), &params).await {
        Ok(inserted) => {
            info!(table = TABLE, rows = inserted, "loaded");
            Ok(LoadReport { dropped, inserted })
        }
        Err(e) => {
            let err = EtlError::Insert {
                table: TABLE.to_string(),
                message: e.to_string(),
            };
            error!("{} (rolled back)", err);
            Err(err)
        }
    }
}
