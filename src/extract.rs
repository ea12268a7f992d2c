//! Extract stage: read the six source relations.

use crate::dataset::Dataset;
use crate::engine::SalesDb;
use crate::error::EtlError;

use std::collections::BTreeMap;
use tracing::{error, info};

/// A source relation of the e-commerce schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    Customers,
    Orders,
    OrderLines,
    Products,
    Categories,
    Brands,
}

impl Entity {
    /// Extraction order.
    pub const ALL: [Entity; 6] = [
        Entity::Customers,
        Entity::Orders,
        Entity::OrderLines,
        Entity::Products,
        Entity::Categories,
        Entity::Brands,
    ];

    /// Relation name in the source database.
    pub fn table(self) -> &'static str {
        match self {
            Entity::Customers => "Clientes",
            Entity::Orders => "Pedidos",
            Entity::OrderLines => "Detalle_Pedidos",
            Entity::Products => "Productos",
            Entity::Categories => "Categorias",
            Entity::Brands => "Marcas",
        }
    }

    /// Short name used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Entity::Customers => "clientes",
            Entity::Orders => "pedidos",
            Entity::OrderLines => "detalle_pedidos",
            Entity::Products => "productos",
            Entity::Categories => "categorias",
            Entity::Brands => "marcas",
        }
    }

    pub fn query(self) -> String {
        format!("SELECT * FROM {}", self.table())
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of the extract stage: one entry per entity, `None` when that
/// relation could not be read.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    datasets: BTreeMap<Entity, Option<Dataset>>,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully read relation.
    pub fn insert(&mut self, entity: Entity, dataset: Dataset) {
        self.datasets.insert(entity, Some(dataset));
    }

    /// Record a relation that failed to extract.
    pub fn mark_absent(&mut self, entity: Entity) {
        self.datasets.insert(entity, None);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, entity: Entity, dataset: Dataset) -> Self {
        self.insert(entity, dataset);
        self
    }

    pub fn get(&self, entity: Entity) -> Option<&Dataset> {
        self.datasets.get(&entity).and_then(Option::as_ref)
    }

    /// Entities that are absent, in extraction order.
    pub fn missing(&self) -> Vec<Entity> {
        Entity::ALL
            .into_iter()
            .filter(|e| self.get(*e).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Row count per entity, `None` for absent ones.
    pub fn row_counts(&self) -> Vec<(Entity, Option<usize>)> {
        Entity::ALL
            .into_iter()
            .map(|e| (e, self.get(e).map(Dataset::len)))
            .collect()
    }
}

/// Read every source relation. A failing query marks that entity absent and
/// extraction moves on; nothing is retried.
pub async fn extract(db: &SalesDb) -> Extraction {
    let mut extraction = Extraction::new();

    for entity in Entity::ALL {
        info!(table = entity.name(), "extracting");
        match db.fetch_dataset(&entity.query()).await {
            Ok(dataset) => {
                info!(table = entity.name(), rows = dataset.len(), "extracted");
                extraction.insert(entity, dataset);
            }
            Err(e) => {
                let err = EtlError::extraction(entity.name(), e.to_string());
                error!("{}", err);
                extraction.mark_absent(entity);
            }
        }
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_queries() {
        assert_eq!(Entity::OrderLines.query(), "SELECT * FROM Detalle_Pedidos");
        assert_eq!(Entity::Customers.to_string(), "clientes");
    }

    #[test]
    fn test_missing_entities() {
        let mut extraction = Extraction::new()
            .with(Entity::Customers, Dataset::new(["cliente_id"]))
            .with(Entity::Orders, Dataset::new(["pedido_id"]));
        extraction.mark_absent(Entity::Brands);

        assert_eq!(
            extraction.missing(),
            vec![Entity::OrderLines, Entity::Products, Entity::Categories, Entity::Brands]
        );
        assert!(!extraction.is_complete());
        assert_eq!(extraction.row_counts()[0], (Entity::Customers, Some(0)));
        assert_eq!(extraction.row_counts()[5], (Entity::Brands, None));
    }

    #[tokio::test]
    async fn test_extract_continues_after_failure() {
        let db = SalesDb::connect_url("sqlite::memory:").await.unwrap();
        db.execute("CREATE TABLE Clientes (cliente_id INTEGER, ciudad TEXT)")
            .await
            .unwrap();
        db.execute("CREATE TABLE Marcas (marca_id INTEGER, nombre TEXT)")
            .await
            .unwrap();
        db.execute("INSERT INTO Marcas VALUES (1, 'Acme')").await.unwrap();

        let extraction = extract(&db).await;
        db.close().await;

        assert_eq!(extraction.get(Entity::Brands).map(Dataset::len), Some(1));
        assert!(extraction.get(Entity::Customers).is_some());
        assert_eq!(
            extraction.missing(),
            vec![Entity::Orders, Entity::OrderLines, Entity::Products, Entity::Categories]
        );
    }

    #[tokio::test]
    async fn test_undecodable_cell_marks_source_absent() {
        let db = SalesDb::connect_url("sqlite::memory:").await.unwrap();
        db.execute("CREATE TABLE Clientes (cliente_id INTEGER, ciudad TEXT)")
            .await
            .unwrap();
        db.execute("INSERT INTO Clientes VALUES (1, X'4C696D61')")
            .await
            .unwrap();

        let extraction = extract(&db).await;
        db.close().await;

        assert!(extraction.get(Entity::Customers).is_none());
        assert!(extraction.missing().contains(&Entity::Customers));
        assert_eq!(extraction.row_counts()[0], (Entity::Customers, None));
    }
}
