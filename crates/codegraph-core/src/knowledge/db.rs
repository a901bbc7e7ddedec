//! SurrealDB embedded store for code graph snapshots.
//!
//! Node records are keyed by canonical id (`type::thing(table, id)`), edge
//! records by `sha256(from "->" to)`. Every write is an `UPSERT`, so writing
//! the same snapshot twice leaves one copy.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info};

use super::builder::BuildStats;
use super::error::KnowledgeError;
use super::graph::CodeGraph;
use super::ontology::{EntityKind, GraphEdge, GraphNode};
use crate::config::StorageConfig;

/// Tables holding entity records.
pub const NODE_TABLES: &[&str] = &[
    "module",
    "function",
    "nested_function",
    "type_def",
    "constructor",
    "field",
    "class",
    "instance",
    "trait_def",
    "trait_method",
    "impl_block",
    "import",
    "constant",
];

/// Tables holding edge records.
pub const EDGE_TABLES: &[&str] = &["contains", "imports", "calls", "uses_instance", "uses_type", "implements"];

const RUN_TABLE: &str = "ingest_run";

/// Records written by one [`GraphDb::persist`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistStats {
    pub nodes: usize,
    pub edges: usize,
    pub batches: usize,
}

#[derive(Deserialize)]
struct CountResult {
    count: i64,
}

/// Database connection for code graph snapshots.
pub struct GraphDb {
    db: Surreal<Db>,
    batch_size: usize,
    bulk: AtomicBool,
}

impl GraphDb {
    /// Open or create a RocksDB-backed database at `path`.
    pub async fn open(path: &Path, storage: &StorageConfig) -> Result<Self, KnowledgeError> {
        let db = Surreal::new::<RocksDb>(path)
            .await
            .map_err(|e| KnowledgeError::StoreUnavailable(format!("{}: {}", path.display(), e)))?;
        Self::connect(db, storage).await
    }

    /// Open a throwaway in-memory database.
    pub async fn open_in_memory(storage: &StorageConfig) -> Result<Self, KnowledgeError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| KnowledgeError::StoreUnavailable(e.to_string()))?;
        Self::connect(db, storage).await
    }

    async fn connect(db: Surreal<Db>, storage: &StorageConfig) -> Result<Self, KnowledgeError> {
        db.use_ns(storage.namespace.clone())
            .use_db(storage.database.clone())
            .await?;
        Ok(Self {
            db,
            batch_size: storage.bulk_batch_size.max(1),
            bulk: AtomicBool::new(false),
        })
    }

    /// Define tables and indexes. Safe to run more than once.
    pub async fn initialize_schema(&self) -> Result<(), KnowledgeError> {
        // ===========================================================================
        // NODE TABLES
        // ===========================================================================

        for table in NODE_TABLES {
            let statement = format!(
                r#"
                DEFINE TABLE IF NOT EXISTS {t} SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS key ON {t} TYPE string;
                DEFINE INDEX IF NOT EXISTS {t}_key ON {t} FIELDS key UNIQUE;
                "#,
                t = table
            );
            self.db.query(statement).await?.check()?;
        }

        self.db
            .query(
                r#"
                DEFINE INDEX IF NOT EXISTS function_name ON function FIELDS name;
                DEFINE INDEX IF NOT EXISTS function_module ON function FIELDS module_name;
                DEFINE INDEX IF NOT EXISTS type_def_name ON type_def FIELDS type_name;
                DEFINE INDEX IF NOT EXISTS nested_function_parent ON nested_function FIELDS parent_id;
                "#,
            )
            .await?
            .check()?;

        // ===========================================================================
        // EDGE TABLES
        // ===========================================================================

        for table in EDGE_TABLES {
            let statement = format!(
                r#"
                DEFINE TABLE IF NOT EXISTS {t} SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS src ON {t} TYPE string;
                DEFINE FIELD IF NOT EXISTS dst ON {t} TYPE string;
                DEFINE INDEX IF NOT EXISTS {t}_src ON {t} FIELDS src;
                DEFINE INDEX IF NOT EXISTS {t}_dst ON {t} FIELDS dst;
                "#,
                t = table
            );
            self.db.query(statement).await?.check()?;
        }

        // ===========================================================================
        // METADATA
        // ===========================================================================

        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS ingest_run SCHEMALESS;
                DEFINE TABLE IF NOT EXISTS metadata SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS key ON metadata TYPE string;
                DEFINE FIELD IF NOT EXISTS value ON metadata TYPE any;
                DEFINE FIELD IF NOT EXISTS updated_at ON metadata TYPE datetime;

                UPSERT metadata:initialized SET key = 'initialized', value = true, updated_at = time::now();
                UPSERT metadata:schema_version SET key = 'schema_version', value = '1', updated_at = time::now();
                "#,
            )
            .await?
            .check()?;

        debug!("graph schema initialized");
        Ok(())
    }

    /// Check if the database has been initialized.
    pub async fn is_initialized(&self) -> Result<bool, KnowledgeError> {
        let result: Option<Value> = self
            .db
            .query("SELECT value FROM metadata WHERE key = 'initialized'")
            .await?
            .take(0)?;
        Ok(result.is_some())
    }

    // ===========================================================================
    // BULK MODE
    // ===========================================================================

    /// Stop checking edge endpoints until [`end_bulk_load`](Self::end_bulk_load).
    pub fn begin_bulk_load(&self) {
        self.bulk.store(true, Ordering::SeqCst);
    }

    pub fn end_bulk_load(&self) {
        self.bulk.store(false, Ordering::SeqCst);
    }

    pub fn in_bulk_load(&self) -> bool {
        self.bulk.load(Ordering::SeqCst)
    }

    // ===========================================================================
    // WRITES
    // ===========================================================================

    /// Insert or replace one entity.
    pub async fn upsert_node(&self, node: &GraphNode) -> Result<(), KnowledgeError> {
        let row = node_row(node)?;
        self.write_rows(vec![row]).await
    }

    /// Insert or replace one edge. Outside bulk mode both endpoints must
    /// already be stored.
    pub async fn upsert_edge(&self, edge: &GraphEdge) -> Result<(), KnowledgeError> {
        if !self.in_bulk_load() {
            let (from_exists, to_exists) =
                try_join(self.node_exists(edge.from_id()), self.node_exists(edge.to_id())).await?;
            let missing = match (from_exists, to_exists) {
                (false, _) => Some(edge.from_id()),
                (_, false) => Some(edge.to_id()),
                _ => None,
            };
            if let Some(endpoint) = missing {
                return Err(KnowledgeError::EntityNotFound(format!(
                    "{} endpoint {}",
                    edge.table_name(),
                    endpoint
                )));
            }
        }
        let row = edge_row(edge)?;
        self.write_rows(vec![row]).await
    }

    /// Write a whole snapshot in batches of `bulk_batch_size`, entities
    /// first, in bulk mode.
    pub async fn persist(&self, graph: &CodeGraph) -> Result<PersistStats, KnowledgeError> {
        self.begin_bulk_load();
        let result = self.persist_rows(graph).await;
        self.end_bulk_load();
        let stats = result?;
        info!(nodes = stats.nodes, edges = stats.edges, batches = stats.batches, "graph persisted");
        Ok(stats)
    }

    async fn persist_rows(&self, graph: &CodeGraph) -> Result<PersistStats, KnowledgeError> {
        let mut stats = PersistStats::default();

        let nodes = graph.nodes().map(|n| node_row(&n)).collect::<Result<Vec<_>, _>>()?;
        stats.nodes = nodes.len();
        for chunk in nodes.chunks(self.batch_size) {
            self.write_rows(chunk.to_vec()).await?;
            stats.batches += 1;
        }

        let edges = graph.edges().map(|e| edge_row(&e)).collect::<Result<Vec<_>, _>>()?;
        stats.edges = edges.len();
        for chunk in edges.chunks(self.batch_size) {
            self.write_rows(chunk.to_vec()).await?;
            stats.batches += 1;
        }

        Ok(stats)
    }

    async fn write_rows(&self, rows: Vec<Value>) -> Result<(), KnowledgeError> {
        self.db
            .query("FOR $row IN $rows { UPSERT type::thing($row.tb, $row.id) CONTENT $row.data; };")
            .bind(("rows", rows))
            .await?
            .check()?;
        Ok(())
    }

    /// Record the counters of an ingestion run.
    pub async fn record_run(&self, stats: &BuildStats) -> Result<(), KnowledgeError> {
        let data = serde_json::to_value(stats)?;
        let row = json!({"tb": RUN_TABLE, "id": stats.run_id.to_string(), "data": data});
        self.write_rows(vec![row]).await
    }

    /// Delete every entity and edge record. Run metadata is kept.
    pub async fn clear(&self) -> Result<(), KnowledgeError> {
        let statement: String = NODE_TABLES
            .iter()
            .chain(EDGE_TABLES.iter())
            .map(|t| format!("DELETE {};", t))
            .collect::<Vec<_>>()
            .join("\n");
        self.db.query(statement).await?.check()?;
        debug!("graph records cleared");
        Ok(())
    }

    /// Replace the stored snapshot with `graph`.
    pub async fn replace(&self, graph: &CodeGraph) -> Result<PersistStats, KnowledgeError> {
        self.clear().await?;
        self.persist(graph).await
    }

    // ===========================================================================
    // READS
    // ===========================================================================

    /// Number of records in a table.
    pub async fn count(&self, table: &str) -> Result<usize, KnowledgeError> {
        if !NODE_TABLES.contains(&table) && !EDGE_TABLES.contains(&table) && table != RUN_TABLE {
            return Err(KnowledgeError::query(format!("unknown table '{}'", table)));
        }
        let result: Option<CountResult> = self
            .db
            .query(format!("SELECT count() FROM {} GROUP ALL", table))
            .await?
            .take(0)?;
        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Number of records of an entity kind.
    pub async fn count_kind(&self, kind: EntityKind) -> Result<usize, KnowledgeError> {
        self.count(kind.table_name()).await
    }

    /// A stored entity record by canonical id.
    pub async fn get_record(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, KnowledgeError> {
        let result: Option<Value> = self
            .db
            .query("SELECT * OMIT id FROM type::thing($tb, $id)")
            .bind(("tb", kind.table_name().to_string()))
            .bind(("id", id.to_string()))
            .await?
            .take(0)?;
        Ok(result)
    }

    async fn node_exists(&self, key: &str) -> Result<bool, KnowledgeError> {
        let statement = format!("SELECT count() FROM {} WHERE key = $key GROUP ALL", NODE_TABLES.join(", "));
        let result: Option<CountResult> = self
            .db
            .query(statement)
            .bind(("key", key.to_string()))
            .await?
            .take(0)?;
        Ok(result.map_or(false, |r| r.count > 0))
    }
}

/// Record key of an edge.
pub fn edge_key(from: &str, to: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(from.as_bytes());
    hasher.update(b"->");
    hasher.update(to.as_bytes());
    hex::encode(hasher.finalize())
}

/// `{tb, id, data}` for an entity. The canonical id is stored as `key`.
fn node_row(node: &GraphNode) -> Result<Value, KnowledgeError> {
    let mut data = node.to_record()?;
    if let Value::Object(obj) = &mut data {
        obj.remove("id");
        obj.insert("key".to_string(), Value::String(node.id().to_string()));
    }
    Ok(json!({"tb": node.kind().table_name(), "id": node.id(), "data": data}))
}

/// `{tb, id, data}` for an edge, with endpoints stored as `src`/`dst`.
fn edge_row(edge: &GraphEdge) -> Result<Value, KnowledgeError> {
    let mut data = serde_json::to_value(edge)?;
    if let Value::Object(obj) = &mut data {
        obj.remove("from");
        obj.remove("to");
        obj.remove("edge_type");
        obj.insert("src".to_string(), Value::String(edge.from_id().to_string()));
        obj.insert("dst".to_string(), Value::String(edge.to_id().to_string()));
        obj.insert("relation".to_string(), Value::String(edge.relation_name().to_string()));
    }
    Ok(json!({
        "tb": edge.table_name(),
        "id": edge_key(edge.from_id(), edge.to_id()),
        "data": data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_is_stable() {
        let a = edge_key("m:f:", "m:g:");
        assert_eq!(a, edge_key("m:f:", "m:g:"));
        assert_ne!(a, edge_key("m:g:", "m:f:"));
        assert_eq!(a.len(), 64);
    }
}
