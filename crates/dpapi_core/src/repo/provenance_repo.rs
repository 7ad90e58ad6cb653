//! Provenance repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist node records, version freeze state and edge logs.
//! - Load a node back exactly as it was synced.
//!
//! # Invariants
//! - Saving is idempotent: re-syncing a node never duplicates edges.
//! - A persisted frozen flag is never cleared.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::edge::{validate_key, Edge, EdgeValue};
use crate::model::pnode::{NodeId, NodeOrigin, NodeVersion, PNode, Version, VersionState};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for provenance persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted provenance data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One version's edge log, in append order.
pub type VersionLog = (Version, Vec<Edge>);

/// A node as loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub node: PNode,
    /// One entry per version, ordered by version.
    pub logs: Vec<VersionLog>,
}

/// Repository interface for provenance persistence.
pub trait ProvenanceRepository {
    fn save_node(&self, node: &PNode, logs: &[VersionLog]) -> RepoResult<()>;
    fn load_node(&self, id: NodeId) -> RepoResult<Option<StoredNode>>;
    fn list_node_ids(&self) -> RepoResult<Vec<NodeId>>;
    /// Synced reference edges naming `target`, ordered by source and seq.
    fn list_referrers(&self, target: NodeVersion) -> RepoResult<Vec<Edge>>;
}

/// SQLite-backed provenance repository.
pub struct SqliteProvenanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProvenanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProvenanceRepository for SqliteProvenanceRepository<'_> {
    fn save_node(&self, node: &PNode, logs: &[VersionLog]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        let (origin, path) = origin_to_db(&node.origin);
        tx.execute(
            "INSERT INTO pnodes (node_id, origin, path, adjacent_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(node_id) DO NOTHING;",
            params![
                node.id.to_string(),
                origin,
                path,
                node.adjacent.map(|id| id.to_string()),
            ],
        )?;

        for state in node.versions() {
            tx.execute(
                "INSERT INTO pnode_versions (node_id, version, frozen)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(node_id, version)
                 DO UPDATE SET frozen = MAX(frozen, excluded.frozen);",
                params![node.id.to_string(), state.number, bool_to_int(state.frozen)],
            )?;
        }

        for (version, edges) in logs {
            for (seq, edge) in edges.iter().enumerate() {
                let (kind, target_id, target_version, value) = edge_value_to_db(&edge.value);
                tx.execute(
                    "INSERT OR IGNORE INTO ancestry_edges (
                        node_id,
                        version,
                        seq,
                        key,
                        kind,
                        target_id,
                        target_version,
                        value
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                    params![
                        node.id.to_string(),
                        version,
                        seq as i64,
                        edge.key.as_str(),
                        kind,
                        target_id,
                        target_version,
                        value,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_node(&self, id: NodeId) -> RepoResult<Option<StoredNode>> {
        let header = self
            .conn
            .query_row(
                "SELECT origin, path, adjacent_id FROM pnodes WHERE node_id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("origin")?,
                        row.get::<_, Option<String>>("path")?,
                        row.get::<_, Option<String>>("adjacent_id")?,
                    ))
                },
            )
            .optional()?;
        let Some((origin_text, path, adjacent_text)) = header else {
            return Ok(None);
        };

        let origin = parse_origin(&origin_text, path)?;
        let adjacent = adjacent_text
            .map(|text| parse_node_id(&text, "pnodes.adjacent_id"))
            .transpose()?;

        let mut stmt = self.conn.prepare(
            "SELECT version, frozen FROM pnode_versions
             WHERE node_id = ?1
             ORDER BY version ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            versions.push(VersionState {
                number: row.get("version")?,
                frozen: int_to_bool(row.get("frozen")?, "pnode_versions.frozen")?,
            });
        }

        let node = PNode::restore(id, origin, adjacent, versions).ok_or_else(|| {
            RepoError::InvalidData(format!("versions of p-node {id} are not contiguous"))
        })?;

        let mut logs = node
            .versions()
            .iter()
            .map(|state| (state.number, Vec::new()))
            .collect::<Vec<VersionLog>>();

        let mut stmt = self.conn.prepare(
            "SELECT version, seq, key, kind, target_id, target_version, value
             FROM ancestry_edges
             WHERE node_id = ?1
             ORDER BY version ASC, seq ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        while let Some(row) = rows.next()? {
            let version: Version = row.get("version")?;
            let seq: i64 = row.get("seq")?;
            let edge = parse_edge_row(row, NodeVersion::new(id, version))?;
            let log = logs
                .get_mut(version as usize)
                .map(|(_, edges)| edges)
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "edge of p-node {id} refers to unknown version {version}"
                    ))
                })?;
            if seq != log.len() as i64 {
                return Err(RepoError::InvalidData(format!(
                    "edge log of {id}@{version} has a gap at seq {seq}"
                )));
            }
            log.push(edge);
        }

        Ok(Some(StoredNode { node, logs }))
    }

    fn list_node_ids(&self) -> RepoResult<Vec<NodeId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT node_id FROM pnodes ORDER BY synced_at ASC, node_id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get("node_id")?;
            ids.push(parse_node_id(&text, "pnodes.node_id")?);
        }
        Ok(ids)
    }

    fn list_referrers(&self, target: NodeVersion) -> RepoResult<Vec<Edge>> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, version, key, kind, target_id, target_version, value
             FROM ancestry_edges
             WHERE target_id = ?1 AND target_version = ?2
             ORDER BY node_id ASC, version ASC, seq ASC;",
        )?;
        let mut rows = stmt.query(params![target.node.to_string(), target.version])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get("node_id")?;
            let source = NodeVersion::new(
                parse_node_id(&text, "ancestry_edges.node_id")?,
                row.get("version")?,
            );
            edges.push(parse_edge_row(row, source)?);
        }
        Ok(edges)
    }
}

fn parse_edge_row(row: &Row<'_>, source: NodeVersion) -> RepoResult<Edge> {
    let key: String = row.get("key")?;
    validate_key(&key).map_err(|err| {
        RepoError::InvalidData(format!("invalid key in ancestry_edges.key: {err}"))
    })?;

    let kind: String = row.get("kind")?;
    let value = match kind.as_str() {
        "xref" => {
            let target_text: Option<String> = row.get("target_id")?;
            let target_version: Option<Version> = row.get("target_version")?;
            match (target_text, target_version) {
                (Some(text), Some(version)) => EdgeValue::reference(
                    parse_node_id(&text, "ancestry_edges.target_id")?,
                    version,
                ),
                _ => {
                    return Err(RepoError::InvalidData(
                        "xref edge is missing its target".to_string(),
                    ));
                }
            }
        }
        "str" => {
            let value: Option<String> = row.get("value")?;
            EdgeValue::literal(value.ok_or_else(|| {
                RepoError::InvalidData("str edge is missing its value".to_string())
            })?)
        }
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid edge kind `{other}` in ancestry_edges.kind"
            )));
        }
    };

    Ok(Edge::new(source, key, value))
}

fn origin_to_db(origin: &NodeOrigin) -> (&'static str, Option<String>) {
    match origin {
        NodeOrigin::Phony => ("phony", None),
        NodeOrigin::File { path } => ("file", Some(path.to_string_lossy().into_owned())),
    }
}

fn parse_origin(value: &str, path: Option<String>) -> RepoResult<NodeOrigin> {
    match (value, path) {
        ("phony", None) => Ok(NodeOrigin::Phony),
        ("file", Some(path)) => Ok(NodeOrigin::File {
            path: PathBuf::from(path),
        }),
        (other, _) => Err(RepoError::InvalidData(format!(
            "invalid origin `{other}` in pnodes.origin"
        ))),
    }
}

type EdgeColumns<'a> = (&'static str, Option<String>, Option<Version>, Option<&'a str>);

fn edge_value_to_db(value: &EdgeValue) -> EdgeColumns<'_> {
    match value {
        EdgeValue::Reference { target, version } => {
            ("xref", Some(target.to_string()), Some(*version), None)
        }
        EdgeValue::Literal { value } => ("str", None, None, Some(value.as_str())),
    }
}

fn parse_node_id(value: &str, column: &str) -> RepoResult<NodeId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
