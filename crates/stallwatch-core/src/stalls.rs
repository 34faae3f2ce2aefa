use crate::geom::{repair_polygon, Point, PolygonRepair, RepairFailure};
use crate::model::Stall;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that abort a stall table load.
#[derive(Debug, Error)]
pub enum StallTableError {
    #[error("open stall table {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read stall table")]
    Csv(#[from] csv::Error),
    #[error("duplicate stall id {id:?} on rows {first} and {second}")]
    DuplicateId {
        id: String,
        first: usize,
        second: usize,
    },
}

/// Why a single table row was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("malformed row: {0}")]
    Malformed(String),
    #[error("empty polygon field")]
    EmptyPolygon,
    #[error("bad coordinate pair {0:?}")]
    BadPair(String),
    #[error("bad coordinate value {0:?}")]
    BadNumber(String),
    #[error("polygon has {0} points, need at least 3")]
    TooFewPoints(usize),
    #[error("invalid polygon: {0}")]
    Invalid(RepairFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based data row (header excluded).
    pub row: usize,
    pub stall_id: Option<String>,
    pub reason: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct StallTable {
    pub stalls: Vec<Stall>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Deserialize)]
struct StallRow {
    #[serde(default)]
    stall_id: Option<String>,
    #[serde(default)]
    polygon: Option<String>,
}

/// Loads a `stall_id,polygon` CSV table. Bad rows are skipped with a warning;
/// only I/O failures and duplicate ids fail the load.
pub fn load_stalls(path: &Path) -> Result<StallTable, StallTableError> {
    let file = File::open(path).map_err(|source| StallTableError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    load_stalls_from_reader(file)
}

pub fn load_stalls_from_reader<R: Read>(reader: R) -> Result<StallTable, StallTableError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut table = StallTable::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (idx, record) in rdr.deserialize::<StallRow>().enumerate() {
        let row = idx + 1;
        let parsed = match record {
            Ok(parsed) => parsed,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                skip(&mut table, row, None, RowError::Malformed(err.to_string()));
                continue;
            }
        };

        let id = match parsed.stall_id {
            Some(id) if !id.is_empty() => id,
            _ => format!("S{}", table.stalls.len() + 1),
        };

        let repair = match stall_boundary(parsed.polygon.as_deref().unwrap_or("")) {
            Ok(repair) => repair,
            Err(reason) => {
                skip(&mut table, row, Some(id), reason);
                continue;
            }
        };
        if let PolygonRepair::Repaired { parts, .. } = &repair {
            debug!(stall_id = %id, parts, "repaired self-intersecting stall polygon");
        }
        let boundary = match repair.into_result() {
            Ok(polygon) => polygon,
            Err(reason) => {
                skip(&mut table, row, Some(id), RowError::Invalid(reason));
                continue;
            }
        };

        if let Some(&first) = seen.get(&id) {
            return Err(StallTableError::DuplicateId {
                id,
                first,
                second: row,
            });
        }
        seen.insert(id.clone(), row);
        table.stalls.push(Stall::new(id, boundary));
    }

    Ok(table)
}

fn skip(table: &mut StallTable, row: usize, stall_id: Option<String>, reason: RowError) {
    warn!(
        row,
        stall_id = stall_id.as_deref().unwrap_or("?"),
        %reason,
        "skipping invalid stall polygon"
    );
    table.skipped.push(SkippedRow {
        row,
        stall_id,
        reason,
    });
}

fn stall_boundary(raw: &str) -> Result<PolygonRepair, RowError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RowError::EmptyPolygon);
    }
    let points = parse_points(raw)?;
    if points.len() < 3 {
        return Err(RowError::TooFewPoints(points.len()));
    }
    Ok(repair_polygon(&points))
}

/// Parses `(x1,y1);(x2,y2);...`. Empty segments (e.g. a trailing `;`) are ignored.
pub fn parse_points(raw: &str) -> Result<Vec<Point>, RowError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_xy)
        .collect()
}

fn parse_xy(token: &str) -> Result<Point, RowError> {
    let inner = token.trim_start_matches('(').trim_end_matches(')');
    let (x, y) = inner
        .split_once(',')
        .filter(|(_, y)| !y.contains(','))
        .ok_or_else(|| RowError::BadPair(token.to_string()))?;
    Ok(Point::new(parse_coord(x)?, parse_coord(y)?))
}

fn parse_coord(s: &str) -> Result<f64, RowError> {
    let s = s.trim();
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowError::BadNumber(s.to_string()))
}
