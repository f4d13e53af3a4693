//! Validated result payload.
//!
//! The raw wire types in [`crate::models`] accept whatever the processing
//! service sends; [`ResultPayload::from_raw`] checks them once at the boundary
//! so the renderer can index rows and columns without re-checking.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::models::{RawCell, RawGroup, RawMergeGroup, RawTable};

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: String,
    pub raw_value: Option<Value>,
    pub is_amount: bool,
    pub is_highlight: bool,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            raw_value: None,
            is_amount: false,
            is_highlight: false,
        }
    }

    /// Key used to decide whether two vertically adjacent cells belong to the
    /// same merge run.
    pub fn merge_key(&self) -> MergeKey<'_> {
        match &self.raw_value {
            Some(raw) if !raw.is_null() => MergeKey::Raw(raw),
            _ => MergeKey::Display(&self.value),
        }
    }
}

impl From<RawCell> for Cell {
    fn from(raw: RawCell) -> Self {
        Self {
            value: raw.value,
            raw_value: raw.raw_value,
            is_amount: raw.is_amount,
            is_highlight: raw.is_highlight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeKey<'a> {
    Raw(&'a Value),
    Display(&'a str),
}

/// Inclusive, 0-based run of rows rendered as one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeGroup {
    pub start: usize,
    pub end: usize,
}

impl MergeGroup {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn row_span(self) -> usize {
        self.end - self.start + 1
    }

    pub const fn is_single(self) -> bool {
        self.start == self.end
    }
}

/// Merge groups of one `mergeInfo` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMerge {
    pub column: String,
    /// Position in `headers`. `None` when the table has no such column, in
    /// which case `groups` is empty and the entry was never checked.
    pub index: Option<usize>,
    pub groups: Vec<MergeGroup>,
}

impl ColumnMerge {
    pub fn new(column: impl Into<String>, index: Option<usize>, groups: Vec<MergeGroup>) -> Self {
        Self {
            column: column.into(),
            index,
            groups,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// `None` when the service sent no merge data for this table. Entries keep
    /// the order the document lists them in.
    pub merge_info: Option<Vec<ColumnMerge>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn column_merge(&self, column: &str) -> Option<&ColumnMerge> {
        self.merge_info
            .as_deref()?
            .iter()
            .find(|merge| merge.column == column)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Key of the entry in the result object.
    pub name: String,
    pub label: Option<String>,
    pub total_amount: Option<f64>,
    /// `None` when the entry carries nothing to render.
    pub table: Option<Table>,
}

impl Group {
    pub fn caption(&self) -> &str {
        self.table
            .as_ref()
            .and_then(|table| table.title.as_deref())
            .or(self.label.as_deref())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPayload {
    pub groups: Vec<Group>,
}

impl ResultPayload {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let Value::Object(entries) = value else {
            return Err(PayloadError::NotAnObject.into());
        };
        let raw = raw_groups(entries)?;
        Ok(Self::from_raw(raw)?)
    }

    pub fn from_raw(raw: Vec<(String, RawGroup)>) -> Result<Self, PayloadError> {
        let groups = raw
            .into_iter()
            .map(|(name, group)| validate_group(name, group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }
}

pub fn parse_result_payload(json: &str) -> Result<ResultPayload, ApiError> {
    let value = serde_json::from_str::<Value>(json)?;
    ResultPayload::from_value(value)
}

fn raw_groups(entries: Map<String, Value>) -> Result<Vec<(String, RawGroup)>, ApiError> {
    let mut groups = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let group = serde_json::from_value::<RawGroup>(entry)
            .map_err(|error| ApiError::Parse(format!("group {name:?}: {error}")))?;
        groups.push((name, group));
    }
    Ok(groups)
}

fn validate_group(key: String, raw: RawGroup) -> Result<Group, PayloadError> {
    let RawGroup {
        name,
        total_amount,
        excel_table,
        inline,
    } = raw;

    let source = match excel_table {
        Some(table) => Some(table),
        None if inline.is_empty() => None,
        None => Some(inline),
    };

    let table = match source {
        Some(raw_table) => validate_table(&key, raw_table)?,
        None => None,
    };

    Ok(Group {
        label: name.filter(|value| !value.trim().is_empty()),
        name: key,
        total_amount,
        table,
    })
}

fn validate_table(group: &str, raw: RawTable) -> Result<Option<Table>, PayloadError> {
    let RawTable {
        title,
        headers,
        rows,
        merge_info,
    } = raw;

    let (headers, rows) = match (headers, rows) {
        (Some(headers), Some(rows)) => (headers, rows),
        (None, None) => return Ok(None),
        _ => {
            return Err(PayloadError::IncompleteTable {
                group: group.to_string(),
            });
        }
    };

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(PayloadError::DuplicateHeader {
                group: group.to_string(),
                header: header.clone(),
            });
        }
    }

    let mut cells = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        if row.len() != headers.len() {
            return Err(PayloadError::RowWidth {
                group: group.to_string(),
                row: index,
                expected: headers.len(),
                actual: row.len(),
            });
        }
        cells.push(row.into_iter().map(Cell::from).collect::<Vec<_>>());
    }

    let merge_info = match merge_info {
        Some(columns) => Some(validate_merge_info(group, &headers, columns, cells.len())?),
        None => None,
    };

    Ok(Some(Table {
        title,
        headers,
        rows: cells,
        merge_info,
    }))
}

/// Only columns present in `headers` are parsed and checked. Other entries are
/// kept by name so the renderer can report them.
fn validate_merge_info(
    group: &str,
    headers: &[String],
    columns: Map<String, Value>,
    row_count: usize,
) -> Result<Vec<ColumnMerge>, PayloadError> {
    let mut validated = Vec::with_capacity(columns.len());
    for (column, value) in columns {
        let Some(index) = headers.iter().position(|header| *header == column) else {
            validated.push(ColumnMerge::new(column, None, Vec::new()));
            continue;
        };

        let raw = serde_json::from_value::<Vec<RawMergeGroup>>(value).map_err(|error| {
            PayloadError::MalformedGroups {
                group: group.to_string(),
                column: column.clone(),
                message: error.to_string(),
            }
        })?;
        let groups = validate_merge_groups(group, &column, &raw, row_count)?;
        validated.push(ColumnMerge::new(column, Some(index), groups));
    }
    Ok(validated)
}

fn validate_merge_groups(
    group: &str,
    column: &str,
    raw: &[RawMergeGroup],
    row_count: usize,
) -> Result<Vec<MergeGroup>, PayloadError> {
    let out_of_range = |end: i64| PayloadError::GroupOutOfRange {
        group: group.to_string(),
        column: column.to_string(),
        end,
        row_count,
    };
    let last_row = i64::try_from(row_count).map_or(i64::MAX, |count| count - 1);
    let mut groups = Vec::with_capacity(raw.len());
    let mut previous_end: Option<i64> = None;

    for entry in raw {
        let (start, end) = (entry.start, entry.end);

        if start < 0 || end < 0 {
            return Err(PayloadError::NegativeIndex {
                group: group.to_string(),
                column: column.to_string(),
            });
        }

        if start > end {
            return Err(PayloadError::InvertedGroup {
                group: group.to_string(),
                column: column.to_string(),
                start,
                end,
            });
        }

        if end > last_row {
            return Err(out_of_range(end));
        }

        if previous_end.is_some_and(|previous| start <= previous) {
            return Err(PayloadError::OverlappingGroups {
                group: group.to_string(),
                column: column.to_string(),
                start,
            });
        }

        let (Ok(first), Ok(last)) = (usize::try_from(start), usize::try_from(end)) else {
            return Err(out_of_range(end));
        };
        previous_end = Some(end);
        groups.push(MergeGroup::new(first, last));
    }

    Ok(groups)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    NotAnObject,
    IncompleteTable {
        group: String,
    },
    DuplicateHeader {
        group: String,
        header: String,
    },
    RowWidth {
        group: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
    MalformedGroups {
        group: String,
        column: String,
        message: String,
    },
    NegativeIndex {
        group: String,
        column: String,
    },
    InvertedGroup {
        group: String,
        column: String,
        start: i64,
        end: i64,
    },
    GroupOutOfRange {
        group: String,
        column: String,
        end: i64,
        row_count: usize,
    },
    OverlappingGroups {
        group: String,
        column: String,
        start: i64,
    },
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "result payload must be an object keyed by group name"),
            Self::IncompleteTable { group } => {
                write!(f, "group {group:?}: table needs both headers and rows")
            }
            Self::DuplicateHeader { group, header } => {
                write!(f, "group {group:?}: header {header:?} appears more than once")
            }
            Self::RowWidth {
                group,
                row,
                expected,
                actual,
            } => write!(
                f,
                "group {group:?}: row {row} has {actual} cells, expected {expected}"
            ),
            Self::MalformedGroups {
                group,
                column,
                message,
            } => write!(f, "group {group:?}, column {column:?}: bad merge groups: {message}"),
            Self::NegativeIndex { group, column } => {
                write!(f, "group {group:?}, column {column:?}: negative merge row index")
            }
            Self::InvertedGroup {
                group,
                column,
                start,
                end,
            } => write!(
                f,
                "group {group:?}, column {column:?}: merge start {start} is after end {end}"
            ),
            Self::GroupOutOfRange {
                group,
                column,
                end,
                row_count,
            } => write!(
                f,
                "group {group:?}, column {column:?}: merge end {end} is outside {row_count} rows"
            ),
            Self::OverlappingGroups {
                group,
                column,
                start,
            } => write!(
                f,
                "group {group:?}, column {column:?}: merge starting at {start} overlaps or precedes the previous one"
            ),
        }
    }
}

impl std::error::Error for PayloadError {}
