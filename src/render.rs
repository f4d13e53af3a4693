//! Render plan for merged result tables.
//!
//! [`render`] maps each table's run-length merge description onto a grid of
//! [`CellPlan`]s: the first row of a merge group is the anchor carrying the
//! row span, the rows it covers are hidden. Problems that only disable
//! merging are reported as [`RenderWarning`]s on the plan instead of failing
//! the whole render.

use serde::Serialize;

use crate::payload::{Group, ResultPayload, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPlan {
    pub visible: bool,
    pub row_span: usize,
}

impl CellPlan {
    pub const PLAIN: Self = Self {
        visible: true,
        row_span: 1,
    };

    pub const HIDDEN: Self = Self {
        visible: false,
        row_span: 1,
    };

    pub const fn anchor(row_span: usize) -> Self {
        Self {
            visible: true,
            row_span,
        }
    }
}

impl Default for CellPlan {
    fn default() -> Self {
        Self::PLAIN
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPlan {
    pub name: String,
    pub column_count: usize,
    /// Whether any merge data was applied to this table.
    pub merged: bool,
    /// `cells[row][column]`
    pub cells: Vec<Vec<CellPlan>>,
}

impl GroupPlan {
    fn plain(name: &str, table: &Table) -> Self {
        Self {
            name: name.to_string(),
            column_count: table.column_count(),
            merged: false,
            cells: vec![vec![CellPlan::PLAIN; table.column_count()]; table.row_count()],
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<CellPlan> {
        self.cells.get(row)?.get(column).copied()
    }

    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, column: usize) -> impl Iterator<Item = CellPlan> + '_ {
        self.cells
            .iter()
            .filter_map(move |row| row.get(column).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    UnknownColumn,
    MissingMergeData,
}

impl WarningCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownColumn => "unknown_column",
            Self::MissingMergeData => "missing_merge_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderWarning {
    pub code: WarningCode,
    pub message: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl RenderWarning {
    #[must_use]
    pub fn new(code: WarningCode, group: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            group: group.to_string(),
            column: None,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderPlan {
    pub groups: Vec<GroupPlan>,
    pub warnings: Vec<RenderWarning>,
}

impl RenderPlan {
    pub fn group(&self, name: &str) -> Option<&GroupPlan> {
        self.groups.iter().find(|group| group.name == name)
    }
}

pub fn render(payload: &ResultPayload) -> RenderPlan {
    let mut plan = RenderPlan::default();

    for group in &payload.groups {
        if let Some(group_plan) = render_group(group, &mut plan.warnings) {
            plan.groups.push(group_plan);
        }
    }

    plan
}

fn render_group(group: &Group, warnings: &mut Vec<RenderWarning>) -> Option<GroupPlan> {
    let Some(table) = &group.table else {
        warnings.push(RenderWarning::new(
            WarningCode::MissingMergeData,
            &group.name,
            "group has no table to render, skipped",
        ));
        return None;
    };

    let mut plan = GroupPlan::plain(&group.name, table);

    let Some(merge_info) = &table.merge_info else {
        warnings.push(RenderWarning::new(
            WarningCode::MissingMergeData,
            &group.name,
            "no merge info, rendering without merged cells",
        ));
        return Some(plan);
    };

    for merge in merge_info {
        let Some(column) = merge.index else {
            warnings.push(
                RenderWarning::new(
                    WarningCode::UnknownColumn,
                    &group.name,
                    format!("merge info references unknown column {:?}, skipped", merge.column),
                )
                .with_column(&merge.column),
            );
            continue;
        };

        for run in merge.groups.iter().filter(|run| !run.is_single()) {
            // Validated payloads keep every group inside the table.
            for row in run.start..=run.end {
                if let Some(cell) = plan.cells.get_mut(row).and_then(|cells| cells.get_mut(column)) {
                    *cell = if row == run.start {
                        CellPlan::anchor(run.row_span())
                    } else {
                        CellPlan::HIDDEN
                    };
                }
            }
            plan.merged = true;
        }
    }

    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::{CellPlan, WarningCode, render};
    use crate::payload::{Cell, ColumnMerge, Group, MergeGroup, ResultPayload, Table};

    fn table(rows: usize, merges: Option<Vec<ColumnMerge>>) -> ResultPayload {
        ResultPayload {
            groups: vec![Group {
                name: "g".to_string(),
                label: None,
                total_amount: None,
                table: Some(Table {
                    title: None,
                    headers: vec!["A".to_string(), "B".to_string()],
                    rows: (0..rows)
                        .map(|index| vec![Cell::text("a"), Cell::text(index.to_string())])
                        .collect(),
                    merge_info: merges,
                }),
            }],
        }
    }

    #[test]
    fn spanning_group_hides_covered_rows() {
        let payload = table(
            3,
            Some(vec![ColumnMerge::new("A", Some(0), vec![MergeGroup::new(0, 2)])]),
        );

        let plan = render(&payload);
        let group = plan.group("g").expect("group planned");

        assert_eq!(group.cell(0, 0), Some(CellPlan::anchor(3)));
        assert_eq!(group.cell(1, 0), Some(CellPlan::HIDDEN));
        assert_eq!(group.cell(2, 0), Some(CellPlan::HIDDEN));
        assert!(group.column(1).all(|cell| cell == CellPlan::PLAIN));
        assert!(group.merged);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn missing_merge_info_renders_plain_with_warning() {
        let plan = render(&table(2, None));

        let group = plan.group("g").expect("group planned");
        assert!(!group.merged);
        assert!(group.cells.iter().flatten().all(|cell| *cell == CellPlan::PLAIN));
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].code, WarningCode::MissingMergeData);
    }

    #[test]
    fn unknown_columns_warn_in_document_order() {
        let payload = table(
            2,
            Some(vec![
                ColumnMerge::new("zeta", None, Vec::new()),
                ColumnMerge::new("A", Some(0), vec![MergeGroup::new(0, 1)]),
                ColumnMerge::new("alpha", None, Vec::new()),
            ]),
        );

        let plan = render(&payload);

        let columns = plan
            .warnings
            .iter()
            .map(|warning| (warning.code.clone(), warning.column.as_deref()))
            .collect::<Vec<_>>();
        assert_eq!(
            columns,
            vec![
                (WarningCode::UnknownColumn, Some("zeta")),
                (WarningCode::UnknownColumn, Some("alpha")),
            ]
        );
        let group = plan.group("g").expect("group planned");
        assert_eq!(group.cell(0, 0), Some(CellPlan::anchor(2)));
    }

    #[test]
    fn group_without_table_is_skipped() {
        let payload = ResultPayload {
            groups: vec![Group {
                name: "empty".to_string(),
                label: None,
                total_amount: None,
                table: None,
            }],
        };

        let plan = render(&payload);
        assert!(plan.groups.is_empty());
        assert_eq!(plan.warnings[0].group, "empty");
    }
}
