use crate::payload::{Cell, ColumnMerge, MergeGroup, ResultPayload};

/// Splits a column into maximal runs of equal cells.
///
/// Every row lands in exactly one group; rows that differ from both
/// neighbours come back as single-row groups.
pub fn derive_merge_groups(rows: &[Vec<Cell>], column: usize) -> Vec<MergeGroup> {
    let mut groups = Vec::new();
    let mut current: Option<(usize, &Cell)> = None;

    for (index, row) in rows.iter().enumerate() {
        let Some(cell) = row.get(column) else {
            continue;
        };

        match current {
            Some((_, previous)) if previous.merge_key() == cell.merge_key() => {}
            Some((start, _)) => {
                groups.push(MergeGroup::new(start, index - 1));
                current = Some((index, cell));
            }
            None => current = Some((index, cell)),
        }
    }

    if let Some((start, _)) = current {
        groups.push(MergeGroup::new(start, rows.len() - 1));
    }

    groups
}

/// Derives merge info for tables that arrived without any. Columns not in a
/// table's headers are ignored. Returns the names of the groups it filled.
pub fn fill_missing_merge_info(payload: &mut ResultPayload, columns: &[String]) -> Vec<String> {
    let mut filled = Vec::new();

    for group in &mut payload.groups {
        let Some(table) = group.table.as_mut() else {
            continue;
        };
        if table.merge_info.is_some() {
            continue;
        }

        let derived = columns
            .iter()
            .filter_map(|name| {
                let index = table.column_index(name)?;
                let groups = derive_merge_groups(&table.rows, index);
                Some(ColumnMerge::new(name.clone(), Some(index), groups))
            })
            .collect::<Vec<_>>();

        if derived.is_empty() {
            continue;
        }

        table.merge_info = Some(derived);
        filled.push(group.name.clone());
    }

    filled
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{derive_merge_groups, fill_missing_merge_info};
    use crate::payload::{Cell, ColumnMerge, MergeGroup, ResultPayload};

    fn column(values: &[&str]) -> Vec<Vec<Cell>> {
        values.iter().map(|value| vec![Cell::text(*value)]).collect()
    }

    #[test]
    fn runs_of_equal_values_become_groups() {
        let rows = column(&["x", "x", "y", "x", "x", "x"]);

        assert_eq!(
            derive_merge_groups(&rows, 0),
            vec![
                MergeGroup::new(0, 1),
                MergeGroup::new(2, 2),
                MergeGroup::new(3, 5)
            ]
        );
    }

    #[test]
    fn raw_value_takes_precedence_over_display_text() {
        let mut rows = column(&["1,000.00", "1,000.00"]);
        rows[0][0].raw_value = Some(json!(1000.0));
        rows[1][0].raw_value = Some(json!(1000.5));

        assert_eq!(
            derive_merge_groups(&rows, 0),
            vec![MergeGroup::new(0, 0), MergeGroup::new(1, 1)]
        );
    }

    #[test]
    fn empty_column_has_no_groups() {
        assert!(derive_merge_groups(&[], 0).is_empty());
    }

    #[test]
    fn only_tables_without_merge_info_are_filled() {
        let mut payload = ResultPayload::from_value(json!({
            "plain": {
                "headers": ["team", "amount"],
                "rows": [[{"value": "t"}, {"value": "1"}], [{"value": "t"}, {"value": "2"}]]
            },
            "given": {
                "headers": ["team"],
                "rows": [[{"value": "t"}]],
                "mergeInfo": {}
            }
        }))
        .expect("valid payload");

        let filled = fill_missing_merge_info(&mut payload, &["team".to_string(), "manager".to_string()]);

        assert_eq!(filled, vec!["plain".to_string()]);
        let plain = payload.groups[0].table.as_ref().expect("table");
        assert_eq!(
            plain.merge_info,
            Some(vec![ColumnMerge::new("team", Some(0), vec![MergeGroup::new(0, 1)])])
        );
        let given = payload.groups[1].table.as_ref().expect("table");
        assert_eq!(given.merge_info, Some(Vec::new()));
    }
}
