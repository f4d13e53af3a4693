use crate::payload::{Cell, Group, ResultPayload, Table};
use crate::render::{CellPlan, GroupPlan, RenderPlan};

/// Paints every planned group as a `<section>` holding one merged table.
pub fn render_html(payload: &ResultPayload, plan: &RenderPlan) -> String {
    let mut out = String::new();

    for group_plan in &plan.groups {
        let Some(group) = payload.group(&group_plan.name) else {
            continue;
        };
        let Some(table) = &group.table else {
            continue;
        };
        write_group(&mut out, group, table, group_plan);
    }

    out
}

fn write_group(out: &mut String, group: &Group, table: &Table, plan: &GroupPlan) {
    out.push_str(&format!(
        "<section class=\"result-group\" data-group=\"{}\">\n",
        escape_html(&group.name)
    ));
    out.push_str("<table class=\"result-table\">\n");
    out.push_str(&format!("<caption>{}</caption>\n", escape_html(group.caption())));

    out.push_str("<thead><tr>");
    for header in &table.headers {
        out.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    out.push_str("</tr></thead>\n<tbody>\n");

    for (row_index, row) in table.rows.iter().enumerate() {
        out.push_str("<tr>");
        for (column_index, cell) in row.iter().enumerate() {
            let cell_plan = plan.cell(row_index, column_index).unwrap_or_default();
            if cell_plan.visible {
                write_cell(out, cell, cell_plan);
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");

    out.push_str(&format!(
        "<p class=\"group-rows\">{}</p>\n",
        row_count_label(table.row_count())
    ));
    if let Some(total) = group.total_amount {
        out.push_str(&format!(
            "<p class=\"group-total\">{}</p>\n",
            format_amount(total)
        ));
    }
    out.push_str("</section>\n");
}

fn write_cell(out: &mut String, cell: &Cell, plan: CellPlan) {
    out.push_str("<td");
    if plan.row_span > 1 {
        out.push_str(&format!(" rowspan=\"{}\"", plan.row_span));
    }

    let classes = [
        (plan.row_span > 1, "merged-cell"),
        (cell.is_amount, "amount"),
        (cell.is_highlight, "highlight"),
    ]
    .into_iter()
    .filter_map(|(set, class)| set.then_some(class))
    .collect::<Vec<_>>();
    if !classes.is_empty() {
        out.push_str(&format!(" class=\"{}\"", classes.join(" ")));
    }

    out.push_str(&format!(">{}</td>", escape_html(&cell.value)));
}

fn row_count_label(rows: usize) -> String {
    if rows == 1 {
        "1 row".to_string()
    } else {
        format!("{rows} rows")
    }
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// `#,##0.00`
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed.chars().any(|ch| ch != '0' && ch != '.') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{escape_html, format_amount, render_html};
    use crate::payload::ResultPayload;
    use crate::render::render;

    fn painted(group: serde_json::Value) -> String {
        let payload = ResultPayload::from_value(json!({ "g": group })).expect("valid payload");
        render_html(&payload, &render(&payload))
    }

    #[test]
    fn anchor_cells_carry_span_and_merged_class() {
        let html = painted(json!({
            "headers": ["team", "amount"],
            "rows": [
                [{"value": "t1"}, {"value": "1.00", "isAmount": true}],
                [{"value": "t1"}, {"value": "2.00", "isAmount": true, "isHighlight": true}]
            ],
            "mergeInfo": {"team": [{"start": 0, "end": 1}]}
        }));

        assert!(html.contains(r#"<td rowspan="2" class="merged-cell">t1</td>"#));
        assert!(html.contains(r#"<td class="amount highlight">2.00</td>"#));
        assert_eq!(html.matches(">t1</td>").count(), 1);
    }

    #[test]
    fn every_group_reports_its_row_count() {
        assert!(
            painted(json!({"headers": ["A"], "rows": [[{"value": "a"}], [{"value": "b"}]]}))
                .contains(r#"<p class="group-rows">2 rows</p>"#)
        );
        assert!(
            painted(json!({"headers": ["A"], "rows": [[{"value": "a"}]]}))
                .contains(r#"<p class="group-rows">1 row</p>"#)
        );
    }

    #[test]
    fn amounts_use_thousand_separators() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1000.0), "1,000.00");
        assert_eq!(format_amount(1_234_567.891), "1,234,567.89");
        assert_eq!(format_amount(-12_000.0), "-12,000.00");
        assert_eq!(format_amount(-0.001), "0.00");
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
