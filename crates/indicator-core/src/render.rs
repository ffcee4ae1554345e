//! Tabular Markdown rendering of artifact payloads.
//!
//! An alternate human-readable serialization of the same structures the
//! JSON writer emits; it never changes grouping or resolution results.

use serde_json::{Map, Value};
use std::collections::HashSet;

fn md_escape(value: &Value) -> String {
    let s = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    s.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('|', "\\|")
        .replace('\n', "<br>")
}

/// Render dict-shaped rows as a pipe table. Columns appear in
/// first-seen order across all rows; rows missing a column get an
/// empty cell.
fn md_table(rows: &[&Map<String, Value>]) -> String {
    if rows.is_empty() {
        return "(sem dados)\n".to_string();
    }

    let mut cols: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key) {
                cols.push(key);
            }
        }
    }

    if cols.is_empty() {
        return "(sem dados)\n".to_string();
    }

    let header = format!(
        "| {} |\n",
        cols.iter()
            .map(|c| md_escape(&Value::String((*c).to_string())))
            .collect::<Vec<_>>()
            .join(" | ")
    );
    let sep = format!("| {} |\n", vec!["---"; cols.len()].join(" | "));

    let mut body = String::new();
    for row in rows {
        let cells: Vec<String> = cols
            .iter()
            .map(|c| md_escape(row.get(*c).unwrap_or(&Value::Null)))
            .collect();
        body.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    format!("{header}{sep}{body}")
}

/// Render a single record as a field/value table.
fn md_kv_table(item: &Map<String, Value>) -> String {
    let rows: Vec<Map<String, Value>> = item
        .iter()
        .map(|(k, v)| {
            let mut row = Map::new();
            row.insert("campo".to_string(), Value::String(k.clone()));
            row.insert("valor".to_string(), v.clone());
            row
        })
        .collect();
    let refs: Vec<&Map<String, Value>> = rows.iter().collect();
    md_table(&refs)
}

/// Render a full artifact payload (per-ticker or wide) as Markdown.
pub fn to_markdown(payload: &Value) -> String {
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    };
    let ticker = field("ticker");
    let source = field("source");
    let generated_at = field("generated_at");

    let title = if !ticker.is_empty() {
        format!("# {ticker} ({source})")
    } else if !source.is_empty() {
        format!("# {source}")
    } else {
        "# data".to_string()
    };

    let mut md = format!("{title}\n\n");
    if !generated_at.is_empty() {
        md.push_str(&format!("generated_at: {generated_at}\n\n"));
    }

    match payload.get("items") {
        Some(Value::Array(items)) => {
            let rows: Vec<&Map<String, Value>> =
                items.iter().filter_map(Value::as_object).collect();
            md.push_str(&md_table(&rows));
        }
        Some(Value::Object(map)) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                md.push_str(&format!("## {key}\n\n"));
                match &map[key.as_str()] {
                    Value::Object(item) => {
                        md.push_str(&md_kv_table(item));
                        md.push('\n');
                    }
                    Value::Array(list) => {
                        let rows: Vec<&Map<String, Value>> =
                            list.iter().filter_map(Value::as_object).collect();
                        md.push_str(&md_table(&rows));
                        md.push('\n');
                    }
                    other => {
                        md.push_str(&md_escape(other));
                        md.push_str("\n\n");
                    }
                }
            }
        }
        _ => {
            if let Some(obj) = payload.as_object() {
                md.push_str(&md_kv_table(obj));
            }
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_pipes_and_folds_newlines() {
        assert_eq!(md_escape(&json!("a|b")), "a\\|b");
        assert_eq!(md_escape(&json!("line1\r\nline2")), "line1<br>line2");
        assert_eq!(md_escape(&Value::Null), "");
        assert_eq!(md_escape(&json!(10.5)), "10.5");
    }

    #[test]
    fn table_columns_in_first_seen_order() {
        let payload = json!({
            "ticker": "PETR4",
            "source": "insiders",
            "generated_at": "2024-01-01T00:00:00+00:00",
            "items": [
                {"date": "01/02/2024", "quantidade": 100},
                {"date": "02/02/2024", "valor": 5.0}
            ]
        });
        let md = to_markdown(&payload);
        assert!(md.starts_with("# PETR4 (insiders)\n\n"));
        assert!(md.contains("generated_at: 2024-01-01T00:00:00+00:00"));
        assert!(md.contains("| date | quantidade | valor |"));
        // Missing cells render empty.
        assert!(md.contains("| 02/02/2024 |  | 5.0 |"));
    }

    #[test]
    fn empty_items_render_placeholder() {
        let payload = json!({"ticker": "PETR4", "source": "insiders", "items": []});
        let md = to_markdown(&payload);
        assert!(md.contains("(sem dados)"));
    }

    #[test]
    fn wide_payload_renders_sorted_ticker_sections() {
        let payload = json!({
            "source": "volume",
            "items": {
                "VALE3": {"volume": 10},
                "PETR4": {"volume": 20}
            }
        });
        let md = to_markdown(&payload);
        assert!(md.starts_with("# volume\n\n"));
        let petr = md.find("## PETR4").unwrap();
        let vale = md.find("## VALE3").unwrap();
        assert!(petr < vale);
        assert!(md.contains("| campo | valor |"));
    }

    #[test]
    fn untitled_payload_uses_data_heading() {
        let md = to_markdown(&json!({"items": []}));
        assert!(md.starts_with("# data\n\n"));
    }
}
