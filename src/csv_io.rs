//! Two-header-row CSV I/O for study databases
//!
//! The first header row carries column categories, the second carries field
//! names. Data starts at line 3; the first data row is never treated as a
//! header. Case-list files accept a JSON string array or a plain newline
//! list.

use crate::table::{ColumnKey, StudyError, Table, Value};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load a study database, enforcing the unique-row-index precondition.
pub fn load_study_csv(path: &Path) -> Result<Table> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read study CSV {}", path.display()))?;
    let table = parse_study_csv(&text)?;
    table.validate_unique_index()?;
    Ok(table)
}

/// Parse two-header-row CSV text into a table.
pub fn parse_study_csv(text: &str) -> std::result::Result<Table, StudyError> {
    let mut lines = text.lines();

    let categories_line = lines.next().ok_or(StudyError::Parse {
        line: 1,
        message: "missing category header row".to_string(),
    })?;
    let fields_line = lines.next().ok_or(StudyError::Parse {
        line: 2,
        message: "missing field header row".to_string(),
    })?;

    let raw_categories = split_line(categories_line);
    let fields = split_line(fields_line);
    if raw_categories.len() != fields.len() {
        return Err(StudyError::Parse {
            line: 2,
            message: format!(
                "category header has {} columns but field header has {}",
                raw_categories.len(),
                fields.len()
            ),
        });
    }

    // Blank category cells continue the previous category (merged-header
    // style exports).
    let mut columns = Vec::with_capacity(fields.len());
    let mut current_category = String::new();
    for (category, field) in raw_categories.iter().zip(&fields) {
        if !category.trim().is_empty() {
            current_category = category.trim().to_string();
        }
        if current_category.is_empty() {
            return Err(StudyError::Parse {
                line: 1,
                message: format!("column '{}' has no category", field),
            });
        }
        columns.push(ColumnKey::new(&current_category, field.trim()));
    }

    let mut table = Table::new(columns)?;
    for (offset, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_line(line);
        if cells.len() != table.n_columns() {
            return Err(StudyError::Parse {
                line: offset + 3,
                message: format!(
                    "expected {} cells, found {}",
                    table.n_columns(),
                    cells.len()
                ),
            });
        }
        let id = table.n_rows();
        table.push_row(id, cells.iter().map(|c| Value::parse(c)).collect());
    }
    Ok(table)
}

/// Split one CSV line, honoring double-quoted fields with "" escapes.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Escape a CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a table in the two-header-row format.
pub fn table_to_csv(table: &Table) -> String {
    let mut output = String::new();

    let categories: Vec<String> = table
        .columns
        .iter()
        .map(|c| escape_field(&c.category))
        .collect();
    output.push_str(&categories.join(","));
    output.push('\n');

    let fields: Vec<String> = table
        .columns
        .iter()
        .map(|c| escape_field(&c.field))
        .collect();
    output.push_str(&fields.join(","));
    output.push('\n');

    for row in &table.rows {
        let cells: Vec<String> = row
            .values
            .iter()
            .map(|v| escape_field(&v.to_string()))
            .collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }
    output
}

/// Write a table in the two-header-row format.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    fs::write(path, table_to_csv(table))
        .with_context(|| format!("Failed to write table CSV {}", path.display()))
}

/// Read a case-list file: a JSON string array, or one case name per line.
pub fn read_case_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read case list {}", path.display()))?;
    if let Ok(cases) = serde_json::from_str::<Vec<String>>(&text) {
        return Ok(cases);
    }
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
database,database,studyparameters,case,case
CASE,M_TIME,resolution,TIME,E_VOL_ALPHA_REL
caseA,1,32,0.0,0.1
caseA,1,32,0.5,0.2
caseB,2,64,0.0,0.05
";

    #[test]
    fn test_parse_two_header_rows() {
        let table = parse_study_csv(SAMPLE).unwrap();
        assert_eq!(table.n_columns(), 5);
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.columns[0], ColumnKey::database("CASE"));
        assert_eq!(table.columns[4], ColumnKey::case("E_VOL_ALPHA_REL"));
    }

    #[test]
    fn test_parse_assigns_sequential_row_ids() {
        let table = parse_study_csv(SAMPLE).unwrap();
        let ids: Vec<usize> = table.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_first_data_row_is_data_not_header() {
        let table = parse_study_csv(SAMPLE).unwrap();
        assert_eq!(
            table.get(0, &ColumnKey::database("CASE")).unwrap(),
            &Value::Text("caseA".into())
        );
    }

    #[test]
    fn test_parse_forward_fills_blank_categories() {
        let text = "\
database,,case,
CASE,M_TIME,TIME,E_TV
caseA,1,0.0,0.3
";
        let table = parse_study_csv(text).unwrap();
        assert_eq!(table.columns[1], ColumnKey::database("M_TIME"));
        assert_eq!(table.columns[3], ColumnKey::case("E_TV"));
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        let text = "\
case,case
TIME,E_TV
0.0,0.3,extra
";
        let err = parse_study_csv(text).unwrap_err();
        assert!(matches!(err, StudyError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_parse_rejects_duplicate_columns() {
        let text = "\
case,case
TIME,TIME
0.0,0.3
";
        assert!(matches!(
            parse_study_csv(text),
            Err(StudyError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_roundtrip_preserves_layout() {
        let table = parse_study_csv(SAMPLE).unwrap();
        let rendered = table_to_csv(&table);
        let reparsed = parse_study_csv(&rendered).unwrap();
        assert_eq!(reparsed.n_rows(), table.n_rows());
        assert_eq!(reparsed.columns, table.columns);
    }

    #[test]
    fn test_split_line_with_quotes() {
        assert_eq!(
            split_line("a,\"b,c\",\"say \"\"hi\"\"\""),
            vec!["a".to_string(), "b,c".to_string(), "say \"hi\"".to_string()]
        );
    }

    #[test]
    fn test_escape_field_with_comma() {
        assert_eq!(escape_field("hello,world"), "\"hello,world\"");
    }

    #[test]
    fn test_read_case_list_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        fs::write(&path, "[\"caseA\", \"caseB\"]").unwrap();
        assert_eq!(read_case_list(&path).unwrap(), vec!["caseA", "caseB"]);
    }

    #[test]
    fn test_read_case_list_plain_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.txt");
        fs::write(&path, "caseA\n\ncaseB\n").unwrap();
        assert_eq!(read_case_list(&path).unwrap(), vec!["caseA", "caseB"]);
    }
}
