//! Hierarchical study-table data model
//!
//! Study databases carry two-level column keys (category, field). The
//! `database` category holds provenance (CASE, M_TIME), `case` holds the
//! result and error metrics sampled over time, and `studyparameters` holds
//! the independent variables of the study, one of which is the refinement
//! parameter.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Category of provenance columns (case name, modification time).
pub const CAT_DATABASE: &str = "database";
/// Category of result/error metric columns.
pub const CAT_CASE: &str = "case";
/// Category of study-parameter columns.
pub const CAT_STUDY_PARAMETERS: &str = "studyparameters";

/// Study-parameter field names recognized as the refinement parameter.
const REFINEMENT_FIELDS: &[&str] = &["resolution", "n_cells", "nx", "n"];

/// Errors for study-table operations
#[derive(Error, Debug)]
pub enum StudyError {
    #[error("column ({category}, {field}) not found in table schema")]
    MissingColumn { category: String, field: String },

    #[error("duplicate column ({category}, {field}) in header")]
    DuplicateColumn { category: String, field: String },

    #[error("row index {id} is not unique")]
    DuplicateRowIndex { id: usize },

    #[error("case '{case}' has duplicate timestamp {time}")]
    NonMonotonicTime { case: String, time: f64 },

    #[error("tables have mismatching schemas and cannot be concatenated")]
    SchemaMismatch,

    #[error("malformed study CSV at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, StudyError>;

/// Two-level column key (category, field)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub category: String,
    pub field: String,
}

impl ColumnKey {
    pub fn new(category: &str, field: &str) -> Self {
        Self {
            category: category.to_string(),
            field: field.to_string(),
        }
    }

    /// Key in the `database` category
    pub fn database(field: &str) -> Self {
        Self::new(CAT_DATABASE, field)
    }

    /// Key in the `case` category
    pub fn case(field: &str) -> Self {
        Self::new(CAT_CASE, field)
    }

    /// Key in the `studyparameters` category
    pub fn study_parameter(field: &str) -> Self {
        Self::new(CAT_STUDY_PARAMETERS, field)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.category, self.field)
    }
}

/// A single table cell
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

/// Canonical bit pattern so that 0.0 == -0.0 and all NaNs collapse for
/// grouping purposes.
fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0_f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl Value {
    /// Parse a raw CSV cell. Empty cells are Missing, numeric cells become
    /// Number, everything else stays Text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Total order for sorting: numbers first (NaN after finite values),
    /// then text lexically, Missing last.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    _ => Ordering::Equal,
                })
            }
            (Value::Number(_), _) => Ordering::Less,
            (_, Value::Number(_)) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Text(_), Value::Missing) => Ordering::Less,
            (Value::Missing, Value::Text(_)) => Ordering::Greater,
            (Value::Missing, Value::Missing) => Ordering::Equal,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Missing, Value::Missing) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Number(n) => {
                0_u8.hash(state);
                canonical_bits(*n).hash(state);
            }
            Value::Text(s) => {
                1_u8.hash(state);
                s.hash(state);
            }
            Value::Missing => 2_u8.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

/// Identity of one run: case name plus modification time, so that
/// concatenated databases with colliding case basenames stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseIdentity {
    pub case: Value,
    pub m_time: Option<Value>,
}

impl CaseIdentity {
    pub fn case_name(&self) -> String {
        self.case.to_string()
    }
}

/// One table row with its load-time index
#[derive(Debug, Clone)]
pub struct Row {
    /// Unique row index assigned at load, preserved by every subset stage
    pub id: usize,
    pub values: Vec<Value>,
}

/// An ordered sequence of rows under a two-level column schema
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<ColumnKey>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Build an empty table, rejecting duplicate column keys.
    pub fn new(columns: Vec<ColumnKey>) -> Result<Self> {
        let mut seen = HashSet::new();
        for key in &columns {
            if !seen.insert(key.clone()) {
                return Err(StudyError::DuplicateColumn {
                    category: key.category.clone(),
                    field: key.field.clone(),
                });
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, key: &ColumnKey) -> bool {
        self.columns.iter().any(|c| c == key)
    }

    /// Position of a column, or a schema error if absent.
    pub fn column_index(&self, key: &ColumnKey) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == key)
            .ok_or_else(|| StudyError::MissingColumn {
                category: key.category.clone(),
                field: key.field.clone(),
            })
    }

    /// Append a row; the caller supplies the unique index.
    pub fn push_row(&mut self, id: usize, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(Row { id, values });
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.rows[row].values[column]
    }

    pub fn get(&self, row: usize, key: &ColumnKey) -> Result<&Value> {
        let idx = self.column_index(key)?;
        Ok(&self.rows[row].values[idx])
    }

    /// Index of `key`, appending a Missing-filled column if absent.
    /// Re-adding an existing key returns its index, so derived columns can
    /// never be appended twice.
    pub fn ensure_column(&mut self, key: &ColumnKey) -> usize {
        if let Some(idx) = self.columns.iter().position(|c| c == key) {
            return idx;
        }
        self.columns.push(key.clone());
        for row in &mut self.rows {
            row.values.push(Value::Missing);
        }
        self.columns.len() - 1
    }

    /// Remove a column from the schema and every row.
    pub fn drop_column(&mut self, key: &ColumnKey) -> Result<()> {
        let idx = self.column_index(key)?;
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.values.remove(idx);
        }
        Ok(())
    }

    /// New table holding the rows at `positions`, in the given order.
    pub fn select_rows(&self, positions: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: positions.iter().map(|&p| self.rows[p].clone()).collect(),
        }
    }

    /// New table restricted to `keys`, in the given column order.
    pub fn select_columns(&self, keys: &[ColumnKey]) -> Result<Table> {
        let indices = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                id: row.id,
                values: indices.iter().map(|&i| row.values[i].clone()).collect(),
            })
            .collect();
        Ok(Table {
            columns: keys.to_vec(),
            rows,
        })
    }

    /// Stable sort of the rows by the value tuple at `keys`.
    pub fn sorted_by(&self, keys: &[ColumnKey]) -> Result<Table> {
        let indices = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>>>()?;
        let mut positions: Vec<usize> = (0..self.rows.len()).collect();
        positions.sort_by(|&a, &b| {
            for &i in &indices {
                let ord = self.rows[a].values[i].sort_cmp(&self.rows[b].values[i]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(self.select_rows(&positions))
    }

    /// Precondition check: every row index occurs once.
    pub fn validate_unique_index(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for row in &self.rows {
            if !seen.insert(row.id) {
                return Err(StudyError::DuplicateRowIndex { id: row.id });
            }
        }
        Ok(())
    }

    /// Concatenate tables sharing one schema; row indices must stay unique.
    pub fn concat<I: IntoIterator<Item = Table>>(parts: I) -> Result<Table> {
        let mut iter = parts.into_iter();
        let mut out = match iter.next() {
            Some(first) => first,
            None => return Ok(Table::default()),
        };
        for part in iter {
            if part.columns != out.columns {
                return Err(StudyError::SchemaMismatch);
            }
            out.rows.extend(part.rows);
        }
        out.validate_unique_index()?;
        Ok(out)
    }

    pub fn columns_in_category(&self, category: &str) -> Vec<ColumnKey> {
        self.columns
            .iter()
            .filter(|c| c.category == category)
            .cloned()
            .collect()
    }

    pub fn study_parameter_columns(&self) -> Vec<ColumnKey> {
        self.columns_in_category(CAT_STUDY_PARAMETERS)
    }

    pub fn database_columns(&self) -> Vec<ColumnKey> {
        self.columns_in_category(CAT_DATABASE)
    }

    /// The study parameter acting as a monotonic proxy for grid resolution,
    /// detected by field name. None disables all convergence stages.
    pub fn refinement_column(&self) -> Option<ColumnKey> {
        self.columns
            .iter()
            .find(|c| {
                c.category == CAT_STUDY_PARAMETERS
                    && REFINEMENT_FIELDS.contains(&c.field.to_ascii_lowercase().as_str())
            })
            .cloned()
    }

    /// The value tuple at `column_indices` for one row.
    pub fn key_tuple(&self, row: usize, column_indices: &[usize]) -> Vec<Value> {
        column_indices
            .iter()
            .map(|&i| self.rows[row].values[i].clone())
            .collect()
    }

    /// Case identities over the whole table, first-seen order, with the row
    /// positions belonging to each.
    pub fn case_identities(&self) -> Result<Vec<(CaseIdentity, Vec<usize>)>> {
        let all: Vec<usize> = (0..self.rows.len()).collect();
        self.case_identities_of(&all)
    }

    /// Case identities restricted to `positions`, first-seen order.
    pub fn case_identities_of(&self, positions: &[usize]) -> Result<Vec<(CaseIdentity, Vec<usize>)>> {
        let case_idx = self.column_index(&ColumnKey::database("CASE"))?;
        let mtime_idx = self.column_index(&ColumnKey::database("M_TIME")).ok();

        let mut order: Vec<(CaseIdentity, Vec<usize>)> = Vec::new();
        let mut seen: HashMap<CaseIdentity, usize> = HashMap::new();
        for &p in positions {
            let identity = CaseIdentity {
                case: self.rows[p].values[case_idx].clone(),
                m_time: mtime_idx.map(|i| self.rows[p].values[i].clone()),
            };
            match seen.get(&identity) {
                Some(&slot) => order[slot].1.push(p),
                None => {
                    seen.insert(identity.clone(), order.len());
                    order.push((identity, vec![p]));
                }
            }
        }
        Ok(order)
    }
}
