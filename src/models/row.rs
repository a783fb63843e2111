use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One spreadsheet row as an ordered list of cell strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetRow(pub Vec<String>);

impl SheetRow {
    /// Build a row from the JSON cells returned by the values API
    pub fn from_values(values: Vec<Value>) -> Self {
        SheetRow(values.into_iter().map(cell_to_string).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for SheetRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        SheetRow(iter.into_iter().map(Into::into).collect())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
