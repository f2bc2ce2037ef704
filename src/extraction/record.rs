use mailhook_error::{AppError, AppResult};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Structured fields extracted from one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    pub nombre: String,
    pub cedula: String,
    pub texto_original: String,
    pub adjuntos: Vec<String>,
}

impl CanonicalRecord {
    /// Parse and normalise raw model output
    ///
    /// Output that is not a JSON object is an `Extraction` error. Missing or
    /// wrongly typed fields are defaulted, `texto_original` falling back to
    /// the message body.
    pub fn from_model_output(raw: &str, body: &str) -> AppResult<Self> {
        let content = strip_code_fence(raw);
        let value: Value = serde_json::from_str(content).map_err(|e| {
            AppError::extraction(format!("model output is not valid JSON: {}", e))
        })?;

        let Value::Object(fields) = value else {
            return Err(AppError::extraction("model output is not a JSON object"));
        };

        Ok(Self {
            nombre: scalar_text(&fields, "nombre"),
            cedula: scalar_text(&fields, "cedula"),
            texto_original: match fields.get("texto_original") {
                Some(Value::String(text)) => text.clone(),
                _ => body.to_string(),
            },
            adjuntos: string_list(&fields, "adjuntos"),
        })
    }
}

/// Accept a string or a number, anything else becomes empty
fn scalar_text(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn string_list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    match fields.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            strings.unwrap_or_else(|| {
                tracing::warn!(field = key, "Extraction list contains non-string items, using empty list");
                Vec::new()
            })
        }
        Some(other) => {
            tracing::warn!(
                field = key,
                kind = json_kind(other),
                "Extraction field is not a list of strings, using empty list"
            );
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Unwrap ```json ... ``` fences that chat models like to add
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening line, if any
    match inner.split_once('\n') {
        Some((tag, body)) if !tag.trim_start().starts_with('{') => body.trim(),
        _ => inner.trim(),
    }
}

/// Flattened projection of a record into one table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub [String; 4]);

impl Row {
    /// `{"values": [[c1, c2, c3, c4]]}` for the rows/add call
    pub fn to_payload(&self) -> Value {
        json!({ "values": [self.0] })
    }

    pub fn cells(&self) -> &[String; 4] {
        &self.0
    }
}

impl From<&CanonicalRecord> for Row {
    fn from(record: &CanonicalRecord) -> Self {
        Row([
            record.nombre.clone(),
            record.cedula.clone(),
            record.texto_original.clone(),
            record.adjuntos.join(", "),
        ])
    }
}
