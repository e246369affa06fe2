//! The OpenAPI 3 subset accepted for action groups, and document walkers.

use serde_json::{json, Value};

/// HTTP methods that may appear as operations under a path item.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// JSON Schema describing the shape of an acceptable API document.
///
/// Deliberately narrower than full OpenAPI: `info.title`, `info.version`
/// and at least one path are required, every path starts with `/`, and
/// every operation declares its responses.
pub fn document_schema() -> Value {
    let operation = json!({
        "type": "object",
        "required": ["responses"],
        "properties": {
            "operationId": { "type": "string", "minLength": 1 },
            "summary": { "type": "string" },
            "description": { "type": "string" },
            "requestBody": {
                "type": "object",
                "required": ["content"],
                "properties": { "content": { "type": "object" } }
            },
            "responses": { "type": "object", "minProperties": 1 }
        }
    });

    let mut path_item = serde_json::Map::new();
    for method in HTTP_METHODS {
        path_item.insert((*method).to_string(), operation.clone());
    }

    json!({
        "type": "object",
        "required": ["openapi", "info", "paths"],
        "properties": {
            "openapi": { "type": "string", "pattern": "^3\\." },
            "info": {
                "type": "object",
                "required": ["title", "version"],
                "properties": {
                    "title": { "type": "string", "minLength": 1 },
                    "version": { "type": "string", "minLength": 1 }
                }
            },
            "paths": {
                "type": "object",
                "minProperties": 1,
                "propertyNames": { "pattern": "^/" },
                "additionalProperties": {
                    "type": "object",
                    "properties": Value::Object(path_item)
                }
            },
            "components": {
                "type": "object",
                "properties": {
                    "schemas": { "type": "object" }
                }
            }
        }
    })
}

/// One operation found under `paths`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub body: &'a Value,
}

impl<'a> Operation<'a> {
    pub fn operation_id(&self) -> Option<&'a str> {
        self.body
            .get("operationId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// `POST /reset` style label for messages.
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }
}

/// Every operation in the document, in path then method order.
pub fn operations(document: &Value) -> Vec<Operation<'_>> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for (path, item) in paths {
        for method in HTTP_METHODS {
            if let Some(body) = item.get(*method) {
                found.push(Operation { path, method, body });
            }
        }
    }
    found
}

/// Every `$ref` string in the document, with the JSON pointer of the object
/// holding it.
pub fn references(document: &Value) -> Vec<(String, String)> {
    let mut found = Vec::new();
    collect_refs(document, String::new(), &mut found);
    found
}

fn collect_refs(value: &Value, location: String, found: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref").and_then(Value::as_str) {
                found.push((location.clone(), target.to_string()));
            }
            for (key, child) in map {
                let escaped = key.replace('~', "~0").replace('/', "~1");
                collect_refs(child, format!("{location}/{escaped}"), found);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                collect_refs(child, format!("{location}/{idx}"), found);
            }
        }
        _ => {}
    }
}
