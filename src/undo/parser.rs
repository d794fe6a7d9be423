use std::collections::HashMap;

use crate::error::{Result, UndoError};

use super::BranchUndoLog;

/// Encodes and decodes the `rollback_info` payload of an undo row.
pub trait UndoLogParser: Send + Sync {
    /// Name stored under the `serializer` context key.
    fn name(&self) -> &str;

    fn encode(&self, log: &BranchUndoLog) -> Result<Vec<u8>>;

    fn decode(&self, data: &[u8]) -> Result<BranchUndoLog>;
}

pub const JSON_PARSER_NAME: &str = "json";

#[derive(Debug, Default)]
pub struct JsonUndoLogParser;

impl UndoLogParser for JsonUndoLogParser {
    fn name(&self) -> &str {
        JSON_PARSER_NAME
    }

    fn encode(&self, log: &BranchUndoLog) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(log)?)
    }

    fn decode(&self, data: &[u8]) -> Result<BranchUndoLog> {
        if data.is_empty() {
            return Err(UndoError::Decode("empty rollback info".to_string()));
        }
        Ok(serde_json::from_slice(data)?)
    }
}

/// Parsers by serializer name (case-insensitive).
pub struct UndoLogParserRegistry {
    parsers: HashMap<String, Box<dyn UndoLogParser>>,
}

impl UndoLogParserRegistry {
    pub fn empty() -> Self {
        UndoLogParserRegistry {
            parsers: HashMap::new(),
        }
    }

    pub fn register(&mut self, parser: Box<dyn UndoLogParser>) {
        self.parsers.insert(parser.name().to_lowercase(), parser);
    }

    pub fn get(&self, name: &str) -> Result<&dyn UndoLogParser> {
        self.parsers
            .get(&name.to_lowercase())
            .map(|p| p.as_ref())
            .ok_or_else(|| UndoError::Resolution(format!("no undo log parser named {name}")))
    }
}

impl Default for UndoLogParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(JsonUndoLogParser));
        registry
    }
}
