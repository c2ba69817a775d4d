//! Schema file loading
//!
//! A schema file is named after its service and lists the body fields, one per line:
//!
//! ```text
//! # frontend_to_control
//! %include common_flags
//! Mode        UINT8
//! TargetAngle FLOAT
//! ```
//!
//! `%include <name>` splices the fields of another file from the same directory at
//! that position. A missing include target is skipped without complaint. Lines that
//! cannot be interpreted are reported as [`SlateError::Schema`], logged, and skipped;
//! the rest of the file still loads.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::content_lines;
use crate::types::{Field, FieldType, HEADER_FIELDS, Schema};
use crate::{Result, SlateError};

const INCLUDE_DIRECTIVE: &str = "%include";

/// One interpreted schema line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLine<'a> {
    /// `%include <name>`
    Include(&'a str),
    /// `<name> <TYPE>`
    Field(Field),
}

/// Interpret one non-blank, non-comment line.
///
/// Tokens after the type are ignored. Returns the reason on failure.
pub fn parse_line(line: &str) -> std::result::Result<SchemaLine<'_>, String> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next().ok_or_else(|| "Line is empty".to_string())?;

    if first == INCLUDE_DIRECTIVE {
        return tokens
            .next()
            .map(SchemaLine::Include)
            .ok_or_else(|| "Include directive has no target".to_string());
    }

    let type_name =
        tokens.next().ok_or_else(|| "Line is not properly formatted".to_string())?;
    let field_type = type_name.parse::<FieldType>().map_err(|e| e.to_string())?;
    Ok(SchemaLine::Field(Field::new(first, field_type)))
}

/// Result of loading one service's schema file.
#[derive(Debug, Default)]
pub struct SchemaLoad {
    /// Body fields in wire order, includes spliced in place
    pub fields: Vec<Field>,
    /// Lines that were skipped, as schema errors
    pub skipped: Vec<SlateError>,
}

/// Loads schema files from one directory.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    dir: PathBuf,
}

impl SchemaLoader {
    /// Create a loader reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the loader reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the body field list for `service_name`.
    ///
    /// Fails only when the service's own file cannot be read.
    pub fn load(&self, service_name: &str) -> Result<SchemaLoad> {
        let mut load = SchemaLoad::default();
        let mut names: HashSet<String> =
            HEADER_FIELDS.iter().map(|(name, _)| (*name).to_string()).collect();
        let mut stack = Vec::new();

        let path = self.dir.join(service_name);
        let text = std::fs::read_to_string(&path)
            .map_err(|source| SlateError::file_error(path.clone(), source))?;

        self.splice(service_name, &text, &mut stack, &mut names, &mut load);

        debug!(
            service = service_name,
            fields = load.fields.len(),
            skipped = load.skipped.len(),
            "Loaded schema"
        );
        Ok(load)
    }

    /// Load `service_name` and build its complete [`Schema`].
    pub fn load_schema(&self, service_name: &str) -> Result<Schema> {
        let load = self.load(service_name)?;
        Schema::new(service_name, load.fields)
    }

    fn splice(
        &self,
        name: &str,
        text: &str,
        stack: &mut Vec<String>,
        names: &mut HashSet<String>,
        load: &mut SchemaLoad,
    ) {
        let path = self.dir.join(name);
        stack.push(name.to_string());

        for line in content_lines(text) {
            match parse_line(line) {
                Ok(SchemaLine::Include(target)) => {
                    if stack.iter().any(|open| open == target) {
                        skip(load, SlateError::schema_error(&path, line, "Include cycle"));
                        continue;
                    }

                    let include_path = self.dir.join(target);
                    match std::fs::read_to_string(&include_path) {
                        Ok(included) => {
                            debug!("Including {} from {}", include_path.display(), name);
                            self.splice(target, &included, stack, names, load);
                        }
                        Err(e) if e.kind() == ErrorKind::NotFound => {
                            debug!("Include target {} not found, skipping", include_path.display());
                        }
                        Err(e) => {
                            skip(
                                load,
                                SlateError::schema_error(
                                    &path,
                                    line,
                                    format!("Cannot read include target: {e}"),
                                ),
                            );
                        }
                    }
                }
                Ok(SchemaLine::Field(field)) => {
                    if names.insert(field.name.clone()) {
                        load.fields.push(field);
                    } else {
                        let reason = format!("Field '{}' is already declared", field.name);
                        skip(load, SlateError::schema_error(&path, line, reason));
                    }
                }
                Err(reason) => skip(load, SlateError::schema_error(&path, line, reason)),
            }
        }

        stack.pop();
    }
}

fn skip(load: &mut SchemaLoad, error: SlateError) {
    warn!("{}", error);
    load.skipped.push(error);
}
