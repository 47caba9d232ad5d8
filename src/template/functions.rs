//! Standard template functions.
//!
//! Every function receives its arguments as strings. Only `vault` can fail
//! at runtime; the others fall back to a default or an empty string.

use base64::Engine;
use chrono::format::{Item, StrftimeItems};
use serde_json::Value;

use crate::store::{KvStore, StoreError};

/// Errors returned by a template function call.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("wrong number of args for {function}: want at least {min} got {got}")]
    Arity {
        function: &'static str,
        min: usize,
        got: usize,
    },

    #[error(transparent)]
    Lookup(#[from] MacroLookupError),
}

/// Failures of the `vault` function.
#[derive(Debug, thiserror::Error)]
pub enum MacroLookupError {
    #[error("Path is not set")]
    EmptyPath,

    #[error("Field is not set for path {path:?}")]
    EmptyField { path: String },

    #[error("Unable to create Vault client: {0}")]
    Client(#[source] StoreError),

    #[error("Unable to read path {path:?}: {source}")]
    Read {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Requested value {field:?} in key {path:?} was not found in Vault and no default was set")]
    MissingField { path: String, field: String },
}

fn require(function: &'static str, args: &[String], min: usize) -> Result<(), MacroError> {
    if args.len() < min {
        return Err(MacroError::Arity {
            function,
            min,
            got: args.len(),
        });
    }
    Ok(())
}

fn default_arg(args: &[String], index: usize) -> String {
    args.get(index).cloned().unwrap_or_default()
}

/// `env NAME [DEFAULT]`: value of an environment variable.
///
/// A variable that is set to an empty string is returned as is.
pub fn env(args: &[String]) -> Result<Value, MacroError> {
    require("env", args, 1)?;
    let value = match std::env::var_os(&args[0]) {
        Some(value) => value.to_string_lossy().into_owned(),
        None => default_arg(args, 1),
    };
    Ok(Value::String(value))
}

/// `file PATH [DEFAULT]`: contents of a file.
///
/// Any read error counts as a missing file.
pub fn file(args: &[String]) -> Result<Value, MacroError> {
    require("file", args, 1)?;
    let value = match std::fs::read(&args[0]) {
        Ok(contents) => String::from_utf8_lossy(&contents).into_owned(),
        Err(_) => default_arg(args, 1),
    };
    Ok(Value::String(value))
}

/// `b64encode VALUE`: standard base64 with padding. Extra arguments are ignored.
pub fn b64encode(args: &[String]) -> Result<Value, MacroError> {
    require("b64encode", args, 1)?;
    Ok(Value::String(
        base64::engine::general_purpose::STANDARD.encode(args[0].as_bytes()),
    ))
}

/// `now FORMAT`: local time rendered with strftime specifiers.
///
/// A format containing an invalid specifier is returned unchanged. Go style
/// layouts such as `2006-01-02` hold no specifier and come back as written.
pub fn now(args: &[String]) -> Result<Value, MacroError> {
    require("now", args, 1)?;
    let format = args[0].as_str();
    if !format.contains('%') {
        tracing::warn!(format = %format, "now format has no strftime specifiers, use e.g. %Y-%m-%d");
    }
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Ok(Value::String(format.to_string()));
    }

    Ok(Value::String(
        chrono::Local::now()
            .format_with_items(items.iter())
            .to_string(),
    ))
}

/// Builds the `vault PATH FIELD [DEFAULT]` function.
///
/// `connect` is called once per invocation to obtain a store client.
pub fn vault<C>(connect: C) -> impl Fn(&[String]) -> Result<Value, MacroError> + Send + Sync
where
    C: Fn() -> Result<Box<dyn KvStore>, StoreError> + Send + Sync + 'static,
{
    move |args: &[String]| {
        require("vault", args, 1)?;
        let path = args[0].as_str();
        if path.is_empty() {
            return Err(MacroLookupError::EmptyPath.into());
        }
        let field = match args.get(1) {
            Some(field) if !field.is_empty() => field.as_str(),
            _ => {
                return Err(MacroLookupError::EmptyField {
                    path: path.to_string(),
                }
                .into())
            }
        };

        let store = connect().map_err(MacroLookupError::Client)?;
        let data = store.read(path).map_err(|source| MacroLookupError::Read {
            path: path.to_string(),
            source,
        })?;

        if let Some(value) = data.and_then(|mut data| data.remove(field)) {
            return Ok(value);
        }

        match args.get(2) {
            Some(default) => Ok(Value::String(default.clone())),
            None => Err(MacroLookupError::MissingField {
                path: path.to_string(),
                field: field.to_string(),
            }
            .into()),
        }
    }
}
