//! Minimal RESP client plumbing
//!
//! Only what the harness needs: commands go out as arrays of bulk strings,
//! replies come back as [`Value`]s. Server semantics stay on the server.

pub mod codec;
pub mod connection;

pub use codec::RespCodec;
pub use connection::Connection;

use crate::error::{HeapgrowError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// One decoded RESP reply
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Option<Vec<Value>>),
}

impl Value {
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Value::Bulk(Some(data.into()))
    }

    /// Scalar replies as text; `None` for arrays and nulls
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Simple(s) | Value::Error(s) => Some(s.clone()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Bulk(Some(b)) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::Bulk(None) | Value::Array(_) => None,
        }
    }

    /// Interpret a flat `[k1, v1, k2, v2, ...]` reply as a map
    pub fn into_string_map(self) -> Result<HashMap<String, String>> {
        let items = match self {
            Value::Array(Some(items)) => items,
            other => {
                return Err(HeapgrowError::Protocol(format!(
                    "expected key/value array, got {}",
                    other
                )))
            }
        };
        if items.len() % 2 != 0 {
            return Err(HeapgrowError::Protocol(format!(
                "key/value array has odd length {}",
                items.len()
            )));
        }

        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            let key = k.as_text().ok_or_else(|| {
                HeapgrowError::Protocol(format!("non-scalar map key {}", k))
            })?;
            map.insert(key, v.as_text().unwrap_or_default());
        }
        Ok(map)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Simple(s) => write!(f, "+{}", s),
            Value::Error(s) => write!(f, "-{}", s),
            Value::Integer(n) => write!(f, ":{}", n),
            Value::Bulk(Some(b)) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Value::Bulk(None) | Value::Array(None) => f.write_str("(nil)"),
            Value::Array(Some(items)) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A command as a list of arguments, name first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self { args: vec![Bytes::copy_from_slice(name.as_bytes())] }
    }

    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(Bytes::from(arg.to_string()));
        self
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).into_owned()
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}
