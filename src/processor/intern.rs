//! De-duplicating string tables and the `%entity%` / `$variable$` template
//! pass that runs before a string-like value is interned.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::binary::{RecordWriter, padded_len};
use super::map::{MapContext, special_index};
use super::project::{ContentKind, OutputTables};
use crate::error::{EncodeError, Result};

static ENTITY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(.*?)%").expect("entity token pattern is valid"));
static VARIABLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(.*?)\$").expect("variable token pattern is valid"));

/// One pool per string-like table (strings, save flags, variables).
#[derive(Debug)]
pub struct InternPool {
    kind: ContentKind,
    indices: HashMap<String, u16>,
}

impl InternPool {
    pub fn new(kind: ContentKind) -> Self {
        InternPool {
            kind,
            indices: HashMap::new(),
        }
    }

    pub fn get(&self, value: &str) -> Option<u16> {
        self.indices.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Index of `value`, appending a new record on first sight.
    pub fn intern(&mut self, value: &str, tables: &mut OutputTables) -> Result<u16> {
        if let Some(index) = self.get(value) {
            return Ok(index);
        }
        let index = tables.push(self.kind, value, encode_string(value))?;
        self.indices.insert(value.to_string(), index);
        Ok(index)
    }
}

/// A NUL-terminated string record, padded to 4 bytes.
pub fn encode_string(text: &str) -> Vec<u8> {
    let len = padded_len(text.len() + 1);
    let mut w = RecordWriter::new(len);
    w.chars(text, len - 1);
    w.finish()
}

/// Replace `%NAME%` with the map-local index of the object called `NAME`
/// (or a reserved keyword value) and `$NAME$` with the index of an already
/// interned variable. Indices are written back as `%%N%%` and `$$N$$`.
pub fn templatize(text: &str, map: Option<&MapContext>, variables: &InternPool) -> Result<String> {
    let with_entities = try_replace(&ENTITY_TOKEN, text, |caps| {
        let whole = &caps[0];
        let index = match special_index(whole) {
            Some(index) => index,
            None => {
                let name = &caps[1];
                let context = format!("string \"{text}\"");
                match map {
                    Some(map) => map.object_local_index(name, &context)?,
                    None => {
                        return Err(EncodeError::not_found(context, "object", name, " outside of a map"));
                    }
                }
            }
        };
        Ok(format!("%%{index}%%"))
    })?;
    try_replace(&VARIABLE_TOKEN, &with_entities, |caps| {
        let name = &caps[1];
        let index = variables.get(name).ok_or_else(|| {
            EncodeError::not_found(format!("string \"{text}\""), "variable", name, "")
        })?;
        Ok(format!("$${index}$$"))
    })
}

/// `Regex::replace_all` with a replacer that can fail.
fn try_replace(
    regex: &Regex,
    text: &str,
    mut replace: impl FnMut(&Captures) -> Result<String>,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in regex.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replace(&caps)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}
