//! Dialogs and serial dialogs.
//!
//! Dialogs are encoded the first time an action on some map refers to them,
//! once per (map, dialog) pair since their entity and script references are
//! map-local. Serial dialogs are encoded once per name.

use tracing::debug;

use super::binary::{DATA_ENDIAN, RecordWriter, combine};
use super::map::MapContext;
use super::project::{ContentKind, Project};
use super::resolve::keyed_enum;
use super::script::handle_script;
use super::tileset::load_tileset;
use crate::error::{EncodeError, Result};
use crate::model::{DialogScreenDef, ResponseDef};

pub const NO_ENTITY: u8 = 255;
pub const NO_PORTRAIT: u8 = 255;
pub const DEFAULT_SKIN: &str = "default";

keyed_enum! {
    Alignment {
        BottomLeft = 0: ["BOTTOM_LEFT"],
        BottomRight = 1: ["BOTTOM_RIGHT"],
        TopLeft = 2: ["TOP_LEFT"],
        TopRight = 3: ["TOP_RIGHT"],
    }
}

keyed_enum! {
    ResponseType {
        NoResponse = 0: ["NO_RESPONSE"],
        SelectFromShortList = 1: ["SELECT_FROM_SHORT_LIST"],
        SelectFromLongList = 2: ["SELECT_FROM_LONG_LIST"],
        EnterNumber = 3: ["ENTER_NUMBER"],
        EnterAlphanumeric = 4: ["ENTER_ALPHANUMERIC"],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialResponseType {
    None = 0,
    EnterNumber = 1,
    EnterString = 2,
}

/// Load every dialog skin's tileset up front.
pub fn load_dialog_skins(project: &mut Project) -> Result<()> {
    let skins: Vec<(String, String)> = project
        .data
        .dialog_skins
        .iter()
        .map(|(name, path)| (name.clone(), path.clone()))
        .collect();
    for (name, path) in skins {
        let tileset = load_tileset(&path, project)?;
        project.dialog_skins.insert(name, tileset.index);
    }
    Ok(())
}

pub fn dialog_key(map: &str, dialog: &str) -> String {
    format!("map:{},dialog:{}", map.replacen("map-", "", 1), dialog.replacen("dialog-", "", 1))
}

fn keyed<T>(
    value: Option<&str>,
    context: &str,
    property: &'static str,
    from_key: fn(&str) -> Option<T>,
    keys: &[&str],
) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(key) => from_key(key).map(Some).ok_or_else(|| EncodeError::UnknownKey {
            action: context.to_string(),
            property,
            value: format!("\"{key}\""),
            valid: keys.join(", "),
        }),
    }
}

fn count(len: usize, context: impl FnOnce() -> String) -> Result<u8> {
    u8::try_from(len).map_err(|_| EncodeError::FieldOverflow {
        context: context(),
        value: len as i64,
        width: 1,
    })
}

/// Encode the dialog `name` for the current map, or return the index it
/// already has.
pub fn encode_dialog(name: &str, context: &str, map: &mut MapContext, project: &mut Project) -> Result<u16> {
    let key = dialog_key(&map.name, name);
    if let Some(index) = project.dialogs.get(&key) {
        return Ok(*index);
    }
    let screens = project
        .data
        .dialogs
        .get(name)
        .cloned()
        .ok_or_else(|| EncodeError::not_found(context, "dialog", name, ""))?;
    if screens.is_empty() {
        return Err(EncodeError::EmptyDialog {
            dialog: name.to_string(),
        });
    }
    if let Some(screen) = screens.iter().position(|s| s.messages.is_empty()) {
        return Err(EncodeError::EmptyDialogScreen {
            dialog: name.to_string(),
            screen,
        });
    }

    let mut header = RecordWriter::new(32 + 4);
    header.chars(&key, 32).u32(screens.len() as u32, DATA_ENDIAN);
    let mut bytes = header.finish();
    for (i, screen) in screens.iter().enumerate() {
        let encoded = encode_screen(screen, &format!("dialog \"{name}\" screen {i}"), map, project)?;
        bytes = combine(&bytes, &encoded);
    }

    // A response script may have encoded this dialog already.
    if let Some(index) = project.dialogs.get(&key) {
        return Ok(*index);
    }
    let index = project.tables.push(ContentKind::Dialogs, key.clone(), bytes)?;
    debug!(dialog = %key, index, screens = screens.len(), "dialog encoded");
    project.dialogs.insert(key, index);
    Ok(index)
}

fn encode_screen(
    screen: &DialogScreenDef,
    context: &str,
    map: &mut MapContext,
    project: &mut Project,
) -> Result<Vec<u8>> {
    let entity = match screen.entity.as_deref().filter(|e| !e.is_empty()) {
        Some(entity) => {
            let local = map.object_local_index(entity, context)?;
            u8::try_from(local).map_err(|_| EncodeError::FieldOverflow {
                context: format!("{context} entity"),
                value: local as i64,
                width: 1,
            })?
        }
        None => NO_ENTITY,
    };
    let portrait = match screen.portrait.as_deref().filter(|p| !p.is_empty()) {
        Some(portrait) => {
            let index = project
                .portraits
                .get(portrait)
                .copied()
                .ok_or_else(|| EncodeError::not_found(context, "portrait", portrait, ""))?;
            u8::try_from(index).map_err(|_| EncodeError::FieldOverflow {
                context: format!("{context} portrait"),
                value: index as i64,
                width: 1,
            })?
        }
        None => NO_PORTRAIT,
    };
    let skin = screen.border_tileset.as_deref().unwrap_or(DEFAULT_SKIN);
    let border = project
        .dialog_skins
        .get(skin)
        .copied()
        .ok_or_else(|| EncodeError::not_found(context, "dialog skin", skin, ""))?;
    let alignment = keyed(
        screen.alignment.as_deref(),
        context,
        "alignment",
        Alignment::from_key,
        Alignment::KEYS,
    )?
    .map_or(0, Alignment::code);
    let response_type = keyed(
        screen.response_type.as_deref(),
        context,
        "response_type",
        ResponseType::from_key,
        ResponseType::KEYS,
    )?
    .map_or(0, ResponseType::code);
    let message_count = count(screen.messages.len(), || format!("{context} message count"))?;
    let response_count = count(screen.options.len(), || format!("{context} response count"))?;

    let name = screen
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or(screen.entity.as_deref())
        .unwrap_or("");
    let name_id = project.intern_string(name, Some(&*map))?;

    let mut w = RecordWriter::new(12 + screen.messages.len() * 2 + screen.options.len() * 4);
    w.u16(name_id, DATA_ENDIAN)
        .u16(border, DATA_ENDIAN)
        .u8(alignment)
        .u8(0)
        .u8(message_count)
        .u8(response_type)
        .u8(response_count)
        .u8(entity)
        .u8(portrait)
        .u8(screen.emote.unwrap_or(0));
    for message in &screen.messages {
        let id = project.intern_string(message, Some(&*map))?;
        w.u16(id, DATA_ENDIAN);
    }
    write_responses(&mut w, &screen.options, map, project)?;
    Ok(w.finish())
}

fn write_responses(
    w: &mut RecordWriter,
    responses: &[ResponseDef],
    map: &mut MapContext,
    project: &mut Project,
) -> Result<()> {
    for response in responses {
        let label = project.intern_string(&response.label, Some(&*map))?;
        let script = handle_script(&response.script, map, project)?;
        w.u16(label, DATA_ENDIAN).u16(script, DATA_ENDIAN);
    }
    Ok(())
}

/// Encode the serial dialog `name`. Its response script ids are local to the
/// first map that refers to it.
pub fn encode_serial_dialog(
    name: &str,
    context: &str,
    map: &mut MapContext,
    project: &mut Project,
) -> Result<u16> {
    if let Some(index) = project.serial_dialogs.get(name) {
        return Ok(*index);
    }
    let def = project
        .data
        .serial_dialogs
        .get(name)
        .cloned()
        .ok_or_else(|| EncodeError::not_found(context, "serial dialog", name, ""))?;
    if def.messages.is_empty() {
        return Err(EncodeError::EmptySerialDialog {
            dialog: name.to_string(),
        });
    }
    if !def.options.is_empty() && def.text_options.is_some() {
        return Err(EncodeError::ConflictingSerialOptions {
            dialog: name.to_string(),
        });
    }
    let (response_type, responses) = match &def.text_options {
        Some(options) if !options.is_empty() => (
            SerialResponseType::EnterString,
            options
                .iter()
                .map(|(label, script)| ResponseDef {
                    label: label.to_lowercase(),
                    script: script.clone(),
                })
                .collect(),
        ),
        _ if !def.options.is_empty() => (SerialResponseType::EnterNumber, def.options.clone()),
        _ => (SerialResponseType::None, Vec::new()),
    };
    let response_count = u8::try_from(responses.len()).map_err(|_| EncodeError::TooManyResponses {
        dialog: name.to_string(),
        count: responses.len(),
    })?;

    let key = name.replacen("serial_dialog-", "", 1);
    let message_id = project.intern_string(&def.messages.join("\n"), Some(&*map))?;
    let mut w = RecordWriter::new(32 + 4 + responses.len() * 4);
    w.chars(&key, 32)
        .u16(message_id, DATA_ENDIAN)
        .u8(response_type as u8)
        .u8(response_count);
    write_responses(&mut w, &responses, map, project)?;

    if let Some(index) = project.serial_dialogs.get(name) {
        return Ok(*index);
    }
    let index = project.tables.push(ContentKind::SerialDialogs, key, w.finish())?;
    debug!(serial_dialog = name, index, responses = responses.len(), "serial dialog encoded");
    project.serial_dialogs.insert(name.to_string(), index);
    Ok(index)
}
