//! Operand resolution: turns the JSON value of one action property into the
//! number the engine stores for it.

use serde_json::Value;

use super::binary::max_for_width;
use super::dialog;
use super::map::MapContext;
use super::opcode::Operand;
use super::project::Project;
use super::properties::parse_rgba_hex;
use super::script;
use crate::error::{EncodeError, Result};
use crate::model::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Entity,
    Geometry,
    Map,
    EntityType,
    Script,
    String,
    SaveFlag,
    Variable,
    Dialog,
    SerialDialog,
    Button,
    Direction,
    RelativeDirection,
    Field,
    Operation,
    Comparison,
    Color,
    /// Unbounded non-negative integer; the slot width still applies.
    Number,
    Byte,
    TwoBytes,
    Bool,
    Item,
    BleFlag,
}

macro_rules! keyed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal : [$($key:literal),+],)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Every accepted spelling, aliases included.
            pub const KEYS: &'static [&'static str] = &[$($($key,)+)*];

            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($($key)|+ => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> u8 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }
        }
    };
}
pub(crate) use keyed_enum;

keyed_enum! {
    /// Badge buttons. The face-button names alias the right joystick.
    Button {
        Mem0 = 0: ["MEM0"],
        Mem1 = 1: ["MEM1"],
        Mem2 = 2: ["MEM2"],
        Mem3 = 3: ["MEM3"],
        Bit128 = 4: ["BIT128"],
        Bit64 = 5: ["BIT64"],
        Bit32 = 6: ["BIT32"],
        Bit16 = 7: ["BIT16"],
        Bit8 = 8: ["BIT8"],
        Bit4 = 9: ["BIT4"],
        Bit2 = 10: ["BIT2"],
        Bit1 = 11: ["BIT1"],
        Xor = 12: ["XOR"],
        Add = 13: ["ADD"],
        Sub = 14: ["SUB"],
        Page = 15: ["PAGE"],
        LjoyCenter = 16: ["LJOY_CENTER"],
        LjoyUp = 17: ["LJOY_UP"],
        LjoyDown = 18: ["LJOY_DOWN"],
        LjoyLeft = 19: ["LJOY_LEFT"],
        LjoyRight = 20: ["LJOY_RIGHT"],
        RjoyCenter = 21: ["RJOY_CENTER"],
        RjoyUp = 22: ["RJOY_UP", "TRIANGLE"],
        RjoyDown = 23: ["RJOY_DOWN", "X", "CROSS"],
        RjoyLeft = 24: ["RJOY_LEFT", "CIRCLE", "O"],
        RjoyRight = 25: ["RJOY_RIGHT", "SQUARE"],
        Hax = 26: ["HAX"],
        Any = 27: ["ANY"],
    }
}

keyed_enum! {
    Direction {
        North = 0: ["north", "0"],
        East = 1: ["east", "1"],
        South = 2: ["south", "2"],
        West = 3: ["west", "3"],
    }
}

keyed_enum! {
    /// Byte offset of each addressable field inside an entity record.
    EntityField {
        X = 12: ["x"],
        Y = 14: ["y"],
        InteractScriptId = 16: ["interact_script_id"],
        TickScriptId = 18: ["tick_script_id"],
        PrimaryId = 20: ["primary_id"],
        SecondaryId = 22: ["secondary_id"],
        PrimaryIdType = 24: ["primary_id_type"],
        CurrentAnimation = 25: ["current_animation"],
        CurrentFrame = 26: ["current_frame"],
        Direction = 27: ["direction"],
        HackableStateA = 28: ["hackable_state_a"],
        HackableStateB = 29: ["hackable_state_b"],
        HackableStateC = 30: ["hackable_state_c"],
        HackableStateD = 31: ["hackable_state_d"],
    }
}

keyed_enum! {
    Operation {
        Set = 0: ["SET"],
        Add = 1: ["ADD"],
        Sub = 2: ["SUB"],
        Div = 3: ["DIV"],
        Mul = 4: ["MUL"],
        Mod = 5: ["MOD"],
        Rng = 6: ["RNG"],
    }
}

keyed_enum! {
    Comparison {
        Lt = 0: ["LT", "<"],
        LtEq = 1: ["LTEQ", "<="],
        Eq = 2: ["EQ", "=="],
        GtEq = 3: ["GTEQ", ">="],
        Gt = 4: ["GT", ">"],
    }
}

/// Resolve one operand of `action` to the value written into its slot.
pub fn resolve_operand(
    operand: &Operand,
    action: &Action,
    map: &mut MapContext,
    project: &mut Project,
) -> Result<u32> {
    let property = operand.name;
    match operand.kind {
        OperandKind::Entity => {
            let name = require_name(action, property)?;
            map.entity_local_index(name, &action.action).map(u32::from)
        }
        OperandKind::Geometry => {
            let name = require_name(action, property)?;
            map.geometry_local_index(name, &action.action).map(u32::from)
        }
        OperandKind::Map => {
            let name = require_name(action, property)?;
            project
                .map_index(name)
                .map(u32::from)
                .ok_or_else(|| EncodeError::not_found(&action.action, "map", name, ""))
        }
        OperandKind::EntityType => {
            let name = require_name(action, property)?;
            project
                .entity_type_index(name)
                .map(u32::from)
                .ok_or_else(|| EncodeError::not_found(&action.action, "entity type", name, ""))
        }
        OperandKind::Script => {
            let name = require_name(action, property)?.to_string();
            script::handle_script(&name, map, project).map(u32::from)
        }
        OperandKind::String => {
            let text = require_string(action, property)?;
            project.intern_string(text, Some(&*map)).map(u32::from)
        }
        OperandKind::SaveFlag => {
            let text = require_string(action, property)?;
            project.intern_save_flag(text, Some(&*map)).map(u32::from)
        }
        OperandKind::Variable => {
            let text = require_string(action, property)?;
            project.intern_variable(text, Some(&*map)).map(u32::from)
        }
        OperandKind::Dialog => {
            let name = require_string(action, property)?.to_string();
            dialog::encode_dialog(&name, &action.action, map, project).map(u32::from)
        }
        OperandKind::SerialDialog => {
            let name = require_string(action, property)?.to_string();
            dialog::encode_serial_dialog(&name, &action.action, map, project).map(u32::from)
        }
        OperandKind::Button => {
            lookup_key(action, property, Button::from_key, Button::KEYS).map(|b| b.code().into())
        }
        OperandKind::Direction => {
            lookup_key(action, property, Direction::from_key, Direction::KEYS)
                .map(|d| d.code().into())
        }
        OperandKind::Field => {
            lookup_key(action, property, EntityField::from_key, EntityField::KEYS)
                .map(|f| f.code().into())
        }
        OperandKind::Operation => {
            lookup_key(action, property, Operation::from_key, Operation::KEYS)
                .map(|o| o.code().into())
        }
        OperandKind::Comparison => {
            lookup_key(action, property, Comparison::from_key, Comparison::KEYS)
                .map(|c| c.code().into())
        }
        OperandKind::RelativeDirection => relative_direction(action, property),
        OperandKind::Color => {
            let text = require_string(action, property)?;
            parse_rgba_hex(text)
                .map(u32::from)
                .ok_or_else(|| EncodeError::InvalidOperand {
                    action: action.action.clone(),
                    property,
                    value: format!("\"{text}\""),
                    reason: "expected a color like #RRGGBB or #RRGGBBAA".into(),
                })
        }
        OperandKind::Number => {
            let value = number(action, property)?;
            bounded(action, property, value, max_for_width(operand.width))
        }
        OperandKind::Byte => {
            let value = number(action, property)?;
            bounded(action, property, value, u8::MAX as u64)
        }
        OperandKind::TwoBytes => {
            let value = number(action, property)?;
            bounded(action, property, value, u16::MAX as u64)
        }
        OperandKind::Bool => match action.args.get(property) {
            Some(Value::Bool(b)) => Ok(*b as u32),
            _ => Err(EncodeError::MissingOperand {
                action: action.action.clone(),
                property,
                expected: "a (true | false) value",
            }),
        },
        OperandKind::Item | OperandKind::BleFlag => Err(EncodeError::InvalidOperand {
            action: action.action.clone(),
            property,
            value: display_value(action.args.get(property)),
            reason: "this operand is not supported by the engine yet".into(),
        }),
    }
}

fn require_string<'a>(action: &'a Action, property: &'static str) -> Result<&'a str> {
    action
        .args
        .get(property)
        .and_then(Value::as_str)
        .ok_or_else(|| EncodeError::MissingOperand {
            action: action.action.clone(),
            property,
            expected: "a string value",
        })
}

/// Like [`require_string`] but also rejects the empty string.
fn require_name<'a>(action: &'a Action, property: &'static str) -> Result<&'a str> {
    match require_string(action, property)? {
        "" => Err(EncodeError::MissingOperand {
            action: action.action.clone(),
            property,
            expected: "a non-empty string value",
        }),
        name => Ok(name),
    }
}

fn lookup_key<T>(
    action: &Action,
    property: &'static str,
    from_key: fn(&str) -> Option<T>,
    keys: &[&str],
) -> Result<T> {
    let raw = action
        .args
        .get(property)
        .ok_or_else(|| EncodeError::MissingOperand {
            action: action.action.clone(),
            property,
            expected: "a value",
        })?;
    let key = match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    key.as_deref()
        .and_then(from_key)
        .ok_or_else(|| EncodeError::UnknownKey {
            action: action.action.clone(),
            property,
            value: raw.to_string(),
            valid: keys.join(", "),
        })
}

fn number(action: &Action, property: &'static str) -> Result<i64> {
    let value = action
        .args
        .get(property)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| EncodeError::MissingOperand {
            action: action.action.clone(),
            property,
            expected: "a number value",
        })?;
    let value = value.trunc() as i64;
    if value < 0 {
        return Err(EncodeError::InvalidOperand {
            action: action.action.clone(),
            property,
            value: value.to_string(),
            reason: "must be greater than or equal to zero".into(),
        });
    }
    Ok(value)
}

fn bounded(action: &Action, property: &'static str, value: i64, max: u64) -> Result<u32> {
    if value as u64 > max {
        return Err(EncodeError::OutOfRange {
            action: action.action.clone(),
            property,
            value,
            max,
        });
    }
    Ok(value as u32)
}

/// -3..=3, stored as a two's complement byte.
fn relative_direction(action: &Action, property: &'static str) -> Result<u32> {
    let raw = action
        .args
        .get(property)
        .ok_or_else(|| EncodeError::MissingOperand {
            action: action.action.clone(),
            property,
            expected: "a value",
        })?;
    match raw.as_i64() {
        Some(v) if (-3..=3).contains(&v) => Ok((v as i8) as u8 as u32),
        _ => Err(EncodeError::InvalidOperand {
            action: action.action.clone(),
            property,
            value: raw.to_string(),
            reason: "value must be an integer from -3 to +3".into(),
        }),
    }
}

fn display_value(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_string(), Value::to_string)
}
