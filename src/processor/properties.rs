//! Typed Tiled properties and the "less falsy" inheritance merge.
//!
//! An entity's effective properties come from three tiers. Higher tiers win
//! unless their value is *blank* (missing, `null` or `""`); `0` and `false`
//! are real values and do override a lower tier.
//!
//! | tier | source |
//! |---|---|
//! | 1 (wins) | the object placed on the map |
//! | 2 | the tile the object is drawn with |
//! | 3 | the entity-type prototype named by the merged `type` |

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::error::{EncodeError, Result};
use crate::model::TiledProperty;

pub type PropertyBag = Map<String, Value>;

/// Alpha below this collapses to [`TRANSPARENT_565`].
pub const ALPHA_THRESHOLD: u8 = 100;
/// Reserved palette value for every translucent pixel.
pub const TRANSPARENT_565: u16 = 32;

pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Loose truthiness used for optional flags such as `is_player`.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// Copy every key of `source` onto `target`. A blank source value keeps
/// the target's value; a key blank on both sides ends up `null`.
pub fn assign_less_falsy(target: &mut PropertyBag, source: &PropertyBag) {
    for (key, value) in source {
        let chosen = if is_blank(Some(value)) {
            target.get(key).cloned()
        } else {
            Some(value.clone())
        };
        let chosen = match chosen {
            Some(v) if !is_blank(Some(&v)) => v,
            _ => Value::Null,
        };
        target.insert(key.clone(), chosen);
    }
}

/// Fold `layers` lowest precedence first.
pub fn overlay(layers: &[&PropertyBag]) -> PropertyBag {
    let mut out = PropertyBag::new();
    for layer in layers {
        assign_less_falsy(&mut out, layer);
    }
    out
}

/// Apply a Tiled property list onto `target`, converting each value by its
/// declared type. Object references stay as the referenced object id
/// (`null` for "no object").
pub fn merge_properties(
    target: &mut PropertyBag,
    properties: &[TiledProperty],
    context: &str,
) -> Result<()> {
    for property in properties {
        let value = convert(property)
            .ok_or_else(|| {
                EncodeError::malformed(
                    context,
                    format!(
                        "property \"{}\" has a value {} that is not a valid {}",
                        property.name, property.value, property.kind
                    ),
                )
            })?;
        target.insert(property.name.clone(), value);
    }
    Ok(())
}

fn convert(property: &TiledProperty) -> Option<Value> {
    let value = &property.value;
    match property.kind.as_str() {
        "object" => match value.as_u64()? {
            0 => Some(Value::Null),
            id => Some(Value::from(id)),
        },
        "bool" => Some(Value::Bool(value.as_bool() == Some(true))),
        "color" => match value.as_str()? {
            "" => Some(Value::Null),
            text => parse_argb_hex(text).map(Value::from),
        },
        "int" => {
            let n = match value {
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => value.as_f64()?,
            };
            Some(Value::from(n.trunc() as i64))
        }
        "float" => {
            let n = match value {
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => value.as_f64()?,
            };
            Number::from_f64(n).map(Value::Number)
        }
        _ => Some(value.clone()),
    }
}

pub fn rgba_to_565(r: u8, g: u8, b: u8, a: u8) -> u16 {
    if a < ALPHA_THRESHOLD {
        TRANSPARENT_565
    } else {
        ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
    }
}

static RGBA_HEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})?$")
        .expect("color pattern is valid")
});

fn hex_channels(text: &str) -> Option<Vec<u8>> {
    let caps = RGBA_HEX.captures(text.trim())?;
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| u8::from_str_radix(m.as_str(), 16).ok())
        .collect()
}

/// `#RRGGBB` or `#RRGGBBAA`, as written in script actions.
pub fn parse_rgba_hex(text: &str) -> Option<u16> {
    match hex_channels(text)?.as_slice() {
        [r, g, b] => Some(rgba_to_565(*r, *g, *b, 255)),
        [r, g, b, a] => Some(rgba_to_565(*r, *g, *b, *a)),
        _ => None,
    }
}

/// `#AARRGGBB` (or `#RRGGBB`), as Tiled writes color properties.
pub fn parse_argb_hex(text: &str) -> Option<u16> {
    match hex_channels(text)?.as_slice() {
        [r, g, b] => Some(rgba_to_565(*r, *g, *b, 255)),
        [a, r, g, b] => Some(rgba_to_565(*r, *g, *b, *a)),
        _ => None,
    }
}

pub fn get_str<'a>(bag: &'a PropertyBag, key: &str) -> Option<&'a str> {
    bag.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub fn get_f64(bag: &PropertyBag, key: &str) -> Option<f64> {
    bag.get(key).and_then(Value::as_f64)
}

pub fn get_flag(bag: &PropertyBag, key: &str) -> bool {
    is_truthy(bag.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> PropertyBag {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_less_falsy_truth_table() {
        let prototype = bag(json!({
            "blank_str": "proto", "null": "proto", "zero": 5, "false": true,
            "set": "proto", "missing_above": "proto", "all_blank": ""
        }));
        let instance = bag(json!({
            "blank_str": "", "null": null, "zero": 0, "false": false,
            "set": "mine", "all_blank": null, "only_here": "x"
        }));
        let out = overlay(&[&prototype, &instance]);
        assert_eq!(out["blank_str"], "proto");
        assert_eq!(out["null"], "proto");
        assert_eq!(out["zero"], 0);
        assert_eq!(out["false"], false);
        assert_eq!(out["set"], "mine");
        assert_eq!(out["missing_above"], "proto");
        assert_eq!(out["all_blank"], Value::Null);
        assert_eq!(out["only_here"], "x");
    }

    #[test]
    fn test_three_tier_precedence() {
        let prototype = bag(json!({"on_tick": "proto_tick", "hackable_state_a": 1, "name": "type"}));
        let tile = bag(json!({"on_tick": "tile_tick", "hackable_state_a": ""}));
        let instance = bag(json!({"on_tick": "", "name": "Bob"}));
        let out = overlay(&[&prototype, &tile, &instance]);
        assert_eq!(out["on_tick"], "tile_tick");
        assert_eq!(out["hackable_state_a"], 1);
        assert_eq!(out["name"], "Bob");
    }

    #[test]
    fn test_typed_properties() {
        let props: Vec<TiledProperty> = serde_json::from_value(json!([
            {"name": "path", "type": "object", "value": 0},
            {"name": "target", "type": "object", "value": 12},
            {"name": "is_player", "type": "bool", "value": true},
            {"name": "tint", "type": "color", "value": "#ffff0000"},
            {"name": "count", "type": "int", "value": 3.7},
            {"name": "speed", "type": "float", "value": "1.5"},
            {"name": "on_tick", "value": "tick"}
        ]))
        .unwrap();
        let mut target = PropertyBag::new();
        merge_properties(&mut target, &props, "object #1").unwrap();
        assert_eq!(target["path"], Value::Null);
        assert_eq!(target["target"], 12);
        assert_eq!(target["is_player"], true);
        assert_eq!(target["tint"], 0xF800);
        assert_eq!(target["count"], 3);
        assert_eq!(target["speed"], 1.5);
        assert_eq!(target["on_tick"], "tick");
    }

    #[test]
    fn test_bad_int_property_is_reported() {
        let props: Vec<TiledProperty> =
            serde_json::from_value(json!([{"name": "count", "type": "int", "value": "lots"}])).unwrap();
        let err = merge_properties(&mut PropertyBag::new(), &props, "tile 4").unwrap_err();
        assert_eq!(
            err.to_string(),
            "tile 4: property \"count\" has a value \"lots\" that is not a valid int"
        );
    }

    #[test]
    fn test_colors() {
        assert_eq!(parse_rgba_hex("#ffffff"), Some(0xFFFF));
        assert_eq!(parse_rgba_hex("#00ff00"), Some(0x07E0));
        assert_eq!(parse_rgba_hex("#0000ff10"), Some(TRANSPARENT_565));
        assert_eq!(parse_rgba_hex("red"), None);
        assert_eq!(parse_argb_hex("#80ff0000"), Some(0xF800));
        assert_eq!(rgba_to_565(255, 255, 255, 99), 32);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(is_truthy(Some(&json!(2))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!("x"))));
        assert!(!is_truthy(Some(&json!(false))));
    }
}
