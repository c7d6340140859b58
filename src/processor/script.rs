//! Bytecode compiler: `COPY_SCRIPT` expansion and fixed-width action
//! encoding.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use super::binary::{DATA_ENDIAN, RecordWriter};
use super::map::MapContext;
use super::opcode::{ACTION_SIZE, COPY_SCRIPT, Opcode};
use super::project::{ContentKind, Project};
use super::resolve::resolve_operand;
use crate::error::{EncodeError, Result};
use crate::model::{Action, Script};
use crate::parser::NULL_SCRIPT;

const SCRIPT_HEADER_LEN: usize = 32 + 4;

fn copy_target(action: &Action) -> Result<&str> {
    action
        .args
        .get("script")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EncodeError::MissingOperand {
            action: COPY_SCRIPT.to_string(),
            property: "script",
            expected: "a string value",
        })
}

/// Splice every `COPY_SCRIPT` target in place, repeating until none are
/// left. A copy chain that loops back on itself is reported instead of
/// expanded forever.
pub fn expand_copy_scripts(name: &str, script: &[Action], scripts: &IndexMap<String, Script>) -> Result<Script> {
    let mut current: Script = script.to_vec();
    // Without a cycle, nesting can be no deeper than the number of scripts.
    for _ in 0..=scripts.len() {
        if !current.iter().any(|a| a.action == COPY_SCRIPT) {
            return Ok(current);
        }
        let mut next = Vec::with_capacity(current.len());
        for action in current {
            if action.action != COPY_SCRIPT {
                next.push(action);
                continue;
            }
            let target = copy_target(&action)?;
            if target == NULL_SCRIPT {
                continue;
            }
            let copied = scripts
                .get(target)
                .ok_or_else(|| EncodeError::not_found(format!("COPY_SCRIPT in \"{name}\""), "script", target, ""))?;
            next.extend(copied.iter().cloned());
        }
        current = next;
    }
    Err(EncodeError::CopyScriptCycle {
        script: name.to_string(),
        cycle: find_copy_cycle(name, scripts).unwrap_or_else(|| vec![name.to_string()]),
    })
}

/// Depth-first search along `COPY_SCRIPT` edges for the first loop.
fn find_copy_cycle(start: &str, scripts: &IndexMap<String, Script>) -> Option<Vec<String>> {
    fn visit<'a>(
        node: &'a str,
        scripts: &'a IndexMap<String, Script>,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = stack.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if done.contains(node) {
            return None;
        }
        stack.push(node);
        let targets = scripts
            .get(node)
            .into_iter()
            .flatten()
            .filter(|a| a.action == COPY_SCRIPT)
            .filter_map(|a| a.args.get("script").and_then(Value::as_str));
        for target in targets {
            if let Some(cycle) = visit(target, scripts, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.insert(node);
        None
    }

    let (start, _) = scripts.get_key_value(start)?;
    visit(start, scripts, &mut Vec::new(), &mut HashSet::new())
}

/// Map-local index of script `name`, compiling it for this map on first
/// use.
pub fn handle_script(name: &str, map: &mut MapContext, project: &mut Project) -> Result<u16> {
    if let Some(local) = map.cached_script(name) {
        return Ok(local);
    }
    if name == NULL_SCRIPT {
        return map.add_script(name, 0);
    }
    let script = project
        .data
        .scripts
        .get(name)
        .ok_or_else(|| EncodeError::not_found(format!("map \"{}\"", map.name), "script", name, ""))?;
    let actions = expand_copy_scripts(name, script, &project.data.scripts)?;

    let mut header = RecordWriter::new(SCRIPT_HEADER_LEN);
    header.chars(name, 32).u32(actions.len() as u32, DATA_ENDIAN);
    // Registered before the actions are encoded so a script that refers
    // back to itself resolves to this entry.
    let global = project.tables.reserve(ContentKind::Scripts, name)?;
    let local = map.add_script(name, global)?;

    let mut bytes = header.finish();
    bytes.reserve(actions.len() * ACTION_SIZE);
    for action in &actions {
        bytes.extend_from_slice(&encode_action(action, map, project)?);
    }
    project.tables.fill(ContentKind::Scripts, global, bytes)?;
    debug!(script = name, map = %map.name, global, local, actions = actions.len(), "script compiled");
    Ok(local)
}

pub fn encode_action(action: &Action, map: &mut MapContext, project: &mut Project) -> Result<Vec<u8>> {
    let opcode = Opcode::from_name(&action.action).ok_or_else(|| EncodeError::UnknownAction {
        action: action.action.clone(),
    })?;
    let mut w = RecordWriter::new(ACTION_SIZE);
    w.u8(opcode.byte());
    for operand in opcode.fields() {
        let value = resolve_operand(operand, action, map, project)?;
        w.uint(value, operand.width, operand.endian, || {
            format!("{} \"{}\"", action.action, operand.name)
        })?;
    }
    trace!(action = %action.action, "action encoded");
    Ok(w.finish())
}

/// The zero-action script every map's local script 0 points at.
pub fn encode_null_script(project: &mut Project) -> Result<u16> {
    let mut w = RecordWriter::new(SCRIPT_HEADER_LEN);
    w.chars(NULL_SCRIPT, 32).u32(0, DATA_ENDIAN);
    project.tables.push(ContentKind::Scripts, NULL_SCRIPT, w.finish())
}

/// Intern every `variable` and `source` operand up front so `$name$`
/// templates can refer to variables before the action that sets them is
/// compiled.
pub fn variable_lookahead(project: &mut Project) -> Result<()> {
    let names: Vec<String> = project
        .data
        .scripts
        .values()
        .flatten()
        .flat_map(|action| ["variable", "source"].map(|key| action.args.get(key)))
        .flatten()
        .filter_map(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    for name in &names {
        project.intern_variable(name, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ScenarioData;
    use crate::parser::source::MemorySource;
    use serde_json::json;

    fn scripts(value: serde_json::Value) -> IndexMap<String, Script> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_copy_script_expands_to_fixed_point() {
        let scripts = scripts(json!({
            "outer": [
                {"action": "BLOCKING_DELAY", "duration": 1},
                {"action": "COPY_SCRIPT", "script": "middle"}
            ],
            "middle": [
                {"action": "COPY_SCRIPT", "script": "inner"},
                {"action": "COPY_SCRIPT", "script": "null_script"},
                {"action": "BLOCKING_DELAY", "duration": 3}
            ],
            "inner": [{"action": "BLOCKING_DELAY", "duration": 2}]
        }));
        let out = expand_copy_scripts("outer", &scripts["outer"], &scripts).unwrap();
        let durations: Vec<_> = out.iter().map(|a| a.args["duration"].as_i64().unwrap()).collect();
        assert_eq!(durations, vec![1, 2, 3]);
    }

    #[test]
    fn test_copy_script_cycles_are_reported() {
        let scripts = scripts(json!({
            "me": [{"action": "COPY_SCRIPT", "script": "me"}],
            "a": [{"action": "COPY_SCRIPT", "script": "b"}],
            "b": [{"action": "NULL_ACTION"}, {"action": "COPY_SCRIPT", "script": "a"}]
        }));
        assert_eq!(
            expand_copy_scripts("me", &scripts["me"], &scripts).unwrap_err().to_string(),
            "COPY_SCRIPT in \"me\" never terminates; copy cycle: me -> me"
        );
        assert_eq!(
            expand_copy_scripts("a", &scripts["a"], &scripts).unwrap_err().to_string(),
            "COPY_SCRIPT in \"a\" never terminates; copy cycle: a -> b -> a"
        );
    }

    #[test]
    fn test_copy_script_missing_target() {
        let scripts = scripts(json!({"a": [{"action": "COPY_SCRIPT", "script": "ghost"}]}));
        assert_eq!(
            expand_copy_scripts("a", &scripts["a"], &scripts).unwrap_err().to_string(),
            "COPY_SCRIPT in \"a\": no script named \"ghost\" could be found"
        );
    }

    #[test]
    fn test_self_reference_and_action_layout() {
        let source = MemorySource::new();
        let mut data = ScenarioData::default();
        data.scripts = scripts(json!({
            "loop": [
                {"action": "BLOCKING_DELAY", "duration": 1000},
                {"action": "RUN_SCRIPT", "script": "loop"}
            ]
        }));
        let mut project = Project::new(&source, data);
        encode_null_script(&mut project).unwrap();
        let mut map = MapContext::new("town", 0);
        handle_script(NULL_SCRIPT, &mut map, &mut project).unwrap();
        assert_eq!(handle_script("loop", &mut map, &mut project).unwrap(), 1);
        assert_eq!(handle_script("loop", &mut map, &mut project).unwrap(), 1);
        assert_eq!(map.script_indices, vec![0, 1]);

        let bytes = project.tables.records(ContentKind::Scripts)[1].bytes.clone().unwrap();
        assert_eq!(bytes.len(), SCRIPT_HEADER_LEN + 2 * ACTION_SIZE);
        assert_eq!(&bytes[32..36], &[2, 0, 0, 0]);
        let run = &bytes[SCRIPT_HEADER_LEN + ACTION_SIZE..];
        assert_eq!(run[0], Opcode::RunScript.byte());
        assert_eq!(&run[1..3], &[1, 0]);
    }

    #[test]
    fn test_unknown_action() {
        let source = MemorySource::new();
        let mut project = Project::new(&source, ScenarioData::default());
        let mut map = MapContext::new("town", 0);
        let action: Action = serde_json::from_value(json!({"action": "DANCE"})).unwrap();
        assert_eq!(
            encode_action(&action, &mut map, &mut project).unwrap_err().to_string(),
            "invalid action: \"DANCE\""
        );
    }

    #[test]
    fn test_variable_lookahead_in_declaration_order() {
        let source = MemorySource::new();
        let mut data = ScenarioData::default();
        data.scripts = scripts(json!({
            "a": [{"action": "MUTATE_VARIABLES", "variable": "coins", "source": "gems", "operation": "ADD"}],
            "b": [{"action": "MUTATE_VARIABLE", "variable": "coins", "value": 1, "operation": "SET"},
                  {"action": "MUTATE_VARIABLE", "variable": "keys", "value": 1, "operation": "SET"}]
        }));
        let mut project = Project::new(&source, data);
        variable_lookahead(&mut project).unwrap();
        let names: Vec<_> = project
            .tables
            .records(ContentKind::Variables)
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(names, vec!["coins", "gems", "keys"]);
    }
}
