//! The compile context: fifteen append-only output tables plus every
//! lookup the encoders share while one project is being compiled.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::entity_type::EntityType;
use super::intern::{InternPool, templatize};
use super::map::MapContext;
use super::tileset::Tileset;
use crate::error::{EncodeError, Result};
use crate::parser::ScenarioData;
use crate::parser::source::ProjectSource;

/// Content kinds in bundle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Maps,
    Tilesets,
    Animations,
    EntityTypes,
    Entities,
    Geometry,
    Scripts,
    Portraits,
    Dialogs,
    SerialDialogs,
    ImageColorPalettes,
    Strings,
    SaveFlags,
    Variables,
    Images,
}

impl ContentKind {
    pub const ALL: [ContentKind; 15] = [
        ContentKind::Maps,
        ContentKind::Tilesets,
        ContentKind::Animations,
        ContentKind::EntityTypes,
        ContentKind::Entities,
        ContentKind::Geometry,
        ContentKind::Scripts,
        ContentKind::Portraits,
        ContentKind::Dialogs,
        ContentKind::SerialDialogs,
        ContentKind::ImageColorPalettes,
        ContentKind::Strings,
        ContentKind::SaveFlags,
        ContentKind::Variables,
        ContentKind::Images,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Maps => "maps",
            ContentKind::Tilesets => "tilesets",
            ContentKind::Animations => "animations",
            ContentKind::EntityTypes => "entityTypes",
            ContentKind::Entities => "entities",
            ContentKind::Geometry => "geometry",
            ContentKind::Scripts => "scripts",
            ContentKind::Portraits => "portraits",
            ContentKind::Dialogs => "dialogs",
            ContentKind::SerialDialogs => "serialDialogs",
            ContentKind::ImageColorPalettes => "imageColorPalettes",
            ContentKind::Strings => "strings",
            ContentKind::SaveFlags => "save_flags",
            ContentKind::Variables => "variables",
            ContentKind::Images => "images",
        }
    }
}

/// One encoded item. `bytes` is `None` while the slot is reserved but its
/// content is still being produced.
#[derive(Debug, Clone)]
pub struct Record {
    pub name: String,
    pub bytes: Option<Vec<u8>>,
}

/// The fifteen output tables. A record's position is its scenario index;
/// nothing is ever removed or reordered.
#[derive(Debug, Default)]
pub struct OutputTables {
    tables: [Vec<Record>; 15],
}

impl OutputTables {
    fn next_index(&self, kind: ContentKind) -> Result<u16> {
        let len = self.tables[kind as usize].len();
        u16::try_from(len).map_err(|_| EncodeError::FieldOverflow {
            context: format!("{} table index", kind.label()),
            value: len as i64,
            width: 2,
        })
    }

    pub fn push(&mut self, kind: ContentKind, name: impl Into<String>, bytes: Vec<u8>) -> Result<u16> {
        let index = self.next_index(kind)?;
        self.tables[kind as usize].push(Record {
            name: name.into(),
            bytes: Some(bytes),
        });
        Ok(index)
    }

    /// Claim the next index now and supply the bytes later with [`fill`].
    ///
    /// [`fill`]: OutputTables::fill
    pub fn reserve(&mut self, kind: ContentKind, name: impl Into<String>) -> Result<u16> {
        let index = self.next_index(kind)?;
        self.tables[kind as usize].push(Record {
            name: name.into(),
            bytes: None,
        });
        Ok(index)
    }

    fn missing(kind: ContentKind, index: u16, reason: &str) -> EncodeError {
        EncodeError::malformed(format!("{} record {index}", kind.label()), reason)
    }

    pub fn fill(&mut self, kind: ContentKind, index: u16, bytes: Vec<u8>) -> Result<()> {
        let record = self.tables[kind as usize]
            .get_mut(index as usize)
            .ok_or_else(|| Self::missing(kind, index, "was never reserved"))?;
        record.bytes = Some(bytes);
        Ok(())
    }

    pub fn bytes_mut(&mut self, kind: ContentKind, index: u16) -> Result<&mut Vec<u8>> {
        self.tables[kind as usize]
            .get_mut(index as usize)
            .ok_or_else(|| Self::missing(kind, index, "was never reserved"))?
            .bytes
            .as_mut()
            .ok_or_else(|| Self::missing(kind, index, "has not been encoded yet"))
    }

    pub fn records(&self, kind: ContentKind) -> &[Record] {
        &self.tables[kind as usize]
    }

    pub fn len(&self, kind: ContentKind) -> usize {
        self.tables[kind as usize].len()
    }
}

/// Most variables a project may declare.
pub const MAX_VARIABLES: usize = 255;

/// Everything shared by the compile stages of one project.
pub struct Project<'a> {
    pub source: &'a dyn ProjectSource,
    pub data: ScenarioData,
    pub tables: OutputTables,
    strings: InternPool,
    save_flags: InternPool,
    variables: InternPool,
    /// Map name -> scenario index, in manifest order.
    pub maps: IndexMap<String, u16>,
    /// Tileset file name -> loaded tileset.
    pub tilesets: HashMap<String, Rc<Tileset>>,
    /// Image file name -> image index.
    pub images: HashMap<String, u16>,
    pub entity_types: IndexMap<String, EntityType>,
    /// Portrait name -> portrait index.
    pub portraits: HashMap<String, u16>,
    /// Skin name -> tileset index.
    pub dialog_skins: HashMap<String, u16>,
    pub dialogs: HashMap<String, u16>,
    pub serial_dialogs: HashMap<String, u16>,
}

impl<'a> Project<'a> {
    pub fn new(source: &'a dyn ProjectSource, data: ScenarioData) -> Self {
        Project {
            source,
            data,
            tables: OutputTables::default(),
            strings: InternPool::new(ContentKind::Strings),
            save_flags: InternPool::new(ContentKind::SaveFlags),
            variables: InternPool::new(ContentKind::Variables),
            maps: IndexMap::new(),
            tilesets: HashMap::new(),
            images: HashMap::new(),
            entity_types: IndexMap::new(),
            portraits: HashMap::new(),
            dialog_skins: HashMap::new(),
            dialogs: HashMap::new(),
            serial_dialogs: HashMap::new(),
        }
    }

    pub fn intern_string(&mut self, text: &str, map: Option<&MapContext>) -> Result<u16> {
        let value = templatize(text, map, &self.variables)?;
        self.strings.intern(&value, &mut self.tables)
    }

    pub fn intern_save_flag(&mut self, text: &str, map: Option<&MapContext>) -> Result<u16> {
        let value = templatize(text, map, &self.variables)?;
        self.save_flags.intern(&value, &mut self.tables)
    }

    pub fn intern_variable(&mut self, text: &str, map: Option<&MapContext>) -> Result<u16> {
        let value = templatize(text, map, &self.variables)?;
        if self.variables.get(&value).is_none() && self.variables.len() >= MAX_VARIABLES {
            return Err(EncodeError::TooManyVariables { name: value });
        }
        self.variables.intern(&value, &mut self.tables)
    }

    pub fn map_index(&self, name: &str) -> Option<u16> {
        self.maps.get(name).copied()
    }

    pub fn entity_type_index(&self, name: &str) -> Option<u16> {
        self.entity_types.get(name).map(|t| t.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source::MemorySource;

    #[test]
    fn test_reserve_then_fill_keeps_position() {
        let mut tables = OutputTables::default();
        let first = tables.reserve(ContentKind::Scripts, "outer").unwrap();
        let second = tables.push(ContentKind::Scripts, "inner", vec![1, 2, 3, 4]).unwrap();
        assert_eq!((first, second), (0, 1));
        assert!(tables.records(ContentKind::Scripts)[0].bytes.is_none());
        tables.fill(ContentKind::Scripts, first, vec![9; 4]).unwrap();
        assert_eq!(tables.records(ContentKind::Scripts)[0].bytes, Some(vec![9; 4]));
        tables.bytes_mut(ContentKind::Scripts, second).unwrap()[0] = 7;
        assert_eq!(tables.records(ContentKind::Scripts)[1].bytes, Some(vec![7, 2, 3, 4]));
    }

    #[test]
    fn test_fill_and_patch_need_a_reservation() {
        let mut tables = OutputTables::default();
        assert_eq!(
            tables.fill(ContentKind::Maps, 3, vec![0; 4]).unwrap_err().to_string(),
            "maps record 3: was never reserved"
        );
        assert_eq!(
            tables.bytes_mut(ContentKind::Entities, 0).unwrap_err().to_string(),
            "entities record 0: was never reserved"
        );
        let index = tables.reserve(ContentKind::Entities, "hero").unwrap();
        assert_eq!(
            tables.bytes_mut(ContentKind::Entities, index).unwrap_err().to_string(),
            "entities record 0: has not been encoded yet"
        );
    }

    #[test]
    fn test_kind_order_matches_discriminants() {
        for (i, kind) in ContentKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
        assert_eq!(ContentKind::ALL[14].label(), "images");
    }

    #[test]
    fn test_256th_variable_is_rejected() {
        let source = MemorySource::new();
        let mut project = Project::new(&source, ScenarioData::default());
        for i in 0..MAX_VARIABLES {
            assert_eq!(project.intern_variable(&format!("var_{i}"), None).unwrap() as usize, i);
        }
        assert_eq!(project.intern_variable("var_7", None).unwrap(), 7);
        let err = project.intern_variable("straw", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "there is a limit of 255 variables; the one that broke the encoder's back was \"straw\""
        );
    }

    #[test]
    fn test_pools_are_independent() {
        let source = MemorySource::new();
        let mut project = Project::new(&source, ScenarioData::default());
        assert_eq!(project.intern_string("door_open", None).unwrap(), 0);
        assert_eq!(project.intern_save_flag("door_open", None).unwrap(), 0);
        assert_eq!(project.intern_string("door_open", None).unwrap(), 0);
        assert_eq!(project.intern_string("other", None).unwrap(), 1);
        assert_eq!(project.tables.len(ContentKind::Strings), 2);
        assert_eq!(project.tables.len(ContentKind::SaveFlags), 1);
    }
}
