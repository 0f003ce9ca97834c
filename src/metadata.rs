//! User annotations keyed by canonical address.
//!
//! The disassembler only reads them. Edits go through [`Metadata::update`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    addr::Addr,
    error::{Error, Result},
    vecmap::VecMap,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerSize {
    /// Two bytes, combined with the program bank.
    Word,
    #[default]
    Long,
}

impl PointerSize {
    pub const fn bytes(&self) -> u32 {
        match self {
            Self::Word => 2,
            Self::Long => 3,
        }
    }
}

/// Hints that change how the disassembler treats an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flagType", from = "FlagRepr")]
pub enum InstructionFlag {
    /// Calls to this routine never return.
    NonReturningRoutine,
    /// The instruction here jumps through a long pointer table whose low,
    /// high and bank bytes are stored as three consecutive arrays.
    InterleavedPointerTableDispatch { start: Addr, entries: u32 },
    /// Calls to this routine are followed by a table of pointers, one of
    /// which the routine jumps to.
    DynamicJumpTable {
        #[serde(default)]
        entry: PointerSize,
    },
    /// Number of entries in the table following a call to a
    /// [`InstructionFlag::DynamicJumpTable`] routine.
    PointerTableLength { entries: u32 },
}

/// Every flag type accepted on input, including older names.
#[derive(Deserialize)]
#[serde(tag = "flagType")]
enum FlagRepr {
    NonReturningRoutine,
    #[serde(alias = "JmpIndirectLongInterleavedTable")]
    InterleavedPointerTableDispatch {
        start: Addr,
        entries: u32,
    },
    DynamicJumpTable {
        #[serde(default)]
        entry: PointerSize,
    },
    JslTableRoutine,
    JsrTableRoutine,
    PointerTableLength {
        entries: u32,
    },
}

impl From<FlagRepr> for InstructionFlag {
    fn from(value: FlagRepr) -> Self {
        match value {
            FlagRepr::NonReturningRoutine => Self::NonReturningRoutine,
            FlagRepr::InterleavedPointerTableDispatch { start, entries } => {
                Self::InterleavedPointerTableDispatch { start, entries }
            }
            FlagRepr::DynamicJumpTable { entry } => Self::DynamicJumpTable { entry },
            FlagRepr::JslTableRoutine => Self::DynamicJumpTable {
                entry: PointerSize::Long,
            },
            FlagRepr::JsrTableRoutine => Self::DynamicJumpTable {
                entry: PointerSize::Word,
            },
            FlagRepr::PointerTableLength { entries } => Self::PointerTableLength { entries },
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<InstructionFlag>,
}

impl MetadataLine {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.comment.is_none()
            && self.pre_comment.is_none()
            && self.flags.is_empty()
    }

    pub fn field(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::Label => self.label.as_deref(),
            MetadataField::Comment => self.comment.as_deref(),
            MetadataField::PreComment => self.pre_comment.as_deref(),
        }
    }

    fn field_mut(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::Label => &mut self.label,
            MetadataField::Comment => &mut self.comment,
            MetadataField::PreComment => &mut self.pre_comment,
        }
    }
}

/// The text fields of a [`MetadataLine`] that can be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Label,
    Comment,
    PreComment,
}

impl core::str::FromStr for MetadataField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "label" => Ok(Self::Label),
            "comment" => Ok(Self::Comment),
            "preComment" => Ok(Self::PreComment),
            _ => Err(Error::UnknownField(s.to_owned())),
        }
    }
}

impl core::fmt::Display for MetadataField {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(match self {
            Self::Label => "label",
            Self::Comment => "comment",
            Self::PreComment => "preComment",
        })
    }
}

/// Read access to annotations. Addresses are expected to be canonical.
pub trait MetadataSource {
    fn line(&self, addr: Addr) -> Option<&MetadataLine>;

    fn label(&self, addr: Addr) -> Option<&str> {
        self.line(addr)?.label.as_deref()
    }

    fn comment(&self, addr: Addr) -> Option<&str> {
        self.line(addr)?.comment.as_deref()
    }

    fn pre_comment(&self, addr: Addr) -> Option<&str> {
        self.line(addr)?.pre_comment.as_deref()
    }

    fn flags(&self, addr: Addr) -> &[InstructionFlag] {
        self.line(addr)
            .map(|line| line.flags.as_slice())
            .unwrap_or_default()
    }
}

/// No annotations at all.
impl MetadataSource for () {
    fn line(&self, _addr: Addr) -> Option<&MetadataLine> {
        None
    }
}

impl<M: MetadataSource + ?Sized> MetadataSource for &M {
    fn line(&self, addr: Addr) -> Option<&MetadataLine> {
        (**self).line(addr)
    }
}

/// All annotations of one game, ordered by address.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    lines: VecMap<Addr, MetadataLine>,
}

impl Metadata {
    pub const fn new() -> Self {
        Self {
            lines: VecMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Addr, &MetadataLine)> {
        self.lines.iter()
    }

    pub fn get(&self, addr: Addr) -> Option<&MetadataLine> {
        self.lines.get(&addr)
    }

    /// Replaces or removes the line at `addr`.
    pub fn set(&mut self, addr: Addr, line: Option<MetadataLine>) {
        match line {
            Some(line) => self.lines.insert(addr, line),
            None => {
                self.lines.remove(&addr);
            }
        }
    }

    pub fn get_or_create(&mut self, addr: Addr) -> &mut MetadataLine {
        self.lines.get_or_insert_with(addr, MetadataLine::default)
    }

    /// Sets one text field. An empty value clears it.
    pub fn update(&mut self, addr: Addr, field: MetadataField, value: &str) {
        let value = (!value.is_empty()).then(|| value.to_owned());
        if value.is_none() && self.get(addr).is_none() {
            return;
        }
        *self.get_or_create(addr).field_mut(field) = value;
    }

    /// Drops lines that carry nothing.
    pub fn clean_up(&mut self) {
        self.lines.retain(|_, line| !line.is_empty());
    }
}

impl MetadataSource for Metadata {
    fn line(&self, addr: Addr) -> Option<&MetadataLine> {
        self.get(addr)
    }
}

/// A game on disk: its name, where its ROM lives and its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GameData {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn update(&mut self, addr: Addr, field: MetadataField, value: &str) {
        self.metadata.update(addr, field, value);
    }

    pub fn clean_up(&mut self) {
        self.metadata.clean_up();
    }
}

impl MetadataSource for GameData {
    fn line(&self, addr: Addr) -> Option<&MetadataLine> {
        self.metadata.get(addr)
    }
}
