//! Games loaded from a directory of metadata files.
//!
//! Each game is described by `<dir>/<name>.json` holding its display name,
//! the path of its ROM image and its annotations. Loaded games are cached
//! and shared.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use tracing::{debug, warn};

use crate::{
    addr::Addr,
    cart::{Rom, SnesMemory},
    disasm::{self, Disassembly, Options},
    error::{Error, Result},
    instruction::PrintedCodeUnit,
    metadata::{GameData, MetadataField},
    state::State,
    vectors::{self, Vector},
};

pub struct Game {
    pub id: String,
    pub memory: SnesMemory,
    data: Mutex<GameData>,
}

impl Game {
    pub fn new(id: impl Into<String>, memory: SnesMemory, data: GameData) -> Self {
        Self {
            id: id.into(),
            memory,
            data: Mutex::new(data),
        }
    }

    /// Reads `<dir>/<id>.json` and the ROM it points to. A relative ROM path
    /// is taken relative to `dir`.
    pub fn load(dir: &Path, id: &str) -> Result<Self> {
        let json_path = dir.join(format!("{id}.json"));
        let json = match std::fs::read_to_string(&json_path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::GameNotFound(id.to_owned()));
            }
            Err(err) => return Err(err.into()),
        };
        let data = GameData::from_json(&json)?;
        let rom_path = dir.join(&data.path);
        let bytes = std::fs::read(&rom_path)?;
        debug!("loaded {} bytes for `{id}` from {}", bytes.len(), rom_path.display());
        let memory = SnesMemory::lorom(Rom::from_file_bytes(bytes));
        Ok(Self::new(id, memory, data))
    }

    /// The metadata, locked for as long as the guard lives.
    pub fn data(&self) -> MutexGuard<'_, GameData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Edits one field of the annotation at `addr`, stored under its
    /// canonical address.
    pub fn update_metadata(&self, addr: Addr, field: MetadataField, value: &str) {
        let addr = self.memory.to_canonical(addr);
        let mut data = self.data();
        data.update(addr, field, value);
        data.clean_up();
    }

    pub fn disassemble(&self, initial: State, options: &Options) -> Disassembly {
        let data = self.data();
        disasm::disassemble(initial, &self.memory, &*data, options)
    }

    pub fn print(&self, disassembly: &Disassembly) -> Vec<PrintedCodeUnit> {
        let data = self.data();
        disassembly.print(&self.memory, &*data)
    }

    pub fn vectors(&self) -> Vec<Vector> {
        let data = self.data();
        vectors::vectors(&self.memory, &*data)
    }
}

impl core::fmt::Debug for Game {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

/// Loads games on first use and keeps them around.
#[derive(Debug)]
pub struct GameSource {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<Game>>>,
}

impl GameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Game>> {
        if !is_valid_name(name) {
            return Err(Error::InvalidGameName(name.to_owned()));
        }
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        if let Some(game) = cached {
            return Ok(game);
        }

        let game = Game::load(&self.dir, name).inspect_err(|err| {
            warn!("failed to load game `{name}`: {err}");
        })?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(game))
            .clone())
    }
}

fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataSource;
    use pretty_assertions::assert_eq;

    fn game_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("disbrowser-{}-{test}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut rom = vec![0xea; 0x8000];
        rom[0..3].copy_from_slice(&[0x4c, 0x00, 0x80]);
        rom[0x7ffc..0x7ffe].copy_from_slice(&[0x00, 0x80]);
        std::fs::write(dir.join("test.sfc"), rom).unwrap();
        std::fs::write(
            dir.join("test game.json"),
            r#"{
                "name": "Test Game",
                "path": "test.sfc",
                "metadata": { "008000": { "label": "reset" } }
            }"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn names_are_checked() {
        assert!(is_valid_name("Super_Game 2"));
        assert!(!is_valid_name("../secret"));
        let source = GameSource::new(std::env::temp_dir());
        assert!(matches!(
            source.get("a/b"),
            Err(Error::InvalidGameName(name)) if name == "a/b"
        ));
    }

    #[test]
    fn missing_game() {
        let source = GameSource::new(game_dir("missing"));
        assert!(matches!(
            source.get("nothing here"),
            Err(Error::GameNotFound(name)) if name == "nothing here"
        ));
    }

    #[test]
    fn loads_and_caches() {
        let source = GameSource::new(game_dir("cache"));
        let game = source.get("test game").unwrap();
        assert_eq!(game.id, "test game");
        assert_eq!(game.data().name, "Test Game");
        assert!(Arc::ptr_eq(&game, &source.get("test game").unwrap()));

        let vectors = game.vectors();
        let reset = vectors.iter().find(|v| v.name == "RESET").unwrap();
        assert_eq!(reset.label.as_deref(), Some("reset"));

        let disassembly = game.disassemble(reset.entry_state(), &Options::default());
        assert_eq!(disassembly.len(), 1);
        let printed = game.print(&disassembly);
        assert_eq!(printed[0].label.as_deref(), Some("reset"));
        assert_eq!(printed[0].operands, "reset");
    }

    #[test]
    fn updates_use_canonical_addresses() {
        let source = GameSource::new(game_dir("update"));
        let game = source.get("test game").unwrap();
        game.update_metadata(Addr::new(0x80, 0x8000), MetadataField::Comment, "start");
        assert_eq!(game.data().comment(Addr::new(0, 0x8000)), Some("start"));

        game.update_metadata(Addr::new(0x80, 0x8000), MetadataField::Label, "");
        game.update_metadata(Addr::new(0x80, 0x8000), MetadataField::Comment, "");
        assert!(game.data().metadata.is_empty());
    }
}
