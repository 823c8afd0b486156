//! The persisted macro/variable store.
//!
//! One JSON document holding a list of named nodes. Every node kind has its
//! own namespace; duplicate names on load are reported and the first wins.
//! Once the document has been loaded, every modification writes it back.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::variable::Variable;

/// Kinds of key mapping, by how the left-hand side is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKind {
    /// Plain key sequence.
    Map,
    /// `<A-x>`.
    Alt,
    /// `<C-x>`.
    Control,
    /// Any other `<name>` key.
    Key,
}

impl MapKind {
    /// Classify a mapping's left-hand side.
    pub fn of(lhs: &str) -> MapKind {
        let lower = lhs.to_ascii_lowercase();
        if lower.starts_with("<a-") || lower.starts_with("<m-") {
            MapKind::Alt
        } else if lower.starts_with("<c-") {
            MapKind::Control
        } else if lhs.starts_with('<') && lhs.ends_with('>') && lhs.len() > 2 {
            MapKind::Key
        } else {
            MapKind::Map
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum Node {
    Abbreviation { name: String, value: String },
    Macro { name: String, commands: Vec<String> },
    Map { name: String, value: String },
    MapAlt { name: String, value: String },
    MapControl { name: String, value: String },
    MapKey { name: String, value: String },
    Variable(Variable),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    nodes: Vec<Node>,
}

/// Abbreviations, macros (including register contents), mappings and variables.
#[derive(Debug, Default)]
pub struct MacroStore {
    path: Option<PathBuf>,
    loaded: bool,
    abbreviations: BTreeMap<String, String>,
    macros: BTreeMap<String, Vec<String>>,
    maps: BTreeMap<MapKind, BTreeMap<String, String>>,
    variables: BTreeMap<String, Variable>,
}

impl MacroStore {
    /// A store backed by `path`. Nothing is read or written until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the document. A missing file is an empty store.
    pub fn load(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            self.loaded = true;
            return Ok(());
        };
        if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let document: Document = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            self.absorb(document);
        }
        self.loaded = true;
        debug!(path = %path.display(), macros = self.macros.len(), "store loaded");
        Ok(())
    }

    fn absorb(&mut self, document: Document) {
        for node in document.nodes {
            let (kind, name, fresh) = match node {
                Node::Abbreviation { name, value } => {
                    let fresh = insert_first(&mut self.abbreviations, &name, value);
                    ("abbreviation", name, fresh)
                }
                Node::Macro { name, commands } => {
                    let fresh = insert_first(&mut self.macros, &name, commands);
                    ("macro", name, fresh)
                }
                Node::Map { name, value } => self.absorb_map(MapKind::Map, "map", name, value),
                Node::MapAlt { name, value } => self.absorb_map(MapKind::Alt, "map-alt", name, value),
                Node::MapControl { name, value } => {
                    self.absorb_map(MapKind::Control, "map-control", name, value)
                }
                Node::MapKey { name, value } => self.absorb_map(MapKind::Key, "map-key", name, value),
                Node::Variable(variable) => {
                    let name = variable.name.clone();
                    let fresh = insert_first(&mut self.variables, &name, variable);
                    ("variable", name, fresh)
                }
            };
            if !fresh {
                warn!(kind, name = %name, "duplicate name in store, keeping the first");
            }
        }
    }

    fn absorb_map(
        &mut self,
        kind: MapKind,
        label: &'static str,
        name: String,
        value: String,
    ) -> (&'static str, String, bool) {
        let fresh = insert_first(self.maps.entry(kind).or_default(), &name, value);
        (label, name, fresh)
    }

    /// Write the document with two-space indentation. Does nothing until
    /// the document has been loaded, so a failed load never clobbers it.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref().filter(|_| self.loaded) else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&self.document())?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn document(&self) -> Document {
        let mut nodes = Vec::new();
        nodes.extend(self.abbreviations.iter().map(|(name, value)| Node::Abbreviation {
            name: name.clone(),
            value: value.clone(),
        }));
        nodes.extend(self.macros.iter().map(|(name, commands)| Node::Macro {
            name: name.clone(),
            commands: commands.clone(),
        }));
        for (kind, maps) in &self.maps {
            for (name, value) in maps {
                let (name, value) = (name.clone(), value.clone());
                nodes.push(match kind {
                    MapKind::Map => Node::Map { name, value },
                    MapKind::Alt => Node::MapAlt { name, value },
                    MapKind::Control => Node::MapControl { name, value },
                    MapKind::Key => Node::MapKey { name, value },
                });
            }
        }
        nodes.extend(self.variables.values().cloned().map(Node::Variable));
        Document { nodes }
    }

    /// Persist after a modification, once the document has been loaded.
    fn modified(&self) {
        if self.loaded
            && let Err(err) = self.save()
        {
            warn!("failed to save store: {err:#}");
        }
    }
}

// Macros
impl MacroStore {
    pub fn macro_commands(&self, name: &str) -> Option<&[String]> {
        self.macros.get(name).map(Vec::as_slice)
    }

    pub fn set_macro(&mut self, name: &str, commands: Vec<String>) {
        self.macros.insert(name.to_string(), commands);
        self.modified();
    }

    pub fn append_macro(&mut self, name: &str, command: String) {
        self.macros.entry(name.to_string()).or_default().push(command);
        self.modified();
    }

    pub fn remove_macro(&mut self, name: &str) -> bool {
        let removed = self.macros.remove(name).is_some();
        if removed {
            self.modified();
        }
        removed
    }

    pub fn macro_names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }
}

// Abbreviations and maps
impl MacroStore {
    pub fn abbreviations(&self) -> &BTreeMap<String, String> {
        &self.abbreviations
    }

    pub fn set_abbreviation(&mut self, name: &str, value: &str) {
        self.abbreviations.insert(name.to_string(), value.to_string());
        self.modified();
    }

    pub fn remove_abbreviation(&mut self, name: &str) -> bool {
        let removed = self.abbreviations.remove(name).is_some();
        if removed {
            self.modified();
        }
        removed
    }

    pub fn maps(&self, kind: MapKind) -> Option<&BTreeMap<String, String>> {
        self.maps.get(&kind)
    }

    pub fn set_map(&mut self, name: &str, value: &str) {
        self.maps
            .entry(MapKind::of(name))
            .or_default()
            .insert(name.to_string(), value.to_string());
        self.modified();
    }

    pub fn remove_map(&mut self, name: &str) -> bool {
        let removed = self
            .maps
            .get_mut(&MapKind::of(name))
            .is_some_and(|maps| maps.remove(name).is_some());
        if removed {
            self.modified();
        }
        removed
    }
}

// Variables
impl MacroStore {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
        self.modified();
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }
}

fn insert_first<V>(map: &mut BTreeMap<String, V>, name: &str, value: V) -> bool {
    if map.contains_key(name) {
        return false;
    }
    map.insert(name.to_string(), value);
    true
}
