use crate::arena::deep_copy;
use crate::arena::SymbolArena;
use crate::arena::SymbolId;
use crate::kind::NameKind;
use crate::kind::SymbolKind;
use crate::name::Name;
use crate::sym::Symbol;
use ahash::HashMap;
use ahash::HashMapExt;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StoreError {
  DuplicateName(Name),
  MissingName(SymbolKind),
  WrongKind {
    expected: NameKind,
    found: SymbolKind,
  },
  /// A proxy or member being written still has an unresolved slot.
  MissingRealType(String),
  /// A node that is not a type appeared in a type position.
  NotAType(SymbolKind),
  /// A stored reference points at a row that does not exist.
  MalformedRef(String),
}

impl Display for StoreError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      StoreError::DuplicateName(name) => write!(f, "duplicate name {}", name),
      StoreError::MissingName(kind) => write!(f, "{} symbol has no name", kind),
      StoreError::WrongKind { expected, found } => {
        write!(f, "expected a {} symbol, found {}", expected, found)
      }
      StoreError::MissingRealType(name) => {
        write!(f, "'{}' has no resolved underlying type", name)
      }
      StoreError::NotAType(kind) => write!(f, "{} is not a type", kind),
      StoreError::MalformedRef(what) => write!(f, "malformed reference: {}", what),
    }
  }
}

impl Error for StoreError {}

/// Read side: a source that can materialise declarations by name into a
/// caller-supplied arena. Loaded subgraphs are complete copies; the caller
/// owns them outright.
pub trait SymbolLookup {
  fn load_defined(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId>;
  fn load_typedef(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId>;
  fn load_procedure(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId>;
  fn load_constant(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId>;
  /// Every enum that declares a value named `value_name`, in registration
  /// order.
  fn load_enums_by_value_name(&self, value_name: &str, arena: &mut SymbolArena) -> Vec<SymbolId>;
}

/// Write side: a sink that accepts fully formed declarations.
pub trait SymbolStorage {
  fn add_defined_type(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError>;
  fn add_typedef(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError>;
  fn add_procedure(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError>;
  fn add_constant(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError>;
}

/// Lookup that never finds anything. The bottom of a lookup chain.
#[derive(Copy, Clone, Default, Debug)]
pub struct EmptyLookup;

impl SymbolLookup for EmptyLookup {
  fn load_defined(&self, _name: &str, _arena: &mut SymbolArena) -> Option<SymbolId> {
    None
  }

  fn load_typedef(&self, _name: &str, _arena: &mut SymbolArena) -> Option<SymbolId> {
    None
  }

  fn load_procedure(&self, _name: &str, _arena: &mut SymbolArena) -> Option<SymbolId> {
    None
  }

  fn load_constant(&self, _name: &str, _arena: &mut SymbolArena) -> Option<SymbolId> {
    None
  }

  fn load_enums_by_value_name(&self, _value_name: &str, _arena: &mut SymbolArena) -> Vec<SymbolId> {
    Vec::new()
  }
}

/// Name-to-node map that remembers insertion order, so iteration and
/// serialisation are deterministic.
#[derive(Clone, Default, Debug)]
pub struct NameTable {
  map: HashMap<String, SymbolId>,
  order: Vec<SymbolId>,
}

impl NameTable {
  pub fn new() -> NameTable {
    NameTable {
      map: HashMap::new(),
      order: Vec::new(),
    }
  }

  pub fn insert(&mut self, name: &str, id: SymbolId) -> bool {
    if self.map.contains_key(name) {
      return false;
    }
    self.map.insert(name.to_string(), id);
    self.order.push(id);
    true
  }

  pub fn get(&self, name: &str) -> Option<SymbolId> {
    self.map.get(name).copied()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.map.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Ids in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
    self.order.iter().copied()
  }
}

/// In-memory implementation of both capabilities, with its own arena. Serves
/// as the backing source in tests and as a scratch target for conversions.
#[derive(Clone, Default, Debug)]
pub struct MemoryStore {
  arena: SymbolArena,
  defined: NameTable,
  typedefs: NameTable,
  procedures: NameTable,
  constants: NameTable,
  /// Value name to (enum, value) pairs, in registration order.
  enum_values: HashMap<String, Vec<(SymbolId, SymbolId)>>,
}

impl MemoryStore {
  pub fn new() -> MemoryStore {
    MemoryStore::default()
  }

  pub fn arena(&self) -> &SymbolArena {
    &self.arena
  }

  pub fn defined_types(&self) -> impl Iterator<Item = SymbolId> + '_ {
    self.defined.iter()
  }

  pub fn typedefs(&self) -> impl Iterator<Item = SymbolId> + '_ {
    self.typedefs.iter()
  }

  pub fn procedures(&self) -> impl Iterator<Item = SymbolId> + '_ {
    self.procedures.iter()
  }

  pub fn constants(&self) -> impl Iterator<Item = SymbolId> + '_ {
    self.constants.iter()
  }

  pub fn count(&self) -> usize {
    self.defined.len() + self.typedefs.len() + self.procedures.len() + self.constants.len()
  }

  fn register_enum_values(&mut self, enum_id: SymbolId) {
    let values = match self.arena.get(enum_id) {
      Symbol::Enum(d) => d.values.clone(),
      _ => return,
    };
    for value_id in values {
      let name = match self.arena.get(value_id) {
        Symbol::EnumValue(d) => d.name.clone(),
        _ => continue,
      };
      self.enum_values.entry(name).or_default().push((enum_id, value_id));
    }
  }

}

fn named_of(arena: &SymbolArena, id: SymbolId, expected: NameKind) -> Result<Name, StoreError> {
  let sym = arena.get(id);
  let Some(name) = sym.global_name() else {
    return Err(StoreError::MissingName(sym.kind()));
  };
  if name.kind != expected {
    return Err(StoreError::WrongKind {
      expected,
      found: sym.kind(),
    });
  }
  Ok(name)
}

impl SymbolStorage for MemoryStore {
  fn add_defined_type(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let sym = arena.get(id);
    let Some(name) = sym.global_name() else {
      return Err(StoreError::MissingName(sym.kind()));
    };
    if !matches!(
      name.kind,
      NameKind::Struct | NameKind::Union | NameKind::Enum | NameKind::FunctionPointer
    ) {
      return Err(StoreError::WrongKind {
        expected: NameKind::Struct,
        found: sym.kind(),
      });
    }
    if self.defined.contains(&name.name) {
      return Err(StoreError::DuplicateName(name));
    }
    let copied = deep_copy(arena, id, &mut self.arena);
    self.defined.insert(&name.name, copied);
    if matches!(self.arena.get(copied), Symbol::Enum(_)) {
      self.register_enum_values(copied);
    }
    Ok(())
  }

  fn add_typedef(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let name = named_of(arena, id, NameKind::TypeDef)?;
    if self.typedefs.contains(&name.name) {
      return Err(StoreError::DuplicateName(name));
    }
    let copied = deep_copy(arena, id, &mut self.arena);
    self.typedefs.insert(&name.name, copied);
    Ok(())
  }

  fn add_procedure(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let name = named_of(arena, id, NameKind::Procedure)?;
    if self.procedures.contains(&name.name) {
      return Err(StoreError::DuplicateName(name));
    }
    let copied = deep_copy(arena, id, &mut self.arena);
    self.procedures.insert(&name.name, copied);
    Ok(())
  }

  fn add_constant(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let name = named_of(arena, id, NameKind::Constant)?;
    if self.constants.contains(&name.name) {
      return Err(StoreError::DuplicateName(name));
    }
    let copied = deep_copy(arena, id, &mut self.arena);
    self.constants.insert(&name.name, copied);
    Ok(())
  }
}

impl SymbolLookup for MemoryStore {
  fn load_defined(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    let id = self.defined.get(name)?;
    Some(deep_copy(&self.arena, id, arena))
  }

  fn load_typedef(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    let id = self.typedefs.get(name)?;
    Some(deep_copy(&self.arena, id, arena))
  }

  fn load_procedure(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    let id = self.procedures.get(name)?;
    Some(deep_copy(&self.arena, id, arena))
  }

  fn load_constant(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    let id = self.constants.get(name)?;
    Some(deep_copy(&self.arena, id, arena))
  }

  fn load_enums_by_value_name(&self, value_name: &str, arena: &mut SymbolArena) -> Vec<SymbolId> {
    let Some(pairs) = self.enum_values.get(value_name) else {
      return Vec::new();
    };
    pairs
      .iter()
      .map(|&(enum_id, _)| deep_copy(&self.arena, enum_id, arena))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kind::BuiltinKind;
  use crate::kind::ConstantKind;

  #[test]
  fn round_trips_a_struct_through_the_store() {
    let mut arena = SymbolArena::new();
    let s = arena.new_struct("POINT");
    let builtin = arena.new_builtin(BuiltinKind::Int, false);
    arena.add_member(s, "x", builtin);
    arena.add_member(s, "y", builtin);

    let mut store = MemoryStore::new();
    store.add_defined_type(&arena, s).unwrap();

    let mut dest = SymbolArena::new();
    let loaded = store.load_defined("POINT", &mut dest).unwrap();
    assert_eq!(dest.name(loaded), Some("POINT"));
    assert_eq!(dest.children(loaded).len(), 2);
    assert!(store.load_defined("MISSING", &mut dest).is_none());
  }

  #[test]
  fn rejects_duplicate_names() {
    let mut arena = SymbolArena::new();
    let a = arena.new_struct("S");
    let b = arena.new_struct("S");
    let mut store = MemoryStore::new();
    store.add_defined_type(&arena, a).unwrap();
    assert_eq!(
      store.add_defined_type(&arena, b),
      Err(StoreError::DuplicateName(Name::new("S", NameKind::Struct)))
    );
    // A procedure with the same identifier is a different name.
    let p = arena.new_procedure("S");
    store.add_procedure(&arena, p).unwrap();
  }

  #[test]
  fn finds_enums_by_value_name() {
    let mut arena = SymbolArena::new();
    let first = arena.new_enum("Colors");
    arena.add_enum_value(first, "RED", "0");
    let second = arena.new_enum("Flags");
    arena.add_enum_value(second, "RED", "1");

    let mut store = MemoryStore::new();
    store.add_defined_type(&arena, first).unwrap();
    store.add_defined_type(&arena, second).unwrap();

    let mut dest = SymbolArena::new();
    let enums = store.load_enums_by_value_name("RED", &mut dest);
    assert_eq!(enums.len(), 2);
    assert_eq!(dest.name(enums[0]), Some("Colors"));
    assert_eq!(dest.name(enums[1]), Some("Flags"));
    assert!(store.load_enums_by_value_name("BLUE", &mut dest).is_empty());
  }

  #[test]
  fn rejects_wrong_kinds() {
    let mut arena = SymbolArena::new();
    let c = arena.new_constant("MAX", "10", ConstantKind::Macro);
    let mut store = MemoryStore::new();
    assert!(matches!(
      store.add_defined_type(&arena, c),
      Err(StoreError::WrongKind { .. })
    ));
    store.add_constant(&arena, c).unwrap();
  }
}
