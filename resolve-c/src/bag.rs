use crate::dll::DllResolver;
use ahash::HashMap;
use ahash::HashMapExt;
use itertools::Itertools;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use symbol_c::arena::SymbolArena;
use symbol_c::arena::SymbolId;
use symbol_c::diag::Diagnostics;
use symbol_c::iter::find_relationships;
use symbol_c::iter::Relationship;
use symbol_c::kind::BuiltinKind;
use symbol_c::kind::SymbolKind;
use symbol_c::lookup::EmptyLookup;
use symbol_c::lookup::NameTable;
use symbol_c::lookup::StoreError;
use symbol_c::lookup::SymbolLookup;
use symbol_c::lookup::SymbolStorage;
use symbol_c::name::anonymous_name;
use symbol_c::name::Name;
use symbol_c::sym::Symbol;
use symbol_c::sym::ValuePayload;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BagError {
  DuplicateName(Name),
  MissingName(SymbolKind),
  WrongKind(SymbolKind),
}

impl Display for BagError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      BagError::DuplicateName(name) => write!(f, "duplicate name {}", name),
      BagError::MissingName(kind) => write!(f, "{} symbol has no name", kind),
      BagError::WrongKind(kind) => write!(f, "{} symbols cannot be added directly", kind),
    }
  }
}

impl Error for BagError {}

struct PassResult {
  succeeded: bool,
  loaded: bool,
}

/// A working set of declarations being resolved against a backing lookup.
///
/// The bag owns an arena holding everything added to it plus everything it
/// pulls in from the backing source; resolution patches proxy nodes in place
/// until a fixpoint, then the resolved subset can be written to storage.
pub struct SymbolBag {
  arena: SymbolArena,
  backing: Box<dyn SymbolLookup>,
  defined: NameTable,
  typedefs: NameTable,
  procedures: NameTable,
  constants: NameTable,
  /// Value name to (enum, value) pairs. Lookups take the first registration.
  enum_values: HashMap<String, Vec<(SymbolId, SymbolId)>>,
}

impl SymbolBag {
  pub fn new() -> SymbolBag {
    SymbolBag::with_backing(Box::new(EmptyLookup))
  }

  pub fn with_backing(backing: Box<dyn SymbolLookup>) -> SymbolBag {
    SymbolBag {
      arena: SymbolArena::new(),
      backing,
      defined: NameTable::new(),
      typedefs: NameTable::new(),
      procedures: NameTable::new(),
      constants: NameTable::new(),
      enum_values: HashMap::new(),
    }
  }

  /// Declaration sources construct their nodes directly in the bag's arena.
  pub fn arena(&self) -> &SymbolArena {
    &self.arena
  }

  pub fn arena_mut(&mut self) -> &mut SymbolArena {
    &mut self.arena
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

  // Registration.

  /// Adds a struct, union, enum or function pointer. Nameless definitions get
  /// a generated placeholder name.
  pub fn add_defined_type(&mut self, id: SymbolId) -> Result<(), BagError> {
    match self.arena.get_mut(id) {
      Symbol::Struct(d) | Symbol::Union(d) => {
        if d.name.is_empty() {
          d.name = anonymous_name();
        }
      }
      Symbol::Enum(d) => {
        if d.name.is_empty() {
          d.name = anonymous_name();
        }
      }
      Symbol::FunctionPointer(d) => {
        if d.name.is_empty() {
          d.name = anonymous_name();
        }
      }
      other => return Err(BagError::WrongKind(other.kind())),
    }
    let Some(name) = self.arena.global_name(id) else {
      return Err(BagError::MissingName(self.arena.kind(id)));
    };
    if !self.defined.insert(&name.name, id) {
      return Err(BagError::DuplicateName(name));
    }
    if matches!(self.arena.get(id), Symbol::Enum(_)) {
      self.register_enum_values(id);
    }
    Ok(())
  }

  pub fn add_typedef(&mut self, id: SymbolId) -> Result<(), BagError> {
    self.add_named(id, SymbolKind::TypeDef)
  }

  pub fn add_procedure(&mut self, id: SymbolId) -> Result<(), BagError> {
    self.add_named(id, SymbolKind::Procedure)
  }

  pub fn add_constant(&mut self, id: SymbolId) -> Result<(), BagError> {
    self.add_named(id, SymbolKind::Constant)
  }

  /// Routes a top-level declaration to the namespace its kind belongs in.
  pub fn add_symbol(&mut self, id: SymbolId) -> Result<(), BagError> {
    match self.arena.kind(id) {
      SymbolKind::Struct | SymbolKind::Union | SymbolKind::Enum | SymbolKind::FunctionPointer => {
        self.add_defined_type(id)
      }
      SymbolKind::TypeDef => self.add_typedef(id),
      SymbolKind::Procedure => self.add_procedure(id),
      SymbolKind::Constant => self.add_constant(id),
      other => Err(BagError::WrongKind(other)),
    }
  }

  fn add_named(&mut self, id: SymbolId, expected: SymbolKind) -> Result<(), BagError> {
    if self.arena.kind(id) != expected {
      return Err(BagError::WrongKind(self.arena.kind(id)));
    }
    let Some(name) = self.arena.global_name(id) else {
      return Err(BagError::MissingName(expected));
    };
    if name.name.is_empty() {
      return Err(BagError::MissingName(expected));
    }
    let table = match expected {
      SymbolKind::TypeDef => &mut self.typedefs,
      SymbolKind::Procedure => &mut self.procedures,
      SymbolKind::Constant => &mut self.constants,
      _ => unreachable!(),
    };
    if !table.insert(&name.name, id) {
      return Err(BagError::DuplicateName(name));
    }
    Ok(())
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

  // Local finds.

  pub fn find_defined_type(&self, name: &str) -> Option<SymbolId> {
    self.defined.get(name)
  }

  pub fn find_typedef(&self, name: &str) -> Option<SymbolId> {
    self.typedefs.get(name)
  }

  pub fn find_procedure(&self, name: &str) -> Option<SymbolId> {
    self.procedures.get(name)
  }

  pub fn find_constant(&self, name: &str) -> Option<SymbolId> {
    self.constants.get(name)
  }

  // Find-or-load: local first, then the backing source. The bool reports
  // whether the backing source was hit, which drives the fixpoint loop.

  pub fn find_or_load_defined_type(&mut self, name: &str) -> (Option<SymbolId>, bool) {
    if let Some(id) = self.defined.get(name) {
      return (Some(id), false);
    }
    let Some(id) = self.backing.load_defined(name, &mut self.arena) else {
      return (None, false);
    };
    self.register_loaded_defined(id);
    (Some(id), true)
  }

  pub fn find_or_load_typedef(&mut self, name: &str) -> (Option<SymbolId>, bool) {
    if let Some(id) = self.typedefs.get(name) {
      return (Some(id), false);
    }
    let Some(id) = self.backing.load_typedef(name, &mut self.arena) else {
      return (None, false);
    };
    self.typedefs.insert(name, id);
    (Some(id), true)
  }

  pub fn find_or_load_procedure(&mut self, name: &str) -> (Option<SymbolId>, bool) {
    if let Some(id) = self.procedures.get(name) {
      return (Some(id), false);
    }
    let Some(id) = self.backing.load_procedure(name, &mut self.arena) else {
      return (None, false);
    };
    self.procedures.insert(name, id);
    (Some(id), true)
  }

  pub fn find_or_load_constant(&mut self, name: &str) -> (Option<SymbolId>, bool) {
    if let Some(id) = self.constants.get(name) {
      return (Some(id), false);
    }
    let Some(id) = self.backing.load_constant(name, &mut self.arena) else {
      return (None, false);
    };
    self.constants.insert(name, id);
    (Some(id), true)
  }

  fn register_loaded_defined(&mut self, id: SymbolId) {
    let Some(name) = self.arena.global_name(id) else {
      return;
    };
    if !self.defined.insert(&name.name, id) {
      return;
    }
    if matches!(self.arena.get(id), Symbol::Enum(_)) {
      self.register_enum_values(id);
    }
  }

  /// Resolves a type reference as written in source. An empty qualification
  /// matches anything; `struct`/`union`/`enum` must match the definition's
  /// kind, and a mismatch is a miss, not an error. `class` is accepted as a
  /// synonym for `struct`.
  pub fn find_or_load_type(&mut self, qualification: &str, name: &str) -> (Option<SymbolId>, bool) {
    let qual = if qualification == "class" {
      "struct"
    } else {
      qualification
    };
    let mut loaded = false;
    let candidate = if let Some(id) = self.defined.get(name) {
      Some(id)
    } else if let Some(id) = self.typedefs.get(name) {
      Some(id)
    } else {
      let (found, l) = self.find_or_load_defined_type(name);
      loaded |= l;
      if found.is_some() {
        found
      } else {
        let (found, l) = self.find_or_load_typedef(name);
        loaded |= l;
        if found.is_some() {
          found
        } else {
          BuiltinKind::from_keyword(name).map(|(kind, unsigned)| self.arena.new_builtin(kind, unsigned))
        }
      }
    };
    let Some(id) = candidate else {
      return (None, loaded);
    };
    if qual.is_empty() {
      return (Some(id), loaded);
    }
    let matches = matches!(
      (qual, self.arena.get(id)),
      ("struct", Symbol::Struct(_)) | ("union", Symbol::Union(_)) | ("enum", Symbol::Enum(_))
    );
    if matches {
      (Some(id), loaded)
    } else {
      (None, loaded)
    }
  }

  /// Resolves a value reference: constants first, then enum values. When
  /// several enums declare the same value name, the first registered wins.
  /// Returns the symbol the value refers to (the constant, or the enum).
  pub fn find_or_load_value(&mut self, name: &str) -> (Option<SymbolId>, bool) {
    if let Some(id) = self.constants.get(name) {
      return (Some(id), false);
    }
    if let Some(id) = self.backing.load_constant(name, &mut self.arena) {
      self.constants.insert(name, id);
      return (Some(id), true);
    }
    if let Some(pairs) = self.enum_values.get(name) {
      return (Some(pairs[0].0), false);
    }
    let enums = self.backing.load_enums_by_value_name(name, &mut self.arena);
    for enum_id in enums {
      self.register_loaded_defined(enum_id);
    }
    // A load only counts once the value name is actually registered; a
    // backing enum shadowed by a local declaration of the same name merges
    // nothing, and must not extend the fixpoint.
    match self.enum_values.get(name) {
      Some(pairs) => (Some(pairs[0].0), true),
      None => (None, false),
    }
  }

  // Graph walks.

  fn roots(&self) -> Vec<SymbolId> {
    self
      .defined
      .iter()
      .chain(self.typedefs.iter())
      .chain(self.procedures.iter())
      .chain(self.constants.iter())
      .collect_vec()
  }

  pub fn find_all_relationships(&self) -> Vec<Relationship> {
    find_relationships(&self.arena, self.roots())
  }

  pub fn find_unresolved_relationships(&self) -> Vec<Relationship> {
    self
      .find_all_relationships()
      .into_iter()
      .filter(|rel| !self.arena.is_immediately_resolved(rel.symbol))
      .collect_vec()
  }

  fn find_unresolved_values(&self) -> Vec<SymbolId> {
    self
      .find_unresolved_relationships()
      .into_iter()
      .map(|rel| rel.symbol)
      .filter(|&id| self.arena.kind(id) == SymbolKind::Value)
      .collect()
  }

  // Resolution.

  /// Fills DLL names on procedures that lack one.
  pub fn resolve_dll_names(&mut self, resolver: &dyn DllResolver) {
    let procs: Vec<SymbolId> = self.procedures.iter().collect();
    for id in procs {
      let name = match self.arena.get(id) {
        Symbol::Procedure(d) if d.dll_name.is_none() => d.name.clone(),
        _ => continue,
      };
      if let Some(dll) = resolver.find_dll(&name) {
        if let Symbol::Procedure(d) = self.arena.get_mut(id) {
          d.dll_name = Some(dll);
        }
      }
    }
  }

  /// Runs symbol and value resolution to a fixpoint: rounds repeat only while
  /// a round pulled something new from the backing source, so termination is
  /// bounded by the backing store's contents. Returns whether the final round
  /// resolved everything it saw; problems are reported through `diag`.
  pub fn resolve(&mut self, resolver: &dyn DllResolver, diag: &mut Diagnostics) -> bool {
    self.resolve_dll_names(resolver);
    loop {
      let symbols = self.resolve_core_symbols(diag);
      let values = self.resolve_core_values(diag);
      if !(symbols.loaded || values.loaded) {
        return symbols.succeeded && values.succeeded;
      }
    }
  }

  fn resolve_core_symbols(&mut self, diag: &mut Diagnostics) -> PassResult {
    let mut succeeded = true;
    let mut loaded = false;
    for rel in self.find_unresolved_relationships() {
      match self.arena.kind(rel.symbol) {
        SymbolKind::NamedType => {
          let (qualification, type_name) = match self.arena.get(rel.symbol) {
            Symbol::NamedType(d) => (d.qualification.clone(), d.name.clone()),
            _ => continue,
          };
          let (found, l) = self.find_or_load_type(&qualification, &type_name);
          loaded |= l;
          if let Some(real) = found {
            self.arena.set_real_type(rel.symbol, real);
            continue;
          }
          // A qualified name that only ever appears behind a pointer can be
          // treated as a pointer to an opaque type.
          let behind_pointer = rel
            .parent
            .map(|p| self.arena.kind(p) == SymbolKind::Pointer)
            .unwrap_or(false);
          if behind_pointer && !qualification.is_empty() {
            let opaque = self.arena.new_opaque();
            diag.add_warning(format!(
              "treating '{}' as a pointer to an opaque type",
              self.arena.display_name(rel.symbol)
            ));
            self.arena.set_real_type(rel.symbol, opaque);
          } else {
            succeeded = false;
            diag.add_error(format!(
              "failed to resolve type '{}'",
              self.arena.display_name(rel.symbol)
            ));
          }
        }
        // Values resolve in their own pass.
        SymbolKind::Value | SymbolKind::ValueExpression => {}
        other => {
          succeeded = false;
          diag.add_error(format!(
            "failed to resolve {} '{}'",
            other,
            self.arena.display_name(rel.symbol)
          ));
        }
      }
    }
    PassResult { succeeded, loaded }
  }

  fn resolve_core_values(&mut self, diag: &mut Diagnostics) -> PassResult {
    let mut succeeded = true;
    let mut loaded = false;
    for value_id in self.find_unresolved_values() {
      let (name, wants_type) = match self.arena.get(value_id) {
        Symbol::Value(d) => (d.name.clone(), matches!(d.payload, ValuePayload::SymbolType(_))),
        _ => continue,
      };
      let (found, l) = if wants_type {
        self.find_or_load_type("", &name)
      } else {
        self.find_or_load_value(&name)
      };
      loaded |= l;
      match found {
        Some(target) => self.arena.set_value_symbol(value_id, target),
        None => {
          succeeded = false;
          diag.add_error(format!("failed to resolve value '{}'", name));
        }
      }
    }
    PassResult { succeeded, loaded }
  }

  // Resolution queries.

  /// Whether every node reachable from `id` is resolved. Cycles count as
  /// resolved unless a node on them is concretely missing something.
  pub fn is_fully_resolved(&self, id: SymbolId) -> bool {
    let mut memo = HashMap::new();
    self.is_fully_resolved_memo(id, &mut memo)
  }

  /// Memo states: absent = unknown, None = currently being visited (treated
  /// as resolved so cycles close optimistically), Some(b) = settled.
  fn is_fully_resolved_memo(
    &self,
    id: SymbolId,
    memo: &mut HashMap<SymbolId, Option<bool>>,
  ) -> bool {
    if let Some(state) = memo.get(&id) {
      return state.unwrap_or(true);
    }
    memo.insert(id, None);
    let mut ret = true;
    for child in self.arena.children(id) {
      if !self.arena.is_immediately_resolved(child) || !self.is_fully_resolved_memo(child, memo) {
        ret = false;
        break;
      }
    }
    memo.insert(id, Some(ret));
    ret
  }

  fn resolved_subset(&self, ids: impl Iterator<Item = SymbolId>) -> Vec<SymbolId> {
    let mut memo = HashMap::new();
    ids
      .filter(|&id| self.arena.is_immediately_resolved(id) && self.is_fully_resolved_memo(id, &mut memo))
      .collect()
  }

  pub fn find_resolved_defined_types(&self) -> Vec<SymbolId> {
    self.resolved_subset(self.defined.iter())
  }

  pub fn find_resolved_typedefs(&self) -> Vec<SymbolId> {
    self.resolved_subset(self.typedefs.iter())
  }

  pub fn find_resolved_procedures(&self) -> Vec<SymbolId> {
    self.resolved_subset(self.procedures.iter())
  }

  pub fn find_resolved_constants(&self) -> Vec<SymbolId> {
    self.resolved_subset(self.constants.iter())
  }

  /// Writes the fully resolved subset to `storage`, leaves first so readers
  /// never observe a dangling reference: constants, then defined types, then
  /// typedefs, then procedures.
  pub fn save_to_storage(&self, storage: &mut dyn SymbolStorage) -> Result<(), StoreError> {
    for id in self.find_resolved_constants() {
      storage.add_constant(&self.arena, id)?;
    }
    for id in self.find_resolved_defined_types() {
      storage.add_defined_type(&self.arena, id)?;
    }
    for id in self.find_resolved_typedefs() {
      storage.add_typedef(&self.arena, id)?;
    }
    for id in self.find_resolved_procedures() {
      storage.add_procedure(&self.arena, id)?;
    }
    Ok(())
  }
}

impl Default for SymbolBag {
  fn default() -> SymbolBag {
    SymbolBag::new()
  }
}
