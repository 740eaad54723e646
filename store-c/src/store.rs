use crate::rows::ArrayRow;
use crate::rows::ConstantRow;
use crate::rows::DefinedTypeRow;
use crate::rows::EnumValueRow;
use crate::rows::MemberRow;
use crate::rows::NamedTypeRow;
use crate::rows::ParameterRow;
use crate::rows::PointerRow;
use crate::rows::ProcedureRow;
use crate::rows::SalEntryRow;
use crate::rows::SignatureRow;
use crate::rows::SpecializedRow;
use crate::rows::TypeRef;
use crate::rows::TypedefRow;
use ahash::HashMap;
use ahash::HashMapExt;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use symbol_c::arena::SymbolArena;
use symbol_c::arena::SymbolId;
use symbol_c::kind::CallingConvention;
use symbol_c::kind::ConstantKind;
use symbol_c::kind::NameKind;
use symbol_c::kind::SymbolKind;
use symbol_c::lookup::StoreError;
use symbol_c::lookup::SymbolLookup;
use symbol_c::lookup::SymbolStorage;
use symbol_c::sym::FunctionPointerData;
use symbol_c::sym::ParameterData;
use symbol_c::sym::SignatureData;
use symbol_c::sym::Symbol;

#[derive(Debug)]
pub enum PersistError {
  Io(std::io::Error),
  Json(serde_json::Error),
}

impl Display for PersistError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      PersistError::Io(e) => write!(f, "store I/O failed: {}", e),
      PersistError::Json(e) => write!(f, "store (de)serialisation failed: {}", e),
    }
  }
}

impl Error for PersistError {}

impl From<std::io::Error> for PersistError {
  fn from(e: std::io::Error) -> PersistError {
    PersistError::Io(e)
  }
}

impl From<serde_json::Error> for PersistError {
  fn from(e: serde_json::Error) -> PersistError {
    PersistError::Json(e)
  }
}

/// Optional name-to-row-index maps for the hot lookup tables.
#[derive(Clone, Default, Debug)]
struct StoreCache {
  defined: HashMap<String, usize>,
  typedefs: HashMap<String, usize>,
  named: HashMap<(String, String, bool), usize>,
}

/// Durable, surrogate-keyed form of a declaration graph: one row list per
/// node shape, references flattened to [TypeRef]. Leaf types are interned so
/// repeated writes of equal graphs add no rows.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct GraphStore {
  defined_types: Vec<DefinedTypeRow>,
  members: Vec<MemberRow>,
  enum_values: Vec<EnumValueRow>,
  typedefs: Vec<TypedefRow>,
  named_types: Vec<NamedTypeRow>,
  pointers: Vec<PointerRow>,
  arrays: Vec<ArrayRow>,
  specialized: Vec<SpecializedRow>,
  constants: Vec<ConstantRow>,
  procedures: Vec<ProcedureRow>,
  signatures: Vec<SignatureRow>,
  parameters: Vec<ParameterRow>,
  sal_entries: Vec<SalEntryRow>,
  #[serde(skip)]
  cache: Option<StoreCache>,
}

fn row_idx(id: u32, len: usize, table: &str) -> Result<usize, StoreError> {
  if id >= 1 && (id as usize) <= len {
    Ok((id - 1) as usize)
  } else {
    Err(StoreError::MalformedRef(format!("{} row {}", table, id)))
  }
}

fn expr_text(arena: &SymbolArena, value_expr: SymbolId) -> String {
  match arena.get(value_expr) {
    Symbol::ValueExpression(d) => d.text.clone(),
    _ => String::new(),
  }
}

impl GraphStore {
  pub fn new() -> GraphStore {
    GraphStore::default()
  }

  // Row access, mainly for inspection and tests.

  pub fn defined_type_rows(&self) -> &[DefinedTypeRow] {
    &self.defined_types
  }

  pub fn member_rows(&self) -> &[MemberRow] {
    &self.members
  }

  pub fn enum_value_rows(&self) -> &[EnumValueRow] {
    &self.enum_values
  }

  pub fn typedef_rows(&self) -> &[TypedefRow] {
    &self.typedefs
  }

  pub fn named_type_rows(&self) -> &[NamedTypeRow] {
    &self.named_types
  }

  pub fn pointer_rows(&self) -> &[PointerRow] {
    &self.pointers
  }

  pub fn array_rows(&self) -> &[ArrayRow] {
    &self.arrays
  }

  pub fn specialized_rows(&self) -> &[SpecializedRow] {
    &self.specialized
  }

  pub fn constant_rows(&self) -> &[ConstantRow] {
    &self.constants
  }

  pub fn procedure_rows(&self) -> &[ProcedureRow] {
    &self.procedures
  }

  pub fn signature_rows(&self) -> &[SignatureRow] {
    &self.signatures
  }

  pub fn parameter_rows(&self) -> &[ParameterRow] {
    &self.parameters
  }

  pub fn sal_entry_rows(&self) -> &[SalEntryRow] {
    &self.sal_entries
  }

  /// Enables or drops the name lookup caches. Enabling rebuilds them from the
  /// current rows.
  pub fn set_cache_lookup(&mut self, enabled: bool) {
    if !enabled {
      self.cache = None;
      return;
    }
    if self.cache.is_some() {
      return;
    }
    let mut cache = StoreCache::default();
    for (i, r) in self.defined_types.iter().enumerate() {
      cache.defined.insert(r.name.clone(), i);
    }
    for (i, r) in self.typedefs.iter().enumerate() {
      cache.typedefs.insert(r.name.clone(), i);
    }
    for (i, r) in self.named_types.iter().enumerate() {
      cache
        .named
        .insert((r.qualification.clone(), r.name.clone(), r.is_const), i);
    }
    self.cache = Some(cache);
  }

  fn find_defined_idx(&self, name: &str) -> Option<usize> {
    match &self.cache {
      Some(cache) => cache.defined.get(name).copied(),
      None => self.defined_types.iter().position(|r| r.name == name),
    }
  }

  fn find_typedef_idx(&self, name: &str) -> Option<usize> {
    match &self.cache {
      Some(cache) => cache.typedefs.get(name).copied(),
      None => self.typedefs.iter().position(|r| r.name == name),
    }
  }

  fn find_named_idx(&self, key: &(String, String, bool)) -> Option<usize> {
    match &self.cache {
      Some(cache) => cache.named.get(key).copied(),
      None => self
        .named_types
        .iter()
        .position(|r| r.qualification == key.0 && r.name == key.1 && r.is_const == key.2),
    }
  }

  // Write path.

  /// Finds or inserts the header row for a defined type. A fresh header is
  /// partial: the body follows once the type itself is added.
  fn ensure_defined_header(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<u32, StoreError> {
    let (kind, name, conv) = match arena.get(id) {
      Symbol::Struct(d) => (SymbolKind::Struct, d.name.clone(), CallingConvention::WinApi),
      Symbol::Union(d) => (SymbolKind::Union, d.name.clone(), CallingConvention::WinApi),
      Symbol::Enum(d) => (SymbolKind::Enum, d.name.clone(), CallingConvention::WinApi),
      Symbol::FunctionPointer(d) => (SymbolKind::FunctionPointer, d.name.clone(), d.conv),
      other => return Err(StoreError::NotAType(other.kind())),
    };
    if name.is_empty() {
      return Err(StoreError::MissingName(kind));
    }
    if let Some(idx) = self.find_defined_idx(&name) {
      return Ok(self.defined_types[idx].id);
    }
    let row_id = (self.defined_types.len() + 1) as u32;
    if let Some(cache) = &mut self.cache {
      cache.defined.insert(name.clone(), self.defined_types.len());
    }
    self.defined_types.push(DefinedTypeRow {
      id: row_id,
      kind,
      name,
      conv,
      sig: None,
      partial: true,
    });
    Ok(row_id)
  }

  fn write_defined(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let row_id = self.ensure_defined_header(arena, id)?;
    let idx = (row_id - 1) as usize;
    if !self.defined_types[idx].partial {
      // Already written in full; writes are idempotent by name.
      return Ok(());
    }
    match arena.get(id) {
      Symbol::Struct(d) | Symbol::Union(d) => {
        for &m in &d.members {
          let (member_name, member_ty) = match arena.get(m) {
            Symbol::Member(md) => (md.name.clone(), md.ty),
            _ => continue,
          };
          let ty = member_ty.ok_or_else(|| StoreError::MissingRealType(member_name.clone()))?;
          let ty = self.type_ref(arena, ty)?;
          self.members.push(MemberRow {
            owner: row_id,
            name: member_name,
            ty,
          });
        }
      }
      Symbol::Enum(d) => {
        for &v in &d.values {
          let Symbol::EnumValue(vd) = arena.get(v) else {
            continue;
          };
          self.enum_values.push(EnumValueRow {
            owner: row_id,
            name: vd.name.clone(),
            expr: expr_text(arena, vd.value),
          });
        }
      }
      Symbol::FunctionPointer(d) => {
        let sig = self.write_signature(arena, d.sig)?;
        self.defined_types[idx].sig = Some(sig);
      }
      _ => {}
    }
    self.defined_types[idx].partial = false;
    Ok(())
  }

  /// Flattens a type node to a row reference, interning or deduplicating
  /// where the row shape allows it.
  fn type_ref(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<TypeRef, StoreError> {
    match arena.get(id) {
      Symbol::Struct(_) | Symbol::Union(_) | Symbol::Enum(_) | Symbol::FunctionPointer(_) => {
        let row_id = self.ensure_defined_header(arena, id)?;
        Ok(TypeRef {
          id: row_id,
          kind: arena.kind(id),
        })
      }
      Symbol::NamedType(d) => {
        let key = (d.qualification.clone(), d.name.clone(), d.is_const);
        if let Some(idx) = self.find_named_idx(&key) {
          return Ok(TypeRef {
            id: self.named_types[idx].id,
            kind: SymbolKind::NamedType,
          });
        }
        let row_id = (self.named_types.len() + 1) as u32;
        if let Some(cache) = &mut self.cache {
          cache.named.insert(key.clone(), self.named_types.len());
        }
        self.named_types.push(NamedTypeRow {
          id: row_id,
          qualification: key.0,
          name: key.1,
          is_const: key.2,
        });
        Ok(TypeRef {
          id: row_id,
          kind: SymbolKind::NamedType,
        })
      }
      Symbol::TypeDef(_) => {
        let row_id = self.ensure_typedef(arena, id)?;
        Ok(TypeRef {
          id: row_id,
          kind: SymbolKind::TypeDef,
        })
      }
      Symbol::Pointer(d) => {
        let real = d
          .real
          .ok_or_else(|| StoreError::MissingRealType(arena.display_name(id)))?;
        let target = self.type_ref(arena, real)?;
        if let Some(row) = self.pointers.iter().find(|r| r.real == target) {
          return Ok(TypeRef {
            id: row.id,
            kind: SymbolKind::Pointer,
          });
        }
        let row_id = (self.pointers.len() + 1) as u32;
        self.pointers.push(PointerRow {
          id: row_id,
          real: target,
        });
        Ok(TypeRef {
          id: row_id,
          kind: SymbolKind::Pointer,
        })
      }
      Symbol::Array(d) => {
        let real = d
          .real
          .ok_or_else(|| StoreError::MissingRealType(arena.display_name(id)))?;
        let target = self.type_ref(arena, real)?;
        let row_id = (self.arrays.len() + 1) as u32;
        self.arrays.push(ArrayRow {
          id: row_id,
          element_count: d.element_count,
          real: target,
        });
        Ok(TypeRef {
          id: row_id,
          kind: SymbolKind::Array,
        })
      }
      Symbol::Builtin(d) => {
        if let Some(row) = self
          .specialized
          .iter()
          .find(|r| r.kind == SymbolKind::Builtin && r.builtin == d.kind && r.unsigned == d.unsigned)
        {
          return Ok(TypeRef {
            id: row.id,
            kind: SymbolKind::Builtin,
          });
        }
        let row_id = (self.specialized.len() + 1) as u32;
        self.specialized.push(SpecializedRow {
          id: row_id,
          kind: SymbolKind::Builtin,
          builtin: d.kind,
          unsigned: d.unsigned,
          bits: 0,
        });
        Ok(TypeRef {
          id: row_id,
          kind: SymbolKind::Builtin,
        })
      }
      Symbol::BitVector(d) => {
        if let Some(row) = self
          .specialized
          .iter()
          .find(|r| r.kind == SymbolKind::BitVector && r.bits == d.bits)
        {
          return Ok(TypeRef {
            id: row.id,
            kind: SymbolKind::BitVector,
          });
        }
        let row_id = (self.specialized.len() + 1) as u32;
        self.specialized.push(SpecializedRow {
          id: row_id,
          kind: SymbolKind::BitVector,
          builtin: symbol_c::kind::BuiltinKind::Unknown,
          unsigned: false,
          bits: d.bits,
        });
        Ok(TypeRef {
          id: row_id,
          kind: SymbolKind::BitVector,
        })
      }
      Symbol::Opaque => Ok(TypeRef::OPAQUE),
      other => Err(StoreError::NotAType(other.kind())),
    }
  }

  fn ensure_typedef(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<u32, StoreError> {
    let d = match arena.get(id) {
      Symbol::TypeDef(d) => d,
      other => return Err(StoreError::NotAType(other.kind())),
    };
    let name = d.name.clone();
    if name.is_empty() {
      return Err(StoreError::MissingName(SymbolKind::TypeDef));
    }
    if let Some(idx) = self.find_typedef_idx(&name) {
      return Ok(self.typedefs[idx].id);
    }
    let real = d.real.ok_or_else(|| StoreError::MissingRealType(name.clone()))?;
    let target = self.type_ref(arena, real)?;
    let row_id = (self.typedefs.len() + 1) as u32;
    if let Some(cache) = &mut self.cache {
      cache.typedefs.insert(name.clone(), self.typedefs.len());
    }
    self.typedefs.push(TypedefRow {
      id: row_id,
      name,
      real: target,
    });
    Ok(row_id)
  }

  fn write_signature(&mut self, arena: &SymbolArena, sig: SymbolId) -> Result<u32, StoreError> {
    let d = match arena.get(sig) {
      Symbol::Signature(d) => d,
      other => return Err(StoreError::NotAType(other.kind())),
    };
    let ret = match d.ret {
      Some(r) => Some(self.type_ref(arena, r)?),
      None => None,
    };
    let ret_sal = self.sal_ids(arena, d.ret_sal)?;
    let row_id = (self.signatures.len() + 1) as u32;
    self.signatures.push(SignatureRow {
      id: row_id,
      ret,
      ret_sal,
    });
    for &p in &d.params {
      let Symbol::Parameter(pd) = arena.get(p) else {
        continue;
      };
      let ty = pd.ty.ok_or_else(|| StoreError::MissingRealType(pd.name.clone()))?;
      let ty = self.type_ref(arena, ty)?;
      let sal = self.sal_ids(arena, pd.sal)?;
      self.parameters.push(ParameterRow {
        sig: row_id,
        name: pd.name.clone(),
        ty,
        sal,
      });
    }
    Ok(row_id)
  }

  /// Interns the entries of a sal attribute and returns their ids joined with
  /// commas. Entries without text deduplicate by kind, entries with text by
  /// (kind, text).
  fn sal_ids(&mut self, arena: &SymbolArena, attr: SymbolId) -> Result<String, StoreError> {
    let entries = match arena.get(attr) {
      Symbol::SalAttribute(d) => &d.entries,
      other => return Err(StoreError::NotAType(other.kind())),
    };
    let mut ids = Vec::with_capacity(entries.len());
    for &e in entries {
      let Symbol::SalEntry(ed) = arena.get(e) else {
        continue;
      };
      let existing = self
        .sal_entries
        .iter()
        .find(|r| r.kind == ed.kind && r.text == ed.text);
      let row_id = match existing {
        Some(row) => row.id,
        None => {
          let row_id = (self.sal_entries.len() + 1) as u32;
          self.sal_entries.push(SalEntryRow {
            id: row_id,
            kind: ed.kind,
            text: ed.text.clone(),
          });
          row_id
        }
      };
      ids.push(row_id);
    }
    Ok(ids.iter().map(u32::to_string).join(","))
  }

  // Read path. Loaded graphs are freshly built in the caller's arena; defined
  // types are memoised per load so self-references terminate.

  pub fn try_load_defined(
    &self,
    name: &str,
    arena: &mut SymbolArena,
  ) -> Result<Option<SymbolId>, StoreError> {
    let Some(idx) = self.find_defined_idx(name) else {
      return Ok(None);
    };
    let mut ctx = HashMap::new();
    Ok(Some(self.load_defined_row(idx, arena, &mut ctx)?))
  }

  fn load_defined_row(
    &self,
    idx: usize,
    arena: &mut SymbolArena,
    ctx: &mut HashMap<u32, SymbolId>,
  ) -> Result<SymbolId, StoreError> {
    let row = &self.defined_types[idx];
    if let Some(&done) = ctx.get(&row.id) {
      return Ok(done);
    }
    match row.kind {
      SymbolKind::Struct | SymbolKind::Union => {
        let node = if row.kind == SymbolKind::Struct {
          arena.new_struct(&row.name)
        } else {
          arena.new_union(&row.name)
        };
        ctx.insert(row.id, node);
        for m in self.members.iter().filter(|m| m.owner == row.id) {
          let ty = self.load_type(m.ty, arena, ctx)?;
          arena.add_member(node, &m.name, ty);
        }
        Ok(node)
      }
      SymbolKind::Enum => {
        let node = arena.new_enum(&row.name);
        ctx.insert(row.id, node);
        for v in self.enum_values.iter().filter(|v| v.owner == row.id) {
          arena.add_enum_value(node, &v.name, &v.expr);
        }
        Ok(node)
      }
      SymbolKind::FunctionPointer => {
        // Memoise before loading the signature; a signature may point back at
        // this very row. A header written ahead of its body keeps the empty
        // signature.
        let placeholder = arena.new_signature();
        let node = arena.alloc(Symbol::FunctionPointer(FunctionPointerData {
          name: row.name.clone(),
          conv: row.conv,
          sig: placeholder,
        }));
        ctx.insert(row.id, node);
        if let Some(sig) = row.sig {
          let sig = self.load_signature(sig, arena, ctx)?;
          match arena.get_mut(node) {
            Symbol::FunctionPointer(d) => d.sig = sig,
            _ => unreachable!(),
          }
        }
        Ok(node)
      }
      other => Err(StoreError::MalformedRef(format!(
        "defined row {} has kind {}",
        row.id, other
      ))),
    }
  }

  fn load_type(
    &self,
    tref: TypeRef,
    arena: &mut SymbolArena,
    ctx: &mut HashMap<u32, SymbolId>,
  ) -> Result<SymbolId, StoreError> {
    match tref.kind {
      SymbolKind::Struct | SymbolKind::Union | SymbolKind::Enum | SymbolKind::FunctionPointer => {
        let idx = row_idx(tref.id, self.defined_types.len(), "defined type")?;
        self.load_defined_row(idx, arena, ctx)
      }
      SymbolKind::NamedType => {
        let idx = row_idx(tref.id, self.named_types.len(), "named type")?;
        let row = &self.named_types[idx];
        Ok(arena.new_named_type(&row.qualification, &row.name, row.is_const))
      }
      SymbolKind::TypeDef => {
        let idx = row_idx(tref.id, self.typedefs.len(), "typedef")?;
        let row = &self.typedefs[idx];
        let real = self.load_type(row.real, arena, ctx)?;
        Ok(arena.new_typedef(&row.name, Some(real)))
      }
      SymbolKind::Pointer => {
        let idx = row_idx(tref.id, self.pointers.len(), "pointer")?;
        let real = self.load_type(self.pointers[idx].real, arena, ctx)?;
        Ok(arena.new_pointer(real))
      }
      SymbolKind::Array => {
        let idx = row_idx(tref.id, self.arrays.len(), "array")?;
        let row = &self.arrays[idx];
        let count = row.element_count;
        let real = self.load_type(row.real, arena, ctx)?;
        Ok(arena.new_array(count, real))
      }
      SymbolKind::Builtin | SymbolKind::BitVector => {
        let idx = row_idx(tref.id, self.specialized.len(), "specialized type")?;
        let row = &self.specialized[idx];
        match row.kind {
          SymbolKind::Builtin => Ok(arena.new_builtin(row.builtin, row.unsigned)),
          SymbolKind::BitVector => Ok(arena.new_bit_vector(row.bits)),
          other => Err(StoreError::MalformedRef(format!(
            "specialized row {} has kind {}",
            row.id, other
          ))),
        }
      }
      SymbolKind::Opaque => Ok(arena.new_opaque()),
      other => Err(StoreError::MalformedRef(format!(
        "reference to non-type kind {}",
        other
      ))),
    }
  }

  fn load_signature(
    &self,
    sig: u32,
    arena: &mut SymbolArena,
    ctx: &mut HashMap<u32, SymbolId>,
  ) -> Result<SymbolId, StoreError> {
    let idx = row_idx(sig, self.signatures.len(), "signature")?;
    let row = &self.signatures[idx];
    let ret = match row.ret {
      Some(r) => Some(self.load_type(r, arena, ctx)?),
      None => None,
    };
    let ret_sal = self.load_sal(&row.ret_sal, arena)?;
    let node = arena.alloc(Symbol::Signature(SignatureData {
      ret,
      ret_sal,
      params: Vec::new(),
    }));
    for p in self.parameters.iter().filter(|p| p.sig == sig) {
      let ty = self.load_type(p.ty, arena, ctx)?;
      let sal = self.load_sal(&p.sal, arena)?;
      let param = arena.alloc(Symbol::Parameter(ParameterData {
        name: p.name.clone(),
        ty: Some(ty),
        sal,
      }));
      match arena.get_mut(node) {
        Symbol::Signature(d) => d.params.push(param),
        _ => unreachable!(),
      }
    }
    Ok(node)
  }

  fn load_sal(&self, ids: &str, arena: &mut SymbolArena) -> Result<SymbolId, StoreError> {
    let attr = arena.new_sal_attribute();
    if ids.is_empty() {
      return Ok(attr);
    }
    for part in ids.split(',') {
      let id: u32 = part
        .parse()
        .map_err(|_| StoreError::MalformedRef(format!("sal entry id '{}'", part)))?;
      let idx = row_idx(id, self.sal_entries.len(), "sal entry")?;
      let row = &self.sal_entries[idx];
      let entry = arena.new_sal_entry(row.kind, row.text.clone());
      match arena.get_mut(attr) {
        Symbol::SalAttribute(d) => d.entries.push(entry),
        _ => unreachable!(),
      }
    }
    Ok(attr)
  }

  pub fn try_load_typedef(
    &self,
    name: &str,
    arena: &mut SymbolArena,
  ) -> Result<Option<SymbolId>, StoreError> {
    let Some(idx) = self.find_typedef_idx(name) else {
      return Ok(None);
    };
    let row = &self.typedefs[idx];
    let mut ctx = HashMap::new();
    let real = self.load_type(row.real, arena, &mut ctx)?;
    Ok(Some(arena.new_typedef(&row.name, Some(real))))
  }

  pub fn try_load_procedure(
    &self,
    name: &str,
    arena: &mut SymbolArena,
  ) -> Result<Option<SymbolId>, StoreError> {
    let Some(row) = self.procedures.iter().find(|r| r.name == name) else {
      return Ok(None);
    };
    let mut ctx = HashMap::new();
    let sig = self.load_signature(row.sig, arena, &mut ctx)?;
    Ok(Some(arena.alloc(Symbol::Procedure(
      symbol_c::sym::ProcedureData {
        name: row.name.clone(),
        dll_name: row.dll_name.clone(),
        conv: row.conv,
        sig,
      },
    ))))
  }

  pub fn try_load_constant(
    &self,
    name: &str,
    arena: &mut SymbolArena,
  ) -> Result<Option<SymbolId>, StoreError> {
    let Some(row) = self.constants.iter().find(|r| r.name == name) else {
      return Ok(None);
    };
    Ok(Some(arena.new_constant(&row.name, &row.expr, row.kind)))
  }

  /// Every enum declaring a value with this name, in row order.
  pub fn try_load_enums_by_value_name(
    &self,
    value_name: &str,
    arena: &mut SymbolArena,
  ) -> Result<Vec<SymbolId>, StoreError> {
    let mut owners = Vec::new();
    for row in self.enum_values.iter().filter(|v| v.name == value_name) {
      if !owners.contains(&row.owner) {
        owners.push(row.owner);
      }
    }
    let mut out = Vec::with_capacity(owners.len());
    for owner in owners {
      let idx = row_idx(owner, self.defined_types.len(), "defined type")?;
      let mut ctx = HashMap::new();
      out.push(self.load_defined_row(idx, arena, &mut ctx)?);
    }
    Ok(out)
  }

  // Wildcard search over the name-bearing tables.

  pub fn search_defined_types(
    &self,
    pattern: &str,
    arena: &mut SymbolArena,
  ) -> Result<Vec<SymbolId>, StoreError> {
    let mut out = Vec::new();
    for idx in 0..self.defined_types.len() {
      if wildcard_match(pattern, &self.defined_types[idx].name) {
        let mut ctx = HashMap::new();
        out.push(self.load_defined_row(idx, arena, &mut ctx)?);
      }
    }
    Ok(out)
  }

  pub fn search_typedefs(
    &self,
    pattern: &str,
    arena: &mut SymbolArena,
  ) -> Result<Vec<SymbolId>, StoreError> {
    let names = self
      .typedefs
      .iter()
      .filter(|r| wildcard_match(pattern, &r.name))
      .map(|r| r.name.clone())
      .collect_vec();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
      if let Some(id) = self.try_load_typedef(&name, arena)? {
        out.push(id);
      }
    }
    Ok(out)
  }

  pub fn search_procedures(
    &self,
    pattern: &str,
    arena: &mut SymbolArena,
  ) -> Result<Vec<SymbolId>, StoreError> {
    let names = self
      .procedures
      .iter()
      .filter(|r| wildcard_match(pattern, &r.name))
      .map(|r| r.name.clone())
      .collect_vec();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
      if let Some(id) = self.try_load_procedure(&name, arena)? {
        out.push(id);
      }
    }
    Ok(out)
  }

  pub fn search_constants(
    &self,
    pattern: &str,
    arena: &mut SymbolArena,
  ) -> Result<Vec<SymbolId>, StoreError> {
    let names = self
      .constants
      .iter()
      .filter(|r| wildcard_match(pattern, &r.name))
      .map(|r| r.name.clone())
      .collect_vec();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
      if let Some(id) = self.try_load_constant(&name, arena)? {
        out.push(id);
      }
    }
    Ok(out)
  }

  // Persistence.

  pub fn save_to_writer<W: Write>(&self, writer: W) -> Result<(), PersistError> {
    serde_json::to_writer(writer, self)?;
    Ok(())
  }

  pub fn load_from_reader<R: Read>(reader: R) -> Result<GraphStore, PersistError> {
    Ok(serde_json::from_reader(reader)?)
  }

  pub fn save_to_path(&self, path: &Path) -> Result<(), PersistError> {
    let file = File::create(path)?;
    self.save_to_writer(BufWriter::new(file))
  }

  /// A missing or corrupt file is an error; callers decide whether to start
  /// over with an empty store.
  pub fn load_from_path(path: &Path) -> Result<GraphStore, PersistError> {
    let file = File::open(path)?;
    GraphStore::load_from_reader(BufReader::new(file))
  }

  /// Lossy tab-separated dump of the name-bearing tables, for eyeballing and
  /// diffing.
  pub fn export_tsv(&self) -> String {
    let mut out = String::new();
    out.push_str("[defined_types]\n");
    for r in &self.defined_types {
      out.push_str(&format!("{}\t{}\n", r.name, r.kind));
    }
    out.push_str("[typedefs]\n");
    for r in &self.typedefs {
      out.push_str(&format!("{}\n", r.name));
    }
    out.push_str("[procedures]\n");
    for r in &self.procedures {
      out.push_str(&format!("{}\t{}\n", r.name, r.dll_name.as_deref().unwrap_or("")));
    }
    out.push_str("[constants]\n");
    for r in &self.constants {
      out.push_str(&format!("{}\t{}\n", r.name, r.expr));
    }
    out
  }
}

impl SymbolStorage for GraphStore {
  fn add_defined_type(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    self.write_defined(arena, id)
  }

  fn add_typedef(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    self.ensure_typedef(arena, id).map(|_| ())
  }

  fn add_procedure(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let d = match arena.get(id) {
      Symbol::Procedure(d) => d,
      other => {
        return Err(StoreError::WrongKind {
          expected: NameKind::Procedure,
          found: other.kind(),
        })
      }
    };
    if d.name.is_empty() {
      return Err(StoreError::MissingName(SymbolKind::Procedure));
    }
    if self.procedures.iter().any(|r| r.name == d.name) {
      return Ok(());
    }
    let sig = self.write_signature(arena, d.sig)?;
    self.procedures.push(ProcedureRow {
      name: d.name.clone(),
      dll_name: d.dll_name.clone(),
      conv: d.conv,
      sig,
    });
    Ok(())
  }

  fn add_constant(&mut self, arena: &SymbolArena, id: SymbolId) -> Result<(), StoreError> {
    let d = match arena.get(id) {
      Symbol::Constant(d) => d,
      other => {
        return Err(StoreError::WrongKind {
          expected: NameKind::Constant,
          found: other.kind(),
        })
      }
    };
    if d.name.is_empty() {
      return Err(StoreError::MissingName(SymbolKind::Constant));
    }
    if self.constants.iter().any(|r| r.name == d.name) {
      return Ok(());
    }
    let text = expr_text(arena, d.value);
    // Method macros are kept quoted in the model; store the bare text.
    let expr = match d.kind {
      ConstantKind::Macro => text,
      ConstantKind::MacroMethod => text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .map(str::to_string)
        .unwrap_or(text),
    };
    self.constants.push(ConstantRow {
      name: d.name.clone(),
      kind: d.kind,
      expr,
    });
    Ok(())
  }
}

impl SymbolLookup for GraphStore {
  fn load_defined(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    self.try_load_defined(name, arena).ok().flatten()
  }

  fn load_typedef(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    self.try_load_typedef(name, arena).ok().flatten()
  }

  fn load_procedure(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    self.try_load_procedure(name, arena).ok().flatten()
  }

  fn load_constant(&self, name: &str, arena: &mut SymbolArena) -> Option<SymbolId> {
    self.try_load_constant(name, arena).ok().flatten()
  }

  fn load_enums_by_value_name(&self, value_name: &str, arena: &mut SymbolArena) -> Vec<SymbolId> {
    self
      .try_load_enums_by_value_name(value_name, arena)
      .unwrap_or_default()
  }
}

/// `*` matches any run of characters; everything else matches itself,
/// ignoring ASCII case.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
  let p = pattern.to_ascii_lowercase().chars().collect_vec();
  let t = text.to_ascii_lowercase().chars().collect_vec();
  let mut pi = 0;
  let mut ti = 0;
  let mut star: Option<usize> = None;
  let mut mark = 0;
  while ti < t.len() {
    if pi < p.len() && p[pi] == '*' {
      star = Some(pi);
      mark = ti;
      pi += 1;
    } else if pi < p.len() && p[pi] == t[ti] {
      pi += 1;
      ti += 1;
    } else if let Some(s) = star {
      pi = s + 1;
      mark += 1;
      ti = mark;
    } else {
      return false;
    }
  }
  while pi < p.len() && p[pi] == '*' {
    pi += 1;
  }
  pi == p.len()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wildcard_matching() {
    assert!(wildcard_match("*", "anything"));
    assert!(wildcard_match("Create*", "CreateFileW"));
    assert!(wildcard_match("*File*", "CreateFileW"));
    assert!(wildcard_match("createfilew", "CreateFileW"));
    assert!(!wildcard_match("Create", "CreateFileW"));
    assert!(!wildcard_match("*Close*", "CreateFileW"));
    assert!(wildcard_match("", ""));
    assert!(!wildcard_match("", "x"));
  }
}
