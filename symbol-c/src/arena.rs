use crate::expr;
use crate::expr::Leaf;
use crate::expr::LeafValue;
use crate::kind::BuiltinKind;
use crate::kind::CallingConvention;
use crate::kind::ConstantKind;
use crate::kind::SalEntryKind;
use crate::kind::SymbolCategory;
use crate::kind::SymbolKind;
use crate::name::Name;
use crate::sym::ArrayData;
use crate::sym::BitVectorData;
use crate::sym::BuiltinData;
use crate::sym::ConstantData;
use crate::sym::DefinedData;
use crate::sym::EnumData;
use crate::sym::EnumValueData;
use crate::sym::FunctionPointerData;
use crate::sym::MemberData;
use crate::sym::NamedTypeData;
use crate::sym::ParameterData;
use crate::sym::PointerData;
use crate::sym::ProcedureData;
use crate::sym::SalAttributeData;
use crate::sym::SalEntryData;
use crate::sym::SignatureData;
use crate::sym::Symbol;
use crate::sym::TypeDefData;
use crate::sym::ValueData;
use crate::sym::ValueExpressionData;
use crate::sym::ValuePayload;
use ahash::HashMap;
use ahash::HashMapExt;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;

/// Handle to a node in a [SymbolArena]. Only meaningful together with the
/// arena that allocated it; identity comparisons are id comparisons.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct SymbolId(u32);

impl SymbolId {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Owns every node of a declaration graph. Edges are [SymbolId] values, so
/// cycles (self-referential structs, mutually recursive typedefs) need no
/// special representation.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct SymbolArena {
  nodes: Vec<Symbol>,
}

impl SymbolArena {
  pub fn new() -> SymbolArena {
    SymbolArena { nodes: Vec::new() }
  }

  pub fn alloc(&mut self, sym: Symbol) -> SymbolId {
    let id = SymbolId(self.nodes.len() as u32);
    self.nodes.push(sym);
    id
  }

  pub fn get(&self, id: SymbolId) -> &Symbol {
    &self.nodes[id.index()]
  }

  pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
    &mut self.nodes[id.index()]
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn ids(&self) -> impl Iterator<Item = SymbolId> {
    (0..self.nodes.len() as u32).map(SymbolId)
  }

  pub fn kind(&self, id: SymbolId) -> SymbolKind {
    self.get(id).kind()
  }

  pub fn category(&self, id: SymbolId) -> SymbolCategory {
    self.get(id).category()
  }

  pub fn name(&self, id: SymbolId) -> Option<&str> {
    self.get(id).name()
  }

  pub fn global_name(&self, id: SymbolId) -> Option<Name> {
    self.get(id).global_name()
  }

  // Node constructors.

  pub fn new_struct(&mut self, name: impl Into<String>) -> SymbolId {
    self.alloc(Symbol::Struct(DefinedData {
      name: name.into(),
      members: Vec::new(),
    }))
  }

  pub fn new_union(&mut self, name: impl Into<String>) -> SymbolId {
    self.alloc(Symbol::Union(DefinedData {
      name: name.into(),
      members: Vec::new(),
    }))
  }

  pub fn new_enum(&mut self, name: impl Into<String>) -> SymbolId {
    self.alloc(Symbol::Enum(EnumData {
      name: name.into(),
      values: Vec::new(),
    }))
  }

  pub fn new_function_pointer(
    &mut self,
    name: impl Into<String>,
    conv: CallingConvention,
  ) -> SymbolId {
    let sig = self.new_signature();
    self.alloc(Symbol::FunctionPointer(FunctionPointerData {
      name: name.into(),
      conv,
      sig,
    }))
  }

  pub fn new_named_type(
    &mut self,
    qualification: impl Into<String>,
    name: impl Into<String>,
    is_const: bool,
  ) -> SymbolId {
    self.alloc(Symbol::NamedType(NamedTypeData {
      qualification: qualification.into(),
      name: name.into(),
      is_const,
      real: None,
    }))
  }

  pub fn new_named(&mut self, name: impl Into<String>) -> SymbolId {
    self.new_named_type("", name, false)
  }

  pub fn new_typedef(&mut self, name: impl Into<String>, real: Option<SymbolId>) -> SymbolId {
    self.alloc(Symbol::TypeDef(TypeDefData {
      name: name.into(),
      real,
    }))
  }

  pub fn new_pointer(&mut self, real: SymbolId) -> SymbolId {
    self.alloc(Symbol::Pointer(PointerData { real: Some(real) }))
  }

  pub fn new_array(&mut self, element_count: i32, real: SymbolId) -> SymbolId {
    self.alloc(Symbol::Array(ArrayData {
      element_count,
      real: Some(real),
    }))
  }

  pub fn new_builtin(&mut self, kind: BuiltinKind, unsigned: bool) -> SymbolId {
    self.alloc(Symbol::Builtin(BuiltinData { kind, unsigned }))
  }

  pub fn new_bit_vector(&mut self, bits: i32) -> SymbolId {
    self.alloc(Symbol::BitVector(BitVectorData { bits }))
  }

  pub fn new_opaque(&mut self) -> SymbolId {
    self.alloc(Symbol::Opaque)
  }

  pub fn new_signature(&mut self) -> SymbolId {
    let ret_sal = self.new_sal_attribute();
    self.alloc(Symbol::Signature(SignatureData {
      ret: None,
      ret_sal,
      params: Vec::new(),
    }))
  }

  pub fn new_procedure(&mut self, name: impl Into<String>) -> SymbolId {
    let sig = self.new_signature();
    self.alloc(Symbol::Procedure(ProcedureData {
      name: name.into(),
      dll_name: None,
      conv: CallingConvention::WinApi,
      sig,
    }))
  }

  pub fn new_sal_attribute(&mut self) -> SymbolId {
    self.alloc(Symbol::SalAttribute(SalAttributeData {
      entries: Vec::new(),
    }))
  }

  pub fn new_sal_entry(&mut self, kind: SalEntryKind, text: Option<String>) -> SymbolId {
    self.alloc(Symbol::SalEntry(SalEntryData { kind, text }))
  }

  /// Parses `text` eagerly so the extracted leaf values exist as child nodes;
  /// on parse failure the node carries the raw text and no values.
  pub fn new_value_expression(&mut self, text: impl Into<String>) -> SymbolId {
    let text = text.into();
    let (values, parse_failed) = match expr::parse(&text) {
      Ok(tree) => {
        let mut leaves = Vec::new();
        expr::collect_leaves(&tree, &mut leaves);
        let values = leaves.into_iter().map(|leaf| self.value_from_leaf(leaf)).collect();
        (values, false)
      }
      Err(_) => (Vec::new(), true),
    };
    self.alloc(Symbol::ValueExpression(ValueExpressionData {
      text,
      values,
      parse_failed,
    }))
  }

  fn value_from_leaf(&mut self, leaf: LeafValue<'_>) -> SymbolId {
    let data = match leaf {
      LeafValue::Leaf(Leaf::Number(n)) => ValueData {
        name: n.to_string(),
        payload: ValuePayload::Number(*n),
      },
      LeafValue::Leaf(Leaf::Text(s)) => ValueData {
        name: s.clone(),
        payload: ValuePayload::String(s.clone()),
      },
      LeafValue::Leaf(Leaf::Character(c)) => ValueData {
        name: c.to_string(),
        payload: ValuePayload::Character(*c),
      },
      LeafValue::Leaf(Leaf::Boolean(b)) => ValueData {
        name: b.to_string(),
        payload: ValuePayload::Boolean(*b),
      },
      LeafValue::Leaf(Leaf::Symbol(s)) => ValueData {
        name: s.clone(),
        payload: ValuePayload::SymbolValue(None),
      },
      LeafValue::CastTarget(t) => ValueData {
        name: t.to_string(),
        payload: ValuePayload::SymbolType(None),
      },
    };
    self.alloc(Symbol::Value(data))
  }

  /// Method-style macro bodies are stored quoted so they survive as opaque
  /// text rather than parsing as an expression.
  pub fn new_constant(
    &mut self,
    name: impl Into<String>,
    expr_text: &str,
    kind: ConstantKind,
  ) -> SymbolId {
    let text = match kind {
      ConstantKind::Macro => expr_text.to_string(),
      ConstantKind::MacroMethod => format!("\"{}\"", expr_text),
    };
    let value = self.new_value_expression(text);
    self.alloc(Symbol::Constant(ConstantData {
      name: name.into(),
      kind,
      value,
    }))
  }

  pub fn new_enum_value(
    &mut self,
    enum_name: impl Into<String>,
    name: impl Into<String>,
    expr_text: &str,
  ) -> SymbolId {
    let value = self.new_value_expression(expr_text);
    self.alloc(Symbol::EnumValue(EnumValueData {
      enum_name: enum_name.into(),
      name: name.into(),
      value,
    }))
  }

  // Structured mutation helpers.

  /// Appends a member to a struct or union and returns the member node.
  pub fn add_member(&mut self, defined: SymbolId, name: impl Into<String>, ty: SymbolId) -> SymbolId {
    let member = self.alloc(Symbol::Member(MemberData {
      name: name.into(),
      ty: Some(ty),
    }));
    match self.get_mut(defined) {
      Symbol::Struct(d) | Symbol::Union(d) => d.members.push(member),
      other => panic!("cannot add member to {}", other.kind()),
    };
    member
  }

  /// Appends a value to an enum, registering it under the enum's name, and
  /// returns the value node.
  pub fn add_enum_value(
    &mut self,
    enum_id: SymbolId,
    name: impl Into<String>,
    expr_text: &str,
  ) -> SymbolId {
    let enum_name = match self.get(enum_id) {
      Symbol::Enum(d) => d.name.clone(),
      other => panic!("cannot add enum value to {}", other.kind()),
    };
    let value = self.new_enum_value(enum_name, name, expr_text);
    match self.get_mut(enum_id) {
      Symbol::Enum(d) => d.values.push(value),
      _ => unreachable!(),
    };
    value
  }

  /// Appends a parameter with an empty annotation set to a signature and
  /// returns the parameter node.
  pub fn add_parameter(
    &mut self,
    sig: SymbolId,
    name: impl Into<String>,
    ty: SymbolId,
  ) -> SymbolId {
    let sal = self.new_sal_attribute();
    let param = self.alloc(Symbol::Parameter(ParameterData {
      name: name.into(),
      ty: Some(ty),
      sal,
    }));
    match self.get_mut(sig) {
      Symbol::Signature(d) => d.params.push(param),
      other => panic!("cannot add parameter to {}", other.kind()),
    };
    param
  }

  pub fn set_return_type(&mut self, sig: SymbolId, ret: SymbolId) {
    match self.get_mut(sig) {
      Symbol::Signature(d) => d.ret = Some(ret),
      other => panic!("cannot set return type on {}", other.kind()),
    }
  }

  /// Fills the resolved-type slot of a proxy node.
  pub fn set_real_type(&mut self, proxy: SymbolId, real: SymbolId) {
    match self.get_mut(proxy) {
      Symbol::NamedType(d) => d.real = Some(real),
      Symbol::TypeDef(d) => d.real = Some(real),
      Symbol::Pointer(d) => d.real = Some(real),
      Symbol::Array(d) => d.real = Some(real),
      other => panic!("cannot set real type on {}", other.kind()),
    }
  }

  /// Fills the resolved-symbol slot of a symbol-reference value node.
  pub fn set_value_symbol(&mut self, value: SymbolId, target: SymbolId) {
    match self.get_mut(value) {
      Symbol::Value(d) => match &mut d.payload {
        ValuePayload::SymbolValue(slot) | ValuePayload::SymbolType(slot) => *slot = Some(target),
        other => panic!("value node carries a literal, not a symbol reference: {:?}", other.kind()),
      },
      other => panic!("cannot set value symbol on {}", other.kind()),
    }
  }

  /// Child edges of a node, in a stable order.
  pub fn children(&self, id: SymbolId) -> Vec<SymbolId> {
    match self.get(id) {
      Symbol::Struct(d) | Symbol::Union(d) => d.members.clone(),
      Symbol::Enum(d) => d.values.clone(),
      Symbol::FunctionPointer(d) => vec![d.sig],
      Symbol::NamedType(d) => d.real.into_iter().collect(),
      Symbol::TypeDef(d) => d.real.into_iter().collect(),
      Symbol::Pointer(d) => d.real.into_iter().collect(),
      Symbol::Array(d) => d.real.into_iter().collect(),
      Symbol::Builtin(_) | Symbol::BitVector(_) | Symbol::Opaque | Symbol::SalEntry(_) => {
        Vec::new()
      }
      Symbol::Procedure(d) => vec![d.sig],
      Symbol::Signature(d) => {
        let mut out = Vec::new();
        out.extend(d.ret);
        out.push(d.ret_sal);
        out.extend_from_slice(&d.params);
        out
      }
      Symbol::Member(d) => d.ty.into_iter().collect(),
      Symbol::Parameter(d) => {
        let mut out = vec![d.sal];
        out.extend(d.ty);
        out
      }
      Symbol::SalAttribute(d) => d.entries.clone(),
      Symbol::Constant(d) => vec![d.value],
      Symbol::EnumValue(d) => vec![d.value],
      Symbol::ValueExpression(d) => d.values.clone(),
      Symbol::Value(d) => match &d.payload {
        ValuePayload::SymbolValue(slot) | ValuePayload::SymbolType(slot) => {
          slot.into_iter().copied().collect()
        }
        _ => Vec::new(),
      },
    }
  }

  /// Swaps the first edge from `parent` to `old` so it points at `new`.
  /// Panics if `parent` has no such edge; callers derive edges from
  /// [Self::children] so a miss is a bug.
  pub fn replace_child(&mut self, parent: SymbolId, old: SymbolId, new: SymbolId) {
    fn in_list(list: &mut [SymbolId], old: SymbolId, new: SymbolId) -> bool {
      if let Some(slot) = list.iter_mut().find(|slot| **slot == old) {
        *slot = new;
        true
      } else {
        false
      }
    }
    fn in_slot(slot: &mut Option<SymbolId>, old: SymbolId, new: SymbolId) -> bool {
      if *slot == Some(old) {
        *slot = Some(new);
        true
      } else {
        false
      }
    }
    let replaced = match self.get_mut(parent) {
      Symbol::Struct(d) | Symbol::Union(d) => in_list(&mut d.members, old, new),
      Symbol::Enum(d) => in_list(&mut d.values, old, new),
      Symbol::FunctionPointer(d) => {
        if d.sig == old {
          d.sig = new;
          true
        } else {
          false
        }
      }
      Symbol::NamedType(d) => in_slot(&mut d.real, old, new),
      Symbol::TypeDef(d) => in_slot(&mut d.real, old, new),
      Symbol::Pointer(d) => in_slot(&mut d.real, old, new),
      Symbol::Array(d) => in_slot(&mut d.real, old, new),
      Symbol::Builtin(_) | Symbol::BitVector(_) | Symbol::Opaque | Symbol::SalEntry(_) => false,
      Symbol::Procedure(d) => {
        if d.sig == old {
          d.sig = new;
          true
        } else {
          false
        }
      }
      Symbol::Signature(d) => {
        if in_slot(&mut d.ret, old, new) {
          true
        } else if d.ret_sal == old {
          d.ret_sal = new;
          true
        } else {
          in_list(&mut d.params, old, new)
        }
      }
      Symbol::Member(d) => in_slot(&mut d.ty, old, new),
      Symbol::Parameter(d) => {
        if d.sal == old {
          d.sal = new;
          true
        } else {
          in_slot(&mut d.ty, old, new)
        }
      }
      Symbol::SalAttribute(d) => in_list(&mut d.entries, old, new),
      Symbol::Constant(d) => {
        if d.value == old {
          d.value = new;
          true
        } else {
          false
        }
      }
      Symbol::EnumValue(d) => {
        if d.value == old {
          d.value = new;
          true
        } else {
          false
        }
      }
      Symbol::ValueExpression(d) => in_list(&mut d.values, old, new),
      Symbol::Value(d) => match &mut d.payload {
        ValuePayload::SymbolValue(slot) | ValuePayload::SymbolType(slot) => {
          in_slot(slot, old, new)
        }
        _ => false,
      },
    };
    if !replaced {
      panic!("no edge from {} to replace", self.kind(parent));
    }
  }

  /// A node is immediately resolved when its own slots are filled in; it says
  /// nothing about descendants.
  pub fn is_immediately_resolved(&self, id: SymbolId) -> bool {
    match self.get(id) {
      Symbol::NamedType(d) => d.real.is_some(),
      Symbol::TypeDef(d) => d.real.is_some(),
      Symbol::Pointer(d) => d.real.is_some(),
      Symbol::Array(d) => d.real.is_some(),
      Symbol::Member(d) => d.ty.is_some() && !d.name.is_empty(),
      Symbol::Parameter(d) => d.ty.is_some(),
      Symbol::Value(d) => d.payload.is_resolved(),
      _ => true,
    }
  }

  /// Follows typedef and named-type links to the underlying type. None if the
  /// chain hits an unresolved proxy.
  pub fn dig_through_typedefs(&self, id: SymbolId) -> Option<SymbolId> {
    let mut cur = id;
    loop {
      match self.get(cur) {
        Symbol::NamedType(d) => cur = d.real?,
        Symbol::TypeDef(d) => cur = d.real?,
        _ => return Some(cur),
      }
    }
  }

  /// Human-readable rendering, mirroring how the type would be written.
  pub fn display_name(&self, id: SymbolId) -> String {
    match self.get(id) {
      Symbol::Struct(d) | Symbol::Union(d) => d.name.clone(),
      Symbol::Enum(d) => d.name.clone(),
      Symbol::FunctionPointer(d) => d.name.clone(),
      Symbol::NamedType(d) => {
        let mut out = String::new();
        if d.is_const {
          out.push_str("const ");
        }
        if !d.qualification.is_empty() {
          out.push_str(&d.qualification);
          out.push(' ');
        }
        out.push_str(&d.name);
        out
      }
      Symbol::TypeDef(d) => d.name.clone(),
      Symbol::Pointer(d) => match d.real {
        Some(real) => format!("{}*", self.display_name(real)),
        None => "<unresolved>*".to_string(),
      },
      Symbol::Array(d) => {
        let inner = match d.real {
          Some(real) => self.display_name(real),
          None => "<unresolved>".to_string(),
        };
        if d.element_count >= 0 {
          format!("{}[{}]", inner, d.element_count)
        } else {
          format!("{}[]", inner)
        }
      }
      Symbol::Builtin(d) => {
        if d.unsigned {
          format!("unsigned {}", d.kind.c_name())
        } else {
          d.kind.c_name().to_string()
        }
      }
      Symbol::BitVector(d) => format!("bitvector({})", d.bits),
      Symbol::Opaque => "opaque".to_string(),
      Symbol::Procedure(d) => d.name.clone(),
      Symbol::Signature(d) => {
        let ret = match d.ret {
          Some(ret) => self.display_name(ret),
          None => "<unresolved>".to_string(),
        };
        let params = d.params.iter().map(|&p| self.display_name(p)).join(", ");
        format!("{}({})", ret, params)
      }
      Symbol::Member(d) => d.name.clone(),
      Symbol::Parameter(d) => d.name.clone(),
      Symbol::SalAttribute(d) => d.entries.iter().map(|&e| self.display_name(e)).join(","),
      Symbol::SalEntry(d) => d.kind.directive().to_string(),
      Symbol::Constant(d) => d.name.clone(),
      Symbol::EnumValue(d) => d.name.clone(),
      Symbol::ValueExpression(d) => d.text.clone(),
      Symbol::Value(d) => d.name.clone(),
    }
  }
}

/// Copies the subgraph rooted at `root` from `src` into `dst`, preserving
/// sharing and cycles. Returns the id of the copied root in `dst`.
pub fn deep_copy(src: &SymbolArena, root: SymbolId, dst: &mut SymbolArena) -> SymbolId {
  let mut map = HashMap::new();
  copy_rec(src, root, dst, &mut map)
}

fn copy_rec(
  src: &SymbolArena,
  id: SymbolId,
  dst: &mut SymbolArena,
  map: &mut HashMap<SymbolId, SymbolId>,
) -> SymbolId {
  if let Some(&mapped) = map.get(&id) {
    return mapped;
  }
  // Reserve the slot before descending so cycles terminate.
  let target = dst.alloc(Symbol::Opaque);
  map.insert(id, target);
  let copied = match src.get(id) {
    Symbol::Struct(d) => Symbol::Struct(DefinedData {
      name: d.name.clone(),
      members: copy_list(src, &d.members, dst, map),
    }),
    Symbol::Union(d) => Symbol::Union(DefinedData {
      name: d.name.clone(),
      members: copy_list(src, &d.members, dst, map),
    }),
    Symbol::Enum(d) => Symbol::Enum(EnumData {
      name: d.name.clone(),
      values: copy_list(src, &d.values, dst, map),
    }),
    Symbol::FunctionPointer(d) => Symbol::FunctionPointer(FunctionPointerData {
      name: d.name.clone(),
      conv: d.conv,
      sig: copy_rec(src, d.sig, dst, map),
    }),
    Symbol::NamedType(d) => Symbol::NamedType(NamedTypeData {
      qualification: d.qualification.clone(),
      name: d.name.clone(),
      is_const: d.is_const,
      real: copy_opt(src, d.real, dst, map),
    }),
    Symbol::TypeDef(d) => Symbol::TypeDef(TypeDefData {
      name: d.name.clone(),
      real: copy_opt(src, d.real, dst, map),
    }),
    Symbol::Pointer(d) => Symbol::Pointer(PointerData {
      real: copy_opt(src, d.real, dst, map),
    }),
    Symbol::Array(d) => Symbol::Array(ArrayData {
      element_count: d.element_count,
      real: copy_opt(src, d.real, dst, map),
    }),
    Symbol::Builtin(d) => Symbol::Builtin(d.clone()),
    Symbol::BitVector(d) => Symbol::BitVector(d.clone()),
    Symbol::Opaque => Symbol::Opaque,
    Symbol::Procedure(d) => Symbol::Procedure(ProcedureData {
      name: d.name.clone(),
      dll_name: d.dll_name.clone(),
      conv: d.conv,
      sig: copy_rec(src, d.sig, dst, map),
    }),
    Symbol::Signature(d) => Symbol::Signature(SignatureData {
      ret: copy_opt(src, d.ret, dst, map),
      ret_sal: copy_rec(src, d.ret_sal, dst, map),
      params: copy_list(src, &d.params, dst, map),
    }),
    Symbol::Member(d) => Symbol::Member(MemberData {
      name: d.name.clone(),
      ty: copy_opt(src, d.ty, dst, map),
    }),
    Symbol::Parameter(d) => Symbol::Parameter(ParameterData {
      name: d.name.clone(),
      ty: copy_opt(src, d.ty, dst, map),
      sal: copy_rec(src, d.sal, dst, map),
    }),
    Symbol::SalAttribute(d) => Symbol::SalAttribute(SalAttributeData {
      entries: copy_list(src, &d.entries, dst, map),
    }),
    Symbol::SalEntry(d) => Symbol::SalEntry(d.clone()),
    Symbol::Constant(d) => Symbol::Constant(ConstantData {
      name: d.name.clone(),
      kind: d.kind,
      value: copy_rec(src, d.value, dst, map),
    }),
    Symbol::EnumValue(d) => Symbol::EnumValue(EnumValueData {
      enum_name: d.enum_name.clone(),
      name: d.name.clone(),
      value: copy_rec(src, d.value, dst, map),
    }),
    Symbol::ValueExpression(d) => Symbol::ValueExpression(ValueExpressionData {
      text: d.text.clone(),
      values: copy_list(src, &d.values, dst, map),
      parse_failed: d.parse_failed,
    }),
    Symbol::Value(d) => Symbol::Value(ValueData {
      name: d.name.clone(),
      payload: match &d.payload {
        ValuePayload::SymbolValue(slot) => {
          ValuePayload::SymbolValue(copy_opt(src, *slot, dst, map))
        }
        ValuePayload::SymbolType(slot) => ValuePayload::SymbolType(copy_opt(src, *slot, dst, map)),
        other => other.clone(),
      },
    }),
  };
  *dst.get_mut(target) = copied;
  target
}

fn copy_list(
  src: &SymbolArena,
  list: &[SymbolId],
  dst: &mut SymbolArena,
  map: &mut HashMap<SymbolId, SymbolId>,
) -> Vec<SymbolId> {
  let mut out = Vec::with_capacity(list.len());
  for &child in list {
    out.push(copy_rec(src, child, dst, map));
  }
  out
}

fn copy_opt(
  src: &SymbolArena,
  slot: Option<SymbolId>,
  dst: &mut SymbolArena,
  map: &mut HashMap<SymbolId, SymbolId>,
) -> Option<SymbolId> {
  slot.map(|child| copy_rec(src, child, dst, map))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kind::ValueKind;

  #[test]
  fn value_expression_extracts_leaves_in_order() {
    let mut arena = SymbolArena::new();
    let id = arena.new_value_expression("(1 << SHIFT) | (FLAGS)MASK");
    let Symbol::ValueExpression(d) = arena.get(id) else {
      panic!("expected value expression");
    };
    assert!(!d.parse_failed);
    let names: Vec<_> = d.values.iter().map(|&v| arena.name_of_value(v)).collect();
    assert_eq!(names, vec!["1", "SHIFT", "FLAGS", "MASK"]);
    let Symbol::Value(cast) = arena.get(d.values[2]) else {
      panic!("expected value");
    };
    assert_eq!(cast.payload.kind(), ValueKind::SymbolType);
  }

  #[test]
  fn value_expression_parse_failure_keeps_text() {
    let mut arena = SymbolArena::new();
    let id = arena.new_value_expression("DECLARE_HANDLE(HWND);");
    let Symbol::ValueExpression(d) = arena.get(id) else {
      panic!("expected value expression");
    };
    assert!(d.parse_failed);
    assert!(d.values.is_empty());
    assert_eq!(d.text, "DECLARE_HANDLE(HWND);");
  }

  #[test]
  fn macro_method_constants_are_quoted() {
    let mut arena = SymbolArena::new();
    let id = arena.new_constant("MAKELONG", "(a, b) ((LONG)a | b)", ConstantKind::MacroMethod);
    let Symbol::Constant(c) = arena.get(id) else {
      panic!("expected constant");
    };
    let Symbol::ValueExpression(d) = arena.get(c.value) else {
      panic!("expected value expression");
    };
    assert_eq!(d.text, "\"(a, b) ((LONG)a | b)\"");
    assert!(!d.parse_failed);
    assert_eq!(d.values.len(), 1);
  }

  #[test]
  fn replace_child_swaps_member_type() {
    let mut arena = SymbolArena::new();
    let s = arena.new_struct("S");
    let named = arena.new_named("DWORD");
    let member = arena.add_member(s, "field", named);
    let builtin = arena.new_builtin(BuiltinKind::Int, true);
    arena.replace_child(member, named, builtin);
    assert_eq!(arena.children(member), vec![builtin]);
  }

  #[test]
  #[should_panic(expected = "no edge")]
  fn replace_child_panics_on_missing_edge() {
    let mut arena = SymbolArena::new();
    let s = arena.new_struct("S");
    let a = arena.new_opaque();
    let b = arena.new_opaque();
    arena.replace_child(s, a, b);
  }

  #[test]
  fn dig_through_typedefs_follows_chains() {
    let mut arena = SymbolArena::new();
    let builtin = arena.new_builtin(BuiltinKind::Int, false);
    let inner = arena.new_typedef("DWORD", Some(builtin));
    let named = arena.new_named("DWORD");
    arena.set_real_type(named, inner);
    let outer = arena.new_typedef("LPARAM", Some(named));
    assert_eq!(arena.dig_through_typedefs(outer), Some(builtin));
    let broken = arena.new_named("UNKNOWN");
    assert_eq!(arena.dig_through_typedefs(broken), None);
  }

  #[test]
  fn deep_copy_preserves_cycles_and_sharing() {
    let mut src = SymbolArena::new();
    let s = src.new_struct("node");
    let named = src.new_named("node");
    src.set_real_type(named, s);
    let ptr = src.new_pointer(named);
    src.add_member(s, "next", ptr);
    src.add_member(s, "prev", ptr);

    let mut dst = SymbolArena::new();
    let copied = deep_copy(&src, s, &mut dst);
    let Symbol::Struct(d) = dst.get(copied) else {
      panic!("expected struct");
    };
    assert_eq!(d.name, "node");
    assert_eq!(d.members.len(), 2);
    // Shared pointer node stays shared.
    let next_ty = dst.children(d.members[0])[0];
    let prev_ty = dst.children(d.members[1])[0];
    assert_eq!(next_ty, prev_ty);
    // The cycle closes back on the copied struct.
    let named_copy = dst.children(next_ty)[0];
    assert_eq!(dst.children(named_copy), vec![copied]);
  }

  #[test]
  fn immediate_resolution_rules() {
    let mut arena = SymbolArena::new();
    let named = arena.new_named("DWORD");
    assert!(!arena.is_immediately_resolved(named));
    let builtin = arena.new_builtin(BuiltinKind::Int, false);
    arena.set_real_type(named, builtin);
    assert!(arena.is_immediately_resolved(named));

    let s = arena.new_struct("S");
    assert!(arena.is_immediately_resolved(s));
    let member = arena.add_member(s, "", builtin);
    assert!(!arena.is_immediately_resolved(member));
  }

  impl SymbolArena {
    fn name_of_value(&self, id: SymbolId) -> String {
      match self.get(id) {
        Symbol::Value(d) => d.name.clone(),
        other => panic!("expected value, got {}", other.kind()),
      }
    }
  }
}
