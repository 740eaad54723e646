use crate::arena::SymbolId;
use crate::kind::BuiltinKind;
use crate::kind::CallingConvention;
use crate::kind::ConstantKind;
use crate::kind::SalEntryKind;
use crate::kind::SymbolCategory;
use crate::kind::SymbolKind;
use crate::kind::ValueKind;
use crate::name::Name;
use serde::Deserialize;
use serde::Serialize;

/// Payload for struct and union definitions.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DefinedData {
  pub name: String,
  pub members: Vec<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EnumData {
  pub name: String,
  pub values: Vec<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FunctionPointerData {
  pub name: String,
  pub conv: CallingConvention,
  pub sig: SymbolId,
}

/// A reference to a type by name, as written in source. `real` is filled in
/// by resolution.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NamedTypeData {
  pub qualification: String,
  pub name: String,
  pub is_const: bool,
  pub real: Option<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TypeDefData {
  pub name: String,
  pub real: Option<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PointerData {
  pub real: Option<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ArrayData {
  /// -1 when the declaration gave no extent.
  pub element_count: i32,
  pub real: Option<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BuiltinData {
  pub kind: BuiltinKind,
  pub unsigned: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BitVectorData {
  pub bits: i32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProcedureData {
  pub name: String,
  pub dll_name: Option<String>,
  pub conv: CallingConvention,
  pub sig: SymbolId,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignatureData {
  /// None before the declaration source has attached a return type.
  pub ret: Option<SymbolId>,
  /// Always a SalAttribute node, possibly with no entries.
  pub ret_sal: SymbolId,
  pub params: Vec<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MemberData {
  pub name: String,
  pub ty: Option<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ParameterData {
  pub name: String,
  pub ty: Option<SymbolId>,
  pub sal: SymbolId,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SalAttributeData {
  pub entries: Vec<SymbolId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SalEntryData {
  pub kind: SalEntryKind,
  pub text: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConstantData {
  pub name: String,
  pub kind: ConstantKind,
  /// Always a ValueExpression node.
  pub value: SymbolId,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EnumValueData {
  /// Name of the enum this value belongs to.
  pub enum_name: String,
  pub name: String,
  /// Always a ValueExpression node.
  pub value: SymbolId,
}

/// A constant expression kept as source text plus the leaf values extracted
/// from its parse tree. The tree itself is re-derived on demand.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ValueExpressionData {
  pub text: String,
  pub values: Vec<SymbolId>,
  pub parse_failed: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum ValuePayload {
  Number(f64),
  String(String),
  Character(char),
  Boolean(bool),
  /// Reference by name to a constant or enum value; filled in by resolution.
  SymbolValue(Option<SymbolId>),
  /// Reference by name to a type, from a cast; filled in by resolution.
  SymbolType(Option<SymbolId>),
}

impl ValuePayload {
  pub fn kind(&self) -> ValueKind {
    match self {
      ValuePayload::Number(_) => ValueKind::Number,
      ValuePayload::String(_) => ValueKind::String,
      ValuePayload::Character(_) => ValueKind::Character,
      ValuePayload::Boolean(_) => ValueKind::Boolean,
      ValuePayload::SymbolValue(_) => ValueKind::SymbolValue,
      ValuePayload::SymbolType(_) => ValueKind::SymbolType,
    }
  }

  /// Literals always carry their value; symbol references resolve later.
  pub fn is_resolved(&self) -> bool {
    !matches!(
      self,
      ValuePayload::SymbolValue(None) | ValuePayload::SymbolType(None)
    )
  }
}

/// A leaf inside a constant expression: the name it was written as plus the
/// value it carries or refers to.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ValueData {
  pub name: String,
  pub payload: ValuePayload,
}

/// One node in the declaration graph. Children are ids into the owning arena.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Symbol {
  Struct(DefinedData),
  Union(DefinedData),
  Enum(EnumData),
  FunctionPointer(FunctionPointerData),
  NamedType(NamedTypeData),
  TypeDef(TypeDefData),
  Pointer(PointerData),
  Array(ArrayData),
  Builtin(BuiltinData),
  BitVector(BitVectorData),
  Opaque,
  Procedure(ProcedureData),
  Signature(SignatureData),
  Member(MemberData),
  Parameter(ParameterData),
  SalAttribute(SalAttributeData),
  SalEntry(SalEntryData),
  Constant(ConstantData),
  EnumValue(EnumValueData),
  ValueExpression(ValueExpressionData),
  Value(ValueData),
}

impl Symbol {
  pub fn kind(&self) -> SymbolKind {
    match self {
      Symbol::Struct(_) => SymbolKind::Struct,
      Symbol::Union(_) => SymbolKind::Union,
      Symbol::Enum(_) => SymbolKind::Enum,
      Symbol::FunctionPointer(_) => SymbolKind::FunctionPointer,
      Symbol::NamedType(_) => SymbolKind::NamedType,
      Symbol::TypeDef(_) => SymbolKind::TypeDef,
      Symbol::Pointer(_) => SymbolKind::Pointer,
      Symbol::Array(_) => SymbolKind::Array,
      Symbol::Builtin(_) => SymbolKind::Builtin,
      Symbol::BitVector(_) => SymbolKind::BitVector,
      Symbol::Opaque => SymbolKind::Opaque,
      Symbol::Procedure(_) => SymbolKind::Procedure,
      Symbol::Signature(_) => SymbolKind::Signature,
      Symbol::Member(_) => SymbolKind::Member,
      Symbol::Parameter(_) => SymbolKind::Parameter,
      Symbol::SalAttribute(_) => SymbolKind::SalAttribute,
      Symbol::SalEntry(_) => SymbolKind::SalEntry,
      Symbol::Constant(_) => SymbolKind::Constant,
      Symbol::EnumValue(_) => SymbolKind::EnumValue,
      Symbol::ValueExpression(_) => SymbolKind::ValueExpression,
      Symbol::Value(_) => SymbolKind::Value,
    }
  }

  pub fn category(&self) -> SymbolCategory {
    self.kind().category()
  }

  /// The identifier this node declares, for nameable kinds.
  pub fn name(&self) -> Option<&str> {
    match self {
      Symbol::Struct(d) | Symbol::Union(d) => Some(&d.name),
      Symbol::Enum(d) => Some(&d.name),
      Symbol::FunctionPointer(d) => Some(&d.name),
      Symbol::TypeDef(d) => Some(&d.name),
      Symbol::Procedure(d) => Some(&d.name),
      Symbol::Constant(d) => Some(&d.name),
      Symbol::EnumValue(d) => Some(&d.name),
      _ => None,
    }
  }

  /// The namespaced global name, for kinds that are globally addressable.
  pub fn global_name(&self) -> Option<Name> {
    let kind = self.kind().name_kind()?;
    let name = self.name()?;
    Some(Name::new(name, kind))
  }
}
