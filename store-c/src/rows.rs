use serde::Deserialize;
use serde::Serialize;
use symbol_c::kind::BuiltinKind;
use symbol_c::kind::CallingConvention;
use symbol_c::kind::ConstantKind;
use symbol_c::kind::SalEntryKind;
use symbol_c::kind::SymbolKind;

/// Flattened node pointer: a surrogate row id plus the kind that selects the
/// table it lives in. Id 0 is reserved for the opaque sentinel; real rows
/// start at 1.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct TypeRef {
  pub id: u32,
  pub kind: SymbolKind,
}

impl TypeRef {
  pub const OPAQUE: TypeRef = TypeRef {
    id: 0,
    kind: SymbolKind::Opaque,
  };
}

/// Header row for a struct, union, enum or function pointer. `partial` marks
/// a header written ahead of its body so that references (including
/// self-references) have something to point at.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DefinedTypeRow {
  pub id: u32,
  pub kind: SymbolKind,
  pub name: String,
  pub conv: CallingConvention,
  pub sig: Option<u32>,
  pub partial: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MemberRow {
  pub owner: u32,
  pub name: String,
  pub ty: TypeRef,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EnumValueRow {
  pub owner: u32,
  pub name: String,
  pub expr: String,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TypedefRow {
  pub id: u32,
  pub name: String,
  pub real: TypeRef,
}

/// By-name type reference. Carries no target; resolution happens again on
/// load, which is what keeps stored graphs open to later additions.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NamedTypeRow {
  pub id: u32,
  pub qualification: String,
  pub name: String,
  pub is_const: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PointerRow {
  pub id: u32,
  pub real: TypeRef,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ArrayRow {
  pub id: u32,
  pub element_count: i32,
  pub real: TypeRef,
}

/// Builtin and bit-vector rows share a table; `kind` tells them apart.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SpecializedRow {
  pub id: u32,
  pub kind: SymbolKind,
  pub builtin: BuiltinKind,
  pub unsigned: bool,
  pub bits: i32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConstantRow {
  pub name: String,
  pub kind: ConstantKind,
  pub expr: String,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProcedureRow {
  pub name: String,
  pub dll_name: Option<String>,
  pub conv: CallingConvention,
  pub sig: u32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignatureRow {
  pub id: u32,
  pub ret: Option<TypeRef>,
  /// Comma-joined SalEntry row ids.
  pub ret_sal: String,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ParameterRow {
  pub sig: u32,
  pub name: String,
  pub ty: TypeRef,
  /// Comma-joined SalEntry row ids.
  pub sal: String,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SalEntryRow {
  pub id: u32,
  pub kind: SalEntryKind,
  pub text: Option<String>,
}
