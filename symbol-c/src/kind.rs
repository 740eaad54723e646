use ahash::HashMap;
use ahash::HashMapExt;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// Kind tag for every node in the declaration graph. Makes dispatch a plain
/// exhaustive `match` instead of downcasting.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum SymbolKind {
  Struct,
  Union,
  Enum,
  EnumValue,
  Array,
  Pointer,
  Builtin,
  TypeDef,
  BitVector,
  NamedType,
  Procedure,
  Signature,
  FunctionPointer,
  Parameter,
  Member,
  Constant,
  SalEntry,
  SalAttribute,
  ValueExpression,
  Value,
  Opaque,
}

/// Groups kinds by how they are resolved and stored.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum SymbolCategory {
  Defined,
  Proxy,
  Specialized,
  Procedure,
  Extra,
}

impl SymbolKind {
  /// Category is a pure function of the kind.
  pub fn category(self) -> SymbolCategory {
    match self {
      SymbolKind::Struct | SymbolKind::Union | SymbolKind::Enum | SymbolKind::FunctionPointer => {
        SymbolCategory::Defined
      }
      SymbolKind::NamedType | SymbolKind::TypeDef | SymbolKind::Pointer | SymbolKind::Array => {
        SymbolCategory::Proxy
      }
      SymbolKind::Builtin | SymbolKind::BitVector | SymbolKind::Opaque => {
        SymbolCategory::Specialized
      }
      SymbolKind::Procedure | SymbolKind::Signature => SymbolCategory::Procedure,
      SymbolKind::EnumValue
      | SymbolKind::Parameter
      | SymbolKind::Member
      | SymbolKind::Constant
      | SymbolKind::SalEntry
      | SymbolKind::SalAttribute
      | SymbolKind::ValueExpression
      | SymbolKind::Value => SymbolCategory::Extra,
    }
  }

  /// Namespace this kind of symbol is addressable under, if it has a global
  /// name at all.
  pub fn name_kind(self) -> Option<NameKind> {
    match self {
      SymbolKind::Struct => Some(NameKind::Struct),
      SymbolKind::Union => Some(NameKind::Union),
      SymbolKind::Enum => Some(NameKind::Enum),
      SymbolKind::FunctionPointer => Some(NameKind::FunctionPointer),
      SymbolKind::TypeDef => Some(NameKind::TypeDef),
      SymbolKind::Procedure => Some(NameKind::Procedure),
      SymbolKind::Constant => Some(NameKind::Constant),
      SymbolKind::EnumValue => Some(NameKind::EnumValue),
      _ => None,
    }
  }
}

/// The disjoint namespaces global declarations live in.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum NameKind {
  Struct,
  Union,
  FunctionPointer,
  Procedure,
  TypeDef,
  Constant,
  Enum,
  EnumValue,
}

impl NameKind {
  pub fn symbol_kind(self) -> SymbolKind {
    match self {
      NameKind::Struct => SymbolKind::Struct,
      NameKind::Union => SymbolKind::Union,
      NameKind::FunctionPointer => SymbolKind::FunctionPointer,
      NameKind::Procedure => SymbolKind::Procedure,
      NameKind::TypeDef => SymbolKind::TypeDef,
      NameKind::Constant => SymbolKind::Constant,
      NameKind::Enum => SymbolKind::Enum,
      NameKind::EnumValue => SymbolKind::EnumValue,
    }
  }

  /// Whether this namespace kind lives in the type namespace proper. Enums are
  /// queried together with the defined types but register their values in a
  /// separate namespace.
  pub fn is_type(self) -> bool {
    matches!(
      self,
      NameKind::Struct | NameKind::Union | NameKind::FunctionPointer | NameKind::TypeDef
    )
  }
}

/// The fixed set of primitive C types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum BuiltinKind {
  Boolean,
  Byte,
  Short,
  Int,
  LongLong,
  Char,
  WChar,
  Float,
  Double,
  Void,
  Unknown,
}

static BUILTIN_KEYWORDS: Lazy<HashMap<&'static str, (BuiltinKind, bool)>> = Lazy::new(|| {
  let mut m = HashMap::new();
  m.insert("boolean", (BuiltinKind::Boolean, false));
  m.insert("byte", (BuiltinKind::Byte, false));
  m.insert("short", (BuiltinKind::Short, false));
  m.insert("__int16", (BuiltinKind::Short, false));
  m.insert("int", (BuiltinKind::Int, false));
  m.insert("long", (BuiltinKind::Int, false));
  m.insert("signed", (BuiltinKind::Int, false));
  m.insert("unsigned", (BuiltinKind::Int, true));
  m.insert("__int32", (BuiltinKind::Int, false));
  m.insert("__int64", (BuiltinKind::LongLong, false));
  m.insert("char", (BuiltinKind::Char, false));
  m.insert("wchar", (BuiltinKind::WChar, false));
  m.insert("wchar_t", (BuiltinKind::WChar, false));
  m.insert("float", (BuiltinKind::Float, false));
  m.insert("double", (BuiltinKind::Double, false));
  m.insert("void", (BuiltinKind::Void, false));
  m
});

impl BuiltinKind {
  /// C display name of the primitive.
  pub fn c_name(self) -> &'static str {
    match self {
      BuiltinKind::Boolean => "boolean",
      BuiltinKind::Byte => "byte",
      BuiltinKind::Short => "short",
      BuiltinKind::Int => "int",
      BuiltinKind::LongLong => "__int64",
      BuiltinKind::Char => "char",
      BuiltinKind::WChar => "wchar",
      BuiltinKind::Float => "float",
      BuiltinKind::Double => "double",
      BuiltinKind::Void => "void",
      BuiltinKind::Unknown => "unknown",
    }
  }

  /// Maps a C type keyword to a builtin kind and signedness, if it is one.
  pub fn from_keyword(name: &str) -> Option<(BuiltinKind, bool)> {
    BUILTIN_KEYWORDS.get(name).copied()
  }

  pub fn is_number(self) -> bool {
    matches!(
      self,
      BuiltinKind::Byte
        | BuiltinKind::Short
        | BuiltinKind::Int
        | BuiltinKind::LongLong
        | BuiltinKind::Float
        | BuiltinKind::Double
    )
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum CallingConvention {
  #[default]
  WinApi,
  Standard,
  CDeclaration,
  Clr,
  Pascal,
  Inline,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum ConstantKind {
  Macro,
  MacroMethod,
}

/// Tag on a leaf value inside a constant expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum ValueKind {
  Number,
  String,
  Character,
  Boolean,
  SymbolValue,
  SymbolType,
}

/// Directionality/nullability hints attached to parameters and return values.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum SalEntryKind {
  Null,
  NotNull,
  MaybeNull,
  ReadOnly,
  NotReadOnly,
  MaybeReadOnly,
  Valid,
  NotValid,
  MaybeValid,
  ReadableTo,
  ElemReadableTo,
  ByteReadableTo,
  WritableTo,
  ElemWritableTo,
  ByteWritableTo,
  Deref,
  Pre,
  Post,
  ExceptThat,
  InnerControlEntryPoint,
  InnerDataEntryPoint,
  InnerSuccess,
  InnerCheckReturn,
  InnerTypefix,
  InnerOverride,
  InnerCallBack,
  InnerBlocksOn,
}

impl SalEntryKind {
  /// Source-form directive the hint was derived from.
  pub fn directive(self) -> &'static str {
    match self {
      SalEntryKind::Null => "SAL_null",
      SalEntryKind::NotNull => "SAL_notnull",
      SalEntryKind::MaybeNull => "SAL_maybenull",
      SalEntryKind::ReadOnly => "SAL_readonly",
      SalEntryKind::NotReadOnly => "SAL_notreadonly",
      SalEntryKind::MaybeReadOnly => "SAL_maybereadonly",
      SalEntryKind::Valid => "SAL_valid",
      SalEntryKind::NotValid => "SAL_notvalid",
      SalEntryKind::MaybeValid => "SAL_maybevalid",
      SalEntryKind::ReadableTo => "SAL_readableTo()",
      SalEntryKind::ElemReadableTo => "SAL_readableTo(elementCount())",
      SalEntryKind::ByteReadableTo => "SAL_readableTo(byteCount())",
      SalEntryKind::WritableTo => "SAL_writableTo()",
      SalEntryKind::ElemWritableTo => "SAL_writableTo(elementCount())",
      SalEntryKind::ByteWritableTo => "SAL_writableTo(byteCount())",
      SalEntryKind::Deref => "SAL_deref",
      SalEntryKind::Pre => "SAL_pre",
      SalEntryKind::Post => "SAL_post",
      SalEntryKind::ExceptThat => "SAL_except",
      SalEntryKind::InnerControlEntryPoint => "SAL_entrypoint(controlEntry, )",
      SalEntryKind::InnerDataEntryPoint => "SAL_entrypoint(dataEntry, )",
      SalEntryKind::InnerSuccess => "SAL_success()",
      SalEntryKind::InnerCheckReturn => "SAL_checkReturn",
      SalEntryKind::InnerTypefix => "SAL_typefix",
      SalEntryKind::InnerOverride => "__override",
      SalEntryKind::InnerCallBack => "__callback",
      SalEntryKind::InnerBlocksOn => "SAL_blocksOn()",
    }
  }
}

impl Display for SymbolKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}

impl Display for NameKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}
