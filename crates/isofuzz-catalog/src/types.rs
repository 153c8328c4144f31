use smol_str::SmolStr;

/// What a [`Type`] actually *is*, for the purposes of [`Type::consistent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum_macros::EnumIs)]
pub enum TypeKind {
    /// A concrete, non-composite type (`bool`, `int`, `real`, `text`, ...).
    Scalar,
    /// A concrete array of some element type, e.g. `int[]`.
    Array { element: SmolStr },
    /// Matches any concrete array type. Structural: `consistent(a, any_array)`
    /// holds iff `a` is `Array { .. }`.
    AnyArray,
    /// Matches any non-pseudo, non-internal scalar or array type.
    AnyElement,
    /// Matches any enum type. No concrete enum kind is modelled yet, so this
    /// only matches itself.
    AnyEnum,
    /// Matches any range type. No concrete range kind is modelled yet, so
    /// this only matches itself.
    AnyRange,
    /// A composite row type. Matches itself and other `Record`s.
    Record,
    /// Accepts any string-like literal; matches `text` and itself.
    Cstring,
    /// Matches everything. Used for fully generic functions like `coalesce`.
    Any,
    /// Forbidden as a function argument/result type in generated code.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub name: SmolStr,
    pub kind: TypeKind,
}

impl Type {
    pub fn scalar(name: &str) -> Self {
        Type {
            name: name.into(),
            kind: TypeKind::Scalar,
        }
    }

    pub fn array_of(name: &str, element: &str) -> Self {
        Type {
            name: name.into(),
            kind: TypeKind::Array {
                element: element.into(),
            },
        }
    }

    /// Construct one of the well-known pseudo types by name (`any-array`,
    /// `any-element`, `any-enum`, `any-range`, `record`, `cstring`, `any`,
    /// `internal`, `array`).
    pub fn pseudo(name: &str) -> Self {
        let kind = match name {
            "any-array" => TypeKind::AnyArray,
            "any-element" => TypeKind::AnyElement,
            "any-enum" => TypeKind::AnyEnum,
            "any-range" => TypeKind::AnyRange,
            "record" => TypeKind::Record,
            "cstring" => TypeKind::Cstring,
            "any" => TypeKind::Any,
            "internal" => TypeKind::Internal,
            "array" => TypeKind::AnyArray,
            other => panic!("unknown pseudo type `{other}`"),
        };
        Type { name: name.into(), kind }
    }

    /// Can an expression of static type `self` be supplied where `expected`
    /// is required?
    ///
    /// Reflexive (`a.consistent(a)` always holds) and symmetric on concrete
    /// (non-pseudo) types. Pseudo types on the `expected` side implement the
    /// structural subsumption rules documented on [`TypeKind`].
    pub fn consistent(&self, expected: &Type) -> bool {
        if self.name == expected.name {
            return true;
        }
        match &expected.kind {
            TypeKind::Any => true,
            TypeKind::AnyArray => matches!(self.kind, TypeKind::Array { .. }),
            TypeKind::AnyElement => {
                !matches!(self.kind, TypeKind::Internal | TypeKind::Any)
            }
            TypeKind::Cstring => matches!(self.kind, TypeKind::Scalar) && self.name == "text",
            _ => false,
        }
    }

    /// `internal` and bare `array` may never appear as a function argument
    /// or result type in generated code.
    pub fn is_forbidden_in_signatures(&self) -> bool {
        self.name == super::INTERNAL_TYPE || self.name == super::ARRAY_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: SmolStr,
    pub ty: SmolStr,
}

impl Column {
    pub fn new(name: &str, ty: &str) -> Self {
        Column {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: SmolStr,
    pub schema: SmolStr,
    pub is_insertable: bool,
    pub is_base_table: bool,
    pub columns: Vec<Column>,
    pub constraints: Vec<SmolStr>,
}

impl Table {
    pub fn base(name: &str, schema: &str, columns: Vec<Column>) -> Self {
        Table {
            name: name.into(),
            schema: schema.into(),
            is_insertable: true,
            is_base_table: true,
            columns,
            constraints: Vec::new(),
        }
    }

    pub fn view(name: &str, schema: &str, columns: Vec<Column>) -> Self {
        Table {
            name: name.into(),
            schema: schema.into(),
            is_insertable: false,
            is_base_table: false,
            columns,
            constraints: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn wkey_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.name == super::WKEY_COLUMN)
    }

    pub fn version_index(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == super::VERSION_COLUMN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub symbol: SmolStr,
    pub left_type: SmolStr,
    pub right_type: SmolStr,
    pub result_type: SmolStr,
}

impl Operator {
    pub fn new(symbol: &str, left: &str, right: &str, result: &str) -> Self {
        Operator {
            symbol: symbol.into(),
            left_type: left.into(),
            right_type: right.into(),
            result_type: result.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    pub schema: SmolStr,
    pub specific_id: SmolStr,
    pub result_type: SmolStr,
    pub name: SmolStr,
    pub argtypes: Vec<SmolStr>,
}

impl Routine {
    pub fn new(schema: &str, specific_id: &str, name: &str, result_type: &str, argtypes: Vec<&str>) -> Self {
        Routine {
            schema: schema.into(),
            specific_id: specific_id.into(),
            result_type: result_type.into(),
            name: name.into(),
            argtypes: argtypes.into_iter().map(SmolStr::from).collect(),
        }
    }

    pub fn is_parameterless(&self) -> bool {
        self.argtypes.is_empty()
    }
}

pub type Aggregate = Routine;
pub type WindowFunction = Routine;
