//! `VarType`: the closed set of value types the analyser assigns to
//! expressions, symbols, and function metrics (spec.md §3).

/// A value type. Composite `PointerTo*` variants express ownership-free
/// references; `Any` is a runtime-tagged union; `Unknown` is the type of an
/// expression or symbol not yet resolved by the analyser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Integer,
    Float,
    String,
    List,
    Vec,
    PointerToObject,
    PointerToIntVec,
    PointerToFloatVec,
    PointerToStringList,
    Pair,
    Fpair,
    Quad,
    Oct,
    Foct,
    Any,
    Unknown,
}

impl VarType {
    pub fn is_float_family(self) -> bool {
        matches!(self, VarType::Float | VarType::Fpair | VarType::Foct)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            VarType::Integer
                | VarType::Float
                | VarType::Pair
                | VarType::Fpair
                | VarType::Quad
                | VarType::Oct
                | VarType::Foct
        )
    }

    /// The scalar element type carried by a vector-like composite, used by
    /// the destructuring-shape checks in §4.2/§9.
    pub fn element_type(self) -> Option<VarType> {
        match self {
            VarType::Pair | VarType::Quad => Some(VarType::Integer),
            VarType::Fpair | VarType::Foct => Some(VarType::Float),
            _ => None,
        }
    }

    /// Number of scalar lanes for destructuring shape validation.
    pub fn lane_count(self) -> Option<usize> {
        match self {
            VarType::Pair | VarType::Fpair => Some(2),
            VarType::Quad => Some(4),
            VarType::Oct | VarType::Foct => Some(8),
            _ => None,
        }
    }
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VarType::Integer => "INTEGER",
            VarType::Float => "FLOAT",
            VarType::String => "STRING",
            VarType::List => "LIST",
            VarType::Vec => "VEC",
            VarType::PointerToObject => "POINTER_TO_OBJECT",
            VarType::PointerToIntVec => "POINTER_TO_INT_VEC",
            VarType::PointerToFloatVec => "POINTER_TO_FLOAT_VEC",
            VarType::PointerToStringList => "POINTER_TO_STRING_LIST",
            VarType::Pair => "PAIR",
            VarType::Fpair => "FPAIR",
            VarType::Quad => "QUAD",
            VarType::Oct => "OCT",
            VarType::Foct => "FOCT",
            VarType::Any => "ANY",
            VarType::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}
