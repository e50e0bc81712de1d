//! Type names, primitives and the fixed boxing table
//!
//! Type names are fully-qualified dotted names. Array types carry one `[]`
//! suffix per dimension (`java.lang.String[][]`), primitives use their
//! keyword (`int`).

/// Root of the reference type hierarchy
pub const OBJECT: &str = "java.lang.Object";

/// Interfaces implemented by every array type
pub const ARRAY_SUPERTYPES: [&str; 2] = ["java.lang.Cloneable", "java.io.Serializable"];

/// Primitive types, including `void`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `void`
    Void,
}

impl Primitive {
    /// Every primitive, in tag order
    pub const ALL: [Primitive; 9] = [
        Primitive::Boolean,
        Primitive::Byte,
        Primitive::Char,
        Primitive::Short,
        Primitive::Int,
        Primitive::Long,
        Primitive::Float,
        Primitive::Double,
        Primitive::Void,
    ];

    /// Source keyword
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }

    /// Wrapper type used when the value is boxed
    pub fn boxed_name(self) -> &'static str {
        match self {
            Primitive::Boolean => "java.lang.Boolean",
            Primitive::Byte => "java.lang.Byte",
            Primitive::Char => "java.lang.Character",
            Primitive::Short => "java.lang.Short",
            Primitive::Int => "java.lang.Integer",
            Primitive::Long => "java.lang.Long",
            Primitive::Float => "java.lang.Float",
            Primitive::Double => "java.lang.Double",
            Primitive::Void => "java.lang.Void",
        }
    }

    /// Parse a keyword
    pub fn from_keyword(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == name)
    }

    /// Reverse boxing lookup
    pub fn from_boxed_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.boxed_name() == name)
    }

    /// Operand tag
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse an operand tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

/// Whether `name` is a primitive keyword (including `void`)
pub fn is_primitive(name: &str) -> bool {
    Primitive::from_keyword(name).is_some()
}

/// Whether `name` denotes an array type
pub fn is_array(name: &str) -> bool {
    name.ends_with("[]")
}

/// Split an array name into its element name and dimension count
pub fn strip_array(name: &str) -> (&str, usize) {
    let mut element = name;
    let mut dims = 0;
    while let Some(inner) = element.strip_suffix("[]") {
        element = inner;
        dims += 1;
    }
    (element, dims)
}

/// Component type of an array name, one dimension down
pub fn component_of(name: &str) -> Option<&str> {
    name.strip_suffix("[]")
}

/// Simple name: the part after the last `.` or `$`
pub fn simple_name(name: &str) -> &str {
    name.rsplit(['.', '$']).next().unwrap_or(name)
}

/// Name of the generated code unit for a type
///
/// Types under `java.` cannot be generated into their own package, so they
/// are relocated under `likeness.generated.jdk`.
pub fn generated_unit_name(type_name: &str) -> String {
    if type_name.starts_with("java.") {
        format!("{GENERATED_JDK_PACKAGE}.{type_name}$Likeness")
    } else {
        format!("{type_name}$Likeness")
    }
}

/// Package that receives relocated `java.` units
pub const GENERATED_JDK_PACKAGE: &str = "likeness.generated.jdk";

/// Name of the registry unit
pub const REGISTRY_UNIT: &str = "likeness.generated.GeneratedRegistry";

/// Service interface implemented by the registry
pub const PROVIDER_SERVICE: &str = "likeness.provider.Provider";

/// Extension of code unit files
pub const UNIT_EXTENSION: &str = "lku";

/// Path of the service registration entry inside an output root
pub fn service_entry_path() -> String {
    format!("META-INF/services/{PROVIDER_SERVICE}")
}

/// Relative path of a code unit inside an output root
pub fn unit_path(unit_name: &str) -> String {
    format!("{}.{UNIT_EXTENSION}", unit_name.replace('.', "/"))
}

/// Java `String.hashCode` over the UTF-16 code units of `name`
pub fn name_hash(name: &str) -> i32 {
    name.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// First UTF-16 code unit of `name`, used to shard the registry
pub fn shard_key(name: &str) -> Option<u16> {
    name.encode_utf16().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxing_table() {
        assert_eq!(Primitive::Int.boxed_name(), "java.lang.Integer");
        assert_eq!(Primitive::Char.boxed_name(), "java.lang.Character");
        assert_eq!(
            Primitive::from_boxed_name("java.lang.Boolean"),
            Some(Primitive::Boolean)
        );
        assert_eq!(Primitive::from_boxed_name("java.lang.String"), None);
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_u8(p.to_u8()), Some(p));
            assert_eq!(Primitive::from_keyword(p.keyword()), Some(p));
        }
    }

    #[test]
    fn test_strip_array() {
        assert_eq!(strip_array("int[][]"), ("int", 2));
        assert_eq!(strip_array("a.B"), ("a.B", 0));
        assert_eq!(component_of("a.B[][]"), Some("a.B[]"));
        assert!(is_array("long[]"));
        assert!(!is_primitive("long[]"));
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("com.example.Outer$Inner"), "Inner");
        assert_eq!(simple_name("com.example.Foo"), "Foo");
        assert_eq!(simple_name("Foo"), "Foo");
    }

    #[test]
    fn test_generated_unit_names() {
        assert_eq!(generated_unit_name("a.B"), "a.B$Likeness");
        assert_eq!(
            generated_unit_name("java.util.List"),
            "likeness.generated.jdk.java.util.List$Likeness"
        );
        assert_eq!(unit_path("a.B$Likeness"), "a/B$Likeness.lku");
        assert_eq!(
            service_entry_path(),
            "META-INF/services/likeness.provider.Provider"
        );
    }

    #[test]
    fn test_name_hash_matches_java() {
        assert_eq!(name_hash(""), 0);
        assert_eq!(name_hash("a"), 97);
        // "hello".hashCode() on the JVM
        assert_eq!(name_hash("hello"), 99_162_322);
        // Overflow wraps like the JVM: "java.lang.String".hashCode()
        assert_eq!(name_hash("java.lang.String"), 1_195_259_493);
        assert_eq!(shard_key("a.B"), Some('a' as u16));
        assert_eq!(shard_key(""), None);
    }
}
