//! Type shapes: the structure of a type reference in a signature

use likeness_format::names::{self, Primitive, OBJECT};
use serde::Deserialize;

/// A type reference as written in a signature
///
/// In catalog documents a shape is either a plain string (`"int"`,
/// `"java.lang.String[]"`) or an object tagged with `"shape"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "ShapeRepr")]
pub enum TypeShape {
    /// A named type, possibly parameterized
    Named {
        /// Fully-qualified name or primitive keyword
        name: String,
        /// Type arguments
        args: Vec<TypeShape>,
    },
    /// An array of the component shape
    Array(Box<TypeShape>),
    /// A wildcard type argument
    Wildcard {
        /// `? extends` bounds
        upper: Vec<TypeShape>,
        /// `? super` bounds
        lower: Vec<TypeShape>,
    },
    /// A type variable
    Variable {
        /// Variable name
        name: String,
        /// Declared bounds
        bounds: Vec<TypeShape>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ShapeRepr {
    Plain(String),
    Structured(StructuredShape),
}

#[derive(Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
enum StructuredShape {
    Named {
        name: String,
        #[serde(default)]
        args: Vec<TypeShape>,
    },
    Array {
        component: Box<TypeShape>,
    },
    Wildcard {
        #[serde(default)]
        upper: Vec<TypeShape>,
        #[serde(default)]
        lower: Vec<TypeShape>,
    },
    Variable {
        name: String,
        #[serde(default)]
        bounds: Vec<TypeShape>,
    },
}

impl From<ShapeRepr> for TypeShape {
    fn from(repr: ShapeRepr) -> Self {
        match repr {
            ShapeRepr::Plain(text) => TypeShape::parse(&text),
            ShapeRepr::Structured(StructuredShape::Named { name, args }) => {
                TypeShape::Named { name, args }
            }
            ShapeRepr::Structured(StructuredShape::Array { component }) => {
                TypeShape::Array(component)
            }
            ShapeRepr::Structured(StructuredShape::Wildcard { upper, lower }) => {
                TypeShape::Wildcard { upper, lower }
            }
            ShapeRepr::Structured(StructuredShape::Variable { name, bounds }) => {
                TypeShape::Variable { name, bounds }
            }
        }
    }
}

impl From<&str> for TypeShape {
    fn from(text: &str) -> Self {
        TypeShape::parse(text)
    }
}

impl TypeShape {
    /// Shape of an unparameterized named type; `[]` suffixes become arrays
    pub fn parse(text: &str) -> Self {
        let (element, dims) = names::strip_array(text.trim());
        let mut shape = TypeShape::Named {
            name: element.to_owned(),
            args: Vec::new(),
        };
        for _ in 0..dims {
            shape = TypeShape::Array(Box::new(shape));
        }
        shape
    }

    /// The `void` shape
    pub fn void() -> Self {
        TypeShape::parse("void")
    }

    /// Parameterized named type
    pub fn generic(name: &str, args: Vec<TypeShape>) -> Self {
        TypeShape::Named {
            name: name.to_owned(),
            args,
        }
    }

    /// Whether this is `void`
    pub fn is_void(&self) -> bool {
        self.primitive() == Some(Primitive::Void)
    }

    /// Primitive kind, for unparameterized primitive names
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            TypeShape::Named { name, args } if args.is_empty() => Primitive::from_keyword(name),
            _ => None,
        }
    }

    /// Erased type name: arguments dropped, variables and wildcards
    /// replaced by their first bound
    pub fn erasure(&self) -> String {
        match self {
            TypeShape::Named { name, .. } => name.clone(),
            TypeShape::Array(component) => format!("{}[]", component.erasure()),
            TypeShape::Wildcard { upper, .. } => {
                upper.first().map_or_else(|| OBJECT.to_owned(), TypeShape::erasure)
            }
            TypeShape::Variable { bounds, .. } => {
                bounds.first().map_or_else(|| OBJECT.to_owned(), TypeShape::erasure)
            }
        }
    }

    /// Append every named reference type reachable inside this shape
    ///
    /// Descends into type arguments, array components and bounds.
    /// Primitives (and `void`) are skipped.
    pub fn collect_named(&self, out: &mut Vec<String>) {
        match self {
            TypeShape::Named { name, args } => {
                if !names::is_primitive(name) {
                    out.push(name.clone());
                }
                for arg in args {
                    arg.collect_named(out);
                }
            }
            TypeShape::Array(component) => component.collect_named(out),
            TypeShape::Wildcard { upper, lower } => {
                for bound in upper.iter().chain(lower) {
                    bound.collect_named(out);
                }
            }
            TypeShape::Variable { bounds, .. } => {
                for bound in bounds {
                    bound.collect_named(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arrays() {
        let shape = TypeShape::parse("int[][]");
        assert_eq!(shape.erasure(), "int[][]");
        assert_eq!(shape.primitive(), None);
        assert_eq!(TypeShape::parse("long").primitive(), Some(Primitive::Long));
        assert!(TypeShape::void().is_void());
    }

    #[test]
    fn test_collect_named_descends() {
        // Map<String, List<? extends Number>>[]
        let shape = TypeShape::Array(Box::new(TypeShape::generic(
            "java.util.Map",
            vec![
                "java.lang.String".into(),
                TypeShape::generic(
                    "java.util.List",
                    vec![TypeShape::Wildcard {
                        upper: vec!["java.lang.Number".into()],
                        lower: vec![],
                    }],
                ),
            ],
        )));
        let mut names = Vec::new();
        shape.collect_named(&mut names);
        assert_eq!(
            names,
            vec![
                "java.util.Map",
                "java.lang.String",
                "java.util.List",
                "java.lang.Number"
            ]
        );
        assert_eq!(shape.erasure(), "java.util.Map[]");
    }

    #[test]
    fn test_variable_erasure() {
        let unbounded = TypeShape::Variable {
            name: "T".into(),
            bounds: vec![],
        };
        assert_eq!(unbounded.erasure(), OBJECT);
        let bounded = TypeShape::Variable {
            name: "T".into(),
            bounds: vec!["java.lang.Comparable".into()],
        };
        assert_eq!(bounded.erasure(), "java.lang.Comparable");
    }

    #[test]
    fn test_deserialize_plain_and_structured() {
        let plain: TypeShape = serde_json::from_str("\"a.B[]\"").unwrap();
        assert_eq!(plain, TypeShape::parse("a.B[]"));

        let structured: TypeShape = serde_json::from_str(
            r#"{"shape": "named", "name": "java.util.List", "args": ["a.B"]}"#,
        )
        .unwrap();
        assert_eq!(
            structured,
            TypeShape::generic("java.util.List", vec!["a.B".into()])
        );
    }
}
