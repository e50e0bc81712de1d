//! Packed flag sets for metadata entries

use bitflags::bitflags;

bitflags! {
    /// Structural flags of a type
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct ClassFlags: u32 {
        /// Declared abstract
        const ABSTRACT = 1 << 0;
        /// Sealed hierarchy
        const SEALED = 1 << 1;
        /// Data class
        const DATA = 1 << 2;
        /// Companion object
        const COMPANION = 1 << 3;
        /// Singleton object
        const OBJECT = 1 << 4;
        /// Enum type
        const ENUM = 1 << 5;
        /// Interface
        const INTERFACE = 1 << 6;
        /// A superclass name is present
        const HAS_SUPERCLASS = 1 << 7;
        /// The type could not be resolved at compile time
        const UNRESOLVED = 1 << 8;
    }
}

bitflags! {
    /// Visibility of a constructor
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct ConstructorFlags: u32 {
        /// Public
        const PUBLIC = 1 << 0;
        /// Private
        const PRIVATE = 1 << 1;
        /// Protected
        const PROTECTED = 1 << 2;
    }
}

bitflags! {
    /// Visibility and modifiers of a field
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct FieldFlags: u32 {
        /// Public
        const PUBLIC = 1 << 0;
        /// Private
        const PRIVATE = 1 << 1;
        /// Protected
        const PROTECTED = 1 << 2;
        /// Static
        const STATIC = 1 << 3;
        /// Final
        const FINAL = 1 << 4;
        /// Transient
        const TRANSIENT = 1 << 5;
        /// Volatile
        const VOLATILE = 1 << 6;
    }
}

bitflags! {
    /// Visibility and modifiers of a method
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct MethodFlags: u32 {
        /// Public
        const PUBLIC = 1 << 0;
        /// Private
        const PRIVATE = 1 << 1;
        /// Protected
        const PROTECTED = 1 << 2;
        /// Static
        const STATIC = 1 << 3;
        /// Final
        const FINAL = 1 << 4;
        /// Abstract
        const ABSTRACT = 1 << 5;
        /// Interface default method
        const DEFAULT = 1 << 6;
    }
}
