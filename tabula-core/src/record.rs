//! Record types and their statically known fields.
//!
//! The fields a record type exposes are collected at compile time, either by
//! the [`record!`](crate::record) macro or by a hand-written [`RecordType`]
//! impl. Nothing is discovered at runtime.

/// Static description of a record type.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordInfo {
    /// Fully-qualified type name; the metadata cache key.
    pub type_name: &'static str,
    /// Source table the record is persisted in.
    pub source: &'static str,
    /// Fields exposed on the in-memory type, in declaration order.
    pub column_properties: &'static [&'static str],
}

/// A persisted record type.
pub trait RecordType {
    fn record_info() -> &'static RecordInfo;
}

/// How a caller names a record type: by a live instance, by its static info,
/// or by its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef<'a> {
    Info(&'static RecordInfo),
    Name(&'a str),
}

impl<'a> RecordRef<'a> {
    /// Reference a record type without an instance.
    pub fn of<T: RecordType>() -> Self {
        RecordRef::Info(T::record_info())
    }

    /// The cache key this reference resolves to.
    pub fn type_name(&self) -> &'a str {
        match self {
            RecordRef::Info(info) => info.type_name,
            RecordRef::Name(name) => name,
        }
    }
}

impl<'a, T: RecordType> From<&'a T> for RecordRef<'a> {
    fn from(_: &'a T) -> Self {
        RecordRef::Info(T::record_info())
    }
}

impl<'a> From<&'a str> for RecordRef<'a> {
    fn from(name: &'a str) -> Self {
        RecordRef::Name(name)
    }
}

impl From<&'static RecordInfo> for RecordRef<'_> {
    fn from(info: &'static RecordInfo) -> Self {
        RecordRef::Info(info)
    }
}

/// Declare a record struct and implement [`RecordType`] for it.
///
/// Every declared field becomes a column property. The type name is
/// `module_path!()::Name`.
///
/// ```
/// tabula_core::record! {
///     #[table = "robots"]
///     #[derive(Debug, Clone, Default)]
///     pub struct Robot {
///         pub id: i64,
///         pub name: String,
///     }
/// }
///
/// use tabula_core::RecordType;
/// assert_eq!(Robot::record_info().source, "robots");
/// assert_eq!(Robot::record_info().column_properties, &["id", "name"]);
/// ```
#[macro_export]
macro_rules! record {
    (
        #[table = $source:literal]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field : $ty ),*
        }

        impl $crate::RecordType for $name {
            fn record_info() -> &'static $crate::RecordInfo {
                static INFO: $crate::RecordInfo = $crate::RecordInfo {
                    type_name: concat!(module_path!(), "::", stringify!($name)),
                    source: $source,
                    column_properties: &[$(stringify!($field)),*],
                };
                &INFO
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[table = "robots"]
        #[derive(Debug, Default)]
        pub struct Robot {
            pub id: i64,
            /// Display name.
            pub name: String,
            pub year: i32,
        }
    }

    struct Manual;

    impl RecordType for Manual {
        fn record_info() -> &'static RecordInfo {
            static INFO: RecordInfo = RecordInfo {
                type_name: "manual::Manual",
                source: "manual",
                column_properties: &[],
            };
            &INFO
        }
    }

    #[test]
    fn test_macro_collects_fields_in_order() {
        let info = Robot::record_info();
        assert_eq!(info.source, "robots");
        assert_eq!(info.column_properties, &["id", "name", "year"]);
        assert!(info.type_name.ends_with("::Robot"));
        assert!(info.type_name.starts_with("tabula_core"));
    }

    #[test]
    fn test_instance_and_name_resolve_to_same_key() {
        let robot = Robot::default();
        let by_instance = RecordRef::from(&robot);
        let by_name = RecordRef::from(Robot::record_info().type_name);
        assert_eq!(by_instance.type_name(), by_name.type_name());
        assert_eq!(RecordRef::of::<Robot>(), by_instance);
    }

    #[test]
    fn test_manual_impl() {
        assert_eq!(RecordRef::of::<Manual>().type_name(), "manual::Manual");
        assert!(Manual::record_info().column_properties.is_empty());
    }
}
