// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Declarative counterparts of what a schema code generator would emit.
//!
//! Constructors whose parameters depend on a `flags:#` field do not fit
//! these shapes and implement the traits by hand next to their definition.

/// A bare constructor with only unconditional parameters.
macro_rules! tl_type {
    (
        $(#[$meta:meta])*
        $name:ident = $id:literal {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl crate::Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $id;
        }

        impl crate::Serializable for $name {
            #[allow(unused_variables)]
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                $( crate::Serializable::serialize(&self.$field, buf); )*
            }
        }

        impl crate::Deserializable for $name {
            #[allow(unused_variables)]
            fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
                $( let $field = <$ty as crate::Deserializable>::deserialize(buf)?; )*
                Ok(Self { $( $field, )* })
            }
        }
    };
}

/// A function with only unconditional parameters. Functions always write
/// their own constructor, since they are sent boxed.
macro_rules! tl_function {
    (
        $(#[$meta:meta])*
        $name:ident = $id:literal {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        } -> $ret:ty
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl crate::Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $id;
        }

        impl crate::Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                crate::Serializable::serialize(&<Self as crate::Identifiable>::CONSTRUCTOR_ID, buf);
                $( crate::Serializable::serialize(&self.$field, buf); )*
            }
        }

        impl crate::RemoteCall for $name {
            type Return = $ret;
        }
    };
}

/// A boxed type, which prefixes the body of its bare variants with their constructor.
macro_rules! tl_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident($ty:ty) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub enum $name {
            $( $variant($ty), )+
        }

        impl crate::Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                match self {
                    $(
                        Self::$variant(x) => {
                            crate::Serializable::serialize(&<$ty as crate::Identifiable>::CONSTRUCTOR_ID, buf);
                            crate::Serializable::serialize(x, buf)
                        }
                    )+
                }
            }
        }

        impl crate::Deserializable for $name {
            fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
                let id = <u32 as crate::Deserializable>::deserialize(buf)?;
                $(
                    if id == <$ty as crate::Identifiable>::CONSTRUCTOR_ID {
                        return Ok(Self::$variant(<$ty as crate::Deserializable>::deserialize(buf)?));
                    }
                )+
                Err(crate::deserialize::Error::UnexpectedConstructor { id })
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(x: $ty) -> Self {
                    Self::$variant(x)
                }
            }
        )+
    };
}
