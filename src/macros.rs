//! # Internal Macros
//!
//! ## zerocopy_be_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! big-endian wrapper types. Every multi-byte integer slotdb stores on disk
//! is big-endian, so the structs in `schema::persistence` are built from
//! `zerocopy::big_endian::U32` fields and expose native-order accessors
//! through this macro.
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::big_endian::U32;
//!
//! #[repr(C)]
//! struct Header {
//!     column_count: U32,
//!     primary_ordinal: U32,
//! }
//!
//! impl Header {
//!     zerocopy_be_accessors! {
//!         column_count: u32,
//!         primary_ordinal: u32,
//!     }
//! }
//! ```

/// Generates getter and setter methods for zerocopy big-endian fields.
#[macro_export]
macro_rules! zerocopy_be_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::big_endian::U32::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_be_accessors!(@impl $field, $ty);
        )*
    };
}
