// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Declarative macro for strongly-typed bitflag sets.

/// Defines a `Copy` bitflag set with named constants, set operations and a
/// readable `Debug` output such as `BindFlags { VERTEX_BUFFER | COPY_DST }`.
#[macro_export]
#[doc(hidden)]
macro_rules! prism_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// The empty set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Builds a set from raw bits, keeping bits that name no flag.
            pub const fn from_bits_retain(bits: $ty) -> Self {
                Self { bits }
            }

            /// Raw value of the set.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if `self` and `other` share at least one flag.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Sets or clears the flags of `other` depending on `value`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// Returns a copy with the flags of `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns a copy with the flags of `other` cleared.
            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::BitXor for $name {
            type Output = Self;
            fn bitxor(self, other: Self) -> Self {
                Self { bits: self.bits ^ other.bits }
            }
        }

        impl core::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self { bits: !self.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, other: Self) {
                self.bits &= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut first = true;
                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    let value: $ty = $flag_value;
                    if value != 0 && (remaining & value) == value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        remaining &= !value;
                        first = false;
                    }
                )*
                if remaining != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "UNKNOWN({:#x})", remaining)?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    prism_bitflags! {
        struct AccessFlags: u8 {
            const READ = 1 << 0;
            const WRITE = 1 << 1;
            const EXEC = 1 << 2;
            const READ_WRITE = (1 << 0) | (1 << 1);
        }
    }

    #[test]
    fn test_empty_set_debug() {
        assert!(AccessFlags::default().is_empty());
        assert_eq!(format!("{:?}", AccessFlags::EMPTY), "AccessFlags { EMPTY }");
    }

    #[test]
    fn test_composite_flag_consumes_its_bits_once() {
        let flags = AccessFlags::READ | AccessFlags::WRITE;
        assert_eq!(flags, AccessFlags::READ_WRITE);
        assert_eq!(format!("{:?}", flags), "AccessFlags { READ | WRITE }");
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let flags = AccessFlags::from_bits_retain(0x81);
        assert!(flags.contains(AccessFlags::READ));
        assert_eq!(format!("{:?}", flags), "AccessFlags { READ | UNKNOWN(0x80) }");
    }

    #[test]
    fn test_set_and_without() {
        let mut flags = AccessFlags::READ;
        flags.set(AccessFlags::EXEC, true);
        assert!(flags.intersects(AccessFlags::EXEC));
        flags.set(AccessFlags::READ, false);
        assert_eq!(flags, AccessFlags::EXEC);
        assert_eq!(AccessFlags::READ_WRITE.without(AccessFlags::WRITE), AccessFlags::READ);
        assert!(!AccessFlags::READ.contains(AccessFlags::READ_WRITE));
    }
}
