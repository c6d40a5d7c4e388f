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

//! Declares the scheduler flag words (modes, pass masks, reply bits).
//!
//! Scheduler flag words pack several fields into one integer: named bits, and
//! byte-wide fields such as the modifier values carried in reply flags. The
//! generated type therefore keeps unknown bits instead of truncating them.

/// Declares a flag word type with named constants and bitwise operators.
#[macro_export]
macro_rules! cadence_bitflags {
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
            /// No flag set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Wraps a raw word. Every bit is retained.
            pub const fn from_bits(bits: $ty) -> Self {
                Self { bits }
            }

            /// Raw word.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// `true` when no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// `true` when every bit of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// `true` when `self` and `other` share at least one bit.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Keeps only the bits selected by `mask`.
            #[must_use]
            pub const fn masked(self, mask: Self) -> Self {
                Self { bits: self.bits & mask.bits }
            }

            /// Returns `self` with `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns `self` with `other` cleared.
            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }

            /// Sets `other` in place.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears `other` in place.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Sets or clears `other` depending on `value`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                self.with(other)
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                self.masked(other)
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
                self.insert(other);
            }
        }

        impl core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, other: Self) {
                self.bits &= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut rest = self.bits;
                let mut list = f.debug_set();
                $(
                    if ($flag_value != 0) && (rest & $flag_value) == $flag_value {
                        list.entry(&format_args!("{}", stringify!($flag_name)));
                        rest &= !$flag_value;
                    }
                )*
                if rest != 0 {
                    list.entry(&format_args!("{:#x}", rest));
                }
                list.finish()
            }
        }
    };
}
