//! Pedal parameters: knob values shared between the control thread and the audio thread.
//!
//! Each knob is an [`AtomicF32`]: the control side stores, the audio side loads once per
//! block. A value is always written as a single 32-bit word, so a reader can never observe
//! half of an update. Relaxed ordering is enough here: knobs are independent of each other
//! and only need to become visible within a few blocks.
//!
//! Every effect declares its knobs with [`param_table!`], which produces a struct of
//! atomics plus a name → field dispatch table used by the control surface.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` stored in an `AtomicU32` bit pattern.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Normalize a knob write: finite values are clamped to `[0, 1]`, anything else is refused.
pub fn normalize_knob(value: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// Uniform name-based access to a pedal's knobs.
pub trait ParamTable: Send + Sync + std::fmt::Debug {
    /// Knob names in declaration order.
    fn names(&self) -> &'static [&'static str];

    /// Look up the atomic cell for a knob.
    fn slot(&self, name: &str) -> Option<&AtomicF32>;

    fn get(&self, name: &str) -> Option<f32> {
        self.slot(name).map(AtomicF32::get)
    }

    /// Write a knob. Returns `false` when the name is unknown or the value is not finite.
    fn set(&self, name: &str, value: f32) -> bool {
        match (self.slot(name), normalize_knob(value)) {
            (Some(slot), Some(v)) => {
                slot.set(v);
                true
            }
            _ => false,
        }
    }

    /// Current knob values keyed by name.
    fn values(&self) -> BTreeMap<String, f32> {
        self.names()
            .iter()
            .filter_map(|&n| self.get(n).map(|v| (n.to_string(), v)))
            .collect()
    }
}

/// Declare a knob struct: one [`AtomicF32`] field per knob, with its default value.
///
/// ```ignore
/// param_table! {
///     pub struct FuzzParams {
///         fuzz: 0.5,
///         level: 0.5,
///     }
/// }
/// ```
#[macro_export]
macro_rules! param_table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $field:ident : $default:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        $vis struct $name {
            $( pub $field: $crate::dsp::param::AtomicF32, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: $crate::dsp::param::AtomicF32::new($default), )*
                }
            }
        }

        impl $crate::dsp::param::ParamTable for $name {
            fn names(&self) -> &'static [&'static str] {
                &[$( stringify!($field) ),*]
            }

            #[allow(unused_variables)]
            fn slot(&self, name: &str) -> Option<&$crate::dsp::param::AtomicF32> {
                $(
                    if name == stringify!($field) {
                        return Some(&self.$field);
                    }
                )*
                None
            }
        }
    };
}
