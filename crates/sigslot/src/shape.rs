#![forbid(unsafe_code)]

//! Callback shape tags.
//!
//! A signal of argument type `A` only accepts callbacks of type `Fn(&A)`.
//! The hub stores signals of many argument types under one map, so every
//! erased entry carries a [`Shape`] that is compared before any downcast.

use std::any::TypeId;
use std::fmt;

/// Runtime tag for the argument type of a signal or connection.
#[derive(Clone, Copy)]
pub struct Shape {
    id: TypeId,
    name: &'static str,
}

impl Shape {
    /// Shape of callbacks taking `&A`.
    #[must_use]
    pub fn of<A: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: std::any::type_name::<A>(),
        }
    }

    /// Human-readable name of the argument type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Whether this shape describes `A`.
    #[must_use]
    pub fn is<A: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<A>()
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Shape {}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({})", self.name)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fn(&{})", self.name)
    }
}
