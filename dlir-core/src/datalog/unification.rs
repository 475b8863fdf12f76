//! Matching of atoms against stored tuples
//!
//! Rules are evaluated over compiled atoms whose arguments are [`Slot`]s:
//! constants, numbered variables, or the anonymous `_`. A [`Bindings`]
//! vector holds the value of every numbered variable of one partial
//! instantiation of a rule body.

use super::types::{Atom, Substitution, Term};
use crate::types::Constant;

/// Values of a rule's variables, indexed by variable number
pub type Bindings = Vec<Option<Constant>>;

/// A compiled term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Fixed value
    Constant(Constant),
    /// Variable number within its rule
    Variable(usize),
    /// Matches anything and binds nothing
    Anonymous,
}

impl Slot {
    /// Value of the slot under `bindings`, if it has one
    pub fn resolve<'a>(&'a self, bindings: &'a Bindings) -> Option<&'a Constant> {
        match self {
            Slot::Constant(value) => Some(value),
            Slot::Variable(index) => bindings[*index].as_ref(),
            Slot::Anonymous => None,
        }
    }
}

/// Extend `bindings` so that `slots` matches `tuple`
///
/// Bound variables and constants must agree with the tuple; unbound
/// variables are bound, and a variable repeated within `slots` must match
/// equal values.
pub fn extend_bindings(slots: &[Slot], tuple: &[Constant], bindings: &Bindings) -> Option<Bindings> {
    if slots.len() != tuple.len() {
        return None;
    }

    let mut extended = bindings.clone();
    for (slot, value) in slots.iter().zip(tuple) {
        match slot {
            Slot::Constant(expected) => {
                if expected != value {
                    return None;
                }
            }
            Slot::Variable(index) => match &extended[*index] {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => extended[*index] = Some(value.clone()),
            },
            Slot::Anonymous => {}
        }
    }

    Some(extended)
}

/// Check whether `slots` matches `tuple` without binding anything
///
/// Unbound variables behave like `_`.
pub fn matches(slots: &[Slot], tuple: &[Constant], bindings: &Bindings) -> bool {
    slots.len() == tuple.len()
        && slots
            .iter()
            .zip(tuple)
            .all(|(slot, value)| match slot.resolve(bindings) {
                Some(expected) => expected == value,
                None => true,
            })
}

/// Instantiate `slots` into a ground tuple; `None` if any slot is unbound
pub fn ground(slots: &[Slot], bindings: &Bindings) -> Option<Vec<Constant>> {
    slots
        .iter()
        .map(|slot| slot.resolve(bindings).cloned())
        .collect()
}

/// Unify an atom with a ground tuple of its relation
///
/// Returns the substitution for the atom's named variables; anonymous
/// variables are matched but left out of the result.
pub fn unify_atom_with_tuple(atom: &Atom, tuple: &[Constant]) -> Option<Substitution> {
    if atom.terms.len() != tuple.len() {
        return None;
    }

    let mut sub = Substitution::new();
    for (term, value) in atom.terms.iter().zip(tuple) {
        match term {
            Term::Constant(expected) => {
                if expected != value {
                    return None;
                }
            }
            Term::Variable(var) if var.is_anonymous() => {}
            Term::Variable(var) => {
                if !sub.bind(var.clone(), value.clone()) {
                    return None;
                }
            }
        }
    }

    Some(sub)
}
