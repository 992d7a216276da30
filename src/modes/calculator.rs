// RPN calculator: a stack of doubles plus the entry pad being typed
// Every operation goes through `apply`, which commits a pending entry before touching the stack

use log::debug;

use super::{FormatState, Text};
use crate::error::CalcError;
use crate::tasks::store::EpochStore;

/// Bytes of typed entry text
pub const PAD_CAPACITY: usize = 32;

/// Entry text, parsed with the active display mode on commit
pub type Pad = heapless::String<PAD_CAPACITY>;

/// One calculator input.
///
/// Stack operations first commit a non-empty pad, as its own epoch, then act
/// on the stack. Pad editing and the combined keys act on the pad alone while
/// it holds text.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    Push(f64),
    /// Remove the top value and hand it back
    Pop,
    /// Copy the value at a depth onto the top
    Pick(usize),
    /// `f(second, top)`, needs two values
    Binary(fn(f64, f64) -> f64),
    /// `f(top)`, needs one value
    Unary(fn(f64) -> f64),
    Swap,
    /// Commit the pad, or duplicate the top when the pad is empty
    EnterOrDup,
    /// Commit the pad, pushing 0 when it does not parse
    EnterOrZero,
    /// Erase the last typed character, or drop the top when the pad is empty
    BackspaceOrDrop,
    PadAppend(char),
    PadBackspace,
    SetFormat(FormatState),
    /// Empty both the stack and the pad
    Clear,
    /// Clear the pad, or step the stack back one epoch when the pad is empty
    Undo,
}

/// What an applied operation did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Changed,
    Unchanged,
    /// The value removed by [`Operation::Pop`]
    Popped(f64),
    /// Undo found nothing older to return to
    AtOldest,
}

/// Pad and formatting of one session. The stack itself lives in the
/// [`EpochStore`] handed to every operation.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    pad: Pad,
    format: FormatState,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume with a pad and format kept from an earlier session
    pub fn with_state(pad: Pad, format: FormatState) -> Self {
        Self { pad, format }
    }

    pub fn pad(&self) -> &str {
        &self.pad
    }

    pub fn format(&self) -> &FormatState {
        &self.format
    }

    /// Journal the pad as it stands, for storage that is just catching up
    pub fn record_pad(&self, store: &mut EpochStore) {
        store.record_pad(&self.pad);
    }

    /// Render `value` with the active format
    pub fn render(&self, value: f64) -> Text {
        self.format.format(value)
    }

    /// Rendered stack value at `depth`, if the stack is that deep
    pub fn display(&self, store: &EpochStore, depth: usize) -> Option<Text> {
        store.current().get(depth).map(|value| self.render(value))
    }

    pub fn apply(&mut self, store: &mut EpochStore, op: Operation) -> Result<Outcome, CalcError> {
        debug!("Applying {op:?}");

        match op {
            Operation::PadAppend(ch) => {
                self.pad.push(ch).map_err(|_| CalcError::PadFull)?;
                store.record_pad(&self.pad);
                Ok(Outcome::Changed)
            }
            Operation::PadBackspace => Ok(self.erase(store)),
            Operation::EnterOrDup => {
                if self.commit(store, false)? {
                    return Ok(Outcome::Changed);
                }

                Ok(mutate(store, |stack| match stack.first() {
                    Some(&top) => {
                        stack.insert(0, top);
                        true
                    }
                    None => false,
                }))
            }
            Operation::EnterOrZero => {
                let committed = self.commit(store, true)?;
                Ok(changed(committed))
            }
            Operation::BackspaceOrDrop => {
                if !self.pad.is_empty() {
                    return Ok(self.erase(store));
                }

                Ok(mutate(store, |stack| {
                    if stack.is_empty() {
                        return false;
                    }
                    stack.remove(0);
                    true
                }))
            }
            Operation::Undo => {
                if !self.pad.is_empty() {
                    self.pad.clear();
                    store.record_pad(&self.pad);
                    return Ok(Outcome::Changed);
                }

                if store.rollback() {
                    Ok(Outcome::AtOldest)
                } else {
                    Ok(Outcome::Changed)
                }
            }
            Operation::Clear => {
                let had_pad = !self.pad.is_empty();
                if had_pad {
                    self.pad.clear();
                    store.record_pad(&self.pad);
                }

                let cleared = mutate(store, |stack| {
                    let had_values = !stack.is_empty();
                    stack.clear();
                    had_values
                });

                Ok(if had_pad { Outcome::Changed } else { cleared })
            }
            Operation::SetFormat(format) => {
                self.commit(store, false)?;
                self.format = format;
                Ok(Outcome::Changed)
            }
            stack_op => {
                // Reject a pick out of range before the pad is committed
                if let Operation::Pick(at) = stack_op {
                    let depth = store.current().depth() + usize::from(!self.pad.is_empty());
                    if at >= depth {
                        return Err(CalcError::StackUnderflow {
                            needed: at.saturating_add(1),
                            depth,
                        });
                    }
                }

                let committed = self.commit(store, false)?;
                let outcome = apply_to_stack(store, stack_op)?;

                Ok(match outcome {
                    Outcome::Unchanged => changed(committed),
                    outcome => outcome,
                })
            }
        }
    }

    pub fn push(&mut self, store: &mut EpochStore, value: f64) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::Push(value))
    }

    /// Remove and return the top value, an error on an empty stack
    pub fn pop(&mut self, store: &mut EpochStore) -> Result<f64, CalcError> {
        match self.apply(store, Operation::Pop)? {
            Outcome::Popped(value) => Ok(value),
            _ => Err(CalcError::StackUnderflow {
                needed: 1,
                depth: store.current().depth(),
            }),
        }
    }

    pub fn pick(&mut self, store: &mut EpochStore, depth: usize) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::Pick(depth))
    }

    pub fn binop(&mut self, store: &mut EpochStore, f: fn(f64, f64) -> f64) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::Binary(f))
    }

    pub fn unop(&mut self, store: &mut EpochStore, f: fn(f64) -> f64) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::Unary(f))
    }

    pub fn swap(&mut self, store: &mut EpochStore) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::Swap)
    }

    pub fn enter_or_dup(&mut self, store: &mut EpochStore) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::EnterOrDup)
    }

    pub fn backspace_or_drop(&mut self, store: &mut EpochStore) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::BackspaceOrDrop)
    }

    pub fn pad_append(&mut self, store: &mut EpochStore, ch: char) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::PadAppend(ch))
    }

    pub fn pad_backspace(&mut self, store: &mut EpochStore) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::PadBackspace)
    }

    pub fn set_format(&mut self, store: &mut EpochStore, format: FormatState) -> Result<Outcome, CalcError> {
        self.apply(store, Operation::SetFormat(format))
    }

    /// Parse the pad onto the stack as a new epoch and clear it.
    ///
    /// With `zero_on_error` a pad that does not parse commits 0, otherwise
    /// the parse error is returned and pad and stack stay as they were.
    fn commit(&mut self, store: &mut EpochStore, zero_on_error: bool) -> Result<bool, CalcError> {
        if self.pad.is_empty() {
            return Ok(false);
        }

        let value = match self.format.parse(&self.pad) {
            Ok(value) => value,
            Err(e) if zero_on_error => {
                debug!("Entry {:?} does not parse ({e}), entering 0", self.pad.as_str());
                0.0
            }
            Err(e) => return Err(e.into()),
        };

        self.pad.clear();
        store.record_pad(&self.pad);
        mutate(store, |stack| {
            stack.insert(0, value);
            true
        });

        Ok(true)
    }

    fn erase(&mut self, store: &mut EpochStore) -> Outcome {
        if self.pad.pop().is_none() {
            return Outcome::Unchanged;
        }

        store.record_pad(&self.pad);
        Outcome::Changed
    }
}

/// Stack effect of an operation the pad is not involved in
fn apply_to_stack(store: &mut EpochStore, op: Operation) -> Result<Outcome, CalcError> {
    let depth = store.current().depth();

    let outcome = match op {
        Operation::Push(value) => mutate(store, |stack| {
            stack.insert(0, value);
            true
        }),
        Operation::Pop => {
            let top = store
                .current()
                .get(0)
                .ok_or(CalcError::StackUnderflow { needed: 1, depth })?;
            mutate(store, |stack| {
                stack.remove(0);
                true
            });
            Outcome::Popped(top)
        }
        Operation::Pick(at) => {
            let value = store.current().get(at).ok_or(CalcError::StackUnderflow {
                needed: at.saturating_add(1),
                depth,
            })?;
            mutate(store, |stack| {
                stack.insert(0, value);
                true
            })
        }
        Operation::Binary(f) => mutate(store, |stack| {
            if stack.len() < 2 {
                return false;
            }
            let top = stack.remove(0);
            stack[0] = f(stack[0], top);
            true
        }),
        Operation::Unary(f) => mutate(store, |stack| match stack.first_mut() {
            Some(top) => {
                *top = f(*top);
                true
            }
            None => false,
        }),
        Operation::Swap => mutate(store, |stack| {
            if stack.len() < 2 {
                return false;
            }
            stack.swap(0, 1);
            true
        }),
        _ => Outcome::Unchanged,
    };

    Ok(outcome)
}

/// Run `f` on a copy of the current stack and append the copy as the next
/// epoch when `f` reports a change
fn mutate(store: &mut EpochStore, f: impl FnOnce(&mut Vec<f64>) -> bool) -> Outcome {
    let mut stack = store.current().values().to_vec();
    if !f(&mut stack) {
        return Outcome::Unchanged;
    }

    store.append(stack);
    Outcome::Changed
}

fn changed(did_change: bool) -> Outcome {
    if did_change { Outcome::Changed } else { Outcome::Unchanged }
}

/// Functions for [`Operation::Binary`] and [`Operation::Unary`].
/// IEEE-754 throughout: division by zero gives infinity, domain errors NaN.
pub mod ops {
    pub fn add(x: f64, y: f64) -> f64 {
        x + y
    }

    pub fn sub(x: f64, y: f64) -> f64 {
        x - y
    }

    pub fn mul(x: f64, y: f64) -> f64 {
        x * y
    }

    pub fn div(x: f64, y: f64) -> f64 {
        x / y
    }

    /// `x` raised to `y`
    pub fn pow(x: f64, y: f64) -> f64 {
        x.powf(y)
    }

    pub fn neg(x: f64) -> f64 {
        -x
    }

    pub fn recip(x: f64) -> f64 {
        1.0 / x
    }

    pub fn sqrt(x: f64) -> f64 {
        x.sqrt()
    }

    pub fn ln(x: f64) -> f64 {
        x.ln()
    }

    pub fn square(x: f64) -> f64 {
        x * x
    }
}
