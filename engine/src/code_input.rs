//! Fixed-width verification code entry.
//!
//! Each cell holds at most one decimal digit. Edits move an abstract focus
//! pointer the way a row of single-character input widgets would: forward on
//! entry, back on delete, released once the last cell is filled.

use recover_types::{CODE_LENGTH, ValidationError, VerificationCode};

/// Where the next keystroke goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Cell(usize),
    /// The last cell was filled; the buffer is ready to submit.
    Released,
}

/// Result of a single-cell edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEdit {
    Applied(Focus),
    /// Input was not empty and not a single digit, or the index was out of
    /// range. Nothing changed.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInput {
    cells: Vec<Option<char>>,
    focus: Focus,
}

impl Default for CodeInput {
    fn default() -> Self {
        Self::with_len(CODE_LENGTH)
    }
}

impl CodeInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer with `len` cells. A zero length is bumped to one.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            cells: vec![None; len.max(1)],
            focus: Focus::Cell(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    #[must_use]
    pub fn cells(&self) -> &[Option<char>] {
        &self.cells
    }

    #[must_use]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// Apply an edit to `index`.
    ///
    /// An empty `value` clears the cell; a single ASCII digit sets it.
    pub fn set_cell(&mut self, index: usize, value: &str) -> CellEdit {
        if index >= self.cells.len() {
            return CellEdit::Rejected;
        }

        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (None, _) => {
                self.cells[index] = None;
                self.focus = Focus::Cell(index.saturating_sub(1));
            }
            (Some(digit), None) if digit.is_ascii_digit() => {
                self.cells[index] = Some(digit);
                self.focus = if index + 1 < self.cells.len() {
                    Focus::Cell(index + 1)
                } else {
                    Focus::Released
                };
            }
            _ => return CellEdit::Rejected,
        }

        CellEdit::Applied(self.focus)
    }

    /// Fill every cell from a pasted code.
    ///
    /// Accepted only when the trimmed text is exactly `len()` digits.
    pub fn paste(&mut self, text: &str) -> CellEdit {
        let trimmed = text.trim();
        let fits = trimmed.chars().count() == self.cells.len()
            && trimmed.chars().all(|c| c.is_ascii_digit());
        if !fits {
            return CellEdit::Rejected;
        }

        for (cell, digit) in self.cells.iter_mut().zip(trimmed.chars()) {
            *cell = Some(digit);
        }
        self.focus = Focus::Released;
        CellEdit::Applied(self.focus)
    }

    /// Concatenation of the non-empty cells, in order.
    #[must_use]
    pub fn assembled_code(&self) -> String {
        self.cells.iter().flatten().collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// The assembled code, if every cell is filled.
    pub fn code(&self) -> Result<VerificationCode, ValidationError> {
        if !self.is_complete() {
            return Err(ValidationError::IncompleteCode);
        }
        VerificationCode::parse(&self.assembled_code())
    }

    pub fn reset(&mut self) {
        self.cells.fill(None);
        self.focus = Focus::Cell(0);
    }
}
