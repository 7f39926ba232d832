use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A candidate bounding box `(x, y, w, h)` relative to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProposalRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl ProposalRect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// True when the rect is non-empty and lies entirely inside a
    /// `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.w > 0
            && self.h > 0
            && self.x as u64 + self.w as u64 <= width as u64
            && self.y as u64 + self.h as u64 <= height as u64
    }
}

impl fmt::Display for ProposalRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.w, self.h)
    }
}

/// Parses `x,y,w,h`. Commas and whitespace are both accepted as separators.
impl FromStr for ProposalRect {
    type Err = ProposalError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.len() != 4 {
            return Err(ProposalError::Malformed {
                line: line.to_string(),
                fields: fields.len(),
            });
        }

        let mut values = [0u32; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse().map_err(|_| ProposalError::BadNumber {
                line: line.to_string(),
                field: field.to_string(),
            })?;
        }
        let [x, y, w, h] = values;
        if w == 0 || h == 0 {
            return Err(ProposalError::Empty(line.to_string()));
        }
        Ok(Self { x, y, w, h })
    }
}

/// Proposals in the ranking order produced by the segmentation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalSet(Vec<ProposalRect>);

impl ProposalSet {
    pub fn new(rects: Vec<ProposalRect>) -> Self {
        Self(rects)
    }

    /// Parse one rect per line, skipping blank lines.
    pub fn parse_lines(text: &str) -> Result<Self, ProposalError> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ProposalRect::from_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProposalRect> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProposalRect> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ProposalRect] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ProposalRect> {
        self.0
    }
}

impl FromIterator<ProposalRect> for ProposalSet {
    fn from_iter<I: IntoIterator<Item = ProposalRect>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ProposalSet {
    type Item = &'a ProposalRect;
    type IntoIter = std::slice::Iter<'a, ProposalRect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    #[error("malformed rect {line:?}: expected 4 fields (x, y, w, h), got {fields}")]
    Malformed { line: String, fields: usize },
    #[error("malformed rect {line:?}: {field:?} is not a non-negative integer")]
    BadNumber { line: String, field: String },
    #[error("malformed rect {0:?}: width and height must be positive")]
    Empty(String),
}
