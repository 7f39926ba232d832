use std::fmt;
use std::str::FromStr;

/// Segmentation mode in `(f|q)[l]` form.
///
/// `f` is the fast search, `q` the high-recall quality search, and a trailing
/// `l` enables large bounding box filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub quality: bool,
    pub large: bool,
}

impl Mode {
    pub const GRAMMAR: &'static str = "(f|q)[l]";

    pub const fn new(quality: bool, large: bool) -> Self {
        Self { quality, large }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f" => Ok(Self::new(false, false)),
            "fl" => Ok(Self::new(false, true)),
            "q" => Ok(Self::new(true, false)),
            "ql" => Ok(Self::new(true, true)),
            other => Err(ModeError(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.quality { "q" } else { "f" })?;
        if self.large {
            f.write_str("l")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid mode {0:?}: expected {grammar}", grammar = Mode::GRAMMAR)]
pub struct ModeError(pub String);
