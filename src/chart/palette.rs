use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLORS: [&str; 5] = ["#2563eb", "#16a34a", "#f59e0b", "#db2777", "#9333ea"];

/// Non-empty list of series colours, cycled by series position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Palette {
    colors: Vec<String>,
}

impl Palette {
    pub fn new(colors: Vec<String>) -> Result<Self> {
        if colors.is_empty() {
            bail!("palette must contain at least one colour");
        }
        Ok(Self { colors })
    }

    pub fn color_at(&self, position: usize) -> &str {
        &self.colors[position % self.colors.len()]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for Palette {
    type Error = anyhow::Error;

    fn try_from(colors: Vec<String>) -> Result<Self> {
        Palette::new(colors)
    }
}

impl From<Palette> for Vec<String> {
    fn from(palette: Palette) -> Self {
        palette.colors
    }
}
