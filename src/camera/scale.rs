use serde::{Deserialize, Serialize};

/// Ordered exposure values of a camera, darkest (shortest) first.
///
/// Exposure identity is the position on this scale, not the display string:
/// two labels that resolve to the same step compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureScale {
    values: Vec<String>,
}

impl ExposureScale {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.values.get(position).map(String::as_str)
    }

    /// Position of a value, tolerating surrounding whitespace
    pub fn position(&self, value: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v == value)
            .or_else(|| {
                let trimmed = value.trim();
                self.values.iter().position(|v| v.trim() == trimmed)
            })
    }

    pub fn darker(&self, value: &str) -> Option<&str> {
        let position = self.position(value)?;
        position.checked_sub(1).and_then(|p| self.get(p))
    }

    pub fn brighter(&self, value: &str) -> Option<&str> {
        let position = self.position(value)?;
        self.get(position + 1)
    }

    /// Whether two labels designate the same exposure step
    pub fn same_step(&self, a: &str, b: &str) -> bool {
        match (self.position(a), self.position(b)) {
            (Some(pa), Some(pb)) => pa == pb,
            _ => a.trim() == b.trim(),
        }
    }

    /// Number of steps between two values
    pub fn distance(&self, a: &str, b: &str) -> Option<usize> {
        let pa = self.position(a)?;
        let pb = self.position(b)?;
        Some(pa.abs_diff(pb))
    }

    /// Values strictly between `first` and `last`, every `gap` steps starting
    /// from `first`. Walks in whichever direction leads to `last`.
    pub fn walk(&self, first: &str, last: &str, gap: usize) -> Option<Vec<String>> {
        let from = self.position(first)?;
        let to = self.position(last)?;
        if gap == 0 {
            return None;
        }

        let mut values = Vec::new();
        if from < to {
            let mut p = from + gap;
            while p < to {
                values.push(self.values[p].clone());
                p += gap;
            }
        } else {
            let mut p = from;
            while p >= to + gap + 1 {
                p -= gap;
                values.push(self.values[p].clone());
            }
        }
        Some(values)
    }
}
