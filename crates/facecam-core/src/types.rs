use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in pixel coordinates of the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clip the box to an image of the given size.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Rect::new(self.x, self.y, w, h))
    }
}

/// Integer class label assigned to an identity at training time.
pub type Label = i32;

/// Label → identity name, built fresh on every training run.
///
/// Labels are dense and zero-based, so the map is a vector indexed by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next identity and return the label it was given.
    pub fn push(&mut self, name: impl Into<String>) -> Label {
        self.names.push(name.into());
        (self.names.len() - 1) as Label
    }

    pub fn name(&self, label: Label) -> Option<&str> {
        usize::try_from(label)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx as Label, name.as_str()))
    }
}

/// Outcome of classifying one face crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Recognizer-native distance to the nearest training sample. Lower = closer.
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside() {
        let r = Rect::new(10, 10, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(r));
    }

    #[test]
    fn test_clamp_overhang() {
        let r = Rect::new(90, 95, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Rect::new(90, 95, 10, 5)));
    }

    #[test]
    fn test_clamp_outside() {
        assert_eq!(Rect::new(100, 0, 5, 5).clamp_to(100, 100), None);
        assert_eq!(Rect::new(0, 0, 0, 5).clamp_to(100, 100), None);
    }

    #[test]
    fn test_label_map_assigns_dense_labels() {
        let mut map = LabelMap::new();
        assert_eq!(map.push("alice"), 0);
        assert_eq!(map.push("bob"), 1);
        assert_eq!(map.len(), 2);
        assert_eq!(map.name(1), Some("bob"));
        assert_eq!(map.name(2), None);
        assert_eq!(map.name(-1), None);
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(pairs, vec![(0, "alice"), (1, "bob")]);
    }
}
