//! Triangles: structural faces over three points, each edge backed by a spring.

use super::points::ElementIndex;

#[derive(Debug, Default)]
pub struct Triangles {
    is_deleted: Vec<bool>,
    endpoints: Vec<[ElementIndex; 3]>,
    sub_springs: Vec<[ElementIndex; 3]>,
}

impl Triangles {
    pub fn new() -> Self {
        Self::default()
    }

    /// `sub_springs[i]` joins `points[i]` and `points[(i + 1) % 3]`.
    pub fn add(&mut self, points: [ElementIndex; 3], sub_springs: [ElementIndex; 3]) -> ElementIndex {
        self.is_deleted.push(false);
        self.endpoints.push(points);
        self.sub_springs.push(sub_springs);
        self.is_deleted.len() - 1
    }

    pub fn len(&self) -> usize {
        self.is_deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_deleted.is_empty()
    }

    pub fn is_deleted(&self, triangle_index: ElementIndex) -> bool {
        self.is_deleted[triangle_index]
    }

    pub fn points(&self, triangle_index: ElementIndex) -> [ElementIndex; 3] {
        self.endpoints[triangle_index]
    }

    pub fn sub_springs(&self, triangle_index: ElementIndex) -> [ElementIndex; 3] {
        self.sub_springs[triangle_index]
    }

    pub fn active(&self) -> impl Iterator<Item = ElementIndex> + '_ {
        (0..self.len()).filter(|&t| !self.is_deleted[t])
    }

    pub fn active_count(&self) -> usize {
        self.is_deleted.iter().filter(|deleted| !**deleted).count()
    }

    /// Returns false when already deleted.
    pub(crate) fn mark_deleted(&mut self, triangle_index: ElementIndex) -> bool {
        !std::mem::replace(&mut self.is_deleted[triangle_index], true)
    }

    /// Returns false when not deleted.
    pub(crate) fn restore(&mut self, triangle_index: ElementIndex) -> bool {
        std::mem::replace(&mut self.is_deleted[triangle_index], false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstones_keep_indices_stable() {
        let mut triangles = Triangles::new();
        let first = triangles.add([0, 1, 2], [0, 1, 2]);
        let second = triangles.add([1, 3, 2], [3, 4, 1]);
        assert!(triangles.mark_deleted(first));
        assert!(!triangles.mark_deleted(first));
        assert_eq!(triangles.active().collect::<Vec<_>>(), vec![second]);
        assert_eq!(triangles.points(second), [1, 3, 2]);
        assert!(triangles.restore(first));
        assert!(!triangles.restore(first));
        assert_eq!(triangles.active_count(), 2);
    }
}
