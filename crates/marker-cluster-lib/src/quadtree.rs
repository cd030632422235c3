//! Point quadtree over the unit-square world
//!
//! Items are stored at leaf nodes; a leaf splits into four children once it holds more
//! than [`MAX_ELEMENTS`] entries. Range searches prune whole subtrees whose bounds do
//! not intersect the query rectangle.

use crate::geometry::{rect_contains, rects_intersect};
use geo::{Coord, Point, Rect};

/// Maximum number of entries a leaf holds before it is split
pub const MAX_ELEMENTS: usize = 50;

/// Maximum depth of the quadtree to prevent unbounded splitting of coincident points
const MAX_DEPTH: u32 = 40;

/// An item together with its projected world point
#[derive(Debug, Clone, PartialEq)]
pub struct QuadItem<T> {
    pub item: T,
    pub point: Point<f64>,
}

/// Spatial index for point items
#[derive(Debug, Clone)]
pub struct PointQuadtree<T> {
    root: QuadtreeNode<T>,
    len: usize,
}

/// A single node of the tree
#[derive(Debug, Clone)]
struct QuadtreeNode<T> {
    /// Bounds covered by this node
    bounding_box: Rect<f64>,
    /// Depth level in the tree (0 = root)
    level: u32,
    /// Entries stored here (only while this node is a leaf)
    items: Vec<QuadItem<T>>,
    /// Child nodes (NW, NE, SW, SE) if split
    children: Option<Box<[QuadtreeNode<T>; 4]>>,
}

impl<T: Clone + PartialEq> Default for PointQuadtree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> PointQuadtree<T> {
    /// Create an empty tree covering the unit square
    pub fn new() -> Self {
        Self::with_bounds(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }))
    }

    /// Create an empty tree covering custom bounds
    pub fn with_bounds(bounds: Rect<f64>) -> Self {
        Self {
            root: QuadtreeNode::new(bounds, 0),
            len: 0,
        }
    }

    /// Insert an item at `point`
    ///
    /// Returns `false` (and stores nothing) if the point is outside the tree bounds.
    pub fn insert(&mut self, item: T, point: Point<f64>) -> bool {
        if !rect_contains(&self.root.bounding_box, point) {
            return false;
        }
        self.root.insert(QuadItem { item, point });
        self.len += 1;
        true
    }

    /// Remove one entry equal to `item` stored at `point`
    pub fn remove(&mut self, item: &T, point: Point<f64>) -> bool {
        if !rect_contains(&self.root.bounding_box, point) {
            return false;
        }
        let removed = self.root.remove(item, point);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.root = QuadtreeNode::new(self.root.bounding_box, 0);
        self.len = 0;
    }

    /// All entries whose point lies within `bounds` (edges inclusive)
    pub fn search(&self, bounds: Rect<f64>) -> Vec<&QuadItem<T>> {
        let mut results = Vec::new();
        self.root.search(bounds, &mut results);
        results
    }

    /// Number of stored entries
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Clone + PartialEq> QuadtreeNode<T> {
    fn new(bounding_box: Rect<f64>, level: u32) -> Self {
        Self {
            bounding_box,
            level,
            items: Vec::new(),
            children: None,
        }
    }

    /// Index of the child quadrant containing `point`
    #[inline]
    fn quadrant(&self, point: Point<f64>) -> usize {
        let center = self.bounding_box.center();
        let east = point.x() >= center.x;
        let upper = point.y() >= center.y;
        match (upper, east) {
            (true, false) => 0,
            (true, true) => 1,
            (false, false) => 2,
            (false, true) => 3,
        }
    }

    fn insert(&mut self, entry: QuadItem<T>) {
        let quadrant = self.quadrant(entry.point);
        if let Some(children) = &mut self.children {
            children[quadrant].insert(entry);
            return;
        }

        self.items.push(entry);
        if self.items.len() > MAX_ELEMENTS && self.level < MAX_DEPTH {
            self.split();
        }
    }

    /// Subdivide this leaf into 4 children and push its entries down
    fn split(&mut self) {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let mid = self.bounding_box.center();
        let child_level = self.level + 1;

        // Create 4 children: NW, NE, SW, SE
        let nw = QuadtreeNode::new(
            Rect::new(Coord { x: min.x, y: mid.y }, Coord { x: mid.x, y: max.y }),
            child_level,
        );
        let ne = QuadtreeNode::new(
            Rect::new(Coord { x: mid.x, y: mid.y }, Coord { x: max.x, y: max.y }),
            child_level,
        );
        let sw = QuadtreeNode::new(
            Rect::new(Coord { x: min.x, y: min.y }, Coord { x: mid.x, y: mid.y }),
            child_level,
        );
        let se = QuadtreeNode::new(
            Rect::new(Coord { x: mid.x, y: min.y }, Coord { x: max.x, y: mid.y }),
            child_level,
        );

        let mut children = Box::new([nw, ne, sw, se]);
        for entry in std::mem::take(&mut self.items) {
            let quadrant = self.quadrant(entry.point);
            children[quadrant].insert(entry);
        }
        self.children = Some(children);
    }

    fn remove(&mut self, item: &T, point: Point<f64>) -> bool {
        let quadrant = self.quadrant(point);
        if let Some(children) = &mut self.children {
            return children[quadrant].remove(item, point);
        }

        match self
            .items
            .iter()
            .position(|entry| entry.item == *item && entry.point == point)
        {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn search<'a>(&'a self, bounds: Rect<f64>, results: &mut Vec<&'a QuadItem<T>>) {
        if !rects_intersect(&self.bounding_box, &bounds) {
            return;
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.search(bounds, results);
            }
            return;
        }

        for entry in &self.items {
            if rect_contains(&bounds, entry.point) {
                results.push(entry);
            }
        }
    }
}
