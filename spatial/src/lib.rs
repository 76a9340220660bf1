#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Dynamic binary space partition answering "what is near here" queries.
//!
//! Contents are identified by a key and described by an [`Aabb`]. The index
//! never watches contents move: a move is bracketed by [`SpatialIndex::begin_move`],
//! which detaches the content and hands out a [`MoveToken`], and
//! [`SpatialIndex::end_move`], which consumes the token and re-attaches the
//! content under its new box. Subdivision depends only on the sequence of
//! operations applied, so every peer replaying the same operations builds the
//! same tree.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
};

use gridwalk_core::{Aabb, Fixed, FixedVec2, SimulationConfig};

/// Content that can describe its own key and bounding box.
pub trait Bounded {
    /// Key identifying the content inside the index.
    type Key;

    /// Key under which the content is attached.
    fn spatial_key(&self) -> Self::Key;

    /// Current bounding box of the content.
    fn bounding_box(&self) -> Aabb;
}

/// Reasons an index operation may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError<K: Debug> {
    /// Node capacity was zero.
    #[error("node capacity must be positive")]
    InvalidCapacity,
    /// Minimum node size was not positive.
    #[error("minimum node size must be positive")]
    InvalidMinNodeSize,
    /// The content is attached already.
    #[error("content {0:?} is already attached")]
    AlreadyAttached(K),
    /// The content is not attached.
    #[error("content {0:?} is not attached")]
    NotAttached(K),
    /// The bounding box is not contained in the indexed region.
    #[error("bounding box of {0:?} lies outside the indexed region")]
    OutOfRegion(K),
}

/// Proof that a content was detached for a move and must be re-attached.
#[derive(Debug)]
#[must_use = "moved content stays detached until the token is passed to end_move"]
pub struct MoveToken<K> {
    key: K,
    previous: Aabb,
}

impl<K: Copy> MoveToken<K> {
    /// Key of the content being moved.
    pub fn key(&self) -> K {
        self.key
    }

    /// Bounding box the content had before the move began.
    pub fn previous(&self) -> Aabb {
        self.previous
    }
}

/// Binary space partition over a fixed rectangular region.
#[derive(Clone, Debug)]
pub struct SpatialIndex<K> {
    root: BspNode<K>,
    limits: Limits,
    attached: BTreeMap<K, Aabb>,
}

#[derive(Clone, Copy, Debug)]
struct Limits {
    node_capacity: usize,
    min_node_size: Fixed,
}

impl Limits {
    fn can_split(&self, area: &Aabb) -> bool {
        let longest = area.width().max(area.height());
        longest >= self.min_node_size + self.min_node_size
    }
}

impl<K> SpatialIndex<K>
where
    K: Copy + Ord + Debug,
{
    /// Creates an empty index covering `region`.
    pub fn new(
        region: Aabb,
        node_capacity: usize,
        min_node_size: Fixed,
    ) -> Result<Self, SpatialError<K>> {
        if node_capacity == 0 {
            return Err(SpatialError::InvalidCapacity);
        }
        if min_node_size <= Fixed::ZERO {
            return Err(SpatialError::InvalidMinNodeSize);
        }

        Ok(Self {
            root: BspNode::leaf(region),
            limits: Limits {
                node_capacity,
                min_node_size,
            },
            attached: BTreeMap::new(),
        })
    }

    /// Creates an empty index sized by the shared simulation configuration.
    pub fn with_config(region: Aabb, config: &SimulationConfig) -> Result<Self, SpatialError<K>> {
        Self::new(
            region,
            config.node_capacity,
            Fixed::from_num(config.min_node_size),
        )
    }

    /// Region covered by the index.
    #[must_use]
    pub fn region(&self) -> Aabb {
        self.root.area
    }

    /// Inserts a content under the provided bounding box.
    pub fn attach(&mut self, key: K, bounds: Aabb) -> Result<(), SpatialError<K>> {
        if self.attached.contains_key(&key) {
            return Err(SpatialError::AlreadyAttached(key));
        }
        if !self.root.area.contains(&bounds) {
            return Err(SpatialError::OutOfRegion(key));
        }

        let _ = self.attached.insert(key, bounds);
        self.root.insert(key, &bounds, &self.attached, &self.limits);
        Ok(())
    }

    /// Inserts a content that reports its own key and bounding box.
    pub fn attach_bounded<T>(&mut self, content: &T) -> Result<(), SpatialError<K>>
    where
        T: Bounded<Key = K>,
    {
        self.attach(content.spatial_key(), content.bounding_box())
    }

    /// Removes a content, returning the bounding box it was attached under.
    pub fn detach(&mut self, key: K) -> Result<Aabb, SpatialError<K>> {
        let bounds = self
            .attached
            .remove(&key)
            .ok_or(SpatialError::NotAttached(key))?;
        let _ = self.root.remove(key, &bounds, &self.limits);
        Ok(bounds)
    }

    /// Detaches a content ahead of a bounding box change.
    pub fn begin_move(&mut self, key: K) -> Result<MoveToken<K>, SpatialError<K>> {
        let previous = self.detach(key)?;
        Ok(MoveToken { key, previous })
    }

    /// Re-attaches a moved content under its new bounding box.
    ///
    /// A box outside the indexed region is rejected and the content is
    /// restored under the box it had before the move.
    pub fn end_move(&mut self, token: MoveToken<K>, bounds: Aabb) -> Result<(), SpatialError<K>> {
        match self.attach(token.key, bounds) {
            Err(SpatialError::OutOfRegion(key)) => {
                self.attach(key, token.previous)?;
                Err(SpatialError::OutOfRegion(key))
            }
            other => other,
        }
    }

    /// Re-attaches a moved content under the box it had before the move.
    pub fn cancel_move(&mut self, token: MoveToken<K>) -> Result<(), SpatialError<K>> {
        self.attach(token.key, token.previous)
    }

    /// Reports whether the content is currently attached.
    #[must_use]
    pub fn has_content(&self, key: K) -> bool {
        self.attached.contains_key(&key)
    }

    /// Bounding box a content is attached under.
    #[must_use]
    pub fn bounds_of(&self, key: K) -> Option<Aabb> {
        self.attached.get(&key).copied()
    }

    /// Contents whose bounding box contains the point, in key order.
    #[must_use]
    pub fn contents_at(&self, point: FixedVec2) -> Vec<K> {
        let mut found = BTreeSet::new();
        self.root.collect_at(point, &self.attached, &mut found);
        found.into_iter().collect()
    }

    /// Contents whose bounding box intersects the area, in key order.
    #[must_use]
    pub fn contents_in(&self, area: &Aabb) -> Vec<K> {
        let mut found = BTreeSet::new();
        self.root.collect_in(area, &self.attached, &mut found);
        found.into_iter().collect()
    }

    /// Iterates every attached content with its bounding box, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, Aabb)> + '_ {
        self.attached.iter().map(|(key, bounds)| (*key, *bounds))
    }

    /// Number of attached contents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attached.len()
    }

    /// Reports whether no content is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    /// Number of tree nodes, counting both branches and leaves.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}

#[derive(Clone, Debug)]
struct BspNode<K> {
    area: Aabb,
    kind: NodeKind<K>,
}

#[derive(Clone, Debug)]
enum NodeKind<K> {
    Leaf(Vec<K>),
    Branch(Box<[BspNode<K>; 2]>),
}

impl<K> BspNode<K>
where
    K: Copy + Ord,
{
    fn leaf(area: Aabb) -> Self {
        Self {
            area,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    fn insert(&mut self, key: K, bounds: &Aabb, boxes: &BTreeMap<K, Aabb>, limits: &Limits) {
        let overflowing = match &mut self.kind {
            NodeKind::Branch(children) => {
                for child in children.iter_mut() {
                    if child.area.intersects(bounds) {
                        child.insert(key, bounds, boxes, limits);
                    }
                }
                false
            }
            NodeKind::Leaf(contents) => {
                contents.push(key);
                contents.len() > limits.node_capacity
            }
        };

        if overflowing && limits.can_split(&self.area) {
            self.split(boxes, limits);
        }
    }

    fn split(&mut self, boxes: &BTreeMap<K, Aabb>, limits: &Limits) {
        let Some((first, second)) = halves(&self.area) else {
            return;
        };
        let NodeKind::Leaf(contents) = &mut self.kind else {
            return;
        };
        let contents = std::mem::take(contents);

        let mut children = Box::new([BspNode::leaf(first), BspNode::leaf(second)]);
        for key in contents {
            let Some(bounds) = boxes.get(&key) else {
                continue;
            };
            for child in children.iter_mut() {
                if child.area.intersects(bounds) {
                    child.insert(key, bounds, boxes, limits);
                }
            }
        }
        self.kind = NodeKind::Branch(children);
    }

    /// Removes `key` below this node and reports whether a merge happened.
    fn remove(&mut self, key: K, bounds: &Aabb, limits: &Limits) -> bool {
        let NodeKind::Branch(children) = &mut self.kind else {
            if let NodeKind::Leaf(contents) = &mut self.kind {
                contents.retain(|candidate| *candidate != key);
            }
            return false;
        };

        let mut merged_below = false;
        for child in children.iter_mut() {
            if child.area.intersects(bounds) {
                merged_below |= child.remove(key, bounds, limits);
            }
        }
        if merged_below || !children.iter().all(BspNode::is_leaf) {
            return merged_below;
        }

        let mut union = BTreeSet::new();
        for child in children.iter() {
            if let NodeKind::Leaf(contents) = &child.kind {
                union.extend(contents.iter().copied());
            }
        }
        if union.len() > limits.node_capacity {
            return false;
        }

        self.kind = NodeKind::Leaf(union.into_iter().collect());
        true
    }

    fn collect_at(&self, point: FixedVec2, boxes: &BTreeMap<K, Aabb>, found: &mut BTreeSet<K>) {
        if !self.area.contains_point(point) {
            return;
        }
        match &self.kind {
            NodeKind::Leaf(contents) => {
                for key in contents {
                    if boxes
                        .get(key)
                        .is_some_and(|bounds| bounds.contains_point(point))
                    {
                        let _ = found.insert(*key);
                    }
                }
            }
            NodeKind::Branch(children) => {
                for child in children.iter() {
                    child.collect_at(point, boxes, found);
                }
            }
        }
    }

    fn collect_in(&self, area: &Aabb, boxes: &BTreeMap<K, Aabb>, found: &mut BTreeSet<K>) {
        if !self.area.intersects(area) {
            return;
        }
        match &self.kind {
            NodeKind::Leaf(contents) => {
                for key in contents {
                    if boxes.get(key).is_some_and(|bounds| bounds.intersects(area)) {
                        let _ = found.insert(*key);
                    }
                }
            }
            NodeKind::Branch(children) => {
                for child in children.iter() {
                    child.collect_in(area, boxes, found);
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(_) => 1,
            NodeKind::Branch(children) => {
                1 + children.iter().map(BspNode::node_count).sum::<usize>()
            }
        }
    }
}

/// Splits an area in two along its longer axis; ties split the columns.
fn halves(area: &Aabb) -> Option<(Aabb, Aabb)> {
    let min = area.min();
    let max = area.max();
    if area.width() >= area.height() {
        let mid = midpoint(min.x, max.x);
        Some((
            Aabb::new(min, FixedVec2::new(mid, max.y))?,
            Aabb::new(FixedVec2::new(mid, min.y), max)?,
        ))
    } else {
        let mid = midpoint(min.y, max.y);
        Some((
            Aabb::new(min, FixedVec2::new(max.x, mid))?,
            Aabb::new(FixedVec2::new(min.x, mid), max)?,
        ))
    }
}

fn midpoint(low: Fixed, high: Fixed) -> Fixed {
    Fixed::from_bits(low.to_bits() + (high.to_bits() - low.to_bits()) / 2)
}
