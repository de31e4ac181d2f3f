//! Bounding volume hierarchy over opaque shapes. Construction is
//! either top-down (recursive partitioning by the surface area
//! heuristic, equal counts, or the spatial midpoint) or bottom-up
//! (treelets of Morton-sorted primitives emitted independently, then
//! combined by an upper SAH pass). The finished tree is flattened
//! into a contiguous array laid out in depth-first order and walked
//! iteratively with a small fixed stack.

// std
use std::cmp::Ordering::Equal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
// others
use log::{info, warn};
use rayon::prelude::*;
// crate
use crate::core::defs::Float;
use crate::core::geometry::{bnd3_union_bnd3, bnd3_union_pnt3};
use crate::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};
use crate::core::interaction::SurfaceInteraction;
use crate::core::paramset::ParamSet;
use crate::core::shape::Shape;

const N_BUCKETS: usize = 12;
const MORTON_BITS: u32 = 10;
const MORTON_SCALE: u32 = 1 << MORTON_BITS;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SplitMethod {
    SAH,
    HLBVH,
    Middle,
    EqualCounts,
}

#[derive(Debug, Default, Copy, Clone)]
struct BVHPrimitiveInfo {
    primitive_number: usize,
    bounds: Bounds3f,
    centroid: Point3f,
}

impl BVHPrimitiveInfo {
    fn new(primitive_number: usize, bounds: Bounds3f) -> Self {
        BVHPrimitiveInfo {
            primitive_number,
            bounds,
            centroid: bounds.p_min * 0.5 + bounds.p_max * 0.5,
        }
    }
}

/// Transient build node. The build tree lives in one arena; children
/// are indices into it, so nothing is heap-allocated per node and the
/// whole arena is dropped at the end of `build()`.
#[derive(Debug, Default, Copy, Clone)]
struct BVHBuildNode {
    bounds: Bounds3f,
    children: [u32; 2],
    split_axis: u8,
    first_prim_offset: usize,
    n_primitives: usize,
}

impl BVHBuildNode {
    fn init_leaf(&mut self, first: usize, n: usize, b: &Bounds3f) {
        self.first_prim_offset = first;
        self.n_primitives = n;
        self.bounds = *b;
    }
    fn init_interior(&mut self, axis: u8, c0: u32, c1: u32, bounds: Bounds3f) {
        self.children = [c0, c1];
        self.split_axis = axis;
        self.bounds = bounds;
        self.n_primitives = 0;
    }
}

#[derive(Debug, Default, Copy, Clone)]
struct MortonPrimitive {
    primitive_index: usize,
    morton_code: u32,
}

#[derive(Debug, Copy, Clone)]
struct LBVHTreelet {
    start_index: usize,
    n_primitives: usize,
}

#[derive(Debug, Default, Copy, Clone)]
struct BucketInfo {
    count: usize,
    bounds: Bounds3f,
}

/// Flattened node, 32 bytes. `offset` stands in for the C union of
/// `primitivesOffset` (leaf) and `secondChildOffset` (interior),
/// discriminated by `n_primitives == 0`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct LinearBVHNode {
    pub bounds: Bounds3f,
    pub offset: u32,
    pub n_primitives: u16,
    pub axis: u8,
    pub pad: u8,
}

/// In-place partition; returns the number of leading elements for
/// which `pred` holds.
fn partition<T, F>(data: &mut [T], mut pred: F) -> usize
where
    F: FnMut(&T) -> bool,
{
    let mut first = 0;
    for i in 0..data.len() {
        if pred(&data[i]) {
            data.swap(first, i);
            first += 1;
        }
    }
    first
}

/// Spread the 10 low bits of `x` over every third bit of the result.
fn left_shift3(x: u32) -> u32 {
    let mut x = x;
    debug_assert!(x <= (1 << MORTON_BITS));
    if x == (1 << MORTON_BITS) {
        x -= 1;
    }
    x = (x | (x << 16)) & 0x300_00ff;
    // x = ---- --98 ---- ---- ---- ---- 7654 3210
    x = (x | (x << 8)) & 0x300_f00f;
    // x = ---- --98 ---- ---- 7654 ---- ---- 3210
    x = (x | (x << 4)) & 0x30c_30c3;
    // x = ---- --98 ---- 76-- --54 ---- 32-- --10
    x = (x | (x << 2)) & 0x924_9249;
    // x = ---- 9--8 --7- -6-- 5--4 --3- -2-- 1--0
    x
}

/// 30-bit Morton code of a point in the `[0, 2^10)^3` grid.
fn encode_morton3(v: &Vector3f) -> u32 {
    debug_assert!(v.x >= 0.0);
    debug_assert!(v.y >= 0.0);
    debug_assert!(v.z >= 0.0);
    (left_shift3(v.z as u32) << 2) | (left_shift3(v.y as u32) << 1) | left_shift3(v.x as u32)
}

/// Stable LSD radix sort of the Morton codes, 6 bits per pass.
fn radix_sort(v: &mut Vec<MortonPrimitive>) {
    let mut temp_vector = vec![MortonPrimitive::default(); v.len()];
    const BITS_PER_PASS: usize = 6;
    const N_BITS: usize = 30;
    const N_PASSES: usize = N_BITS / BITS_PER_PASS;
    for pass in 0..N_PASSES {
        // perform one pass of radix sort, sorting _BITS_PER_PASS_ bits
        let low_bit = pass * BITS_PER_PASS;
        // set in and out vector references for radix sort pass
        let (input, output): (&mut Vec<MortonPrimitive>, &mut Vec<MortonPrimitive>) =
            if pass & 1 == 1 {
                (&mut temp_vector, &mut *v)
            } else {
                (&mut *v, &mut temp_vector)
            };
        // count number of values in each bucket
        const N_SORT_BUCKETS: usize = 1 << BITS_PER_PASS;
        let mut bucket_count = [0_usize; N_SORT_BUCKETS];
        const BIT_MASK: u32 = (1 << BITS_PER_PASS) - 1;
        for mp in input.iter() {
            let bucket = ((mp.morton_code >> low_bit) & BIT_MASK) as usize;
            bucket_count[bucket] += 1;
        }
        // compute starting index in output array for each bucket
        let mut out_index = [0_usize; N_SORT_BUCKETS];
        for i in 1..N_SORT_BUCKETS {
            out_index[i] = out_index[i - 1] + bucket_count[i - 1];
        }
        // store sorted values in output array
        for mp in input.iter() {
            let bucket = ((mp.morton_code >> low_bit) & BIT_MASK) as usize;
            output[out_index[bucket]] = *mp;
            out_index[bucket] += 1;
        }
    }
    // copy final result from _temp_vector_, if needed
    if N_PASSES & 1 == 1 {
        std::mem::swap(v, &mut temp_vector);
    }
}

pub struct BVHAccel {
    max_prims_in_node: usize,
    split_method: SplitMethod,
    pub primitives: Vec<Arc<dyn Shape + Send + Sync>>,
    pub nodes: Vec<LinearBVHNode>,
    built: bool,
}

impl BVHAccel {
    pub fn new(max_prims_in_node: usize, split_method: SplitMethod) -> Self {
        assert!(max_prims_in_node > 0);
        BVHAccel {
            max_prims_in_node: std::cmp::min(max_prims_in_node, 255),
            split_method,
            primitives: Vec::new(),
            nodes: Vec::new(),
            built: false,
        }
    }
    pub fn create(ps: &ParamSet) -> Self {
        let split_method_name: String = ps.find_one_string("split_method", String::from("sah"));
        let split_method = match split_method_name.as_str() {
            "sah" => SplitMethod::SAH,
            "hlbvh" => SplitMethod::HLBVH,
            "middle" => SplitMethod::Middle,
            "equal" => SplitMethod::EqualCounts,
            _ => {
                warn!(
                    "BVH split method \"{}\" unknown.  Using \"sah\".",
                    split_method_name
                );
                SplitMethod::SAH
            }
        };
        let max_prims_in_node: i32 = ps.find_one_int("maxnodeprims", 4);
        BVHAccel::new(max_prims_in_node as usize, split_method)
    }
    /// Register shapes for inclusion in the hierarchy. Only legal
    /// before `build()`.
    pub fn add_shape(&mut self, shapes: &[Arc<dyn Shape + Send + Sync>]) {
        assert!(!self.built, "shapes cannot be added after build()");
        self.primitives.extend(shapes.iter().cloned());
    }
    /// Construct the hierarchy over everything registered so far.
    /// Must be called exactly once; queries before `build()` see an
    /// empty tree.
    pub fn build(&mut self) {
        assert!(!self.built, "build() must be called exactly once");
        self.built = true;
        if self.primitives.is_empty() {
            return;
        }
        // initialize _primitive_info_ array for primitives
        let mut primitive_info: Vec<BVHPrimitiveInfo> = self
            .primitives
            .iter()
            .enumerate()
            .map(|(i, p)| BVHPrimitiveInfo::new(i, p.world_bound()))
            .collect();
        // build BVH tree for primitives using _primitive_info_
        let mut arena: Vec<BVHBuildNode> = Vec::with_capacity(2 * self.primitives.len());
        let mut total_nodes: usize = 0;
        let mut ordered_prims: Vec<Arc<dyn Shape + Send + Sync>> =
            Vec::with_capacity(self.primitives.len());
        let root = if self.split_method == SplitMethod::HLBVH {
            self.hlbvh_build(
                &mut arena,
                &primitive_info,
                &mut total_nodes,
                &mut ordered_prims,
            )
        } else {
            let end = self.primitives.len();
            self.recursive_build(
                &mut arena,
                &mut primitive_info,
                0,
                end,
                &mut total_nodes,
                &mut ordered_prims,
            )
        };
        std::mem::swap(&mut self.primitives, &mut ordered_prims);
        drop(ordered_prims);
        drop(primitive_info);
        info!(
            "BVH created with {} nodes for {} primitives",
            total_nodes,
            self.primitives.len()
        );
        // flatten the build tree into the depth-first linear layout
        let mut nodes = vec![LinearBVHNode::default(); total_nodes];
        let mut offset: usize = 0;
        BVHAccel::flatten_bvh_tree(&arena, root, &mut nodes, &mut offset);
        assert_eq!(total_nodes, offset);
        self.nodes = nodes;
    }
    /// Root bounds of the whole scene, or an empty box for an empty
    /// hierarchy.
    pub fn world_bound(&self) -> Bounds3f {
        if !self.nodes.is_empty() {
            self.nodes[0].bounds
        } else {
            Bounds3f::default()
        }
    }
    fn recursive_build(
        &self,
        arena: &mut Vec<BVHBuildNode>,
        primitive_info: &mut Vec<BVHPrimitiveInfo>,
        start: usize,
        end: usize,
        total_nodes: &mut usize,
        ordered_prims: &mut Vec<Arc<dyn Shape + Send + Sync>>,
    ) -> u32 {
        assert_ne!(start, end);
        let node_index = arena.len() as u32;
        arena.push(BVHBuildNode::default());
        *total_nodes += 1;
        // compute bounds of all primitives in BVH node
        let mut bounds = Bounds3f::default();
        for info in &primitive_info[start..end] {
            bounds = bnd3_union_bnd3(&bounds, &info.bounds);
        }
        let n_primitives = end - start;
        if n_primitives == 1 {
            // create leaf _BVHBuildNode_
            let first_prim_offset = ordered_prims.len();
            for info in &primitive_info[start..end] {
                ordered_prims.push(self.primitives[info.primitive_number].clone());
            }
            arena[node_index as usize].init_leaf(first_prim_offset, n_primitives, &bounds);
            return node_index;
        }
        // compute bound of primitive centroids, choose split dimension _dim_
        let mut centroid_bounds = Bounds3f::default();
        for info in &primitive_info[start..end] {
            centroid_bounds = bnd3_union_pnt3(&centroid_bounds, &info.centroid);
        }
        let dim = centroid_bounds.maximum_extent();
        // partition primitives into two sets and build children
        let mut mid = (start + end) / 2;
        if centroid_bounds.p_max[dim] == centroid_bounds.p_min[dim] {
            // create leaf _BVHBuildNode_
            let first_prim_offset = ordered_prims.len();
            for info in &primitive_info[start..end] {
                ordered_prims.push(self.primitives[info.primitive_number].clone());
            }
            arena[node_index as usize].init_leaf(first_prim_offset, n_primitives, &bounds);
            return node_index;
        }
        // partition primitives based on _split_method_
        match self.split_method {
            SplitMethod::Middle => {
                // partition primitives through node's midpoint
                let pmid = (centroid_bounds.p_min[dim] + centroid_bounds.p_max[dim]) / 2.0;
                mid = start
                    + partition(&mut primitive_info[start..end], |pi| {
                        pi.centroid[dim] < pmid
                    });
                // for lots of prims with large overlapping bounding
                // boxes, this may fail to partition; in that case
                // fall through to EqualCounts
                if mid == start || mid == end {
                    mid = (start + end) / 2;
                    primitive_info[start..end].select_nth_unstable_by(mid - start, |a, b| {
                        a.centroid[dim].partial_cmp(&b.centroid[dim]).unwrap_or(Equal)
                    });
                }
            }
            SplitMethod::EqualCounts => {
                // partition primitives into equally-sized subsets
                mid = (start + end) / 2;
                primitive_info[start..end].select_nth_unstable_by(mid - start, |a, b| {
                    a.centroid[dim].partial_cmp(&b.centroid[dim]).unwrap_or(Equal)
                });
            }
            SplitMethod::SAH | SplitMethod::HLBVH => {
                if n_primitives <= 2 {
                    // partition primitives into equally-sized subsets
                    mid = (start + end) / 2;
                    primitive_info[start..end].select_nth_unstable_by(mid - start, |a, b| {
                        a.centroid[dim].partial_cmp(&b.centroid[dim]).unwrap_or(Equal)
                    });
                } else {
                    // allocate _BucketInfo_ for SAH partition buckets
                    let mut buckets = [BucketInfo::default(); N_BUCKETS];
                    // initialize _BucketInfo_ for SAH partition buckets
                    for info in &primitive_info[start..end] {
                        let mut b = (N_BUCKETS as Float
                            * centroid_bounds.offset(&info.centroid)[dim])
                            as usize;
                        if b == N_BUCKETS {
                            b = N_BUCKETS - 1;
                        }
                        assert!(b < N_BUCKETS);
                        buckets[b].count += 1;
                        buckets[b].bounds = bnd3_union_bnd3(&buckets[b].bounds, &info.bounds);
                    }
                    // compute costs for splitting after each bucket
                    let mut cost = [0.0 as Float; N_BUCKETS - 1];
                    for (i, cost_i) in cost.iter_mut().enumerate() {
                        let mut b0 = Bounds3f::default();
                        let mut b1 = Bounds3f::default();
                        let mut count0 = 0;
                        let mut count1 = 0;
                        for bucket in &buckets[0..=i] {
                            b0 = bnd3_union_bnd3(&b0, &bucket.bounds);
                            count0 += bucket.count;
                        }
                        for bucket in &buckets[i + 1..N_BUCKETS] {
                            b1 = bnd3_union_bnd3(&b1, &bucket.bounds);
                            count1 += bucket.count;
                        }
                        *cost_i = 1.0
                            + (count0 as Float * b0.surface_area()
                                + count1 as Float * b1.surface_area())
                                / bounds.surface_area();
                    }
                    // find bucket to split at that minimizes SAH metric
                    let mut min_cost = cost[0];
                    let mut min_cost_split_bucket = 0;
                    for (i, &cost_i) in cost.iter().enumerate().skip(1) {
                        if cost_i < min_cost {
                            min_cost = cost_i;
                            min_cost_split_bucket = i;
                        }
                    }
                    // either create leaf or split primitives at
                    // selected SAH bucket
                    let leaf_cost = n_primitives as Float;
                    if n_primitives > self.max_prims_in_node || min_cost < leaf_cost {
                        mid = start
                            + partition(&mut primitive_info[start..end], |pi| {
                                let mut b = (N_BUCKETS as Float
                                    * centroid_bounds.offset(&pi.centroid)[dim])
                                    as usize;
                                if b == N_BUCKETS {
                                    b = N_BUCKETS - 1;
                                }
                                b <= min_cost_split_bucket
                            });
                    } else {
                        // create leaf _BVHBuildNode_
                        let first_prim_offset = ordered_prims.len();
                        for info in &primitive_info[start..end] {
                            ordered_prims.push(self.primitives[info.primitive_number].clone());
                        }
                        arena[node_index as usize].init_leaf(
                            first_prim_offset,
                            n_primitives,
                            &bounds,
                        );
                        return node_index;
                    }
                }
            }
        }
        let c0 = self.recursive_build(arena, primitive_info, start, mid, total_nodes, ordered_prims);
        let c1 = self.recursive_build(arena, primitive_info, mid, end, total_nodes, ordered_prims);
        let interior_bounds =
            bnd3_union_bnd3(&arena[c0 as usize].bounds, &arena[c1 as usize].bounds);
        arena[node_index as usize].init_interior(dim as u8, c0, c1, interior_bounds);
        node_index
    }
    fn hlbvh_build(
        &self,
        arena: &mut Vec<BVHBuildNode>,
        primitive_info: &[BVHPrimitiveInfo],
        total_nodes: &mut usize,
        ordered_prims: &mut Vec<Arc<dyn Shape + Send + Sync>>,
    ) -> u32 {
        // compute bounding box of all primitive centroids
        let mut bounds = Bounds3f::default();
        for pi in primitive_info {
            bounds = bnd3_union_pnt3(&bounds, &pi.centroid);
        }
        // compute Morton indices of primitives
        let mut morton_prims = vec![MortonPrimitive::default(); primitive_info.len()];
        morton_prims.par_iter_mut().enumerate().for_each(|(i, mp)| {
            mp.primitive_index = primitive_info[i].primitive_number;
            let centroid_offset = bounds.offset(&primitive_info[i].centroid);
            mp.morton_code = encode_morton3(&(centroid_offset * MORTON_SCALE as Float));
        });
        // radix sort primitive Morton indices
        radix_sort(&mut morton_prims);
        // find intervals of primitives for each treelet
        let mask: u32 = 0x3ffc_0000;
        let mut treelets_to_build: Vec<LBVHTreelet> = Vec::new();
        let mut start = 0;
        for end in 1..=morton_prims.len() {
            if end == morton_prims.len()
                || ((morton_prims[start].morton_code & mask)
                    != (morton_prims[end].morton_code & mask))
            {
                // add entry to _treelets_to_build_ for this treelet
                treelets_to_build.push(LBVHTreelet {
                    start_index: start,
                    n_primitives: end - start,
                });
                start = end;
            }
        }
        // carve a disjoint node arena of 2 * n_primitives out of the
        // shared arena for each treelet
        let arena_size: usize = treelets_to_build.iter().map(|t| 2 * t.n_primitives).sum();
        arena.resize(arena_size, BVHBuildNode::default());
        let mut work: Vec<(LBVHTreelet, u32, &mut [BVHBuildNode])> =
            Vec::with_capacity(treelets_to_build.len());
        let mut rest: &mut [BVHBuildNode] = &mut arena[..];
        let mut base: u32 = 0;
        for tr in &treelets_to_build {
            let (head, tail) = rest.split_at_mut(2 * tr.n_primitives);
            work.push((*tr, base, head));
            base += 2 * tr.n_primitives as u32;
            rest = tail;
        }
        // create LBVHs for treelets in parallel; the only shared
        // state is the cursor reserving each leaf's slice of the
        // ordered primitive array
        let ordered_prims_offset = AtomicUsize::new(0);
        let results: Vec<(u32, usize, Vec<(usize, usize)>)> = work
            .into_par_iter()
            .map(|(tr, treelet_base, build_nodes)| {
                let mut nodes_created = 0_usize;
                let mut scatter: Vec<(usize, usize)> = Vec::with_capacity(tr.n_primitives);
                let first_bit_index = 29 - 12;
                let root = self.emit_lbvh(
                    build_nodes,
                    treelet_base,
                    &mut nodes_created,
                    primitive_info,
                    &morton_prims[tr.start_index..tr.start_index + tr.n_primitives],
                    &mut scatter,
                    &ordered_prims_offset,
                    first_bit_index,
                );
                (root, nodes_created, scatter)
            })
            .collect();
        // place the reserved primitive slices now that emission is done
        let mut scattered: Vec<Option<Arc<dyn Shape + Send + Sync>>> =
            vec![None; self.primitives.len()];
        for (_, _, scatter) in &results {
            for &(slot, prim_index) in scatter {
                scattered[slot] = Some(self.primitives[prim_index].clone());
            }
        }
        ordered_prims.extend(scattered.into_iter().map(|p| p.unwrap()));
        *total_nodes = results.iter().map(|r| r.1).sum();
        // create and return SAH BVH from LBVH treelets
        let mut finished_treelets: Vec<u32> = results.iter().map(|r| r.0).collect();
        let end = finished_treelets.len();
        self.build_upper_sah(arena, &mut finished_treelets, 0, end, total_nodes)
    }
    /// Emit the subtree for one range of Morton-sorted primitives,
    /// splitting on `bit_index` and descending one bit per level.
    /// Returns the arena index of the subtree root; `build_nodes` is
    /// this treelet's slice of the arena and `base` the index of its
    /// first element.
    #[allow(clippy::too_many_arguments)]
    fn emit_lbvh(
        &self,
        build_nodes: &mut [BVHBuildNode],
        base: u32,
        nodes_used: &mut usize,
        primitive_info: &[BVHPrimitiveInfo],
        morton_prims: &[MortonPrimitive],
        scatter: &mut Vec<(usize, usize)>,
        ordered_prims_offset: &AtomicUsize,
        bit_index: i32,
    ) -> u32 {
        let n_primitives = morton_prims.len();
        debug_assert!(n_primitives > 0);
        if bit_index == -1 || n_primitives < self.max_prims_in_node {
            // create and return leaf node of LBVH treelet
            let local = *nodes_used;
            *nodes_used += 1;
            let mut bounds = Bounds3f::default();
            let first_prim_offset = ordered_prims_offset.fetch_add(n_primitives, Ordering::SeqCst);
            for (i, mp) in morton_prims.iter().enumerate() {
                scatter.push((first_prim_offset + i, mp.primitive_index));
                bounds = bnd3_union_bnd3(&bounds, &primitive_info[mp.primitive_index].bounds);
            }
            build_nodes[local].init_leaf(first_prim_offset, n_primitives, &bounds);
            return base + local as u32;
        }
        let mask = 1_u32 << bit_index;
        // advance to next subtree level if there's no LBVH split for this bit
        if (morton_prims[0].morton_code & mask)
            == (morton_prims[n_primitives - 1].morton_code & mask)
        {
            return self.emit_lbvh(
                build_nodes,
                base,
                nodes_used,
                primitive_info,
                morton_prims,
                scatter,
                ordered_prims_offset,
                bit_index - 1,
            );
        }
        // find LBVH split point for this dimension
        let mut search_start = 0;
        let mut search_end = n_primitives - 1;
        while search_start + 1 != search_end {
            debug_assert_ne!(search_start, search_end);
            let mid = (search_start + search_end) / 2;
            if (morton_prims[search_start].morton_code & mask)
                == (morton_prims[mid].morton_code & mask)
            {
                search_start = mid;
            } else {
                debug_assert_eq!(
                    morton_prims[mid].morton_code & mask,
                    morton_prims[search_end].morton_code & mask
                );
                search_end = mid;
            }
        }
        let split_offset = search_end;
        debug_assert!(split_offset <= n_primitives - 1);
        debug_assert_ne!(
            morton_prims[split_offset - 1].morton_code & mask,
            morton_prims[split_offset].morton_code & mask
        );
        // create and return interior LBVH node
        let local = *nodes_used;
        *nodes_used += 1;
        let c0 = self.emit_lbvh(
            build_nodes,
            base,
            nodes_used,
            primitive_info,
            &morton_prims[..split_offset],
            scatter,
            ordered_prims_offset,
            bit_index - 1,
        );
        let c1 = self.emit_lbvh(
            build_nodes,
            base,
            nodes_used,
            primitive_info,
            &morton_prims[split_offset..],
            scatter,
            ordered_prims_offset,
            bit_index - 1,
        );
        let axis = (bit_index % 3) as u8;
        let bounds = bnd3_union_bnd3(
            &build_nodes[(c0 - base) as usize].bounds,
            &build_nodes[(c1 - base) as usize].bounds,
        );
        build_nodes[local].init_interior(axis, c0, c1, bounds);
        base + local as u32
    }
    /// SAH build over whole treelet roots, recursing until one root
    /// remains.
    fn build_upper_sah(
        &self,
        arena: &mut Vec<BVHBuildNode>,
        treelet_roots: &mut Vec<u32>,
        start: usize,
        end: usize,
        total_nodes: &mut usize,
    ) -> u32 {
        assert!(start < end);
        let n_nodes = end - start;
        if n_nodes == 1 {
            return treelet_roots[start];
        }
        *total_nodes += 1;
        let node_index = arena.len() as u32;
        arena.push(BVHBuildNode::default());
        // compute bounds of all nodes under this HLBVH node
        let mut bounds = Bounds3f::default();
        for root in &treelet_roots[start..end] {
            bounds = bnd3_union_bnd3(&bounds, &arena[*root as usize].bounds);
        }
        // compute bound of HLBVH node centroids, choose split dimension _dim_
        let mut centroid_bounds = Bounds3f::default();
        for root in &treelet_roots[start..end] {
            let b = &arena[*root as usize].bounds;
            let centroid = (b.p_min + b.p_max) * 0.5;
            centroid_bounds = bnd3_union_pnt3(&centroid_bounds, &centroid);
        }
        let dim = centroid_bounds.maximum_extent();
        // the SAH split below has to separate at least two roots
        // along this axis
        assert_ne!(centroid_bounds.p_max[dim], centroid_bounds.p_min[dim]);
        // allocate _BucketInfo_ for SAH partition buckets
        let mut buckets = [BucketInfo::default(); N_BUCKETS];
        // initialize _BucketInfo_ for HLBVH SAH partition buckets
        for root in &treelet_roots[start..end] {
            let b_root = arena[*root as usize].bounds;
            let centroid = (b_root.p_min[dim] + b_root.p_max[dim]) * 0.5;
            let mut b = (N_BUCKETS as Float
                * ((centroid - centroid_bounds.p_min[dim])
                    / (centroid_bounds.p_max[dim] - centroid_bounds.p_min[dim])))
                as usize;
            if b == N_BUCKETS {
                b = N_BUCKETS - 1;
            }
            assert!(b < N_BUCKETS);
            buckets[b].count += 1;
            buckets[b].bounds = bnd3_union_bnd3(&buckets[b].bounds, &b_root);
        }
        // compute costs for splitting after each bucket
        let mut cost = [0.0 as Float; N_BUCKETS - 1];
        for (i, cost_i) in cost.iter_mut().enumerate() {
            let mut b0 = Bounds3f::default();
            let mut b1 = Bounds3f::default();
            let mut count0 = 0;
            let mut count1 = 0;
            for bucket in &buckets[0..=i] {
                b0 = bnd3_union_bnd3(&b0, &bucket.bounds);
                count0 += bucket.count;
            }
            for bucket in &buckets[i + 1..N_BUCKETS] {
                b1 = bnd3_union_bnd3(&b1, &bucket.bounds);
                count1 += bucket.count;
            }
            *cost_i = 0.125
                + (count0 as Float * b0.surface_area() + count1 as Float * b1.surface_area())
                    / bounds.surface_area();
        }
        // find bucket to split at that minimizes SAH metric
        let mut min_cost = cost[0];
        let mut min_cost_split_bucket = 0;
        for (i, &cost_i) in cost.iter().enumerate().skip(1) {
            if cost_i < min_cost {
                min_cost = cost_i;
                min_cost_split_bucket = i;
            }
        }
        // split nodes and create interior HLBVH SAH node
        let mid = start
            + partition(&mut treelet_roots[start..end], |root| {
                let b_root = arena[*root as usize].bounds;
                let centroid = (b_root.p_min[dim] + b_root.p_max[dim]) * 0.5;
                let mut b = (N_BUCKETS as Float
                    * ((centroid - centroid_bounds.p_min[dim])
                        / (centroid_bounds.p_max[dim] - centroid_bounds.p_min[dim])))
                    as usize;
                if b == N_BUCKETS {
                    b = N_BUCKETS - 1;
                }
                b <= min_cost_split_bucket
            });
        assert!(mid > start);
        assert!(mid < end);
        let c0 = self.build_upper_sah(arena, treelet_roots, start, mid, total_nodes);
        let c1 = self.build_upper_sah(arena, treelet_roots, mid, end, total_nodes);
        let bounds = bnd3_union_bnd3(&arena[c0 as usize].bounds, &arena[c1 as usize].bounds);
        arena[node_index as usize].init_interior(dim as u8, c0, c1, bounds);
        node_index
    }
    fn flatten_bvh_tree(
        arena: &[BVHBuildNode],
        node_index: u32,
        nodes: &mut Vec<LinearBVHNode>,
        offset: &mut usize,
    ) -> usize {
        let node = &arena[node_index as usize];
        let my_offset = *offset;
        *offset += 1;
        if node.n_primitives > 0 {
            assert!(node.n_primitives < 65536);
            nodes[my_offset] = LinearBVHNode {
                bounds: node.bounds,
                offset: node.first_prim_offset as u32,
                n_primitives: node.n_primitives as u16,
                axis: 0,
                pad: 0,
            };
        } else {
            // interior node: first child is the next node in
            // depth-first order, only the second child's slot is
            // recorded
            BVHAccel::flatten_bvh_tree(arena, node.children[0], nodes, offset);
            let second_child_offset =
                BVHAccel::flatten_bvh_tree(arena, node.children[1], nodes, offset);
            nodes[my_offset] = LinearBVHNode {
                bounds: node.bounds,
                offset: second_child_offset as u32,
                n_primitives: 0,
                axis: node.split_axis,
                pad: 0,
            };
        }
        my_offset
    }
    /// Closest-hit query. Fills `isect` and shrinks `ray.t_max` to
    /// the nearest hit over all primitives.
    pub fn intersect(&self, ray: &Ray, isect: &mut SurfaceInteraction) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut hit = false;
        let inv_dir = Vector3f {
            x: 1.0 / ray.d.x,
            y: 1.0 / ray.d.y,
            z: 1.0 / ray.d.z,
        };
        let dir_is_neg: [u8; 3] = [
            (inv_dir.x < 0.0) as u8,
            (inv_dir.y < 0.0) as u8,
            (inv_dir.z < 0.0) as u8,
        ];
        // follow ray through BVH nodes to find primitive intersections
        let mut to_visit_offset = 0_usize;
        let mut current_node_index = 0_usize;
        let mut nodes_to_visit = [0_usize; 64];
        loop {
            let node = self.nodes[current_node_index];
            // check ray against BVH node
            if node.bounds.intersect_p(ray, &inv_dir, &dir_is_neg) {
                if node.n_primitives > 0 {
                    // intersect ray with primitives in leaf BVH node
                    for i in 0..node.n_primitives as usize {
                        if self.primitives[node.offset as usize + i].intersect(ray, isect) {
                            hit = true;
                        }
                    }
                    if to_visit_offset == 0 {
                        break;
                    }
                    to_visit_offset -= 1;
                    current_node_index = nodes_to_visit[to_visit_offset];
                } else {
                    // put far BVH node on _nodes_to_visit_ stack,
                    // advance to near node
                    if dir_is_neg[node.axis as usize] == 1 {
                        nodes_to_visit[to_visit_offset] = current_node_index + 1;
                        to_visit_offset += 1;
                        current_node_index = node.offset as usize;
                    } else {
                        nodes_to_visit[to_visit_offset] = node.offset as usize;
                        to_visit_offset += 1;
                        current_node_index += 1;
                    }
                }
            } else {
                if to_visit_offset == 0 {
                    break;
                }
                to_visit_offset -= 1;
                current_node_index = nodes_to_visit[to_visit_offset];
            }
        }
        hit
    }
    /// Any-hit (shadow) query. Leaves the ray untouched.
    pub fn intersect_p(&self, ray: &Ray) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let inv_dir = Vector3f {
            x: 1.0 / ray.d.x,
            y: 1.0 / ray.d.y,
            z: 1.0 / ray.d.z,
        };
        let dir_is_neg: [u8; 3] = [
            (inv_dir.x < 0.0) as u8,
            (inv_dir.y < 0.0) as u8,
            (inv_dir.z < 0.0) as u8,
        ];
        let mut to_visit_offset = 0_usize;
        let mut current_node_index = 0_usize;
        let mut nodes_to_visit = [0_usize; 64];
        loop {
            let node = self.nodes[current_node_index];
            if node.bounds.intersect_p(ray, &inv_dir, &dir_is_neg) {
                if node.n_primitives > 0 {
                    for i in 0..node.n_primitives as usize {
                        if self.primitives[node.offset as usize + i].intersect_p(ray) {
                            return true;
                        }
                    }
                    if to_visit_offset == 0 {
                        break;
                    }
                    to_visit_offset -= 1;
                    current_node_index = nodes_to_visit[to_visit_offset];
                } else {
                    if dir_is_neg[node.axis as usize] == 1 {
                        nodes_to_visit[to_visit_offset] = current_node_index + 1;
                        to_visit_offset += 1;
                        current_node_index = node.offset as usize;
                    } else {
                        nodes_to_visit[to_visit_offset] = node.offset as usize;
                        to_visit_offset += 1;
                        current_node_index += 1;
                    }
                }
            } else {
                if to_visit_offset == 0 {
                    break;
                }
                to_visit_offset -= 1;
                current_node_index = nodes_to_visit[to_visit_offset];
            }
        }
        false
    }
}
