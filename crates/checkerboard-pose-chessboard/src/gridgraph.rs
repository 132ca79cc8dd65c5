//! Grid graph over corner candidates and integer grid labelling.
//!
//! Two candidates are linked when they are spatial neighbours and the
//! segment between them runs along a dark/light square boundary. Links are
//! symmetric. Each connected component is then labelled with integer grid
//! coordinates by a breadth-first walk that carries the local grid axes
//! along, so perspective foreshortening does not break the labelling.

use std::collections::{HashMap, VecDeque};

use checkerboard_pose_core::{sample_bilinear, Corner, GrayImageView};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point2, Vector2};

use crate::geom::{angle_between, cross2, perpendicular};
use crate::params::GridGraphParams;

const MAX_EDGES_PER_NODE: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeNeighbor {
    pub index: usize,
    pub distance: f32,
}

/// Integer grid coordinate: `col` steps along the first axis, `row` along
/// the second.
pub type GridCoord = (i32, i32);

pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>, // For each node, list of neighbors
}

/// Smallest absolute intensity step across the segment `a -> b`, sampled
/// at a quarter, half and three quarters of its length.
pub fn edge_contrast(image: &GrayImageView<'_>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let d = b - a;
    let n = perpendicular(&d) * 0.25;
    let mut contrast = f32::INFINITY;
    for t in [0.25f32, 0.5, 0.75] {
        let m = a + d * t;
        let left = sample_bilinear(image, m.x + n.x, m.y + n.y);
        let right = sample_bilinear(image, m.x - n.x, m.y - n.y);
        contrast = contrast.min((left - right).abs());
    }
    contrast
}

impl GridGraph {
    pub fn new(corners: &[Corner], image: &GrayImageView<'_>, params: &GridGraphParams) -> Self {
        if corners.is_empty() {
            return Self {
                neighbors: Vec::new(),
            };
        }

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        let max_sq = params.max_spacing_pix * params.max_spacing_pix;
        let min_separation = params.min_edge_separation_deg.to_radians();

        let mut candidates: Vec<Vec<NodeNeighbor>> = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let query_point = [corner.position.x, corner.position.y];
            let mut results = tree.within::<SquaredEuclidean>(&query_point, max_sq);
            results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

            let mut accepted: Vec<NodeNeighbor> = Vec::new();
            let mut directions: Vec<Vector2<f32>> = Vec::new();
            for nn in results.into_iter().take(params.k_neighbors + 1) {
                let neighbor_index = nn.item as usize;
                if neighbor_index == i {
                    continue; // Skip self
                }
                let neighbor = &corners[neighbor_index];
                let vec_to_neighbor = neighbor.position - corner.position;
                let distance = vec_to_neighbor.norm();
                if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
                    continue;
                }
                if directions
                    .iter()
                    .any(|d| angle_between(d, &vec_to_neighbor) < min_separation)
                {
                    continue;
                }
                if edge_contrast(image, corner.position, neighbor.position)
                    < params.min_edge_contrast
                {
                    continue;
                }
                directions.push(vec_to_neighbor);
                accepted.push(NodeNeighbor {
                    index: neighbor_index,
                    distance,
                });
                if accepted.len() == MAX_EDGES_PER_NODE {
                    break;
                }
            }
            candidates.push(accepted);
        }

        // Keep mutual links only.
        let neighbors = candidates
            .iter()
            .enumerate()
            .map(|(i, list)| {
                list.iter()
                    .copied()
                    .filter(|n| candidates[n.index].iter().any(|back| back.index == i))
                    .collect()
            })
            .collect();

        Self { neighbors }
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors.get(node).map_or(0, Vec::len)
    }
}

pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut visited = vec![false; graph.neighbors.len()];
    let mut components = Vec::new();

    for start in 0..graph.neighbors.len() {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for neighbor in &graph.neighbors[node] {
                if !visited[neighbor.index] {
                    stack.push(neighbor.index);
                }
            }
        }

        components.push(component);
    }

    components
}

/// Label a component with integer grid coordinates.
///
/// Returns `None` when the walk finds an inconsistency (a node reached with
/// two different coordinates, or two nodes claiming the same coordinate),
/// or when no pair of non-parallel axes exists at the seed node.
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    corners: &[Corner],
    component: &[usize],
    axis_tolerance_deg: f32,
) -> Option<HashMap<GridCoord, usize>> {
    let start = seed_node(graph, corners, component)?;
    let (u0, v0) = seed_axes(graph, corners, start, axis_tolerance_deg)?;
    let min_cos = axis_tolerance_deg.to_radians().cos();

    let mut labels: HashMap<usize, GridCoord> = HashMap::with_capacity(component.len());
    let mut cells: HashMap<GridCoord, usize> = HashMap::with_capacity(component.len());
    let mut queue = VecDeque::new();

    labels.insert(start, (0, 0));
    cells.insert((0, 0), start);
    queue.push_back((start, u0, v0));

    while let Some((node, u, v)) = queue.pop_front() {
        let (col, row) = labels[&node];
        let origin = corners[node].position;
        let (un, vn) = (u.normalize(), v.normalize());

        for neighbor in &graph.neighbors[node] {
            let e = corners[neighbor.index].position - origin;
            let en = e / e.norm().max(f32::EPSILON);
            let cu = en.dot(&un);
            let cv = en.dot(&vn);

            let (step, next_u, next_v) = if cu.abs() >= cv.abs() {
                if cu.abs() < min_cos {
                    continue;
                }
                let s = cu.signum() as i32;
                ((s, 0), e * cu.signum(), v)
            } else {
                if cv.abs() < min_cos {
                    continue;
                }
                let s = cv.signum() as i32;
                ((0, s), u, e * cv.signum())
            };
            let coord = (col + step.0, row + step.1);

            if let Some(&existing) = labels.get(&neighbor.index) {
                if existing != coord {
                    log::debug!(
                        "grid labelling conflict at node {}: {:?} vs {:?}",
                        neighbor.index,
                        existing,
                        coord
                    );
                    return None;
                }
                continue;
            }
            if cells.contains_key(&coord) {
                log::debug!("grid labelling conflict: cell {coord:?} claimed twice");
                return None;
            }
            labels.insert(neighbor.index, coord);
            cells.insert(coord, neighbor.index);
            queue.push_back((neighbor.index, next_u, next_v));
        }
    }

    Some(cells)
}

// Best-connected node closest to the component centroid.
fn seed_node(graph: &GridGraph, corners: &[Corner], component: &[usize]) -> Option<usize> {
    let n = component.len() as f32;
    let centroid = component
        .iter()
        .fold(Vector2::zeros(), |acc, &i| acc + corners[i].position.coords)
        / n;
    let max_degree = component.iter().map(|&i| graph.degree(i)).max()?;
    component
        .iter()
        .copied()
        .filter(|&i| graph.degree(i) == max_degree)
        .min_by(|&a, &b| {
            let da = (corners[a].position.coords - centroid).norm_squared();
            let db = (corners[b].position.coords - centroid).norm_squared();
            da.total_cmp(&db)
        })
}

// First axis: the shortest edge. Second axis: the edge closest to
// perpendicular, oriented so that (u, v) is right-handed in the image.
fn seed_axes(
    graph: &GridGraph,
    corners: &[Corner],
    node: usize,
    axis_tolerance_deg: f32,
) -> Option<(Vector2<f32>, Vector2<f32>)> {
    let origin = corners[node].position;
    let edges: Vec<Vector2<f32>> = graph.neighbors[node]
        .iter()
        .map(|n| corners[n.index].position - origin)
        .collect();
    let u = *edges.first()?;

    let max_off = axis_tolerance_deg.to_radians();
    let v = edges[1..]
        .iter()
        .copied()
        .map(|e| (e, (angle_between(&u, &e) - std::f32::consts::FRAC_PI_2).abs()))
        .filter(|(_, off)| *off <= max_off)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(e, _)| e)?;

    let v = if cross2(&u, &v) < 0.0 { -v } else { v };
    Some((u, v))
}
