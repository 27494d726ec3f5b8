// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Solid booleans using BSP trees

use crate::geometry::{Face, Polyhedron};
use nalgebra::{Point3, Vector3};

const EPSILON: f64 = 1e-5;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vector3<f64>,
    w: f64,
}

#[derive(Debug, Clone)]
struct Polygon {
    vertices: Vec<Point3<f64>>,
    plane: Plane,
}

#[derive(Default)]
struct Split {
    coplanar_front: Vec<Polygon>,
    coplanar_back: Vec<Polygon>,
    front: Vec<Polygon>,
    back: Vec<Polygon>,
}

impl Plane {
    fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    fn distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.w
    }

    fn classify(&self, point: &Point3<f64>) -> u8 {
        let t = self.distance(point);
        if t < -EPSILON {
            BACK
        } else if t > EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    fn split_polygon(&self, polygon: Polygon, out: &mut Split) {
        let types: Vec<u8> = polygon.vertices.iter().map(|v| self.classify(v)).collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    out.coplanar_front.push(polygon);
                } else {
                    out.coplanar_back.push(polygon);
                }
            }
            FRONT => out.front.push(polygon),
            BACK => out.back.push(polygon),
            _ => {
                let n = polygon.vertices.len();
                let mut front = Vec::with_capacity(n + 1);
                let mut back = Vec::with_capacity(n + 1);
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (polygon.vertices[i], polygon.vertices[j]);
                    if ti != BACK {
                        front.push(vi);
                    }
                    if ti != FRONT {
                        back.push(vi);
                    }
                    if ti | tj == SPANNING {
                        let t = (self.w - self.normal.dot(&vi.coords)) / self.normal.dot(&(vj - vi));
                        let v = vi + (vj - vi) * t;
                        front.push(v);
                        back.push(v);
                    }
                }
                if front.len() >= 3 {
                    out.front.push(Polygon {
                        vertices: front,
                        plane: polygon.plane,
                    });
                }
                if back.len() >= 3 {
                    out.back.push(Polygon {
                        vertices: back,
                        plane: polygon.plane,
                    });
                }
            }
        }
    }
}

impl Polygon {
    fn from_face(face: &Face) -> Option<Self> {
        if face.vertices.len() < 3 {
            return None;
        }
        let normal = face.normal()?;
        Some(Self {
            plane: Plane {
                normal,
                w: normal.dot(&face.vertices[0].coords),
            },
            vertices: face.vertices.clone(),
        })
    }

    fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }
}

#[derive(Debug, Default)]
struct BspNode {
    plane: Option<Plane>,
    front: Option<usize>,
    back: Option<usize>,
    polygons: Vec<Polygon>,
}

/// BSP tree stored as an arena rooted at index 0.
///
/// Convex solids build into a chain as deep as their face count, so every
/// walk uses an explicit work stack instead of recursion.
#[derive(Debug)]
struct BspTree {
    nodes: Vec<BspNode>,
}

impl BspTree {
    fn new(polygons: Vec<Polygon>) -> Self {
        let mut tree = Self {
            nodes: vec![BspNode::default()],
        };
        tree.build(polygons);
        tree
    }

    fn child(&mut self, parent: usize, front: bool) -> usize {
        let existing = if front {
            self.nodes[parent].front
        } else {
            self.nodes[parent].back
        };
        if let Some(index) = existing {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(BspNode::default());
        if front {
            self.nodes[parent].front = Some(index);
        } else {
            self.nodes[parent].back = Some(index);
        }
        index
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        let mut pending = vec![(0, polygons)];
        while let Some((index, polygons)) = pending.pop() {
            if polygons.is_empty() {
                continue;
            }
            let plane = *self.nodes[index].plane.get_or_insert(polygons[0].plane);

            let mut split = Split::default();
            for polygon in polygons {
                plane.split_polygon(polygon, &mut split);
            }
            let node = &mut self.nodes[index];
            node.polygons.append(&mut split.coplanar_front);
            node.polygons.append(&mut split.coplanar_back);

            if !split.front.is_empty() {
                pending.push((self.child(index, true), split.front));
            }
            if !split.back.is_empty() {
                pending.push((self.child(index, false), split.back));
            }
        }
    }

    fn invert(&mut self) {
        for node in &mut self.nodes {
            for polygon in &mut node.polygons {
                polygon.flip();
            }
            if let Some(plane) = &mut node.plane {
                plane.flip();
            }
            std::mem::swap(&mut node.front, &mut node.back);
        }
    }

    /// Remove the parts of `polygons` that lie inside this tree's solid
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let mut result = Vec::new();
        let mut pending = vec![(0, polygons)];
        while let Some((index, polygons)) = pending.pop() {
            let node = &self.nodes[index];
            let Some(plane) = node.plane else {
                result.extend(polygons);
                continue;
            };

            let mut split = Split::default();
            for polygon in polygons {
                plane.split_polygon(polygon, &mut split);
            }
            let mut front = split.front;
            front.append(&mut split.coplanar_front);
            let mut back = split.back;
            back.append(&mut split.coplanar_back);

            match node.front {
                Some(child) => pending.push((child, front)),
                None => result.extend(front),
            }
            // Polygons behind a leaf plane are inside the solid
            if let Some(child) = node.back {
                pending.push((child, back));
            }
        }
        result
    }

    fn clip_to(&mut self, other: &BspTree) {
        for node in &mut self.nodes {
            node.polygons = other.clip_polygons(std::mem::take(&mut node.polygons));
        }
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        self.nodes.iter().flat_map(|node| node.polygons.iter().cloned()).collect()
    }
}

fn to_polygons(solid: &Polyhedron) -> Vec<Polygon> {
    solid.faces().iter().filter_map(Polygon::from_face).collect()
}

fn to_polyhedron(polygons: Vec<Polygon>) -> Polyhedron {
    Polyhedron::from_faces(polygons.into_iter().map(|p| Face::new(p.vertices)).collect())
}

pub(crate) fn union(a: &Polyhedron, b: &Polyhedron) -> Polyhedron {
    let mut a = BspTree::new(to_polygons(a));
    let mut b = BspTree::new(to_polygons(b));
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    to_polyhedron(a.all_polygons())
}

pub(crate) fn difference(a: &Polyhedron, b: &Polyhedron) -> Polyhedron {
    let mut a = BspTree::new(to_polygons(a));
    let mut b = BspTree::new(to_polygons(b));
    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    a.invert();
    to_polyhedron(a.all_polygons())
}

pub(crate) fn intersection(a: &Polyhedron, b: &Polyhedron) -> Polyhedron {
    let mut a = BspTree::new(to_polygons(a));
    let mut b = BspTree::new(to_polygons(b));
    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.all_polygons());
    a.invert();
    to_polyhedron(a.all_polygons())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(min: f64, max: f64) -> Polyhedron {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let (a, b) = (min, max);
        Polyhedron::from_faces(vec![
            Face::new(vec![p(a, a, a), p(a, b, a), p(b, b, a), p(b, a, a)]),
            Face::new(vec![p(a, a, b), p(b, a, b), p(b, b, b), p(a, b, b)]),
            Face::new(vec![p(a, a, a), p(b, a, a), p(b, a, b), p(a, a, b)]),
            Face::new(vec![p(a, b, a), p(a, b, b), p(b, b, b), p(b, b, a)]),
            Face::new(vec![p(a, a, a), p(a, a, b), p(a, b, b), p(a, b, a)]),
            Face::new(vec![p(b, a, a), p(b, b, a), p(b, b, b), p(b, a, b)]),
        ])
    }

    #[test]
    fn test_union_of_overlapping_cubes() {
        let result = union(&cube(0.0, 2.0), &cube(1.0, 3.0));
        assert_relative_eq!(result.volume(), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_difference_of_overlapping_cubes() {
        let result = difference(&cube(0.0, 2.0), &cube(1.0, 3.0));
        assert_relative_eq!(result.volume(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intersection_of_overlapping_cubes() {
        let result = intersection(&cube(0.0, 2.0), &cube(1.0, 3.0));
        assert_relative_eq!(result.volume(), 1.0, epsilon = 1e-9);
        let bbox = result.bounding_box();
        assert_relative_eq!(bbox.min.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let result = intersection(&cube(0.0, 1.0), &cube(2.0, 3.0));
        assert!(result.is_empty());
    }

    /// Side walls of a convex prism around the Z axis
    fn tube(sides: usize, r: f64) -> Vec<Polygon> {
        let ring: Vec<Point3<f64>> = (0..sides)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / sides as f64;
                Point3::new(r * a.cos(), r * a.sin(), 0.0)
            })
            .collect();
        let up = Vector3::new(0.0, 0.0, 1.0);
        (0..sides)
            .filter_map(|i| {
                let j = (i + 1) % sides;
                Polygon::from_face(&Face::new(vec![ring[i], ring[j], ring[j] + up, ring[i] + up]))
            })
            .collect()
    }

    #[test]
    fn test_deep_tree_is_walked_without_recursion() {
        // Each wall keeps every other wall behind it, so the tree is a chain
        // with one node per wall
        let sides = 5_000;
        let tree = BspTree::new(tube(sides, 1000.0));
        assert_eq!(tree.nodes.len(), sides);
        assert_eq!(tree.all_polygons().len(), sides);

        let inside = tree.clip_polygons(to_polygons(&cube(-1.0, 0.5)));
        assert!(inside.is_empty());
        let outside = tree.clip_polygons(to_polygons(&cube(2000.0, 2001.0)));
        assert_eq!(outside.len(), 6);
    }

    #[test]
    fn test_cavity() {
        let result = difference(&cube(0.0, 3.0), &cube(1.0, 2.0));
        assert_relative_eq!(result.volume(), 26.0, epsilon = 1e-9);
    }
}
