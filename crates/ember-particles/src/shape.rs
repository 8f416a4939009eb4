//! Emitter volume shapes: where a new particle starts and which way it leaves.
//!
//! Every shape is a pure function of the shape parameters, the particle's
//! emission index and its random seed. Calling it twice for the same particle
//! gives the same answer.

use crate::anim::EmitterAnimValue;
use crate::rand::RandomSource;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Emitter volume type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Point,
    Circle,
    CircleEquallyDivided,
    CircleFill,
    Sphere,
    #[serde(rename = "sphere_equally_divided_32")]
    SphereEquallyDivided32,
    #[serde(rename = "sphere_equally_divided_64")]
    SphereEquallyDivided64,
    SphereFill,
    Cylinder,
    CylinderFill,
    Box,
    BoxFill,
    Line,
    LineEquallyDivided,
    Rectangle,
    Primitive,
}

impl ShapeKind {
    pub const ALL: [Self; 16] = [
        Self::Point,
        Self::Circle,
        Self::CircleEquallyDivided,
        Self::CircleFill,
        Self::Sphere,
        Self::SphereEquallyDivided32,
        Self::SphereEquallyDivided64,
        Self::SphereFill,
        Self::Cylinder,
        Self::CylinderFill,
        Self::Box,
        Self::BoxFill,
        Self::Line,
        Self::LineEquallyDivided,
        Self::Rectangle,
        Self::Primitive,
    ];

    /// Shapes whose output depends only on the emission index
    pub fn is_equally_divided(&self) -> bool {
        matches!(
            self,
            Self::CircleEquallyDivided
                | Self::SphereEquallyDivided32
                | Self::SphereEquallyDivided64
                | Self::LineEquallyDivided
        )
    }
}

/// How a primitive shape picks vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveEmitMode {
    /// Every particle of one burst starts from the same vertex
    Unison,
    /// Uniformly random vertex per particle
    #[default]
    Random,
    /// Vertices in order, continuing across bursts
    IndexOrder,
}

/// Raw 16-byte shape parameter block handed to shaders as-is.
///
/// The GPU side reinterprets the words per shader, so the block is stored
/// untyped and read through typed accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct ShapeUserData([u8; 16]);

impl ShapeUserData {
    pub fn from_f32s(v: [f32; 4]) -> Self {
        Self(bytemuck::cast(v))
    }

    pub fn from_u32s(v: [u32; 4]) -> Self {
        Self(bytemuck::cast(v))
    }

    pub fn words(&self) -> [u32; 4] {
        bytemuck::cast(self.0)
    }

    /// Word `i` as a float; `None` past the fourth word
    pub fn f32_at(&self, i: usize) -> Option<f32> {
        self.u32_at(i).map(f32::from_bits)
    }

    pub fn u32_at(&self, i: usize) -> Option<u32> {
        self.words().get(i).copied()
    }

    pub fn i32_at(&self, i: usize) -> Option<i32> {
        self.u32_at(i).map(|w| w as i32)
    }
}

impl From<[f32; 4]> for ShapeUserData {
    fn from(v: [f32; 4]) -> Self {
        Self::from_f32s(v)
    }
}

impl From<ShapeUserData> for [f32; 4] {
    fn from(d: ShapeUserData) -> Self {
        bytemuck::cast(d.0)
    }
}

/// Authored shape parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeResource {
    pub kind: ShapeKind,
    /// Circle, sphere and cylinder radius
    pub radius: f32,
    /// Box half extents; rectangles use x and z
    pub extent: Vec3,
    /// Cylinder half height
    pub height: f32,
    /// Line length, centered on the origin along X
    pub length: f32,
    /// Inner radius ratio for fill shapes, in [0, 1)
    pub hollowness: f32,
    /// Arc start in degrees (circle and cylinder variants)
    pub sweep_start: f32,
    /// Arc length in degrees; 360 is a full ring
    pub sweep: f32,
    /// Local offset added to every sampled position
    pub offset: Vec3,
    /// Static volume scale; the `volume_scale` animation replaces it
    pub volume_scale: Vec3,
    /// Name of the mesh registered with the system for primitive shapes
    pub primitive: Option<String>,
    pub primitive_mode: PrimitiveEmitMode,
    pub user_data: ShapeUserData,
}

impl Default for ShapeResource {
    fn default() -> Self {
        Self {
            kind: ShapeKind::Point,
            radius: 1.0,
            extent: Vec3::ONE,
            height: 1.0,
            length: 1.0,
            hollowness: 0.0,
            sweep_start: 0.0,
            sweep: 360.0,
            offset: Vec3::ZERO,
            volume_scale: Vec3::ONE,
            primitive: None,
            primitive_mode: PrimitiveEmitMode::Random,
            user_data: ShapeUserData::default(),
        }
    }
}

impl ShapeResource {
    pub fn of_kind(kind: ShapeKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    fn is_full_ring(&self) -> bool {
        self.sweep.abs() >= 360.0
    }
}

/// Vertex source for primitive shapes
#[derive(Debug, Clone, Default)]
pub struct PrimitiveMesh {
    pub positions: Vec<Vec3>,
    /// Optional per-vertex normals; missing normals fall back to the
    /// normalized position
    pub normals: Vec<Vec3>,
}

impl PrimitiveMesh {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            normals: Vec::new(),
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn vertex(&self, i: usize) -> (Vec3, Vec3) {
        let p = self.positions[i];
        let n = self
            .normals
            .get(i)
            .copied()
            .unwrap_or_else(|| p.normalize_or_zero());
        (p, n)
    }
}

/// Everything a shape evaluation reads besides the per-particle inputs
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub shape: &'a ShapeResource,
    pub primitive: Option<&'a PrimitiveMesh>,
    /// First vertex for `IndexOrder` primitive emission in this burst
    pub primitive_cursor: u32,
    /// One value per burst, shared by `Unison` primitive emission
    pub burst_random: u32,
}

impl<'a> ShapeContext<'a> {
    pub fn new(shape: &'a ShapeResource) -> Self {
        Self {
            shape,
            primitive: None,
            primitive_cursor: 0,
            burst_random: 0,
        }
    }
}

/// Compute `(local_position, local_velocity)` for one new particle.
///
/// `emit_index` is the particle's index within the current burst of
/// `max_emit_count` particles. Returns `None` when the shape cannot be
/// evaluated (a primitive shape with no vertices bound); the caller skips the
/// particle.
pub fn evaluate_shape(
    ctx: &ShapeContext<'_>,
    emit_index: u32,
    max_emit_count: u32,
    random_value: u32,
    anim: &EmitterAnimValue,
) -> Option<(Vec3, Vec3)> {
    let shape = ctx.shape;
    let mut rnd = RandomSource::new(random_value);
    let n = max_emit_count.max(1);
    let i = emit_index % n;

    let (pos, normal) = match shape.kind {
        ShapeKind::Point => (Vec3::ZERO, rnd.unit_vector()),
        ShapeKind::Circle => {
            let a = arc_angle(shape, rnd.next_f32());
            let dir = ring(a);
            (dir * shape.radius, dir)
        }
        ShapeKind::CircleEquallyDivided => {
            let a = arc_angle(shape, divided_fraction(shape, i, n));
            let dir = ring(a);
            (dir * shape.radius, dir)
        }
        ShapeKind::CircleFill => {
            let a = arc_angle(shape, rnd.next_f32());
            let dir = ring(a);
            let r = fill_radius_2d(shape.hollowness, rnd.next_f32());
            (dir * shape.radius * r, dir)
        }
        ShapeKind::Sphere => {
            let dir = sphere_direction(shape, &mut rnd);
            (dir * shape.radius, dir)
        }
        ShapeKind::SphereEquallyDivided32 => {
            let dir = fibonacci_direction(emit_index % 32, 32);
            (dir * shape.radius, dir)
        }
        ShapeKind::SphereEquallyDivided64 => {
            let dir = fibonacci_direction(emit_index % 64, 64);
            (dir * shape.radius, dir)
        }
        ShapeKind::SphereFill => {
            let dir = sphere_direction(shape, &mut rnd);
            let r = fill_radius_3d(shape.hollowness, rnd.next_f32());
            (dir * shape.radius * r, dir)
        }
        ShapeKind::Cylinder => {
            let dir = ring(arc_angle(shape, rnd.next_f32()));
            let y = rnd.range(-shape.height, shape.height);
            (dir * shape.radius + Vec3::Y * y, dir)
        }
        ShapeKind::CylinderFill => {
            let dir = ring(arc_angle(shape, rnd.next_f32()));
            let r = fill_radius_2d(shape.hollowness, rnd.next_f32());
            let y = rnd.range(-shape.height, shape.height);
            (dir * shape.radius * r + Vec3::Y * y, dir)
        }
        ShapeKind::Box => box_surface(shape.extent, &mut rnd),
        ShapeKind::BoxFill => {
            let e = shape.extent;
            let p = Vec3::new(
                rnd.range(-e.x, e.x),
                rnd.range(-e.y, e.y),
                rnd.range(-e.z, e.z),
            );
            (p, p.normalize_or_zero())
        }
        ShapeKind::Line => {
            let x = (rnd.next_f32() - 0.5) * shape.length;
            (Vec3::X * x, Vec3::Y)
        }
        ShapeKind::LineEquallyDivided => {
            let f = if n > 1 {
                i as f32 / (n - 1) as f32
            } else {
                0.5
            };
            ((Vec3::X * (f - 0.5)) * shape.length, Vec3::Y)
        }
        ShapeKind::Rectangle => rectangle_outline(shape.extent, &mut rnd),
        ShapeKind::Primitive => {
            let mesh = ctx.primitive?;
            let count = mesh.vertex_count();
            if count == 0 {
                return None;
            }
            let index = match shape.primitive_mode {
                PrimitiveEmitMode::Unison => ctx.burst_random as usize % count,
                PrimitiveEmitMode::Random => rnd.next_u32() as usize % count,
                PrimitiveEmitMode::IndexOrder => {
                    (ctx.primitive_cursor as usize + emit_index as usize) % count
                }
            };
            mesh.vertex(index)
        }
    };

    let position = pos * anim.volume_scale + shape.offset;
    let velocity = normal * anim.all_direction_speed;
    Some((position, velocity))
}

fn ring(angle: f32) -> Vec3 {
    Vec3::new(angle.cos(), 0.0, angle.sin())
}

fn arc_angle(shape: &ShapeResource, fraction: f32) -> f32 {
    (shape.sweep_start + shape.sweep * fraction).to_radians()
}

/// Fraction along the arc for particle `i` of `n`.
///
/// A full ring divides by `n` so the last particle does not land on the
/// first; an open arc includes both ends.
fn divided_fraction(shape: &ShapeResource, i: u32, n: u32) -> f32 {
    if shape.is_full_ring() {
        i as f32 / n as f32
    } else if n > 1 {
        i as f32 / (n - 1) as f32
    } else {
        0.0
    }
}

/// Radius ratio for a uniformly filled disk (area grows with r^2)
fn fill_radius_2d(hollowness: f32, u: f32) -> f32 {
    let h2 = hollowness * hollowness;
    (h2 + (1.0 - h2) * u).sqrt()
}

/// Radius ratio for a uniformly filled ball (volume grows with r^3)
fn fill_radius_3d(hollowness: f32, u: f32) -> f32 {
    let h3 = hollowness * hollowness * hollowness;
    (h3 + (1.0 - h3) * u).cbrt()
}

/// Uniform sphere direction restricted to the authored longitude sweep
fn sphere_direction(shape: &ShapeResource, rnd: &mut RandomSource) -> Vec3 {
    let y = 1.0 - 2.0 * rnd.next_f32();
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = arc_angle(shape, rnd.next_f32());
    Vec3::new(r * phi.cos(), y, r * phi.sin())
}

/// Point `i` of an `n`-point golden-angle lattice on the unit sphere
fn fibonacci_direction(i: u32, n: u32) -> Vec3 {
    let golden_angle = TAU * (1.0 - 1.0 / 1.618_034);
    let y = 1.0 - (2.0 * i as f32 + 1.0) / n as f32;
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = golden_angle * i as f32;
    Vec3::new(r * phi.cos(), y, r * phi.sin())
}

/// Uniform point on the surface of a box, with the face normal
fn box_surface(e: Vec3, rnd: &mut RandomSource) -> (Vec3, Vec3) {
    let area_x = e.y * e.z;
    let area_y = e.x * e.z;
    let area_z = e.x * e.y;
    let total = area_x + area_y + area_z;
    if total <= 0.0 {
        return (Vec3::ZERO, Vec3::Y);
    }
    let pick = rnd.next_f32() * total;
    let sign = if rnd.next_f32() < 0.5 { -1.0 } else { 1.0 };
    let a = rnd.next_signed();
    let b = rnd.next_signed();
    if pick < area_x {
        (Vec3::new(sign * e.x, a * e.y, b * e.z), Vec3::X * sign)
    } else if pick < area_x + area_y {
        (Vec3::new(a * e.x, sign * e.y, b * e.z), Vec3::Y * sign)
    } else {
        (Vec3::new(a * e.x, b * e.y, sign * e.z), Vec3::Z * sign)
    }
}

/// Uniform point on the outline of an XZ rectangle, with the edge normal
fn rectangle_outline(e: Vec3, rnd: &mut RandomSource) -> (Vec3, Vec3) {
    let total = e.x + e.z;
    if total <= 0.0 {
        return (Vec3::ZERO, Vec3::X);
    }
    let sign = if rnd.next_f32() < 0.5 { -1.0 } else { 1.0 };
    let along = rnd.next_signed();
    if rnd.next_f32() * total < e.x {
        // Edges parallel to X at z = +-e.z
        (Vec3::new(along * e.x, 0.0, sign * e.z), Vec3::Z * sign)
    } else {
        (Vec3::new(sign * e.x, 0.0, along * e.z), Vec3::X * sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anim_with_speed(speed: f32) -> EmitterAnimValue {
        EmitterAnimValue {
            all_direction_speed: speed,
            ..Default::default()
        }
    }

    fn sample(shape: &ShapeResource, i: u32, n: u32, seed: u32) -> (Vec3, Vec3) {
        let ctx = ShapeContext::new(shape);
        evaluate_shape(&ctx, i, n, seed, &anim_with_speed(1.0)).unwrap()
    }

    #[test]
    fn point_emits_from_origin_with_unit_direction() {
        let shape = ShapeResource::of_kind(ShapeKind::Point);
        for seed in 1..100 {
            let (p, v) = sample(&shape, 0, 1, seed);
            assert_eq!(p, Vec3::ZERO);
            assert!((v.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_surface_samples_lie_on_radius() {
        let shape = ShapeResource {
            radius: 2.5,
            ..ShapeResource::of_kind(ShapeKind::Sphere)
        };
        for seed in 1..500 {
            let (p, _) = sample(&shape, 0, 1, seed * 31);
            assert!((p.length() - 2.5).abs() < 1e-4, "{p:?}");
        }
    }

    #[test]
    fn sphere_fill_samples_stay_inside() {
        let shape = ShapeResource {
            radius: 3.0,
            ..ShapeResource::of_kind(ShapeKind::SphereFill)
        };
        let mut inner = 0;
        for seed in 1..2000 {
            let (p, _) = sample(&shape, 0, 1, seed * 17);
            assert!(p.length() <= 3.0 + 1e-4);
            if p.length() < 1.5 {
                inner += 1;
            }
        }
        // A uniform ball puts 1/8 of its volume inside half the radius
        assert!(inner > 150 && inner < 350, "{inner}");
    }

    #[test]
    fn sphere_surface_is_not_pole_heavy() {
        let shape = ShapeResource::of_kind(ShapeKind::Sphere);
        let polar = (1..4000)
            .map(|seed| sample(&shape, 0, 1, seed * 13).0)
            .filter(|p| p.y.abs() > 0.5)
            .count();
        // Uniform on the sphere: |y| > 0.5 covers exactly half the area
        assert!(polar > 1700 && polar < 2300, "{polar}");
    }

    #[test]
    fn equally_divided_ignores_random_value() {
        for kind in ShapeKind::ALL.into_iter().filter(|k| k.is_equally_divided()) {
            let shape = ShapeResource::of_kind(kind);
            for i in 0..12 {
                let a = sample(&shape, i, 12, 1);
                let b = sample(&shape, i, 12, 0xABCD_1234);
                assert_eq!(a, b, "{kind:?} index {i}");
            }
        }
    }

    #[test]
    fn circle_equally_divided_spaces_evenly() {
        let shape = ShapeResource::of_kind(ShapeKind::CircleEquallyDivided);
        let (p0, _) = sample(&shape, 0, 4, 9);
        let (p1, _) = sample(&shape, 1, 4, 9);
        assert!((p0 - Vec3::X).length() < 1e-5);
        assert!((p1 - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn half_arc_includes_both_ends() {
        let shape = ShapeResource {
            sweep: 180.0,
            ..ShapeResource::of_kind(ShapeKind::CircleEquallyDivided)
        };
        let (first, _) = sample(&shape, 0, 3, 1);
        let (last, _) = sample(&shape, 2, 3, 1);
        assert!((first - Vec3::X).length() < 1e-5);
        assert!((last + Vec3::X).length() < 1e-5);
    }

    #[test]
    fn sphere_lattice_points_are_distinct_unit_vectors() {
        let shape = ShapeResource::of_kind(ShapeKind::SphereEquallyDivided32);
        let points: Vec<Vec3> = (0..32).map(|i| sample(&shape, i, 32, 1).0).collect();
        for (i, a) in points.iter().enumerate() {
            assert!((a.length() - 1.0).abs() < 1e-4);
            for b in &points[i + 1..] {
                assert!((*a - *b).length() > 0.1);
            }
        }
    }

    #[test]
    fn circle_fill_respects_hollowness() {
        let shape = ShapeResource {
            radius: 2.0,
            hollowness: 0.5,
            ..ShapeResource::of_kind(ShapeKind::CircleFill)
        };
        for seed in 1..500 {
            let (p, _) = sample(&shape, 0, 1, seed);
            let r = p.length();
            assert!(r >= 1.0 - 1e-4 && r <= 2.0 + 1e-4, "{r}");
            assert!(p.y.abs() < 1e-6);
        }
    }

    #[test]
    fn cylinder_stays_on_side_wall() {
        let shape = ShapeResource {
            radius: 1.5,
            height: 0.5,
            ..ShapeResource::of_kind(ShapeKind::Cylinder)
        };
        for seed in 1..300 {
            let (p, v) = sample(&shape, 0, 1, seed);
            let radial = Vec3::new(p.x, 0.0, p.z).length();
            assert!((radial - 1.5).abs() < 1e-4);
            assert!(p.y.abs() <= 0.5);
            assert!(v.y.abs() < 1e-6);
        }
    }

    #[test]
    fn box_surface_touches_a_face() {
        let shape = ShapeResource {
            extent: Vec3::new(1.0, 2.0, 3.0),
            ..ShapeResource::of_kind(ShapeKind::Box)
        };
        for seed in 1..300 {
            let (p, n) = sample(&shape, 0, 1, seed);
            let on_face = (p.x.abs() - 1.0).abs() < 1e-5
                || (p.y.abs() - 2.0).abs() < 1e-5
                || (p.z.abs() - 3.0).abs() < 1e-5;
            assert!(on_face, "{p:?}");
            assert!((n.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn line_equally_divided_spans_length() {
        let shape = ShapeResource {
            length: 4.0,
            ..ShapeResource::of_kind(ShapeKind::LineEquallyDivided)
        };
        assert!((sample(&shape, 0, 5, 1).0.x + 2.0).abs() < 1e-5);
        assert!((sample(&shape, 2, 5, 1).0.x).abs() < 1e-5);
        assert!((sample(&shape, 4, 5, 1).0.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn rectangle_points_lie_on_outline() {
        let shape = ShapeResource {
            extent: Vec3::new(2.0, 0.0, 1.0),
            ..ShapeResource::of_kind(ShapeKind::Rectangle)
        };
        for seed in 1..300 {
            let (p, _) = sample(&shape, 0, 1, seed);
            let on_edge = (p.x.abs() - 2.0).abs() < 1e-5 || (p.z.abs() - 1.0).abs() < 1e-5;
            assert!(on_edge, "{p:?}");
        }
    }

    #[test]
    fn primitive_without_mesh_is_skipped() {
        let shape = ShapeResource::of_kind(ShapeKind::Primitive);
        let ctx = ShapeContext::new(&shape);
        assert!(evaluate_shape(&ctx, 0, 1, 5, &anim_with_speed(1.0)).is_none());
    }

    #[test]
    fn primitive_modes_pick_vertices() {
        let mesh = PrimitiveMesh::new(vec![Vec3::X, Vec3::Y, Vec3::Z]);
        let mut shape = ShapeResource::of_kind(ShapeKind::Primitive);
        let anim = anim_with_speed(0.0);

        shape.primitive_mode = PrimitiveEmitMode::IndexOrder;
        let ctx = ShapeContext {
            shape: &shape,
            primitive: Some(&mesh),
            primitive_cursor: 1,
            burst_random: 0,
        };
        let order: Vec<Vec3> = (0..3)
            .map(|i| evaluate_shape(&ctx, i, 3, 99, &anim).unwrap().0)
            .collect();
        assert_eq!(order, vec![Vec3::Y, Vec3::Z, Vec3::X]);

        shape.primitive_mode = PrimitiveEmitMode::Unison;
        let ctx = ShapeContext {
            shape: &shape,
            primitive: Some(&mesh),
            primitive_cursor: 0,
            burst_random: 2,
        };
        for seed in 1..10 {
            assert_eq!(evaluate_shape(&ctx, 0, 3, seed, &anim).unwrap().0, Vec3::Z);
        }
    }

    #[test]
    fn primitive_velocity_follows_authored_normal() {
        let mesh = PrimitiveMesh::new(vec![Vec3::X]).with_normals(vec![Vec3::Y]);
        let mut shape = ShapeResource::of_kind(ShapeKind::Primitive);
        shape.primitive_mode = PrimitiveEmitMode::IndexOrder;
        let ctx = ShapeContext {
            shape: &shape,
            primitive: Some(&mesh),
            primitive_cursor: 0,
            burst_random: 0,
        };
        let (p, v) = evaluate_shape(&ctx, 0, 1, 3, &anim_with_speed(2.0)).unwrap();
        assert_eq!(p, Vec3::X);
        assert!((v - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn volume_scale_and_speed_apply() {
        let shape = ShapeResource::of_kind(ShapeKind::CircleEquallyDivided);
        let anim = EmitterAnimValue {
            all_direction_speed: 3.0,
            volume_scale: Vec3::new(2.0, 1.0, 1.0),
            ..Default::default()
        };
        let ctx = ShapeContext::new(&shape);
        let (p, v) = evaluate_shape(&ctx, 0, 4, 1, &anim).unwrap();
        assert!((p - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!((v - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn shape_user_data_reinterprets_words() {
        let data = ShapeUserData::from_f32s([1.5, 0.0, 0.0, 0.0]);
        assert_eq!(data.f32_at(0), Some(1.5));
        assert_eq!(data.u32_at(0), Some(1.5f32.to_bits()));
        let ints = ShapeUserData::from_u32s([0, u32::MAX, 7, 0]);
        assert_eq!(ints.i32_at(1), Some(-1));
        assert_eq!(ints.u32_at(2), Some(7));
        assert_eq!(ints.u32_at(4), None);
        assert_eq!(data.f32_at(16), None);
    }

    #[test]
    fn shape_parses_from_toml() {
        let shape: ShapeResource = toml::from_str(
            r#"
kind = "sphere_equally_divided_64"
radius = 4
sweep = 90
"#,
        )
        .unwrap();
        assert_eq!(shape.kind, ShapeKind::SphereEquallyDivided64);
        assert_eq!(shape.radius, 4.0);
        assert_eq!(shape.sweep, 90.0);
        assert_eq!(shape.extent, Vec3::ONE);
    }
}
