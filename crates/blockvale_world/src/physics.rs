use glam::{IVec3, Vec2, Vec3};

use crate::coords::Direction;
use crate::cursor::{BlockCursor, ChunkSource};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb3 {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn intersects(&self, other: &Aabb3) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Slab test. Returns the entry parameter along `dir` and the normal of the
    /// face the ray enters through.
    pub fn ray_entry(&self, origin: Vec3, dir: Vec3) -> Option<(f32, Vec3)> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d == 0.0 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let (near, far, face) = if d > 0.0 {
                (self.min[axis], self.max[axis], -1.0)
            } else {
                (self.max[axis], self.min[axis], 1.0)
            };
            let t_near = (near - o) / d;
            let t_far = (far - o) / d;
            if t_near > t_enter {
                t_enter = t_near;
                normal = Vec3::ZERO;
                normal[axis] = face;
            }
            t_exit = t_exit.min(t_far);
        }

        (t_enter <= t_exit && t_exit >= 0.0).then_some((t_enter.max(0.0), normal))
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Contact {
    pub position: Vec3,
    pub normal: Vec3,
    /// `distance / max_dist`; 1 when nothing was hit.
    pub fraction: f32,
    pub distance: f32,
    pub block: BlockCursor,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RaycastResult {
    pub start: Vec3,
    pub end: Vec3,
    pub dir: Vec3,
    pub max_dist: f32,
    pub contact: Contact,
}

impl RaycastResult {
    fn miss(start: Vec3, dir: Vec3, max_dist: f32) -> Self {
        let end = start + dir * max_dist;
        Self {
            start,
            end,
            dir,
            max_dist,
            contact: Contact {
                position: end,
                normal: Vec3::ZERO,
                fraction: 1.0,
                distance: max_dist,
                block: BlockCursor::INVALID,
            },
        }
    }

    fn hit(
        start: Vec3,
        dir: Vec3,
        max_dist: f32,
        distance: f32,
        normal: Vec3,
        block: BlockCursor,
    ) -> Self {
        let fraction = if max_dist > 0.0 {
            (distance / max_dist).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            start,
            end: start + dir * max_dist,
            dir,
            max_dist,
            contact: Contact {
                position: start + dir * distance,
                normal,
                fraction,
                distance,
                block,
            },
        }
    }

    pub fn impacted(&self) -> bool {
        self.contact.fraction < 1.0
    }
}

fn axis_step(value: f32) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Walks the ray cell by cell (Amanatides-Woo) and stops at the first opaque
/// cell. `dir` is normalised here; a zero direction never hits anything past
/// the start cell.
pub fn raycast<S: ChunkSource + ?Sized>(
    source: &S,
    start: Vec3,
    dir: Vec3,
    max_dist: f32,
) -> RaycastResult {
    let dir = dir.normalize_or_zero();
    let max_dist = max_dist.max(0.0);

    let origin_cell = start.floor().as_ivec3();
    let mut cursor = source.cursor_at(origin_cell);
    let Some(first) = cursor.block(source) else {
        return RaycastResult::miss(start, dir, max_dist);
    };
    if first.opaque() {
        return RaycastResult::hit(start, dir, max_dist, 0.0, -dir, cursor);
    }
    if dir == Vec3::ZERO || max_dist == 0.0 {
        return RaycastResult::miss(start, dir, max_dist);
    }

    let step = IVec3::new(axis_step(dir.x), axis_step(dir.y), axis_step(dir.z));
    let mut t_max = Vec3::INFINITY;
    let mut t_delta = Vec3::INFINITY;
    for axis in 0..3 {
        if step[axis] == 0 {
            continue;
        }
        let boundary = if step[axis] > 0 {
            origin_cell[axis] as f32 + 1.0
        } else {
            origin_cell[axis] as f32
        };
        t_max[axis] = (boundary - start[axis]) / dir[axis];
        t_delta[axis] = 1.0 / dir[axis].abs();
    }

    loop {
        let axis = if t_max.x <= t_max.y && t_max.x <= t_max.z {
            0
        } else if t_max.y <= t_max.z {
            1
        } else {
            2
        };
        let distance = t_max[axis];
        if !distance.is_finite() || distance > max_dist {
            return RaycastResult::miss(start, dir, max_dist);
        }

        let mut delta = IVec3::ZERO;
        delta[axis] = step[axis];
        let Some(direction) = Direction::from_axis_step(delta) else {
            return RaycastResult::miss(start, dir, max_dist);
        };
        cursor = cursor.step(source, direction);
        t_max[axis] += t_delta[axis];

        let Some(block) = cursor.block(source) else {
            return RaycastResult::miss(start, dir, max_dist);
        };
        if !block.opaque() {
            continue;
        }

        let mut normal = Vec3::ZERO;
        normal[axis] = -(step[axis] as f32);
        let (distance, normal) = cursor
            .bounds()
            .and_then(|bounds| bounds.ray_entry(start, dir))
            .filter(|(t, _)| (t - distance).abs() < 1e-3)
            .unwrap_or((distance, normal));
        return RaycastResult::hit(start, dir, max_dist, distance, normal, cursor);
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CollisionSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl CollisionSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

const EPSILON: f32 = 1e-6;

/// Pushes a sphere (radius at most half a cell) out of the opaque cells around
/// it. Faces are resolved first, then edges, then corners; the first pass that
/// moves the sphere wins.
pub fn collide<S: ChunkSource + ?Sized>(source: &S, sphere: &CollisionSphere) -> Option<Vec3> {
    let cell = sphere.center.floor().as_ivec3();
    let solid = |offset: IVec3| {
        source
            .block(source.cursor_at(cell + offset))
            .map(|block| block.opaque())
            .unwrap_or(false)
    };

    let faces = resolve_faces(sphere, cell, &solid);
    if faces != Vec3::ZERO {
        return Some(faces);
    }
    let edges = resolve_edges(sphere, cell, &solid);
    if edges != Vec3::ZERO {
        return Some(edges);
    }
    let corners = resolve_corners(sphere, cell, &solid);
    (corners != Vec3::ZERO).then_some(corners)
}

fn resolve_faces(sphere: &CollisionSphere, cell: IVec3, solid: &impl Fn(IVec3) -> bool) -> Vec3 {
    let mut correction = Vec3::ZERO;
    for axis in 0..3 {
        let c = sphere.center[axis];
        let low = cell[axis] as f32;
        let high = low + 1.0;

        let mut positive = IVec3::ZERO;
        positive[axis] = 1;
        if solid(positive) && c + sphere.radius > high {
            correction[axis] = high - sphere.radius - c;
            continue;
        }
        if solid(-positive) && c - sphere.radius < low {
            correction[axis] = low + sphere.radius - c;
        }
    }
    correction
}

/// Correction moving a point at `delta` from a pivot out to `radius`;
/// `fallback` gives the direction when the two coincide.
fn push_out<V>(delta: V, length: f32, radius: f32, fallback: V) -> Option<V>
where
    V: std::ops::Mul<f32, Output = V> + Copy,
{
    if length >= radius {
        return None;
    }
    if length <= EPSILON {
        return Some(fallback * radius);
    }
    Some(delta * ((radius - length) / length))
}

fn resolve_edges(sphere: &CollisionSphere, cell: IVec3, solid: &impl Fn(IVec3) -> bool) -> Vec3 {
    let mut correction = Vec3::ZERO;
    // (a, b) span the plane orthogonal to the edge's own axis.
    for (a, b) in [(1usize, 2usize), (0, 2), (0, 1)] {
        for (sa, sb) in [(1, 1), (1, -1)] {
            for (sa, sb) in [(sa, sb), (-sa, -sb)] {
                let mut offset = IVec3::ZERO;
                offset[a] = sa;
                offset[b] = sb;
                if !solid(offset) {
                    continue;
                }
                let edge = Vec2::new(
                    cell[a] as f32 + if sa > 0 { 1.0 } else { 0.0 },
                    cell[b] as f32 + if sb > 0 { 1.0 } else { 0.0 },
                );
                let center = Vec2::new(sphere.center[a], sphere.center[b]);
                let delta = center - edge;
                let fallback = -Vec2::new(sa as f32, sb as f32).normalize();
                if let Some(push) = push_out(delta, delta.length(), sphere.radius, fallback) {
                    correction[a] += push.x;
                    correction[b] += push.y;
                    break;
                }
            }
        }
    }
    correction
}

fn resolve_corners(sphere: &CollisionSphere, cell: IVec3, solid: &impl Fn(IVec3) -> bool) -> Vec3 {
    let mut correction = Vec3::ZERO;
    for sx in [1, -1] {
        for sy in [1, -1] {
            for sz in [1, -1] {
                let offset = IVec3::new(sx, sy, sz);
                if !solid(offset) {
                    continue;
                }
                let corner = cell.as_vec3()
                    + Vec3::new(
                        if sx > 0 { 1.0 } else { 0.0 },
                        if sy > 0 { 1.0 } else { 0.0 },
                        if sz > 0 { 1.0 } else { 0.0 },
                    );
                let delta = sphere.center - corner;
                let fallback = -offset.as_vec3().normalize();
                if let Some(push) = push_out(delta, delta.length(), sphere.radius, fallback) {
                    correction += push;
                }
            }
        }
    }
    correction
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhysicsMode {
    Walk,
    Fly,
    /// Passes through blocks.
    Ghost,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
}

/// A moving entity with one collision sphere attached at `collider_offset`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Body {
    pub transform: Transform,
    pub velocity: Vec3,
    pub collider_offset: Vec3,
    pub collider_radius: f32,
    pub mode: PhysicsMode,
}

impl Body {
    pub fn new(translation: Vec3, collider_radius: f32, mode: PhysicsMode) -> Self {
        Self {
            transform: Transform { translation },
            velocity: Vec3::ZERO,
            collider_offset: Vec3::ZERO,
            collider_radius,
            mode,
        }
    }

    pub fn collider(&self) -> CollisionSphere {
        CollisionSphere::new(
            self.transform.translation + self.collider_offset,
            self.collider_radius,
        )
    }

    pub fn integrate(&mut self, dt: f32) {
        self.transform.translation += self.velocity * dt;
    }
}

/// Resolves one body; on contact the correction is applied as a single
/// translation and the body stops.
pub fn collide_body<S: ChunkSource + ?Sized>(source: &S, body: &mut Body) -> bool {
    if body.mode == PhysicsMode::Ghost {
        return false;
    }
    match collide(source, &body.collider()) {
        Some(correction) => {
            body.transform.translation += correction;
            body.velocity = Vec3::ZERO;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};
    use rustc_hash::FxHashMap;

    use super::{collide, collide_body, raycast, Aabb3, Body, CollisionSphere, PhysicsMode};
    use crate::block::{register_default_blocks, BlockId, BlockRegistry};
    use crate::chunk::Chunk;
    use crate::coords::{world_to_chunk, ChunkCoords};

    struct Fixture {
        registry: BlockRegistry,
        chunks: FxHashMap<ChunkCoords, Chunk>,
    }

    impl Fixture {
        fn air(range: i32) -> Self {
            let registry = register_default_blocks();
            let mut chunks = FxHashMap::default();
            for y in -range..=range {
                for x in -range..=range {
                    let coords = ChunkCoords::new(x, y);
                    chunks.insert(coords, Chunk::filled(coords, registry.get(BlockId::AIR)));
                }
            }
            Self { registry, chunks }
        }

        fn set(&mut self, world: IVec3, id: BlockId) {
            let (coords, local) = world_to_chunk(world).expect("inside column");
            let chunk = self.chunks.get_mut(&coords).expect("resident");
            chunk.reset_block(local.to_index(), self.registry.get(id));
        }
    }

    #[test]
    fn slab_entry_reports_the_entered_face() {
        let bounds = Aabb3::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 1.0, 1.0));
        let (t, normal) = bounds
            .ray_entry(Vec3::new(0.5, 0.5, 0.5), Vec3::X)
            .expect("ray hits box");
        assert!((t - 4.5).abs() < 1e-6);
        assert_eq!(normal, Vec3::NEG_X);
        assert!(bounds.ray_entry(Vec3::new(0.5, 2.5, 0.5), Vec3::X).is_none());
        assert!(bounds.contains(bounds.center()));
    }

    #[test]
    fn cardinal_ray_hits_the_near_face() {
        let mut fixture = Fixture::air(1);
        fixture.set(IVec3::new(5, 3, 100), BlockId::STONE);

        let result = raycast(&fixture.chunks, Vec3::new(0.5, 3.5, 100.5), Vec3::X, 10.0);
        assert!(result.impacted());
        assert!((result.contact.distance - 4.5).abs() < 1e-4);
        assert_eq!(result.contact.normal, -Vec3::X);
        assert_eq!(result.contact.block.world_position(), Some(IVec3::new(5, 3, 100)));
        assert!((result.contact.position.x - 5.0).abs() < 1e-4);
        assert!((result.contact.fraction - 0.45).abs() < 1e-4);
    }

    #[test]
    fn ray_crosses_chunk_seams_in_negative_directions() {
        let mut fixture = Fixture::air(1);
        fixture.set(IVec3::new(-4, -3, 60), BlockId::DUST);

        let start = Vec3::new(3.5, -2.5, 60.5);
        let result = raycast(&fixture.chunks, start, Vec3::NEG_X, 20.0);
        assert!(result.impacted());
        assert_eq!(result.contact.normal, Vec3::X);
        assert!((result.contact.distance - 6.5).abs() < 1e-4);
        assert_eq!(result.contact.block.chunk(), Some(ChunkCoords::new(-1, -1)));
        assert_eq!(result.contact.block.world_position(), Some(IVec3::new(-4, -3, 60)));
    }

    #[test]
    fn diagonal_ray_reports_the_face_it_enters() {
        let mut fixture = Fixture::air(1);
        fixture.set(IVec3::new(3, 3, 50), BlockId::STONE);

        let start = Vec3::new(0.5, 0.5, 50.5);
        let result = raycast(&fixture.chunks, start, Vec3::new(1.0, 1.0, 0.0), 10.0);
        assert!(result.impacted());
        let hit = result.contact.position;
        assert!(hit.x >= 3.0 - 1e-4 && hit.y >= 3.0 - 1e-4);
        assert!(result.contact.normal == Vec3::NEG_X || result.contact.normal == Vec3::NEG_Y);
    }

    #[test]
    fn missing_ray_reports_full_fraction() {
        let fixture = Fixture::air(0);
        let result = raycast(&fixture.chunks, Vec3::new(8.5, 8.5, 120.5), Vec3::Z, 5.0);
        assert!(!result.impacted());
        assert_eq!(result.contact.fraction, 1.0);
        assert_eq!(result.end, Vec3::new(8.5, 8.5, 125.5));

        let outside = raycast(&fixture.chunks, Vec3::new(100.0, 0.0, 10.0), Vec3::X, 5.0);
        assert!(!outside.impacted());

        let leaves = raycast(&fixture.chunks, Vec3::new(8.5, 8.5, 10.5), Vec3::X, 50.0);
        assert!(!leaves.impacted());
    }

    #[test]
    fn ray_starting_inside_a_solid_hits_at_zero() {
        let mut fixture = Fixture::air(0);
        fixture.set(IVec3::new(2, 2, 2), BlockId::STONE);
        let dir = Vec3::new(0.0, 1.0, 0.0);
        let result = raycast(&fixture.chunks, Vec3::new(2.5, 2.5, 2.5), dir, 8.0);
        assert!(result.impacted());
        assert_eq!(result.contact.distance, 0.0);
        assert_eq!(result.contact.normal, -dir);
        assert_eq!(result.contact.position, Vec3::new(2.5, 2.5, 2.5));
    }

    #[test]
    fn face_contact_pushes_along_one_axis() {
        let mut fixture = Fixture::air(0);
        fixture.set(IVec3::new(5, 5, 10), BlockId::STONE);

        let sphere = CollisionSphere::new(Vec3::new(4.85, 5.5, 10.5), 0.3);
        let correction = collide(&fixture.chunks, &sphere).expect("overlaps +X face");
        let resolved = sphere.center + correction;
        assert!((resolved.x - 4.7).abs() < 1e-5);
        assert_eq!(resolved.y, 5.5);
        assert_eq!(resolved.z, 10.5);
    }

    #[test]
    fn sphere_clear_of_the_face_is_untouched() {
        let mut fixture = Fixture::air(0);
        fixture.set(IVec3::new(5, 5, 10), BlockId::STONE);
        let centered = CollisionSphere::new(Vec3::new(4.5, 5.5, 10.5), 0.3);
        assert!(collide(&fixture.chunks, &centered).is_none());
    }

    #[test]
    fn edge_contact_pushes_diagonally_away() {
        let mut fixture = Fixture::air(0);
        fixture.set(IVec3::new(6, 6, 20), BlockId::STONE);

        let sphere = CollisionSphere::new(Vec3::new(5.9, 5.9, 20.5), 0.3);
        let correction = collide(&fixture.chunks, &sphere).expect("overlaps edge");
        assert!(correction.x < 0.0 && correction.y < 0.0);
        assert!((correction.x - correction.y).abs() < 1e-6);
        assert_eq!(correction.z, 0.0);
        let resolved = sphere.center + correction;
        let distance = (resolved.truncate() - glam::Vec2::new(6.0, 6.0)).length();
        assert!((distance - 0.3).abs() < 1e-4);
    }

    #[test]
    fn corner_contact_pushes_in_three_dimensions() {
        let mut fixture = Fixture::air(0);
        fixture.set(IVec3::new(4, 4, 31), BlockId::STONE);

        let sphere = CollisionSphere::new(Vec3::new(3.9, 3.9, 30.9), 0.3);
        let correction = collide(&fixture.chunks, &sphere).expect("overlaps corner");
        assert!(correction.x < 0.0 && correction.y < 0.0 && correction.z < 0.0);
        let resolved = sphere.center + correction;
        assert!((resolved.distance(Vec3::new(4.0, 4.0, 31.0)) - 0.3).abs() < 1e-4);
    }

    #[test]
    fn ghost_bodies_skip_collision_and_others_stop() {
        let mut fixture = Fixture::air(0);
        fixture.set(IVec3::new(5, 5, 10), BlockId::STONE);

        let mut ghost = Body::new(Vec3::new(4.85, 5.5, 10.5), 0.3, PhysicsMode::Ghost);
        ghost.velocity = Vec3::X;
        assert!(!collide_body(&fixture.chunks, &mut ghost));
        assert_eq!(ghost.velocity, Vec3::X);

        let mut walker = Body::new(Vec3::new(4.85, 5.5, 10.0), 0.3, PhysicsMode::Walk);
        walker.collider_offset = Vec3::new(0.0, 0.0, 0.5);
        walker.velocity = Vec3::X;
        assert!(collide_body(&fixture.chunks, &mut walker));
        assert_eq!(walker.velocity, Vec3::ZERO);
        assert!((walker.transform.translation.x - 4.7).abs() < 1e-5);
    }
}
