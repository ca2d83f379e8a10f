//! CPU ray picking.
//!
//! A pointer click in viewport pixels is rescaled to normalized device
//! coordinates (Y inverted), unprojected through the camera's inverse
//! view-projection into a world-space ray, and intersected against the Scene
//! Registry's node set only — helper/decorative objects outside the registry
//! are never pickable. An AABB slab test prefilters each mesh before the
//! exact triangle test.

use crate::render::camera::OrbitCamera;
use crate::scene::{Aabb, MeshGeometry, NodeId, SceneAsset, SceneRegistry};
use glam::Vec3;

const EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    /// Distance from the ray origin, used to keep the closest hit.
    pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Pixel coordinates to NDC in [-1, 1], Y inverted.
pub fn screen_to_ndc(px: f32, py: f32, width: f32, height: f32) -> (f32, f32) {
    ((px / width) * 2.0 - 1.0, -((py / height) * 2.0 - 1.0))
}

pub fn ray_from_screen(
    px: f32,
    py: f32,
    width: f32,
    height: f32,
    camera: &OrbitCamera,
) -> Ray {
    let (nx, ny) = screen_to_ndc(px, py, width, height);
    let inverse_vp = camera.view_projection().inverse();
    // glam's perspective_rh uses [0, 1] clip depth.
    let near = inverse_vp.project_point3(Vec3::new(nx, ny, 0.0));
    let far = inverse_vp.project_point3(Vec3::new(nx, ny, 1.0));
    Ray {
        origin: near,
        direction: (far - near).normalize_or_zero(),
    }
}

/// Resolve the closest pickable node under the pointer, or `None` on a miss.
/// Pure query: mutates nothing.
pub fn pick(
    px: f32,
    py: f32,
    width: f32,
    height: f32,
    camera: &OrbitCamera,
    scene: &SceneAsset,
    registry: &SceneRegistry,
) -> Option<PickHit> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let ray = ray_from_screen(px, py, width, height, camera);
    if ray.direction == Vec3::ZERO {
        return None;
    }

    let mut best: Option<PickHit> = None;
    for entry in registry.iter() {
        let Some(mesh) = scene.mesh(entry.node) else {
            continue;
        };
        if !ray_intersects_aabb(&ray, mesh.geometry.bounds()) {
            continue;
        }
        if let Some(distance) = ray_mesh_distance(&ray, &mesh.geometry) {
            if best.map_or(true, |hit| distance < hit.distance) {
                best = Some(PickHit {
                    node: entry.node,
                    distance,
                });
            }
        }
    }
    best
}

fn ray_intersects_aabb(ray: &Ray, aabb: &Aabb) -> bool {
    if aabb.is_empty() {
        return false;
    }
    let inv = ray.direction.recip();
    let t1 = (aabb.min - ray.origin) * inv;
    let t2 = (aabb.max - ray.origin) * inv;
    let t_enter = t1.min(t2).max_element();
    let t_exit = t1.max(t2).min_element();
    t_exit >= t_enter.max(0.0)
}

fn ray_mesh_distance(ray: &Ray, geometry: &MeshGeometry) -> Option<f32> {
    geometry
        .triangles()
        .filter_map(|[a, b, c]| ray_triangle_distance(ray, a, b, c))
        .min_by(|lhs, rhs| lhs.total_cmp(rhs))
}

/// Möller–Trumbore, no backface culling: picking treats every surface as
/// double-sided.
fn ray_triangle_distance(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, MeshData, NodeKind, Pickable, SceneNode};
    use glam::Vec4;

    const W: f32 = 800.0;
    const H: f32 = 600.0;

    fn quad_at_z(z: f32, half: f32) -> MeshGeometry {
        MeshGeometry::new(
            vec![
                Vec3::new(-half, -half, z),
                Vec3::new(half, -half, z),
                Vec3::new(-half, half, z),
                Vec3::new(half, half, z),
            ],
            vec![0, 1, 2, 2, 1, 3],
        )
    }

    fn scene_with_quads(zs: &[f32]) -> (SceneAsset, SceneRegistry) {
        let mut nodes = Vec::new();
        let mut registry = SceneRegistry::new();
        for (i, z) in zs.iter().enumerate() {
            nodes.push(SceneNode {
                name: format!("quad{i}"),
                kind: NodeKind::Mesh(MeshData {
                    geometry: quad_at_z(*z, 1.0),
                    material: 0,
                    cast_shadow: true,
                    receive_shadow: true,
                }),
            });
            registry.push(Pickable {
                node: i,
                material: 0,
                original_color: Some(Vec4::ONE),
                name: format!("quad{i}"),
            });
        }
        let asset = SceneAsset::new(nodes, vec![Material::new("mat".to_string(), Some(Vec4::ONE))]);
        (asset, registry)
    }

    fn front_camera() -> OrbitCamera {
        let mut camera = OrbitCamera::from_eye_target(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.set_aspect(W, H);
        camera
    }

    #[test]
    fn ndc_conversion_inverts_y() {
        assert_eq!(screen_to_ndc(0.0, 0.0, W, H), (-1.0, 1.0));
        assert_eq!(screen_to_ndc(W, H, W, H), (1.0, -1.0));
        let (nx, ny) = screen_to_ndc(W / 2.0, H / 2.0, W, H);
        assert!(nx.abs() < 1e-6 && ny.abs() < 1e-6);
    }

    #[test]
    fn center_ray_points_down_the_view_axis() {
        let ray = ray_from_screen(W / 2.0, H / 2.0, W, H, &front_camera());
        assert!((ray.direction - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-3);
        assert!((ray.origin.z - 4.9).abs() < 1e-2);
    }

    #[test]
    fn center_click_hits_the_quad() {
        let (scene, registry) = scene_with_quads(&[0.0]);
        let hit = pick(W / 2.0, H / 2.0, W, H, &front_camera(), &scene, &registry)
            .expect("expected a hit");
        assert_eq!(hit.node, 0);
        assert!((hit.distance - 4.9).abs() < 1e-2);
    }

    #[test]
    fn corner_click_misses() {
        let (scene, registry) = scene_with_quads(&[0.0]);
        assert!(pick(2.0, 2.0, W, H, &front_camera(), &scene, &registry).is_none());
    }

    #[test]
    fn nearest_of_two_overlapping_quads_wins() {
        // Quad 0 behind quad 1 from a camera at +Z.
        let (scene, registry) = scene_with_quads(&[-1.0, 1.0]);
        let hit = pick(W / 2.0, H / 2.0, W, H, &front_camera(), &scene, &registry)
            .expect("expected a hit");
        assert_eq!(hit.node, 1);
    }

    #[test]
    fn unregistered_mesh_is_not_pickable() {
        let (scene, _) = scene_with_quads(&[0.0]);
        let empty = SceneRegistry::new();
        assert!(pick(W / 2.0, H / 2.0, W, H, &front_camera(), &scene, &empty).is_none());
    }

    #[test]
    fn degenerate_viewport_never_hits() {
        let (scene, registry) = scene_with_quads(&[0.0]);
        assert!(pick(0.0, 0.0, 0.0, 0.0, &front_camera(), &scene, &registry).is_none());
    }

    #[test]
    fn aabb_prefilter_agrees_with_triangle_test() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        let geometry = quad_at_z(0.0, 1.0);
        assert!(ray_intersects_aabb(&ray, geometry.bounds()));
        assert!(ray_mesh_distance(&ray, &geometry).is_some());

        let miss = Ray {
            origin: Vec3::new(10.0, 0.0, 5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(!ray_intersects_aabb(&miss, geometry.bounds()));
    }

    #[test]
    fn backface_triangles_are_still_hit() {
        let ray = Ray {
            origin: Vec3::new(0.1, 0.1, -5.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
        };
        let geometry = quad_at_z(0.0, 1.0);
        assert!(ray_mesh_distance(&ray, &geometry).is_some());
    }
}
