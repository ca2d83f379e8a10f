pub mod highlight;

use glam::{Vec3, Vec4};

pub type NodeId = usize;
pub type MaterialId = usize;

/// Discriminant for [`NodeKind`], used by the kind-filtered iteration API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindTag {
    Mesh,
    Group,
    Light,
    Camera,
    Other,
}

/// Typed scene-node variants. Only `Mesh` carries renderable/pickable data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh(MeshData),
    Group,
    Light,
    Camera,
    Other,
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Mesh(_) => NodeKindTag::Mesh,
            NodeKind::Group => NodeKindTag::Group,
            NodeKind::Light => NodeKindTag::Light,
            NodeKind::Camera => NodeKindTag::Camera,
            NodeKind::Other => NodeKindTag::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct MeshData {
    pub geometry: MeshGeometry,
    pub material: MaterialId,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

/// Triangle geometry with world-space positions baked at load time
/// (the scene is static, so transforms are folded into the vertices).
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl MeshGeometry {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(&positions);
        Self {
            positions,
            indices,
            bounds,
        }
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate world-space triangles.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(move |tri| {
            let a = *self.positions.get(tri[0] as usize)?;
            let b = *self.positions.get(tri[1] as usize)?;
            let c = *self.positions.get(tri[2] as usize)?;
            Some([a, b, c])
        })
    }
}

/// Presence and sampling state of a material's base color texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub anisotropy: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Live base color. `None` when the source material has no color channel.
    pub base_color: Option<Vec4>,
    pub env_intensity: f32,
    pub color_texture: Option<TextureInfo>,
    /// Set when the engine must refresh this material next frame.
    pub needs_update: bool,
}

impl Material {
    pub fn new(name: String, base_color: Option<Vec4>) -> Self {
        Self {
            name,
            base_color,
            env_intensity: 1.0,
            color_texture: None,
            needs_update: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.min = aabb.min.min(*p);
            aabb.max = aabb.max.max(*p);
        }
        aabb
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.max - self.min) * 0.5
        }
    }
}

/// The loaded scene graph: flattened node list plus the material table.
#[derive(Debug, Default)]
pub struct SceneAsset {
    nodes: Vec<SceneNode>,
    materials: Vec<Material>,
    bounds: Aabb,
}

impl SceneAsset {
    pub fn new(nodes: Vec<SceneNode>, materials: Vec<Material>) -> Self {
        let bounds = nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Mesh(mesh) => Some(*mesh.geometry.bounds()),
                _ => None,
            })
            .fold(Aabb::EMPTY, |acc, b| acc.union(&b));
        Self {
            nodes,
            materials,
            bounds,
        }
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Iterate nodes of a single kind, yielding their ids.
    pub fn nodes_of_kind(
        &self,
        tag: NodeKindTag,
    ) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.kind.tag() == tag)
    }

    pub fn mesh(&self, id: NodeId) -> Option<&MeshData> {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut MeshData> {
        match self.nodes.get_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Centroid of the asset's bounding volume; orbit target after load.
    pub fn centroid(&self) -> Vec3 {
        self.bounds.center()
    }
}

/// Registry entry for one pickable mesh node.
#[derive(Debug, Clone)]
pub struct Pickable {
    pub node: NodeId,
    pub material: MaterialId,
    /// Snapshot of the base color at load time. Never overwritten afterwards;
    /// all derived colors (saturation, highlight revert) come from here.
    pub original_color: Option<Vec4>,
    pub name: String,
}

/// The set of mesh nodes eligible for ray-intersection selection.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    entries: Vec<Pickable>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: Pickable) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pickable> {
        self.entries.iter()
    }

    pub fn find(&self, node: NodeId) -> Option<&Pickable> {
        self.entries.iter().find(|entry| entry.node == node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
pub(crate) fn test_quad(offset: Vec3) -> MeshGeometry {
    MeshGeometry::new(
        vec![
            offset,
            offset + Vec3::X,
            offset + Vec3::Y,
            offset + Vec3::X + Vec3::Y,
        ],
        vec![0, 1, 2, 2, 1, 3],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_node(offset: Vec3) -> SceneNode {
        SceneNode {
            name: "quad".to_string(),
            kind: NodeKind::Mesh(MeshData {
                geometry: test_quad(offset),
                material: 0,
                cast_shadow: false,
                receive_shadow: false,
            }),
        }
    }

    #[test]
    fn nodes_of_kind_filters_variants() {
        let asset = SceneAsset::new(
            vec![
                SceneNode {
                    name: "root".to_string(),
                    kind: NodeKind::Group,
                },
                mesh_node(Vec3::ZERO),
                SceneNode {
                    name: "sun".to_string(),
                    kind: NodeKind::Light,
                },
                SceneNode {
                    name: "cam".to_string(),
                    kind: NodeKind::Camera,
                },
            ],
            vec![Material::new("mat".to_string(), Some(Vec4::ONE))],
        );

        let meshes: Vec<NodeId> = asset
            .nodes_of_kind(NodeKindTag::Mesh)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(meshes, vec![1]);
        assert_eq!(asset.nodes_of_kind(NodeKindTag::Light).count(), 1);
        assert_eq!(asset.nodes_of_kind(NodeKindTag::Other).count(), 0);
        assert!(asset.mesh(1).is_some());
        assert!(asset.mesh(0).is_none());
    }

    #[test]
    fn asset_bounds_cover_all_meshes() {
        let asset = SceneAsset::new(
            vec![mesh_node(Vec3::ZERO), mesh_node(Vec3::new(4.0, 0.0, 0.0))],
            vec![Material::new("mat".to_string(), Some(Vec4::ONE))],
        );
        assert_eq!(asset.bounds().min, Vec3::ZERO);
        assert_eq!(asset.bounds().max, Vec3::new(5.0, 1.0, 0.0));
        assert_eq!(asset.centroid(), Vec3::new(2.5, 0.5, 0.0));
    }

    #[test]
    fn empty_asset_has_origin_centroid() {
        let asset = SceneAsset::new(Vec::new(), Vec::new());
        assert!(asset.bounds().is_empty());
        assert_eq!(asset.centroid(), Vec3::ZERO);
    }

    #[test]
    fn triangles_skip_out_of_range_indices() {
        let geometry =
            MeshGeometry::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2, 0, 1, 9]);
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.triangles().count(), 1);
    }

    #[test]
    fn registry_find_by_node() {
        let mut registry = SceneRegistry::new();
        registry.push(Pickable {
            node: 3,
            material: 0,
            original_color: Some(Vec4::ONE),
            name: "quad".to_string(),
        });
        assert!(registry.find(3).is_some());
        assert!(registry.find(0).is_none());
        assert_eq!(registry.len(), 1);
    }
}
