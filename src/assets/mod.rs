//! Asynchronous single-asset loading.
//!
//! The loader runs on a worker thread and streams [`LoadEvent`]s over an
//! mpsc channel; the event-loop thread drains the channel once per frame, so
//! all scene state mutation stays on one thread. Every resource's byte total
//! is fixed before its first progress tick, and the root file's completion
//! tick is withheld until every external resource is registered, so the
//! aggregate percentage is monotonic and stays below 100 until the last
//! byte.

use crate::scene::{
    Material, MeshData, MeshGeometry, NodeKind, Pickable, SceneAsset, SceneNode, SceneRegistry,
    TextureInfo,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use glam::{Mat4, Vec3, Vec4};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

/// Anisotropic filtering applied to every base color texture at load time.
pub const MAX_ANISOTROPY: f32 = 16.0;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to decode image {name}: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported resource URI {uri}")]
    UnsupportedUri { uri: String },
    #[error("invalid base64 data URI: {source}")]
    DataUri {
        #[source]
        source: base64::DecodeError,
    },
    #[error("missing binary chunk in {path}")]
    MissingBlob { path: String },
}

/// One value of the load stream; consumers subscribe to these instead of
/// separate progress/success/error callbacks.
#[derive(Debug)]
pub enum LoadEvent {
    Progress { url: String, loaded: u64, total: u64 },
    Completed(SceneAsset),
    Failed(AssetError),
}

/// Aggregates per-resource `(loaded, total)` pairs into one 0–100 percentage
/// that never decreases and reaches 100 exactly once.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    resources: Vec<(String, u64, u64)>,
    reported: f32,
    finished: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one progress tick. Returns `Some(percent)` only when the
    /// aggregate advanced; nothing is surfaced after 100 has been reported.
    pub fn update(&mut self, url: &str, loaded: u64, total: u64) -> Option<f32> {
        if self.finished {
            return None;
        }
        match self
            .resources
            .iter_mut()
            .find(|(existing, _, _)| existing == url)
        {
            Some(entry) => {
                entry.2 = entry.2.max(total);
                entry.1 = entry.1.max(loaded.min(entry.2));
            }
            None => self.resources.push((url.to_string(), loaded.min(total), total)),
        }

        let (sum_loaded, sum_total) = self
            .resources
            .iter()
            .fold((0u64, 0u64), |(l, t), entry| (l + entry.1, t + entry.2));
        if sum_total == 0 {
            return None;
        }
        // 100 requires byte equality; the f32 cast must not round a nearly
        // complete fraction up to it.
        let percent = if sum_loaded >= sum_total {
            100.0
        } else {
            (((sum_loaded as f64 / sum_total as f64) * 100.0).min(99.99)) as f32
        };
        if percent > self.reported {
            self.reported = percent;
            if percent >= 100.0 {
                self.finished = true;
            }
            Some(percent)
        } else {
            None
        }
    }

    pub fn percent(&self) -> f32 {
        self.reported
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Start loading on a worker thread; the returned receiver yields progress
/// ticks followed by exactly one `Completed` or `Failed`.
pub fn spawn_load(path: PathBuf) -> Receiver<LoadEvent> {
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("asset-loader".to_string())
        .spawn(move || {
            log::info!("Loading asset {}", path.display());
            match load_scene(&path, &tx) {
                Ok(asset) => {
                    log::info!(
                        "Asset loaded: {} nodes, {} materials",
                        asset.nodes().len(),
                        asset.materials().len()
                    );
                    let _ = tx.send(LoadEvent::Completed(asset));
                }
                Err(err) => {
                    let _ = tx.send(LoadEvent::Failed(err));
                }
            }
        });
    if let Err(err) = spawned {
        // Receiver will observe the disconnect and treat the load as over.
        log::error!("Failed to spawn asset loader thread: {err}");
    }
    rx
}

/// Post-load walk over the parsed asset: enable shadows on every mesh, apply
/// max anisotropy to color textures, snapshot original base colors and build
/// the pickable registry.
pub fn prepare_scene(asset: &mut SceneAsset) -> SceneRegistry {
    let mut registry = SceneRegistry::new();
    let mesh_ids: Vec<usize> = (0..asset.nodes().len())
        .filter(|id| asset.mesh(*id).is_some())
        .collect();

    for id in mesh_ids {
        let name = asset
            .node(id)
            .map(|node| node.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("unnamed")
            .to_string();
        let Some(mesh) = asset.mesh_mut(id) else {
            continue;
        };
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;
        let material_id = mesh.material;

        let original_color = match asset.material_mut(material_id) {
            Some(material) => {
                if let Some(texture) = material.color_texture.as_mut() {
                    texture.anisotropy = MAX_ANISOTROPY;
                }
                material.base_color
            }
            None => None,
        };
        registry.push(Pickable {
            node: id,
            material: material_id,
            original_color,
            name,
        });
    }
    registry
}

fn load_scene(path: &Path, tx: &Sender<LoadEvent>) -> Result<SceneAsset, AssetError> {
    let root_url = path.display().to_string();
    let root_total = std::fs::metadata(path)
        .map_err(|source| AssetError::Io {
            path: root_url.clone(),
            source,
        })?
        .len();
    // The root streams fractional ticks as it is read, but its completion
    // tick waits until the external resources (only discoverable by parsing
    // the root) are registered, so the aggregate cannot reach 100 early.
    emit_progress(tx, &root_url, 0, root_total);
    let root_bytes = read_resource_chunked(path, &root_url, root_total, tx, false)?;

    let mut gltf = gltf::Gltf::from_slice(&root_bytes).map_err(|source| AssetError::Parse {
        path: root_url.clone(),
        source,
    })?;
    let blob = gltf.blob.take();
    let document = gltf.document;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let external_uris = collect_external_uris(&document);
    let mut externals: Vec<(String, PathBuf, u64)> = Vec::with_capacity(external_uris.len());
    for uri in external_uris {
        let resource_path = base_dir.join(&uri);
        let total = std::fs::metadata(&resource_path)
            .map_err(|source| AssetError::Io {
                path: resource_path.display().to_string(),
                source,
            })?
            .len();
        externals.push((uri, resource_path, total));
    }

    for (uri, _, total) in &externals {
        emit_progress(tx, uri, 0, *total);
    }
    emit_progress(tx, &root_url, root_total, root_total);

    let mut external_data: HashMap<String, Vec<u8>> = HashMap::new();
    for (uri, resource_path, total) in &externals {
        let bytes = read_resource_chunked(resource_path, uri, *total, tx, true)?;
        external_data.insert(uri.clone(), bytes);
    }

    let buffers = assemble_buffers(&document, blob, &root_url, &external_data)?;
    let image_sizes = decode_images(&document, &buffers, &external_data)?;
    let materials = build_materials(&document, &image_sizes);
    let nodes = build_nodes(&document, &buffers);
    Ok(SceneAsset::new(nodes, materials))
}

fn emit_progress(tx: &Sender<LoadEvent>, url: &str, loaded: u64, total: u64) {
    let _ = tx.send(LoadEvent::Progress {
        url: url.to_string(),
        loaded,
        total,
    });
}

/// Read a file emitting a fractional tick per chunk. The `(total, total)`
/// completion tick is only sent when `emit_completion` is set; the root file
/// defers its own until the full resource set is known.
fn read_resource_chunked(
    path: &Path,
    url: &str,
    total: u64,
    tx: &Sender<LoadEvent>,
    emit_completion: bool,
) -> Result<Vec<u8>, AssetError> {
    let io_err = |source| AssetError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut chunk).map_err(io_err)?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        let loaded = (bytes.len() as u64).min(total);
        if loaded < total {
            emit_progress(tx, url, loaded, total);
        }
    }
    if emit_completion {
        emit_progress(tx, url, total, total);
    }
    Ok(bytes)
}

fn collect_external_uris(document: &gltf::Document) -> Vec<String> {
    let mut uris = Vec::new();
    let mut push = |uri: &str| {
        // Embedded data URIs are decoded in place, not fetched.
        if uri.starts_with("data:") {
            return;
        }
        if !uris.iter().any(|existing: &String| existing == uri) {
            uris.push(uri.to_string());
        }
    };
    for buffer in document.buffers() {
        if let gltf::buffer::Source::Uri(uri) = buffer.source() {
            push(uri);
        }
    }
    for image in document.images() {
        if let gltf::image::Source::Uri { uri, .. } = image.source() {
            push(uri);
        }
    }
    uris
}

/// Decode a base64 `data:` URI payload (the embedded-buffer/texture form of
/// glTF).
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let Some((_, payload)) = uri.split_once(";base64,") else {
        return Err(AssetError::UnsupportedUri {
            uri: uri.chars().take(48).collect(),
        });
    };
    BASE64
        .decode(payload)
        .map_err(|source| AssetError::DataUri { source })
}

fn assemble_buffers(
    document: &gltf::Document,
    blob: Option<Vec<u8>>,
    root_url: &str,
    external_data: &HashMap<String, Vec<u8>>,
) -> Result<Vec<Vec<u8>>, AssetError> {
    let mut blob = blob;
    let mut buffers = Vec::new();
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob.take().ok_or_else(|| AssetError::MissingBlob {
                path: root_url.to_string(),
            })?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)?,
            gltf::buffer::Source::Uri(uri) => external_data
                .get(uri)
                .cloned()
                .ok_or_else(|| AssetError::UnsupportedUri {
                    uri: uri.to_string(),
                })?,
        };
        buffers.push(data);
    }
    Ok(buffers)
}

/// Decode every image to validate it and record its dimensions; the pixel
/// data itself belongs to the rendering engine, not this layer.
fn decode_images(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    external_data: &HashMap<String, Vec<u8>>,
) -> Result<Vec<(u32, u32)>, AssetError> {
    let mut sizes = Vec::new();
    for image in document.images() {
        let name = image
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("image #{}", image.index()));
        let embedded;
        let bytes: &[u8] = match image.source() {
            gltf::image::Source::View { view, .. } => {
                let data = buffers.get(view.buffer().index()).map(Vec::as_slice);
                match data.and_then(|d| d.get(view.offset()..view.offset() + view.length())) {
                    Some(slice) => slice,
                    None => {
                        return Err(AssetError::UnsupportedUri {
                            uri: format!("buffer view for {name}"),
                        })
                    }
                }
            }
            gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
                embedded = decode_data_uri(uri)?;
                &embedded
            }
            gltf::image::Source::Uri { uri, .. } => external_data
                .get(uri)
                .map(Vec::as_slice)
                .ok_or_else(|| AssetError::UnsupportedUri {
                    uri: uri.to_string(),
                })?,
        };
        let decoded = image::load_from_memory(bytes)
            .map_err(|source| AssetError::Image { name, source })?;
        sizes.push((decoded.width(), decoded.height()));
    }
    Ok(sizes)
}

fn build_materials(document: &gltf::Document, image_sizes: &[(u32, u32)]) -> Vec<Material> {
    let mut materials: Vec<Material> = document
        .materials()
        .map(|source| {
            let name = source
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material #{}", source.index().unwrap_or(0)));
            let pbr = source.pbr_metallic_roughness();
            let mut material = Material::new(name, Some(Vec4::from(pbr.base_color_factor())));
            if let Some(info) = pbr.base_color_texture() {
                let image_index = info.texture().source().index();
                if let Some(&(width, height)) = image_sizes.get(image_index) {
                    material.color_texture = Some(TextureInfo {
                        width,
                        height,
                        anisotropy: 1.0,
                    });
                }
            }
            material
        })
        .collect();
    // Slot for primitives that reference no material.
    materials.push(Material::new("default".to_string(), Some(Vec4::ONE)));
    materials
}

fn build_nodes(document: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<SceneNode> {
    let default_material = document.materials().len();
    let mut nodes = Vec::new();
    let scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            visit_node(&node, Mat4::IDENTITY, default_material, buffers, &mut nodes);
        }
    }
    nodes
}

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    default_material: usize,
    buffers: &[Vec<u8>],
    out: &mut Vec<SceneNode>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    let name = node.name().unwrap_or("").to_string();

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping non-triangle primitive in mesh {:?}",
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions
                .map(|p| world.transform_point3(Vec3::from(p)))
                .collect();
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let material = primitive
                .material()
                .index()
                .unwrap_or(default_material);
            out.push(SceneNode {
                name: if name.is_empty() {
                    mesh.name().unwrap_or("").to_string()
                } else {
                    name.clone()
                },
                kind: NodeKind::Mesh(MeshData {
                    geometry: MeshGeometry::new(positions, indices),
                    material,
                    cast_shadow: false,
                    receive_shadow: false,
                }),
            });
        }
    } else if node.camera().is_some() {
        out.push(SceneNode {
            name,
            kind: NodeKind::Camera,
        });
    } else if node.light().is_some() {
        out.push(SceneNode {
            name,
            kind: NodeKind::Light,
        });
    } else if node.children().count() > 0 {
        out.push(SceneNode {
            name,
            kind: NodeKind::Group,
        });
    } else {
        out.push(SceneNode {
            name,
            kind: NodeKind::Other,
        });
    }

    for child in node.children() {
        visit_node(&child, world, default_material, buffers, out);
    }
}
