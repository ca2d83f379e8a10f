pub mod camera;
pub mod params;
pub mod pick;

pub use camera::OrbitCamera;
pub use params::{RenderParameters, ToneMapping};

use crate::scene::SceneAsset;

/// Contract the viewer core drives on the rendering-engine collaborator.
///
/// Rasterization, shading and environment prefiltering live behind this
/// seam; the core only sets global state, propagates the surface size and
/// issues one render per frame.
pub trait RenderEngine {
    fn set_tone_mapping(&mut self, mode: ToneMapping);
    fn set_exposure(&mut self, exposure: f32);
    fn set_surface_size(&mut self, width: u32, height: u32);
    fn render(&mut self, scene: Option<&mut SceneAsset>, camera: &OrbitCamera);
    fn paint_ui(
        &mut self,
        pixels_per_point: f32,
        textures_delta: egui::TexturesDelta,
        primitives: Vec<egui::ClippedPrimitive>,
    );
}

/// Engine implementation without a GPU: records global render state and
/// consumes material dirty flags, so the state layer runs (and is observable
/// in tests) end to end.
#[derive(Debug)]
pub struct HeadlessEngine {
    tone_mapping: ToneMapping,
    exposure: f32,
    surface_size: (u32, u32),
    frames_rendered: u64,
    materials_refreshed: u64,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            tone_mapping: ToneMapping::Agx,
            exposure: 1.0,
            surface_size: (0, 0),
            frames_rendered: 0,
            materials_refreshed: 0,
        }
    }

    pub fn tone_mapping(&self) -> ToneMapping {
        self.tone_mapping
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn materials_refreshed(&self) -> u64 {
        self.materials_refreshed
    }
}

impl RenderEngine for HeadlessEngine {
    fn set_tone_mapping(&mut self, mode: ToneMapping) {
        self.tone_mapping = mode;
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_size = (width.max(1), height.max(1));
    }

    fn render(&mut self, scene: Option<&mut SceneAsset>, _camera: &OrbitCamera) {
        if let Some(scene) = scene {
            for material in scene.materials_mut() {
                if material.needs_update {
                    material.needs_update = false;
                    self.materials_refreshed += 1;
                }
            }
        }
        self.frames_rendered += 1;
    }

    fn paint_ui(
        &mut self,
        _pixels_per_point: f32,
        _textures_delta: egui::TexturesDelta,
        _primitives: Vec<egui::ClippedPrimitive>,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, SceneAsset};
    use glam::Vec4;

    #[test]
    fn render_consumes_dirty_flags() {
        let mut engine = HeadlessEngine::new();
        let mut scene = SceneAsset::new(
            Vec::new(),
            vec![
                Material::new("a".to_string(), Some(Vec4::ONE)),
                Material::new("b".to_string(), Some(Vec4::ONE)),
            ],
        );
        for material in scene.materials_mut() {
            material.needs_update = true;
        }

        engine.render(Some(&mut scene), &OrbitCamera::new());
        assert_eq!(engine.materials_refreshed(), 2);
        assert!(scene.materials().iter().all(|m| !m.needs_update));

        engine.render(Some(&mut scene), &OrbitCamera::new());
        assert_eq!(engine.materials_refreshed(), 2);
        assert_eq!(engine.frames_rendered(), 2);
    }

    #[test]
    fn surface_size_is_clamped_to_one() {
        let mut engine = HeadlessEngine::new();
        engine.set_surface_size(0, 0);
        assert_eq!(engine.surface_size(), (1, 1));
    }
}
