//! Global render parameters and their propagation to the engine and scene
//! materials. Each setter is idempotent and takes effect on the next frame.

use crate::render::RenderEngine;
use crate::scene::{SceneAsset, SceneRegistry};

pub const EXPOSURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=3.0;
pub const ENV_INTENSITY_RANGE: std::ops::RangeInclusive<f32> = 0.0..=5.0;
pub const SATURATION_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Tone-mapping curve presets, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ToneMapping {
    None,
    Linear,
    Reinhard,
    FilmicCineon,
    FilmicAces,
    Agx,
    PerceptualNeutral,
}

impl ToneMapping {
    pub const ALL: [ToneMapping; 7] = [
        ToneMapping::None,
        ToneMapping::Linear,
        ToneMapping::Reinhard,
        ToneMapping::FilmicCineon,
        ToneMapping::FilmicAces,
        ToneMapping::Agx,
        ToneMapping::PerceptualNeutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ToneMapping::None => "No tone mapping",
            ToneMapping::Linear => "Linear",
            ToneMapping::Reinhard => "Reinhard",
            ToneMapping::FilmicCineon => "Filmic (Cineon)",
            ToneMapping::FilmicAces => "Filmic (ACES)",
            ToneMapping::Agx => "AgX",
            ToneMapping::PerceptualNeutral => "Neutral (Khronos)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderParameters {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub env_intensity: f32,
    pub saturation: f32,
    /// Reserved; no control or effect consumes it.
    pub contrast: f32,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            tone_mapping: ToneMapping::Agx,
            exposure: 1.0,
            env_intensity: 1.0,
            saturation: 1.0,
            contrast: 1.0,
        }
    }
}

/// Set the engine's global curve and mark every material dirty so the new
/// curve takes visual effect without a scene reload.
pub fn set_tone_mapping(
    params: &mut RenderParameters,
    scene: Option<&mut SceneAsset>,
    engine: &mut dyn RenderEngine,
    mode: ToneMapping,
) {
    params.tone_mapping = mode;
    engine.set_tone_mapping(mode);
    if let Some(scene) = scene {
        for material in scene.materials_mut() {
            material.needs_update = true;
        }
    }
}

pub fn set_exposure(params: &mut RenderParameters, engine: &mut dyn RenderEngine, value: f32) {
    let value = value.clamp(*EXPOSURE_RANGE.start(), *EXPOSURE_RANGE.end());
    params.exposure = value;
    engine.set_exposure(value);
}

/// Environment contribution applies to every material in the scene graph,
/// not only Scene Registry nodes.
pub fn set_env_intensity(
    params: &mut RenderParameters,
    scene: Option<&mut SceneAsset>,
    value: f32,
) {
    let value = value.clamp(*ENV_INTENSITY_RANGE.start(), *ENV_INTENSITY_RANGE.end());
    params.env_intensity = value;
    if let Some(scene) = scene {
        for material in scene.materials_mut() {
            material.env_intensity = value;
        }
    }
}

/// Non-destructive: live color = original color × value, the snapshot is
/// untouched, so repeated sweeps never drift and a later highlight still
/// reverts to the true original.
pub fn set_saturation(
    params: &mut RenderParameters,
    scene: Option<&mut SceneAsset>,
    registry: &SceneRegistry,
    value: f32,
) {
    let value = value.clamp(*SATURATION_RANGE.start(), *SATURATION_RANGE.end());
    params.saturation = value;
    let Some(scene) = scene else {
        return;
    };
    for entry in registry.iter() {
        let Some(original) = entry.original_color else {
            continue;
        };
        if let Some(material) = scene.material_mut(entry.material) {
            let scaled = original.truncate() * value;
            material.base_color = Some(scaled.extend(original.w));
        }
    }
}
