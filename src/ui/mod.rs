//! egui surfaces: the render-parameter control panel and the loading
//! overlay. Both only surface values; applying them is the app's job.

use crate::render::params::{ENV_INTENSITY_RANGE, EXPOSURE_RANGE, SATURATION_RANGE};
use crate::render::{RenderParameters, ToneMapping};
use std::time::{Duration, Instant};

/// Hold the full bar on screen briefly before retiring the overlay.
const COMPLETION_HOLD: Duration = Duration::from_millis(500);

/// Which controls changed this frame, with their new values.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PanelOutput {
    pub tone_mapping: Option<ToneMapping>,
    pub exposure: Option<f32>,
    pub env_intensity: Option<f32>,
    pub saturation: Option<f32>,
}

impl PanelOutput {
    pub fn any(&self) -> bool {
        self.tone_mapping.is_some()
            || self.exposure.is_some()
            || self.env_intensity.is_some()
            || self.saturation.is_some()
    }
}

pub struct ControlPanel {
    tone_mapping: ToneMapping,
    exposure: f32,
    env_intensity: f32,
    saturation: f32,
}

impl ControlPanel {
    pub fn new(params: &RenderParameters) -> Self {
        Self {
            tone_mapping: params.tone_mapping,
            exposure: params.exposure,
            env_intensity: params.env_intensity,
            saturation: params.saturation,
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> PanelOutput {
        let mut out = PanelOutput::default();
        egui::SidePanel::right("render-controls")
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Render");

                let previous = self.tone_mapping;
                egui::ComboBox::from_label("Tone mapping")
                    .selected_text(self.tone_mapping.label())
                    .show_ui(ui, |ui| {
                        for mode in ToneMapping::ALL {
                            ui.selectable_value(&mut self.tone_mapping, mode, mode.label());
                        }
                    });
                if self.tone_mapping != previous {
                    out.tone_mapping = Some(self.tone_mapping);
                }

                if ui
                    .add(egui::Slider::new(&mut self.exposure, EXPOSURE_RANGE).text("Exposure"))
                    .changed()
                {
                    out.exposure = Some(self.exposure);
                }
                if ui
                    .add(
                        egui::Slider::new(&mut self.env_intensity, ENV_INTENSITY_RANGE)
                            .text("Environment light"),
                    )
                    .changed()
                {
                    out.env_intensity = Some(self.env_intensity);
                }

                ui.separator();
                ui.label("Material color");
                if ui
                    .add(
                        egui::Slider::new(&mut self.saturation, SATURATION_RANGE)
                            .text("Saturation"),
                    )
                    .changed()
                {
                    out.saturation = Some(self.saturation);
                }
            });
        out
    }
}

/// Loading progress bar; shows one monotonic percentage and retires itself
/// on the completion signal (with a short hold at 100%) or immediately on
/// failure.
#[derive(Debug)]
pub struct LoadingOverlay {
    percent: f32,
    visible: bool,
    retire_at: Option<Instant>,
}

impl Default for LoadingOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingOverlay {
    pub fn new() -> Self {
        Self {
            percent: 0.0,
            visible: true,
            retire_at: None,
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn set_percent(&mut self, percent: f32) {
        if self.visible {
            self.percent = percent.clamp(0.0, 100.0);
        }
    }

    /// Completion signal: pin the bar at 100 and retire after a short hold,
    /// so the user actually sees the full bar.
    pub fn finish(&mut self, now: Instant) {
        if self.visible && self.retire_at.is_none() {
            self.percent = 100.0;
            self.retire_at = Some(now + COMPLETION_HOLD);
        }
    }

    /// Failure path: dismissed without the hold.
    pub fn dismiss(&mut self) {
        self.visible = false;
        self.retire_at = None;
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(retire_at) = self.retire_at {
            if now >= retire_at {
                self.visible = false;
                self.retire_at = None;
            }
        }
    }

    pub fn show(&self, ctx: &egui::Context) {
        if !self.visible {
            return;
        }
        egui::Area::new(egui::Id::new("loading-overlay"))
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label("Loading scene…");
                    ui.add(
                        egui::ProgressBar::new(self.percent / 100.0)
                            .desired_width(240.0)
                            .text(format!("{:.0}%", self.percent)),
                    );
                });
            });
    }
}
