use eframe::egui::{Pos2, Rect, Vec2};

#[derive(Clone, Debug)]
pub struct ViewportConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
    pub zoom_animation_secs: f64,
    /// Offset of graph-space origin from the canvas corner, so level 0 is
    /// not clipped at the top edge.
    pub origin_padding: Vec2,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.3,
            max_zoom: 1.5,
            zoom_step: 0.1,
            zoom_animation_secs: 0.25,
            origin_padding: Vec2::new(0.0, 60.0),
        }
    }
}

/// Translate plus uniform scale from graph space to screen space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub pan: Vec2,
    pub zoom: f32,
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        pan: Vec2::ZERO,
        zoom: 1.0,
    };

    pub fn to_screen(self, origin: Pos2, graph: Vec2) -> Pos2 {
        origin + self.pan + graph * self.zoom
    }

    pub fn to_graph(self, origin: Pos2, screen: Pos2) -> Vec2 {
        (screen - origin - self.pan) / self.zoom
    }

    /// Pan that keeps `graph` under `anchor` at `zoom`.
    fn pan_for_anchor(origin: Pos2, anchor: Pos2, graph: Vec2, zoom: f32) -> Vec2 {
        anchor - origin - graph * zoom
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Copy, Debug)]
struct ZoomAnimation {
    from_zoom: f32,
    to_zoom: f32,
    anchor: Pos2,
    anchor_graph: Vec2,
    started_at: f64,
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn round_percent(zoom: f32) -> f32 {
    (zoom * 100.0).round() / 100.0
}

pub struct Viewport {
    config: ViewportConfig,
    canvas: Rect,
    transform: ViewTransform,
    target_zoom: f32,
    animation: Option<ZoomAnimation>,
    readout_percent: u32,
}

impl Viewport {
    pub fn new(config: ViewportConfig, canvas: Rect) -> Self {
        Self {
            config,
            canvas,
            transform: ViewTransform::IDENTITY,
            target_zoom: 1.0,
            animation: None,
            readout_percent: 100,
        }
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn canvas(&self) -> Rect {
        self.canvas
    }

    pub fn origin(&self) -> Pos2 {
        self.canvas.min + self.config.origin_padding
    }

    pub fn set_canvas(&mut self, canvas: Rect) {
        self.canvas = canvas;
    }

    pub fn to_screen(&self, graph: Vec2) -> Pos2 {
        self.transform.to_screen(self.origin(), graph)
    }

    pub fn to_graph(&self, screen: Pos2) -> Vec2 {
        self.transform.to_graph(self.origin(), screen)
    }

    pub fn target_zoom(&self) -> f32 {
        self.target_zoom
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Displayed zoom percentage, refreshed by [`Viewport::end_frame`].
    pub fn zoom_percent(&self) -> u32 {
        self.readout_percent
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.config.min_zoom, self.config.max_zoom)
    }

    pub fn zoom_in(&mut self, now: f64) {
        self.step_zoom(self.config.zoom_step, now);
    }

    pub fn zoom_out(&mut self, now: f64) {
        self.step_zoom(-self.config.zoom_step, now);
    }

    fn step_zoom(&mut self, delta: f32, now: f64) {
        let target = round_percent(self.clamp_zoom(self.target_zoom + delta));
        self.target_zoom = target;

        let anchor = self.canvas.center();
        self.animation = Some(ZoomAnimation {
            from_zoom: self.transform.zoom,
            to_zoom: target,
            anchor,
            anchor_graph: self.to_graph(anchor),
            started_at: now,
        });
    }

    /// Wheel or pinch zoom around `pointer`; applies immediately.
    pub fn zoom_at(&mut self, pointer: Pos2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.animation = None;
        let graph = self.to_graph(pointer);
        let zoom = self.clamp_zoom(self.transform.zoom * factor);
        self.transform = ViewTransform {
            pan: ViewTransform::pan_for_anchor(self.origin(), pointer, graph, zoom),
            zoom,
        };
        self.target_zoom = zoom;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        if delta.is_finite() {
            self.transform.pan += delta;
        }
    }

    pub fn reset(&mut self) {
        self.transform = ViewTransform::IDENTITY;
        self.target_zoom = 1.0;
        self.animation = None;
    }

    /// Advances the zoom animation to `now`.
    pub fn advance(&mut self, now: f64) {
        let Some(animation) = self.animation else {
            return;
        };

        let duration = self.config.zoom_animation_secs.max(f64::EPSILON);
        let t = ((now - animation.started_at) / duration) as f32;
        let zoom = if t >= 1.0 {
            self.animation = None;
            animation.to_zoom
        } else {
            animation.from_zoom + (animation.to_zoom - animation.from_zoom) * smoothstep(t)
        };

        self.transform = ViewTransform {
            pan: ViewTransform::pan_for_anchor(
                self.origin(),
                animation.anchor,
                animation.anchor_graph,
                zoom,
            ),
            zoom,
        };
    }

    /// Syncs the readout once per frame; returns whether it changed.
    pub fn end_frame(&mut self) -> bool {
        let percent = (self.transform.zoom * 100.0).round() as u32;
        let changed = percent != self.readout_percent;
        self.readout_percent = percent;
        changed
    }
}
