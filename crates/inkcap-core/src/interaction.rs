use crate::layout::ForceLayout;
use std::mem;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;
pub const ZOOM_STEP: f32 = 0.1;
pub const PICK_RADIUS: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }
}

impl Camera {
    pub fn screen_to_world(&self, sx: f32, sy: f32) -> (f32, f32) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    pub fn world_to_screen(&self, wx: f32, wy: f32) -> (f32, f32) {
        (
            wx * self.scale + self.offset_x,
            wy * self.scale + self.offset_y,
        )
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    // Additive zoom, clamped, anchored at the transform origin.
    pub fn zoom(&mut self, delta: f32) {
        self.scale = (self.scale + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gesture {
    Idle,
    DragNode(String),
    Pan,
}

// Maps pointer and wheel input onto the camera and the layout's drag
// channel. One gesture lives from pointer-down to pointer-up; nothing else
// may start in between.
pub struct InteractionController {
    camera: Camera,
    gesture: Gesture,
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            camera: Camera::default(),
            gesture: Gesture::Idle,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn pointer_down(&mut self, sx: f32, sy: f32, layout: &mut ForceLayout) {
        if self.gesture != Gesture::Idle {
            return;
        }
        let (wx, wy) = self.camera.screen_to_world(sx, sy);
        // The pick radius shrinks with zoom so it stays visually constant.
        let picked = layout
            .pick(wx, wy, PICK_RADIUS / self.camera.scale)
            .map(|node| node.id.clone());
        match picked {
            Some(id) => {
                layout.begin_drag(&id);
                self.gesture = Gesture::DragNode(id);
            }
            None => self.gesture = Gesture::Pan,
        }
    }

    pub fn pointer_move(&mut self, sx: f32, sy: f32, dx: f32, dy: f32, layout: &mut ForceLayout) {
        match self.gesture {
            Gesture::DragNode(_) => {
                let (wx, wy) = self.camera.screen_to_world(sx, sy);
                layout.drag_to(wx, wy);
            }
            Gesture::Pan => self.camera.pan(dx, dy),
            Gesture::Idle => {}
        }
    }

    // Releasing over a held node opens it, even with zero net movement.
    // Releasing a pan opens nothing.
    pub fn pointer_up(&mut self, layout: &mut ForceLayout) -> Option<String> {
        match mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::DragNode(id) => {
                layout.end_drag();
                Some(id)
            }
            Gesture::Pan | Gesture::Idle => None,
        }
    }

    pub fn wheel(&mut self, delta_y: f32) {
        let delta = if delta_y > 0.0 { -ZOOM_STEP } else { ZOOM_STEP };
        self.camera.zoom(delta);
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}
