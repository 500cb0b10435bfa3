use crate::hotkeys::KeyEdge;

/// Single-key capture trigger. Fires once per press-down; repeats are
/// ignored until the key is released.
#[derive(Debug, Default)]
pub struct CaptureTrigger {
    held: bool,
}

impl CaptureTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when a capture should fire
    pub fn on_key(&mut self, edge: KeyEdge) -> bool {
        match edge {
            KeyEdge::Pressed if !self.held => {
                self.held = true;
                true
            }
            KeyEdge::Pressed | KeyEdge::Repeated => false,
            KeyEdge::Released => {
                self.held = false;
                false
            }
        }
    }
}

/// Hold-to-peek: shows the subtitle while the key is held
#[derive(Debug, Default)]
pub struct HoldToPeek {
    peeking: bool,
}

impl HoldToPeek {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new peek state when it changed
    pub fn on_key(&mut self, edge: KeyEdge) -> Option<bool> {
        let next = match edge {
            KeyEdge::Pressed => true,
            KeyEdge::Released => false,
            KeyEdge::Repeated => return None,
        };
        if next == self.peeking {
            None
        } else {
            self.peeking = next;
            Some(next)
        }
    }
}
