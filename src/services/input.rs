use std::fmt;

/// Windows virtual key code (VK_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualKey(pub u16);

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Level-triggered key source, sampled once per tick.
pub trait KeyInput {
    fn is_down(&mut self, key: VirtualKey) -> bool;
}

/// Transition of the key between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
    Held,
    Idle,
}

impl Edge {
    #[inline]
    pub fn is_press(self) -> bool {
        self == Edge::Pressed
    }
}

/// Derives press/release edges from polled key levels.
#[derive(Debug, Default, Clone)]
pub struct EdgeDetector {
    was_down: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current sample. Must be called exactly once per tick.
    pub fn update(&mut self, down: bool) -> Edge {
        let edge = match (self.was_down, down) {
            (false, true) => Edge::Pressed,
            (true, false) => Edge::Released,
            (true, true) => Edge::Held,
            (false, false) => Edge::Idle,
        };
        self.was_down = down;
        edge
    }

    #[cfg(test)]
    pub fn was_down(&self) -> bool {
        self.was_down
    }
}

/// Key state straight from `GetAsyncKeyState`.
#[cfg(windows)]
#[derive(Debug, Default)]
pub struct AsyncKeyInput;

#[cfg(windows)]
impl KeyInput for AsyncKeyInput {
    #[inline]
    fn is_down(&mut self, key: VirtualKey) -> bool {
        use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

        // High bit: key is currently down
        let state = unsafe { GetAsyncKeyState(i32::from(key.0)) };
        (state as u16) & 0x8000 != 0
    }
}
