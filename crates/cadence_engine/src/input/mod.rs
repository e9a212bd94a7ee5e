//! Input state tracking
//!
//! Hosts feed raw key, button, cursor and wheel events into [`InputState`].
//! Physical keys map to named virtual keys through bindings; systems read an
//! [`InputSnapshot`] copied once per frame.

use std::collections::HashMap;
use thiserror::Error;

/// Input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The binding name is already registered for this key
    #[error("Input binding {name} already exists for key {key:?}")]
    DuplicateBinding {
        /// Binding name
        name: String,
        /// Key it was already bound to
        key: KeyCode,
    },

    /// A key name could not be recognised
    #[error("Unknown key name: {0}")]
    UnknownKey(String),
}

/// Physical keys and mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// B key
    B,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// G key
    G,
    /// H key
    H,
    /// I key
    I,
    /// J key
    J,
    /// K key
    K,
    /// L key
    L,
    /// M key
    M,
    /// N key
    N,
    /// O key
    O,
    /// P key
    P,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// U key
    U,
    /// V key
    V,
    /// W key
    W,
    /// X key
    X,
    /// Y key
    Y,
    /// Z key
    Z,
    /// Up arrow
    ArrowUp,
    /// Down arrow
    ArrowDown,
    /// Left arrow
    ArrowLeft,
    /// Right arrow
    ArrowRight,
    /// Space bar
    Space,
    /// Tab key
    Tab,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Shift key
    Shift,
    /// Control key
    Control,
    /// Alt key
    Alt,
    /// Primary mouse button
    Mouse1,
    /// Middle mouse button
    Mouse2,
    /// Secondary mouse button
    Mouse3,
}

impl KeyCode {
    /// Parse a lowercase key name such as `"w"`, `"arrowup"`, `"space"` or `"mouse1"`
    pub fn parse(name: &str) -> Result<Self, InputError> {
        const LETTERS: [KeyCode; 26] = [
            KeyCode::A, KeyCode::B, KeyCode::C, KeyCode::D, KeyCode::E, KeyCode::F, KeyCode::G,
            KeyCode::H, KeyCode::I, KeyCode::J, KeyCode::K, KeyCode::L, KeyCode::M, KeyCode::N,
            KeyCode::O, KeyCode::P, KeyCode::Q, KeyCode::R, KeyCode::S, KeyCode::T, KeyCode::U,
            KeyCode::V, KeyCode::W, KeyCode::X, KeyCode::Y, KeyCode::Z,
        ];

        let lower = name.to_ascii_lowercase();
        let mut chars = lower.chars();
        if let (Some(letter @ 'a'..='z'), None) = (chars.next(), chars.next()) {
            return Ok(LETTERS[(letter as u8 - b'a') as usize]);
        }
        match lower.as_str() {
            "arrowup" => Ok(Self::ArrowUp),
            "arrowdown" => Ok(Self::ArrowDown),
            "arrowleft" => Ok(Self::ArrowLeft),
            "arrowright" => Ok(Self::ArrowRight),
            "space" | " " | "spacebar" => Ok(Self::Space),
            "tab" => Ok(Self::Tab),
            "enter" => Ok(Self::Enter),
            "escape" => Ok(Self::Escape),
            "shift" => Ok(Self::Shift),
            "control" => Ok(Self::Control),
            "alt" => Ok(Self::Alt),
            "mouse1" => Ok(Self::Mouse1),
            "mouse2" => Ok(Self::Mouse2),
            "mouse3" => Ok(Self::Mouse3),
            _ => Err(InputError::UnknownKey(name.to_string())),
        }
    }
}

/// State of a named virtual key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Currently pressed
    pub down: bool,
    /// Pressed and already pressed at the previous event
    pub held: bool,
}

/// Cursor position, movement and scrolling
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorState {
    /// Horizontal position in pixels
    pub x: f64,
    /// Vertical position in pixels
    pub y: f64,
    /// Horizontal movement since the last render
    pub dx: f64,
    /// Vertical movement since the last render
    pub dy: f64,
    /// Horizontal scroll since the last update; positive is right
    pub scroll_x: f64,
    /// Vertical scroll since the last update; positive is down
    pub scroll_y: f64,
    /// Whether the pointer is locked
    pub locked: bool,
}

/// Read-only copy of the input state handed to systems
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    keys: HashMap<String, KeyState>,
    cursor: CursorState,
}

impl InputSnapshot {
    /// State of a named binding; unbound names read as released
    pub fn key(&self, name: &str) -> KeyState {
        self.keys.get(name).copied().unwrap_or_default()
    }

    /// Whether a named binding is pressed
    pub fn is_down(&self, name: &str) -> bool {
        self.key(name).down
    }

    /// Cursor state
    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }
}

/// Input manager
#[derive(Debug, Clone, Default)]
pub struct InputState {
    bindings: HashMap<KeyCode, Vec<String>>,
    keys: HashMap<String, KeyState>,
    cursor: CursorState,
    /// Whether the host should keep the pointer locked
    pub lock_cursor: bool,
}

impl InputState {
    /// Create an input manager with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to each of `keys`.
    ///
    /// Fails without binding anything if `name` is already bound to one of them.
    pub fn add_binding(&mut self, name: &str, keys: &[KeyCode]) -> Result<&mut Self, InputError> {
        if let Some(key) = keys
            .iter()
            .find(|key| self.bindings.get(*key).is_some_and(|names| names.iter().any(|n| n == name)))
        {
            return Err(InputError::DuplicateBinding {
                name: name.to_string(),
                key: *key,
            });
        }
        for key in keys {
            let names = self.bindings.entry(*key).or_default();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        self.keys.insert(name.to_string(), KeyState::default());
        Ok(self)
    }

    /// Remove a binding from every key
    pub fn remove_binding(&mut self, name: &str) -> &mut Self {
        for names in self.bindings.values_mut() {
            names.retain(|n| n != name);
        }
        self.bindings.retain(|_, names| !names.is_empty());
        self.keys.remove(name);
        self
    }

    /// Register the default movement and mouse bindings
    pub fn register_default_bindings(&mut self) -> Result<&mut Self, InputError> {
        self.add_binding("up", &[KeyCode::W, KeyCode::ArrowUp])?
            .add_binding("down", &[KeyCode::S, KeyCode::ArrowDown])?
            .add_binding("left", &[KeyCode::A, KeyCode::ArrowLeft])?
            .add_binding("right", &[KeyCode::D, KeyCode::ArrowRight])?
            .add_binding("fire", &[KeyCode::Mouse1])?
            .add_binding("alt", &[KeyCode::Mouse3])
    }

    /// Whether any binding uses `key`
    pub fn is_bound(&self, key: KeyCode) -> bool {
        self.bindings.get(&key).is_some_and(|names| !names.is_empty())
    }

    /// Key or button press/release
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        let Some(names) = self.bindings.get(&key) else {
            return;
        };
        for name in names {
            let state = self.keys.entry(name.clone()).or_default();
            let previously_down = state.down;
            *state = KeyState {
                down: pressed,
                held: previously_down && pressed,
            };
        }
    }

    /// Pointer movement
    pub fn handle_cursor_move(&mut self, x: f64, y: f64, dx: f64, dy: f64) {
        self.cursor.x = x;
        self.cursor.y = y;
        self.cursor.dx += dx;
        self.cursor.dy += dy;
    }

    /// Wheel movement
    pub fn handle_wheel(&mut self, scroll_x: f64, scroll_y: f64) {
        self.cursor.scroll_x = scroll_x;
        self.cursor.scroll_y = scroll_y;
    }

    /// Pointer lock change reported by the host
    pub fn set_cursor_locked(&mut self, locked: bool) {
        self.cursor.locked = locked;
    }

    /// Reset per-update values
    pub fn end_update(&mut self) {
        self.cursor.scroll_x = 0.0;
        self.cursor.scroll_y = 0.0;
    }

    /// Reset per-render values
    pub fn end_render(&mut self) {
        self.cursor.dx = 0.0;
        self.cursor.dy = 0.0;
    }

    /// State of a named binding
    pub fn key(&self, name: &str) -> KeyState {
        self.keys.get(name).copied().unwrap_or_default()
    }

    /// Cursor state
    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    /// Copy the current state for systems
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            keys: self.keys.clone(),
            cursor: self.cursor,
        }
    }
}
