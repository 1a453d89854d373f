//! Hex color parsing with a per-renderer cache.
//!
//! Colors are usually written in style tables as short hex strings
//! (`"f30"`, `"#202020c0"`). Parsing the same handful of strings every
//! frame is wasteful, so each [`ColorCache`] remembers every input it has
//! seen, including invalid ones.

use std::collections::HashMap;

use tracing::error;

use crate::types::Color;

/// Parses hex color strings and memoizes the results.
///
/// Accepted forms, each with an optional leading `#`:
/// `rgb`, `rgba` (4 bits per channel) and `rrggbb`, `rrggbbaa`
/// (8 bits per channel). Anything else parses as [`Color::MAGENTA`].
#[derive(Debug, Default, Clone)]
pub struct ColorCache {
    entries: HashMap<String, Color>,
}

impl ColorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `spec`, consulting the cache first.
    pub fn parse(&mut self, spec: &str) -> Color {
        if let Some(color) = self.entries.get(spec) {
            return *color;
        }
        let color = parse_hex(spec).unwrap_or_else(|| {
            error!(target: "ctrlpad_render::color", spec, "invalid color");
            Color::MAGENTA
        });
        self.entries.insert(spec.to_owned(), color);
        color
    }

    /// Number of cached inputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been parsed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Parse a hex color without caching.
pub fn parse_hex(spec: &str) -> Option<Color> {
    let hex = spec.strip_prefix('#').unwrap_or(spec);
    if !hex.is_ascii() {
        return None;
    }
    let nibble = |i: usize| -> Option<f32> {
        u8::from_str_radix(&hex[i..i + 1], 16)
            .ok()
            .map(|v| v as f32 / 15.0)
    };
    let byte = |i: usize| -> Option<f32> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    match hex.len() {
        3 => Some(Color::new(nibble(0)?, nibble(1)?, nibble(2)?, 1.0)),
        4 => Some(Color::new(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::new(byte(0)?, byte(2)?, byte(4)?, 1.0)),
        8 => Some(Color::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}
