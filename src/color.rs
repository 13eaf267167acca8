use serde::{Deserialize, Serialize};

/// Node and tree tint, kept as three float channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl NodeColor {
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self {
            red: red.clamp(0.0, 1.0),
            green: green.clamp(0.0, 1.0),
            blue: blue.clamp(0.0, 1.0),
        }
    }

    pub fn accent() -> Self {
        Self::new(0.345, 0.337, 0.839)
    }

    pub fn mint() -> Self {
        Self::new(0.0, 0.78, 0.745)
    }

    pub fn amber() -> Self {
        Self::new(1.0, 0.8, 0.0)
    }

    pub fn coral() -> Self {
        Self::new(1.0, 0.412, 0.38)
    }

    pub fn graphite() -> Self {
        Self::new(0.557, 0.557, 0.576)
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .ok()
                .map(|v| f32::from(v) / 255.0)
        };
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02X}{:02X}{:02X}",
            to_byte(self.red),
            to_byte(self.green),
            to_byte(self.blue)
        )
    }
}

impl Default for NodeColor {
    fn default() -> Self {
        Self::accent()
    }
}
