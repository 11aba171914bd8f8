//! Label color table
//!
//! Colors follow the dental numbering template the frontend renders with:
//! 32 numbered labels followed by `Bridge` and `Implant`.

use serde::{Deserialize, Serialize};

/// RGB color of a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One palette entry as served to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub idx: u16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub label: String,
}

const LABEL_COLORS: &[(u8, u8, u8, &str)] = &[
    (255, 0, 0, "#1"),
    (0, 255, 0, "#2"),
    (0, 0, 255, "#3"),
    (255, 255, 0, "#4"),
    (0, 255, 255, "#5"),
    (255, 0, 255, "#6"),
    (255, 239, 213, "#7"),
    (255, 170, 0, "#8"),
    (172, 0, 129, "#9"),
    (0, 166, 0, "#10"),
    (169, 102, 205, "#11"),
    (0, 0, 128, "#12"),
    (0, 203, 203, "#13"),
    (94, 117, 29, "#14"),
    (255, 43, 192, "#15"),
    (106, 90, 205, "#16"),
    (221, 166, 169, "#17"),
    (122, 202, 233, "#18"),
    (165, 91, 42, "#19"),
    (150, 185, 100, "#20"),
    (219, 112, 214, "#21"),
    (218, 217, 112, "#22"),
    (215, 64, 235, "#23"),
    (255, 182, 193, "#24"),
    (60, 179, 113, "#25"),
    (182, 158, 255, "#26"),
    (255, 228, 196, "#27"),
    (218, 165, 32, "#28"),
    (0, 128, 128, "#29"),
    (188, 143, 143, "#30"),
    (255, 105, 180, "#31"),
    (255, 218, 185, "#32"),
    (222, 184, 135, "Bridge"),
    (127, 255, 0, "Implant"),
];

const OUT_OF_TABLE: Rgb = Rgb {
    r: 255,
    g: 255,
    b: 255,
};

fn entry(label: u16) -> Option<&'static (u8, u8, u8, &'static str)> {
    (label as usize)
        .checked_sub(1)
        .and_then(|i| LABEL_COLORS.get(i))
}

/// Color of `label`; labels past the table are white
pub fn color_for(label: u16) -> Rgb {
    entry(label)
        .map(|&(r, g, b, _)| Rgb { r, g, b })
        .unwrap_or(OUT_OF_TABLE)
}

/// Display name of `label`
pub fn name_for(label: u16) -> String {
    entry(label)
        .map(|&(_, _, _, name)| name.to_string())
        .unwrap_or_else(|| format!("#{}", label))
}

/// The full palette, in label order
pub fn palette() -> Vec<PaletteEntry> {
    LABEL_COLORS
        .iter()
        .enumerate()
        .map(|(i, &(r, g, b, name))| PaletteEntry {
            idx: i as u16 + 1,
            r,
            g,
            b,
            label: name.to_string(),
        })
        .collect()
}
