//! Theme preference handling. Stored preferences are free-form strings; only
//! the literal `"dark"` selects the dark theme.

use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

const DARK_CLASS: &str = "dark";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
}

impl ThemePreference {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Maps a stored value to a theme; unknown or missing values are light.
#[must_use]
pub fn normalize_theme_preference(value: Option<&str>) -> ThemePreference {
    match value {
        Some("dark") => ThemePreference::Dark,
        _ => ThemePreference::Light,
    }
}

/// Something a theme can be applied to, e.g. the root element of a page.
pub trait ThemeSurface {
    fn toggle_class(&mut self, class: &str, enabled: bool);
    fn set_data(&mut self, key: &str, value: &str);
    fn set_color_scheme(&mut self, scheme: &str);
}

/// Applies `theme` to `surface`; without a surface (nothing is being rendered) this is a no-op.
pub fn apply_theme_preference<S: ThemeSurface>(theme: ThemePreference, surface: Option<&mut S>) {
    let Some(surface) = surface else {
        return;
    };

    surface.toggle_class(DARK_CLASS, theme == ThemePreference::Dark);
    surface.set_data("theme", theme.as_str());
    surface.set_color_scheme(theme.as_str());
}

/// Attributes of the `<html>` element of a server-rendered page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentRoot {
    classes: BTreeSet<String>,
    data: BTreeMap<String, String>,
    color_scheme: Option<String>,
}

impl DocumentRoot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    #[must_use]
    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn color_scheme(&self) -> Option<&str> {
        self.color_scheme.as_deref()
    }

    /// Renders the attributes as they appear inside the opening `<html>` tag.
    #[must_use]
    pub fn attributes(&self) -> String {
        let mut attributes = Vec::new();
        if !self.classes.is_empty() {
            let classes: Vec<&str> = self.classes.iter().map(String::as_str).collect();
            attributes.push(format!("class=\"{}\"", classes.join(" ")));
        }
        for (key, value) in &self.data {
            attributes.push(format!("data-{key}=\"{value}\""));
        }
        if let Some(scheme) = &self.color_scheme {
            attributes.push(format!("style=\"color-scheme: {scheme}\""));
        }
        attributes.join(" ")
    }
}

impl ThemeSurface for DocumentRoot {
    fn toggle_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.classes.insert(class.to_string());
        } else {
            self.classes.remove(class);
        }
    }

    fn set_data(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    fn set_color_scheme(&mut self, scheme: &str) {
        self.color_scheme = Some(scheme.to_string());
    }
}
