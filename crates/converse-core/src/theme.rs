//! Theme resolution.
//!
//! Merges a sparse, user-supplied theme over complete defaults and emits a
//! flat variable map for presentation layers. Merging is one level deep: a
//! supplied category only overrides the leaves it names.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Flat `--converse-<category>-<leaf>` to value map.
pub type VariableMap = BTreeMap<String, String>;

const VIEWPORT_WIDTH: &str = "90vw";
const VIEWPORT_HEIGHT: &str = "85vh";
const FIXED_WIDTH: &str = "380px";
const FIXED_HEIGHT: &str = "600px";

// =============================================================================
// Partial (user-supplied) theme
// =============================================================================

/// Sparse theme as supplied by the host. Every leaf is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub launcher: LauncherThemeConfig,
    pub header: HeaderThemeConfig,
    pub messages: MessagesThemeConfig,
    pub input: InputThemeConfig,
    pub window: WindowThemeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherThemeConfig {
    pub background_color: Option<String>,
    pub icon_color: Option<String>,
    pub size: Option<String>,
    pub border_radius: Option<String>,
    pub shadow: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderThemeConfig {
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub title: Option<String>,
    pub font_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesThemeConfig {
    pub user_background_color: Option<String>,
    pub user_text_color: Option<String>,
    pub bot_background_color: Option<String>,
    pub bot_text_color: Option<String>,
    pub font_size: Option<String>,
    pub border_radius: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputThemeConfig {
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub placeholder_color: Option<String>,
    pub border_color: Option<String>,
    pub button_color: Option<String>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowThemeConfig {
    /// One of `bottom-right`, `bottom-left`, `top-right`, `top-left`, `center`.
    pub placement: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub background_color: Option<String>,
    pub border_radius: Option<String>,
    pub shadow: Option<String>,
}

// =============================================================================
// Resolved (total) theme
// =============================================================================

/// Where the chat window is anchored on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Placement {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    Center,
}

impl Placement {
    /// Parse a placement name. Names match exactly; anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bottom-right" => Some(Placement::BottomRight),
            "bottom-left" => Some(Placement::BottomLeft),
            "top-right" => Some(Placement::TopRight),
            "top-left" => Some(Placement::TopLeft),
            "center" => Some(Placement::Center),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::BottomRight => "bottom-right",
            Placement::BottomLeft => "bottom-left",
            Placement::TopRight => "top-right",
            Placement::TopLeft => "top-left",
            Placement::Center => "center",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherTheme {
    pub background_color: String,
    pub icon_color: String,
    pub size: String,
    pub border_radius: String,
    pub shadow: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTheme {
    pub background_color: String,
    pub text_color: String,
    pub title: String,
    pub font_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesTheme {
    pub user_background_color: String,
    pub user_text_color: String,
    pub bot_background_color: String,
    pub bot_text_color: String,
    pub font_size: String,
    pub border_radius: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTheme {
    pub background_color: String,
    pub text_color: String,
    pub placeholder_color: String,
    pub border_color: String,
    pub button_color: String,
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTheme {
    pub placement: Placement,
    pub width: String,
    pub height: String,
    pub background_color: String,
    pub border_radius: String,
    pub shadow: String,
}

/// Fully resolved theme: every leaf has a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTheme {
    pub launcher: LauncherTheme,
    pub header: HeaderTheme,
    pub messages: MessagesTheme,
    pub input: InputTheme,
    pub window: WindowTheme,
}

impl Default for ResolvedTheme {
    fn default() -> Self {
        resolve_theme(&ThemeConfig::default())
    }
}

impl ResolvedTheme {
    /// Flatten the theme into presentation variables.
    pub fn variables(&self) -> VariableMap {
        let mut vars = VariableMap::new();
        let mut put = |category: &str, leaf: &str, value: &str| {
            vars.insert(format!("--converse-{}-{}", category, leaf), value.to_string());
        };

        let l = &self.launcher;
        put("launcher", "background-color", &l.background_color);
        put("launcher", "icon-color", &l.icon_color);
        put("launcher", "size", &l.size);
        put("launcher", "border-radius", &l.border_radius);
        put("launcher", "shadow", &l.shadow);

        let h = &self.header;
        put("header", "background-color", &h.background_color);
        put("header", "text-color", &h.text_color);
        put("header", "title", &h.title);
        put("header", "font-size", &h.font_size);

        let m = &self.messages;
        put("messages", "user-background-color", &m.user_background_color);
        put("messages", "user-text-color", &m.user_text_color);
        put("messages", "bot-background-color", &m.bot_background_color);
        put("messages", "bot-text-color", &m.bot_text_color);
        put("messages", "font-size", &m.font_size);
        put("messages", "border-radius", &m.border_radius);

        let i = &self.input;
        put("input", "background-color", &i.background_color);
        put("input", "text-color", &i.text_color);
        put("input", "placeholder-color", &i.placeholder_color);
        put("input", "border-color", &i.border_color);
        put("input", "button-color", &i.button_color);
        put("input", "placeholder", &i.placeholder);

        let w = &self.window;
        put("window", "placement", w.placement.as_str());
        put("window", "width", &w.width);
        put("window", "height", &w.height);
        put("window", "background-color", &w.background_color);
        put("window", "border-radius", &w.border_radius);
        put("window", "shadow", &w.shadow);

        vars
    }
}

// =============================================================================
// Resolution
// =============================================================================

fn pick(supplied: &Option<String>, default: &str) -> String {
    supplied.clone().unwrap_or_else(|| default.to_string())
}

/// Merge a partial theme over the defaults. Pure and deterministic.
pub fn resolve_theme(theme: &ThemeConfig) -> ResolvedTheme {
    let l = &theme.launcher;
    let launcher = LauncherTheme {
        background_color: pick(&l.background_color, "#2563eb"),
        icon_color: pick(&l.icon_color, "#ffffff"),
        size: pick(&l.size, "60px"),
        border_radius: pick(&l.border_radius, "50%"),
        shadow: pick(&l.shadow, "0 4px 12px rgba(0, 0, 0, 0.15)"),
    };

    let h = &theme.header;
    let header = HeaderTheme {
        background_color: pick(&h.background_color, "#2563eb"),
        text_color: pick(&h.text_color, "#ffffff"),
        title: pick(&h.title, "Chat"),
        font_size: pick(&h.font_size, "16px"),
    };

    let m = &theme.messages;
    let messages = MessagesTheme {
        user_background_color: pick(&m.user_background_color, "#2563eb"),
        user_text_color: pick(&m.user_text_color, "#ffffff"),
        bot_background_color: pick(&m.bot_background_color, "#f3f4f6"),
        bot_text_color: pick(&m.bot_text_color, "#111827"),
        font_size: pick(&m.font_size, "14px"),
        border_radius: pick(&m.border_radius, "12px"),
    };

    let i = &theme.input;
    let input = InputTheme {
        background_color: pick(&i.background_color, "#ffffff"),
        text_color: pick(&i.text_color, "#111827"),
        placeholder_color: pick(&i.placeholder_color, "#9ca3af"),
        border_color: pick(&i.border_color, "#e5e7eb"),
        button_color: pick(&i.button_color, "#2563eb"),
        placeholder: pick(&i.placeholder, "Type a message..."),
    };

    let w = &theme.window;
    let placement = match w.placement.as_deref() {
        None => Placement::default(),
        Some(raw) => Placement::parse(raw).unwrap_or_else(|| {
            tracing::warn!(placement = %raw, "Unknown window placement, using default");
            Placement::default()
        }),
    };
    let (default_width, default_height) = match placement {
        Placement::Center => (VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
        _ => (FIXED_WIDTH, FIXED_HEIGHT),
    };
    let window = WindowTheme {
        placement,
        width: pick(&w.width, default_width),
        height: pick(&w.height, default_height),
        background_color: pick(&w.background_color, "#ffffff"),
        border_radius: pick(&w.border_radius, "16px"),
        shadow: pick(&w.shadow, "0 12px 40px rgba(0, 0, 0, 0.2)"),
    };

    ResolvedTheme {
        launcher,
        header,
        messages,
        input,
        window,
    }
}

/// Result of one resolution: the total theme plus its variable map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeOutput {
    pub theme: ResolvedTheme,
    pub variables: VariableMap,
}

impl ThemeOutput {
    fn compute(config: &ThemeConfig) -> Self {
        let theme = resolve_theme(config);
        let variables = theme.variables();
        Self { theme, variables }
    }
}

/// Memoizing resolver.
///
/// Resolving the same input twice returns the same `Arc`, so presentation
/// code can compare by pointer and skip re-rendering.
#[derive(Debug, Default)]
pub struct ThemeResolver {
    cached: Mutex<Option<(ThemeConfig, Arc<ThemeOutput>)>>,
}

impl ThemeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `config`, reusing the previous output when the input is unchanged.
    pub fn resolve(&self, config: &ThemeConfig) -> Arc<ThemeOutput> {
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("Theme cache lock poisoned: {}", e);
                return Arc::new(ThemeOutput::compute(config));
            }
        };

        if let Some((input, output)) = cached.as_ref() {
            if input == config {
                return Arc::clone(output);
            }
        }

        tracing::debug!("Theme input changed, recomputing variables");
        let output = Arc::new(ThemeOutput::compute(config));
        *cached = Some((config.clone(), Arc::clone(&output)));
        output
    }
}

// =============================================================================
// Tests
// =============================================================================
