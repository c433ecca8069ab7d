//! Typed ffmpeg filter graph builder.
//!
//! Filters are appended as typed nodes and the graph is serialized once.
//! Every dynamic string goes through [`escape_value`], which applies both
//! escaping levels ffmpeg uses when parsing `-filter_complex`:
//!
//! 1. option level: the value is single-quoted, with embedded `'` written
//!    as `'\''`;
//! 2. graph level: `\ ' [ ] , ;` are backslash-escaped so the graph parser
//!    hands the quoted value to the filter untouched.

use std::fmt::{self, Write as _};

/// How [`Filter::Scale`] treats the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFit {
    /// Fit inside the box, preserving aspect ratio.
    Contain,
    /// Cover the box, preserving aspect ratio (overflows one axis).
    Cover,
}

/// Text overlay options for [`Filter::DrawText`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    pub text: String,
    /// Fontconfig family, used when `font_file` is unset.
    pub font: Option<String>,
    pub font_file: Option<String>,
    pub font_size: u32,
    pub font_color: String,
    pub border_color: String,
    pub border_width: u32,
    /// Top edge of the text box, in pixels.
    pub y: i64,
}

/// One filter node.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Scale {
        width: u32,
        height: u32,
        fit: ScaleFit,
    },
    /// Pad to `width`x`height`, centring the input.
    Pad {
        width: u32,
        height: u32,
        color: String,
    },
    /// Centre crop.
    Crop { width: u32, height: u32 },
    BoxBlur { radius: u32 },
    /// Overlay the second input centred on the first.
    Overlay { shortest: bool },
    Split { outputs: usize },
    ASplit { outputs: usize },
    /// Concatenate `segments` segments, each carrying one video and one
    /// audio stream.
    Concat { segments: usize },
    DrawText(Box<DrawText>),
    Fps { rate: u32 },
    Format { pix_fmt: String },
    SetSar,
    /// Solid color video source.
    Color {
        color: String,
        width: u32,
        height: u32,
        rate: u32,
        duration_secs: f64,
    },
    /// Static vertical two-color gradient source.
    Gradients {
        from: String,
        to: String,
        width: u32,
        height: u32,
        rate: u32,
        duration_secs: f64,
    },
    /// Silent audio source.
    ANullSrc { sample_rate: u32 },
    ATrim { duration_secs: f64 },
    AFormat { sample_rate: u32 },
    AResample { sample_rate: u32 },
}

impl Filter {
    pub fn draw_text(options: DrawText) -> Self {
        Self::DrawText(Box::new(options))
    }
}

fn secs(value: f64) -> String {
    format!("{value:.3}")
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale { width, height, fit } => {
                let mode = match fit {
                    ScaleFit::Contain => "decrease",
                    ScaleFit::Cover => "increase",
                };
                write!(
                    f,
                    "scale={width}:{height}:force_original_aspect_ratio={mode}:flags=lanczos"
                )
            }
            Self::Pad {
                width,
                height,
                color,
            } => write!(
                f,
                "pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color={}",
                escape_value(color)
            ),
            Self::Crop { width, height } => write!(f, "crop={width}:{height}"),
            Self::BoxBlur { radius } => write!(f, "boxblur={radius}:1"),
            Self::Overlay { shortest } => {
                write!(f, "overlay=(W-w)/2:(H-h)/2")?;
                if *shortest {
                    write!(f, ":shortest=1")?;
                }
                Ok(())
            }
            Self::Split { outputs } => write!(f, "split={outputs}"),
            Self::ASplit { outputs } => write!(f, "asplit={outputs}"),
            Self::Concat { segments } => write!(f, "concat=n={segments}:v=1:a=1"),
            Self::DrawText(options) => {
                write!(f, "drawtext=")?;
                match (&options.font_file, &options.font) {
                    (Some(file), _) => write!(f, "fontfile={}:", escape_value(file))?,
                    (None, Some(font)) => write!(f, "font={}:", escape_value(font))?,
                    (None, None) => {}
                }
                write!(
                    f,
                    "expansion=none:text={}:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x=(w-text_w)/2:y={}",
                    escape_value(&options.text),
                    options.font_size,
                    escape_value(&options.font_color),
                    options.border_width,
                    escape_value(&options.border_color),
                    options.y
                )
            }
            Self::Fps { rate } => write!(f, "fps={rate}"),
            Self::Format { pix_fmt } => write!(f, "format={pix_fmt}"),
            Self::SetSar => write!(f, "setsar=1"),
            Self::Color {
                color,
                width,
                height,
                rate,
                duration_secs,
            } => write!(
                f,
                "color=c={}:s={width}x{height}:r={rate}:d={}",
                escape_value(color),
                secs(*duration_secs)
            ),
            Self::Gradients {
                from,
                to,
                width,
                height,
                rate,
                duration_secs,
            } => write!(
                f,
                "gradients=s={width}x{height}:c0={}:c1={}:nb_colors=2:x0=0:y0=0:x1=0:y1={height}:speed=0:r={rate}:d={}",
                escape_value(from),
                escape_value(to),
                secs(*duration_secs)
            ),
            Self::ANullSrc { sample_rate } => {
                write!(f, "anullsrc=r={sample_rate}:cl=stereo")
            }
            Self::ATrim { duration_secs } => {
                write!(f, "atrim=duration={}", secs(*duration_secs))
            }
            Self::AFormat { sample_rate } => write!(
                f,
                "aformat=sample_fmts=fltp:sample_rates={sample_rate}:channel_layouts=stereo"
            ),
            Self::AResample { sample_rate } => write!(f, "aresample={sample_rate}"),
        }
    }
}

/// A linear chain: input pads, filters joined by `,`, output pads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    outputs: Vec<String>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a chain reading from `label`.
    pub fn from(label: impl Into<String>) -> Self {
        Self::new().input(label)
    }

    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn inputs<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    pub fn outputs<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(labels.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{label}]")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            write!(f, "{filter}")?;
        }
        for label in &self.outputs {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}

/// A complete `-filter_complex` graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<Chain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: Chain) -> &mut Self {
        self.chains.push(chain);
        self
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Serialize to the `-filter_complex` argument.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_char(';')?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

/// Escape a dynamic option value for embedding in a filter graph.
///
/// Plain tokens (letters, digits, `#`, `.`, `_`, `-`, `/`, `+`) pass through
/// unchanged. Anything else is single-quoted and then graph-escaped.
pub fn escape_value(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '.' | '_' | '-' | '/' | '+'));
    if plain {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');

    let mut escaped = String::with_capacity(quoted.len() * 2);
    for c in quoted.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Mirror of ffmpeg's `av_get_token`: reads up to an unescaped,
    /// unquoted terminator and returns the token plus the remainder.
    fn get_token<'a>(input: &'a str, terms: &str) -> (String, &'a str) {
        const WHITESPACE: &[char] = &[' ', '\n', '\t', '\r'];
        let s = input.trim_start_matches(WHITESPACE);
        let mut out = String::new();
        let mut end = 0usize;
        let mut chars = s.char_indices().peekable();
        let mut rest_at = s.len();

        while let Some((i, c)) = chars.next() {
            if terms.contains(c) {
                rest_at = i;
                break;
            }
            if c == '\\' {
                if let Some((_, next)) = chars.next() {
                    out.push(next);
                    end = out.len();
                }
            } else if c == '\'' {
                for (_, q) in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    out.push(q);
                }
                end = out.len();
            } else {
                out.push(c);
                if !WHITESPACE.contains(&c) {
                    end = out.len();
                }
            }
        }
        out.truncate(end);
        (out, &s[rest_at..])
    }

    /// Parse a value the way `drawtext=text=<value>` would receive it.
    fn unescape_twice(escaped: &str) -> (String, String) {
        let (graph_level, rest_graph) = get_token(escaped, "[],;");
        let (option_level, rest_option) = get_token(&graph_level, ":");
        (option_level, format!("{rest_graph}{rest_option}"))
    }

    #[test]
    fn test_plain_values_are_untouched() {
        assert_eq!(escape_value("white"), "white");
        assert_eq!(escape_value("#FF0000AA"), "#FF0000AA");
        assert_eq!(escape_value("0x101010"), "0x101010");
    }

    #[test]
    fn test_quote_colon_backslash_survive() {
        let text = r#"He said: "don't stop" \o/"#;
        let escaped = escape_value(text);
        assert!(!escaped.contains(";"));
        let (parsed, rest) = unescape_twice(&escaped);
        assert_eq!(parsed, text);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_graph_separators_are_escaped() {
        let escaped = escape_value("a,b;c[d]");
        assert_eq!(escaped, r"\'a\,b\;c\[d\]\'");
    }

    #[test]
    fn test_chain_serialization() {
        let chain = Chain::from("0:v")
            .filter(Filter::Scale {
                width: 1080,
                height: 1920,
                fit: ScaleFit::Contain,
            })
            .filter(Filter::Pad {
                width: 1080,
                height: 1920,
                color: "black".to_string(),
            })
            .output("base");
        assert_eq!(
            chain.to_string(),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=decrease:flags=lanczos,\
             pad=1080:1920:(ow-iw)/2:(oh-ih)/2:color=black[base]"
        );
    }

    #[test]
    fn test_graph_joins_chains_with_semicolons() {
        let mut graph = FilterGraph::new();
        graph
            .push(
                Chain::from("base")
                    .filter(Filter::Split { outputs: 2 })
                    .outputs(["v0", "v1"]),
            )
            .push(
                Chain::new()
                    .inputs(["v0", "a0", "v1", "a1"])
                    .filter(Filter::Concat { segments: 2 })
                    .outputs(["vout", "aout"]),
            );
        assert_eq!(
            graph.render(),
            "[base]split=2[v0][v1];[v0][a0][v1][a1]concat=n=2:v=1:a=1[vout][aout]"
        );
    }

    #[test]
    fn test_drawtext_disables_expansion() {
        let filter = Filter::draw_text(DrawText {
            text: "100% sure".to_string(),
            font: Some("Noto Sans CJK KR".to_string()),
            font_file: None,
            font_size: 48,
            font_color: "white".to_string(),
            border_color: "black".to_string(),
            border_width: 2,
            y: 1700,
        });
        let rendered = filter.to_string();
        assert!(rendered.starts_with("drawtext=font=\\'Noto Sans CJK KR\\':expansion=none:"));
        assert!(rendered.contains("text=\\'100% sure\\'"));
        assert!(rendered.ends_with("x=(w-text_w)/2:y=1700"));
    }

    #[test]
    fn test_sources_format_durations() {
        let color = Filter::Color {
            color: "black".to_string(),
            width: 1920,
            height: 1080,
            rate: 30,
            duration_secs: 0.5,
        };
        assert_eq!(color.to_string(), "color=c=black:s=1920x1080:r=30:d=0.500");
        assert_eq!(
            Filter::ATrim { duration_secs: 2.2 }.to_string(),
            "atrim=duration=2.200"
        );
    }

    proptest! {
        #[test]
        fn prop_escape_round_trips_through_both_levels(text in "\\PC{0,40}") {
            let escaped = escape_value(&text);
            let (parsed, rest) = unescape_twice(&escaped);
            prop_assert_eq!(parsed, text);
            prop_assert!(rest.is_empty());
        }

        #[test]
        fn prop_escaped_value_never_ends_a_chain(text in "[\\[\\],;:'\\\\ a-z]{0,30}") {
            let escaped = escape_value(&text);
            let (_, rest) = get_token(&escaped, "[],;");
            prop_assert!(rest.is_empty());
        }
    }
}
