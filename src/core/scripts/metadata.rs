//! Script Metadata Parser
//!
//! Reads `Field: value` lines from the leading docstring of a script:
//!
//! ```text
//! --[[
//! Description:  Lists the layers of the current project
//! Toolbar:      true
//! ToolbarLabel: Layers
//! Validated:    yes
//! ]]
//! ```
//!
//! The docstring is the first block opened by `"""`, `'''` or a Lua long
//! bracket (`[[`, `[==[`). Field names are case-insensitive, unknown fields
//! are ignored and anything missing falls back to a default. Parsing never
//! fails.

use lazy_static::lazy_static;
use regex::Regex;

/// Description used when a script declares none
pub const DEFAULT_DESCRIPTION: &str = "Lua script";

/// Description field spellings, tried in order
pub const DESCRIPTION_FIELDS: [&str; 3] = ["Description", "Descrição", "Descripción"];

const TRUTHY: [&str; 3] = ["true", "yes", "1"];

lazy_static! {
    static ref LONG_BRACKET: Regex = Regex::new(r"\[(=*)\[").unwrap();
    static ref DESCRIPTION_RES: Vec<Regex> = DESCRIPTION_FIELDS.iter().map(|f| field_regex(f)).collect();
    static ref TOOLBAR_RE: Regex = field_regex("Toolbar");
    static ref TOOLBAR_LABEL_RE: Regex = field_regex("ToolbarLabel");
    static ref VALIDATED_RE: Regex = field_regex("Validated");
}

fn field_regex(field: &str) -> Regex {
    Regex::new(&format!(
        r"(?im)^[ \t]*{}[ \t]*:[ \t]*([^\r\n]*)",
        regex::escape(field)
    ))
    .unwrap()
}

/// Metadata declared by a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMetadata {
    pub description: String,
    pub toolbar_visible: bool,
    /// Only set when `toolbar_visible` is true
    pub toolbar_label: Option<String>,
    pub validated: bool,
}

impl ScriptMetadata {
    /// Parse metadata using [`DEFAULT_DESCRIPTION`] as fallback
    pub fn parse(source: &str) -> Self {
        Self::parse_with_fallback(source, DEFAULT_DESCRIPTION)
    }

    /// Parse metadata with a caller supplied description fallback
    pub fn parse_with_fallback(source: &str, fallback: &str) -> Self {
        let doc = extract_docstring(source).unwrap_or("");

        let description = DESCRIPTION_RES
            .iter()
            .find_map(|re| text_field(doc, re))
            .unwrap_or_else(|| fallback.to_string());

        let toolbar_visible = bool_field(doc, &TOOLBAR_RE);
        let toolbar_label = if toolbar_visible {
            text_field(doc, &TOOLBAR_LABEL_RE)
        } else {
            None
        };

        Self {
            description,
            toolbar_visible,
            toolbar_label,
            validated: bool_field(doc, &VALIDATED_RE),
        }
    }
}

/// Return the body of the first docstring block, if any
pub fn extract_docstring(source: &str) -> Option<&str> {
    let triple = ["\"\"\"", "'''"]
        .iter()
        .filter_map(|q| source.find(q).map(|pos| (pos, *q)))
        .min_by_key(|(pos, _)| *pos);

    let bracket = LONG_BRACKET.captures(source).and_then(|caps| {
        let whole = caps.get(0)?;
        Some((whole.start(), whole.end(), format!("]{}]", &caps[1])))
    });

    let (body_start, close) = match (triple, bracket) {
        (Some((t_pos, quote)), Some((b_pos, _, _))) if t_pos < b_pos => {
            (t_pos + quote.len(), quote.to_string())
        }
        (_, Some((_, b_end, close))) => (b_end, close),
        (Some((t_pos, quote)), None) => (t_pos + quote.len(), quote.to_string()),
        (None, None) => return None,
    };

    let rest = &source[body_start..];
    Some(match rest.find(&close) {
        Some(end) => &rest[..end],
        None => rest,
    })
}

fn text_field(doc: &str, re: &Regex) -> Option<String> {
    let raw = re.captures(doc)?.get(1)?.as_str();
    let value = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn bool_field(doc: &str, re: &Regex) -> bool {
    re.captures(doc)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            let value = m.as_str().trim().to_lowercase();
            TRUTHY.contains(&value.as_str())
        })
        .unwrap_or(false)
}

/// Derive a display name from a file name: `layer_stats.lua` -> `Layer Stats`
pub fn display_name(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    };

    let mut out = String::with_capacity(stem.len());
    let mut prev_cased = false;
    for c in stem.replace('_', " ").chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lua_docstring() {
        let source = r#"--[[
Layer Report
Description: Lists the layers of the project
Toolbar: true
ToolbarLabel: "Layers"
Validated: yes
]]
print("hi")
"#;
        let meta = ScriptMetadata::parse(source);
        assert_eq!(meta.description, "Lists the layers of the project");
        assert!(meta.toolbar_visible);
        assert_eq!(meta.toolbar_label.as_deref(), Some("Layers"));
        assert!(meta.validated);
    }

    #[test]
    fn test_toolbar_without_label() {
        let meta = ScriptMetadata::parse("\"\"\"\nToolbar: true\n\"\"\"\n");
        assert!(meta.toolbar_visible);
        assert_eq!(meta.toolbar_label, None);
    }

    #[test]
    fn test_label_ignored_when_not_on_toolbar() {
        let meta = ScriptMetadata::parse("--[[\nToolbar: no\nToolbarLabel: X\n]]\n");
        assert!(!meta.toolbar_visible);
        assert_eq!(meta.toolbar_label, None);
    }

    #[test]
    fn test_validated_truthy_tokens() {
        for token in ["yes", "YES", "true", "True", "1", "  yes  "] {
            let meta = ScriptMetadata::parse(&format!("'''\nValidated: {}\n'''", token));
            assert!(meta.validated, "token {:?} should be truthy", token);
        }
        for token in ["no", "false", "0", "y", "enabled", ""] {
            let meta = ScriptMetadata::parse(&format!("'''\nValidated: {}\n'''", token));
            assert!(!meta.validated, "token {:?} should be falsy", token);
        }
    }

    #[test]
    fn test_no_docstring_defaults() {
        let meta = ScriptMetadata::parse("print('hi')\n");
        assert_eq!(meta.description, DEFAULT_DESCRIPTION);
        assert!(!meta.toolbar_visible);
        assert_eq!(meta.toolbar_label, None);
        assert!(!meta.validated);
    }

    #[test]
    fn test_custom_fallback() {
        let meta = ScriptMetadata::parse_with_fallback("", "Host script");
        assert_eq!(meta.description, "Host script");
    }

    #[test]
    fn test_field_names_case_insensitive() {
        let meta = ScriptMetadata::parse("--[[\ndescription: lower\nTOOLBAR: TRUE\n]]");
        assert_eq!(meta.description, "lower");
        assert!(meta.toolbar_visible);
    }

    #[test]
    fn test_description_variants_priority() {
        let pt = ScriptMetadata::parse("--[[\nDescrição: Lista as camadas\n]]");
        assert_eq!(pt.description, "Lista as camadas");

        let es = ScriptMetadata::parse("--[[\nDescripción: Lista las capas\n]]");
        assert_eq!(es.description, "Lista las capas");

        let both = ScriptMetadata::parse("--[[\nDescripción: es\nDescription: en\n]]");
        assert_eq!(both.description, "en");
    }

    #[test]
    fn test_only_first_docstring_used() {
        let source = "--[[\nFirst block\n]]\nlocal s = [[\nDescription: second\n]]\n";
        let meta = ScriptMetadata::parse(source);
        assert_eq!(meta.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_earliest_delimiter_wins() {
        let source = "\"\"\"\nDescription: triple\n\"\"\"\n--[[\nDescription: bracket\n]]";
        assert_eq!(ScriptMetadata::parse(source).description, "triple");

        let source = "--[[\nDescription: bracket\n]]\n\"\"\"\nDescription: triple\n\"\"\"";
        assert_eq!(ScriptMetadata::parse(source).description, "bracket");
    }

    #[test]
    fn test_unterminated_docstring_tolerated() {
        let meta = ScriptMetadata::parse("--[[\nDescription: never closed\nValidated: true\n");
        assert_eq!(meta.description, "never closed");
        assert!(meta.validated);
    }

    #[test]
    fn test_empty_description_falls_back() {
        let meta = ScriptMetadata::parse("--[[\nDescription: \"\"\n]]");
        assert_eq!(meta.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let meta = ScriptMetadata::parse("--[[\nAuthor: someone\nDescription: ok\n]]");
        assert_eq!(meta.description, "ok");
    }

    #[test]
    fn test_extract_docstring_leveled_bracket() {
        let doc = extract_docstring("--[==[\nbody ]] here\n]==]\nrest").unwrap();
        assert_eq!(doc, "\nbody ]] here\n");
    }

    #[test]
    fn test_extract_docstring_none() {
        assert_eq!(extract_docstring("local x = 1"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("hello.lua"), "Hello");
        assert_eq!(display_name("layer_stats.lua"), "Layer Stats");
        assert_eq!(display_name("EXPORT_all_layers.lua"), "Export All Layers");
        assert_eq!(display_name("v2data_fix.lua"), "V2Data Fix");
        assert_eq!(display_name("noext"), "Noext");
    }
}
