//! Scripts folder bootstrap
//!
//! First use creates the scripts folder and seeds it with one example script,
//! written in the user's language when a template exists for it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::error::ScriptResult;

/// File name of the seeded example
pub const EXAMPLE_SCRIPT: &str = "layers_example.lua";

/// Map a host locale (`pt_BR`, `es-MX`, `de`) to the language key used for
/// templates: the first two letters, widened to a region for the languages
/// that have one.
pub fn normalize_locale(locale: &str) -> String {
    let language: String = locale.chars().take(2).collect::<String>().to_lowercase();
    match language.as_str() {
        "pt" => "pt_BR".to_string(),
        "es" => "es_ES".to_string(),
        "fr" => "fr_FR".to_string(),
        "de" => "de_DE".to_string(),
        "it" => "it_IT".to_string(),
        _ => language,
    }
}

/// Example script text for `locale`
pub fn example_script(locale: &str) -> &'static str {
    match normalize_locale(locale).as_str() {
        "pt_BR" => EXAMPLE_PT_BR,
        _ => EXAMPLE_EN,
    }
}

/// Create `dir` if missing and seed it with the example script.
///
/// Returns the path of the written example, or `None` when the folder
/// already existed and nothing was touched.
pub fn ensure_scripts_dir(dir: &Path, locale: &str) -> ScriptResult<Option<PathBuf>> {
    if dir.exists() {
        return Ok(None);
    }

    fs::create_dir_all(dir)?;
    let example = dir.join(EXAMPLE_SCRIPT);
    fs::write(&example, example_script(locale))?;

    info!(dir = %dir.display(), locale = %normalize_locale(locale), "Created scripts folder with example script");
    Ok(Some(example))
}

const EXAMPLE_EN: &str = r#"--[[
Lua Example Script
Description: Example script demonstrating print usage and layer information
]]

local function layer_label(layer)
    if type(layer) == "table" then
        return string.format("%s (%s)", layer.name or "?", layer.type or "Vector")
    end
    return tostring(layer)
end

local function main()
    print("🚀 Starting example script...")

    local layers = {}
    if type(project) == "table" and type(project.layers) == "function" then
        layers = project.layers() or {}
    end

    local title = (type(project) == "table" and project.title) or "untitled"
    print(string.format("📊 Analyzing project: %s", title))
    print(string.format("📁 Number of layers found: %d", #layers))

    if #layers == 0 then
        print("❌ No layers loaded in the project.")
    else
        print("📋 Layer list:")
        for i, layer in ipairs(layers) do
            print(string.format("  %d. %s", i, layer_label(layer)))
        end
    end

    print("✅ Script executed successfully!")
end

if __name__ == "__main__" then
    main()
end
"#;

const EXAMPLE_PT_BR: &str = r#"--[[
Script Exemplo Lua
Descrição: Script exemplo que demonstra uso de print e informações das camadas
]]

local function rotulo_camada(camada)
    if type(camada) == "table" then
        return string.format("%s (%s)", camada.name or "?", camada.type or "Vetor")
    end
    return tostring(camada)
end

local function main()
    print("🚀 Iniciando script exemplo...")

    local camadas = {}
    if type(project) == "table" and type(project.layers) == "function" then
        camadas = project.layers() or {}
    end

    local titulo = (type(project) == "table" and project.title) or "sem título"
    print(string.format("📊 Analisando projeto: %s", titulo))
    print(string.format("📁 Número de camadas encontradas: %d", #camadas))

    if #camadas == 0 then
        print("❌ Nenhuma camada carregada no projeto.")
    else
        print("📋 Lista de camadas:")
        for i, camada in ipairs(camadas) do
            print(string.format("  %d. %s", i, rotulo_camada(camada)))
        end
    end

    print("✅ Script executado com sucesso!")
end

if __name__ == "__main__" then
    main()
end
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scripts::metadata::ScriptMetadata;
    use crate::core::scripts::scanner::scan;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("pt_BR"), "pt_BR");
        assert_eq!(normalize_locale("pt_PT"), "pt_BR");
        assert_eq!(normalize_locale("es-MX"), "es_ES");
        assert_eq!(normalize_locale("DE"), "de_DE");
        assert_eq!(normalize_locale("en_US"), "en");
        assert_eq!(normalize_locale("ja_JP"), "ja");
        assert_eq!(normalize_locale(""), "");
    }

    #[test]
    fn test_example_language() {
        assert!(example_script("pt_BR").contains("Descrição:"));
        assert!(example_script("en_US").contains("Description:"));
        assert!(example_script("fr_FR").contains("Description:"));
    }

    #[test]
    fn test_examples_have_metadata_and_no_warnings() {
        for locale in ["en_US", "pt_BR"] {
            let source = example_script(locale);
            let meta = ScriptMetadata::parse(source);
            assert_ne!(meta.description, "Lua script", "locale {}", locale);
            assert!(scan(source).is_empty(), "locale {}", locale);
        }
    }

    #[test]
    fn test_examples_compile() {
        let lua = mlua::Lua::new();
        for locale in ["en_US", "pt_BR"] {
            lua.load(example_script(locale)).into_function().unwrap();
        }
    }

    #[test]
    fn test_ensure_creates_and_seeds() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("scripts");
        let written = ensure_scripts_dir(&dir, "en_US").unwrap();
        assert_eq!(written, Some(dir.join(EXAMPLE_SCRIPT)));
        assert!(dir.join(EXAMPLE_SCRIPT).is_file());
    }

    #[test]
    fn test_ensure_leaves_existing_dir_alone() {
        let temp = TempDir::new().unwrap();
        let written = ensure_scripts_dir(temp.path(), "en_US").unwrap();
        assert_eq!(written, None);
        assert!(!temp.path().join(EXAMPLE_SCRIPT).exists());
    }
}
