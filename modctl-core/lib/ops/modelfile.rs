//! Build recipe (Modelfile) parsing.
//!
//! A Modelfile is a line-oriented directive list, one `DIRECTIVE value` pair
//! per line, `#`-prefixed comments and blank lines ignored, rather than a
//! full embedded language, adapted to the handful of model-identity fields
//! the model config block needs. Recognized directives map straight onto
//! [`crate::model_config::ModelDescriptorBlock`]
//! and [`crate::model_config::ModelConfigBlock`]; any unrecognized directive
//! is ignored rather than rejected, since the manifest's `modelfile`
//! annotation carries the verbatim source regardless of what this parser
//! understood from it.

use std::path::Path;

use crate::{ModctlError, ModctlResult};

/// Model-identity fields a Modelfile can set, pulled out by [`parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelfileDirectives {
    /// `NAME` directive.
    pub name: Option<String>,
    /// `FAMILY` directive.
    pub family: Option<String>,
    /// `ARCH` directive.
    pub architecture: Option<String>,
    /// `FORMAT` directive.
    pub format: Option<String>,
    /// `PRECISION` directive.
    pub precision: Option<String>,
    /// `QUANTIZATION` directive.
    pub quantization: Option<String>,
    /// `PARAMSIZE` directive.
    pub param_size: Option<String>,
}

/// A parsed Modelfile: its recognized directives plus the verbatim source
/// bytes, which the manifest stores unmodified under the `modelfile`
/// annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modelfile {
    /// Recognized directives.
    pub directives: ModelfileDirectives,
    /// The file's verbatim contents.
    pub raw: String,
}

/// Reads and parses the Modelfile at `path`.
pub async fn load(path: &Path) -> ModctlResult<Modelfile> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ModctlError::Parse(format!("reading modelfile {}: {e}", path.display())))?;
    Ok(parse(raw))
}

/// Parses Modelfile source text into its recognized directives.
pub fn parse(raw: String) -> Modelfile {
    let mut directives = ModelfileDirectives::default();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((directive, value)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }

        match directive.to_ascii_uppercase().as_str() {
            "NAME" => directives.name = Some(value),
            "FAMILY" => directives.family = Some(value),
            "ARCH" | "ARCHITECTURE" => directives.architecture = Some(value),
            "FORMAT" => directives.format = Some(value),
            "PRECISION" => directives.precision = Some(value),
            "QUANTIZATION" => directives.quantization = Some(value),
            "PARAMSIZE" => directives.param_size = Some(value),
            _ => {}
        }
    }

    Modelfile { directives, raw }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_directives() {
        let source = "NAME llama-3-8b\nFAMILY llama\nARCH transformer\n# a comment\nFORMAT safetensors\nPRECISION fp16\nQUANTIZATION q4_0\nPARAMSIZE 8B\n";
        let modelfile = parse(source.to_string());

        assert_eq!(modelfile.directives.name.as_deref(), Some("llama-3-8b"));
        assert_eq!(modelfile.directives.family.as_deref(), Some("llama"));
        assert_eq!(modelfile.directives.architecture.as_deref(), Some("transformer"));
        assert_eq!(modelfile.directives.format.as_deref(), Some("safetensors"));
        assert_eq!(modelfile.directives.precision.as_deref(), Some("fp16"));
        assert_eq!(modelfile.directives.quantization.as_deref(), Some("q4_0"));
        assert_eq!(modelfile.directives.param_size.as_deref(), Some("8B"));
        assert_eq!(modelfile.raw, source);
    }

    #[test]
    fn ignores_unrecognized_directives_and_blank_lines() {
        let modelfile = parse("\n  \nUNKNOWN something\nNAME demo\n".to_string());
        assert_eq!(modelfile.directives.name.as_deref(), Some("demo"));
    }
}
