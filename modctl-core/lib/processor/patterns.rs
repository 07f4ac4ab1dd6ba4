//! File-class pattern tables: which workspace-relative paths belong to the
//! weight, weight-config, code, and doc layer classes.

use crate::codec::{LAYER_MEDIA_TYPE_RAW, LAYER_MEDIA_TYPE_TAR};

/// A file class a workspace walk can classify a path into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileClass {
    /// Model weight/tensor files — tar-encoded to preserve mode.
    WeightConfig,
    /// Weight tensor files themselves.
    Weight,
    /// Source/build code.
    Code,
    /// Documentation and license files.
    Doc,
}

impl FileClass {
    /// Every class, in `(mediaTypePriority, filepath)` sort order
    /// (`weightConfig < weight < code < doc`, per the re-sort rule).
    pub fn priority(self) -> u8 {
        match self {
            FileClass::WeightConfig => 0,
            FileClass::Weight => 1,
            FileClass::Code => 2,
            FileClass::Doc => 3,
        }
    }

    /// The media type a layer of this class is encoded with. Weight and
    /// weight-config files are tar-wrapped to preserve file mode; code and
    /// docs travel as raw single files.
    pub fn media_type(self) -> &'static str {
        match self {
            FileClass::WeightConfig | FileClass::Weight => LAYER_MEDIA_TYPE_TAR,
            FileClass::Code | FileClass::Doc => LAYER_MEDIA_TYPE_RAW,
        }
    }

    /// Classifies `relative_path` (workspace-relative, forward-slash
    /// separated), returning `None` if it matches no known class (such
    /// paths are skipped by the build walk).
    pub fn classify(relative_path: &str) -> Option<FileClass> {
        let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        let lower = name.to_ascii_lowercase();

        if WEIGHT_CONFIG_NAMES.contains(&lower.as_str()) {
            return Some(FileClass::WeightConfig);
        }
        if WEIGHT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Some(FileClass::Weight);
        }
        if CODE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Some(FileClass::Code);
        }
        if DOC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) || DOC_NAMES.iter().any(|n| lower.starts_with(n)) {
            return Some(FileClass::Doc);
        }

        None
    }
}

const WEIGHT_CONFIG_NAMES: &[&str] = &[
    "config.json",
    "generation_config.json",
    "tokenizer_config.json",
    "tokenizer.json",
    "tokenizer.model",
    "vocab.json",
    "merges.txt",
    "special_tokens_map.json",
    "preprocessor_config.json",
];

const WEIGHT_EXTENSIONS: &[&str] = &[
    ".safetensors",
    ".bin",
    ".pt",
    ".pth",
    ".ckpt",
    ".gguf",
    ".npz",
    ".onnx",
    ".h5",
];

const CODE_EXTENSIONS: &[&str] = &[".py", ".rs", ".c", ".cpp", ".h", ".cu", ".sh", ".ipynb", ".toml", ".yaml", ".yml"];

const DOC_EXTENSIONS: &[&str] = &[".md", ".txt", ".rst"];

const DOC_NAMES: &[&str] = &["readme", "license", "notice", "changelog"];
