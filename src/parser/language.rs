use std::fmt;
use std::path::Path;

/// Source languages with tree-sitter support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    Rust,
    Java,
    Cpp,
    CSharp,
}

impl Language {
    pub const ALL: [Language; 9] = [
        Language::TypeScript,
        Language::Tsx,
        Language::JavaScript,
        Language::Python,
        Language::Go,
        Language::Rust,
        Language::Java,
        Language::Cpp,
        Language::CSharp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
        }
    }

    /// Prefix of a single-line comment, used for continuation markers.
    pub fn line_comment(&self) -> &'static str {
        match self {
            Language::Python => "#",
            _ => "//",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        let language = match ext {
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "py" => Language::Python,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "cs" => Language::CSharp,
            _ => return None,
        };
        Some(language)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the language of a file from its extension (case-insensitive).
pub fn detect(path: impl AsRef<Path>) -> Option<Language> {
    let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
    Language::from_extension(&ext)
}

/// Language tag recorded on chunks; unrecognized files are tagged `other`.
pub fn tag_for(path: impl AsRef<Path>) -> &'static str {
    detect(path).map(|l| l.as_str()).unwrap_or("other")
}
