//! Static import-to-package inference for generated source files.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::FileRecord;

/// Python import roots mapped to the pip requirement that provides them.
///
/// Imports that are not listed here are assumed to be standard library or
/// local modules and are not installed.
pub const PYTHON_PACKAGES: &[(&str, &str)] = &[
    ("numpy", "numpy"),
    ("pandas", "pandas"),
    ("cv2", "opencv-python-headless"),
    ("PIL", "pillow"),
    ("sklearn", "scikit-learn"),
    ("openai", "openai"),
    ("google.generativeai", "google-generativeai"),
    ("fastapi", "fastapi"),
    ("uvicorn", "uvicorn"),
    ("flask", "flask"),
    ("flask_cors", "flask-cors"),
    ("sqlalchemy", "sqlalchemy"),
    ("jose", "python-jose[cryptography]"),
    ("jwt", "python-jose[cryptography]"),
    ("passlib", "passlib[bcrypt]"),
    ("bcrypt", "bcrypt==4.0.1"),
    ("multipart", "python-multipart"),
    ("dotenv", "python-dotenv"),
    ("requests", "requests"),
    ("pydantic", "pydantic"),
    ("email_validator", "email-validator"),
    ("bs4", "beautifulsoup4"),
    ("pymongo", "pymongo"),
    ("motor", "motor"),
    ("psycopg2", "psycopg2-binary"),
    ("httpx", "httpx"),
];

/// Packages every generated Python backend gets, whatever it imports.
pub const PYTHON_BASELINE: &[&str] = &["fastapi", "uvicorn", "python-multipart"];

/// Packages installed for a Node backend that ships no manifest.
pub const NODE_BASELINE: &[&str] =
    &["express", "mongoose", "cors", "dotenv", "bcrypt", "multer", "node-fetch", "cookie-parser"];

fn import_pattern() -> Option<&'static Regex> {
    static IMPORTS: OnceLock<Option<Regex>> = OnceLock::new();
    IMPORTS
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?m)^\s*(?:from\s+([A-Za-z_][\w.]*)\s+import\s+(.+)",
                r"|import\s+([A-Za-z_][\w., ]*))",
            ))
            .ok()
        })
        .as_ref()
}

fn lookup(module: &str) -> Option<&'static str> {
    PYTHON_PACKAGES
        .iter()
        .find(|(name, _)| module == *name || module.starts_with(&format!("{name}.")))
        .map(|(_, package)| *package)
}

/// Module names of an `import a, b.c as d` list.
fn imported_modules(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').filter_map(|alias| alias.split_whitespace().next())
}

/// Infers the pip packages a set of generated files needs.
///
/// Only `.py` files are scanned. The result is sorted and always includes
/// [`PYTHON_BASELINE`].
#[must_use]
pub fn infer_python_packages(files: &[FileRecord]) -> Vec<String> {
    let mut packages: BTreeSet<String> = PYTHON_BASELINE.iter().map(ToString::to_string).collect();
    let Some(pattern) = import_pattern() else {
        return packages.into_iter().collect();
    };

    for file in files.iter().filter(|f| f.path.ends_with(".py")) {
        for caps in pattern.captures_iter(&file.content) {
            let modules: Vec<&str> = match (caps.get(1), caps.get(3)) {
                (Some(from), _) => vec![from.as_str()],
                (None, Some(list)) => imported_modules(list.as_str()).collect(),
                (None, None) => Vec::new(),
            };
            for package in modules.iter().filter_map(|m| lookup(m)) {
                packages.insert(package.to_string());
            }
            let module = modules.first().copied().unwrap_or_default();
            if module.starts_with("pydantic")
                && caps.get(2).is_some_and(|names| names.as_str().contains("EmailStr"))
            {
                packages.insert("pydantic[email]".to_string());
                packages.insert("email-validator".to_string());
            }
        }
    }
    packages.into_iter().collect()
}

/// Lists the runtime dependency names declared in a `package.json` document.
///
/// Returns an empty list when the document is not valid JSON.
#[must_use]
pub fn node_dependencies(manifest: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(manifest) else {
        return Vec::new();
    };
    value
        .get("dependencies")
        .and_then(serde_json::Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_imports_through_table() {
        let files = vec![
            FileRecord::new(
                "backend/main.py",
                "import os\nimport cv2\nfrom PIL import Image\n\
                 from jose import jwt\nfrom flask_cors import CORS\n",
            ),
            FileRecord::new("frontend/app.js", "import numpy from 'numpy'"),
        ];
        let packages = infer_python_packages(&files);
        assert!(packages.contains(&"opencv-python-headless".to_string()));
        assert!(packages.contains(&"pillow".to_string()));
        assert!(packages.contains(&"python-jose[cryptography]".to_string()));
        assert!(packages.contains(&"flask-cors".to_string()));
        assert!(!packages.contains(&"numpy".to_string()));
        assert!(!packages.iter().any(|p| p == "os"));
    }

    #[test]
    fn every_module_of_an_import_list_counts() {
        let files = vec![FileRecord::new("auth.py", "import os, jwt\nimport sys, requests as r\n")];
        let packages = infer_python_packages(&files);
        assert_eq!(
            packages,
            vec!["fastapi", "python-jose[cryptography]", "python-multipart", "requests", "uvicorn"]
        );
    }

    #[test]
    fn always_includes_baseline() {
        let packages = infer_python_packages(&[]);
        assert_eq!(packages, vec!["fastapi", "python-multipart", "uvicorn"]);
    }

    #[test]
    fn email_str_pulls_in_validator() {
        let files =
            vec![FileRecord::new("api/models.py", "from pydantic import BaseModel, EmailStr\n")];
        let packages = infer_python_packages(&files);
        assert!(packages.contains(&"pydantic[email]".to_string()));
        assert!(packages.contains(&"email-validator".to_string()));
        assert!(packages.contains(&"pydantic".to_string()));
    }

    #[test]
    fn dotted_submodules_resolve_to_root_package() {
        let files = vec![FileRecord::new(
            "app.py",
            "from sqlalchemy.orm import Session\nimport google.generativeai as genai\n",
        )];
        let packages = infer_python_packages(&files);
        assert!(packages.contains(&"sqlalchemy".to_string()));
        assert!(packages.contains(&"google-generativeai".to_string()));
    }

    #[test]
    fn reads_package_json_dependencies() {
        let deps = node_dependencies(r#"{"dependencies": {"express": "^4", "cors": "^2"}}"#);
        assert_eq!(deps, vec!["cors", "express"]);
        assert!(node_dependencies("not json").is_empty());
    }
}
