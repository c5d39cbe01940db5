//! Keyword and pattern detection that turns scanned files into a
//! [`TechStackProfile`].

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{FileRecord, TechStackProfile};

/// Env var names taken from a single config file.
const ENV_VARS_PER_FILE: usize = 10;

const BACKEND_FRAMEWORKS: &[(&str, &[&str])] = &[
    ("FastAPI", &["fastapi"]),
    ("Flask", &["from flask", "import flask"]),
    (
        "Express.js",
        &["require('express')", "require(\"express\")", "from 'express'", "from \"express\""],
    ),
    ("Django", &["django"]),
];

const DATABASES: &[(&str, &[&str])] = &[
    ("MongoDB", &["mongodb", "mongoose", "pymongo"]),
    ("PostgreSQL", &["postgresql", "psycopg", "postgres://"]),
    ("MySQL", &["mysql", "pymysql"]),
    ("SQLite", &["sqlite"]),
];

const FRONTEND_FRAMEWORKS: &[(&str, &[&str])] = &[
    ("React", &["from 'react'", "from \"react\"", "require('react')", "\"react\":"]),
    ("Vue.js", &["from 'vue'", "from \"vue\"", "\"vue\":", "<template>"]),
    ("Angular", &["@angular/"]),
    ("Next.js", &["from 'next", "from \"next", "\"next\":"]),
];

const STYLING: &[(&str, &[&str])] = &[
    ("Tailwind CSS", &["tailwind"]),
    ("Bootstrap", &["bootstrap"]),
];

const AUTH: &[(&str, &[&str])] = &[
    ("JWT", &["jwt", "jsonwebtoken"]),
    ("OAuth", &["oauth"]),
    ("Session", &["express-session", "flask_login", "session["]),
];

const PRESERVE_MARKERS: &[&str] = &["model", "schema", "database", "db.", "auth", "middleware"];
const MODERNIZE_MARKERS: &[&str] = &["component", "page", "view", "template", "style", "css", "ui"];

fn first_match(table: &[(&'static str, &[&str])], content: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| content.contains(n)))
        .map(|(name, _)| *name)
}

fn fill(slot: &mut Option<String>, found: Option<&str>) {
    if slot.is_none() {
        *slot = found.map(ToString::to_string);
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn python_route_pattern() -> Option<&'static Regex> {
    static ROUTE: OnceLock<Option<Regex>> = OnceLock::new();
    ROUTE
        .get_or_init(|| {
            Regex::new(r#"@(?:app|router|bp|api)\.(get|post|put|delete|patch|route)\(\s*['"]([^'"]+)['"]"#).ok()
        })
        .as_ref()
}

fn express_route_pattern() -> Option<&'static Regex> {
    static ROUTE: OnceLock<Option<Regex>> = OnceLock::new();
    ROUTE
        .get_or_init(|| {
            Regex::new(r#"(?:app|router)\.(get|post|put|delete|patch|options)\s*\(\s*['"]([^'"]+)['"]"#).ok()
        })
        .as_ref()
}

fn env_var_pattern() -> Option<&'static Regex> {
    static ENV: OnceLock<Option<Regex>> = OnceLock::new();
    ENV.get_or_init(|| Regex::new(r"(?m)^\s*(?:export\s+)?([A-Z_][A-Z0-9_]+)\s*=").ok()).as_ref()
}

/// `METHOD /path` strings declared by route decorators or router calls.
#[must_use]
pub fn extract_endpoints(content: &str) -> Vec<String> {
    let mut endpoints = Vec::new();
    for pattern in [python_route_pattern(), express_route_pattern()].into_iter().flatten() {
        for caps in pattern.captures_iter(content) {
            let method = match &caps[1] {
                "route" => "GET".to_string(),
                other => other.to_uppercase(),
            };
            push_unique(&mut endpoints, format!("{method} {}", &caps[2]));
        }
    }
    endpoints
}

/// Variable names assigned in a dotenv or config file, at most ten.
#[must_use]
pub fn extract_env_vars(content: &str) -> Vec<String> {
    let Some(pattern) = env_var_pattern() else {
        return Vec::new();
    };
    pattern.captures_iter(content).map(|caps| caps[1].to_string()).take(ENV_VARS_PER_FILE).collect()
}

/// Folds one file into `profile`.
///
/// Detection is first-wins per slot, except that a React frontend is
/// upgraded to Next.js once a file imports Next.
pub fn observe(profile: &mut TechStackProfile, file: &FileRecord) {
    let path_lower = file.path.to_lowercase();
    let content_lower = file.content.to_lowercase();

    fill(&mut profile.backend.framework, first_match(BACKEND_FRAMEWORKS, &content_lower));
    fill(&mut profile.backend.auth, first_match(AUTH, &content_lower));
    fill(&mut profile.frontend.styling, first_match(STYLING, &content_lower));

    let frontend = first_match(FRONTEND_FRAMEWORKS, &content_lower);
    if frontend == Some("Next.js") && profile.frontend.framework.as_deref() == Some("React") {
        profile.frontend.framework = Some("Next.js".to_string());
    }
    fill(&mut profile.frontend.framework, frontend);

    if let Some(database) = first_match(DATABASES, &content_lower) {
        fill(&mut profile.backend.database, Some(database));
        if database != "SQLite" {
            let item = format!("{database} database connection in {}", file.path);
            push_unique(&mut profile.must_preserve, item);
        }
    } else if path_lower.ends_with(".prisma") || content_lower.contains("@prisma/client") {
        push_unique(&mut profile.must_preserve, format!("Prisma schema in {}", file.path));
    }

    let endpoints = extract_endpoints(&file.content);
    if !endpoints.is_empty() {
        push_unique(&mut profile.must_preserve, format!("API endpoints in {}", file.path));
        for endpoint in endpoints {
            push_unique(&mut profile.api_endpoints, endpoint);
        }
    }

    if path_lower.contains(".env") || path_lower.contains("config") {
        for var in extract_env_vars(&file.content) {
            push_unique(&mut profile.env_vars, var);
        }
    }
}

/// Sorts paths into the preserve and modernize lists.
pub fn categorize(profile: &mut TechStackProfile, files: &[FileRecord]) {
    for file in files {
        let lower = file.path.to_lowercase();
        if PRESERVE_MARKERS.iter().any(|m| lower.contains(m)) {
            push_unique(&mut profile.must_preserve, format!("Core logic in {}", file.path));
        } else if MODERNIZE_MARKERS.iter().any(|m| lower.contains(m)) {
            push_unique(&mut profile.can_modernize, file.path.clone());
        }
    }
}

/// Builds the full profile for a file set.
#[must_use]
pub fn build_profile(files: &[FileRecord]) -> TechStackProfile {
    let mut profile = TechStackProfile::default();
    for file in files {
        observe(&mut profile, file);
    }
    categorize(&mut profile, files);
    profile
}

/// One-line summary of what the scan found worth keeping.
#[must_use]
pub fn preservation_summary(profile: &TechStackProfile, total_files: usize) -> String {
    format!(
        "{total_files} files scanned; database: {}; {} items to preserve, {} to modernize, \
         {} API endpoints",
        profile.backend.database.as_deref().unwrap_or("none detected"),
        profile.must_preserve.len(),
        profile.can_modernize.len(),
        profile.api_endpoints.len(),
    )
}
