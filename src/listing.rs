//! Directory listings as HTML pages or tab-aligned plain text.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::filter::ExclusionFilter;
use crate::size::DIR_SIZE;
use crate::tree::TreeNode;

/// Name of the synthetic parent-directory entry.
pub const PARENT_ENTRY: &str = "..";

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// Root-relative path used for links.
    pub path: String,
    pub name: String,
    pub size: String,
    pub is_dir: bool,
}

impl From<&TreeNode> for ListingEntry {
    fn from(node: &TreeNode) -> Self {
        Self {
            path: node.rel_path.clone(),
            name: node.name.clone(),
            size: node.size.clone(),
            is_dir: node.is_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub path: String,
    pub name: String,
}

/// Everything the HTML page shows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub breadcrumbs: Vec<Breadcrumb>,
    pub files: Vec<ListingEntry>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingFormat {
    #[default]
    Html,
    Text,
}

/// Trim slashes and empty segments: `"/a//b/"` becomes `"a/b"`.
pub fn normalize_dir_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_path(dir_path: &str) -> &str {
    dir_path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Directories first, then byte-wise name order. Stable.
pub fn sort_entries(entries: &mut [ListingEntry]) {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
}

/// Ancestor segments of `dir_path` with cumulative prefixes, root to leaf.
pub fn breadcrumbs(dir_path: &str) -> Vec<Breadcrumb> {
    let mut prefix = String::new();
    dir_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|name| {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(name);
            Breadcrumb {
                path: prefix.clone(),
                name: name.to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ListingRenderer {
    filter: ExclusionFilter,
    version: String,
    files_url: String,
}

impl ListingRenderer {
    pub fn new(filter: ExclusionFilter, version: impl Into<String>, files_url: impl Into<String>) -> Self {
        Self {
            filter,
            version: version.into(),
            files_url: files_url.into(),
        }
    }

    pub fn filter(&self) -> &ExclusionFilter {
        &self.filter
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Filter, add the parent entry below the root, and sort.
    pub fn prepare(&self, dir_path: &str, entries: Vec<ListingEntry>) -> Vec<ListingEntry> {
        let dir_path = normalize_dir_path(dir_path);
        let mut files = Vec::with_capacity(entries.len() + 1);

        if !dir_path.is_empty() {
            files.push(ListingEntry {
                path: parent_path(&dir_path).to_string(),
                name: PARENT_ENTRY.to_string(),
                size: DIR_SIZE.to_string(),
                is_dir: true,
            });
        }

        files.extend(entries.into_iter().filter(|e| self.filter.include(&e.name)));
        sort_entries(&mut files);
        files
    }

    pub fn page(&self, dir_path: &str, entries: Vec<ListingEntry>) -> Page {
        Page {
            breadcrumbs: breadcrumbs(dir_path),
            files: self.prepare(dir_path, entries),
            version: self.version.clone(),
            error: None,
        }
    }

    pub fn error_page(&self, message: impl Into<String>) -> Page {
        Page {
            version: self.version.clone(),
            error: Some(message.into()),
            ..Page::default()
        }
    }

    pub fn render(&self, format: ListingFormat, dir_path: &str, entries: Vec<ListingEntry>) -> String {
        match format {
            ListingFormat::Html => self.render_html(&self.page(dir_path, entries)),
            ListingFormat::Text => self.render_text(dir_path, entries),
        }
    }

    /// One line per entry: `name/` for directories, `name<TAB>size` for
    /// files, then aligned on tab stops.
    pub fn render_text(&self, dir_path: &str, entries: Vec<ListingEntry>) -> String {
        let mut buf = String::new();
        for file in self.prepare(dir_path, entries) {
            buf.push_str(&file.name);
            if file.is_dir {
                buf.push('/');
            } else {
                buf.push('\t');
                buf.push_str(&file.size);
            }
            buf.push('\n');
        }
        align_tabs(&buf)
    }

    pub fn render_html(&self, page: &Page) -> String {
        let mut html = String::new();
        let title = match page.breadcrumbs.last() {
            Some(crumb) => crumb.name.as_str(),
            None => "/",
        };

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        let _ = writeln!(html, "<title>Index of {}</title>", html_escape(title));
        html.push_str(STYLE);
        html.push_str("</head>\n<body>\n<main>\n");

        match &page.error {
            Some(error) => {
                let _ = writeln!(html, "<p class=\"error\">{}</p>", html_escape(error));
            }
            None => {
                html.push_str("<nav class=\"breadcrumbs\">\n");
                let _ = write!(html, "<a href=\"{}\">/</a>", self.href(""));
                for crumb in &page.breadcrumbs {
                    let _ = write!(
                        html,
                        " <a href=\"{}\">{}</a> /",
                        self.href(&crumb.path),
                        html_escape(&crumb.name)
                    );
                }
                html.push_str("\n</nav>\n<table>\n");
                html.push_str("<thead><tr><th>Name</th><th>Size</th></tr></thead>\n<tbody>\n");
                for file in &page.files {
                    let class = if file.is_dir { "dir" } else { "file" };
                    let suffix = if file.is_dir { "/" } else { "" };
                    let _ = writeln!(
                        html,
                        "<tr class=\"{class}\"><td><a href=\"{}\">{}{suffix}</a></td><td>{}</td></tr>",
                        self.href(&file.path),
                        html_escape(&file.name),
                        html_escape(file.size.trim()),
                    );
                }
                html.push_str("</tbody>\n</table>\n");
            }
        }

        let _ = writeln!(html, "</main>\n<footer>{}</footer>", html_escape(&page.version));
        html.push_str("</body>\n</html>\n");
        html
    }

    fn href(&self, path: &str) -> String {
        let mut href = self.files_url.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            href.push('/');
            href.push_str(&urlencoding::encode(segment));
        }
        html_escape(&href)
    }
}

const STYLE: &str = "<style>\n\
body { font-family: ui-monospace, monospace; margin: 2rem; }\n\
table { border-collapse: collapse; }\n\
td, th { padding: 0.2rem 1rem 0.2rem 0; text-align: left; }\n\
tr.dir a { font-weight: bold; }\n\
.error { color: #b00020; }\n\
footer { margin-top: 2rem; color: #888; }\n\
</style>\n";

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Pad the first cell of each tab-separated line so the second column lines
/// up. Alignment restarts after any line without a tab.
fn align_tabs(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].contains('\t') {
            out.push_str(lines[i]);
            out.push('\n');
            i += 1;
            continue;
        }

        let end = lines[i..]
            .iter()
            .position(|line| !line.contains('\t'))
            .map_or(lines.len(), |offset| i + offset);

        let width = lines[i..end]
            .iter()
            .filter_map(|line| line.split_once('\t'))
            .map(|(cell, _)| cell.chars().count())
            .max()
            .unwrap_or(0)
            + 1;

        for line in &lines[i..end] {
            if let Some((cell, rest)) = line.split_once('\t') {
                out.push_str(cell);
                out.extend(std::iter::repeat_n(' ', width - cell.chars().count()));
                out.push_str(rest);
            }
            out.push('\n');
        }
        i = end;
    }

    out
}
