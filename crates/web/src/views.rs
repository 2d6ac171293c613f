//! Server-rendered HTML pages.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use titlepatch_core::{GameRecord, PatchDocument, ScanSnapshot, ScanState};

const STYLE: &str = "body{font-family:sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}\
table{border-collapse:collapse}td,th{padding:.25rem .75rem;text-align:left;border-bottom:1px solid #ddd}\
pre{background:#f4f4f4;padding:1rem;overflow:auto}.error{color:#a00}.hint{color:#666;font-size:.9em}";

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) " · titlepatch" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                header {
                    h1 { a href="/" { "titlepatch" } }
                    (search_forms())
                    nav {
                        a href="/list" { "All titles" }
                        " · "
                        a href="/scans" { "Scans" }
                    }
                }
                main { (body) }
            }
        }
    }
}

fn search_forms() -> Markup {
    html! {
        form action="/" method="get" {
            input name="title" placeholder="Title";
            " "
            button { "Search" }
        }
        form action="/" method="get" {
            input id="id-search" name="id" placeholder="Identifier";
            " "
            button { "Look up" }
            " "
            span.hint { "e.g. NPUB31419" }
        }
    }
}

/// Landing page.
pub fn index() -> Markup {
    layout(
        "Search",
        html! {
            p { "Search known titles by name, or look up a title identifier to fetch its update patches." }
        },
    )
}

/// Error message page.
pub fn error(message: &str) -> Markup {
    layout("Error", html! { p.error { (message) } })
}

/// Table of catalog records.
pub fn records(heading: &str, records: &[GameRecord]) -> Markup {
    layout(
        heading,
        html! {
            h2 { (heading) }
            @if records.is_empty() {
                p { "No titles stored yet." }
            } @else {
                table {
                    tr { th { "Identifier" } th { "Title" } th { "Added" } }
                    @for record in records {
                        tr {
                            td { a href={ "/id/" (record.code) } { (record.code) } }
                            td { (record.title) }
                            td { (record.created_at.format("%Y-%m-%d").to_string()) }
                        }
                    }
                }
            }
        },
    )
}

/// Parsed patch document for a single identifier.
pub fn document(code: &str, document: &PatchDocument) -> Markup {
    let title = document.title().unwrap_or(code);
    let json = serde_json::to_string_pretty(document).unwrap_or_default();

    layout(
        title,
        html! {
            h2 { (title) " " small { (code) } }
            @for tag in &document.tags {
                @if let Some(name) = &tag.name {
                    h3 { (name) }
                }
                table {
                    tr { th { "Version" } th { "Size" } th { "System" } th { "SHA-1" } th { "Package" } }
                    @for package in &tag.packages {
                        tr {
                            td { (package.version.as_deref().unwrap_or("-")) }
                            td { (package.size.map(format_size).unwrap_or_else(|| "-".to_string())) }
                            td { (package.system_version.as_deref().unwrap_or("-")) }
                            td { code { (package.sha1sum.as_deref().unwrap_or("-")) } }
                            td {
                                @if let Some(url) = package.url.as_deref() {
                                    @if let Some(href) = linkable(url) {
                                        a href=(href) { (file_name(url)) }
                                    } @else {
                                        (url)
                                    }
                                }
                            }
                        }
                    }
                }
            }
            details {
                summary { "Raw" }
                pre { (json) }
            }
        },
    )
}

/// Acknowledgement for a scan that was just started.
pub fn scan_started(scan: &ScanSnapshot) -> Markup {
    layout(
        "Scan started",
        html! {
            p {
                "Scan #" (scan.id) " of " (scan.kind) " serials " (scan.start) ".." (scan.max)
                " is in progress. Follow it on the "
                a href="/scans" { "scans page" }
                "."
            }
        },
    )
}

/// Status of the scans kept by the scan manager.
pub fn scans(scans: &[ScanSnapshot]) -> Markup {
    layout(
        "Scans",
        html! {
            h2 { "Scans" }
            @if scans.is_empty() {
                p { "No scans have been started." }
            } @else {
                table {
                    tr {
                        th { "#" } th { "Type" } th { "Range" } th { "State" }
                        th { "Probed" } th { "Found" } th { "Current" } th {}
                    }
                    @for scan in scans {
                        tr {
                            td { (scan.id) }
                            td { (scan.kind) }
                            td { (scan.start) ".." (scan.max) }
                            td { (scan.state.as_str()) }
                            td { (scan.processed) }
                            td { (scan.found) }
                            td { (scan.current) }
                            td {
                                @if scan.state == ScanState::Running {
                                    form action={ "/scans/" (scan.id) "/cancel" } method="post" {
                                        button { "Cancel" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}

/// Vendor URLs are only linked when they use a web scheme.
fn linkable(url: &str) -> Option<&str> {
    let lower = url.trim_start().to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")).then_some(url)
}

fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use titlepatch_core::PatchDocument;

    use super::*;

    #[test]
    fn record_titles_are_escaped() {
        let record = GameRecord {
            code: "NPUB00001".to_string(),
            title: "<script>alert(1)</script> Tom & Jerry's".to_string(),
            alias: String::new(),
            created_at: Utc::now(),
        };
        let page = records("All titles", &[record]).into_string();
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("Tom &amp; Jerry"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn error_page_escapes_message() {
        let page = error("<script>").into_string();
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn only_web_urls_are_linked() -> anyhow::Result<()> {
        let xml = r#"<titlepatch><tag>
            <package version="01.00" url="javascript:alert(1)"/>
            <package version="01.01" url="http://cdn.example/NPUB00001-A0101.pkg"><paramsfo><TITLE>T</TITLE></paramsfo></package>
        </tag></titlepatch>"#;
        let doc = PatchDocument::parse(xml.as_bytes())?;
        let page = document("NPUB00001", &doc).into_string();
        assert!(!page.contains("href=\"javascript:"));
        assert!(page.contains("href=\"http://cdn.example/NPUB00001-A0101.pkg\""));
        Ok(())
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "0.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
