//! HTML pages. maud escapes every interpolated value, paste content included.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use tinypaste_common::time;

use crate::lifecycle::{PasteView, ViewCount};

const PAGE_CSS: &str = r"
:root{--primary-color:#2563eb;--primary-hover:#1d4ed8;--bg-color:#f8fafc;--card-bg:#fff;--text-color:#1e293b;--border-color:#e2e8f0}
body{font-family:'Segoe UI',system-ui,-apple-system,sans-serif;background-color:var(--bg-color);color:var(--text-color);line-height:1.5;margin:0;padding:2rem 1rem}
.container{max-width:800px;margin:0 auto}
.card{background:var(--card-bg);border-radius:8px;box-shadow:0 4px 6px -1px rgb(0 0 0 / .1),0 2px 4px -2px rgb(0 0 0 / .1);padding:2rem;border:1px solid var(--border-color)}
.header{margin-bottom:1.5rem;padding-bottom:1rem;border-bottom:1px solid var(--border-color);display:flex;justify-content:space-between;align-items:center;flex-wrap:wrap;gap:1rem}
h1{margin:0;font-size:1.5rem;color:var(--primary-color);word-break:break-all}
.meta{color:#64748b;font-size:.875rem;background:#f1f5f9;padding:.5rem 1rem;border-radius:9999px}
.sep{margin:0 .5rem}
pre{background:#f8fafc;padding:1.5rem;border-radius:6px;overflow-x:auto;white-space:pre-wrap;border:1px solid var(--border-color);font-family:'Consolas','Monaco',monospace;margin:0;font-size:.95rem}
.actions{margin-top:2rem;text-align:center}
.btn{display:inline-block;padding:.75rem 1.5rem;background-color:var(--primary-color);color:#fff;text-decoration:none;border-radius:6px;font-weight:600;transition:background-color .15s ease-in-out}
.btn:hover{background-color:var(--primary-hover)}
";

fn expiry_text(expires_at: Option<i64>) -> String {
    match expires_at.and_then(time::to_datetime) {
        Some(time) => format!("Expires: {}", time.format("%Y-%m-%d %H:%M:%S UTC")),
        None => "Never Expires".to_string(),
    }
}

fn view_text(count: ViewCount) -> String {
    match count {
        ViewCount::Untracked => "Views: N/A".to_string(),
        ViewCount::Limited { views, max } => format!("Views: {views}/{max}"),
        ViewCount::Unlimited(views) => format!("Views: {views}"),
    }
}

fn page(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="robots" content="noindex";
                title { (title) }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                div.container { div.card { (body) } }
            }
        }
    }
}

pub fn paste_page(id: &str, view: &PasteView) -> Markup {
    page(
        &format!("Paste {id}"),
        html! {
            div.header {
                h1 { "Paste #" (id) }
                div.meta {
                    (expiry_text(view.expires_at))
                    span.sep { "|" }
                    (view_text(view.view_count()))
                }
            }
            pre { (view.content) }
            div.actions {
                a.btn href="/" { "Create New Paste" }
            }
        },
    )
}

pub fn not_found_page() -> Markup {
    page(
        "Paste not found",
        html! {
            h1 { "404 - Paste not found or unavailable" }
            div.actions {
                a.btn href="/" { "Create New Paste" }
            }
        },
    )
}

pub fn error_page(message: &str) -> Markup {
    page(message, html! { h1 { (message) } })
}
