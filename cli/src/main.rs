#![warn(clippy::nursery, clippy::pedantic)]
#![deny(unsafe_code)]

// TinyPaste CLI Client
// Copyright (C) 2021  Edward Shen
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tinypaste_common::{
    time, CreatePaste, CreatedPaste, ErrorBody, FetchedPaste, StatelessPaste, Url, API_ENDPOINT,
    PASTE_PAGE_ENDPOINT,
};

#[derive(Parser)]
struct Opts {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Create a paste from a file, or from stdin if no file is given.
    Create {
        /// The TinyPaste instance to create the paste on.
        url: Url,
        /// Seconds until the paste expires.
        #[arg(short, long)]
        ttl: Option<u64>,
        /// Number of times the paste may be viewed.
        #[arg(short, long)]
        max_views: Option<u64>,
        path: Option<PathBuf>,
    },
    /// Fetch a paste. Counts as a view.
    Get {
        /// The paste's link, as printed by `create`.
        url: Url,
    },
    /// Print the content of a self-contained paste id without contacting a
    /// server.
    Decode { id: String },
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    match opts.action {
        Action::Create {
            url,
            ttl,
            max_views,
            path,
        } => handle_create(url, ttl, max_views, path),
        Action::Get { url } => handle_get(&url),
        Action::Decode { id } => handle_decode(&id),
    }?;

    Ok(())
}

fn read_content(path: Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read stdin")?;
            Ok(content)
        }
    }
}

/// Surfaces the server's error message when it sent one.
fn server_error(res: Response) -> anyhow::Error {
    let status = res.status();
    match res.json::<ErrorBody>() {
        Ok(body) => anyhow!("Got HTTP error {}: {}", status, body.error),
        Err(_) => anyhow!("Got HTTP error {}", status),
    }
}

fn handle_create(
    mut url: Url,
    ttl_seconds: Option<u64>,
    max_views: Option<u64>,
    path: Option<PathBuf>,
) -> Result<()> {
    let content = read_content(path)?;
    if content.trim().is_empty() {
        bail!("Refusing to create an empty paste.");
    }

    url.set_fragment(None);
    url.set_query(None);
    url.set_path(&format!("{API_ENDPOINT}/pastes"));

    let res = Client::new()
        .post(url)
        .json(&CreatePaste {
            content,
            ttl_seconds,
            max_views,
        })
        .send()
        .context("Request to server failed")?;

    if res.status() != StatusCode::CREATED {
        return Err(server_error(res));
    }

    let created: CreatedPaste = res.json().context("Server sent an invalid reply")?;
    println!("{}", created.url);

    Ok(())
}

/// Maps a paste page link to the JSON endpoint serving the same paste.
fn api_url(page_url: &Url) -> Result<Url> {
    let id = page_url
        .path()
        .strip_prefix(PASTE_PAGE_ENDPOINT)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(|| anyhow!("{page_url} is not a paste link"))?;

    let mut url = page_url.clone();
    url.set_fragment(None);
    url.set_query(None);
    url.set_path(&format!("{API_ENDPOINT}/pastes/{id}"));
    Ok(url)
}

fn handle_get(url: &Url) -> Result<()> {
    let res = Client::new()
        .get(api_url(url)?)
        .send()
        .context("Failed to get data")?;

    match res.status() {
        StatusCode::OK => (),
        StatusCode::NOT_FOUND => bail!("Paste not found or unavailable."),
        _ => return Err(server_error(res)),
    }

    let paste: FetchedPaste = res.json().context("Server sent an invalid reply")?;
    std::io::stdout().write_all(paste.content.as_bytes())?;

    match paste.expires_at {
        Some(expires_at) => eprintln!("This paste expires at {expires_at}."),
        None => eprintln!("This paste will not expire."),
    }
    if let Some(remaining) = paste.remaining_views {
        eprintln!("Views remaining: {remaining}");
    }

    Ok(())
}

fn handle_decode(id: &str) -> Result<()> {
    let paste = StatelessPaste::decode(id).context("Not a self-contained paste id")?;
    std::io::stdout().write_all(paste.content.as_bytes())?;

    match paste.expires_at {
        Some(expires_at) => {
            let when = time::to_iso8601(expires_at).unwrap_or_else(|| expires_at.to_string());
            if paste.is_available_at(time::now_millis()) {
                eprintln!("This paste expires at {when}.");
            } else {
                eprintln!("This paste expired at {when}.");
            }
        }
        None => eprintln!("This paste will not expire."),
    }

    Ok(())
}
