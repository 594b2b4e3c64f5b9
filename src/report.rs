use crate::config::ImageFormat;
use crate::session::RecordedStep;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write report {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

const STYLE: &str = r#"
      :root {
        --bg-color: #f3f4f6;
        --card-bg: #ffffff;
        --text-main: #111827;
        --text-sub: #6b7280;
        --accent-color: #3b82f6;
        --border-color: #e5e7eb;
      }
      body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background-color: var(--bg-color);
        color: var(--text-main);
        margin: 0;
        padding: 40px 20px;
        line-height: 1.6;
      }
      .container { margin: 0 auto; }
      header { text-align: center; margin-bottom: 60px; }
      h1 {
        font-size: 2.5rem;
        font-weight: 800;
        margin: 0 0 10px 0;
        letter-spacing: -0.05rem;
      }
      ol.steps { list-style: none; margin: 0; padding: 0; }
      .step-card {
        background: var(--card-bg);
        border-radius: 16px;
        box-shadow: 0 4px 6px -1px rgba(0, 0, 0, 0.1), 0 2px 4px -1px rgba(0, 0, 0, 0.06);
        margin-bottom: 40px;
        overflow: hidden;
        border: 1px solid var(--border-color);
      }
      .step-header {
        padding: 20px 24px;
        border-bottom: 1px solid var(--border-color);
        display: flex;
        align-items: center;
        gap: 15px;
        background: #f9fafb;
      }
      .step-badge {
        background-color: var(--accent-color);
        color: white;
        font-weight: 700;
        font-size: 0.85rem;
        width: 28px;
        height: 28px;
        border-radius: 50%;
        display: flex;
        align-items: center;
        justify-content: center;
        flex-shrink: 0;
      }
      .step-title { font-weight: 600; font-size: 1.1rem; color: #374151; }
      .step-time { margin-left: auto; font-size: 0.85rem; color: var(--text-sub); }
      .step-image-container { background-color: #000; display: flex; justify-content: center; }
      img { display: block; max-width: 100%; height: auto; }
"#;

/// Escapes text for use in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn data_uri(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}

/// Compiles recorded steps and their screenshots into one standalone html
/// document.
#[derive(Debug)]
pub struct ReportBuilder<'a> {
    title: &'a str,
    outfile: &'a Path,
    steps: &'a [RecordedStep],
    image_dir: &'a Path,
    format: ImageFormat,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        title: &'a str,
        outfile: &'a Path,
        steps: &'a [RecordedStep],
        image_dir: &'a Path,
        format: ImageFormat,
    ) -> Self {
        Self {
            title,
            outfile,
            steps,
            image_dir,
            format,
        }
    }

    /// Reads a screenshot and returns it as a data uri, or `None` if the
    /// file is gone.
    fn inline_image(&self, filename: &str) -> Option<String> {
        let path = self.image_dir.join(filename);
        match fs::read(&path) {
            Ok(bytes) => Some(data_uri(&bytes, self.format)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "screenshot missing, rendering step without image");
                None
            }
        }
    }

    pub fn render(&self) -> String {
        let title = escape_html(self.title);
        let mut html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{title}</title>
    <style>{STYLE}</style>
  </head>
  <body>
    <div class="container">
      <header>
        <h1>{title}</h1>
      </header>
      <ol class="steps">
"#
        );

        for (i, step) in self.steps.iter().enumerate() {
            let image = step
                .image_filename
                .as_deref()
                .and_then(|name| self.inline_image(name))
                .map(|src| {
                    format!(
                        "\n          <div class=\"step-image-container\"><img src=\"{src}\" alt=\"Step {}\" loading=\"lazy\" /></div>",
                        i + 1
                    )
                })
                .unwrap_or_default();

            html.push_str(&format!(
                r#"        <li class="step-card">
          <div class="step-header">
            <div class="step-badge">{n}</div>
            <div class="step-title">{description}</div>
            <div class="step-time">{time}</div>
          </div>{image}
        </li>
"#,
                n = i + 1,
                description = escape_html(&step.description),
                time = step.timestamp.format("%H:%M:%S"),
            ));
        }

        html.push_str(
            r#"      </ol>
    </div>
  </body>
</html>
"#,
        );
        html
    }

    /// Writes the report, replacing any existing file at the destination.
    pub fn build(&self) -> Result<PathBuf, ReportError> {
        info!(steps = self.steps.len(), "generating html report");

        if let Some(parent) = self.outfile.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ReportError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let html = self.render();
        fs::write(self.outfile, html.as_bytes()).map_err(|source| ReportError::Write {
            path: self.outfile.to_path_buf(),
            source,
        })?;

        debug!(bytes = html.len(), "report written");
        info!(path = %self.outfile.display(), "report saved");
        Ok(self.outfile.to_path_buf())
    }
}
