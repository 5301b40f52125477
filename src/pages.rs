//! HTML page rendering.
//!
//! Every response body is assembled here by hand so the handlers stay
//! free of markup.  All interpolated values pass through
//! [`escape_html`]; raw user input never reaches the page unescaped.

use crate::capability::MountCapabilities;
use crate::storage::backend::ObjectRef;
use crate::storage::gateway::RuntimeMode;

/// Escape text for safe interpolation into HTML.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Common page shell: header, nav, footer.
fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>podbay - {title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; color: #222; }}
nav a {{ margin-right: 1em; }}
pre {{ background: #f4f4f4; padding: 1em; overflow-x: auto; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.3em 0.8em; }}
.notice {{ color: #a00; }}
form {{ margin: 1em 0; }}
</style>
</head>
<body>
<nav>
<a href="/home">Home</a>
<a href="/filesystem">Filesystem</a>
<a href="/secrets">Secrets</a>
<a href="/configmaps">ConfigMaps</a>
<a href="/env-variables">Env</a>
<a href="/storage">Storage</a>
<a href="/network">Network</a>
<a href="/autoscaling">Autoscaling</a>
<a href="/about">About</a>
</nav>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape_html(title),
        body = body
    )
}

/// The landing page: pod identity, detected capabilities, health toggle,
/// log and crash forms.
pub fn home_page(
    pod: &str,
    version: &str,
    mode: Option<RuntimeMode>,
    caps: MountCapabilities,
    health_status: &str,
) -> String {
    let mode_text = match mode {
        Some(m) => m.to_string(),
        None => "resolving...".to_string(),
    };

    let body = format!(
        r#"<p>Pod: <strong>{pod}</strong> &middot; Version: {version}</p>
<table>
<tr><th>Capability</th><th>Detected</th></tr>
<tr><td>Persistent volume</td><td>{fs}</td></tr>
<tr><td>Secret</td><td>{secret}</td></tr>
<tr><td>ConfigMap</td><td>{config}</td></tr>
<tr><td>Cloud storage</td><td>{mode_text}</td></tr>
</table>
<h2>Health</h2>
<p>{health}</p>
<form method="post" action="/health"><button type="submit">Toggle health</button></form>
<h2>Logging</h2>
<form method="post" action="/log-stdout">
<input type="text" name="message" placeholder="message">
<button type="submit">Log to stdout</button>
</form>
<form method="post" action="/log-stderr">
<input type="text" name="message" placeholder="message">
<button type="submit">Log to stderr</button>
</form>
<h2>Crash</h2>
<form method="post" action="/crash">
<input type="text" name="message" placeholder="last words">
<button type="submit">Crash the pod</button>
</form>
"#,
        pod = escape_html(pod),
        version = escape_html(version),
        fs = caps.filesystem,
        secret = caps.secret,
        config = caps.config_map,
        mode_text = escape_html(&mode_text),
        health = escape_html(health_status),
    );
    layout("Home", &body)
}

pub fn about_page(version: &str) -> String {
    let body = format!(
        "<p>podbay {} demonstrates what its pod can reach: mounted \
         volumes, secrets, config, and at most one cloud object store.</p>\
         <p>The cloud backend is detected once at startup; everything \
         else is plain I/O.</p>",
        escape_html(version)
    );
    layout("About", &body)
}

/// The memorial page shown right before an intentional crash.
pub fn rip_page(msg: Option<&str>) -> String {
    let epitaph = msg
        .filter(|m| !m.is_empty())
        .map(|m| format!("<p>Last words: {}</p>", escape_html(m)))
        .unwrap_or_default();
    let body = format!("<p>This pod has shuffled off its mortal coil.</p>{epitaph}");
    layout("R.I.P.", &body)
}

/// Generic error page with the failure detail.
pub fn error_page(code: &str, detail: &str) -> String {
    let body = format!(
        "<p class=\"notice\">Something went wrong ({}).</p><pre>{}</pre>",
        escape_html(code),
        escape_html(detail)
    );
    layout("Error", &body)
}

/// Rendered when a cloud storage route is used with no active backend.
pub fn wrong_platform_page() -> String {
    let body = "<p class=\"notice\">No cloud storage backend is active. \
                Run this workload on AWS or Azure (with the namespace \
                bucket or container provisioned) to use this feature.</p>"
        .to_string();
    layout("Wrong platform", &body)
}

/// Rendered when a requested object genuinely does not exist -- kept
/// visually distinct from backend failures.
pub fn object_not_found_page() -> String {
    let body = "<p>The requested object does not exist in the container.</p>\
                <p><a href=\"/storage\">Back to the listing</a></p>"
        .to_string();
    layout("Object not found", &body)
}

// -- Filesystem / mounts ------------------------------------------------------

pub fn filesystem_page(directory: &str, items: &[String], notice: Option<&str>) -> String {
    let notice_html = notice
        .map(|n| format!("<p class=\"notice\">{}</p>", escape_html(n)))
        .unwrap_or_default();

    let rows: String = items
        .iter()
        .map(|name| {
            format!(
                "<li><a href=\"/filesystem?file={}\">{}</a></li>",
                escape_html(name),
                escape_html(name)
            )
        })
        .collect();

    let body = format!(
        r#"{notice_html}
<p>Directory: <code>{dir}</code></p>
<ul>{rows}</ul>
<h2>Create a file</h2>
<form method="post" action="/create-file">
<input type="text" name="filename" placeholder="filename">
<br>
<textarea name="content" rows="4" cols="40" placeholder="content"></textarea>
<br>
<button type="submit">Create</button>
</form>
"#,
        dir = escape_html(directory),
    );
    layout("Filesystem", &body)
}

pub fn file_page(filename: &str, contents: &str) -> String {
    let body = format!(
        "<p>File: <code>{}</code></p><pre>{}</pre>\
         <p><a href=\"/filesystem\">Back</a></p>",
        escape_html(filename),
        escape_html(contents)
    );
    layout("File", &body)
}

pub fn secret_page(contents: &str) -> String {
    let body = format!("<p>Mounted secret:</p><pre>{}</pre>", escape_html(contents));
    layout("Secrets", &body)
}

pub fn config_page(contents: &str) -> String {
    let body = format!(
        "<p>Mounted config file:</p><pre>{}</pre>",
        escape_html(contents)
    );
    layout("ConfigMaps", &body)
}

pub fn mount_missing_page(what: &str) -> String {
    let body = format!(
        "<p class=\"notice\">No {} is mounted in this pod.</p>",
        escape_html(what)
    );
    layout("Not mounted", &body)
}

pub fn env_page(env_json: &str) -> String {
    let body = format!("<pre>{}</pre>", escape_html(env_json));
    layout("Environment variables", &body)
}

// -- Object storage -----------------------------------------------------------

/// The listing view: items plus the derived bucket/container name.
pub fn storage_page(container_name: &str, mode: RuntimeMode, items: &[ObjectRef]) -> String {
    let rows: String = if items.is_empty() {
        "<tr><td colspan=\"2\"><em>empty</em></td></tr>".to_string()
    } else {
        items
            .iter()
            .map(|obj| {
                let size = obj
                    .size_hint
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "<tr><td><a href=\"/storage/view/{key}\">{key}</a></td><td>{size}</td></tr>",
                    key = escape_html(&obj.key),
                    size = size
                )
            })
            .collect()
    };

    let body = format!(
        r#"<p>Backend: {mode} &middot; Container: <code>{container}</code></p>
<table>
<tr><th>Key</th><th>Size</th></tr>
{rows}
</table>
<h2>Upload a text object</h2>
<form method="post" action="/storage/upload">
<input type="text" name="filename" placeholder="key">
<br>
<textarea name="content" rows="4" cols="40" placeholder="content"></textarea>
<br>
<button type="submit">Upload</button>
</form>
"#,
        mode = mode,
        container = escape_html(container_name),
    );
    layout("Object storage", &body)
}

/// The read view: one object's contents.
pub fn object_page(key: &str, contents: &str) -> String {
    let body = format!(
        "<p>Object: <code>{}</code></p><pre>{}</pre>\
         <p><a href=\"/storage\">Back to the listing</a></p>",
        escape_html(key),
        escape_html(contents)
    );
    layout("Object", &body)
}

// -- Networking ---------------------------------------------------------------

pub fn network_page(dns_host: Option<&str>, dns_response: Option<&str>) -> String {
    let result = match (dns_host, dns_response) {
        (Some(host), Some(resp)) => format!(
            "<h2>Lookup: {}</h2><pre>{}</pre>",
            escape_html(host),
            escape_html(resp)
        ),
        _ => String::new(),
    };

    let body = format!(
        r#"<form method="post" action="/network">
<input type="text" name="dnsHost" placeholder="hostname">
<button type="submit">Resolve</button>
</form>
<p><a href="/network/colors">Query the microservice</a></p>
{result}
"#
    );
    layout("Network", &body)
}

pub fn autoscaling_page() -> String {
    let body = "<p>Generate load against <code>/hpa</code> to exercise the \
                horizontal pod autoscaler; each request fans out to the \
                sibling microservice.</p>"
        .to_string();
    layout("Autoscaling", &body)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>\"a\" & 'b'</script>"),
            "&lt;script&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_storage_page_lists_items() {
        let items = vec![
            ObjectRef {
                key: "notes.txt".to_string(),
                size_hint: Some(5),
            },
            ObjectRef {
                key: "no-size.bin".to_string(),
                size_hint: None,
            },
        ];
        let html = storage_page("demo-bucket", RuntimeMode::AwsS3, &items);
        assert!(html.contains("demo-bucket"));
        assert!(html.contains("notes.txt"));
        assert!(html.contains("/storage/view/notes.txt"));
        assert!(html.contains("aws-s3"));
    }

    #[test]
    fn test_storage_page_empty_listing() {
        let html = storage_page("demo-container", RuntimeMode::AzureBlob, &[]);
        assert!(html.contains("empty"));
    }

    #[test]
    fn test_not_found_differs_from_error() {
        let not_found = object_not_found_page();
        let error = error_page("TransientFailure", "connection reset");
        assert!(not_found.contains("does not exist"));
        assert!(error.contains("connection reset"));
        assert_ne!(not_found, error);
    }

    #[test]
    fn test_user_input_is_escaped() {
        let html = file_page("<img>.txt", "<b>bold</b>");
        assert!(!html.contains("<img>"));
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn test_wrong_platform_page_mentions_platform() {
        let html = wrong_platform_page();
        assert!(html.contains("AWS") && html.contains("Azure"));
    }
}
